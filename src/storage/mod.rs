// Flat-file persistence for vaulted payment methods and recurring billing

pub mod vault_data;
pub mod vault_store;

pub use vault_data::*;
pub use vault_store::VaultStore;
