//! Flat-file vault store
//!
//! Read the whole file, mutate in memory, write the whole file back. Updates
//! made through one `VaultStore` are serialized by an async mutex; nothing
//! coordinates separate processes sharing the same file.

use super::vault_data::VaultData;
use crate::types::{AppError, AppResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub struct VaultStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl VaultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn ensure_dir(&self) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    /// Read the file; a missing or unparsable file yields the empty skeleton
    async fn load(&self) -> AppResult<VaultData> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No vault file at {:?}, starting empty", self.path);
                return Ok(VaultData::default());
            }
            Err(e) => return Err(AppError::Storage(format!("reading {:?}: {}", self.path, e))),
        };

        match serde_json::from_str(&content) {
            Ok(data) => Ok(data),
            Err(e) => {
                warn!("Vault file {:?} is not valid JSON ({}), using empty data", self.path, e);
                Ok(VaultData::default())
            }
        }
    }

    async fn save(&self, data: &VaultData) -> AppResult<()> {
        self.ensure_dir().await?;
        let content = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, content)
            .await
            .map_err(|e| AppError::Storage(format!("writing {:?}: {}", self.path, e)))?;
        debug!("Saved vault data to {:?}", self.path);
        Ok(())
    }

    /// Consistent copy of the current data
    pub async fn snapshot(&self) -> AppResult<VaultData> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    /// Read-modify-write cycle around `f`
    pub async fn update<F, T>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&mut VaultData) -> T,
    {
        let _guard = self.lock.lock().await;
        let mut data = self.load().await?;
        let result = f(&mut data);
        self.save(&data).await?;
        Ok(result)
    }

    /// Create the file with an empty skeleton if it does not exist yet
    pub async fn initialize(&self) -> AppResult<()> {
        let _guard = self.lock.lock().await;
        if fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(());
        }
        self.save(&VaultData::default()).await?;
        info!("Created vault file at {:?}", self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::vault_data::{PaymentTokenRecord, TokenKind};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_update_persists_between_stores() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("vault-data.json");

        let store = VaultStore::new(&path);
        let inserted = store
            .update(|data| {
                data.add_payment_token("cust-1", PaymentTokenRecord::new("tok-a", TokenKind::Paypal, "VAULTED"))
            })
            .await
            .unwrap();
        assert!(inserted);

        let reopened = VaultStore::new(&path);
        let data = reopened.snapshot().await.unwrap();
        assert_eq!(data.payment_tokens("cust-1").len(), 1);
        assert_eq!(data.payment_tokens("cust-1")[0].kind, TokenKind::Paypal);
    }

    #[tokio::test]
    async fn test_corrupt_file_loads_as_skeleton() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("vault-data.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let store = VaultStore::new(&path);
        let data = store.snapshot().await.unwrap();
        assert!(data.customers.is_empty());

        store.initialize().await.unwrap();
        // initialize leaves an existing file alone
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "{ not json");
    }

    #[tokio::test]
    async fn test_concurrent_updates_do_not_lose_tokens() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(VaultStore::new(temp_dir.path().join("vault-data.json")));

        let mut handles = Vec::new();
        for i in 0..10 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .update(move |data| {
                        data.add_payment_token(
                            "cust-1",
                            PaymentTokenRecord::new(format!("tok-{}", i), TokenKind::Card, "VAULTED"),
                        )
                    })
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }

        let data = store.snapshot().await.unwrap();
        assert_eq!(data.payment_tokens("cust-1").len(), 10);
    }
}
