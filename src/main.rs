use checkout_flows::{config::Config, routes::create_router, utils::init_logger, AppState};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Port to listen on (overrides PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Address to bind (overrides HOST)
    #[arg(long)]
    host: Option<String>,

    /// Directory holding vault-data.json (overrides DATA_DIR)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Directory of static checkout pages (overrides STATIC_DIR)
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Also write daily log files here (overrides LOG_DIR)
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

impl Cli {
    fn apply(self, config: &mut Config) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(dir) = self.data_dir {
            config.storage.data_dir = dir;
        }
        if let Some(dir) = self.static_dir {
            config.server.static_dir = dir;
        }
        if let Some(dir) = self.log_dir {
            config.server.log_dir = Some(dir);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::from_env()?;
    cli.apply(&mut config);

    let _log_guard = init_logger(config.server.log_dir.as_deref());
    info!(
        environment = %config.paypal.environment,
        braintree = config.braintree.enabled(),
        "Configuration loaded: {:?}",
        config.server
    );

    // Create shared state and the vault file
    let state = AppState::new(config.clone());
    state.vault.initialize().await?;
    info!("Vault data at {}", state.vault.path().display());

    let app = create_router(state);

    // Start server
    let ip = config
        .server
        .host
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid HOST {}: {}", config.server.host, e))?;
    let addr = SocketAddr::new(ip, config.server.port);
    info!("Server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
