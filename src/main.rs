//! HJM access portal binary.
//!
//! ```text
//! hjm-portal [--config portal.toml] [--check] [--watch]
//! ```
//!
//! Without `--config` the built-in defaults are used; the JWT secret must
//! then come from `JWT_SECRET`.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use hjm_portal::config::{self, loader, PortalConfig};
use hjm_portal::config::watcher::ConfigWatcher;
use hjm_portal::lifecycle::{shutdown_signal, Shutdown};
use hjm_portal::observability::{logging, metrics};
use hjm_portal::HttpServer;

#[derive(Debug, Parser)]
#[command(name = "hjm-portal", version, about = "HJM hospital access portal")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "PORTAL_CONFIG")]
    config: Option<PathBuf>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,

    /// Reload the configuration file when it changes.
    #[arg(long, requires = "config")]
    watch: bool,
}

fn load(args: &Args) -> Result<PortalConfig, config::ConfigError> {
    match &args.config {
        Some(path) => config::load_config(path),
        None => {
            let mut config = PortalConfig::default();
            loader::apply_env_overrides(&mut config, |key| std::env::var(key).ok());
            loader::finish(config)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load(&args)?;

    if args.check {
        println!("configuration ok");
        return Ok(());
    }

    logging::init_logging(&config.observability);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "hjm-portal starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        base_path = %config.gate.base_path,
        upstreams = config.upstreams.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let mut server = HttpServer::new(config)?;

    // Keep the watcher alive for the lifetime of the server.
    let _watcher = match (&args.config, args.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            server = server.with_config_updates(updates);
            Some(watcher.run()?)
        }
        _ => None,
    };

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.trigger();
    });

    server.run(listener, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
