//! Provenance ledger daemon
//!
//! ## Usage
//!
//! ```bash
//! # Start with defaults on port 5000
//! provenance-ledger
//!
//! # Custom config, demo data
//! provenance-ledger --config ledger.toml --seed-demo
//!
//! # Serve a front-end from ./public
//! PORT=3000 provenance-ledger --static-dir public
//! ```

use std::path::PathBuf;

use clap::Parser;
use provenance_ledger::api::create_router;
use provenance_ledger::events::spawn_logging_listener;
use provenance_ledger::{demo, Config, Services};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "provenance-ledger")]
#[command(about = "Append-only provenance ledger for supply-chain custody events")]
struct Args {
    /// Path to config file
    #[arg(short, long, env = "LEDGER_CONFIG")]
    config: Option<PathBuf>,

    /// Bind address
    #[arg(long, env = "HOST")]
    host: Option<String>,

    /// HTTP port
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Directory of static files to serve
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Accept custody events after Retail
    #[arg(long)]
    allow_post_retail: bool,

    /// Load demo origins and products at startup
    #[arg(long, env = "SEED_DEMO")]
    seed_demo: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("provenance_ledger=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) if path.exists() => Config::load(path)?,
        Some(path) => {
            warn!(path = %path.display(), "Config file not found, using defaults");
            Config::default()
        }
        None => Config::default(),
    };

    // Apply CLI overrides
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(dir) = args.static_dir {
        config.server.static_dir = Some(dir);
    }
    if args.allow_post_retail {
        config.ledger.allow_post_retail_events = true;
    }
    config.validate()?;

    let services = Services::new(&config);
    let _listener = spawn_logging_listener(services.events.clone());

    if args.seed_demo {
        let summary = demo::seed(&services)?;
        info!(products = summary.products, events = summary.events, "Demo data loaded");
    }

    let app = create_router(services, &config.server);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        addr = %addr,
        post_retail = config.ledger.allow_post_retail_events,
        "Provenance ledger listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
