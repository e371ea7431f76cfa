use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use intercom_config::load as load_config;
use intercom_gateway::build_router;
use intercom_realtime::{Coordinator, Hub};
use intercom_runtime::{shutdown_signal, telemetry, RelayServices};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "intercom-server", about = "Intercom chat relay")]
struct Args {
    /// Path to a configuration file (overrides the default search paths)
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing()?;

    let args = Args::parse();
    if let Some(path) = &args.config {
        std::env::set_var("INTERCOM_CONFIG", path);
    }

    info!("starting Intercom relay");

    let config = load_config().context("failed to load configuration")?;
    let services = RelayServices::initialise(&config).await?;

    let coordinator = Arc::new(Coordinator::new(
        Hub::new(),
        services.store.clone(),
        config.realtime.clone(),
    ));
    let sweep_task = coordinator.spawn_typing_sweep();

    let app = build_router(Arc::clone(&coordinator));

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server error")?;

    sweep_task.abort();
    info!("relay shut down");
    Ok(())
}
