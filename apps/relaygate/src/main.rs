use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

mod cli;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let boot = relaygate_core::bootstrap(cli.data_dir).await?;
    let state = Arc::new(boot.state);
    let app = relaygate_core::public_router(state);

    let bind = format!("{}:{}", cli.bind, cli.port);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(%bind, "relaygate listening");
    axum::serve(listener, app).await?;
    Ok(())
}
