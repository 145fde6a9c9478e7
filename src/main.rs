// src/main.rs
use clap::Parser;
use dotenvy::dotenv;
use devbills::{cli, config::Config, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::parse();
    let _log_guard = logging::init(&config.log_path())?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting devbills");

    cli::run(&config).await
}
