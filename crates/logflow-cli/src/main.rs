mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use logflow_config::{Config, LogFormat};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // Config first: it decides the log format
    let config = Config::load(cli.config.as_deref())?;
    init_tracing(config.log_format);

    match cli.command {
        cli::Commands::Serve {
            gateway_addr,
            worker_addr,
        } => commands::serve::handle(config, gateway_addr, worker_addr).await,
        cli::Commands::Worker { worker_addr } => {
            commands::worker::handle(config, worker_addr).await
        }
        cli::Commands::Records(cmd) => commands::records::handle(cmd, &config).await,
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}
