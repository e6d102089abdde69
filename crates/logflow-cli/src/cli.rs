use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "logflow")]
#[command(about = "Multi-tenant log ingestion, redaction and storage", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (default: <config dir>/logflow/config.toml when present)
    #[arg(long, global = true, env = "LOGFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run gateway, queue and workers in one process
    Serve {
        #[arg(long)]
        gateway_addr: Option<String>,

        #[arg(long)]
        worker_addr: Option<String>,
    },

    /// Run only the push endpoint, for an external queue delivering to /process
    Worker {
        #[arg(long)]
        worker_addr: Option<String>,
    },

    /// Inspect stored records
    #[command(subcommand)]
    Records(RecordsCommands),
}

#[derive(Subcommand)]
pub enum RecordsCommands {
    /// Show one processed record
    Show {
        #[arg(long)]
        tenant: String,

        #[arg(long)]
        log_id: String,
    },

    /// List the records of a tenant
    List {
        #[arg(long)]
        tenant: String,
    },

    /// List messages that could never be processed
    DeadLetters,
}
