mod cli;
mod config;
mod main_lib;

use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use boursomatic_core::FileCheckpointStore;

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::main_lib::{checkpoint_store, init_tracing, print_checkpoint, print_fundamentals, run_ingest};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("configuration error: {:#}", e);
            return ExitCode::from(2);
        }
    };

    let result = match cli.command {
        Command::Run(args) => run_ingest(args, config).await.map(|status| status.code()),
        Command::Fundamentals { ticker, market } => {
            print_fundamentals(&ticker, market, &config).await.map(|_| 0)
        }
        Command::Checkpoint {
            interval,
            checkpoint,
        } => {
            let store: FileCheckpointStore = checkpoint_store(checkpoint, &config, interval);
            print_checkpoint(&store).map(|_| 0)
        }
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(2)
        }
    }
}
