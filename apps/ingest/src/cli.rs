use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use boursomatic_market_data::{Interval, Market};

#[derive(Parser, Debug)]
#[command(
    name = "boursomatic-ingest",
    version,
    about = "Batch OHLCV ingestion with retry, fallback and resumable checkpoints"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ingest bars for the symbol universe.
    Run(RunArgs),
    /// Print company fundamentals for one ticker as JSON.
    Fundamentals {
        ticker: String,

        #[arg(long, default_value = "NASDAQ")]
        market: Market,
    },
    /// Print the checkpoint artifact for an interval.
    Checkpoint {
        #[arg(long, default_value = "daily")]
        interval: Interval,

        /// Checkpoint file. Defaults to the interval's file in BOURSO_CHECKPOINT_DIR.
        #[arg(long)]
        checkpoint: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// daily, weekly, 1h, 15m or 5m.
    #[arg(long, default_value = "daily")]
    pub interval: Interval,

    /// Years of history. Default 8 for daily and weekly bars.
    #[arg(long, conflicts_with = "days")]
    pub years: Option<u32>,

    /// Days of history. Default 30 for intraday bars.
    #[arg(long)]
    pub days: Option<u32>,

    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Seconds between two symbols.
    #[arg(long)]
    pub symbol_delay: Option<f64>,

    /// Seconds between two batches.
    #[arg(long)]
    pub batch_delay: Option<f64>,

    /// Universe index to start from, ignoring the checkpoint.
    #[arg(long)]
    pub start_offset: Option<usize>,

    /// Only process the first N symbols of the universe.
    #[arg(long)]
    pub max_symbols: Option<usize>,

    /// Fetch but write nothing.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Percent of attempted symbols that must succeed.
    #[arg(long)]
    pub coverage_target: Option<f64>,

    /// Skip symbols whose bars are already mostly stored.
    #[arg(long, default_value_t = false)]
    pub skip_covered: bool,

    #[arg(long)]
    pub checkpoint: Option<PathBuf>,

    #[arg(long)]
    pub universe: Option<PathBuf>,

    #[arg(long)]
    pub db_path: Option<String>,
}
