use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::batch::BatchState;

#[derive(Parser)]
#[command(name = "overseer", about = "Delegate batches of work to isolated LLM workers")]
pub struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Project root; defaults to the current directory.
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Submit a batch and wait for its decision record.
    Submit {
        /// Free-text delegation, split on conjunction markers.
        delegation: Option<String>,

        /// Read the batch request from a TOML file instead.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Parse and dispatch without contacting a provider.
        #[arg(long)]
        dry_run: bool,
    },

    /// Show one batch record.
    Status { batch_id: String },

    /// List recorded batches.
    List {
        #[arg(long, value_enum)]
        status: Option<StatusFilterArg>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusFilterArg {
    Pending,
    Running,
    Completed,
    Failed,
    TimedOut,
}

impl From<StatusFilterArg> for BatchState {
    fn from(arg: StatusFilterArg) -> Self {
        match arg {
            StatusFilterArg::Pending => BatchState::Pending,
            StatusFilterArg::Running => BatchState::Running,
            StatusFilterArg::Completed => BatchState::Completed,
            StatusFilterArg::Failed => BatchState::Failed,
            StatusFilterArg::TimedOut => BatchState::TimedOut,
        }
    }
}
