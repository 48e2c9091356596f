use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use overseer::batch::{BatchRequest, ManifestStore};
use overseer::cli::{Cli, Commands};
use overseer::config::{BackendKind, OverseerConfig};
use overseer::coordinator::Coordinator;
use overseer::error::{OverseerError, Result};
use overseer::invoker::{HttpBackend, ScriptedBackend, WorkerBackend};
use overseer::output::OutputWriter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let writer = OutputWriter::new(cli.output);
    match run(cli, &writer).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            writer.print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("overseer=debug")
    } else {
        EnvFilter::new("overseer=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}

async fn run(cli: Cli, writer: &OutputWriter) -> Result<()> {
    let root = cli
        .root
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    let overseer_dir = root.join(".overseer");
    let config = OverseerConfig::load(&overseer_dir).await?;

    match cli.command {
        Commands::Submit {
            delegation,
            file,
            dry_run,
        } => {
            let request = load_request(delegation, file).await?;

            let backend: Arc<dyn WorkerBackend> =
                if dry_run || config.provider.backend == BackendKind::Scripted {
                    Arc::new(ScriptedBackend::dry_run())
                } else {
                    Arc::new(HttpBackend::try_from_env(&config.provider)?)
                };

            let coordinator = Coordinator::new(&config, backend, &root, &overseer_dir);
            let outcome = coordinator.submit(request).await?;
            writer.emit_outcome(&outcome);
            Ok(())
        }
        Commands::Status { batch_id } => {
            let store = ManifestStore::new(&overseer_dir);
            let batch = store.load(&batch_id).await?;
            writer.emit_batch(&batch);
            Ok(())
        }
        Commands::List { status } => {
            let store = ManifestStore::new(&overseer_dir);
            let batches = match status {
                Some(status) => store.list_by_status(status.into()).await?,
                None => store.list().await?,
            };
            writer.emit_list(&batches);
            Ok(())
        }
    }
}

async fn load_request(
    delegation: Option<String>,
    file: Option<PathBuf>,
) -> Result<BatchRequest> {
    match (delegation, file) {
        (_, Some(path)) => {
            let content = tokio::fs::read_to_string(&path).await?;
            Ok(toml::from_str(&content)?)
        }
        (Some(text), None) => Ok(BatchRequest::parse_delegation(&text)),
        (None, None) => Err(OverseerError::Config(
            "provide a delegation string or --file".to_string(),
        )),
    }
}
