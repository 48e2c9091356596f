use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, info, warn};

use crate::batch::{Batch, BatchRequest, ManifestStore, Proposal};
use crate::config::{CoordinatorConfig, OverseerConfig};
use crate::error::{InvokeError, Result};
use crate::invoker::{InvokeSuccess, WorkerBackend, WorkerInvoker};
use crate::review::{self, ChangeCategory, ChangeClassifier, DecisionRecord};
use crate::scope::ScopeLockSet;

/// What `submit` hands back: the finished batch record and the merged
/// decision for the gatekeeper.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub batch: Batch,
    pub decision: DecisionRecord,
}

/// Terminal outcome reported by one worker. Workers never touch batch or
/// task bookkeeping; this message is all they send upward.
struct TaskReport {
    task_id: u32,
    outcome: std::result::Result<InvokeSuccess, InvokeError>,
}

/// Owns the batch lifecycle: parsing, scope locking, concurrent dispatch,
/// status bookkeeping, and the downstream review pipeline.
///
/// The coordinator is the single writer of batch and task state. Workers run
/// as independent tokio tasks and report over a channel; the only blocking
/// point in the core is the join on their reports against the batch deadline.
pub struct Coordinator {
    store: ManifestStore,
    invoker: Arc<WorkerInvoker>,
    classifier: ChangeClassifier,
    config: CoordinatorConfig,
}

impl Coordinator {
    pub fn new(
        config: &OverseerConfig,
        backend: Arc<dyn WorkerBackend>,
        project_root: &Path,
        overseer_dir: &Path,
    ) -> Self {
        let invoker = Arc::new(WorkerInvoker::new(
            backend,
            config.invoker.clone(),
            project_root,
            overseer_dir,
        ));
        Self {
            store: ManifestStore::new(overseer_dir),
            invoker,
            classifier: ChangeClassifier::new(config.classifier.clone()),
            config: config.coordinator.clone(),
        }
    }

    pub fn store(&self) -> &ManifestStore {
        &self.store
    }

    /// Run one batch to completion and produce its decision record.
    ///
    /// Parsing, scope-lock construction, and persistence happen before any
    /// worker launches; an unrecognized kind rejects the whole request with
    /// nothing recorded. Worker failures stay isolated to their own task.
    pub async fn submit(&self, request: BatchRequest) -> Result<BatchOutcome> {
        let tasks = request.build_tasks(&self.config.extra_kinds)?;
        let scope = ScopeLockSet::from_tasks(&tasks);

        self.store.init().await?;
        let id = self.store.next_id().await?;
        let mut batch = Batch::new(id, tasks);
        batch.start();
        self.store.save(&batch).await?;

        info!(
            batch_id = %batch.id,
            tasks = batch.tasks.len(),
            scoped_paths = scope.len(),
            "Batch submitted"
        );

        for task in &mut batch.tasks {
            task.start();
        }
        self.store.save(&batch).await?;

        let reports = self.dispatch(&batch).await;

        let mut proposals: Vec<Proposal> = Vec::new();
        for report in reports {
            let task = batch.task_mut(report.task_id)?;
            match report.outcome {
                Ok(success) => {
                    task.succeed(success.output_ref);
                    proposals.push(success.proposal);
                }
                Err(err) if err.is_timeout() => {
                    warn!(task_id = task.id, error = %err, "Task timed out");
                    task.time_out(Some(err.to_string()));
                }
                Err(err) => {
                    warn!(task_id = task.id, error = %err, "Task failed");
                    task.fail(err.to_string());
                }
            }
        }

        // Whatever never reported was cancelled by the batch deadline.
        for task in &mut batch.tasks {
            if !task.status.is_terminal() {
                task.time_out(None);
            }
        }

        let state = batch.resolve_state();
        batch.finish(state);

        let categories: BTreeMap<u32, ChangeCategory> = proposals
            .iter()
            .map(|p| (p.task_id, self.classifier.classify(p)))
            .collect();
        let conflicts = review::detect_conflicts(&proposals, &categories, &scope);
        let decision = review::aggregate(proposals, &categories, conflicts);

        self.store.save(&batch).await?;

        info!(
            batch_id = %batch.id,
            status = %batch.status,
            safe = decision.safe_changes.len(),
            risky = decision.risky_changes.len(),
            conflicts = decision.conflicts.len(),
            "Batch finished"
        );

        Ok(BatchOutcome { batch, decision })
    }

    /// Launch one worker per task and collect their reports until all tasks
    /// report or the batch deadline elapses, whichever comes first.
    async fn dispatch(&self, batch: &Batch) -> Vec<TaskReport> {
        let total = batch.tasks.len();
        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel_tasks));
        let (tx, mut rx) = mpsc::channel(total.max(1));

        let mut handles = Vec::with_capacity(total);
        for task in &batch.tasks {
            let invoker = Arc::clone(&self.invoker);
            let semaphore = Arc::clone(&semaphore);
            let tx = tx.clone();
            let batch_id = batch.id.clone();
            let task = task.clone();

            handles.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };

                let task_id = task.id;
                debug!(batch_id = %batch_id, task_id, "Worker started");
                let outcome = invoker.run(&batch_id, &task).await;
                let _ = tx
                    .send(TaskReport { task_id, outcome })
                    .await;
            }));
        }
        drop(tx);

        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(self.config.batch_timeout_secs);
        let mut reports = Vec::with_capacity(total);

        while reports.len() < total {
            tokio::select! {
                report = rx.recv() => match report {
                    Some(report) => reports.push(report),
                    None => break,
                },
                _ = tokio::time::sleep_until(deadline) => {
                    warn!(
                        batch_id = %batch.id,
                        outstanding = total - reports.len(),
                        "Batch deadline elapsed, cancelling outstanding workers"
                    );
                    break;
                }
            }
        }

        // Already-terminal tasks are unaffected; only still-running workers die.
        for handle in &handles {
            handle.abort();
        }

        reports
    }
}
