pub mod artifact;
pub mod backend;
pub mod slot;

pub use artifact::{ChangeEntry, ChangeOp, ParsedArtifact};
pub use backend::{
    HttpBackend, ScopeFile, ScriptedBackend, ScriptedReply, WorkerBackend, WorkerRequest,
};
pub use slot::OutputSlot;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::fs;
use tracing::debug;

use crate::batch::{Proposal, Task};
use crate::config::InvokerConfig;
use crate::error::InvokeError;

/// A completed invocation: the proposal plus where its artifact landed.
#[derive(Debug, Clone)]
pub struct InvokeSuccess {
    pub proposal: Proposal,
    pub output_ref: PathBuf,
}

/// Runs one task against the compute backend.
///
/// Strictly read-only against the project tree; the only write is the single
/// artifact in the task's own output slot. Concurrent invokers share nothing
/// and never talk to each other -- they report one terminal outcome upward.
pub struct WorkerInvoker {
    backend: Arc<dyn WorkerBackend>,
    config: InvokerConfig,
    project_root: PathBuf,
    overseer_dir: PathBuf,
}

impl WorkerInvoker {
    pub fn new(
        backend: Arc<dyn WorkerBackend>,
        config: InvokerConfig,
        project_root: &Path,
        overseer_dir: &Path,
    ) -> Self {
        Self {
            backend,
            config,
            project_root: project_root.to_path_buf(),
            overseer_dir: overseer_dir.to_path_buf(),
        }
    }

    pub async fn run(&self, batch_id: &str, task: &Task) -> Result<InvokeSuccess, InvokeError> {
        let scope_files = self.gather_scope(task).await;

        let request = WorkerRequest::new(task.kind.clone(), task.instruction.clone())
            .with_scope_files(scope_files);

        debug!(
            batch_id = %batch_id,
            task_id = task.id,
            request_id = %request.request_id,
            scope_files = request.scope_files.len(),
            "Invoking worker"
        );

        let deadline = Duration::from_secs(self.config.task_timeout_secs);
        let raw = tokio::time::timeout(deadline, self.backend.complete(&request))
            .await
            .map_err(|_| InvokeError::Timeout {
                duration_secs: self.config.task_timeout_secs,
            })??;

        let artifact = ParsedArtifact::parse(&raw)?;

        let slot = OutputSlot::for_task(&self.overseer_dir, batch_id, task.id);
        let output_ref = slot
            .write_artifact(&artifact)
            .await
            .map_err(|e| InvokeError::Provider(format!("artifact write failed: {}", e)))?;

        Ok(InvokeSuccess {
            proposal: Proposal::new(task.id, task.kind.clone(), artifact),
            output_ref,
        })
    }

    /// Read the task's declared scope files. Missing or oversized files are
    /// skipped, not fatal: the declared scope is a hint, the worker decides
    /// what it actually needs.
    async fn gather_scope(&self, task: &Task) -> Vec<ScopeFile> {
        let mut files = Vec::new();
        for path in &task.target_files {
            let full_path = self.project_root.join(path);
            match fs::metadata(&full_path).await {
                Ok(meta) if meta.len() > self.config.max_scope_file_bytes => {
                    debug!(path = %path.display(), size = meta.len(), "Skipping oversized scope file");
                    continue;
                }
                Err(_) => {
                    debug!(path = %path.display(), "Scope file not found, skipping");
                    continue;
                }
                Ok(_) => {}
            }
            match fs::read_to_string(&full_path).await {
                Ok(content) => files.push(ScopeFile {
                    path: path.clone(),
                    content,
                }),
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Unreadable scope file, skipping");
                }
            }
        }
        files
    }
}
