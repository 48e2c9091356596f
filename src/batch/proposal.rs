use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::TaskKind;
use crate::invoker::artifact::ParsedArtifact;

/// A worker's completed, structured output for one task.
///
/// Owned by the coordinator once written; the invoker never touches it after
/// reporting completion. The change category is assigned downstream by the
/// classifier, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub task_id: u32,
    pub kind: TaskKind,
    pub artifact: ParsedArtifact,
}

impl Proposal {
    pub fn new(task_id: u32, kind: TaskKind, artifact: ParsedArtifact) -> Self {
        Self {
            task_id,
            kind,
            artifact,
        }
    }

    /// Files the worker declared as changed. May differ from the task's
    /// declared scope: workers can discover additional affected files.
    pub fn files_changed(&self) -> BTreeSet<PathBuf> {
        self.artifact
            .changes
            .iter()
            .map(|entry| entry.path.clone())
            .collect()
    }
}
