use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use super::artifact::ParsedArtifact;
use crate::error::Result;

/// Isolated, per-batch, per-task artifact location.
///
/// Each concurrent invocation owns its slot exclusively and writes exactly
/// one artifact there; nothing else in the tree is touched. This isolation
/// is what makes parallel execution safe without execution-time locks.
pub struct OutputSlot {
    dir: PathBuf,
}

impl OutputSlot {
    pub fn for_task(overseer_dir: &Path, batch_id: &str, task_id: u32) -> Self {
        Self {
            dir: overseer_dir
                .join("batches")
                .join(batch_id)
                .join("tasks")
                .join(task_id.to_string()),
        }
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.dir.join("artifact.md")
    }

    pub async fn write_artifact(&self, artifact: &ParsedArtifact) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).await?;

        let path = self.artifact_path();
        let tmp_path = path.with_extension("md.tmp");
        fs::write(&tmp_path, artifact.render()).await?;
        fs::rename(&tmp_path, &path).await?;

        debug!(path = %path.display(), "Artifact written");
        Ok(path)
    }
}
