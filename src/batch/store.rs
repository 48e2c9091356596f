use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use super::{Batch, BatchState};
use crate::error::{OverseerError, Result};

/// Durable record of batches and their tasks, one YAML document per batch.
///
/// A batch record embeds all of its tasks, so persisting a new batch is a
/// single atomic write: either the whole batch is recorded or none of it.
/// Records are kept for audit and never deleted here.
pub struct ManifestStore {
    batches_dir: PathBuf,
}

impl ManifestStore {
    pub fn new(overseer_dir: &Path) -> Self {
        Self {
            batches_dir: overseer_dir.join("batches"),
        }
    }

    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.batches_dir).await?;
        self.recover_interrupted_writes().await;
        Ok(())
    }

    pub async fn save(&self, batch: &Batch) -> Result<()> {
        let path = self.batch_path(&batch.id);
        let content = serde_yaml_bw::to_string(batch)?;
        self.write_atomic(&path, &content).await
    }

    async fn write_atomic(&self, path: &Path, content: &str) -> Result<()> {
        let tmp_path = path.with_extension("yaml.tmp");

        fs::write(&tmp_path, content).await?;

        // Sync in spawn_blocking to avoid stalling the runtime.
        let tmp_path_clone = tmp_path.clone();
        let sync_result = tokio::task::spawn_blocking(move || {
            std::fs::File::open(&tmp_path_clone).and_then(|file| file.sync_all())
        })
        .await;

        match sync_result {
            Err(e) => tracing::warn!(error = %e, "Failed to sync temp file to disk"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Failed to sync temp file to disk"),
            Ok(Ok(())) => {}
        }

        // Atomic rename (POSIX guarantees atomicity)
        fs::rename(&tmp_path, path).await?;

        debug!(path = %path.display(), "Atomic write completed");
        Ok(())
    }

    async fn recover_interrupted_writes(&self) {
        if let Ok(mut entries) = fs::read_dir(&self.batches_dir).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "tmp") {
                    debug!(path = %path.display(), "Removing interrupted write");
                    let _ = fs::remove_file(&path).await;
                }
            }
        }
    }

    pub async fn load(&self, batch_id: &str) -> Result<Batch> {
        let path = self.batch_path(batch_id);
        if !path.exists() {
            return Err(OverseerError::BatchNotFound(batch_id.to_string()));
        }
        let content = fs::read_to_string(&path).await?;
        let batch: Batch = serde_yaml_bw::from_str(&content)?;
        Ok(batch)
    }

    pub async fn list(&self) -> Result<Vec<Batch>> {
        let mut batches = Vec::new();

        if !self.batches_dir.exists() {
            return Ok(batches);
        }

        let mut entries = fs::read_dir(&self.batches_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "yaml")
                && let Ok(content) = fs::read_to_string(&path).await
                && let Ok(batch) = serde_yaml_bw::from_str::<Batch>(&content)
            {
                batches.push(batch);
            }
        }

        batches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(batches)
    }

    pub async fn list_by_status(&self, status: BatchState) -> Result<Vec<Batch>> {
        let batches = self.list().await?;
        Ok(batches.into_iter().filter(|b| b.status == status).collect())
    }

    pub async fn exists(&self, batch_id: &str) -> bool {
        self.batch_path(batch_id).exists()
    }

    /// Next id in the zero-padded `b-NNN` sequence; ids stay monotonically
    /// orderable across restarts because they derive from what is on disk.
    pub async fn next_id(&self) -> Result<String> {
        let batches = self.list().await?;
        let max_num = batches
            .iter()
            .filter_map(|b| b.id.strip_prefix("b-").and_then(|s| s.parse::<u32>().ok()))
            .max()
            .unwrap_or(0);

        Ok(format!("b-{:03}", max_num + 1))
    }

    fn batch_path(&self, batch_id: &str) -> PathBuf {
        self.batches_dir.join(format!("{}.yaml", batch_id))
    }
}
