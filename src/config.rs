use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{OverseerError, Result};

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1/messages";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OverseerConfig {
    pub coordinator: CoordinatorConfig,
    pub invoker: InvokerConfig,
    pub provider: ProviderConfig,
    pub classifier: ClassifierConfig,
}

impl OverseerConfig {
    pub async fn load(overseer_dir: &Path) -> Result<Self> {
        let config_path = overseer_dir.join("config.toml");
        let config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).await?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub async fn save(&self, overseer_dir: &Path) -> Result<()> {
        self.validate()?;
        let config_path = overseer_dir.join("config.toml");
        let content =
            toml::to_string_pretty(self).map_err(|e| OverseerError::Config(e.to_string()))?;
        fs::write(&config_path, content).await?;
        Ok(())
    }

    /// Validate configuration values for consistency and safety.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.coordinator.batch_timeout_secs == 0 {
            errors.push("batch_timeout_secs must be greater than 0");
        }
        if self.coordinator.max_parallel_tasks == 0 {
            errors.push("max_parallel_tasks must be greater than 0");
        }

        if self.invoker.task_timeout_secs == 0 {
            errors.push("task_timeout_secs must be greater than 0");
        }
        // The per-task deadline must fit inside the batch-wide deadline.
        if self.invoker.task_timeout_secs > self.coordinator.batch_timeout_secs {
            errors.push("task_timeout_secs must not exceed batch_timeout_secs");
        }
        if self.invoker.max_scope_file_bytes == 0 {
            errors.push("max_scope_file_bytes must be greater than 0");
        }

        if self.provider.model.is_empty() {
            errors.push("provider model must not be empty");
        }
        if self.provider.max_tokens == 0 {
            errors.push("provider max_tokens must be greater than 0");
        }

        if self.classifier.test_patterns.is_empty() {
            errors.push("classifier test_patterns must not be empty");
        }
        if self.classifier.doc_patterns.is_empty() {
            errors.push("classifier doc_patterns must not be empty");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(OverseerError::Config(errors.join("; ")))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Batch-wide deadline; outstanding tasks transition to timed_out when it elapses.
    pub batch_timeout_secs: u64,
    pub max_parallel_tasks: usize,
    /// Task kinds recognized in addition to the built-in set.
    pub extra_kinds: Vec<String>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            batch_timeout_secs: 600,
            max_parallel_tasks: 4,
            extra_kinds: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InvokerConfig {
    /// Per-task deadline, always <= batch_timeout_secs.
    pub task_timeout_secs: u64,
    /// Scope files larger than this are not sent to the worker.
    pub max_scope_file_bytes: u64,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            task_timeout_secs: 120,
            max_scope_file_bytes: 64 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Http,
    /// Canned responses; used by tests and dry runs.
    Scripted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub backend: BackendKind,
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Http,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tokens: 4096,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Path patterns that mark a changed file as a test file.
    pub test_patterns: Vec<String>,
    /// Path patterns that mark a changed file as documentation.
    pub doc_patterns: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            test_patterns: vec![
                "tests/".to_string(),
                "test_".to_string(),
                "_test.".to_string(),
            ],
            doc_patterns: vec!["docs/".to_string(), ".md".to_string(), ".rst".to_string()],
        }
    }
}
