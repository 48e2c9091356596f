use thiserror::Error;

/// Per-invocation failure taxonomy reported by a worker.
///
/// These never propagate as unhandled faults: the coordinator converts each
/// into a failed or timed-out task entry and keeps sibling tasks running.
#[derive(Debug, Clone)]
pub enum InvokeError {
    /// The worker exceeded its per-task deadline.
    Timeout { duration_secs: u64 },
    /// The worker's output did not parse into the expected sections.
    MalformedOutput { reason: String },
    /// The compute backend was unreachable or returned an error.
    Provider(String),
}

impl InvokeError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedOutput {
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for InvokeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout { duration_secs } => {
                write!(f, "Worker timed out after {}s", duration_secs)
            }
            Self::MalformedOutput { reason } => write!(f, "Malformed worker output: {}", reason),
            Self::Provider(msg) => write!(f, "Provider error: {}", msg),
        }
    }
}

impl std::error::Error for InvokeError {}

#[derive(Error, Debug)]
pub enum OverseerError {
    #[error("Unrecognized task kind: {0}")]
    UnrecognizedTaskKind(String),

    #[error("Batch request contains no tasks")]
    EmptyBatch,

    #[error("Batch not found: {0}")]
    BatchNotFound(String),

    #[error("Task not found: {batch_id}/{task_id}")]
    TaskNotFound { batch_id: String, task_id: u32 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Worker invocation failed: {0}")]
    Invocation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml_bw::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, OverseerError>;

impl From<InvokeError> for OverseerError {
    fn from(err: InvokeError) -> Self {
        OverseerError::Invocation(err.to_string())
    }
}
