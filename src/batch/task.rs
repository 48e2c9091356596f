use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TaskStatus;
use crate::error::{OverseerError, Result};

/// One unit of work within a batch, dispatched to a single worker.
///
/// The coordinator owns every status transition; workers only report terminal
/// outcomes upward. `target_files` is fixed at creation and never mutated
/// afterwards -- scope locking and conflict detection depend on that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: u32,
    pub kind: TaskKind,
    pub instruction: String,

    #[serde(default)]
    pub target_files: BTreeSet<PathBuf>,

    pub status: TaskStatus,

    /// Artifact location, set exactly once on success.
    #[serde(default)]
    pub output_ref: Option<PathBuf>,

    #[serde(default)]
    pub error: Option<String>,

    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(id: u32, kind: TaskKind, instruction: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            instruction: instruction.into(),
            target_files: BTreeSet::new(),
            status: TaskStatus::Queued,
            output_ref: None,
            error: None,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn with_target_files(mut self, files: impl IntoIterator<Item = PathBuf>) -> Self {
        self.target_files = files.into_iter().collect();
        self
    }

    pub fn start(&mut self) {
        self.status = TaskStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn succeed(&mut self, output_ref: PathBuf) {
        self.status = TaskStatus::Succeeded;
        self.completed_at = Some(Utc::now());
        self.output_ref = Some(output_ref);
    }

    pub fn fail(&mut self, error: String) {
        self.status = TaskStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error = Some(error);
    }

    pub fn time_out(&mut self, detail: Option<String>) {
        self.status = TaskStatus::TimedOut;
        self.completed_at = Some(Utc::now());
        self.error = detail;
    }
}

/// Recognized task kinds. The built-in set is open: additional kinds can be
/// whitelisted through `coordinator.extra_kinds` and surface as `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Review,
    Test,
    Docs,
    Search,
    #[serde(untagged)]
    Custom(String),
}

impl TaskKind {
    /// Parse a kind string against the built-in set plus configured extras.
    /// An unrecognized kind rejects the whole batch before any dispatch.
    pub fn parse(kind: &str, extra_kinds: &[String]) -> Result<Self> {
        match kind {
            "review" => Ok(Self::Review),
            "test" => Ok(Self::Test),
            "docs" => Ok(Self::Docs),
            "search" => Ok(Self::Search),
            other if extra_kinds.iter().any(|k| k == other) => {
                Ok(Self::Custom(other.to_string()))
            }
            other => Err(OverseerError::UnrecognizedTaskKind(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Review => "review",
            Self::Test => "test",
            Self::Docs => "docs",
            Self::Search => "search",
            Self::Custom(kind) => kind,
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
