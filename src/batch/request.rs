use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{Task, TaskKind};
use crate::error::{OverseerError, Result};

/// Markers that separate tasks inside a free-text delegation.
const CONJUNCTION_MARKERS: [&str; 2] = [" and then ", "; "];

/// One (kind, instruction, target_files) triple of a batch request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub kind: String,
    pub instruction: String,
    #[serde(default)]
    pub target_files: Vec<PathBuf>,
}

impl TaskSpec {
    pub fn new(kind: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            instruction: instruction.into(),
            target_files: Vec::new(),
        }
    }

    pub fn with_target_files(mut self, files: impl IntoIterator<Item = PathBuf>) -> Self {
        self.target_files = files.into_iter().collect();
        self
    }
}

/// A user-issued delegation request, before ids are assigned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchRequest {
    pub tasks: Vec<TaskSpec>,
}

impl BatchRequest {
    pub fn new(tasks: Vec<TaskSpec>) -> Self {
        Self { tasks }
    }

    /// Split a free-text delegation into task specs.
    ///
    /// Purely syntactic: segments are separated by conjunction markers, the
    /// first word of each segment is its kind, and `@path` mentions declare
    /// the file scope. Kind validation happens later, at submission.
    pub fn parse_delegation(text: &str) -> Self {
        let mut segments = vec![text.trim().to_string()];
        for marker in CONJUNCTION_MARKERS {
            segments = segments
                .into_iter()
                .flat_map(|segment| {
                    segment
                        .split(marker)
                        .map(|part| part.trim().to_string())
                        .collect::<Vec<_>>()
                })
                .collect();
        }

        let tasks = segments
            .into_iter()
            .filter(|s| !s.is_empty())
            .map(|segment| {
                let (kind, rest) = match segment.split_once(char::is_whitespace) {
                    Some((kind, rest)) => (kind.to_lowercase(), rest.trim().to_string()),
                    None => (segment.to_lowercase(), String::new()),
                };

                let target_files = rest
                    .split_whitespace()
                    .filter_map(|word| word.strip_prefix('@'))
                    .map(|path| PathBuf::from(path.trim_end_matches([',', '.'])))
                    .collect();

                TaskSpec {
                    kind,
                    instruction: rest,
                    target_files,
                }
            })
            .collect();

        Self { tasks }
    }

    /// Validate every kind and assign ids 0..n-1 in declaration order.
    ///
    /// Fails fast: a single unrecognized kind rejects the whole batch before
    /// anything is persisted or dispatched.
    pub fn build_tasks(&self, extra_kinds: &[String]) -> Result<Vec<Task>> {
        if self.tasks.is_empty() {
            return Err(OverseerError::EmptyBatch);
        }

        let mut tasks = Vec::with_capacity(self.tasks.len());
        for (id, spec) in self.tasks.iter().enumerate() {
            let kind = TaskKind::parse(&spec.kind, extra_kinds)?;
            tasks.push(
                Task::new(id as u32, kind, spec.instruction.clone())
                    .with_target_files(spec.target_files.iter().cloned()),
            );
        }
        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_delegation_splits_on_markers() {
        let request = BatchRequest::parse_delegation(
            "review the auth module @src/auth.py and then test the login flow @tests/test_login.py",
        );

        assert_eq!(request.tasks.len(), 2);
        assert_eq!(request.tasks[0].kind, "review");
        assert_eq!(request.tasks[0].target_files, vec![PathBuf::from("src/auth.py")]);
        assert_eq!(request.tasks[1].kind, "test");
        assert_eq!(
            request.tasks[1].target_files,
            vec![PathBuf::from("tests/test_login.py")]
        );
    }

    #[test]
    fn test_parse_delegation_semicolon() {
        let request = BatchRequest::parse_delegation("docs update the readme; search error handling");
        assert_eq!(request.tasks.len(), 2);
        assert_eq!(request.tasks[0].kind, "docs");
        assert_eq!(request.tasks[1].kind, "search");
    }

    #[test]
    fn test_build_tasks_assigns_ids_in_order() {
        let request = BatchRequest::new(vec![
            TaskSpec::new("review", "review auth"),
            TaskSpec::new("test", "test auth"),
        ]);

        let tasks = request.build_tasks(&[]).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id, 0);
        assert_eq!(tasks[0].kind, TaskKind::Review);
        assert_eq!(tasks[1].id, 1);
        assert_eq!(tasks[1].kind, TaskKind::Test);
    }

    #[test]
    fn test_build_tasks_rejects_unrecognized_kind() {
        let request = BatchRequest::new(vec![
            TaskSpec::new("review", "review auth"),
            TaskSpec::new("deploy", "ship it"),
        ]);

        let err = request.build_tasks(&[]).unwrap_err();
        assert!(matches!(err, OverseerError::UnrecognizedTaskKind(k) if k == "deploy"));
    }

    #[test]
    fn test_build_tasks_rejects_empty_batch() {
        let request = BatchRequest::default();
        assert!(matches!(
            request.build_tasks(&[]),
            Err(OverseerError::EmptyBatch)
        ));
    }
}
