use std::ffi::OsStr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::batch::{Proposal, TaskKind};
use crate::config::ClassifierConfig;
use crate::invoker::ChangeOp;

/// Trust tier of a proposed change: auto-appliable or approval-gated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeCategory {
    Safe,
    Risky,
}

impl ChangeCategory {
    pub fn is_safe(&self) -> bool {
        matches!(self, Self::Safe)
    }
}

/// Deterministic, total classification of proposals.
///
/// Policy, first match wins:
/// 1. every declared change creates a new test or documentation file -> safe
/// 2. kind is search or docs and no existing file is touched -> safe
/// 3. anything else -> risky
pub struct ChangeClassifier {
    config: ClassifierConfig,
}

impl ChangeClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn classify(&self, proposal: &Proposal) -> ChangeCategory {
        let changes = &proposal.artifact.changes;

        if !changes.is_empty()
            && changes
                .iter()
                .all(|e| e.op == ChangeOp::New && self.is_additive_path(&e.path))
        {
            return ChangeCategory::Safe;
        }

        if matches!(proposal.kind, TaskKind::Search | TaskKind::Docs)
            && changes.iter().all(|e| e.op == ChangeOp::New)
        {
            return ChangeCategory::Safe;
        }

        ChangeCategory::Risky
    }

    fn is_additive_path(&self, path: &Path) -> bool {
        self.config
            .test_patterns
            .iter()
            .chain(self.config.doc_patterns.iter())
            .any(|pattern| path_matches(path, pattern))
    }
}

fn path_matches(path: &Path, pattern: &str) -> bool {
    if let Some(dir) = pattern.strip_suffix('/') {
        return path.components().any(|c| c.as_os_str() == OsStr::new(dir));
    }

    let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
        return false;
    };

    if pattern.starts_with('.') {
        name.ends_with(pattern)
    } else if pattern.starts_with('_') {
        name.contains(pattern)
    } else {
        name.starts_with(pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::ParsedArtifact;

    fn proposal(kind: TaskKind, changed_files: &str) -> Proposal {
        let raw = format!(
            "## implementation\ncode\n## changed-files\n{}\n## explanation\nwhy\n",
            changed_files
        );
        Proposal::new(0, kind, ParsedArtifact::parse(&raw).unwrap())
    }

    fn classifier() -> ChangeClassifier {
        ChangeClassifier::new(ClassifierConfig::default())
    }

    #[test]
    fn test_new_test_file_is_safe() {
        let p = proposal(TaskKind::Test, "new tests/test_login.py");
        assert_eq!(classifier().classify(&p), ChangeCategory::Safe);
    }

    #[test]
    fn test_new_doc_file_is_safe() {
        let p = proposal(TaskKind::Docs, "new docs/setup.md");
        assert_eq!(classifier().classify(&p), ChangeCategory::Safe);
    }

    #[test]
    fn test_edit_to_existing_source_is_risky() {
        let p = proposal(TaskKind::Review, "edit src/auth.py");
        assert_eq!(classifier().classify(&p), ChangeCategory::Risky);
    }

    #[test]
    fn test_mixed_changes_are_risky() {
        let p = proposal(TaskKind::Test, "new tests/test_auth.py\nedit src/auth.py");
        assert_eq!(classifier().classify(&p), ChangeCategory::Risky);
    }

    #[test]
    fn test_search_with_no_changes_is_safe() {
        let p = proposal(TaskKind::Search, "");
        assert_eq!(classifier().classify(&p), ChangeCategory::Safe);
    }

    #[test]
    fn test_new_source_file_from_review_is_risky() {
        // A new non-test, non-doc file from a review task falls through to risky.
        let p = proposal(TaskKind::Review, "new src/helper.py");
        assert_eq!(classifier().classify(&p), ChangeCategory::Risky);
    }

    #[test]
    fn test_classification_is_idempotent() {
        let p = proposal(TaskKind::Test, "new tests/test_x.py");
        let c = classifier();
        assert_eq!(c.classify(&p), c.classify(&p));
    }

    #[test]
    fn test_pattern_matching_shapes() {
        assert!(path_matches(Path::new("tests/unit/test_a.py"), "tests/"));
        assert!(path_matches(Path::new("pkg/test_a.py"), "test_"));
        assert!(path_matches(Path::new("pkg/auth_test.go"), "_test."));
        assert!(path_matches(Path::new("README.md"), ".md"));
        assert!(!path_matches(Path::new("src/contest.py"), "test_"));
        assert!(!path_matches(Path::new("src/latest.py"), "test_"));
    }
}
