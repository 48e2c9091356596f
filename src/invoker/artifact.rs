//! Strict parsing of worker output into a structured artifact.
//!
//! Workers answer in named sections. The parser fails closed: anything that
//! does not match the expected shape is a `MalformedOutput`, never a guess.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::InvokeError;

const SECTION_IMPLEMENTATION: &str = "implementation";
const SECTION_CHANGED_FILES: &str = "changed-files";
const SECTION_EXPLANATION: &str = "explanation";
const SECTION_TEST_COMMANDS: &str = "test-commands";
const SECTION_NEEDS_REVIEW: &str = "needs-review";

const KNOWN_SECTIONS: [&str; 5] = [
    SECTION_IMPLEMENTATION,
    SECTION_CHANGED_FILES,
    SECTION_EXPLANATION,
    SECTION_TEST_COMMANDS,
    SECTION_NEEDS_REVIEW,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    New,
    Edit,
    Delete,
}

impl ChangeOp {
    fn parse(op: &str) -> Option<Self> {
        match op {
            "new" => Some(Self::New),
            "edit" => Some(Self::Edit),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Edit => "edit",
            Self::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    pub op: ChangeOp,
    pub path: PathBuf,
}

/// A worker's output, parsed into its declared sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedArtifact {
    pub implementation: String,
    pub changes: Vec<ChangeEntry>,
    pub explanation: String,
    #[serde(default)]
    pub test_commands: Vec<String>,
    #[serde(default)]
    pub needs_review: bool,
}

impl ParsedArtifact {
    pub fn parse(raw: &str) -> Result<Self, InvokeError> {
        let mut sections: Vec<(String, Vec<&str>)> = Vec::new();

        for line in raw.lines() {
            if let Some(name) = line.strip_prefix("## ") {
                let name = name.trim();
                if !KNOWN_SECTIONS.contains(&name) {
                    return Err(InvokeError::malformed(format!("unknown section: {}", name)));
                }
                if sections.iter().any(|(n, _)| n == name) {
                    return Err(InvokeError::malformed(format!(
                        "duplicate section: {}",
                        name
                    )));
                }
                sections.push((name.to_string(), Vec::new()));
            } else if let Some((_, body)) = sections.last_mut() {
                body.push(line);
            } else if !line.trim().is_empty() {
                return Err(InvokeError::malformed("content before first section"));
            }
        }

        let body_of = |name: &str| -> Option<String> {
            sections
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, lines)| lines.join("\n").trim().to_string())
        };

        let implementation = body_of(SECTION_IMPLEMENTATION)
            .ok_or_else(|| InvokeError::malformed("missing section: implementation"))?;
        let changed_files = body_of(SECTION_CHANGED_FILES)
            .ok_or_else(|| InvokeError::malformed("missing section: changed-files"))?;
        let explanation = body_of(SECTION_EXPLANATION)
            .ok_or_else(|| InvokeError::malformed("missing section: explanation"))?;

        let changes = Self::parse_changes(&changed_files)?;

        let test_commands = body_of(SECTION_TEST_COMMANDS)
            .map(|body| {
                body.lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let needs_review = match body_of(SECTION_NEEDS_REVIEW) {
            None => false,
            Some(body) => match body.to_lowercase().as_str() {
                "yes" => true,
                "no" => false,
                other => {
                    return Err(InvokeError::malformed(format!(
                        "needs-review must be yes or no, got: {}",
                        other
                    )));
                }
            },
        };

        Ok(Self {
            implementation,
            changes,
            explanation,
            test_commands,
            needs_review,
        })
    }

    fn parse_changes(body: &str) -> Result<Vec<ChangeEntry>, InvokeError> {
        let mut changes = Vec::new();
        for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let (op, path) = line.split_once(char::is_whitespace).ok_or_else(|| {
                InvokeError::malformed(format!("changed-files line has no path: {}", line))
            })?;
            let op = ChangeOp::parse(op).ok_or_else(|| {
                InvokeError::malformed(format!("unknown change op: {}", op))
            })?;
            let path = path.trim();
            if path.is_empty() {
                return Err(InvokeError::malformed("changed-files entry has empty path"));
            }
            changes.push(ChangeEntry {
                op,
                path: PathBuf::from(path),
            });
        }
        Ok(changes)
    }

    /// True when every declared change creates a new file.
    pub fn is_purely_additive(&self) -> bool {
        self.changes.iter().all(|entry| entry.op == ChangeOp::New)
    }

    /// True when the artifact declares creation of the given path.
    pub fn creates(&self, path: &std::path::Path) -> bool {
        self.changes
            .iter()
            .any(|entry| entry.op == ChangeOp::New && entry.path == path)
    }

    /// Canonical markdown rendering, used for the artifact file in the
    /// task's output slot.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("## implementation\n");
        out.push_str(&self.implementation);
        out.push_str("\n\n## changed-files\n");
        for entry in &self.changes {
            out.push_str(&format!("{} {}\n", entry.op.as_str(), entry.path.display()));
        }
        out.push_str("\n## explanation\n");
        out.push_str(&self.explanation);
        if !self.test_commands.is_empty() {
            out.push_str("\n\n## test-commands\n");
            for command in &self.test_commands {
                out.push_str(command);
                out.push('\n');
            }
        }
        out.push_str("\n\n## needs-review\n");
        out.push_str(if self.needs_review { "yes" } else { "no" });
        out.push('\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const VALID: &str = "## implementation\n\
def login():\n    pass\n\
## changed-files\n\
new tests/test_login.py\n\
edit src/auth.py\n\
## explanation\n\
Adds a login test and fixes the handler.\n\
## test-commands\n\
pytest tests/test_login.py\n\
## needs-review\n\
yes\n";

    #[test]
    fn test_parse_valid_artifact() {
        let artifact = ParsedArtifact::parse(VALID).unwrap();

        assert!(artifact.implementation.contains("def login"));
        assert_eq!(artifact.changes.len(), 2);
        assert_eq!(artifact.changes[0].op, ChangeOp::New);
        assert_eq!(artifact.changes[0].path, PathBuf::from("tests/test_login.py"));
        assert_eq!(artifact.changes[1].op, ChangeOp::Edit);
        assert_eq!(artifact.test_commands, vec!["pytest tests/test_login.py"]);
        assert!(artifact.needs_review);
    }

    #[test]
    fn test_missing_required_section() {
        let raw = "## implementation\ncode\n## explanation\nwhy\n";
        let err = ParsedArtifact::parse(raw).unwrap_err();
        assert!(matches!(err, InvokeError::MalformedOutput { reason } if reason.contains("changed-files")));
    }

    #[test]
    fn test_unknown_section_fails_closed() {
        let raw = "## implementation\ncode\n## scratchpad\nnotes\n";
        assert!(ParsedArtifact::parse(raw).is_err());
    }

    #[test]
    fn test_unknown_change_op() {
        let raw = "## implementation\ncode\n## changed-files\nrename src/a.py\n## explanation\nwhy\n";
        let err = ParsedArtifact::parse(raw).unwrap_err();
        assert!(matches!(err, InvokeError::MalformedOutput { reason } if reason.contains("rename")));
    }

    #[test]
    fn test_change_line_without_path() {
        let raw = "## implementation\ncode\n## changed-files\nnew\n## explanation\nwhy\n";
        assert!(ParsedArtifact::parse(raw).is_err());
    }

    #[test]
    fn test_content_before_first_section() {
        let raw = "preamble\n## implementation\ncode\n## changed-files\n## explanation\nwhy\n";
        assert!(ParsedArtifact::parse(raw).is_err());
    }

    #[test]
    fn test_empty_changed_files_is_valid() {
        let raw = "## implementation\nnothing to change\n## changed-files\n## explanation\nsearch only\n";
        let artifact = ParsedArtifact::parse(raw).unwrap();
        assert!(artifact.changes.is_empty());
        assert!(!artifact.needs_review);
    }

    #[test]
    fn test_additive_and_creates() {
        let raw = "## implementation\ncode\n## changed-files\nnew docs/guide.md\n## explanation\nwhy\n";
        let artifact = ParsedArtifact::parse(raw).unwrap();
        assert!(artifact.is_purely_additive());
        assert!(artifact.creates(Path::new("docs/guide.md")));
        assert!(!artifact.creates(Path::new("docs/other.md")));
    }

    #[test]
    fn test_render_round_trip() {
        let artifact = ParsedArtifact::parse(VALID).unwrap();
        let rendered = artifact.render();
        let reparsed = ParsedArtifact::parse(&rendered).unwrap();
        assert_eq!(reparsed.changes, artifact.changes);
        assert_eq!(reparsed.needs_review, artifact.needs_review);
    }
}
