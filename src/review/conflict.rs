use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use super::ChangeCategory;
use crate::batch::Proposal;
use crate::scope::ScopeLockSet;

/// Detect conflicting task pairs among completed proposals.
///
/// Two proposals conflict iff their declared-or-discovered file sets
/// intersect and at least one side is a risky modification. Purely additive
/// proposals may overlap freely -- new files are isolated by construction --
/// except when both create the same path with different content, which is
/// flagged as a conflict.
///
/// Pairs are unordered, normalized as (low, high). Pure function over its
/// inputs; completion order carries no meaning here.
pub fn detect_conflicts(
    proposals: &[Proposal],
    categories: &BTreeMap<u32, ChangeCategory>,
    scope: &ScopeLockSet,
) -> BTreeSet<(u32, u32)> {
    let mut conflicts = BTreeSet::new();

    let effective: Vec<(u32, BTreeSet<PathBuf>)> = proposals
        .iter()
        .map(|p| {
            let mut paths = scope.declared_scope(p.task_id);
            paths.extend(p.files_changed());
            (p.task_id, paths)
        })
        .collect();

    for (i, a) in proposals.iter().enumerate() {
        for (j, b) in proposals.iter().enumerate().skip(i + 1) {
            let shared: Vec<&PathBuf> = effective[i]
                .1
                .intersection(&effective[j].1)
                .collect();
            if shared.is_empty() {
                continue;
            }

            let a_risky = !categories
                .get(&a.task_id)
                .copied()
                .unwrap_or(ChangeCategory::Risky)
                .is_safe();
            let b_risky = !categories
                .get(&b.task_id)
                .copied()
                .unwrap_or(ChangeCategory::Risky)
                .is_safe();

            let conflicting = if a_risky || b_risky {
                true
            } else {
                // Both additive: only a same-path creation with diverging
                // content is incompatible.
                shared.iter().any(|path| {
                    a.artifact.creates(path)
                        && b.artifact.creates(path)
                        && a.artifact.implementation != b.artifact.implementation
                })
            };

            if conflicting {
                let low = a.task_id.min(b.task_id);
                let high = a.task_id.max(b.task_id);
                conflicts.insert((low, high));
            }
        }
    }

    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{Task, TaskKind};
    use crate::invoker::ParsedArtifact;

    fn proposal(task_id: u32, kind: TaskKind, changed_files: &str, implementation: &str) -> Proposal {
        let raw = format!(
            "## implementation\n{}\n## changed-files\n{}\n## explanation\nwhy\n",
            implementation, changed_files
        );
        Proposal::new(task_id, kind, ParsedArtifact::parse(&raw).unwrap())
    }

    fn categories(entries: &[(u32, ChangeCategory)]) -> BTreeMap<u32, ChangeCategory> {
        entries.iter().copied().collect()
    }

    #[test]
    fn test_overlapping_risky_pair_conflicts() {
        let scope = ScopeLockSet::from_tasks(&[
            Task::new(0, TaskKind::Review, "a").with_target_files([PathBuf::from("src/auth.py")]),
            Task::new(1, TaskKind::Review, "b").with_target_files([PathBuf::from("src/auth.py")]),
        ]);
        let proposals = vec![
            proposal(0, TaskKind::Review, "edit src/auth.py", "fix a"),
            proposal(1, TaskKind::Review, "edit src/auth.py", "fix b"),
        ];
        let cats = categories(&[(0, ChangeCategory::Risky), (1, ChangeCategory::Risky)]);

        let conflicts = detect_conflicts(&proposals, &cats, &scope);
        assert_eq!(conflicts.len(), 1);
        assert!(conflicts.contains(&(0, 1)));
    }

    #[test]
    fn test_disjoint_scopes_never_conflict() {
        let scope = ScopeLockSet::from_tasks(&[]);
        let proposals = vec![
            proposal(0, TaskKind::Review, "edit src/auth.py", "a"),
            proposal(1, TaskKind::Review, "edit src/db.py", "b"),
        ];
        let cats = categories(&[(0, ChangeCategory::Risky), (1, ChangeCategory::Risky)]);

        assert!(detect_conflicts(&proposals, &cats, &scope).is_empty());
    }

    #[test]
    fn test_two_additive_proposals_may_overlap() {
        // Both declare the same scope file but only add new, distinct files.
        let scope = ScopeLockSet::from_tasks(&[
            Task::new(0, TaskKind::Test, "a").with_target_files([PathBuf::from("src/auth.py")]),
            Task::new(1, TaskKind::Docs, "b").with_target_files([PathBuf::from("src/auth.py")]),
        ]);
        let proposals = vec![
            proposal(0, TaskKind::Test, "new tests/test_auth.py", "tests"),
            proposal(1, TaskKind::Docs, "new docs/auth.md", "docs"),
        ];
        let cats = categories(&[(0, ChangeCategory::Safe), (1, ChangeCategory::Safe)]);

        assert!(detect_conflicts(&proposals, &cats, &scope).is_empty());
    }

    #[test]
    fn test_same_new_path_different_content_conflicts() {
        let scope = ScopeLockSet::from_tasks(&[]);
        let proposals = vec![
            proposal(0, TaskKind::Test, "new tests/test_auth.py", "version one"),
            proposal(1, TaskKind::Test, "new tests/test_auth.py", "version two"),
        ];
        let cats = categories(&[(0, ChangeCategory::Safe), (1, ChangeCategory::Safe)]);

        let conflicts = detect_conflicts(&proposals, &cats, &scope);
        assert!(conflicts.contains(&(0, 1)));
    }

    #[test]
    fn test_same_new_path_identical_content_is_compatible() {
        let scope = ScopeLockSet::from_tasks(&[]);
        let proposals = vec![
            proposal(0, TaskKind::Test, "new tests/test_auth.py", "same body"),
            proposal(1, TaskKind::Test, "new tests/test_auth.py", "same body"),
        ];
        let cats = categories(&[(0, ChangeCategory::Safe), (1, ChangeCategory::Safe)]);

        assert!(detect_conflicts(&proposals, &cats, &scope).is_empty());
    }

    #[test]
    fn test_discovered_files_count_toward_scope() {
        // Task 1 declared nothing but discovered src/auth.py while working.
        let scope = ScopeLockSet::from_tasks(&[
            Task::new(0, TaskKind::Review, "a").with_target_files([PathBuf::from("src/auth.py")]),
            Task::new(1, TaskKind::Review, "b"),
        ]);
        let proposals = vec![
            proposal(0, TaskKind::Review, "edit src/auth.py", "a"),
            proposal(1, TaskKind::Review, "edit src/auth.py", "b"),
        ];
        let cats = categories(&[(0, ChangeCategory::Risky), (1, ChangeCategory::Risky)]);

        assert!(detect_conflicts(&proposals, &cats, &scope).contains(&(0, 1)));
    }

    #[test]
    fn test_pairs_are_normalized() {
        let scope = ScopeLockSet::from_tasks(&[]);
        let proposals = vec![
            proposal(3, TaskKind::Review, "edit src/auth.py", "a"),
            proposal(1, TaskKind::Review, "edit src/auth.py", "b"),
        ];
        let cats = categories(&[(1, ChangeCategory::Risky), (3, ChangeCategory::Risky)]);

        let conflicts = detect_conflicts(&proposals, &cats, &scope);
        assert_eq!(conflicts.len(), 1);
        assert!(conflicts.contains(&(1, 3)));
    }
}
