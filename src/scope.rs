use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::batch::Task;

/// Per-batch mapping of file path to the task ids declaring that path.
///
/// Built once at batch-parse time and structurally frozen afterwards. It is
/// not a mutual-exclusion mechanism: every task in a batch executes
/// concurrently regardless of overlap, and conflicts are resolved after
/// completion from this record.
#[derive(Debug, Clone, Default)]
pub struct ScopeLockSet {
    locks: BTreeMap<PathBuf, BTreeSet<u32>>,
}

impl ScopeLockSet {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let mut locks: BTreeMap<PathBuf, BTreeSet<u32>> = BTreeMap::new();
        for task in tasks {
            for path in &task.target_files {
                locks.entry(path.clone()).or_default().insert(task.id);
            }
        }
        Self { locks }
    }

    /// Task ids declaring the given path.
    pub fn holders(&self, path: &Path) -> Option<&BTreeSet<u32>> {
        self.locks.get(path)
    }

    /// Declared scope of one task.
    pub fn declared_scope(&self, task_id: u32) -> BTreeSet<PathBuf> {
        self.locks
            .iter()
            .filter(|(_, holders)| holders.contains(&task_id))
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Unordered pairs of tasks whose declared scopes share at least one
    /// path, normalized as (low, high) so each pair appears once.
    pub fn overlapping_pairs(&self) -> BTreeSet<(u32, u32)> {
        let mut pairs = BTreeSet::new();
        for holders in self.locks.values() {
            let ids: Vec<u32> = holders.iter().copied().collect();
            for (i, &a) in ids.iter().enumerate() {
                for &b in &ids[i + 1..] {
                    pairs.insert((a.min(b), a.max(b)));
                }
            }
        }
        pairs
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::TaskKind;

    fn task(id: u32, files: &[&str]) -> Task {
        Task::new(id, TaskKind::Review, format!("task {}", id))
            .with_target_files(files.iter().copied().map(PathBuf::from))
    }

    #[test]
    fn test_built_from_declared_scopes() {
        let tasks = vec![task(0, &["src/auth.py"]), task(1, &["src/auth.py", "src/db.py"])];
        let locks = ScopeLockSet::from_tasks(&tasks);

        assert_eq!(locks.len(), 2);
        let holders = locks.holders(Path::new("src/auth.py")).unwrap();
        assert_eq!(holders.iter().copied().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(
            locks.declared_scope(1),
            [PathBuf::from("src/auth.py"), PathBuf::from("src/db.py")]
                .into_iter()
                .collect()
        );
    }

    #[test]
    fn test_overlapping_pairs_normalized() {
        let tasks = vec![
            task(2, &["src/auth.py"]),
            task(0, &["src/auth.py"]),
            task(1, &["src/other.py"]),
        ];
        let locks = ScopeLockSet::from_tasks(&tasks);

        let pairs = locks.overlapping_pairs();
        assert_eq!(pairs.len(), 1);
        assert!(pairs.contains(&(0, 2)));
    }

    #[test]
    fn test_empty_scope_declares_nothing() {
        let tasks = vec![task(0, &[]), task(1, &[])];
        let locks = ScopeLockSet::from_tasks(&tasks);

        assert!(locks.is_empty());
        assert!(locks.overlapping_pairs().is_empty());
    }
}
