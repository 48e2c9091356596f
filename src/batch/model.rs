use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BatchState, Task, TaskStatus};
use crate::error::{OverseerError, Result};

/// One delegation request decomposed into concurrent tasks.
///
/// Mutated only by the coordinator; immutable once `status` is terminal.
/// Records are persisted for audit and never deleted by this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: String,
    pub tasks: Vec<Task>,
    pub status: BatchState,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Batch {
    pub fn new(id: impl Into<String>, tasks: Vec<Task>) -> Self {
        Self {
            id: id.into(),
            tasks,
            status: BatchState::Pending,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn start(&mut self) {
        self.status = BatchState::Running;
    }

    /// Transition to a terminal state. `completed_at` is set exactly once,
    /// on the first transition out of Running; a terminal batch never
    /// changes again.
    pub fn finish(&mut self, status: BatchState) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        if self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
    }

    pub fn task(&self, task_id: u32) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn task_mut(&mut self, task_id: u32) -> Result<&mut Task> {
        let batch_id = self.id.clone();
        self.tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or(OverseerError::TaskNotFound { batch_id, task_id })
    }

    /// Derive the terminal batch state from the tasks' terminal states:
    /// timed_out if any task hit a deadline, failed only if every task
    /// failed, completed otherwise.
    pub fn resolve_state(&self) -> BatchState {
        if self
            .tasks
            .iter()
            .any(|t| t.status == TaskStatus::TimedOut)
        {
            BatchState::TimedOut
        } else if self.tasks.iter().all(|t| t.status == TaskStatus::Failed) {
            BatchState::Failed
        } else {
            BatchState::Completed
        }
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &Task> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Succeeded)
    }

    pub fn failed(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| t.status == TaskStatus::Failed)
    }

    pub fn timed_out(&self) -> impl Iterator<Item = &Task> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::TimedOut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::TaskKind;

    fn batch_with_statuses(statuses: &[TaskStatus]) -> Batch {
        let tasks = statuses
            .iter()
            .enumerate()
            .map(|(i, status)| {
                let mut task = Task::new(i as u32, TaskKind::Test, format!("task {}", i));
                task.status = *status;
                task
            })
            .collect();
        Batch::new("b-001", tasks)
    }

    #[test]
    fn test_resolve_state_completed() {
        let batch = batch_with_statuses(&[TaskStatus::Succeeded, TaskStatus::Failed]);
        assert_eq!(batch.resolve_state(), BatchState::Completed);
    }

    #[test]
    fn test_resolve_state_timed_out_wins() {
        let batch = batch_with_statuses(&[
            TaskStatus::Succeeded,
            TaskStatus::Failed,
            TaskStatus::TimedOut,
        ]);
        assert_eq!(batch.resolve_state(), BatchState::TimedOut);
    }

    #[test]
    fn test_resolve_state_failed_only_when_all_failed() {
        let batch = batch_with_statuses(&[TaskStatus::Failed, TaskStatus::Failed]);
        assert_eq!(batch.resolve_state(), BatchState::Failed);
    }

    #[test]
    fn test_completed_at_set_once() {
        let mut batch = batch_with_statuses(&[TaskStatus::Succeeded]);
        batch.start();
        batch.finish(BatchState::Completed);
        let first = batch.completed_at;
        assert!(first.is_some());

        batch.finish(BatchState::Completed);
        assert_eq!(batch.completed_at, first);
    }
}
