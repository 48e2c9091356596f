use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::ChangeCategory;
use crate::batch::Proposal;

/// The single merged decision handed to the gatekeeper for one batch.
///
/// Every succeeded proposal appears in exactly one partition. Conflicts are
/// reported alongside but never resolved here: choosing which side wins is
/// the gatekeeper's call, not this core's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub safe_changes: Vec<Proposal>,
    pub risky_changes: Vec<Proposal>,
    pub conflicts: BTreeSet<(u32, u32)>,
}

impl DecisionRecord {
    pub fn contains_task(&self, task_id: u32) -> bool {
        self.safe_changes
            .iter()
            .chain(self.risky_changes.iter())
            .any(|p| p.task_id == task_id)
    }

    pub fn proposal_count(&self) -> usize {
        self.safe_changes.len() + self.risky_changes.len()
    }
}

/// Partition proposals by their category. Pure function, no I/O.
///
/// Output ordering is by task id, not completion order: concurrent tasks
/// finish in arbitrary order and the record must not encode that accident.
pub fn aggregate(
    mut proposals: Vec<Proposal>,
    categories: &BTreeMap<u32, ChangeCategory>,
    conflicts: BTreeSet<(u32, u32)>,
) -> DecisionRecord {
    proposals.sort_by_key(|p| p.task_id);

    let mut safe_changes = Vec::new();
    let mut risky_changes = Vec::new();

    for proposal in proposals {
        let category = categories
            .get(&proposal.task_id)
            .copied()
            .unwrap_or(ChangeCategory::Risky);
        match category {
            ChangeCategory::Safe => safe_changes.push(proposal),
            ChangeCategory::Risky => risky_changes.push(proposal),
        }
    }

    DecisionRecord {
        safe_changes,
        risky_changes,
        conflicts,
    }
}
