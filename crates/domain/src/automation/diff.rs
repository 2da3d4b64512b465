//! Condition diff: which condition rows an update must insert, rewrite or delete.

use std::collections::BTreeSet;

use super::group::{ConditionGroup, PlacedCondition};
use crate::id::ConditionId;

/// Writes needed to move the persisted conditions of one automation to a new
/// [`ConditionGroup`].
///
/// Conditions without an id are inserted, conditions with an id are updated
/// in place, and every persisted id missing from the new group is deleted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionDiff {
    pub inserts: Vec<PlacedCondition>,
    pub updates: Vec<(ConditionId, PlacedCondition)>,
    pub deletes: Vec<ConditionId>,
}

impl ConditionDiff {
    #[must_use]
    pub fn compute(
        persisted: impl IntoIterator<Item = ConditionId>,
        next: &ConditionGroup,
    ) -> Self {
        let mut diff = Self::default();
        let mut kept = BTreeSet::new();
        for placed in next.placed() {
            match placed.condition.id {
                Some(id) => {
                    kept.insert(id);
                    diff.updates.push((id, placed));
                }
                None => diff.inserts.push(placed),
            }
        }
        diff.deletes = persisted
            .into_iter()
            .collect::<BTreeSet<_>>()
            .difference(&kept)
            .copied()
            .collect();
        diff
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    /// Number of inserts and updates, the writes that precede the deletes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.inserts.len() + self.updates.len()
    }
}
