//! Condition repository port: persistence for the conditions of an automation.

use std::future::Future;
use std::sync::Arc;

use greenhub_domain::automation::PlacedCondition;
use greenhub_domain::error::GreenhubError;
use greenhub_domain::id::{AutomationId, ConditionId};

/// Repository for condition rows. Each row remembers its bucket and its
/// position inside that bucket so a group reloads in the order it was saved.
pub trait ConditionRepository {
    /// Insert a condition under `automation_id` and return its new id.
    ///
    /// Any id already carried by `placed.condition` is ignored.
    fn create(
        &self,
        automation_id: AutomationId,
        placed: &PlacedCondition,
    ) -> impl Future<Output = Result<ConditionId, GreenhubError>> + Send;

    /// Rewrite the row `id` of `automation_id` in place.
    ///
    /// Returns [`GreenhubError::NotFound`] when no such row belongs to
    /// `automation_id`, e.g. it was deleted behind the caller's back.
    fn update(
        &self,
        id: ConditionId,
        automation_id: AutomationId,
        placed: &PlacedCondition,
    ) -> impl Future<Output = Result<(), GreenhubError>> + Send;

    fn delete(&self, id: ConditionId) -> impl Future<Output = Result<(), GreenhubError>> + Send;

    /// Every condition of `automation_id`, ordered by bucket then position.
    fn find_by_automation(
        &self,
        automation_id: AutomationId,
    ) -> impl Future<Output = Result<Vec<PlacedCondition>, GreenhubError>> + Send;
}

impl<T: ConditionRepository + Send + Sync> ConditionRepository for Arc<T> {
    fn create(
        &self,
        automation_id: AutomationId,
        placed: &PlacedCondition,
    ) -> impl Future<Output = Result<ConditionId, GreenhubError>> + Send {
        (**self).create(automation_id, placed)
    }

    fn update(
        &self,
        id: ConditionId,
        automation_id: AutomationId,
        placed: &PlacedCondition,
    ) -> impl Future<Output = Result<(), GreenhubError>> + Send {
        (**self).update(id, automation_id, placed)
    }

    fn delete(&self, id: ConditionId) -> impl Future<Output = Result<(), GreenhubError>> + Send {
        (**self).delete(id)
    }

    fn find_by_automation(
        &self,
        automation_id: AutomationId,
    ) -> impl Future<Output = Result<Vec<PlacedCondition>, GreenhubError>> + Send {
        (**self).find_by_automation(automation_id)
    }
}
