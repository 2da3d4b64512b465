//! Automation repository port: persistence for automation rows.

use std::future::Future;
use std::sync::Arc;

use greenhub_domain::automation::{Automation, AutomationDraft};
use greenhub_domain::error::GreenhubError;
use greenhub_domain::id::{AutomationId, OutputId};

/// Repository for the automation rows of each output.
///
/// Conditions live behind [`ConditionRepository`](super::ConditionRepository);
/// automations returned here carry empty rule groups.
pub trait AutomationRepository {
    /// Persist a new automation owned by `output_id` and return its id.
    ///
    /// The draft's `rules` are ignored.
    fn create(
        &self,
        output_id: OutputId,
        draft: &AutomationDraft,
    ) -> impl Future<Output = Result<AutomationId, GreenhubError>> + Send;

    /// Overwrite the name, value, operator and window of an existing automation.
    ///
    /// Fails with [`GreenhubError::NotFound`] when `id` is unknown.
    fn update(
        &self,
        id: AutomationId,
        draft: &AutomationDraft,
    ) -> impl Future<Output = Result<(), GreenhubError>> + Send;

    /// Delete an automation together with its conditions.
    fn delete(&self, id: AutomationId) -> impl Future<Output = Result<(), GreenhubError>> + Send;

    /// All automations owned by `output_id`, without conditions.
    fn find_by_output(
        &self,
        output_id: OutputId,
    ) -> impl Future<Output = Result<Vec<Automation>, GreenhubError>> + Send;
}

impl<T: AutomationRepository + Send + Sync> AutomationRepository for Arc<T> {
    fn create(
        &self,
        output_id: OutputId,
        draft: &AutomationDraft,
    ) -> impl Future<Output = Result<AutomationId, GreenhubError>> + Send {
        (**self).create(output_id, draft)
    }

    fn update(
        &self,
        id: AutomationId,
        draft: &AutomationDraft,
    ) -> impl Future<Output = Result<(), GreenhubError>> + Send {
        (**self).update(id, draft)
    }

    fn delete(&self, id: AutomationId) -> impl Future<Output = Result<(), GreenhubError>> + Send {
        (**self).delete(id)
    }

    fn find_by_output(
        &self,
        output_id: OutputId,
    ) -> impl Future<Output = Result<Vec<Automation>, GreenhubError>> + Send {
        (**self).find_by_output(output_id)
    }
}
