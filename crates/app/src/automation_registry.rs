//! Automation registry: the automations deciding one output, cached in memory.
//!
//! Evaluation is synchronous and reads only the in-memory map. Mutations
//! persist through the repositories first, then swap the affected entry, so a
//! concurrent evaluation sees either the old or the new [`Automation`] and
//! never a mix of both.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::future::{join, join_all, try_join_all};
use tokio::sync::Mutex;

use greenhub_domain::automation::{
    Automation, AutomationDraft, ConditionDiff, ConditionGroup, PlacedCondition,
};
use greenhub_domain::error::{GreenhubError, NotFoundError, ValidationError};
use greenhub_domain::id::{AutomationId, OutputId};
use greenhub_domain::snapshot::EvaluationContext;

use crate::ports::{AutomationRepository, ConditionRepository};

/// Result of evaluating every automation of a registry against one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// No automation fired.
    Idle,
    /// Exactly one automation fired.
    Fired { id: AutomationId, value: u8 },
    /// Several automations fired; none of them wins. Ids are sorted.
    Ambiguous(Vec<AutomationId>),
}

impl Evaluation {
    /// The value to apply, only when a single automation fired.
    #[must_use]
    pub fn value(&self) -> Option<u8> {
        match self {
            Self::Fired { value, .. } => Some(*value),
            Self::Idle | Self::Ambiguous(_) => None,
        }
    }
}

/// Outcome of a best-effort batch of condition writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// Two automations of the same output that may fire at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collision {
    pub first: AutomationId,
    pub second: AutomationId,
}

/// What an add or update left in the registry.
#[derive(Debug, Clone)]
pub struct Mutation {
    pub automation: Arc<Automation>,
    pub report: BatchReport,
}

/// Automations of a single output, persisted through the repositories and
/// evaluated from memory.
///
/// Writers are serialised by an internal lock. Readers never wait on it.
pub struct AutomationRegistry<AR, CR> {
    owner: OutputId,
    automation_repo: AR,
    condition_repo: CR,
    entries: RwLock<HashMap<AutomationId, Arc<Automation>>>,
    writer: Mutex<()>,
}

impl<AR, CR> AutomationRegistry<AR, CR> {
    /// Create an empty registry for `owner`. Call [`load`](Self::load) to fill it.
    pub fn new(owner: OutputId, automation_repo: AR, condition_repo: CR) -> Self {
        Self {
            owner,
            automation_repo,
            condition_repo,
            entries: RwLock::new(HashMap::new()),
            writer: Mutex::new(()),
        }
    }

    /// The output these automations decide.
    pub fn owner(&self) -> OutputId {
        self.owner
    }

    pub fn get(&self, id: AutomationId) -> Option<Arc<Automation>> {
        self.read().get(&id).cloned()
    }

    /// Every registered automation, ordered by name.
    pub fn automations(&self) -> Vec<Arc<Automation>> {
        let mut all: Vec<_> = self.read().values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        all
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Evaluate every automation and report which of them fired.
    pub fn evaluate_detailed(&self, ctx: &EvaluationContext<'_>) -> Evaluation {
        let entries = self.read();
        let fired: Vec<&Arc<Automation>> = entries
            .values()
            .filter(|automation| automation.evaluate(ctx))
            .collect();
        match fired.as_slice() {
            [] => Evaluation::Idle,
            [only] => Evaluation::Fired {
                id: only.id,
                value: only.value,
            },
            many => {
                let mut ids: Vec<AutomationId> = many.iter().map(|a| a.id).collect();
                ids.sort_unstable();
                tracing::debug!(
                    output_id = %self.owner,
                    count = ids.len(),
                    "several automations fired, leaving output untouched"
                );
                Evaluation::Ambiguous(ids)
            }
        }
    }

    /// The value of the single automation that fires, or `None` when zero or
    /// several fire.
    pub fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Option<u8> {
        self.evaluate_detailed(ctx).value()
    }

    /// Pairs of automations that could fire together.
    ///
    /// Overlaps are currently settled at evaluation time by refusing to pick a
    /// winner, so nothing is reported here.
    pub fn check_for_collisions(&self) -> Vec<Collision> {
        Vec::new()
    }

    fn contains(&self, id: AutomationId) -> bool {
        self.read().contains_key(&id)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<AutomationId, Arc<Automation>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<AutomationId, Arc<Automation>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<AR: AutomationRepository, CR: ConditionRepository> AutomationRegistry<AR, CR> {
    /// Persist a new automation with its conditions and register it.
    ///
    /// Condition writes are best-effort: a failed write is logged, counted in
    /// the returned [`BatchReport`] and left out of the registered automation.
    ///
    /// # Errors
    ///
    /// Returns [`GreenhubError::Validation`] if the draft is invalid, or the
    /// storage error of the automation row write.
    #[tracing::instrument(skip(self, draft), fields(output_id = %self.owner, automation_name = %draft.name))]
    pub async fn add(&self, mut draft: AutomationDraft) -> Result<Mutation, GreenhubError> {
        draft.validate()?;
        let _writer = self.writer.lock().await;

        let id = self.automation_repo.create(self.owner, &draft).await?;
        let rules = std::mem::take(&mut draft.rules).without_ids();
        let (rules, report) = self
            .apply_diff(id, ConditionDiff::compute([], &rules))
            .await;
        draft.rules = rules;

        let automation = Arc::new(Automation::from_draft(id, self.owner, draft));
        self.write().insert(id, Arc::clone(&automation));
        tracing::info!(automation_id = %id, conditions = automation.rules.len(), "automation added");
        Ok(Mutation { automation, report })
    }

    /// Persist new fields and conditions for a registered automation and swap
    /// its entry.
    ///
    /// Conditions carrying an id are rewritten in place, the others are
    /// inserted, and persisted conditions missing from the draft are deleted
    /// once the writes are done.
    ///
    /// # Errors
    ///
    /// Returns [`GreenhubError::Validation`] if the draft is invalid or has no
    /// id, [`GreenhubError::NotFound`] if the automation is not registered, or
    /// a storage error from the automation row write.
    #[tracing::instrument(skip(self, draft), fields(output_id = %self.owner, automation_id = tracing::field::Empty))]
    pub async fn update(&self, mut draft: AutomationDraft) -> Result<Mutation, GreenhubError> {
        draft.validate()?;
        let id = draft.id.ok_or(ValidationError::MissingId)?;
        tracing::Span::current().record("automation_id", tracing::field::display(id));
        let _writer = self.writer.lock().await;
        if !self.contains(id) {
            return Err(NotFoundError {
                entity: "Automation",
                id: id.to_string(),
            }
            .into());
        }

        self.automation_repo.update(id, &draft).await?;
        let persisted = self.condition_repo.find_by_automation(id).await?;
        let rules = std::mem::take(&mut draft.rules);
        let diff = ConditionDiff::compute(
            persisted.iter().filter_map(|placed| placed.condition.id),
            &rules,
        );
        let (rules, report) = self.apply_diff(id, diff).await;
        draft.rules = rules;

        let automation = Arc::new(Automation::from_draft(id, self.owner, draft));
        self.write().insert(id, Arc::clone(&automation));
        tracing::info!(conditions = automation.rules.len(), "automation updated");
        Ok(Mutation { automation, report })
    }

    /// Delete an automation from storage, then from the registry.
    ///
    /// # Errors
    ///
    /// Returns [`GreenhubError::NotFound`] if the automation is not registered
    /// here, or the storage error of the delete. In both cases the registry is
    /// left untouched.
    #[tracing::instrument(skip(self), fields(output_id = %self.owner))]
    pub async fn delete(&self, id: AutomationId) -> Result<(), GreenhubError> {
        let _writer = self.writer.lock().await;
        if !self.contains(id) {
            return Err(NotFoundError {
                entity: "Automation",
                id: id.to_string(),
            }
            .into());
        }
        self.automation_repo.delete(id).await?;
        self.write().remove(&id);
        tracing::info!("automation deleted");
        Ok(())
    }

    /// Rebuild the registry from storage and return how many automations it holds.
    ///
    /// The new map replaces the old one in a single swap.
    ///
    /// # Errors
    ///
    /// Returns the first storage error met; the registry keeps its previous content.
    #[tracing::instrument(skip(self), fields(output_id = %self.owner))]
    pub async fn load(&self) -> Result<usize, GreenhubError> {
        let _writer = self.writer.lock().await;
        let rows = self.automation_repo.find_by_output(self.owner).await?;
        let repo = &self.condition_repo;
        let hydrated = try_join_all(rows.into_iter().map(|mut automation| async move {
            let placed = repo.find_by_automation(automation.id).await?;
            automation.rules = placed.into_iter().collect();
            Ok::<_, GreenhubError>(Arc::new(automation))
        }))
        .await?;

        let entries: HashMap<AutomationId, Arc<Automation>> = hydrated
            .into_iter()
            .map(|automation| (automation.id, automation))
            .collect();
        let count = entries.len();
        *self.write() = entries;
        tracing::info!(count, "automations loaded");
        Ok(count)
    }

    /// Issue the inserts and updates of `diff` concurrently, then its deletes.
    ///
    /// An update whose row no longer exists is inserted again under a new id.
    ///
    /// Returns the conditions that now describe the automation: every update
    /// that still has a row (written or not) and every insert that received an id.
    async fn apply_diff(
        &self,
        automation_id: AutomationId,
        diff: ConditionDiff,
    ) -> (ConditionGroup, BatchReport) {
        let repo = &self.condition_repo;
        let inserts = diff.inserts.into_iter().map(|mut placed| async move {
            let id = repo.create(automation_id, &placed).await?;
            placed.condition.id = Some(id);
            Ok::<_, GreenhubError>(placed)
        });
        let updates = diff.updates.into_iter().map(|(id, mut placed)| async move {
            let rewritten = repo.update(id, automation_id, &placed).await;
            match rewritten {
                Ok(()) => Ok(placed),
                Err(GreenhubError::NotFound(_)) => {
                    tracing::debug!(%automation_id, condition_id = %id, "condition row missing, inserting it again");
                    let inserted = repo.create(automation_id, &placed).await;
                    match inserted {
                        Ok(new_id) => {
                            placed.condition.id = Some(new_id);
                            Ok(placed)
                        }
                        Err(err) => Err((None, err)),
                    }
                }
                Err(err) => Err((Some(placed), err)),
            }
        });
        let (inserted, updated) = join(join_all(inserts), join_all(updates)).await;

        let mut report = BatchReport::default();
        let mut written: Vec<PlacedCondition> = Vec::with_capacity(inserted.len() + updated.len());
        for result in inserted {
            match result {
                Ok(placed) => {
                    report.succeeded += 1;
                    written.push(placed);
                }
                Err(err) => {
                    report.failed += 1;
                    tracing::warn!(%automation_id, error = %err, "failed to insert condition");
                }
            }
        }
        // a failed rewrite keeps its requested value; a lost row that could
        // not be inserted again is dropped
        for result in updated {
            match result {
                Ok(placed) => {
                    report.succeeded += 1;
                    written.push(placed);
                }
                Err((kept, err)) => {
                    report.failed += 1;
                    tracing::warn!(%automation_id, error = %err, "failed to update condition");
                    written.extend(kept);
                }
            }
        }

        let deleted = join_all(
            diff.deletes
                .into_iter()
                .map(|id| async move { (id, repo.delete(id).await) }),
        )
        .await;
        for (condition_id, result) in deleted {
            match result {
                Ok(()) => report.succeeded += 1,
                Err(err) => {
                    report.failed += 1;
                    tracing::warn!(%automation_id, %condition_id, error = %err, "failed to delete condition");
                }
            }
        }

        (written.into_iter().collect(), report)
    }
}
