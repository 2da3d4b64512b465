//! Control loop: one evaluation pass over every output that has automations.

use greenhub_domain::error::GreenhubError;
use greenhub_domain::id::OutputId;
use greenhub_domain::snapshot::EvaluationContext;
use greenhub_domain::time::TimeOfDay;

use crate::automation_registry::AutomationRegistry;
use crate::ports::{AutomationRepository, ConditionRepository, OutputWriter, SnapshotSource};

/// Reads one snapshot per tick, evaluates each registry against it, and
/// writes the outputs whose decided value differs from their current one.
pub struct ControlLoop<AR, CR, S, W> {
    registries: Vec<AutomationRegistry<AR, CR>>,
    source: S,
    writer: W,
}

impl<AR, CR, S, W> ControlLoop<AR, CR, S, W>
where
    AR: AutomationRepository,
    CR: ConditionRepository,
    S: SnapshotSource,
    W: OutputWriter,
{
    pub fn new(registries: Vec<AutomationRegistry<AR, CR>>, source: S, writer: W) -> Self {
        Self {
            registries,
            source,
            writer,
        }
    }

    pub fn registries(&self) -> &[AutomationRegistry<AR, CR>] {
        &self.registries
    }

    /// The registry deciding `output_id`, if any.
    pub fn registry(&self, output_id: OutputId) -> Option<&AutomationRegistry<AR, CR>> {
        self.registries
            .iter()
            .find(|registry| registry.owner() == output_id)
    }

    /// Reload every registry from storage. Returns the total automation count.
    ///
    /// # Errors
    ///
    /// Returns the first storage error met.
    pub async fn reload(&self) -> Result<usize, GreenhubError> {
        let mut total = 0;
        for registry in &self.registries {
            total += registry.load().await?;
        }
        Ok(total)
    }

    /// Run one pass at wall-clock minute `now` and return the writes that succeeded.
    ///
    /// Outputs whose registry yields no single value are left untouched. A
    /// failed write is logged and does not stop the other outputs.
    ///
    /// # Errors
    ///
    /// Returns the snapshot error.
    #[tracing::instrument(skip(self), fields(now = %now))]
    pub async fn tick(&self, now: TimeOfDay) -> Result<Vec<(OutputId, u8)>, GreenhubError> {
        let (sensors, outputs) = self.source.snapshot().await?;
        let ctx = EvaluationContext::new(&sensors, &outputs, now);

        let changes: Vec<(OutputId, u8)> = self
            .registries
            .iter()
            .filter_map(|registry| {
                let value = registry.evaluate(&ctx)?;
                let current = outputs.value(registry.owner());
                (current != Some(f64::from(value))).then_some((registry.owner(), value))
            })
            .collect();

        let mut written = Vec::with_capacity(changes.len());
        for (output_id, value) in changes {
            match self.writer.set_value(output_id, value).await {
                Ok(()) => {
                    tracing::info!(%output_id, value, "output updated");
                    written.push((output_id, value));
                }
                Err(err) => tracing::warn!(%output_id, value, error = %err, "failed to update output"),
            }
        }
        Ok(written)
    }
}
