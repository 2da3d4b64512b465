//! Automation: a condition group paired with a target output value.
//!
//! An automation owns one [`ConditionGroup`], combines its buckets with a
//! [`ConditionOperator`], and is gated by its own optional [`TimeWindow`]
//! (distinct from any time condition inside the group). When it fires, the
//! output it belongs to should take its `value`.

mod condition;
mod diff;
mod group;

pub use condition::{Condition, ConditionKind, Operator, Predicate};
pub use diff::ConditionDiff;
pub use group::{ConditionGroup, ConditionOperator, GroupType, PlacedCondition};

use serde::{Deserialize, Serialize};

use crate::error::{GreenhubError, ValidationError};
use crate::id::{AutomationId, OutputId};
use crate::snapshot::EvaluationContext;
use crate::time::{TimeOfDay, TimeWindow};

/// Highest value an output can be driven to.
pub const MAX_VALUE: u8 = 100;

/// A persisted automation, fully hydrated with its conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Automation {
    pub id: AutomationId,
    /// Output whose value this automation decides.
    pub output_id: OutputId,
    pub name: String,
    /// Target output value, 0 to 100.
    pub value: u8,
    pub operator: ConditionOperator,
    pub rules: ConditionGroup,
    #[serde(flatten)]
    pub window: TimeWindow,
}

impl Automation {
    /// Attach a persisted identity to a draft.
    #[must_use]
    pub fn from_draft(id: AutomationId, output_id: OutputId, draft: AutomationDraft) -> Self {
        Self {
            id,
            output_id,
            name: draft.name,
            value: draft.value,
            operator: draft.operator,
            rules: draft.rules,
            window: draft.window,
        }
    }

    /// The draft that would recreate (or update) this automation.
    #[must_use]
    pub fn to_draft(&self) -> AutomationDraft {
        AutomationDraft {
            id: Some(self.id),
            name: self.name.clone(),
            value: self.value,
            operator: self.operator,
            rules: self.rules.clone(),
            window: self.window,
        }
    }

    #[must_use]
    pub fn is_active_at(&self, now: TimeOfDay) -> bool {
        self.window.contains(now)
    }

    /// Whether the automation fires: its own window must be active, then its
    /// condition group must hold.
    #[must_use]
    pub fn evaluate(&self, ctx: &EvaluationContext<'_>) -> bool {
        self.is_active_at(ctx.now) && self.rules.evaluate(self.operator, ctx)
    }
}

/// Input of an add or update: an automation that may not be persisted yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationDraft {
    /// `None` for a new automation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<AutomationId>,
    pub name: String,
    pub value: u8,
    #[serde(default)]
    pub operator: ConditionOperator,
    #[serde(default)]
    pub rules: ConditionGroup,
    #[serde(flatten)]
    pub window: TimeWindow,
}

impl AutomationDraft {
    /// Create a builder for constructing an [`AutomationDraft`].
    #[must_use]
    pub fn builder() -> AutomationDraftBuilder {
        AutomationDraftBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`GreenhubError::Validation`] when:
    /// - `name` is blank ([`ValidationError::EmptyName`])
    /// - `value` exceeds 100 ([`ValidationError::ValueOutOfRange`])
    /// - a condition has a non-finite threshold ([`ValidationError::NonFiniteComparison`])
    pub fn validate(&self) -> Result<(), GreenhubError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.value > MAX_VALUE {
            return Err(ValidationError::ValueOutOfRange(u16::from(self.value)).into());
        }
        self.rules.validate()?;
        Ok(())
    }
}

/// Step-by-step builder for [`AutomationDraft`].
#[derive(Debug, Default)]
pub struct AutomationDraftBuilder {
    id: Option<AutomationId>,
    name: Option<String>,
    value: Option<u8>,
    operator: ConditionOperator,
    rules: ConditionGroup,
    window: TimeWindow,
}

impl AutomationDraftBuilder {
    #[must_use]
    pub fn id(mut self, id: AutomationId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn value(mut self, value: u8) -> Self {
        self.value = Some(value);
        self
    }

    #[must_use]
    pub fn operator(mut self, operator: ConditionOperator) -> Self {
        self.operator = operator;
        self
    }

    #[must_use]
    pub fn condition(mut self, group: GroupType, condition: Condition) -> Self {
        self.rules.insert(group, condition);
        self
    }

    #[must_use]
    pub fn rules(mut self, rules: ConditionGroup) -> Self {
        self.rules = rules;
        self
    }

    #[must_use]
    pub fn window(mut self, window: TimeWindow) -> Self {
        self.window = window;
        self
    }

    #[must_use]
    pub fn start_time(mut self, start: TimeOfDay) -> Self {
        self.window.start_time = Some(start);
        self
    }

    #[must_use]
    pub fn end_time(mut self, end: TimeOfDay) -> Self {
        self.window.end_time = Some(end);
        self
    }

    /// Consume the builder, validate, and return an [`AutomationDraft`].
    ///
    /// # Errors
    ///
    /// Returns [`GreenhubError::Validation`] if required fields are missing or invalid.
    pub fn build(self) -> Result<AutomationDraft, GreenhubError> {
        let draft = AutomationDraft {
            id: self.id,
            name: self.name.unwrap_or_default(),
            value: self.value.unwrap_or_default(),
            operator: self.operator,
            rules: self.rules,
            window: self.window,
        };
        draft.validate()?;
        Ok(draft)
    }
}
