//! Condition: an atomic predicate over a sensor reading, an output value or the clock.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::{ConditionId, OutputId, SensorId};
use crate::snapshot::{EvaluationContext, ReadingType};
use crate::time::TimeWindow;

/// Comparison applied between a resolved value and a condition's threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Equal,
    NotEqual,
    Greater,
    Less,
    GreaterOrEqual,
    LessOrEqual,
}

impl Operator {
    pub const ALL: [Self; 6] = [
        Self::Equal,
        Self::NotEqual,
        Self::Greater,
        Self::Less,
        Self::GreaterOrEqual,
        Self::LessOrEqual,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::NotEqual => "notEqual",
            Self::Greater => "greater",
            Self::Less => "less",
            Self::GreaterOrEqual => "greaterOrEqual",
            Self::LessOrEqual => "lessOrEqual",
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Greater => ">",
            Self::Less => "<",
            Self::GreaterOrEqual => ">=",
            Self::LessOrEqual => "<=",
        }
    }

    /// Compare `lhs` against `rhs`.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn compare(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::Equal => lhs == rhs,
            Self::NotEqual => lhs != rhs,
            Self::Greater => lhs > rhs,
            Self::Less => lhs < rhs,
            Self::GreaterOrEqual => lhs >= rhs,
            Self::LessOrEqual => lhs <= rhs,
        }
    }

    /// Compare a possibly unresolved value. An absent value is always `false`,
    /// whatever the operator.
    #[must_use]
    pub fn evaluate(self, current: Option<f64>, comparison_value: f64) -> bool {
        current.is_some_and(|lhs| self.compare(lhs, comparison_value))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownVariant {
                field: "operator",
                value: s.to_string(),
            })
    }
}

/// Which family of predicate a condition belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    Sensor,
    Output,
    Time,
}

impl ConditionKind {
    pub const ALL: [Self; 3] = [Self::Sensor, Self::Output, Self::Time];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sensor => "sensor",
            Self::Output => "output",
            Self::Time => "time",
        }
    }
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConditionKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownVariant {
                field: "condition kind",
                value: s.to_string(),
            })
    }
}

/// The test a condition performs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    /// Compares the latest reading of one sensor.
    Sensor {
        sensor_id: SensorId,
        reading_type: ReadingType,
        operator: Operator,
        value: f64,
    },
    /// Compares the current value (0 to 100) of one output.
    Output {
        output_id: OutputId,
        operator: Operator,
        value: f64,
    },
    /// Holds while the clock is inside the window.
    Time { window: TimeWindow },
}

impl Predicate {
    #[must_use]
    pub fn kind(&self) -> ConditionKind {
        match self {
            Self::Sensor { .. } => ConditionKind::Sensor,
            Self::Output { .. } => ConditionKind::Output,
            Self::Time { .. } => ConditionKind::Time,
        }
    }

    /// Evaluate against a snapshot. Unresolvable left-hand values fail closed.
    #[must_use]
    pub fn evaluate(&self, ctx: &EvaluationContext<'_>) -> bool {
        match self {
            Self::Sensor {
                sensor_id,
                reading_type,
                operator,
                value,
            } => operator.evaluate(ctx.sensors.reading(*sensor_id, *reading_type), *value),
            Self::Output {
                output_id,
                operator,
                value,
            } => operator.evaluate(ctx.outputs.value(*output_id), *value),
            Self::Time { window } => window.contains(ctx.now),
        }
    }
}

/// A predicate plus its persisted identity. `id` is `None` until stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ConditionId>,
    pub predicate: Predicate,
}

impl Condition {
    #[must_use]
    pub fn new(predicate: Predicate) -> Self {
        Self {
            id: None,
            predicate,
        }
    }

    #[must_use]
    pub fn sensor(
        sensor_id: SensorId,
        reading_type: ReadingType,
        operator: Operator,
        value: f64,
    ) -> Self {
        Self::new(Predicate::Sensor {
            sensor_id,
            reading_type,
            operator,
            value,
        })
    }

    #[must_use]
    pub fn output(output_id: OutputId, operator: Operator, value: f64) -> Self {
        Self::new(Predicate::Output {
            output_id,
            operator,
            value,
        })
    }

    #[must_use]
    pub fn time(window: TimeWindow) -> Self {
        Self::new(Predicate::Time { window })
    }

    #[must_use]
    pub fn with_id(mut self, id: ConditionId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn kind(&self) -> ConditionKind {
        self.predicate.kind()
    }

    /// Check that the comparison value is a finite number.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NonFiniteComparison`] for `NaN` or infinite thresholds.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.predicate {
            Predicate::Sensor { value, .. } | Predicate::Output { value, .. }
                if !value.is_finite() =>
            {
                Err(ValidationError::NonFiniteComparison)
            }
            _ => Ok(()),
        }
    }

    #[must_use]
    pub fn evaluate(&self, ctx: &EvaluationContext<'_>) -> bool {
        self.predicate.evaluate(ctx)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.predicate {
            Predicate::Sensor {
                sensor_id,
                reading_type,
                operator,
                value,
            } => write!(
                f,
                "sensor({sensor_id}.{reading_type} {} {value})",
                operator.symbol()
            ),
            Predicate::Output {
                output_id,
                operator,
                value,
            } => write!(f, "output({output_id} {} {value})", operator.symbol()),
            Predicate::Time { window } => write!(f, "time({window})"),
        }
    }
}
