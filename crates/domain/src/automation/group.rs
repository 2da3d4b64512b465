//! Condition group: `allOf` / `anyOf` / `oneOf` buckets and how they combine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::condition::{Condition, ConditionKind};
use crate::error::ValidationError;
use crate::snapshot::EvaluationContext;

/// The bucket a condition belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GroupType {
    /// Every condition must hold.
    AllOf,
    /// At least one condition must hold.
    AnyOf,
    /// Exactly one condition must hold.
    OneOf,
}

impl GroupType {
    pub const ALL: [Self; 3] = [Self::AllOf, Self::AnyOf, Self::OneOf];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AllOf => "allOf",
            Self::AnyOf => "anyOf",
            Self::OneOf => "oneOf",
        }
    }
}

impl fmt::Display for GroupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|group| group.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownVariant {
                field: "group type",
                value: s.to_string(),
            })
    }
}

/// How the three bucket results are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionOperator {
    #[default]
    And,
    Or,
}

impl ConditionOperator {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }

    /// The result an empty bucket takes so that it does not influence the
    /// combination: `true` under `and`, `false` under `or`.
    #[must_use]
    pub fn neutral(self) -> bool {
        self == Self::And
    }

    #[must_use]
    pub fn combine(self, results: [bool; 3]) -> bool {
        match self {
            Self::And => results.into_iter().all(|r| r),
            Self::Or => results.into_iter().any(|r| r),
        }
    }
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConditionOperator {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "and" => Ok(Self::And),
            "or" => Ok(Self::Or),
            other => Err(ValidationError::UnknownVariant {
                field: "condition operator",
                value: other.to_string(),
            }),
        }
    }
}

/// A condition together with where it sits: its bucket and its index in that bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedCondition {
    pub group: GroupType,
    pub position: usize,
    pub condition: Condition,
}

/// Heterogeneous conditions partitioned into the three buckets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionGroup {
    #[serde(default)]
    pub all_of: Vec<Condition>,
    #[serde(default)]
    pub any_of: Vec<Condition>,
    #[serde(default)]
    pub one_of: Vec<Condition>,
}

impl ConditionGroup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, group: GroupType, condition: Condition) {
        self.bucket_mut(group).push(condition);
    }

    /// Builder-style variant of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, group: GroupType, condition: Condition) -> Self {
        self.insert(group, condition);
        self
    }

    #[must_use]
    pub fn bucket(&self, group: GroupType) -> &[Condition] {
        match group {
            GroupType::AllOf => &self.all_of,
            GroupType::AnyOf => &self.any_of,
            GroupType::OneOf => &self.one_of,
        }
    }

    pub fn bucket_mut(&mut self, group: GroupType) -> &mut Vec<Condition> {
        match group {
            GroupType::AllOf => &mut self.all_of,
            GroupType::AnyOf => &mut self.any_of,
            GroupType::OneOf => &mut self.one_of,
        }
    }

    /// Every condition tagged with its bucket.
    pub fn iter(&self) -> impl Iterator<Item = (GroupType, &Condition)> {
        GroupType::ALL
            .into_iter()
            .flat_map(move |group| self.bucket(group).iter().map(move |c| (group, c)))
    }

    /// Every condition with its bucket and position, cloned.
    pub fn placed(&self) -> impl Iterator<Item = PlacedCondition> + '_ {
        GroupType::ALL.into_iter().flat_map(move |group| {
            self.bucket(group)
                .iter()
                .enumerate()
                .map(move |(position, condition)| PlacedCondition {
                    group,
                    position,
                    condition: condition.clone(),
                })
        })
    }

    /// The same group with every condition id cleared, as if never persisted.
    #[must_use]
    pub fn without_ids(mut self) -> Self {
        for group in GroupType::ALL {
            for condition in self.bucket_mut(group) {
                condition.id = None;
            }
        }
        self
    }

    /// Conditions of one kind inside one bucket, e.g. every sensor condition of `allOf`.
    pub fn of_kind(
        &self,
        kind: ConditionKind,
        group: GroupType,
    ) -> impl Iterator<Item = &Condition> {
        self.bucket(group).iter().filter(move |c| c.kind() == kind)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.all_of.len() + self.any_of.len() + self.one_of.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validate every condition.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] raised by a condition.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.iter().try_for_each(|(_, condition)| condition.validate())
    }

    /// Combine all buckets under `operator`.
    ///
    /// A group without any condition is unconditionally `true`. Otherwise an
    /// empty bucket takes [`ConditionOperator::neutral`], a non-empty `allOf`
    /// needs every condition, `anyOf` at least one, and `oneOf` exactly one.
    #[must_use]
    pub fn evaluate(&self, operator: ConditionOperator, ctx: &EvaluationContext<'_>) -> bool {
        if self.is_empty() {
            return true;
        }
        operator.combine(self.bucket_results(operator, ctx).map(|(_, result)| result))
    }

    /// Result of each bucket, in `allOf`, `anyOf`, `oneOf` order.
    #[must_use]
    pub fn bucket_results(
        &self,
        operator: ConditionOperator,
        ctx: &EvaluationContext<'_>,
    ) -> [(GroupType, bool); 3] {
        GroupType::ALL.map(|group| {
            let result = bucket_result(group, self.bucket(group), operator.neutral(), ctx);
            (group, result)
        })
    }
}

/// Rebuilds a group from placed conditions in any order. Conditions are
/// sorted by bucket then position; gaps in positions are closed.
impl FromIterator<PlacedCondition> for ConditionGroup {
    fn from_iter<I: IntoIterator<Item = PlacedCondition>>(iter: I) -> Self {
        let mut placed: Vec<PlacedCondition> = iter.into_iter().collect();
        placed.sort_by_key(|p| (p.group, p.position));
        let mut group = Self::new();
        for p in placed {
            group.insert(p.group, p.condition);
        }
        group
    }
}

fn bucket_result(
    group: GroupType,
    conditions: &[Condition],
    neutral: bool,
    ctx: &EvaluationContext<'_>,
) -> bool {
    if conditions.is_empty() {
        return neutral;
    }
    let mut hits = conditions.iter().map(|condition| condition.evaluate(ctx));
    match group {
        GroupType::AllOf => hits.all(|hit| hit),
        GroupType::AnyOf => hits.any(|hit| hit),
        // a second hit flips the bucket back to false
        GroupType::OneOf => hits.filter(|hit| *hit).take(2).count() == 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::condition::Operator;
    use crate::id::{OutputId, SensorId};
    use crate::snapshot::{OutputSnapshot, ReadingType, SensorSnapshot};
    use crate::time::{TimeOfDay, TimeWindow};

    /// Fixed snapshot with one output at 50, so `pass()` / `fail()` build
    /// conditions with a known outcome.
    struct Fixture {
        output: OutputId,
        sensors: SensorSnapshot,
        outputs: OutputSnapshot,
    }

    impl Fixture {
        fn new() -> Self {
            let output = OutputId::new();
            Self {
                output,
                sensors: SensorSnapshot::new(),
                outputs: OutputSnapshot::new().with(output, 50.0),
            }
        }

        fn ctx(&self) -> EvaluationContext<'_> {
            EvaluationContext::new(&self.sensors, &self.outputs, TimeOfDay::MIDNIGHT)
        }

        fn pass(&self) -> Condition {
            Condition::output(self.output, Operator::Equal, 50.0)
        }

        fn fail(&self) -> Condition {
            Condition::output(self.output, Operator::Greater, 50.0)
        }

        fn group(&self, all_of: &[bool], any_of: &[bool], one_of: &[bool]) -> ConditionGroup {
            let pick = |hit: &bool| if *hit { self.pass() } else { self.fail() };
            ConditionGroup {
                all_of: all_of.iter().map(pick).collect(),
                any_of: any_of.iter().map(pick).collect(),
                one_of: one_of.iter().map(pick).collect(),
            }
        }
    }

    #[test]
    fn should_be_true_when_group_has_no_conditions() {
        let fx = Fixture::new();
        let group = ConditionGroup::new();
        assert!(group.evaluate(ConditionOperator::And, &fx.ctx()));
        assert!(group.evaluate(ConditionOperator::Or, &fx.ctx()));
    }

    #[test]
    fn should_treat_empty_buckets_as_neutral_under_or() {
        let fx = Fixture::new();
        let ctx = fx.ctx();
        assert!(fx.group(&[true, true], &[], &[]).evaluate(ConditionOperator::Or, &ctx));
        assert!(!fx.group(&[true, false], &[], &[]).evaluate(ConditionOperator::Or, &ctx));
    }

    #[test]
    fn should_treat_empty_buckets_as_neutral_under_and() {
        let fx = Fixture::new();
        let ctx = fx.ctx();
        assert!(fx.group(&[], &[false, true], &[]).evaluate(ConditionOperator::And, &ctx));
        assert!(!fx.group(&[], &[false, false], &[]).evaluate(ConditionOperator::And, &ctx));
    }

    #[test]
    fn should_require_every_condition_in_all_of() {
        let fx = Fixture::new();
        let ctx = fx.ctx();
        assert!(fx.group(&[true, true, true], &[], &[]).evaluate(ConditionOperator::And, &ctx));
        assert!(!fx.group(&[true, false, true], &[], &[]).evaluate(ConditionOperator::And, &ctx));
    }

    #[test]
    fn should_require_exactly_one_hit_in_one_of() {
        let fx = Fixture::new();
        let ctx = fx.ctx();
        let op = ConditionOperator::And;
        assert!(fx.group(&[], &[], &[false, true, false]).evaluate(op, &ctx));
        assert!(!fx.group(&[], &[], &[true, true, false]).evaluate(op, &ctx));
        assert!(!fx.group(&[], &[], &[false, false]).evaluate(op, &ctx));
    }

    #[test]
    fn should_and_all_bucket_results() {
        let fx = Fixture::new();
        let ctx = fx.ctx();
        let op = ConditionOperator::And;
        assert!(fx.group(&[true], &[false, true], &[true]).evaluate(op, &ctx));
        assert!(!fx.group(&[true], &[false, true], &[true, true]).evaluate(op, &ctx));
    }

    #[test]
    fn should_or_all_bucket_results() {
        let fx = Fixture::new();
        let ctx = fx.ctx();
        let op = ConditionOperator::Or;
        assert!(fx.group(&[false], &[false], &[true]).evaluate(op, &ctx));
        assert!(!fx.group(&[false], &[false], &[true, true]).evaluate(op, &ctx));
    }

    #[test]
    fn should_report_neutral_result_for_empty_buckets() {
        let fx = Fixture::new();
        let ctx = fx.ctx();
        let group = fx.group(&[true], &[], &[]);
        assert_eq!(
            group.bucket_results(ConditionOperator::Or, &ctx),
            [
                (GroupType::AllOf, true),
                (GroupType::AnyOf, false),
                (GroupType::OneOf, false)
            ]
        );
        assert_eq!(
            group.bucket_results(ConditionOperator::And, &ctx)[2],
            (GroupType::OneOf, true)
        );
    }

    #[test]
    fn should_mix_condition_kinds_within_a_bucket() {
        let sensor = SensorId::new();
        let output = OutputId::new();
        let sensors = SensorSnapshot::new().with(sensor, ReadingType::Temperature, "30");
        let outputs = OutputSnapshot::new().with(output, 0.0);
        let ctx = EvaluationContext::new(&sensors, &outputs, "14:00".parse().unwrap());

        let group = ConditionGroup::new()
            .with(
                GroupType::AllOf,
                Condition::sensor(sensor, ReadingType::Temperature, Operator::Greater, 28.0),
            )
            .with(GroupType::AllOf, Condition::output(output, Operator::Equal, 0.0))
            .with(
                GroupType::AllOf,
                Condition::time(TimeWindow::parse(Some("08:00"), Some("20:00")).unwrap()),
            );
        assert!(group.evaluate(ConditionOperator::And, &ctx));

        let late = EvaluationContext::new(&sensors, &outputs, "21:00".parse().unwrap());
        assert!(!group.evaluate(ConditionOperator::And, &late));
    }

    #[test]
    fn should_query_conditions_by_kind_and_bucket() {
        let group = ConditionGroup::new()
            .with(
                GroupType::AllOf,
                Condition::sensor(SensorId::new(), ReadingType::Humidity, Operator::Less, 40.0),
            )
            .with(GroupType::AllOf, Condition::time(TimeWindow::ALWAYS))
            .with(
                GroupType::AnyOf,
                Condition::sensor(SensorId::new(), ReadingType::Humidity, Operator::Less, 30.0),
            );
        assert_eq!(group.of_kind(ConditionKind::Sensor, GroupType::AllOf).count(), 1);
        assert_eq!(group.of_kind(ConditionKind::Time, GroupType::AllOf).count(), 1);
        assert_eq!(group.of_kind(ConditionKind::Output, GroupType::AllOf).count(), 0);
        assert_eq!(group.len(), 3);
        assert_eq!(
            group.iter().map(|(g, _)| g).collect::<Vec<_>>(),
            vec![GroupType::AllOf, GroupType::AllOf, GroupType::AnyOf]
        );
    }

    #[test]
    fn should_rebuild_group_from_shuffled_placed_conditions() {
        let fx = Fixture::new();
        let group = ConditionGroup::new()
            .with(GroupType::OneOf, fx.fail())
            .with(GroupType::AllOf, fx.pass())
            .with(GroupType::AllOf, Condition::time(TimeWindow::ALWAYS))
            .with(GroupType::OneOf, fx.pass());
        let mut placed: Vec<_> = group.placed().collect();
        placed.reverse();
        let rebuilt: ConditionGroup = placed.into_iter().collect();
        assert_eq!(rebuilt, group);
    }

    #[test]
    fn should_clear_ids_when_requested() {
        let fx = Fixture::new();
        let group = ConditionGroup::new()
            .with(GroupType::AnyOf, fx.pass().with_id(crate::id::ConditionId::new()));
        assert!(group.without_ids().any_of[0].id.is_none());
    }

    #[test]
    fn should_parse_group_type_and_operator_wire_names() {
        assert_eq!("oneOf".parse::<GroupType>().unwrap(), GroupType::OneOf);
        assert_eq!("or".parse::<ConditionOperator>().unwrap(), ConditionOperator::Or);
        assert!("xor".parse::<ConditionOperator>().is_err());
        assert_eq!(serde_json::to_string(&GroupType::AnyOf).unwrap(), "\"anyOf\"");
    }

    #[test]
    fn should_deserialize_group_with_missing_buckets() {
        let group: ConditionGroup = serde_json::from_str(r#"{"allOf": []}"#).unwrap();
        assert!(group.is_empty());
    }
}
