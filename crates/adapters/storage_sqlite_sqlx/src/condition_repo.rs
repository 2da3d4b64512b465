//! `SQLite` implementation of [`ConditionRepository`].
//!
//! Every predicate variant shares one `conditions` table; columns that do not
//! apply to a row's `kind` stay `NULL`.

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use greenhub_app::ports::ConditionRepository;
use greenhub_domain::automation::{
    Condition, ConditionKind, GroupType, Operator, PlacedCondition, Predicate,
};
use greenhub_domain::error::{GreenhubError, NotFoundError};
use greenhub_domain::id::{AutomationId, ConditionId, OutputId, SensorId};
use greenhub_domain::snapshot::ReadingType;
use greenhub_domain::time::TimeWindow;

use crate::decode;
use crate::error::StorageError;

/// A column required by the row's kind was `NULL`.
#[derive(Debug, thiserror::Error)]
#[error("column {column} is required for {kind} conditions")]
struct MissingColumn {
    column: &'static str,
    kind: ConditionKind,
}

fn required<'r, T>(row: &'r SqliteRow, column: &'static str, kind: ConditionKind) -> Result<T, sqlx::Error>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get::<Option<T>, _>(column)?
        .ok_or_else(|| decode(MissingColumn { column, kind }))
}

fn parse_required<T>(row: &SqliteRow, column: &'static str, kind: ConditionKind) -> Result<T, sqlx::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = required(row, column, kind)?;
    raw.parse().map_err(decode)
}

struct Wrapper(PlacedCondition);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let group: String = row.try_get("group_type")?;
        let position: i64 = row.try_get("position")?;
        let kind: String = row.try_get("kind")?;

        let kind = ConditionKind::from_str(&kind).map_err(decode)?;
        let predicate = match kind {
            ConditionKind::Sensor => Predicate::Sensor {
                sensor_id: parse_required::<SensorId>(row, "sensor_id", kind)?,
                reading_type: parse_required::<ReadingType>(row, "reading_type", kind)?,
                operator: parse_required::<Operator>(row, "operator", kind)?,
                value: required(row, "comparison_value", kind)?,
            },
            ConditionKind::Output => Predicate::Output {
                output_id: parse_required::<OutputId>(row, "output_id", kind)?,
                operator: parse_required::<Operator>(row, "operator", kind)?,
                value: required(row, "comparison_value", kind)?,
            },
            ConditionKind::Time => {
                let start_time: Option<String> = row.try_get("start_time")?;
                let end_time: Option<String> = row.try_get("end_time")?;
                Predicate::Time {
                    window: TimeWindow::parse(start_time.as_deref(), end_time.as_deref())
                        .map_err(decode)?,
                }
            }
        };

        Ok(Self(PlacedCondition {
            group: GroupType::from_str(&group).map_err(decode)?,
            position: usize::try_from(position).map_err(decode)?,
            condition: Condition::new(predicate)
                .with_id(ConditionId::from_str(&id).map_err(decode)?),
        }))
    }
}

/// Column values of one predicate, `None` where the kind has no such field.
#[derive(Default)]
struct Columns {
    sensor_id: Option<String>,
    reading_type: Option<&'static str>,
    output_id: Option<String>,
    operator: Option<&'static str>,
    comparison_value: Option<f64>,
    start_time: Option<String>,
    end_time: Option<String>,
}

impl From<&Predicate> for Columns {
    fn from(predicate: &Predicate) -> Self {
        match predicate {
            Predicate::Sensor {
                sensor_id,
                reading_type,
                operator,
                value,
            } => Self {
                sensor_id: Some(sensor_id.to_string()),
                reading_type: Some(reading_type.as_str()),
                operator: Some(operator.as_str()),
                comparison_value: Some(*value),
                ..Self::default()
            },
            Predicate::Output {
                output_id,
                operator,
                value,
            } => Self {
                output_id: Some(output_id.to_string()),
                operator: Some(operator.as_str()),
                comparison_value: Some(*value),
                ..Self::default()
            },
            Predicate::Time { window } => Self {
                start_time: window.start_time.map(|t| t.to_string()),
                end_time: window.end_time.map(|t| t.to_string()),
                ..Self::default()
            },
        }
    }
}

const INSERT: &str = r"
    INSERT INTO conditions (
        id, automation_id, group_type, position, kind,
        sensor_id, reading_type, output_id, operator, comparison_value, start_time, end_time
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
";

const UPDATE: &str = r"
    UPDATE conditions
    SET group_type = ?, position = ?, kind = ?,
        sensor_id = ?, reading_type = ?, output_id = ?, operator = ?, comparison_value = ?,
        start_time = ?, end_time = ?
    WHERE id = ? AND automation_id = ?
";

const DELETE: &str = "DELETE FROM conditions WHERE id = ?";

const SELECT_BY_AUTOMATION: &str = r"
    SELECT * FROM conditions
    WHERE automation_id = ?
    ORDER BY CASE group_type WHEN 'allOf' THEN 0 WHEN 'anyOf' THEN 1 ELSE 2 END, position
";

/// `SQLite`-backed condition repository.
#[derive(Clone)]
pub struct SqliteConditionRepository {
    pool: SqlitePool,
}

impl SqliteConditionRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl ConditionRepository for SqliteConditionRepository {
    async fn create(
        &self,
        automation_id: AutomationId,
        placed: &PlacedCondition,
    ) -> Result<ConditionId, GreenhubError> {
        let id = ConditionId::new();
        let position = i64::try_from(placed.position).map_err(StorageError::from)?;
        let predicate = &placed.condition.predicate;
        let columns = Columns::from(predicate);

        sqlx::query(INSERT)
            .bind(id.to_string())
            .bind(automation_id.to_string())
            .bind(placed.group.as_str())
            .bind(position)
            .bind(predicate.kind().as_str())
            .bind(columns.sensor_id)
            .bind(columns.reading_type)
            .bind(columns.output_id)
            .bind(columns.operator)
            .bind(columns.comparison_value)
            .bind(columns.start_time)
            .bind(columns.end_time)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(id)
    }

    async fn update(
        &self,
        id: ConditionId,
        automation_id: AutomationId,
        placed: &PlacedCondition,
    ) -> Result<(), GreenhubError> {
        let position = i64::try_from(placed.position).map_err(StorageError::from)?;
        let predicate = &placed.condition.predicate;
        let columns = Columns::from(predicate);

        let result = sqlx::query(UPDATE)
            .bind(placed.group.as_str())
            .bind(position)
            .bind(predicate.kind().as_str())
            .bind(columns.sensor_id)
            .bind(columns.reading_type)
            .bind(columns.output_id)
            .bind(columns.operator)
            .bind(columns.comparison_value)
            .bind(columns.start_time)
            .bind(columns.end_time)
            .bind(id.to_string())
            .bind(automation_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError {
                entity: "Condition",
                id: id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn delete(&self, id: ConditionId) -> Result<(), GreenhubError> {
        sqlx::query(DELETE)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }

    async fn find_by_automation(
        &self,
        automation_id: AutomationId,
    ) -> Result<Vec<PlacedCondition>, GreenhubError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_BY_AUTOMATION)
            .bind(automation_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}
