//! `SQLite` implementation of [`AutomationRepository`].

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use greenhub_app::ports::AutomationRepository;
use greenhub_domain::automation::{Automation, AutomationDraft, ConditionGroup, ConditionOperator};
use greenhub_domain::error::{GreenhubError, NotFoundError};
use greenhub_domain::id::{AutomationId, OutputId};
use greenhub_domain::time::TimeWindow;

use crate::decode;
use crate::error::StorageError;

/// Wrapper for converting database rows into domain types without polluting
/// domain structs with database concerns.
struct Wrapper(Automation);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let output_id: String = row.try_get("output_id")?;
        let name: String = row.try_get("name")?;
        let value: i64 = row.try_get("value")?;
        let operator: String = row.try_get("condition_operator")?;
        let start_time: Option<String> = row.try_get("start_time")?;
        let end_time: Option<String> = row.try_get("end_time")?;

        Ok(Self(Automation {
            id: AutomationId::from_str(&id).map_err(decode)?,
            output_id: OutputId::from_str(&output_id).map_err(decode)?,
            name,
            value: u8::try_from(value).map_err(decode)?,
            operator: ConditionOperator::from_str(&operator).map_err(decode)?,
            rules: ConditionGroup::new(),
            window: TimeWindow::parse(start_time.as_deref(), end_time.as_deref())
                .map_err(decode)?,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO automations (id, output_id, name, value, condition_operator, start_time, end_time)
    VALUES (?, ?, ?, ?, ?, ?, ?)
";

const UPDATE: &str = r"
    UPDATE automations
    SET name = ?, value = ?, condition_operator = ?, start_time = ?, end_time = ?
    WHERE id = ?
";

const DELETE: &str = "DELETE FROM automations WHERE id = ?";

const SELECT_BY_OUTPUT: &str = "SELECT * FROM automations WHERE output_id = ? ORDER BY name";

/// `SQLite`-backed automation repository.
#[derive(Clone)]
pub struct SqliteAutomationRepository {
    pool: SqlitePool,
}

impl SqliteAutomationRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl AutomationRepository for SqliteAutomationRepository {
    async fn create(
        &self,
        output_id: OutputId,
        draft: &AutomationDraft,
    ) -> Result<AutomationId, GreenhubError> {
        let id = AutomationId::new();
        sqlx::query(INSERT)
            .bind(id.to_string())
            .bind(output_id.to_string())
            .bind(&draft.name)
            .bind(i64::from(draft.value))
            .bind(draft.operator.as_str())
            .bind(draft.window.start_time.map(|t| t.to_string()))
            .bind(draft.window.end_time.map(|t| t.to_string()))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(id)
    }

    async fn update(&self, id: AutomationId, draft: &AutomationDraft) -> Result<(), GreenhubError> {
        let result = sqlx::query(UPDATE)
            .bind(&draft.name)
            .bind(i64::from(draft.value))
            .bind(draft.operator.as_str())
            .bind(draft.window.start_time.map(|t| t.to_string()))
            .bind(draft.window.end_time.map(|t| t.to_string()))
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError {
                entity: "Automation",
                id: id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn delete(&self, id: AutomationId) -> Result<(), GreenhubError> {
        sqlx::query(DELETE)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }

    async fn find_by_output(&self, output_id: OutputId) -> Result<Vec<Automation>, GreenhubError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_BY_OUTPUT)
            .bind(output_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Config;
    use greenhub_domain::time::TimeOfDay;

    async fn setup() -> SqliteAutomationRepository {
        let db = Config::in_memory().build().await.unwrap();
        SqliteAutomationRepository::new(db.pool().clone())
    }

    fn at(s: &str) -> TimeOfDay {
        s.parse().unwrap()
    }

    fn draft(name: &str) -> AutomationDraft {
        AutomationDraft::builder()
            .name(name)
            .value(60)
            .operator(ConditionOperator::Or)
            .start_time(at("07:30"))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_create_and_find_automation_by_output() {
        let repo = setup().await;
        let output = OutputId::new();

        let id = repo.create(output, &draft("Morning mist")).await.unwrap();
        let found = repo.find_by_output(output).await.unwrap();

        assert_eq!(found.len(), 1);
        let auto = &found[0];
        assert_eq!(auto.id, id);
        assert_eq!(auto.output_id, output);
        assert_eq!(auto.name, "Morning mist");
        assert_eq!(auto.value, 60);
        assert_eq!(auto.operator, ConditionOperator::Or);
        assert_eq!(auto.window.start_time, Some(at("07:30")));
        assert!(auto.window.end_time.is_none());
        assert!(auto.rules.is_empty());
    }

    #[tokio::test]
    async fn should_not_return_automations_of_other_outputs() {
        let repo = setup().await;
        repo.create(OutputId::new(), &draft("Elsewhere")).await.unwrap();

        assert!(repo.find_by_output(OutputId::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_overwrite_fields_when_updated() {
        let repo = setup().await;
        let output = OutputId::new();
        let id = repo.create(output, &draft("Before")).await.unwrap();

        let mut next = draft("After");
        next.value = 0;
        next.operator = ConditionOperator::And;
        next.window = TimeWindow::new(Some(at("22:00")), Some(at("02:00")));
        repo.update(id, &next).await.unwrap();

        let found = repo.find_by_output(output).await.unwrap();
        assert_eq!(found[0].name, "After");
        assert_eq!(found[0].value, 0);
        assert_eq!(found[0].operator, ConditionOperator::And);
        assert_eq!(found[0].window, next.window);
    }

    #[tokio::test]
    async fn should_return_not_found_when_updating_missing_automation() {
        let repo = setup().await;

        let result = repo.update(AutomationId::new(), &draft("Ghost")).await;

        assert!(matches!(result, Err(GreenhubError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_delete_automation() {
        let repo = setup().await;
        let output = OutputId::new();
        let id = repo.create(output, &draft("Short lived")).await.unwrap();

        repo.delete(id).await.unwrap();

        assert!(repo.find_by_output(output).await.unwrap().is_empty());
    }
}
