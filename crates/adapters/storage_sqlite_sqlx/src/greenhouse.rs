//! `SQLite` implementation of [`SnapshotSource`] and [`OutputWriter`].
//!
//! Sensor readings are append-only; the snapshot keeps the latest row per
//! sensor and reading type. Outputs hold their current value in place.

use std::str::FromStr;

use sqlx::SqlitePool;

use greenhub_app::ports::{OutputWriter, SnapshotSource};
use greenhub_domain::error::{GreenhubError, NotFoundError};
use greenhub_domain::id::{OutputId, SensorId};
use greenhub_domain::snapshot::{OutputSnapshot, ReadingType, SensorSnapshot};
use greenhub_domain::time::Timestamp;

use crate::error::StorageError;

// SQLite fills bare columns of a MAX() aggregate from the row holding the maximum.
const SELECT_LATEST_READINGS: &str = r"
    SELECT sensor_id, reading_type, value, MAX(recorded_at) AS recorded_at
    FROM sensor_readings
    GROUP BY sensor_id, reading_type
";

const INSERT_READING: &str = r"
    INSERT INTO sensor_readings (sensor_id, reading_type, value, recorded_at)
    VALUES (?, ?, ?, ?)
";

const DELETE_READINGS_BEFORE: &str = "DELETE FROM sensor_readings WHERE recorded_at < ?";

const SELECT_OUTPUTS: &str = "SELECT id, value FROM outputs";

const UPSERT_OUTPUT: &str = r"
    INSERT INTO outputs (id, name, value, updated_at) VALUES (?, ?, ?, ?)
    ON CONFLICT (id) DO UPDATE SET name = excluded.name
";

const UPDATE_OUTPUT_VALUE: &str = "UPDATE outputs SET value = ?, updated_at = ? WHERE id = ?";

const SELECT_OWNERS: &str = "SELECT DISTINCT output_id FROM automations ORDER BY output_id";

/// Sensor readings and output values stored in `SQLite`.
#[derive(Clone)]
pub struct SqliteGreenhouse {
    pool: SqlitePool,
}

impl SqliteGreenhouse {
    /// Create a new store using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append one reading reported by a sensor.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the insert fails.
    pub async fn record_reading(
        &self,
        sensor_id: SensorId,
        reading_type: ReadingType,
        value: &str,
        recorded_at: Timestamp,
    ) -> Result<(), GreenhubError> {
        sqlx::query(INSERT_READING)
            .bind(sensor_id.to_string())
            .bind(reading_type.as_str())
            .bind(value)
            .bind(recorded_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }

    /// Delete readings recorded before `cutoff`. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the delete fails.
    pub async fn purge_readings_before(&self, cutoff: Timestamp) -> Result<u64, GreenhubError> {
        let result = sqlx::query(DELETE_READINGS_BEFORE)
            .bind(cutoff.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(result.rows_affected())
    }

    /// Register an output, or rename it if it already exists. A new output starts at 0.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the write fails.
    pub async fn register_output(
        &self,
        output_id: OutputId,
        name: &str,
        now: Timestamp,
    ) -> Result<(), GreenhubError> {
        sqlx::query(UPSERT_OUTPUT)
            .bind(output_id.to_string())
            .bind(name)
            .bind(0.0_f64)
            .bind(now.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }

    /// Outputs that own at least one automation.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails or an id is malformed.
    pub async fn owners(&self) -> Result<Vec<OutputId>, GreenhubError> {
        let rows: Vec<(String,)> = sqlx::query_as(SELECT_OWNERS)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        rows.into_iter()
            .map(|(id,)| {
                OutputId::from_str(&id)
                    .map_err(|err| GreenhubError::from(StorageError::from(crate::decode(err))))
            })
            .collect()
    }

    async fn sensor_snapshot(&self) -> Result<SensorSnapshot, GreenhubError> {
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(SELECT_LATEST_READINGS)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        let mut snapshot = SensorSnapshot::new();
        for (sensor_id, reading_type, value, _) in rows {
            match (SensorId::from_str(&sensor_id), ReadingType::from_str(&reading_type)) {
                (Ok(sensor_id), Ok(reading_type)) => snapshot.insert(sensor_id, reading_type, value),
                _ => tracing::warn!(%sensor_id, %reading_type, "skipping unreadable sensor reading"),
            }
        }
        Ok(snapshot)
    }

    async fn output_snapshot(&self) -> Result<OutputSnapshot, GreenhubError> {
        let rows: Vec<(String, f64)> = sqlx::query_as(SELECT_OUTPUTS)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        let mut snapshot = OutputSnapshot::new();
        for (id, value) in rows {
            match OutputId::from_str(&id) {
                Ok(output_id) => snapshot.insert(output_id, value),
                Err(_) => tracing::warn!(output_id = %id, "skipping output with malformed id"),
            }
        }
        Ok(snapshot)
    }
}

impl SnapshotSource for SqliteGreenhouse {
    async fn snapshot(&self) -> Result<(SensorSnapshot, OutputSnapshot), GreenhubError> {
        Ok((self.sensor_snapshot().await?, self.output_snapshot().await?))
    }
}

impl OutputWriter for SqliteGreenhouse {
    async fn set_value(&self, output_id: OutputId, value: u8) -> Result<(), GreenhubError> {
        let result = sqlx::query(UPDATE_OUTPUT_VALUE)
            .bind(f64::from(value))
            .bind(greenhub_domain::time::now().to_rfc3339())
            .bind(output_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError {
                entity: "Output",
                id: output_id.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SqliteAutomationRepository;
    use crate::pool::Config;
    use chrono::{Duration, TimeZone, Utc};
    use greenhub_app::ports::AutomationRepository;
    use greenhub_domain::automation::AutomationDraft;

    async fn setup() -> (SqliteGreenhouse, SqlitePool) {
        let db = Config::in_memory().build().await.unwrap();
        (SqliteGreenhouse::new(db.pool().clone()), db.pool().clone())
    }

    fn t(minutes: i64) -> Timestamp {
        Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    #[tokio::test]
    async fn should_keep_latest_reading_per_sensor_and_type() {
        let (greenhouse, _) = setup().await;
        let sensor = SensorId::new();
        greenhouse
            .record_reading(sensor, ReadingType::Temperature, "18.0", t(0))
            .await
            .unwrap();
        greenhouse
            .record_reading(sensor, ReadingType::Temperature, "24.5", t(5))
            .await
            .unwrap();
        greenhouse
            .record_reading(sensor, ReadingType::Humidity, "70", t(1))
            .await
            .unwrap();

        let (sensors, _) = greenhouse.snapshot().await.unwrap();

        assert_eq!(sensors.reading(sensor, ReadingType::Temperature), Some(24.5));
        assert_eq!(sensors.reading(sensor, ReadingType::Humidity), Some(70.0));
    }

    #[tokio::test]
    async fn should_purge_readings_older_than_cutoff() {
        let (greenhouse, _) = setup().await;
        let sensor = SensorId::new();
        greenhouse
            .record_reading(sensor, ReadingType::Light, "120", t(0))
            .await
            .unwrap();
        greenhouse
            .record_reading(sensor, ReadingType::Light, "300", t(10))
            .await
            .unwrap();

        let removed = greenhouse.purge_readings_before(t(5)).await.unwrap();

        assert_eq!(removed, 1);
        let (sensors, _) = greenhouse.snapshot().await.unwrap();
        assert_eq!(sensors.reading(sensor, ReadingType::Light), Some(300.0));
    }

    #[tokio::test]
    async fn should_write_output_value_and_expose_it_in_snapshot() {
        let (greenhouse, _) = setup().await;
        let fan = OutputId::new();
        greenhouse.register_output(fan, "Fan", t(0)).await.unwrap();

        greenhouse.set_value(fan, 65).await.unwrap();

        let (_, outputs) = greenhouse.snapshot().await.unwrap();
        assert_eq!(outputs.value(fan), Some(65.0));
    }

    #[tokio::test]
    async fn should_keep_value_when_output_registered_again() {
        let (greenhouse, _) = setup().await;
        let fan = OutputId::new();
        greenhouse.register_output(fan, "Fan", t(0)).await.unwrap();
        greenhouse.set_value(fan, 40).await.unwrap();

        greenhouse.register_output(fan, "Roof fan", t(1)).await.unwrap();

        let (_, outputs) = greenhouse.snapshot().await.unwrap();
        assert_eq!(outputs.value(fan), Some(40.0));
    }

    #[tokio::test]
    async fn should_return_not_found_when_writing_unknown_output() {
        let (greenhouse, _) = setup().await;

        let result = greenhouse.set_value(OutputId::new(), 100).await;

        assert!(matches!(result, Err(GreenhubError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_list_each_owning_output_once() {
        let (greenhouse, pool) = setup().await;
        let automations = SqliteAutomationRepository::new(pool);
        let fan = OutputId::new();
        let lamp = OutputId::new();
        for (output, name) in [(fan, "A"), (fan, "B"), (lamp, "C")] {
            let draft = AutomationDraft::builder().name(name).value(10).build().unwrap();
            automations.create(output, &draft).await.unwrap();
        }

        let mut owners = greenhouse.owners().await.unwrap();
        owners.sort();
        let mut expected = vec![fan, lamp];
        expected.sort();

        assert_eq!(owners, expected);
    }
}
