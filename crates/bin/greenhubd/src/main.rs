//! # greenhubd: greenhub daemon
//!
//! Composition root that wires the storage adapter into the automation
//! registries and drives the control loop.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Initialize the `SQLite` connection pool and run migrations
//! - Build one `AutomationRegistry` per output that owns automations
//! - Tick the `ControlLoop` on a fixed interval using local wall-clock time
//! - Periodically reload automations and purge old sensor readings
//! - Handle graceful shutdown (Ctrl-C)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

mod config;

use greenhub_adapter_storage_sqlite_sqlx::{
    Config as DatabaseConfig, SqliteAutomationRepository, SqliteConditionRepository,
    SqliteGreenhouse,
};
use greenhub_app::{AutomationRegistry, ControlLoop};
use greenhub_domain::error::GreenhubError;
use greenhub_domain::time::TimeOfDay;
use tokio::time::{Instant, MissedTickBehavior};
use tracing_subscriber::EnvFilter;

type Control = ControlLoop<
    SqliteAutomationRepository,
    SqliteConditionRepository,
    SqliteGreenhouse,
    SqliteGreenhouse,
>;

/// Adapters shared by every registry.
struct Stores {
    automations: SqliteAutomationRepository,
    conditions: SqliteConditionRepository,
    greenhouse: SqliteGreenhouse,
}

impl Stores {
    /// Build a control loop over every output that currently owns automations.
    async fn control_loop(&self) -> Result<Control, GreenhubError> {
        let registries = self
            .greenhouse
            .owners()
            .await?
            .into_iter()
            .map(|owner| {
                AutomationRegistry::new(owner, self.automations.clone(), self.conditions.clone())
            })
            .collect();
        let control = ControlLoop::new(registries, self.greenhouse.clone(), self.greenhouse.clone());
        let automations = control.reload().await?;
        tracing::info!(
            outputs = control.registries().len(),
            automations,
            "automations loaded"
        );
        Ok(control)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::Config::load()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    // Database
    let db = DatabaseConfig {
        database_url: config.database_url().to_string(),
        max_connections: config.database.max_connections,
    }
    .build()
    .await?;
    let pool = db.pool().clone();

    let stores = Stores {
        automations: SqliteAutomationRepository::new(pool.clone()),
        conditions: SqliteConditionRepository::new(pool.clone()),
        greenhouse: SqliteGreenhouse::new(pool),
    };
    let mut control = stores.control_loop().await?;

    let mut ticker = tokio::time::interval(config.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let reload_enabled = config.reload_interval().is_some();
    let reload_period = config.reload_interval().unwrap_or(config.tick_interval());
    let mut reloader = tokio::time::interval_at(Instant::now() + reload_period, reload_period);
    reloader.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // first purge runs at start-up
    let purge_enabled = config.purge_interval().is_some();
    let mut purger = tokio::time::interval(config.purge_interval().unwrap_or(reload_period));
    purger.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    tracing::info!(tick_ms = config.control.tick_ms, "greenhubd running");
    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(err) = result {
                    tracing::error!(error = %err, "failed to listen for shutdown signal");
                }
                tracing::info!("shutting down");
                break;
            }
            _ = ticker.tick() => {
                let now = TimeOfDay::of(&chrono::Local::now());
                if let Err(err) = control.tick(now).await {
                    tracing::error!(error = ?err, "control tick failed");
                }
            }
            _ = reloader.tick(), if reload_enabled => {
                match stores.control_loop().await {
                    Ok(next) => control = next,
                    Err(err) => tracing::error!(error = ?err, "reload failed, keeping previous automations"),
                }
            }
            _ = purger.tick(), if purge_enabled => {
                if let Some(retention) = config.retention() {
                    let cutoff = greenhub_domain::time::now() - retention;
                    match stores.greenhouse.purge_readings_before(cutoff).await {
                        Ok(removed) => tracing::debug!(removed, "old sensor readings purged"),
                        Err(err) => tracing::warn!(error = ?err, "failed to purge sensor readings"),
                    }
                }
            }
        }
    }

    Ok(())
}
