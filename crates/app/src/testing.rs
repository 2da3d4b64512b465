//! In-memory port implementations shared by the unit tests of this crate.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use greenhub_domain::automation::{Automation, AutomationDraft, ConditionGroup, GroupType, PlacedCondition};
use greenhub_domain::error::{GreenhubError, NotFoundError};
use greenhub_domain::id::{AutomationId, ConditionId, OutputId};
use greenhub_domain::snapshot::{OutputSnapshot, SensorSnapshot};

use crate::ports::{AutomationRepository, ConditionRepository, OutputWriter, SnapshotSource};

pub fn storage_error(message: &str) -> GreenhubError {
    GreenhubError::Storage(Box::new(std::io::Error::other(message.to_string())))
}

/// Automation rows keyed by id. Deletes can be made to fail with
/// [`reject_deletes`](Self::reject_deletes).
#[derive(Default)]
pub struct InMemoryAutomationRepo {
    store: Mutex<HashMap<AutomationId, Automation>>,
    deletes_rejected: AtomicBool,
}

impl InMemoryAutomationRepo {
    pub fn reject_deletes(&self) {
        self.deletes_rejected.store(true, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.store.lock().unwrap().len()
    }

    pub fn get(&self, id: AutomationId) -> Option<Automation> {
        self.store.lock().unwrap().get(&id).cloned()
    }
}

impl AutomationRepository for InMemoryAutomationRepo {
    fn create(
        &self,
        output_id: OutputId,
        draft: &AutomationDraft,
    ) -> impl Future<Output = Result<AutomationId, GreenhubError>> + Send {
        let id = AutomationId::new();
        let mut row = draft.clone();
        row.rules = ConditionGroup::new();
        self.store
            .lock()
            .unwrap()
            .insert(id, Automation::from_draft(id, output_id, row));
        async move { Ok(id) }
    }

    fn update(
        &self,
        id: AutomationId,
        draft: &AutomationDraft,
    ) -> impl Future<Output = Result<(), GreenhubError>> + Send {
        let mut store = self.store.lock().unwrap();
        let result = match store.get_mut(&id) {
            Some(row) => {
                row.name.clone_from(&draft.name);
                row.value = draft.value;
                row.operator = draft.operator;
                row.window = draft.window;
                Ok(())
            }
            None => Err(NotFoundError {
                entity: "Automation",
                id: id.to_string(),
            }
            .into()),
        };
        async move { result }
    }

    fn delete(&self, id: AutomationId) -> impl Future<Output = Result<(), GreenhubError>> + Send {
        let result = if self.deletes_rejected.load(Ordering::SeqCst) {
            Err(storage_error("database is locked"))
        } else {
            self.store.lock().unwrap().remove(&id);
            Ok(())
        };
        async move { result }
    }

    fn find_by_output(
        &self,
        output_id: OutputId,
    ) -> impl Future<Output = Result<Vec<Automation>, GreenhubError>> + Send {
        let rows: Vec<Automation> = self
            .store
            .lock()
            .unwrap()
            .values()
            .filter(|row| row.output_id == output_id)
            .cloned()
            .collect();
        async move { Ok(rows) }
    }
}

/// Automation repository whose every call fails.
pub struct FailingAutomationRepo;

impl AutomationRepository for FailingAutomationRepo {
    fn create(
        &self,
        _output_id: OutputId,
        _draft: &AutomationDraft,
    ) -> impl Future<Output = Result<AutomationId, GreenhubError>> + Send {
        async { Err(storage_error("database is locked")) }
    }

    fn update(
        &self,
        _id: AutomationId,
        _draft: &AutomationDraft,
    ) -> impl Future<Output = Result<(), GreenhubError>> + Send {
        async { Err(storage_error("database is locked")) }
    }

    fn delete(&self, _id: AutomationId) -> impl Future<Output = Result<(), GreenhubError>> + Send {
        async { Err(storage_error("database is locked")) }
    }

    fn find_by_output(
        &self,
        _output_id: OutputId,
    ) -> impl Future<Output = Result<Vec<Automation>, GreenhubError>> + Send {
        async { Err(storage_error("database is locked")) }
    }
}

/// Condition rows keyed by id. Writes into `failing_group` are rejected;
/// updates of a row missing for the automation fail with `NotFound` first.
#[derive(Default)]
pub struct InMemoryConditionRepo {
    store: Mutex<HashMap<ConditionId, (AutomationId, PlacedCondition)>>,
    failing_group: Option<GroupType>,
}

impl InMemoryConditionRepo {
    pub fn failing_on(group: GroupType) -> Self {
        Self {
            store: Mutex::default(),
            failing_group: Some(group),
        }
    }

    pub fn len(&self) -> usize {
        self.store.lock().unwrap().len()
    }

    pub fn contains(&self, id: ConditionId) -> bool {
        self.store.lock().unwrap().contains_key(&id)
    }

    fn rejects(&self, placed: &PlacedCondition) -> bool {
        self.failing_group == Some(placed.group)
    }
}

impl ConditionRepository for InMemoryConditionRepo {
    fn create(
        &self,
        automation_id: AutomationId,
        placed: &PlacedCondition,
    ) -> impl Future<Output = Result<ConditionId, GreenhubError>> + Send {
        let result = if self.rejects(placed) {
            Err(storage_error("constraint failed"))
        } else {
            let id = ConditionId::new();
            let mut row = placed.clone();
            row.condition.id = Some(id);
            self.store.lock().unwrap().insert(id, (automation_id, row));
            Ok(id)
        };
        async move { result }
    }

    fn update(
        &self,
        id: ConditionId,
        automation_id: AutomationId,
        placed: &PlacedCondition,
    ) -> impl Future<Output = Result<(), GreenhubError>> + Send {
        let result = match self.store.lock().unwrap().get_mut(&id) {
            Some(row) if row.0 == automation_id => {
                if self.rejects(placed) {
                    Err(storage_error("constraint failed"))
                } else {
                    let mut next = placed.clone();
                    next.condition.id = Some(id);
                    row.1 = next;
                    Ok(())
                }
            }
            _ => Err(NotFoundError {
                entity: "Condition",
                id: id.to_string(),
            }
            .into()),
        };
        async move { result }
    }

    fn delete(&self, id: ConditionId) -> impl Future<Output = Result<(), GreenhubError>> + Send {
        self.store.lock().unwrap().remove(&id);
        async { Ok(()) }
    }

    fn find_by_automation(
        &self,
        automation_id: AutomationId,
    ) -> impl Future<Output = Result<Vec<PlacedCondition>, GreenhubError>> + Send {
        let mut rows: Vec<PlacedCondition> = self
            .store
            .lock()
            .unwrap()
            .values()
            .filter(|(owner, _)| *owner == automation_id)
            .map(|(_, placed)| placed.clone())
            .collect();
        rows.sort_by_key(|placed| (placed.group, placed.position));
        async move { Ok(rows) }
    }
}

/// Sensor and output state held in memory; records every output write.
/// Writing an output missing from the snapshot fails with `NotFound`.
#[derive(Default)]
pub struct InMemoryGreenhouse {
    sensors: Mutex<SensorSnapshot>,
    outputs: Mutex<OutputSnapshot>,
    writes: Mutex<Vec<(OutputId, u8)>>,
}

impl InMemoryGreenhouse {
    pub fn new(sensors: SensorSnapshot, outputs: OutputSnapshot) -> Self {
        Self {
            sensors: Mutex::new(sensors),
            outputs: Mutex::new(outputs),
            writes: Mutex::default(),
        }
    }

    pub fn writes(&self) -> Vec<(OutputId, u8)> {
        self.writes.lock().unwrap().clone()
    }
}

impl SnapshotSource for InMemoryGreenhouse {
    fn snapshot(
        &self,
    ) -> impl Future<Output = Result<(SensorSnapshot, OutputSnapshot), GreenhubError>> + Send {
        let snapshot = (
            self.sensors.lock().unwrap().clone(),
            self.outputs.lock().unwrap().clone(),
        );
        async move { Ok(snapshot) }
    }
}

impl OutputWriter for InMemoryGreenhouse {
    fn set_value(
        &self,
        output_id: OutputId,
        value: u8,
    ) -> impl Future<Output = Result<(), GreenhubError>> + Send {
        let mut outputs = self.outputs.lock().unwrap();
        let result = if outputs.value(output_id).is_some() {
            outputs.insert(output_id, f64::from(value));
            self.writes.lock().unwrap().push((output_id, value));
            Ok(())
        } else {
            Err(NotFoundError {
                entity: "Output",
                id: output_id.to_string(),
            }
            .into())
        };
        async move { result }
    }
}
