//! Snapshot and output ports: what the control loop reads and writes each tick.

use std::future::Future;

use greenhub_domain::error::GreenhubError;
use greenhub_domain::id::OutputId;
use greenhub_domain::snapshot::{OutputSnapshot, SensorSnapshot};

/// Provides the latest sensor readings and output values in one read.
pub trait SnapshotSource {
    fn snapshot(
        &self,
    ) -> impl Future<Output = Result<(SensorSnapshot, OutputSnapshot), GreenhubError>> + Send;
}

/// Drives an output to a new value (0 to 100).
pub trait OutputWriter {
    fn set_value(
        &self,
        output_id: OutputId,
        value: u8,
    ) -> impl Future<Output = Result<(), GreenhubError>> + Send;
}

impl<T: SnapshotSource + Send + Sync> SnapshotSource for std::sync::Arc<T> {
    fn snapshot(
        &self,
    ) -> impl Future<Output = Result<(SensorSnapshot, OutputSnapshot), GreenhubError>> + Send {
        (**self).snapshot()
    }
}

impl<T: OutputWriter + Send + Sync> OutputWriter for std::sync::Arc<T> {
    fn set_value(
        &self,
        output_id: OutputId,
        value: u8,
    ) -> impl Future<Output = Result<(), GreenhubError>> + Send {
        (**self).set_value(output_id, value)
    }
}
