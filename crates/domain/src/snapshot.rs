//! Snapshots: the already-fetched sensor and output state an evaluation reads.
//!
//! Evaluation never queries storage or hardware. The caller gathers the
//! latest readings and output values once per tick and hands them over as
//! an [`EvaluationContext`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::{OutputId, SensorId};
use crate::time::TimeOfDay;

/// Physical quantity reported by a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingType {
    Temperature,
    Humidity,
    Pressure,
    Co2,
    Light,
    SoilMoisture,
    Vpd,
}

impl ReadingType {
    pub const ALL: [Self; 7] = [
        Self::Temperature,
        Self::Humidity,
        Self::Pressure,
        Self::Co2,
        Self::Light,
        Self::SoilMoisture,
        Self::Vpd,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Pressure => "pressure",
            Self::Co2 => "co2",
            Self::Light => "light",
            Self::SoilMoisture => "soil_moisture",
            Self::Vpd => "vpd",
        }
    }
}

impl fmt::Display for ReadingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadingType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownVariant {
                field: "reading type",
                value: s.to_string(),
            })
    }
}

/// Latest reading of every sensor, per reading type, as reported (a
/// numeric-parseable string).
#[derive(Debug, Clone, Default)]
pub struct SensorSnapshot {
    readings: HashMap<SensorId, HashMap<ReadingType, String>>,
}

impl SensorSnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or replace) the latest reading of `reading_type` for `sensor_id`.
    pub fn insert(
        &mut self,
        sensor_id: SensorId,
        reading_type: ReadingType,
        value: impl Into<String>,
    ) {
        self.readings
            .entry(sensor_id)
            .or_default()
            .insert(reading_type, value.into());
    }

    /// Builder-style variant of [`insert`](Self::insert).
    #[must_use]
    pub fn with(
        mut self,
        sensor_id: SensorId,
        reading_type: ReadingType,
        value: impl Into<String>,
    ) -> Self {
        self.insert(sensor_id, reading_type, value);
        self
    }

    /// The raw reading, if the sensor exists and reported this type.
    #[must_use]
    pub fn raw(&self, sensor_id: SensorId, reading_type: ReadingType) -> Option<&str> {
        self.readings
            .get(&sensor_id)
            .and_then(|readings| readings.get(&reading_type))
            .map(String::as_str)
    }

    /// The reading parsed as a float. Absent or unparseable readings yield `None`.
    #[must_use]
    pub fn reading(&self, sensor_id: SensorId, reading_type: ReadingType) -> Option<f64> {
        self.raw(sensor_id, reading_type)
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .filter(|value| !value.is_nan())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

/// Current value (0 to 100) of every output.
#[derive(Debug, Clone, Default)]
pub struct OutputSnapshot {
    values: HashMap<OutputId, f64>,
}

impl OutputSnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, output_id: OutputId, value: f64) {
        self.values.insert(output_id, value);
    }

    #[must_use]
    pub fn with(mut self, output_id: OutputId, value: f64) -> Self {
        self.insert(output_id, value);
        self
    }

    #[must_use]
    pub fn value(&self, output_id: OutputId) -> Option<f64> {
        self.values.get(&output_id).copied()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Everything one evaluation tick may look at.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    pub sensors: &'a SensorSnapshot,
    pub outputs: &'a OutputSnapshot,
    pub now: TimeOfDay,
}

impl<'a> EvaluationContext<'a> {
    #[must_use]
    pub fn new(sensors: &'a SensorSnapshot, outputs: &'a OutputSnapshot, now: TimeOfDay) -> Self {
        Self {
            sensors,
            outputs,
            now,
        }
    }
}
