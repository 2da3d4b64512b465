//! # greenhub-app
//!
//! Application layer: use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `AutomationRepository`: automation rows, one output at a time
//!   - `ConditionRepository`: condition rows of one automation
//!   - `SnapshotSource`: latest sensor readings and output values
//!   - `OutputWriter`: drive an output to a new value
//! - Provide the **driving/inbound** side:
//!   - `AutomationRegistry`: per-output cache of automations, persisted
//!     through the repositories and evaluated against snapshots
//!   - `ControlLoop`: per tick, snapshot, evaluate every registry, write
//!     changed outputs
//!
//! ## Dependency rule
//! Depends on `greenhub-domain` only (plus `tokio::sync` and `futures`).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod automation_registry;
pub mod control_loop;
pub mod ports;

#[cfg(test)]
mod testing;

pub use automation_registry::{AutomationRegistry, BatchReport, Collision, Evaluation, Mutation};
pub use control_loop::ControlLoop;
