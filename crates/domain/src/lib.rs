//! # greenhub-domain
//!
//! Pure domain model for the greenhub enclosure controller.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, time-of-day
//! - Define **Snapshots** (the sensor readings and output values an evaluation sees)
//! - Define **Conditions** (sensor, output and time predicates)
//! - Define **Condition groups** (`allOf` / `anyOf` / `oneOf` buckets and their combination)
//! - Define **Automations** (a condition group, a target output value and an activation window)
//! - Contain all invariant enforcement and evaluation logic
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod automation;
pub mod snapshot;
