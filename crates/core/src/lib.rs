//! Pure domain logic for the stagehand control plane.
//!
//! This crate has zero internal dependencies so it can be used by the
//! persistence layer, the API layer, and any future worker tooling.
//! Nothing in here touches the database or the network.

pub mod error;
pub mod hashing;
pub mod human;
pub mod identity;
pub mod plans;
pub mod slugs;
pub mod step_bindings;
pub mod thread_status;
pub mod types;
pub mod version;
