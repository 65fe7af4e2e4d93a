//! Shared-PCH planner.

pub mod planner;

pub use planner::{plan_shared_pchs, PchPlan, PchTemplate};
