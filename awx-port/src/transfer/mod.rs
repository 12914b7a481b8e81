//! Entity transfer pipeline
//!
//! Source entities are transformed into a portable, name-keyed form using
//! the per-type catalog, then reconciled against a destination store or
//! exported.

pub mod catalog;
pub mod driver;
pub mod reconcile;
pub mod transform;
pub mod types;

pub use catalog::{Relation, UNSAFE_FILTER_FIELDS};
pub use driver::{Driver, RunOptions, RunSummary};
pub use types::*;
