//! Domain types for the soft-deleted instance purger.
//!
//! Pure logic only. Database access lives in `purger_db`; orchestration in
//! the `purger` crate.

pub mod cutoff;
pub mod error;
pub mod instance;
pub mod outcome;
pub mod schema;
pub mod types;
