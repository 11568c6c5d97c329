//! `purger` library crate.
//!
//! Hosts the deletion orchestrator and its components. The binary
//! entrypoint lives in `main.rs`.

pub mod cli;
pub mod committer;
pub mod config;
pub mod deleter;
pub mod error;
pub mod orchestrator;
pub mod reporter;
pub mod selector;
pub mod verifier;
