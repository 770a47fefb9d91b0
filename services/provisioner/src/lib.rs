//! Ephemeral GitHub Actions runner provisioner.
//!
//! This crate ships the `webhook` and `cleanup` binaries; the library surface
//! exists for integration testing and reuse.

pub mod admission;
pub mod api;
pub mod cleanup;
pub mod config;
pub mod logging;
pub mod provision;
pub mod state;
pub mod wiring;
