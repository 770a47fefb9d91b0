//! Periodic cleanup of runner instances that were never destroyed.

pub mod reaper;

pub use reaper::{ReapError, ReapReport, ReaperConfig, StaleResourceReaper};
