//! Cache warmup.
//!
//! Bulk-loads hot entities through a [`HotDataProvider`] at startup and on a
//! timer, with bounded concurrency and partial-failure tolerance.

pub mod provider;
pub mod scheduler;

pub use provider::{HotDataProvider, HotKind};
pub use scheduler::{KindReport, WarmupScheduler, WarmupSummary};
