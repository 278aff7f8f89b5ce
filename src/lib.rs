//! Monitoring Poller Library
//!
//! This library polls the reporting API's monitoring endpoints, merges the
//! results into snapshots on a configurable schedule, and projects them into
//! display-ready dashboard views.

pub mod aggregator;
pub mod config;
pub mod console;
pub mod errors;
pub mod models;
pub mod scheduler;
pub mod source;
pub mod view;

#[cfg(test)]
mod testing;

pub use aggregator::{Aggregator, RefreshStats};
pub use config::{Config, RefreshInterval};
pub use console::ConsoleCommand;
pub use errors::{MonitorError, Result};
pub use models::{DashboardSummary, MetricsSnapshot, Status};
pub use scheduler::{DashboardState, RefreshScheduler, SchedulerPhase, SchedulerSettings};
pub use source::{HttpSource, MetricsSource, SourceKind, SourceResult, Unavailable};
pub use view::{DashboardTab, TabView};
