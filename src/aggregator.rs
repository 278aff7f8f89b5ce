//! Merges the four monitoring sources into one snapshot per pass

use crate::models::{MetricsSnapshot, SourceAvailability};
use crate::source::{MetricsSource, SourceKind, SourceResult};

use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// Runs one aggregation pass at a time against a [`MetricsSource`]
pub struct Aggregator {
    source: Arc<dyn MetricsSource>,
    sequence: AtomicU64,
    counters: RefreshCounters,
}

impl Aggregator {
    pub fn new(source: Arc<dyn MetricsSource>) -> Self {
        Self {
            source,
            sequence: AtomicU64::new(0),
            counters: RefreshCounters::default(),
        }
    }

    /// Query every source concurrently and merge whatever answered.
    ///
    /// Completes once all four fetches have settled. A failed source only
    /// blanks its own slice of the snapshot.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> MetricsSnapshot {
        let started = Instant::now();
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;

        let (dashboard, endpoints, users, history) = futures::join!(
            self.source.dashboard(),
            self.source.endpoints(),
            self.source.users(),
            self.source.history()
        );

        let availability = SourceAvailability {
            dashboard: dashboard.is_ok(),
            endpoints: endpoints.is_ok(),
            users: users.is_ok(),
            history: history.is_ok(),
        };

        let snapshot = MetricsSnapshot {
            sequence,
            fetched_at: Utc::now(),
            dashboard: settle(SourceKind::Dashboard, dashboard),
            endpoints: settle(SourceKind::Endpoints, endpoints),
            users: settle(SourceKind::Users, users),
            history: settle(SourceKind::History, history),
            availability,
        };

        let elapsed = started.elapsed();
        self.counters.record(&availability, elapsed);
        debug!(
            "Refresh #{} settled in {}ms ({} optional sources degraded)",
            sequence,
            elapsed.as_millis(),
            availability.degraded_optional()
        );

        snapshot
    }

    /// Get refresh statistics
    pub fn stats(&self) -> RefreshStats {
        self.counters.snapshot()
    }
}

fn settle<T: Default>(kind: SourceKind, result: SourceResult<T>) -> T {
    match result {
        Ok(value) => value,
        Err(unavailable) => {
            if kind.is_primary() {
                warn!(source = %kind, "Primary source unavailable: {}", unavailable);
            } else {
                debug!(source = %kind, "Source not available: {}", unavailable);
            }
            T::default()
        }
    }
}

#[derive(Debug, Default)]
struct RefreshCounters {
    passes: AtomicU64,
    primary_successes: AtomicU64,
    primary_failures: AtomicU64,
    degraded_sources: AtomicU64,
    last_duration_ms: AtomicU64,
}

impl RefreshCounters {
    fn record(&self, availability: &SourceAvailability, duration: Duration) {
        // `passes` first so a concurrent reader never sees more successes than passes
        self.passes.fetch_add(1, Ordering::SeqCst);
        if availability.dashboard {
            self.primary_successes.fetch_add(1, Ordering::SeqCst);
        } else {
            self.primary_failures.fetch_add(1, Ordering::Relaxed);
        }
        self.degraded_sources
            .fetch_add(availability.degraded_optional() as u64, Ordering::Relaxed);
        self.last_duration_ms
            .store(duration.as_millis() as u64, Ordering::Relaxed);
    }

    fn snapshot(&self) -> RefreshStats {
        let successes = self.primary_successes.load(Ordering::SeqCst);
        let passes = self.passes.load(Ordering::SeqCst);

        let primary_success_rate = if passes > 0 {
            (successes.min(passes) as f64 / passes as f64) * 100.0
        } else {
            0.0
        };

        RefreshStats {
            passes,
            primary_failures: self.primary_failures.load(Ordering::Relaxed),
            degraded_sources: self.degraded_sources.load(Ordering::Relaxed),
            primary_success_rate,
            last_duration_ms: self.last_duration_ms.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of refresh counters
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshStats {
    pub passes: u64,
    pub primary_failures: u64,
    /// Optional-source failures summed over all passes
    pub degraded_sources: u64,
    pub primary_success_rate: f64,
    pub last_duration_ms: u64,
}
