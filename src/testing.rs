//! In-memory [`MetricsSource`] for unit tests

use crate::models::{
    ActivitySummary, BusinessMetrics, DashboardSummary, DatabaseMetrics, EndpointMetric,
    HealthMetrics, HistoryEntry, PerformanceMetrics, Status, TableCount, TableCountValue,
    TopEndpoint, UserActivityRecord,
};
use crate::source::{MetricsSource, SourceKind, SourceResult, Unavailable, UnavailableReason};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

pub(crate) struct FakeSource {
    dashboard: Option<DashboardSummary>,
    endpoints: Option<Vec<EndpointMetric>>,
    users: Option<Vec<UserActivityRecord>>,
    history: Option<Vec<HistoryEntry>>,
    delay: Option<Duration>,
    outage: AtomicBool,
    passes: AtomicUsize,
}

impl FakeSource {
    /// Every source answers with a small but complete payload
    pub(crate) fn populated() -> Self {
        Self {
            dashboard: Some(sample_dashboard()),
            endpoints: Some(vec![
                EndpointMetric {
                    endpoint: "/upload".to_string(),
                    count: 40,
                    avg_response_time: 210.0,
                    error_count: 2,
                    last_accessed: None,
                },
                EndpointMetric {
                    endpoint: "/analysis/run".to_string(),
                    count: 12,
                    avg_response_time: 850.5,
                    error_count: 0,
                    last_accessed: None,
                },
            ]),
            users: Some(vec![UserActivityRecord {
                user_id: "user-1".to_string(),
                request_count: 18,
                files_uploaded: 2,
                analyses_performed: 5,
                session_duration: 640.0,
                ..Default::default()
            }]),
            history: Some(vec![HistoryEntry {
                response_times: vec![0.2, 0.4],
                request_count: 30,
                error_count: 1,
                active_users: 3,
                analyses_performed: 4,
                ..Default::default()
            }]),
            delay: None,
            outage: AtomicBool::new(false),
            passes: AtomicUsize::new(0),
        }
    }

    /// Make `kind` report itself unavailable
    pub(crate) fn without(mut self, kind: SourceKind) -> Self {
        match kind {
            SourceKind::Dashboard => self.dashboard = None,
            SourceKind::Endpoints => self.endpoints = None,
            SourceKind::Users => self.users = None,
            SourceKind::History => self.history = None,
        }
        self
    }

    /// Hold every dashboard fetch for `delay` before answering
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Toggle a dashboard outage while the source is shared
    pub(crate) fn set_dashboard_outage(&self, down: bool) {
        self.outage.store(down, Ordering::SeqCst);
    }

    /// Number of aggregation passes that reached this source
    pub(crate) fn passes(&self) -> usize {
        self.passes.load(Ordering::SeqCst)
    }
}

fn answer<T: Clone>(kind: SourceKind, value: &Option<T>) -> SourceResult<T> {
    value
        .clone()
        .ok_or_else(|| Unavailable::new(kind.path(), UnavailableReason::Status(503)))
}

#[async_trait]
impl MetricsSource for FakeSource {
    async fn dashboard(&self) -> SourceResult<DashboardSummary> {
        self.passes.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.outage.load(Ordering::SeqCst) {
            return answer(SourceKind::Dashboard, &None);
        }
        answer(SourceKind::Dashboard, &self.dashboard)
    }

    async fn endpoints(&self) -> SourceResult<Vec<EndpointMetric>> {
        answer(SourceKind::Endpoints, &self.endpoints)
    }

    async fn users(&self) -> SourceResult<Vec<UserActivityRecord>> {
        answer(SourceKind::Users, &self.users)
    }

    async fn history(&self) -> SourceResult<Vec<HistoryEntry>> {
        answer(SourceKind::History, &self.history)
    }
}

pub(crate) fn sample_dashboard() -> DashboardSummary {
    DashboardSummary {
        timestamp: None,
        overall_status: Status::Healthy,
        health: HealthMetrics {
            error_rate: 0.5,
            status: Status::Healthy,
        },
        performance: PerformanceMetrics {
            avg_response_time: 182.0,
            requests_per_minute: 64,
            top_endpoints: vec![TopEndpoint {
                endpoint: "/upload".to_string(),
                count: 40,
            }],
        },
        summary: ActivitySummary {
            active_users: 3,
            ..Default::default()
        },
        business: BusinessMetrics {
            unique_users: 9,
            total_analyses: 51,
            success_rate: 96.1,
            avg_analyses_per_user: 5.67,
        },
        database: DatabaseMetrics {
            connection_status: Status::Healthy,
            table_counts: vec![
                TableCount {
                    table: "reports".to_string(),
                    value: TableCountValue::Rows(14),
                },
                TableCount {
                    table: "templates".to_string(),
                    value: TableCountValue::Rows(3),
                },
            ],
        },
        alerts: Vec::new(),
    }
}
