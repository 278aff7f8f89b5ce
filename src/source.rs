//! HTTP source adapters for the `/monitoring/*` endpoints
//!
//! Every fetch resolves to a value: either the decoded payload or an
//! [`Unavailable`] describing why the source could not be read. Nothing
//! here returns a transport error to the caller.

use crate::config::Config;
use crate::errors::{MonitorError, Result};
use crate::models::{
    DashboardSummary, EndpointMetric, EndpointsEnvelope, HistoryEntry, HistoryEnvelope,
    UserActivityRecord, UsersEnvelope,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Result of a single source fetch
pub type SourceResult<T> = std::result::Result<T, Unavailable>;

/// The four monitoring sources polled on each refresh
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Dashboard,
    Endpoints,
    Users,
    History,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Dashboard,
        SourceKind::Endpoints,
        SourceKind::Users,
        SourceKind::History,
    ];

    /// Path relative to the API base URL
    pub fn path(&self) -> &'static str {
        match self {
            SourceKind::Dashboard => "/monitoring/dashboard",
            SourceKind::Endpoints => "/monitoring/endpoints",
            SourceKind::Users => "/monitoring/users",
            SourceKind::History => "/monitoring/history",
        }
    }

    /// Only the dashboard summary is required to render anything
    pub fn is_primary(&self) -> bool {
        matches!(self, SourceKind::Dashboard)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Dashboard => write!(f, "dashboard"),
            SourceKind::Endpoints => write!(f, "endpoints"),
            SourceKind::Users => write!(f, "users"),
            SourceKind::History => write!(f, "history"),
        }
    }
}

/// Why a source produced no data
#[derive(Clone, Debug, PartialEq)]
pub enum UnavailableReason {
    /// Connection refused, DNS failure, timeout, body read error
    Transport(String),
    /// Non-2xx response
    Status(u16),
    /// Body was not the JSON we expected
    Decode(String),
}

/// A source that could not be read during this pass
#[derive(Clone, Debug, PartialEq)]
pub struct Unavailable {
    pub path: String,
    pub reason: UnavailableReason,
}

impl Unavailable {
    pub fn new(path: impl Into<String>, reason: UnavailableReason) -> Self {
        Self {
            path: path.into(),
            reason,
        }
    }
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            UnavailableReason::Transport(msg) => write!(f, "{} unreachable: {}", self.path, msg),
            UnavailableReason::Status(code) => write!(f, "{} returned HTTP {}", self.path, code),
            UnavailableReason::Decode(msg) => write!(f, "{} sent an invalid body: {}", self.path, msg),
        }
    }
}

/// Anything that can supply the four monitoring slices
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn dashboard(&self) -> SourceResult<DashboardSummary>;
    async fn endpoints(&self) -> SourceResult<Vec<EndpointMetric>>;
    async fn users(&self) -> SourceResult<Vec<UserActivityRecord>>;
    async fn history(&self) -> SourceResult<Vec<HistoryEntry>>;
}

/// Best-effort JSON reader bound to one API base URL
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    base_url: String,
}

impl HttpSource {
    /// Create a new source. Without `request_timeout` the client's own
    /// defaults apply.
    pub fn new(base_url: impl Into<String>, request_timeout: Option<Duration>) -> Result<Self> {
        let mut builder =
            Client::builder().user_agent(format!("monitoring_poller/{}", env!("CARGO_PKG_VERSION")));
        if let Some(request_timeout) = request_timeout {
            builder = builder.timeout(request_timeout);
        }
        let client = builder.build().map_err(MonitorError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Validate `config` and build a source from it
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate().map_err(MonitorError::Config)?;
        Self::new(config.base_url.clone(), config.request_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` and decode the body as `T`
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> SourceResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Fetching {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Unavailable::new(path, UnavailableReason::Transport(e.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Unavailable::new(path, UnavailableReason::Status(status.as_u16())));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Unavailable::new(path, UnavailableReason::Transport(e.to_string())))?;

        serde_json::from_slice(&body)
            .map_err(|e| Unavailable::new(path, UnavailableReason::Decode(e.to_string())))
    }
}

#[async_trait]
impl MetricsSource for HttpSource {
    async fn dashboard(&self) -> SourceResult<DashboardSummary> {
        self.get_json(SourceKind::Dashboard.path()).await
    }

    async fn endpoints(&self) -> SourceResult<Vec<EndpointMetric>> {
        let envelope: EndpointsEnvelope = self.get_json(SourceKind::Endpoints.path()).await?;
        Ok(envelope
            .endpoints
            .into_iter()
            .map(EndpointMetric::clamped)
            .collect())
    }

    async fn users(&self) -> SourceResult<Vec<UserActivityRecord>> {
        let envelope: UsersEnvelope = self.get_json(SourceKind::Users.path()).await?;
        Ok(envelope.users)
    }

    async fn history(&self) -> SourceResult<Vec<HistoryEntry>> {
        let envelope: HistoryEnvelope = self.get_json(SourceKind::History.path()).await?;
        Ok(envelope.history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Status;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_source_creation_trims_base_url() {
        let source = HttpSource::new("http://localhost:8000/", None);

        assert!(source.is_ok());
        assert_eq!(source.unwrap().base_url(), "http://localhost:8000");
    }

    #[test]
    fn test_from_config_rejects_invalid_config() {
        let config = Config {
            base_url: "localhost:8000".to_string(),
            ..Default::default()
        };

        let err = HttpSource::from_config(&config).unwrap_err();
        assert!(matches!(err, MonitorError::Config(_)));
        assert!(err.to_string().starts_with("Configuration error: base_url"));

        let source = HttpSource::from_config(&Config::default()).unwrap();
        assert_eq!(source.base_url(), "http://localhost:8000");
    }

    #[test]
    fn test_source_kind_paths() {
        assert_eq!(SourceKind::Dashboard.path(), "/monitoring/dashboard");
        assert_eq!(SourceKind::History.path(), "/monitoring/history");
        assert!(SourceKind::Dashboard.is_primary());
        assert!(!SourceKind::Users.is_primary());
    }

    #[tokio::test]
    async fn test_dashboard_decodes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/monitoring/dashboard"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "timestamp": "2025-05-02T08:00:00",
                "overall_status": "warning",
                "health": {"error_rate": 3.2, "status": "warning"}
            })))
            .mount(&server)
            .await;

        let source = HttpSource::new(server.uri(), None).unwrap();
        let summary = source.dashboard().await.unwrap();

        assert_eq!(summary.overall_status, Status::Warning);
        assert_eq!(summary.health.error_rate, 3.2);
        assert!(summary.timestamp.is_some());
    }

    #[tokio::test]
    async fn test_non_success_status_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/monitoring/users"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let source = HttpSource::new(server.uri(), None).unwrap();
        let err = source.users().await.unwrap_err();

        assert_eq!(err.path, "/monitoring/users");
        assert_eq!(err.reason, UnavailableReason::Status(500));
    }

    #[tokio::test]
    async fn test_invalid_json_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/monitoring/history"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
            .mount(&server)
            .await;

        let source = HttpSource::new(server.uri(), None).unwrap();
        let err = source.history().await.unwrap_err();

        assert!(matches!(err.reason, UnavailableReason::Decode(_)));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_unavailable() {
        // Nothing listens on the discard port
        let source = HttpSource::new("http://127.0.0.1:9", Some(Duration::from_secs(2))).unwrap();
        let err = source.dashboard().await.unwrap_err();

        assert!(matches!(err.reason, UnavailableReason::Transport(_)));
        assert!(err.to_string().contains("/monitoring/dashboard"));
    }

    #[tokio::test]
    async fn test_endpoint_rows_keep_order_and_clamp_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/monitoring/endpoints"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "endpoints": [
                    {"endpoint": "/upload", "count": 5, "avg_response_time": 120.5, "error_count": 9},
                    {"endpoint": "/analysis", "count": 2, "avg_response_time": 80.0, "error_count": 0,
                     "last_accessed": null}
                ]
            })))
            .mount(&server)
            .await;

        let source = HttpSource::new(server.uri(), None).unwrap();
        let rows = source.endpoints().await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].endpoint, "/upload");
        assert_eq!(rows[0].error_count, 5);
        assert_eq!(rows[1].endpoint, "/analysis");
        assert!(rows[1].last_accessed.is_none());
    }

    #[tokio::test]
    async fn test_missing_envelope_key_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/monitoring/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"timestamp": "x"})))
            .mount(&server)
            .await;

        let source = HttpSource::new(server.uri(), None).unwrap();
        let users = source.users().await.unwrap();

        assert!(users.is_empty());
    }
}
