//! Monitoring data model as served by the `/monitoring/*` endpoints
//!
//! Decoding is lenient on purpose: missing fields, `null` values and
//! numbers of the wrong flavour all collapse to the documented defaults
//! (0, `Status::Unknown`, empty lists) so a partial payload never fails a
//! whole source.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{DeserializeOwned, Error as _};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Health classification shared by the overall, application and database sections
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Healthy,
    Warning,
    Critical,
    #[default]
    Unknown,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Healthy => write!(f, "healthy"),
            Status::Warning => write!(f, "warning"),
            Status::Critical => write!(f, "critical"),
            Status::Unknown => write!(f, "unknown"),
        }
    }
}

impl From<&str> for Status {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "healthy" => Status::Healthy,
            "warning" => Status::Warning,
            "critical" => Status::Critical,
            _ => Status::Unknown,
        }
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(raw) => Status::from(raw.as_str()),
            _ => Status::Unknown,
        })
    }
}

/// Payload of `GET /monitoring/dashboard`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardSummary {
    #[serde(deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    pub overall_status: Status,
    #[serde(deserialize_with = "null_as_default")]
    pub health: HealthMetrics,
    #[serde(deserialize_with = "null_as_default")]
    pub performance: PerformanceMetrics,
    #[serde(deserialize_with = "null_as_default")]
    pub summary: ActivitySummary,
    #[serde(deserialize_with = "null_as_default")]
    pub business: BusinessMetrics,
    #[serde(deserialize_with = "null_as_default")]
    pub database: DatabaseMetrics,
    #[serde(deserialize_with = "null_as_default")]
    pub alerts: Vec<Alert>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthMetrics {
    /// Percentage, 0-100
    #[serde(deserialize_with = "non_negative_float")]
    pub error_rate: f64,
    pub status: Status,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceMetrics {
    /// Milliseconds
    #[serde(deserialize_with = "non_negative_float")]
    pub avg_response_time: f64,
    #[serde(deserialize_with = "lenient_count")]
    pub requests_per_minute: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub top_endpoints: Vec<TopEndpoint>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopEndpoint {
    #[serde(deserialize_with = "null_as_default")]
    pub endpoint: String,
    #[serde(deserialize_with = "lenient_count")]
    pub count: u64,
}

/// Headline numbers the backend repeats under `summary`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivitySummary {
    #[serde(deserialize_with = "lenient_count")]
    pub active_users: u64,
    #[serde(deserialize_with = "non_negative_float")]
    pub error_rate: f64,
    #[serde(deserialize_with = "non_negative_float")]
    pub avg_response_time: f64,
    #[serde(deserialize_with = "lenient_count")]
    pub total_analyses_today: u64,
    #[serde(deserialize_with = "non_negative_float")]
    pub success_rate: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessMetrics {
    #[serde(deserialize_with = "lenient_count")]
    pub unique_users: u64,
    #[serde(deserialize_with = "lenient_count")]
    pub total_analyses: u64,
    /// Percentage, 0-100
    #[serde(deserialize_with = "non_negative_float")]
    pub success_rate: f64,
    #[serde(deserialize_with = "non_negative_float")]
    pub avg_analyses_per_user: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseMetrics {
    pub connection_status: Status,
    #[serde(
        deserialize_with = "ordered_table_counts",
        serialize_with = "serialize_table_counts"
    )]
    pub table_counts: Vec<TableCount>,
}

impl DatabaseMetrics {
    /// Row count for `table`, if the server reported a numeric value for it
    pub fn rows(&self, table: &str) -> Option<u64> {
        self.table_counts
            .iter()
            .find(|entry| entry.table == table)
            .and_then(|entry| match entry.value {
                TableCountValue::Rows(rows) => Some(rows),
                TableCountValue::Note(_) => None,
            })
    }
}

/// One `table_counts` entry, kept in the order the server sent it
#[derive(Clone, Debug, PartialEq)]
pub struct TableCount {
    pub table: String,
    pub value: TableCountValue,
}

/// Either a row count or the sentinel string the backend writes when a
/// table could not be counted
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TableCountValue {
    Rows(u64),
    Note(String),
}

impl From<Value> for TableCountValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Number(n) => TableCountValue::Rows(number_to_count(&n)),
            Value::String(s) => TableCountValue::Note(s),
            other => TableCountValue::Note(other.to_string()),
        }
    }
}

impl std::fmt::Display for TableCountValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableCountValue::Rows(rows) => write!(f, "{}", rows),
            TableCountValue::Note(note) => write!(f, "{}", note),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Critical,
    Warning,
    #[default]
    Info,
}

impl From<&str> for AlertKind {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "critical" => AlertKind::Critical,
            "warning" => AlertKind::Warning,
            _ => AlertKind::Info,
        }
    }
}

impl<'de> Deserialize<'de> for AlertKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(raw) => AlertKind::from(raw.as_str()),
            _ => AlertKind::Info,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Alert {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    #[serde(deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Row of `GET /monitoring/endpoints`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointMetric {
    #[serde(deserialize_with = "null_as_default")]
    pub endpoint: String,
    #[serde(deserialize_with = "lenient_count")]
    pub count: u64,
    /// Milliseconds
    #[serde(deserialize_with = "non_negative_float")]
    pub avg_response_time: f64,
    #[serde(deserialize_with = "lenient_count")]
    pub error_count: u64,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub last_accessed: Option<DateTime<Utc>>,
}

impl EndpointMetric {
    /// Caps `error_count` at `count`
    pub fn clamped(mut self) -> Self {
        self.error_count = self.error_count.min(self.count);
        self
    }

    /// Share of failed requests as a percentage; 0 when nothing was served
    pub fn error_percentage(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.error_count.min(self.count) as f64 / self.count as f64 * 100.0
    }
}

/// Row of `GET /monitoring/users`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserActivityRecord {
    #[serde(deserialize_with = "null_as_default")]
    pub user_id: String,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub last_activity: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "lenient_count")]
    pub request_count: u64,
    #[serde(deserialize_with = "lenient_count")]
    pub files_uploaded: u64,
    #[serde(deserialize_with = "lenient_count")]
    pub analyses_performed: u64,
    /// Seconds
    #[serde(deserialize_with = "non_negative_float")]
    pub session_duration: f64,
}

/// Row of `GET /monitoring/history`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryEntry {
    #[serde(deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "null_as_default")]
    pub response_times: Vec<f64>,
    #[serde(deserialize_with = "lenient_count")]
    pub request_count: u64,
    #[serde(deserialize_with = "lenient_count")]
    pub error_count: u64,
    #[serde(deserialize_with = "lenient_count")]
    pub active_users: u64,
    #[serde(deserialize_with = "lenient_count")]
    pub analyses_performed: u64,
}

/// `{ "endpoints": [...] }`, also read from `top_endpoints`
#[derive(Debug, Default)]
pub struct EndpointsEnvelope {
    pub endpoints: Vec<EndpointMetric>,
}

impl<'de> Deserialize<'de> for EndpointsEnvelope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self {
            endpoints: envelope_list(deserializer, "endpoints", "top_endpoints")?,
        })
    }
}

/// `{ "users": [...] }`, also read from `active_users`
#[derive(Debug, Default)]
pub struct UsersEnvelope {
    pub users: Vec<UserActivityRecord>,
}

impl<'de> Deserialize<'de> for UsersEnvelope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self {
            users: envelope_list(deserializer, "users", "active_users")?,
        })
    }
}

/// `{ "history": [...] }`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HistoryEnvelope {
    #[serde(deserialize_with = "null_as_default")]
    pub history: Vec<HistoryEntry>,
}

/// Which sources answered during the pass that produced a snapshot
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SourceAvailability {
    pub dashboard: bool,
    pub endpoints: bool,
    pub users: bool,
    pub history: bool,
}

impl SourceAvailability {
    pub fn all() -> Self {
        Self {
            dashboard: true,
            endpoints: true,
            users: true,
            history: true,
        }
    }

    /// Number of optional sources that did not answer
    pub fn degraded_optional(&self) -> usize {
        [self.endpoints, self.users, self.history]
            .iter()
            .filter(|available| !**available)
            .count()
    }
}

/// One merged, point-in-time view of every monitoring source.
///
/// Built once per aggregation pass and shared behind an `Arc`; a newer
/// pass replaces it wholesale.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub sequence: u64,
    pub fetched_at: DateTime<Utc>,
    pub dashboard: DashboardSummary,
    pub endpoints: Vec<EndpointMetric>,
    pub users: Vec<UserActivityRecord>,
    pub history: Vec<HistoryEntry>,
    pub availability: SourceAvailability,
}

impl MetricsSnapshot {
    /// The dashboard summary is required for baseline rendering
    pub fn is_primary_available(&self) -> bool {
        self.availability.dashboard
    }
}

/// Parse an ISO datetime, accepting both RFC 3339 and the naive form the
/// backend emits (read as UTC)
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    raw.parse::<NaiveDateTime>().ok().map(|naive| naive.and_utc())
}

fn number_to_count(n: &serde_json::Number) -> u64 {
    n.as_u64()
        .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f > 0.0).map(|f| f as u64))
        .unwrap_or(0)
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => number_to_count(&n),
        _ => 0,
    })
}

fn non_negative_float<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite() && *f > 0.0).unwrap_or(0.0),
        _ => 0.0,
    })
}

fn lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(raw) => parse_timestamp(&raw),
        _ => None,
    })
}

/// List under `key`, falling back to `alias` when `key` is missing or null
fn envelope_list<'de, D, T>(deserializer: D, key: &str, alias: &str) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let mut map = match Value::deserialize(deserializer)? {
        Value::Object(map) => map,
        other => {
            return Err(D::Error::custom(format!(
                "expected an object with '{}', got {}",
                key, other
            )));
        }
    };

    let value = map
        .remove(key)
        .filter(|v| !v.is_null())
        .or_else(|| map.remove(alias));

    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value) => serde_json::from_value(value).map_err(D::Error::custom),
    }
}

fn ordered_table_counts<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<TableCount>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => map
            .into_iter()
            .map(|(table, value)| TableCount {
                table,
                value: TableCountValue::from(value),
            })
            .collect(),
        _ => Vec::new(),
    })
}

fn serialize_table_counts<S: Serializer>(
    counts: &[TableCount],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(counts.len()))?;
    for entry in counts {
        map.serialize_entry(&entry.table, &entry.value)?;
    }
    map.end()
}
