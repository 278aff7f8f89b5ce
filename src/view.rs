//! Display projections for the monitoring dashboard
//!
//! Pure functions from a [`MetricsSnapshot`] to display-ready values. Every
//! input, including missing and unrecognised ones, maps to something
//! renderable.

use crate::models::{
    AlertKind, DatabaseMetrics, EndpointMetric, HistoryEntry, MetricsSnapshot, Status,
    UserActivityRecord,
};
use crate::scheduler::DashboardState;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

pub const NO_ENDPOINTS: &str = "no endpoints registered yet";
pub const NO_USERS: &str = "no active users";
pub const NO_HISTORY: &str = "no history available";

const TOP_ENDPOINTS_SHOWN: usize = 5;
const HISTORY_ROWS_SHOWN: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BadgeColor {
    Green,
    Yellow,
    Red,
    Gray,
}

impl BadgeColor {
    pub fn css_class(&self) -> &'static str {
        match self {
            BadgeColor::Green => "text-green-600 bg-green-100",
            BadgeColor::Yellow => "text-yellow-600 bg-yellow-100",
            BadgeColor::Red => "text-red-600 bg-red-100",
            BadgeColor::Gray => "text-gray-600 bg-gray-100",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusBadge {
    pub color: BadgeColor,
    pub icon: &'static str,
    pub label: String,
}

impl StatusBadge {
    pub fn css_class(&self) -> &'static str {
        self.color.css_class()
    }
}

impl fmt::Display for StatusBadge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.icon, self.label)
    }
}

impl Status {
    pub fn badge(&self) -> StatusBadge {
        let (color, icon) = match self {
            Status::Healthy => (BadgeColor::Green, "✅"),
            Status::Warning => (BadgeColor::Yellow, "⚠️"),
            Status::Critical => (BadgeColor::Red, "❌"),
            Status::Unknown => (BadgeColor::Gray, "🔄"),
        };
        StatusBadge {
            color,
            icon,
            label: self.to_string().to_uppercase(),
        }
    }
}

/// Badge for a raw status string as it appears on the wire
pub fn status_badge(raw: Option<&str>) -> StatusBadge {
    Status::from(raw.unwrap_or_default()).badge()
}

pub fn alert_icon(kind: AlertKind) -> &'static str {
    match kind {
        AlertKind::Critical => "🚨",
        AlertKind::Warning => "⚠️",
        AlertKind::Info => "ℹ️",
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PercentageBar {
    pub value: f64,
    /// Fill width, 0-100
    pub width: f64,
    pub color: BadgeColor,
}

/// Bar for `value` scaled by `scale`, yellow above `warn_above` and red
/// above `critical_above`
pub fn percentage_bar(value: f64, warn_above: f64, critical_above: f64, scale: f64) -> PercentageBar {
    let value = if value.is_finite() { value.max(0.0) } else { 0.0 };
    let color = if value > critical_above {
        BadgeColor::Red
    } else if value > warn_above {
        BadgeColor::Yellow
    } else {
        BadgeColor::Green
    };

    PercentageBar {
        value,
        width: (value * scale).min(100.0),
        color,
    }
}

/// Error rates are small numbers, so the bar is stretched tenfold
pub fn error_rate_bar(error_rate: f64) -> PercentageBar {
    percentage_bar(error_rate, 2.0, 5.0, 10.0)
}

pub fn format_timestamp(timestamp: Option<DateTime<Utc>>) -> String {
    timestamp
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

/// `(table, count)` pairs in the order the server listed them
pub fn table_count_rows(database: &DatabaseMetrics) -> Vec<(String, String)> {
    database
        .table_counts
        .iter()
        .map(|entry| (entry.table.clone(), entry.value.to_string()))
        .collect()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DashboardTab {
    #[default]
    Overview,
    Endpoints,
    Users,
    History,
}

impl DashboardTab {
    pub const ALL: [DashboardTab; 4] = [
        DashboardTab::Overview,
        DashboardTab::Endpoints,
        DashboardTab::Users,
        DashboardTab::History,
    ];

    pub fn project(&self, snapshot: &MetricsSnapshot) -> TabView {
        match self {
            DashboardTab::Overview => TabView::Overview(Box::new(OverviewView::from(snapshot))),
            DashboardTab::Endpoints => TabView::Endpoints(Listing::new(
                snapshot.endpoints.iter().map(EndpointRow::from).collect(),
                NO_ENDPOINTS,
            )),
            DashboardTab::Users => TabView::Users(Listing::new(
                snapshot.users.iter().map(UserRow::from).collect(),
                NO_USERS,
            )),
            DashboardTab::History => TabView::History(Listing::new(
                snapshot
                    .history
                    .iter()
                    .take(HISTORY_ROWS_SHOWN)
                    .map(HistoryRow::from)
                    .collect(),
                NO_HISTORY,
            )),
        }
    }
}

impl fmt::Display for DashboardTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DashboardTab::Overview => write!(f, "overview"),
            DashboardTab::Endpoints => write!(f, "endpoints"),
            DashboardTab::Users => write!(f, "users"),
            DashboardTab::History => write!(f, "history"),
        }
    }
}

impl FromStr for DashboardTab {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "overview" => Ok(DashboardTab::Overview),
            "endpoints" => Ok(DashboardTab::Endpoints),
            "users" => Ok(DashboardTab::Users),
            "history" => Ok(DashboardTab::History),
            other => Err(format!("unknown tab '{}'", other)),
        }
    }
}

/// Rows, or the placeholder to show when there are none
#[derive(Clone, Debug, PartialEq)]
pub enum Listing<T> {
    Rows(Vec<T>),
    Empty(&'static str),
}

impl<T> Listing<T> {
    pub fn new(rows: Vec<T>, placeholder: &'static str) -> Self {
        if rows.is_empty() {
            Listing::Empty(placeholder)
        } else {
            Listing::Rows(rows)
        }
    }

    pub fn rows(&self) -> &[T] {
        match self {
            Listing::Rows(rows) => rows,
            Listing::Empty(_) => &[],
        }
    }

    pub fn placeholder(&self) -> Option<&'static str> {
        match self {
            Listing::Rows(_) => None,
            Listing::Empty(text) => Some(*text),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TabView {
    Overview(Box<OverviewView>),
    Endpoints(Listing<EndpointRow>),
    Users(Listing<UserRow>),
    History(Listing<HistoryRow>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct AlertLine {
    pub icon: &'static str,
    pub message: String,
    pub when: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OverviewView {
    pub status: StatusBadge,
    pub last_updated: String,
    pub health: StatusBadge,
    pub error_rate: String,
    pub error_rate_bar: PercentageBar,
    pub avg_response_time: String,
    pub requests_per_minute: String,
    pub active_users: u64,
    pub unique_users: String,
    pub reports: u64,
    pub database: StatusBadge,
    pub business: Vec<(&'static str, String)>,
    pub top_endpoints: Listing<(String, u64)>,
    pub table_counts: Vec<(String, String)>,
    pub alerts: Vec<AlertLine>,
}

impl From<&MetricsSnapshot> for OverviewView {
    fn from(snapshot: &MetricsSnapshot) -> Self {
        let summary = &snapshot.dashboard;
        let business = &summary.business;

        OverviewView {
            status: summary.overall_status.badge(),
            last_updated: format_timestamp(summary.timestamp),
            health: summary.health.status.badge(),
            error_rate: format!("{}%", summary.health.error_rate),
            error_rate_bar: error_rate_bar(summary.health.error_rate),
            avg_response_time: format!("{}ms", summary.performance.avg_response_time),
            requests_per_minute: format!("{} req/min", summary.performance.requests_per_minute),
            active_users: summary.summary.active_users,
            unique_users: format!("{} unique (7d)", business.unique_users),
            reports: summary.database.rows("reports").unwrap_or(0),
            database: summary.database.connection_status.badge(),
            business: vec![
                ("Total analyses (7d)", business.total_analyses.to_string()),
                ("Success rate", format!("{}%", business.success_rate)),
                ("Unique users (7d)", business.unique_users.to_string()),
                ("Analyses per user", business.avg_analyses_per_user.to_string()),
            ],
            top_endpoints: Listing::new(
                summary
                    .performance
                    .top_endpoints
                    .iter()
                    .take(TOP_ENDPOINTS_SHOWN)
                    .map(|e| (e.endpoint.clone(), e.count))
                    .collect(),
                NO_ENDPOINTS,
            ),
            table_counts: table_count_rows(&summary.database),
            alerts: summary
                .alerts
                .iter()
                .map(|alert| AlertLine {
                    icon: alert_icon(alert.kind),
                    message: alert.message.clone(),
                    when: format_timestamp(alert.timestamp),
                })
                .collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EndpointRow {
    pub endpoint: String,
    pub requests: u64,
    pub avg_response_time: String,
    pub errors: u64,
    pub error_rate: String,
    pub last_accessed: String,
}

impl From<&EndpointMetric> for EndpointRow {
    fn from(metric: &EndpointMetric) -> Self {
        EndpointRow {
            endpoint: metric.endpoint.clone(),
            requests: metric.count,
            avg_response_time: format!("{}ms", metric.avg_response_time),
            errors: metric.error_count,
            error_rate: format!("{:.2}%", metric.error_percentage()),
            last_accessed: format_timestamp(metric.last_accessed),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct UserRow {
    pub user_id: String,
    pub last_activity: String,
    pub requests: u64,
    pub uploads: u64,
    pub analyses: u64,
    pub session_duration: String,
}

impl From<&UserActivityRecord> for UserRow {
    fn from(record: &UserActivityRecord) -> Self {
        UserRow {
            user_id: record.user_id.clone(),
            last_activity: format_timestamp(record.last_activity),
            requests: record.request_count,
            uploads: record.files_uploaded,
            analyses: record.analyses_performed,
            session_duration: format!("{}s", record.session_duration),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct HistoryRow {
    pub timestamp: String,
    pub requests: u64,
    pub errors: u64,
    pub active_users: u64,
    pub analyses: u64,
}

impl From<&HistoryEntry> for HistoryRow {
    fn from(entry: &HistoryEntry) -> Self {
        HistoryRow {
            timestamp: format_timestamp(entry.timestamp),
            requests: entry.request_count,
            errors: entry.error_count,
            active_users: entry.active_users,
            analyses: entry.analyses_performed,
        }
    }
}

/// Render the current state of the dashboard for `tab` as plain text
pub fn render(state: &DashboardState, tab: DashboardTab) -> String {
    match state {
        DashboardState::Loading => "Loading monitoring metrics...".to_string(),
        DashboardState::Failed { message, .. } => {
            format!("❌ {}\n(press r to refresh)", message)
        }
        DashboardState::Ready(snapshot) => tab.project(snapshot).to_string(),
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, cells: &[String], widths: &[usize]) -> fmt::Result {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect();
    writeln!(f, "{}", padded.join("  ").trim_end())
}

fn write_table(f: &mut fmt::Formatter<'_>, headers: &[&str], rows: &[Vec<String>]) -> fmt::Result {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let header_cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    write_row(f, &header_cells, &widths)?;
    for row in rows {
        write_row(f, row, &widths)?;
    }
    Ok(())
}

fn write_listing<T>(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    headers: &[&str],
    listing: &Listing<T>,
    cells: impl Fn(&T) -> Vec<String>,
) -> fmt::Result {
    writeln!(f, "{}", title)?;
    match listing {
        Listing::Empty(placeholder) => writeln!(f, "{}", placeholder),
        Listing::Rows(rows) => {
            let rows: Vec<Vec<String>> = rows.iter().map(cells).collect();
            write_table(f, headers, &rows)
        }
    }
}

impl fmt::Display for OverviewView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "System status: {}  (last update: {})", self.status, self.last_updated)?;
        for alert in &self.alerts {
            writeln!(f, "{} {} ({})", alert.icon, alert.message, alert.when)?;
        }
        writeln!(f)?;
        writeln!(f, "Application health: {} error rate [{}]", self.error_rate, self.health)?;
        writeln!(
            f,
            "Performance: {} avg response, {}",
            self.avg_response_time, self.requests_per_minute
        )?;
        writeln!(f, "Active users: {} ({})", self.active_users, self.unique_users)?;
        writeln!(f, "Database: {} reports [{}]", self.reports, self.database)?;
        writeln!(f)?;

        writeln!(f, "Business metrics")?;
        for (label, value) in &self.business {
            writeln!(f, "  {}: {}", label, value)?;
        }
        writeln!(f)?;

        write_listing(
            f,
            "Most used endpoints",
            &["Endpoint", "Requests"],
            &self.top_endpoints,
            |(endpoint, count)| vec![endpoint.clone(), count.to_string()],
        )?;

        if !self.table_counts.is_empty() {
            writeln!(f)?;
            writeln!(f, "Database tables")?;
            for (table, count) in &self.table_counts {
                writeln!(f, "  {}: {}", table, count)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for TabView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TabView::Overview(overview) => write!(f, "{}", overview),
            TabView::Endpoints(listing) => write_listing(
                f,
                "Endpoint metrics",
                &["Endpoint", "Requests", "Avg time", "Errors", "Error rate", "Last access"],
                listing,
                |row| {
                    vec![
                        row.endpoint.clone(),
                        row.requests.to_string(),
                        row.avg_response_time.clone(),
                        row.errors.to_string(),
                        row.error_rate.clone(),
                        row.last_accessed.clone(),
                    ]
                },
            ),
            TabView::Users(listing) => write_listing(
                f,
                "User activity",
                &["User", "Last activity", "Requests", "Uploads", "Analyses", "Session"],
                listing,
                |row| {
                    vec![
                        row.user_id.clone(),
                        row.last_activity.clone(),
                        row.requests.to_string(),
                        row.uploads.to_string(),
                        row.analyses.to_string(),
                        row.session_duration.clone(),
                    ]
                },
            ),
            TabView::History(listing) => write_listing(
                f,
                "Metrics history",
                &["Timestamp", "Requests", "Errors", "Active users", "Analyses"],
                listing,
                |row| {
                    vec![
                        row.timestamp.clone(),
                        row.requests.to_string(),
                        row.errors.to_string(),
                        row.active_users.to_string(),
                        row.analyses.to_string(),
                    ]
                },
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Alert, DashboardSummary, HealthMetrics, SourceAvailability};
    use crate::testing::sample_dashboard;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn snapshot_with(dashboard: DashboardSummary) -> MetricsSnapshot {
        MetricsSnapshot {
            sequence: 1,
            dashboard,
            availability: SourceAvailability {
                dashboard: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_status_badge_is_total() {
        let cases = [
            (Some("healthy"), BadgeColor::Green, "✅", "HEALTHY"),
            (Some("warning"), BadgeColor::Yellow, "⚠️", "WARNING"),
            (Some("critical"), BadgeColor::Red, "❌", "CRITICAL"),
            (None, BadgeColor::Gray, "🔄", "UNKNOWN"),
            (Some("degraded-ish"), BadgeColor::Gray, "🔄", "UNKNOWN"),
        ];

        for (raw, color, icon, label) in cases {
            let badge = status_badge(raw);
            assert_eq!(badge.color, color, "input {:?}", raw);
            assert_eq!(badge.icon, icon, "input {:?}", raw);
            assert_eq!(badge.label, label, "input {:?}", raw);
        }
        assert_eq!(status_badge(Some("healthy")).css_class(), "text-green-600 bg-green-100");
        assert_eq!(status_badge(None).css_class(), "text-gray-600 bg-gray-100");
    }

    #[test]
    fn test_percentage_bar_thresholds() {
        assert_eq!(error_rate_bar(0.5).color, BadgeColor::Green);
        assert_eq!(error_rate_bar(0.5).width, 5.0);
        assert_eq!(error_rate_bar(3.0).color, BadgeColor::Yellow);
        assert_eq!(error_rate_bar(12.0).color, BadgeColor::Red);
        assert_eq!(error_rate_bar(12.0).width, 100.0);

        let usage = percentage_bar(f64::NAN, 60.0, 80.0, 1.0);
        assert_eq!(usage.value, 0.0);
        assert_eq!(usage.color, BadgeColor::Green);
    }

    #[test]
    fn test_alert_icons() {
        assert_eq!(alert_icon(AlertKind::Critical), "🚨");
        assert_eq!(alert_icon(AlertKind::Warning), "⚠️");
        assert_eq!(alert_icon(AlertKind::Info), "ℹ️");
    }

    #[test]
    fn test_format_timestamp() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 1, 10, 15, 0).unwrap();
        assert_eq!(format_timestamp(Some(ts)), "2025-03-01 10:15:00 UTC");
        assert_eq!(format_timestamp(None), "N/A");
    }

    #[test]
    fn test_table_count_rows_keep_order() {
        let rows = table_count_rows(&sample_dashboard().database);
        assert_eq!(
            rows,
            vec![
                ("reports".to_string(), "14".to_string()),
                ("templates".to_string(), "3".to_string())
            ]
        );
    }

    #[test]
    fn test_overview_from_partial_dashboard() {
        let snapshot = snapshot_with(DashboardSummary {
            overall_status: Status::Healthy,
            health: HealthMetrics {
                error_rate: 0.5,
                status: Status::Healthy,
            },
            ..Default::default()
        });

        let overview = OverviewView::from(&snapshot);

        assert_eq!(overview.status.label, "HEALTHY");
        assert_eq!(overview.error_rate, "0.5%");
        assert_eq!(overview.avg_response_time, "0ms");
        assert_eq!(overview.requests_per_minute, "0 req/min");
        assert_eq!(overview.reports, 0);
        assert_eq!(overview.database.label, "UNKNOWN");
        assert_eq!(overview.last_updated, "N/A");
        assert_eq!(overview.top_endpoints.placeholder(), Some(NO_ENDPOINTS));
    }

    #[test]
    fn test_overview_caps_top_endpoints_and_maps_alerts() {
        let mut dashboard = sample_dashboard();
        dashboard.performance.top_endpoints = (0..8)
            .map(|i| crate::models::TopEndpoint {
                endpoint: format!("/e{}", i),
                count: 10 - i,
            })
            .collect();
        dashboard.alerts = vec![Alert {
            kind: AlertKind::Warning,
            message: "Slow responses".to_string(),
            timestamp: None,
        }];

        let overview = OverviewView::from(&snapshot_with(dashboard));

        assert_eq!(overview.top_endpoints.rows().len(), 5);
        assert_eq!(overview.top_endpoints.rows()[0], ("/e0".to_string(), 10));
        assert_eq!(overview.reports, 14);
        assert_eq!(overview.alerts[0].icon, "⚠️");
        assert_eq!(overview.alerts[0].when, "N/A");
    }

    #[test]
    fn test_empty_tabs_show_placeholders() {
        let snapshot = snapshot_with(DashboardSummary::default());

        let endpoints = DashboardTab::Endpoints.project(&snapshot);
        let users = DashboardTab::Users.project(&snapshot);
        let history = DashboardTab::History.project(&snapshot);

        assert_eq!(endpoints, TabView::Endpoints(Listing::Empty(NO_ENDPOINTS)));
        assert_eq!(users, TabView::Users(Listing::Empty(NO_USERS)));
        assert_eq!(history, TabView::History(Listing::Empty(NO_HISTORY)));
        assert!(endpoints.to_string().contains(NO_ENDPOINTS));
    }

    #[test]
    fn test_history_tab_shows_first_ten() {
        let mut snapshot = snapshot_with(DashboardSummary::default());
        snapshot.history = (0..15)
            .map(|i| HistoryEntry {
                request_count: i,
                ..Default::default()
            })
            .collect();

        match DashboardTab::History.project(&snapshot) {
            TabView::History(listing) => {
                assert_eq!(listing.rows().len(), 10);
                assert_eq!(listing.rows()[9].requests, 9);
            }
            other => panic!("unexpected view {:?}", other),
        }
    }

    #[test]
    fn test_endpoint_row_formatting() {
        let row = EndpointRow::from(&EndpointMetric {
            endpoint: "/upload".to_string(),
            count: 3,
            avg_response_time: 120.5,
            error_count: 1,
            last_accessed: None,
        });

        assert_eq!(row.avg_response_time, "120.5ms");
        assert_eq!(row.error_rate, "33.33%");
        assert_eq!(row.last_accessed, "N/A");
    }

    #[test]
    fn test_tab_parsing() {
        assert_eq!("Endpoints".parse::<DashboardTab>(), Ok(DashboardTab::Endpoints));
        assert!("settings".parse::<DashboardTab>().is_err());
        for tab in DashboardTab::ALL {
            assert_eq!(tab.to_string().parse::<DashboardTab>(), Ok(tab));
        }
    }

    #[test]
    fn test_render_states() {
        assert!(render(&DashboardState::Loading, DashboardTab::Overview).contains("Loading"));

        let failed = DashboardState::Failed {
            message: "Could not load monitoring metrics. Try again.".to_string(),
            last: None,
        };
        assert!(render(&failed, DashboardTab::Overview).contains("Try again"));

        let ready = DashboardState::Ready(Arc::new(snapshot_with(sample_dashboard())));
        let text = render(&ready, DashboardTab::Overview);
        assert!(text.contains("✅ HEALTHY"));
        assert!(text.contains("0.5% error rate"));
        assert!(text.contains("reports: 14"));
    }
}
