//! Refresh scheduler for the monitoring dashboard
//!
//! One driver task owns the auto-refresh timer. Manual refreshes, interval
//! changes and the auto-refresh toggle all reach it as commands, so passes
//! never overlap and only the driver ever arms or disarms the timer.
//! Dropping the [`RefreshScheduler`] aborts the driver.

use crate::aggregator::{Aggregator, RefreshStats};
use crate::config::{Config, RefreshInterval};
use crate::errors::{MonitorError, Result};
use crate::models::MetricsSnapshot;

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Shown while the dashboard summary cannot be fetched
pub const LOAD_FAILED_MESSAGE: &str = "Could not load monitoring metrics. Try again.";

/// Where the driver currently is in its refresh cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    /// No timer armed; waiting for a command
    Idle,
    /// An aggregation pass is in flight
    Refreshing,
    /// Timer armed for the next automatic pass
    Scheduled,
}

impl std::fmt::Display for SchedulerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulerPhase::Idle => write!(f, "idle"),
            SchedulerPhase::Refreshing => write!(f, "refreshing"),
            SchedulerPhase::Scheduled => write!(f, "scheduled"),
        }
    }
}

/// What the dashboard should render right now
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardState {
    /// Nothing has settled yet
    Loading,
    Ready(Arc<MetricsSnapshot>),
    /// The primary dashboard source failed; `last` is the most recent
    /// snapshot that did have it
    Failed {
        message: String,
        last: Option<Arc<MetricsSnapshot>>,
    },
}

impl DashboardState {
    /// The snapshot worth rendering, if any
    pub fn snapshot(&self) -> Option<&Arc<MetricsSnapshot>> {
        match self {
            DashboardState::Loading => None,
            DashboardState::Ready(snapshot) => Some(snapshot),
            DashboardState::Failed { last, .. } => last.as_ref(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, DashboardState::Failed { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub interval: RefreshInterval,
    pub auto_refresh: bool,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            interval: RefreshInterval::default(),
            auto_refresh: true,
        }
    }
}

impl From<&Config> for SchedulerSettings {
    fn from(config: &Config) -> Self {
        Self {
            interval: config.refresh_interval,
            auto_refresh: config.auto_refresh,
        }
    }
}

#[derive(Debug)]
enum Command {
    RefreshNow,
    SetAutoRefresh(bool),
    ToggleAutoRefresh,
    SetInterval(RefreshInterval),
}

/// Handle to a running refresh driver
pub struct RefreshScheduler {
    id: String,
    aggregator: Arc<Aggregator>,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<DashboardState>,
    phase: watch::Receiver<SchedulerPhase>,
    settings: watch::Receiver<SchedulerSettings>,
    task: JoinHandle<()>,
}

impl RefreshScheduler {
    /// Spawn the driver and run the initial refresh right away.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(aggregator: Arc<Aggregator>, settings: SchedulerSettings) -> Self {
        let id = Uuid::new_v4().to_string();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(DashboardState::Loading);
        let (phase_tx, phase_rx) = watch::channel(SchedulerPhase::Idle);
        let (settings_tx, settings_rx) = watch::channel(settings);

        let driver = Driver {
            id: id.clone(),
            aggregator: Arc::clone(&aggregator),
            commands: commands_rx,
            state: state_tx,
            phase: phase_tx,
            settings_tx,
            settings,
        };

        info!(
            "Starting refresh scheduler {} (interval {}, auto-refresh {})",
            id,
            settings.interval,
            if settings.auto_refresh { "on" } else { "off" }
        );
        let task = tokio::spawn(driver.run());

        Self {
            id,
            aggregator,
            commands: commands_tx,
            state: state_rx,
            phase: phase_rx,
            settings: settings_rx,
            task,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Refresh immediately; the automatic interval restarts once it completes
    pub fn refresh_now(&self) -> Result<()> {
        self.send(Command::RefreshNow)
    }

    /// Turn auto-refresh off. No automatic pass fires afterwards.
    pub fn stop(&self) -> Result<()> {
        self.send(Command::SetAutoRefresh(false))
    }

    /// Turn auto-refresh back on, refreshing immediately
    pub fn resume(&self) -> Result<()> {
        self.send(Command::SetAutoRefresh(true))
    }

    pub fn set_auto_refresh(&self, enabled: bool) -> Result<()> {
        self.send(Command::SetAutoRefresh(enabled))
    }

    /// Flip auto-refresh relative to the driver's own setting
    pub fn toggle_auto_refresh(&self) -> Result<()> {
        self.send(Command::ToggleAutoRefresh)
    }

    /// Switch interval; refreshes now and restarts the schedule
    pub fn set_interval(&self, interval: RefreshInterval) -> Result<()> {
        self.send(Command::SetInterval(interval))
    }

    /// Subscribe to dashboard state changes
    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.state.clone()
    }

    pub fn current(&self) -> DashboardState {
        self.state.borrow().clone()
    }

    pub fn phase(&self) -> SchedulerPhase {
        *self.phase.borrow()
    }

    pub fn watch_phase(&self) -> watch::Receiver<SchedulerPhase> {
        self.phase.clone()
    }

    pub fn settings(&self) -> SchedulerSettings {
        *self.settings.borrow()
    }

    pub fn stats(&self) -> RefreshStats {
        self.aggregator.stats()
    }

    /// Stop the driver and wait until it is gone
    pub async fn shutdown(mut self) {
        info!("Shutting down refresh scheduler {}", self.id);
        self.task.abort();
        if let Err(e) = (&mut self.task).await {
            if !e.is_cancelled() {
                warn!("Refresh driver {} ended abnormally: {}", self.id, e);
            }
        }
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| MonitorError::SchedulerClosed)
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct Driver {
    id: String,
    aggregator: Arc<Aggregator>,
    commands: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<DashboardState>,
    phase: watch::Sender<SchedulerPhase>,
    settings_tx: watch::Sender<SchedulerSettings>,
    settings: SchedulerSettings,
}

impl Driver {
    async fn run(mut self) {
        let mut next_tick = self.refresh_cycle().await;

        loop {
            let command = match next_tick {
                Some(deadline) => tokio::select! {
                    command = self.commands.recv() => command,
                    _ = sleep_until(deadline) => {
                        next_tick = self.refresh_cycle().await;
                        continue;
                    }
                },
                None => self.commands.recv().await,
            };

            let Some(command) = command else {
                debug!("Scheduler {} handle dropped, driver exiting", self.id);
                break;
            };
            debug!("Scheduler {} received {:?}", self.id, command);

            let command = match command {
                Command::ToggleAutoRefresh => Command::SetAutoRefresh(!self.settings.auto_refresh),
                other => other,
            };

            next_tick = match command {
                Command::RefreshNow => self.refresh_cycle().await,
                Command::SetAutoRefresh(true) if self.settings.auto_refresh => next_tick,
                Command::SetAutoRefresh(true) => {
                    self.update_settings(|s| s.auto_refresh = true);
                    self.refresh_cycle().await
                }
                Command::SetAutoRefresh(false) => {
                    self.update_settings(|s| s.auto_refresh = false);
                    self.phase.send_replace(SchedulerPhase::Idle);
                    None
                }
                Command::SetInterval(interval) => {
                    self.update_settings(|s| s.interval = interval);
                    self.refresh_cycle().await
                }
                Command::ToggleAutoRefresh => next_tick,
            };
        }
    }

    /// Run one pass, publish it, and return the next deadline if
    /// auto-refresh is on
    async fn refresh_cycle(&mut self) -> Option<Instant> {
        self.phase.send_replace(SchedulerPhase::Refreshing);

        let snapshot = Arc::new(self.aggregator.refresh().await);
        self.publish(snapshot);

        if self.settings.auto_refresh {
            self.phase.send_replace(SchedulerPhase::Scheduled);
            Some(Instant::now() + self.settings.interval.as_duration())
        } else {
            self.phase.send_replace(SchedulerPhase::Idle);
            None
        }
    }

    fn publish(&self, snapshot: Arc<MetricsSnapshot>) {
        if snapshot.is_primary_available() {
            self.state.send_replace(DashboardState::Ready(snapshot));
            return;
        }

        let last = self.state.borrow().snapshot().cloned();
        warn!(
            "Scheduler {}: dashboard summary unavailable on refresh #{}",
            self.id, snapshot.sequence
        );
        self.state.send_replace(DashboardState::Failed {
            message: LOAD_FAILED_MESSAGE.to_string(),
            last,
        });
    }

    fn update_settings(&mut self, change: impl FnOnce(&mut SchedulerSettings)) {
        change(&mut self.settings);
        self.settings_tx.send_replace(self.settings);
        info!(
            "Scheduler {} settings: interval {}, auto-refresh {}",
            self.id,
            self.settings.interval,
            if self.settings.auto_refresh { "on" } else { "off" }
        );
    }
}
