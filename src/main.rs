//! Monitoring Poller Binary

use clap::{Parser, ValueEnum};
use monitoring_poller::scheduler::LOAD_FAILED_MESSAGE;
use monitoring_poller::view;
use monitoring_poller::{
    Aggregator, Config, ConsoleCommand, DashboardState, DashboardTab, HttpSource, MonitorError,
    RefreshInterval, RefreshScheduler, Result, SchedulerSettings,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::interval;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Pretty,
}

/// Poll the reporting API's monitoring endpoints and render a text dashboard
#[derive(Parser, Debug)]
#[command(name = "monitoring_poller", version)]
struct Args {
    /// Base URL of the reporting API (overrides MONITOR_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Auto-refresh interval: 10, 30 or 60 seconds
    #[arg(long)]
    interval: Option<RefreshInterval>,

    /// Start with auto-refresh disabled
    #[arg(long)]
    no_auto_refresh: bool,

    /// Tab shown first
    #[arg(long, default_value = "overview")]
    tab: DashboardTab,

    /// Fetch once, print and exit
    #[arg(long)]
    once: bool,

    /// With --once, print the raw snapshot as JSON
    #[arg(long, requires = "once")]
    json: bool,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    #[arg(long, value_enum, env = "LOG_FORMAT", default_value = "json")]
    log_format: LogFormat,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(interval) = self.interval {
            config.refresh_interval = interval;
        }
        if self.no_auto_refresh {
            config.auto_refresh = false;
        }
        if let Some(seconds) = self.timeout {
            config.request_timeout = Some(Duration::from_secs(seconds));
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    initialize_tracing(args.log_format);

    info!("Starting monitoring poller v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::from_env();
    args.apply(&mut config);

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    info!(
        "Poller configuration - API: {}, Interval: {}, Auto-refresh: {}",
        config.base_url, config.refresh_interval, config.auto_refresh
    );

    let source = HttpSource::from_config(&config)?;
    let aggregator = Arc::new(Aggregator::new(Arc::new(source)));

    if args.once {
        return run_once(&aggregator, args.tab, args.json).await;
    }

    run_dashboard(aggregator, &config, args.tab).await
}

async fn run_once(aggregator: &Aggregator, tab: DashboardTab, json: bool) -> Result<()> {
    let snapshot = aggregator.refresh().await;
    let primary_available = snapshot.is_primary_available();

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        let state = if primary_available {
            DashboardState::Ready(Arc::new(snapshot))
        } else {
            DashboardState::Failed {
                message: LOAD_FAILED_MESSAGE.to_string(),
                last: None,
            }
        };
        println!("{}", view::render(&state, tab));
    }

    if !primary_available {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_dashboard(aggregator: Arc<Aggregator>, config: &Config, tab: DashboardTab) -> Result<()> {
    let scheduler = RefreshScheduler::start(aggregator, SchedulerSettings::from(config));
    let mut states = scheduler.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut stats_interval = interval(Duration::from_secs(60));
    let mut tab = tab;

    print_dashboard(&scheduler, tab);
    println!("{}", ConsoleCommand::HELP);

    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    warn!("Refresh scheduler stopped publishing");
                    break;
                }
                print_dashboard(&scheduler, tab);
            }
            line = lines.next_line(), if stdin_open => {
                let Some(line) = line? else {
                    info!("Console input closed; auto-refresh continues");
                    stdin_open = false;
                    continue;
                };
                match ConsoleCommand::parse(&line) {
                    Some(ConsoleCommand::Quit) => break,
                    Some(command) => handle_command(&scheduler, command, &mut tab)?,
                    None if line.trim().is_empty() => {}
                    None => println!("{}", ConsoleCommand::HELP),
                }
            }
            _ = stats_interval.tick() => report_stats(&scheduler),
            signal = tokio::signal::ctrl_c() => {
                signal.map_err(signal_error)?;
                info!("Received shutdown signal");
                break;
            }
        }
    }

    scheduler.shutdown().await;
    Ok(())
}

fn signal_error(err: std::io::Error) -> MonitorError {
    MonitorError::Other(format!("Failed to wait for shutdown signal: {}", err))
}

fn handle_command(scheduler: &RefreshScheduler, command: ConsoleCommand, tab: &mut DashboardTab) -> Result<()> {
    match command {
        ConsoleCommand::Refresh => scheduler.refresh_now()?,
        ConsoleCommand::ToggleAuto => scheduler.toggle_auto_refresh()?,
        ConsoleCommand::Interval(interval) => scheduler.set_interval(interval)?,
        ConsoleCommand::Tab(selected) => {
            *tab = selected;
            print_dashboard(scheduler, *tab);
        }
        ConsoleCommand::Help => println!("{}", ConsoleCommand::HELP),
        ConsoleCommand::Quit => {}
    }
    Ok(())
}

fn print_dashboard(scheduler: &RefreshScheduler, tab: DashboardTab) {
    let settings = scheduler.settings();
    let auto = if settings.auto_refresh {
        format!("every {}", settings.interval)
    } else {
        "off".to_string()
    };

    println!();
    println!("=== Monitoring dashboard [{}] | auto-refresh {} ===", tab, auto);
    println!("{}", view::render(&scheduler.current(), tab));
}

fn report_stats(scheduler: &RefreshScheduler) {
    let stats = scheduler.stats();
    if stats.passes == 0 {
        return;
    }

    info!(
        "Poller metrics - Passes: {}, Dashboard: {:.1}% success rate, Degraded optional sources: {}, Last pass: {}ms, Phase: {}",
        stats.passes,
        stats.primary_success_rate,
        stats.degraded_sources,
        stats.last_duration_ms,
        scheduler.phase()
    );
}

/// Initialize structured logging on stderr so the dashboard owns stdout
fn initialize_tracing(format: LogFormat) {
    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer.json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer.pretty())
            .init(),
    }
}
