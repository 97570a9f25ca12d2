//! Access log watcher
//!
//! Follows the load balancer log and turns each record into window,
//! pool and cooldown updates:
//!
//! - waits for the log file to appear (`AwaitingSource`)
//! - tails it from the end (`Streaming`)
//! - stops on shutdown, or with an error if the file is lost (`Failed`)

use chrono::{DateTime, Utc};
use std::future::Future;
use std::io::ErrorKind;
use std::path::Path;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

use super::access_log::{parse_line, Observation, RecordError};
use super::alert::{AlertCategory, AlertEvent};
use super::cooldown::CooldownGate;
use super::line_source::{FileTail, LinePoll, LineSource};
use super::pool_tracker::PoolTracker;
use super::slack_alert::AlertSink;
use super::window::SlidingWindow;
use crate::config::AppConfig;
use crate::utils::AppError;

/// Delay between checks for the log file to appear
pub const SOURCE_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Delay before polling again when no new line is available
pub const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Tracing target of the per-request status line
pub const STATUS_TARGET: &str = "bluegreen_watcher::status";

/// Lifecycle of the watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherPhase {
    AwaitingSource,
    Streaming,
    Failed,
}

/// Mutable state for the lifetime of the process
#[derive(Debug, Clone)]
pub struct MonitorState {
    pub window: SlidingWindow,
    pub pools: PoolTracker,
    pub cooldowns: CooldownGate,
    /// An error-rate alert went out and the rate has not recovered yet
    pub error_episode_open: bool,
}

impl MonitorState {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            window: SlidingWindow::with_error_status(
                config.window_size,
                config.error_status_threshold,
            ),
            pools: PoolTracker::new(),
            cooldowns: CooldownGate::new(config.alert_cooldown),
            error_episode_open: false,
        }
    }

    pub fn last_pool(&self) -> Option<&str> {
        self.pools.last_pool()
    }
}

/// Result of feeding one record through the state machine
#[derive(Debug, Clone, PartialEq)]
pub struct LineReport {
    pub observation: Observation,
    /// Error rate after recording this observation
    pub error_rate: f64,
    /// Alerts admitted for dispatch, in order
    pub alerts: Vec<AlertEvent>,
    /// Alert categories that fired but were held back
    pub suppressed: Vec<AlertCategory>,
}

/// What happened to one raw line
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// Not an access log record
    Skipped,
    /// A record with an unusable field
    Rejected(RecordError),
    Processed(LineReport),
}

impl LineOutcome {
    pub fn alerts(&self) -> &[AlertEvent] {
        match self {
            LineOutcome::Processed(report) => &report.alerts,
            _ => &[],
        }
    }
}

/// Log watcher driving alert decisions
pub struct LogWatcher<A: AlertSink> {
    state: MonitorState,
    sink: A,
    error_rate_threshold: f64,
    maintenance_mode: bool,
    recovery_alerts: bool,
    phase: WatcherPhase,
}

impl<A: AlertSink> LogWatcher<A> {
    pub fn new(config: &AppConfig, sink: A) -> Self {
        Self {
            state: MonitorState::new(config),
            sink,
            error_rate_threshold: config.error_rate_threshold,
            maintenance_mode: config.maintenance_mode,
            recovery_alerts: config.recovery_alerts,
            phase: WatcherPhase::AwaitingSource,
        }
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    pub fn phase(&self) -> WatcherPhase {
        self.phase
    }

    pub fn sink(&self) -> &A {
        &self.sink
    }

    /// Apply one raw line to the state and decide which alerts to send.
    ///
    /// Nothing is dispatched here.
    pub fn process_line(&mut self, line: &str, now: DateTime<Utc>) -> LineOutcome {
        let observation = match parse_line(line) {
            Ok(Some(observation)) => observation,
            Ok(None) => return LineOutcome::Skipped,
            Err(e) => return LineOutcome::Rejected(e),
        };

        self.state.window.record(observation.status);

        let mut alerts = Vec::new();
        let mut suppressed = Vec::new();

        if let Some(transition) = self.state.pools.observe(&observation.pool) {
            info!(from = %transition.from, to = %transition.to, "Pool transition detected");

            if self.maintenance_mode {
                info!("Maintenance mode: suppressing failover alert");
                suppressed.push(AlertCategory::Failover);
            } else if self.state.cooldowns.admit(AlertCategory::Failover, now) {
                alerts.push(AlertEvent::failover(&transition, &observation, now));
            } else {
                debug!("Failover alert still in cooldown");
                suppressed.push(AlertCategory::Failover);
            }
        }

        let error_rate = self.state.window.error_rate();

        if self.state.window.is_full() {
            if error_rate > self.error_rate_threshold {
                if self.state.cooldowns.admit(AlertCategory::ErrorRate, now) {
                    alerts.push(AlertEvent::error_rate(
                        error_rate,
                        self.error_rate_threshold,
                        self.state.window.capacity(),
                        &observation.pool,
                        now,
                    ));
                    self.state.error_episode_open = true;
                } else {
                    debug!(error_rate, "Error rate alert still in cooldown");
                    suppressed.push(AlertCategory::ErrorRate);
                }
            } else if self.state.error_episode_open {
                self.state.error_episode_open = false;
                if self.recovery_alerts {
                    alerts.push(AlertEvent::recovery(
                        error_rate,
                        self.error_rate_threshold,
                        &observation.pool,
                        now,
                    ));
                }
            }
        }

        LineOutcome::Processed(LineReport {
            observation,
            error_rate,
            alerts,
            suppressed,
        })
    }

    /// Process one line, send its alerts and emit the status line
    pub async fn handle_line(&mut self, line: &str, now: DateTime<Utc>) -> LineOutcome {
        let outcome = self.process_line(line, now);

        match &outcome {
            LineOutcome::Skipped => trace!("Skipping non-record line"),
            LineOutcome::Rejected(e) => {
                warn!(error = %e, "Skipping malformed access log record");
            }
            LineOutcome::Processed(report) => {
                for alert in &report.alerts {
                    self.dispatch(alert).await;
                }
                info!(
                    target: STATUS_TARGET,
                    pool = %report.observation.pool,
                    status = report.observation.status,
                    error_rate = %format!("{:.2}%", report.error_rate),
                    "Request observed"
                );
            }
        }

        outcome
    }

    /// Alerting is best-effort; failures are logged and swallowed
    async fn dispatch(&self, alert: &AlertEvent) {
        if let Err(e) = self.sink.dispatch(alert).await {
            error!(
                error = %e,
                error_code = e.error_code(),
                category = %alert.category,
                "Failed to dispatch alert"
            );
        }
    }

    /// Stream lines from `source` until shutdown or source loss
    pub async fn run<S, F>(&mut self, source: &mut S, shutdown: F) -> Result<(), AppError>
    where
        S: LineSource,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        self.stream(source, shutdown.as_mut()).await
    }

    /// Wait for the log file at `path`, then tail it until shutdown or loss
    pub async fn run_file<F>(&mut self, path: &Path, shutdown: F) -> Result<(), AppError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut tail = match self.await_source(path, shutdown.as_mut()).await? {
            Some(tail) => tail,
            None => return Ok(()),
        };

        self.stream(&mut tail, shutdown.as_mut()).await
    }

    /// Returns `None` if shutdown was requested before the file appeared
    async fn await_source<F>(
        &mut self,
        path: &Path,
        mut shutdown: Pin<&mut F>,
    ) -> Result<Option<FileTail>, AppError>
    where
        F: Future<Output = ()>,
    {
        self.phase = WatcherPhase::AwaitingSource;
        let mut announced = false;

        loop {
            match tokio::fs::metadata(path).await {
                Ok(metadata) if metadata.is_dir() => {
                    warn!(path = %path.display(), "Log source is a directory, waiting");
                }
                Ok(_) => match FileTail::open(path).await {
                    Ok(tail) => {
                        info!(path = %path.display(), "Log file found, starting to tail");
                        return Ok(Some(tail));
                    }
                    Err(e) => debug!(error = %e, "Log file not readable yet"),
                },
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => debug!(error = %e, "Log file not accessible yet"),
            }

            if !announced {
                info!(path = %path.display(), "Waiting for log file");
                announced = true;
            } else {
                debug!(path = %path.display(), "Still waiting for log file");
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => return Ok(None),
                _ = tokio::time::sleep(SOURCE_POLL_INTERVAL) => {}
            }
        }
    }

    async fn stream<S, F>(&mut self, source: &mut S, mut shutdown: Pin<&mut F>) -> Result<(), AppError>
    where
        S: LineSource,
        F: Future<Output = ()>,
    {
        self.phase = WatcherPhase::Streaming;

        loop {
            let poll = tokio::select! {
                biased;
                _ = &mut shutdown => return Ok(()),
                poll = source.next_line() => poll,
            };

            match poll {
                Ok(LinePoll::Line(line)) => {
                    self.handle_line(&line, Utc::now()).await;
                }
                Ok(LinePoll::Pending) => {
                    tokio::select! {
                        biased;
                        _ = &mut shutdown => return Ok(()),
                        _ = tokio::time::sleep(IDLE_POLL_INTERVAL) => {}
                    }
                }
                Err(e) => {
                    self.phase = WatcherPhase::Failed;
                    error!(error = %e, error_code = e.error_code(), "Log source failed");
                    return Err(e);
                }
            }
        }
    }
}
