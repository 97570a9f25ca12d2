//! Monitoring core
//!
//! - Access log record parsing
//! - Sliding error-rate window and pool transition tracking
//! - Per-category alert cooldown
//! - Slack webhook notifications
//! - The tailing watcher loop

pub mod access_log;
pub mod alert;
pub mod cooldown;
pub mod line_source;
pub mod pool_tracker;
pub mod slack_alert;
pub mod watcher;
pub mod window;

pub use access_log::{parse_line, Observation, RecordError};
pub use alert::{AlertCategory, AlertEvent};
pub use cooldown::CooldownGate;
pub use line_source::{FileTail, LinePoll, LineSource, MemorySource};
pub use pool_tracker::{PoolTracker, PoolTransition};
pub use slack_alert::{AlertSink, SlackAlert};
pub use watcher::{LineOutcome, LineReport, LogWatcher, MonitorState, WatcherPhase};
pub use window::SlidingWindow;
