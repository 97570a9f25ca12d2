//! `bluegreen-watcher` -- blue/green deployment alert sidecar.
//!
//! Tails the load balancer's JSON access log and posts Slack alerts on
//! pool failover or sustained upstream errors.
//!
//! # Environment variables
//!
//! | Variable                 | Default                     | Description                          |
//! |--------------------------|-----------------------------|--------------------------------------|
//! | `SLACK_WEBHOOK_URL`      | --                          | Webhook target; unset = log only     |
//! | `ERROR_RATE_THRESHOLD`   | `2.0`                       | Error rate (%) that triggers alerts  |
//! | `WINDOW_SIZE`            | `200`                       | Requests in the sliding window       |
//! | `ALERT_COOLDOWN_SEC`     | `300`                       | Seconds between alerts per category  |
//! | `MAINTENANCE_MODE`       | `false`                     | Suppress failover alerts             |
//! | `LOG_FILE`               | `/var/log/nginx/access.log` | Access log to follow                 |
//! | `ERROR_STATUS_THRESHOLD` | `500`                       | Lowest status counted as an error    |
//! | `RECOVERY_ALERTS`        | `false`                     | Notify when the error rate recovers  |
//! | `WEBHOOK_TIMEOUT_SEC`    | `5`                         | Webhook request timeout              |

use std::process::ExitCode;

use bluegreen_watcher::config::AppConfig;
use bluegreen_watcher::monitoring::{LogWatcher, SlackAlert};
use bluegreen_watcher::utils::{logging, AppError};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let _guard = logging::init_logging();

    match run().await {
        Ok(()) => {
            tracing::info!("Shutting down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, error_code = e.error_code(), "Fatal error, exiting");
            eprintln!("Fatal error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), AppError> {
    let config = AppConfig::from_env()?;
    let webhook = if config.webhook_configured() {
        "configured"
    } else {
        "NOT CONFIGURED"
    };

    tracing::info!(
        log_file = %config.log_file.display(),
        webhook,
        error_rate_threshold = config.error_rate_threshold,
        window_size = config.window_size,
        cooldown_secs = config.alert_cooldown.as_secs(),
        maintenance_mode = config.maintenance_mode,
        "Starting blue/green alert watcher",
    );

    if !config.webhook_configured() {
        tracing::warn!("SLACK_WEBHOOK_URL not set, alerts will be logged only");
    }

    let sink = SlackAlert::from_config(config.webhook_url.as_deref(), config.webhook_timeout)?;
    let mut watcher = LogWatcher::new(&config, sink);

    watcher.run_file(&config.log_file, shutdown_signal()).await
}

/// Resolves on Ctrl+C, or SIGTERM on Unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
