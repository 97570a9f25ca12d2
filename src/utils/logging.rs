//! 로깅 초기화 모듈
//!
//! stdout에 사람이 읽기 쉬운 형식(또는 JSON)으로 출력하고,
//! `WATCHER_LOG_DIR`가 설정되면 일별 JSON 로그 파일에도 기록합니다.

use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_FILTER: &str = "info,bluegreen_watcher=debug";

/// 로깅 시스템을 초기화합니다.
///
/// 환경 변수 `RUST_LOG`로 로그 레벨을 설정할 수 있으며 기본값은 `info,bluegreen_watcher=debug`입니다.
/// `LOG_FORMAT=json`이면 stdout도 JSON 형식으로 출력합니다.
///
/// 반환되는 `WorkerGuard`를 main에서 유지해야 종료 시 버퍼링된 로그가 손실되지 않습니다.
pub fn init_logging() -> Option<WorkerGuard> {
    let json_stdout = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let stdout_layer = if json_stdout {
        fmt::layer()
            .json()
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_current_span(true)
            .boxed()
    } else {
        fmt::layer()
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_target(false)
            .boxed()
    };

    let (file_layer, guard) = match std::env::var("WATCHER_LOG_DIR") {
        Ok(dir) if !dir.trim().is_empty() => {
            let file_appender = rolling::daily(dir.trim(), "watcher.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .json()
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .with_ansi(false)
                .with_writer(non_blocking)
                .boxed();
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .or_else(|err| {
            use std::error::Error;
            if err
                .source()
                .and_then(|s| s.downcast_ref::<tracing::dispatcher::SetGlobalDefaultError>())
                .is_some()
            {
                // Already initialized (tests)
                return Ok(());
            }
            eprintln!("Failed to initialize tracing: {}", err);
            Err(err)
        })
        .ok();

    guard
}
