use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// 로드밸런서가 기록하는 기본 액세스 로그 경로
pub const DEFAULT_LOG_FILE: &str = "/var/log/nginx/access.log";

const DEFAULT_ERROR_RATE_THRESHOLD: f64 = 2.0;
const DEFAULT_WINDOW_SIZE: usize = 200;
const DEFAULT_COOLDOWN_SECS: u64 = 300;
const DEFAULT_ERROR_STATUS: u16 = 500;
const DEFAULT_WEBHOOK_TIMEOUT_SECS: u64 = 5;

/// 워처 설정
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// 웹훅 주소. `None`이면 알림을 로그로만 남깁니다
    pub webhook_url: Option<String>,
    /// 알림 기준 에러율 (%)
    pub error_rate_threshold: f64,
    /// 윈도우에 유지할 최근 요청 수
    pub window_size: usize,
    /// 같은 종류 알림 사이의 최소 간격
    pub alert_cooldown: Duration,
    /// 계획된 작업 중 failover 알림 억제
    pub maintenance_mode: bool,
    /// 추적할 액세스 로그
    pub log_file: PathBuf,
    /// 에러로 집계할 최소 상태 코드
    pub error_status_threshold: u16,
    /// 에러율이 회복되면 복구 알림 전송
    pub recovery_alerts: bool,
    /// 웹훅 호출 1회의 타임아웃
    pub webhook_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            error_rate_threshold: DEFAULT_ERROR_RATE_THRESHOLD,
            window_size: DEFAULT_WINDOW_SIZE,
            alert_cooldown: Duration::from_secs(DEFAULT_COOLDOWN_SECS),
            maintenance_mode: false,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            error_status_threshold: DEFAULT_ERROR_STATUS,
            recovery_alerts: false,
            webhook_timeout: Duration::from_secs(DEFAULT_WEBHOOK_TIMEOUT_SECS),
        }
    }
}

impl AppConfig {
    /// 환경 변수에서 설정 로드
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 임의의 키 조회 함수로 설정 로드
    ///
    /// 값이 없거나 비어 있으면 기본값을 사용하고, 값이 있으면 반드시 파싱되어야 합니다.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let webhook_url = match get("SLACK_WEBHOOK_URL") {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => Some(url),
            Some(_) => return Err(ConfigError::InvalidWebhookUrl),
            None => None,
        };

        let error_rate_threshold = match get("ERROR_RATE_THRESHOLD") {
            Some(raw) => {
                let value: f64 = raw
                    .parse()
                    .map_err(|_| ConfigError::InvalidThreshold(raw.clone()))?;
                if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                    return Err(ConfigError::InvalidThreshold(raw));
                }
                value
            }
            None => DEFAULT_ERROR_RATE_THRESHOLD,
        };

        let window_size = match get("WINDOW_SIZE") {
            Some(raw) => match raw.parse::<usize>() {
                Ok(size) if size >= 1 => size,
                _ => return Err(ConfigError::InvalidWindowSize(raw)),
            },
            None => DEFAULT_WINDOW_SIZE,
        };

        let alert_cooldown = match get("ALERT_COOLDOWN_SEC") {
            Some(raw) => Duration::from_secs(
                raw.parse()
                    .map_err(|_| ConfigError::InvalidCooldown(raw.clone()))?,
            ),
            None => Duration::from_secs(DEFAULT_COOLDOWN_SECS),
        };

        let maintenance_mode = match get("MAINTENANCE_MODE") {
            Some(raw) => parse_flag(&raw).ok_or(ConfigError::InvalidFlag {
                key: "MAINTENANCE_MODE",
                value: raw,
            })?,
            None => false,
        };

        let log_file = get("LOG_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));

        let error_status_threshold = match get("ERROR_STATUS_THRESHOLD") {
            Some(raw) => match raw.parse::<u16>() {
                Ok(code) if (100..=599).contains(&code) => code,
                _ => return Err(ConfigError::InvalidErrorStatus(raw)),
            },
            None => DEFAULT_ERROR_STATUS,
        };

        let recovery_alerts = match get("RECOVERY_ALERTS") {
            Some(raw) => parse_flag(&raw).ok_or(ConfigError::InvalidFlag {
                key: "RECOVERY_ALERTS",
                value: raw,
            })?,
            None => false,
        };

        let webhook_timeout = match get("WEBHOOK_TIMEOUT_SEC") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if (1..=60).contains(&secs) => Duration::from_secs(secs),
                _ => return Err(ConfigError::InvalidWebhookTimeout(raw)),
            },
            None => Duration::from_secs(DEFAULT_WEBHOOK_TIMEOUT_SECS),
        };

        Ok(Self {
            webhook_url,
            error_rate_threshold,
            window_size,
            alert_cooldown,
            maintenance_mode,
            log_file,
            error_status_threshold,
            recovery_alerts,
            webhook_timeout,
        })
    }

    pub fn webhook_configured(&self) -> bool {
        self.webhook_url.is_some()
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    /// 웹훅 URL은 비밀값이므로 메시지에 포함하지 않습니다
    #[error("SLACK_WEBHOOK_URL must use the http:// or https:// scheme")]
    InvalidWebhookUrl,
    #[error("ERROR_RATE_THRESHOLD must be a percentage between 0 and 100, got {0:?}")]
    InvalidThreshold(String),
    #[error("WINDOW_SIZE must be a positive integer, got {0:?}")]
    InvalidWindowSize(String),
    #[error("ALERT_COOLDOWN_SEC must be a non-negative integer, got {0:?}")]
    InvalidCooldown(String),
    #[error("{key} must be true or false, got {value:?}")]
    InvalidFlag { key: &'static str, value: String },
    #[error("ERROR_STATUS_THRESHOLD must be a status code between 100 and 599, got {0:?}")]
    InvalidErrorStatus(String),
    #[error("WEBHOOK_TIMEOUT_SEC must be between 1 and 60, got {0:?}")]
    InvalidWebhookTimeout(String),
}
