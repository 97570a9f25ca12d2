use std::path::PathBuf;

use crate::config::ConfigError;

/// 애플리케이션 전역 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// 열어 둔 로그 소스가 사라졌거나 읽을 수 없게 됨
    #[error("log source {path:?} is no longer readable: {reason}")]
    SourceLost { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("alert dispatch failed: {0}")]
    AlertDispatch(String),
}

impl AppError {
    /// 에러 코드 반환
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "WATCH400",
            AppError::SourceLost { .. } => "WATCH410",
            AppError::Io(_) => "WATCH500",
            AppError::AlertDispatch(_) => "ALERT502",
        }
    }

    /// 모니터 루프를 중단해야 하는 에러인지 여부
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::Config(_) | AppError::SourceLost { .. } | AppError::Io(_)
        )
    }

    pub fn source_lost(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        AppError::SourceLost {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn alert_dispatch(msg: impl Into<String>) -> Self {
        AppError::AlertDispatch(msg.into())
    }
}
