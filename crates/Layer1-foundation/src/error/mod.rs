//! Error types for taskmux
//!
//! 모든 에러를 중앙에서 관리

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Process exit code for generic usage / validation failures
pub const EXIT_FAILURE: i32 = 1;

/// Process exit code when a required external binary is missing
pub const EXIT_MISSING_DEPENDENCY: i32 = 127;

/// taskmux 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 입력 관련
    // ========================================================================
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // ========================================================================
    // 세션 호스트 관련
    // ========================================================================
    #[error("Launch failed: {message}")]
    LaunchFailure {
        message: String,
        /// Host stderr or log tail captured at the time of failure
        diagnostics: String,
    },

    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    #[error("Session host error: {0}")]
    Host(String),

    // ========================================================================
    // 설정 관련
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Exit code the CLI should terminate with for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::MissingDependency(_) => EXIT_MISSING_DEPENDENCY,
            _ => EXIT_FAILURE,
        }
    }

    /// Diagnostics attached to a launch failure, if any
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Error::LaunchFailure { diagnostics, .. } if !diagnostics.trim().is_empty() => {
                Some(diagnostics)
            }
            _ => None,
        }
    }

    /// Launch failure 생성 헬퍼
    pub fn launch(message: impl Into<String>, diagnostics: impl Into<String>) -> Self {
        Error::LaunchFailure {
            message: message.into(),
            diagnostics: diagnostics.into(),
        }
    }
}
