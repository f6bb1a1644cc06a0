//! # taskmux-foundation
//!
//! Foundation layer for taskmux:
//! - Error: 에러 분류 및 종료 코드 매핑
//! - Config: 통합 설정 (기본값, 설정 파일, 환경 변수)
//! - Storage: JsonStore (설정 파일)
//! - Strings: 세션/아티팩트 이름 규칙 및 환경 변수 이름

pub mod config;
pub mod error;
pub mod storage;
pub mod strings;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result, EXIT_FAILURE, EXIT_MISSING_DEPENDENCY};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{ConfigFile, TaskmuxConfig, TASKMUX_CONFIG_FILE};

// ============================================================================
// Storage (저장소)
// ============================================================================
pub use storage::JsonStore;

// ============================================================================
// Strings (이름 규칙)
// ============================================================================
pub use strings::{
    trailer_for, LOG_EXT, STAGING_SUFFIX, STATUS_EXT, TASK_PREFIX, TRAILER_FAILURE_PREFIX,
    TRAILER_SUCCESS,
};
