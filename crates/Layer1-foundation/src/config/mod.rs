//! Config - 통합 설정 관리
//!
//! - `taskmux.rs` - TaskmuxConfig (기본값 → 설정 파일 → 환경 변수)

mod taskmux;

pub use taskmux::{ConfigFile, TaskmuxConfig, TASKMUX_CONFIG_FILE};
