//! Taskmux Config - 통합 설정
//!
//! 설정 우선순위: 기본값 < `config.json` < 환경 변수

use crate::storage::JsonStore;
use crate::strings::{
    ENV_LAUNCH_GRACE_MS, ENV_LOG_DIR, ENV_PRUNE_RETENTION_DAYS, ENV_STATUS_DIR,
    ENV_STATUS_SUMMARY_LIMIT, ENV_TAIL_DEFAULT_INTERVAL, ENV_TAIL_DEFAULT_LINES, ENV_TMUX_BIN,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// 설정 파일명
pub const TASKMUX_CONFIG_FILE: &str = "config.json";

const DEFAULT_RETENTION_DAYS: u64 = 7;
const DEFAULT_SUMMARY_LIMIT: usize = 10;
const DEFAULT_TAIL_LINES: usize = 50;
const DEFAULT_TAIL_INTERVAL_SECS: u64 = 2;
const DEFAULT_LAUNCH_GRACE_MS: u64 = 500;

// ============================================================================
// Config File (부분 설정)
// ============================================================================

/// On-disk configuration; every field is optional and only overrides
/// the defaults it names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_dir: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention_days: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_limit: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tail_lines: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tail_interval_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch_grace_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmux_bin: Option<PathBuf>,
}

// ============================================================================
// Taskmux Config (해석된 설정)
// ============================================================================

/// Fully resolved runtime configuration
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskmuxConfig {
    /// Directory holding `<name>.log` artifacts
    pub log_dir: PathBuf,

    /// Directory holding `<name>.status` records
    pub status_dir: PathBuf,

    /// Artifacts older than this many days are pruned; 0 disables pruning
    pub retention_days: u64,

    /// Maximum number of historical records shown by `list`
    pub summary_limit: usize,

    /// Default number of lines for `tail` and live snapshots
    pub tail_lines: usize,

    /// Default `tail` polling interval in seconds
    pub tail_interval_secs: u64,

    /// Delay before the post-launch liveness check
    pub launch_grace_ms: u64,

    /// Explicit tmux binary; resolved through PATH when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmux_bin: Option<PathBuf>,
}

impl Default for TaskmuxConfig {
    fn default() -> Self {
        let base = std::env::temp_dir().join("taskmux");
        Self {
            log_dir: base.join("logs"),
            status_dir: base.join("status"),
            retention_days: DEFAULT_RETENTION_DAYS,
            summary_limit: DEFAULT_SUMMARY_LIMIT,
            tail_lines: DEFAULT_TAIL_LINES,
            tail_interval_secs: DEFAULT_TAIL_INTERVAL_SECS,
            launch_grace_ms: DEFAULT_LAUNCH_GRACE_MS,
            tmux_bin: None,
        }
    }
}

impl TaskmuxConfig {
    /// 전체 설정 로드 (기본값 → 글로벌 설정 파일 → 환경 변수)
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(global) = JsonStore::global() {
            if let Some(file) = global.load_optional::<ConfigFile>(TASKMUX_CONFIG_FILE)? {
                debug!(
                    "Loaded config file {}",
                    global.file_path(TASKMUX_CONFIG_FILE).display()
                );
                config.merge(file);
            }
        }

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// 설정 파일 값 병합 (지정된 필드만)
    pub fn merge(&mut self, file: ConfigFile) {
        if let Some(dir) = file.log_dir {
            self.log_dir = dir;
        }
        if let Some(dir) = file.status_dir {
            self.status_dir = dir;
        }
        if let Some(days) = file.retention_days {
            self.retention_days = days;
        }
        if let Some(limit) = file.summary_limit {
            self.summary_limit = limit;
        }
        if let Some(lines) = file.tail_lines {
            self.tail_lines = lines;
        }
        if let Some(secs) = file.tail_interval_secs {
            self.tail_interval_secs = secs;
        }
        if let Some(ms) = file.launch_grace_ms {
            self.launch_grace_ms = ms;
        }
        if file.tmux_bin.is_some() {
            self.tmux_bin = file.tmux_bin;
        }
    }

    /// Apply environment overrides through `lookup`. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = get(ENV_LOG_DIR) {
            self.log_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get(ENV_STATUS_DIR) {
            self.status_dir = PathBuf::from(dir);
        }
        if let Some(v) = get(ENV_PRUNE_RETENTION_DAYS) {
            self.retention_days = parse_env(ENV_PRUNE_RETENTION_DAYS, &v)?;
        }
        if let Some(v) = get(ENV_STATUS_SUMMARY_LIMIT) {
            self.summary_limit = parse_env(ENV_STATUS_SUMMARY_LIMIT, &v)?;
        }
        if let Some(v) = get(ENV_TAIL_DEFAULT_LINES) {
            self.tail_lines = parse_env(ENV_TAIL_DEFAULT_LINES, &v)?;
        }
        if let Some(v) = get(ENV_TAIL_DEFAULT_INTERVAL) {
            self.tail_interval_secs = parse_env(ENV_TAIL_DEFAULT_INTERVAL, &v)?;
        }
        if let Some(v) = get(ENV_LAUNCH_GRACE_MS) {
            self.launch_grace_ms = parse_env(ENV_LAUNCH_GRACE_MS, &v)?;
        }
        if let Some(bin) = get(ENV_TMUX_BIN) {
            self.tmux_bin = Some(PathBuf::from(bin));
        }
        Ok(())
    }

    pub fn tail_interval(&self) -> Duration {
        Duration::from_secs(self.tail_interval_secs)
    }

    pub fn launch_grace(&self) -> Duration {
        Duration::from_millis(self.launch_grace_ms)
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        Error::Config(format!(
            "{} must be a non-negative integer, got '{}'",
            key, value
        ))
    })
}
