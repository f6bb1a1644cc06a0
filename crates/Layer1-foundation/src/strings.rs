//! Shared string constants
//!
//! Naming conventions for sessions and artifacts, plus the environment
//! variable names the configuration layer reads.

// ============================================================================
// Session / Artifact Naming
// ============================================================================

/// Prefix shared by every task session name
pub const TASK_PREFIX: &str = "task-";
/// Log artifact extension
pub const LOG_EXT: &str = "log";
/// Status record extension
pub const STATUS_EXT: &str = "status";
/// Suffix of the temporary file a status record is staged in before rename
pub const STAGING_SUFFIX: &str = ".tmp";

/// Trailer written to the log when the command exits 0
pub const TRAILER_SUCCESS: &str = "Task completed successfully.";
/// Prefix of the trailer written to the log when the command exits non-zero
pub const TRAILER_FAILURE_PREFIX: &str = "Task failed with exit code";

// ============================================================================
// Environment Constants
// ============================================================================

pub const ENV_LOG_DIR: &str = "LOG_DIR";
pub const ENV_STATUS_DIR: &str = "STATUS_DIR";
pub const ENV_PRUNE_RETENTION_DAYS: &str = "PRUNE_RETENTION_DAYS";
pub const ENV_STATUS_SUMMARY_LIMIT: &str = "STATUS_SUMMARY_LIMIT";
pub const ENV_TAIL_DEFAULT_LINES: &str = "TAIL_DEFAULT_LINES";
pub const ENV_TAIL_DEFAULT_INTERVAL: &str = "TAIL_DEFAULT_INTERVAL";
pub const ENV_LAUNCH_GRACE_MS: &str = "TASKMUX_LAUNCH_GRACE_MS";
pub const ENV_TMUX_BIN: &str = "TASKMUX_TMUX";
/// Set by tmux inside an attached client
pub const ENV_TMUX: &str = "TMUX";

/// Build the log trailer line for an exit code
pub fn trailer_for(exit_code: i32) -> String {
    if exit_code == 0 {
        TRAILER_SUCCESS.to_string()
    } else {
        format!("{} {}", TRAILER_FAILURE_PREFIX, exit_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailer_for() {
        assert_eq!(trailer_for(0), "Task completed successfully.");
        assert_eq!(trailer_for(3), "Task failed with exit code 3");
        assert_eq!(trailer_for(-1), "Task failed with exit code -1");
    }
}
