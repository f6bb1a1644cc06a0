//! Artifact store - log and status directories
//!
//! Every session owns exactly two files:
//! - `<log_dir>/<name>.log`
//! - `<status_dir>/<name>.status`
//!
//! Pruning is housekeeping: it never fails the caller.

use crate::format::last_lines;
use crate::status::{self, StatusRecord};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use taskmux_foundation::{Result, TaskmuxConfig, LOG_EXT, STAGING_SUFFIX, STATUS_EXT, TASK_PREFIX};
use tracing::debug;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Files removed by one prune pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct PruneReport {
    pub removed: Vec<PathBuf>,
    /// Deletions that failed and were skipped
    pub skipped: usize,
}

/// A status record on disk, as seen by `list`
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub name: String,
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// Log + status directory pair
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    log_dir: PathBuf,
    status_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(log_dir: impl Into<PathBuf>, status_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: normalize_dir(log_dir.into()),
            status_dir: normalize_dir(status_dir.into()),
        }
    }

    pub fn from_config(config: &TaskmuxConfig) -> Self {
        Self::new(&config.log_dir, &config.status_dir)
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn status_dir(&self) -> &Path {
        &self.status_dir
    }

    /// Create both directories if absent
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.log_dir)?;
        std::fs::create_dir_all(&self.status_dir)?;
        Ok(())
    }

    // ========================================================================
    // Path derivation
    // ========================================================================

    pub fn log_path(&self, name: &str) -> PathBuf {
        self.log_dir.join(format!("{}.{}", name, LOG_EXT))
    }

    pub fn status_path(&self, name: &str) -> PathBuf {
        self.status_dir.join(format!("{}.{}", name, STATUS_EXT))
    }

    /// Whether either artifact exists for `name`
    pub fn has_artifacts(&self, name: &str) -> bool {
        self.log_path(name).exists() || self.status_path(name).exists()
    }

    // ========================================================================
    // Log artifact
    // ========================================================================

    /// Create (or truncate) the log file for a new session
    pub fn create_log(&self, name: &str) -> Result<PathBuf> {
        let path = self.log_path(name);
        std::fs::File::create(&path)?;
        Ok(path)
    }

    /// Last `n` lines of the session log; `None` when no log exists
    pub fn read_log_tail(&self, name: &str, n: usize) -> Result<Option<Vec<String>>> {
        match std::fs::read(self.log_path(name)) {
            Ok(bytes) => Ok(Some(last_lines(&String::from_utf8_lossy(&bytes), n))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // ========================================================================
    // Status record
    // ========================================================================

    pub fn read_status(&self, name: &str) -> Result<Option<StatusRecord>> {
        status::read(&self.status_path(name))
    }

    /// Remove the status record. Returns whether a file was removed.
    pub fn remove_status(&self, name: &str) -> Result<bool> {
        match std::fs::remove_file(self.status_path(name)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Status records on disk, newest first by modification time
    pub fn history(&self) -> Result<Vec<HistoryEntry>> {
        let entries = match std::fs::read_dir(&self.status_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let suffix = format!(".{}", STATUS_EXT);
        let mut history: Vec<HistoryEntry> = entries
            .flatten()
            .filter_map(|entry| {
                let file_name = entry.file_name().into_string().ok()?;
                let name = file_name.strip_suffix(&suffix)?;
                if !name.starts_with(TASK_PREFIX) {
                    return None;
                }
                let modified = entry.metadata().ok()?.modified().ok()?;
                Some(HistoryEntry {
                    name: name.to_string(),
                    path: entry.path(),
                    modified,
                })
            })
            .collect();

        history.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.name.cmp(&a.name)));
        Ok(history)
    }

    // ========================================================================
    // Prune
    // ========================================================================

    /// Delete artifacts older than `retention_days`. 0 disables pruning.
    pub fn prune(&self, retention_days: u64) -> PruneReport {
        if retention_days == 0 {
            return PruneReport::default();
        }
        let window = Duration::from_secs(retention_days.saturating_mul(SECS_PER_DAY));
        match SystemTime::now().checked_sub(window) {
            Some(cutoff) => self.prune_older_than(cutoff),
            None => PruneReport::default(),
        }
    }

    /// Delete artifacts whose mtime is before `cutoff`
    pub fn prune_older_than(&self, cutoff: SystemTime) -> PruneReport {
        let mut report = PruneReport::default();
        for dir in [&self.log_dir, &self.status_dir] {
            prune_dir(dir, cutoff, &mut report);
        }
        if !report.removed.is_empty() {
            debug!("Pruned {} artifact(s)", report.removed.len());
        }
        report
    }
}

fn prune_dir(dir: &Path, cutoff: SystemTime, report: &mut PruneReport) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Skipping prune of {}: {}", dir.display(), e);
            return;
        }
    };

    for entry in entries.flatten() {
        let Ok(file_name) = entry.file_name().into_string() else {
            continue;
        };
        if !is_artifact_file(&file_name) {
            continue;
        }
        let modified = match entry.metadata().and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                debug!("Cannot stat {}: {}", entry.path().display(), e);
                continue;
            }
        };
        if modified >= cutoff {
            continue;
        }

        let path = entry.path();
        match std::fs::remove_file(&path) {
            Ok(()) => report.removed.push(path),
            Err(e) => {
                // Another prune pass may have won the race
                debug!("Failed to prune {}: {}", path.display(), e);
                report.skipped += 1;
            }
        }
    }
}

/// Whether a file name follows the task artifact naming pattern
pub fn is_artifact_file(file_name: &str) -> bool {
    if !file_name.starts_with(TASK_PREFIX) {
        return false;
    }
    let log = format!(".{}", LOG_EXT);
    let status = format!(".{}", STATUS_EXT);
    let staged = format!(".{}{}", STATUS_EXT, STAGING_SUFFIX);
    file_name.ends_with(&log) || file_name.ends_with(&status) || file_name.ends_with(&staged)
}

/// Drop trailing separators and `.` components
fn normalize_dir(dir: PathBuf) -> PathBuf {
    let normalized: PathBuf = dir.components().collect();
    if normalized.as_os_str().is_empty() {
        dir
    } else {
        normalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &Path) -> ArtifactStore {
        let store = ArtifactStore::new(dir.join("logs"), dir.join("status"));
        store.ensure_dirs().unwrap();
        store
    }

    #[test]
    fn test_path_derivation() {
        let store = ArtifactStore::new("/tmp/t/logs/", "/tmp/t/status//");
        assert_eq!(store.log_dir(), Path::new("/tmp/t/logs"));
        assert_eq!(
            store.log_path("task-build-1"),
            PathBuf::from("/tmp/t/logs/task-build-1.log")
        );
        assert_eq!(
            store.status_path("task-build-1"),
            PathBuf::from("/tmp/t/status/task-build-1.status")
        );
    }

    #[test]
    fn test_is_artifact_file() {
        assert!(is_artifact_file("task-build-1.log"));
        assert!(is_artifact_file("task-build-1.status"));
        assert!(is_artifact_file("task-build-1.status.tmp"));
        assert!(!is_artifact_file("build-1.log"));
        assert!(!is_artifact_file("task-build-1.txt"));
        assert!(!is_artifact_file("notes.status"));
    }

    #[test]
    fn test_log_tail_and_status_removal() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());

        assert!(store.read_log_tail("task-a-1", 5).unwrap().is_none());
        store.create_log("task-a-1").unwrap();
        std::fs::write(store.log_path("task-a-1"), "one\ntwo\nthree\n").unwrap();
        assert_eq!(
            store.read_log_tail("task-a-1", 2).unwrap(),
            Some(vec!["two".to_string(), "three".to_string()])
        );

        std::fs::write(store.status_path("task-a-1"), "EXIT_CODE=0\n").unwrap();
        assert!(store.has_artifacts("task-a-1"));
        assert_eq!(store.read_status("task-a-1").unwrap().unwrap().exit_code, Some(0));
        assert!(store.remove_status("task-a-1").unwrap());
        assert!(!store.remove_status("task-a-1").unwrap());
    }

    #[test]
    fn test_prune_removes_only_task_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());

        std::fs::write(store.log_path("task-a-1"), "x").unwrap();
        std::fs::write(store.status_path("task-a-1"), "EXIT_CODE=0").unwrap();
        std::fs::write(store.log_dir().join("keep-me.log"), "x").unwrap();

        let future = SystemTime::now() + Duration::from_secs(3600);
        let report = store.prune_older_than(future);
        assert_eq!(report.removed.len(), 2);
        assert!(store.log_dir().join("keep-me.log").exists());
        assert!(!store.has_artifacts("task-a-1"));
    }

    #[test]
    fn test_prune_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        std::fs::write(store.log_path("task-a-1"), "x").unwrap();

        let future = SystemTime::now() + Duration::from_secs(3600);
        assert_eq!(store.prune_older_than(future).removed.len(), 1);
        let second = store.prune_older_than(future);
        assert!(second.removed.is_empty());
        assert_eq!(second.skipped, 0);
    }

    #[test]
    fn test_prune_keeps_fresh_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        std::fs::write(store.log_path("task-a-1"), "x").unwrap();

        assert!(store.prune(7).removed.is_empty());
        assert!(store.prune(0).removed.is_empty());
        assert!(store.log_path("task-a-1").exists());
    }

    #[test]
    fn test_prune_missing_dirs_is_silent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path().join("nope"), tmp.path().join("nada"));
        let report = store.prune_older_than(SystemTime::now());
        assert!(report.removed.is_empty());
    }

    #[test]
    fn test_history_filters_and_orders() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        std::fs::write(store.status_path("task-a-1"), "").unwrap();
        std::fs::write(store.status_path("task-b-2"), "").unwrap();
        std::fs::write(store.status_dir().join("unrelated.status"), "").unwrap();
        std::fs::write(store.status_dir().join("task-c-3.status.tmp"), "").unwrap();

        let history = store.history().unwrap();
        let names: Vec<&str> = history.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"task-a-1"));
        assert!(names.contains(&"task-b-2"));
        assert!(history[0].modified >= history[1].modified);
    }
}
