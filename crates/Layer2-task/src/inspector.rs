//! Task inspector - read-only queries over sessions and artifacts
//!
//! Features:
//! - `check`: live snapshot or recorded outcome of one task
//! - `status`: status record of one task
//! - `list`: live task sessions plus recent history
//! - `tail`: snapshot stream that ends with the log tail

use crate::artifact::ArtifactStore;
use crate::format::{abbreviate, format_duration, last_lines, trim_trailing_blank};
use crate::host::SessionHost;
use crate::status::{self, StatusRecord};
use crate::task::parse_session_name;
use async_stream::try_stream;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use taskmux_foundation::{Error, Result, TaskmuxConfig, TASK_PREFIX};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Max display width of the command column in `list`
pub const COMMAND_DISPLAY_WIDTH: usize = 50;

/// Log lines shown with a finished task
const FINISHED_LOG_LINES: usize = 20;

/// Lower bound on the tail polling interval
const MIN_TAIL_INTERVAL: Duration = Duration::from_millis(100);

// ============================================================================
// Reports
// ============================================================================

/// Result of `check`
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CheckReport {
    /// Session alive; `record` is only present if a partial run left one
    Running {
        name: String,
        output: String,
        record: Option<StatusRecord>,
    },
    /// Session gone, status record present
    Finished {
        name: String,
        record: StatusRecord,
        log_tail: Vec<String>,
    },
    /// Session gone without a status record (killed, or the runner crashed)
    Unknown {
        name: String,
        log_file: PathBuf,
        log_tail: Vec<String>,
    },
}

/// Result of `status <name>`
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskStatus {
    Running {
        name: String,
        record: Option<StatusRecord>,
    },
    Finished {
        name: String,
        record: StatusRecord,
    },
}

/// A live task session
#[derive(Debug, Clone, Serialize)]
pub struct LiveTask {
    pub name: String,
    /// From the status record, else the epoch encoded in the name
    pub started_at: Option<DateTime<Utc>>,
    pub record: Option<StatusRecord>,
}

impl LiveTask {
    fn new(name: String, record: Option<StatusRecord>) -> Self {
        let started_at = record
            .as_ref()
            .and_then(|r| r.started_at)
            .or_else(|| {
                parse_session_name(&name).and_then(|(_, epoch)| DateTime::from_timestamp(epoch, 0))
            });
        Self {
            name,
            started_at,
            record,
        }
    }
}

/// One row of recent history
#[derive(Debug, Clone, Serialize)]
pub struct HistoryRow {
    pub name: String,
    pub exit_code: Option<i32>,
    pub outcome: String,
    pub duration: String,
    /// Command abbreviated to [`COMMAND_DISPLAY_WIDTH`]
    pub command: String,
    pub finished_at: Option<DateTime<Utc>>,
}

impl HistoryRow {
    fn from_record(name: String, record: &StatusRecord) -> Self {
        Self {
            name,
            exit_code: record.exit_code,
            outcome: record.outcome(),
            duration: record
                .duration_seconds
                .map(format_duration)
                .unwrap_or_else(|| "-".to_string()),
            command: abbreviate(&record.command, COMMAND_DISPLAY_WIDTH),
            finished_at: record.finished_at,
        }
    }
}

/// Result of `list`
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskListing {
    pub live: Vec<LiveTask>,
    pub history: Vec<HistoryRow>,
}

/// One item of a `tail` stream
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TailEvent {
    Snapshot { at: DateTime<Utc>, output: String },
    Ended { log_tail: Vec<String> },
}

// ============================================================================
// Inspector
// ============================================================================

/// Read-only view over a session host and an artifact store
pub struct Inspector {
    host: Arc<dyn SessionHost>,
    store: ArtifactStore,
    snapshot_lines: usize,
    summary_limit: usize,
}

impl Inspector {
    pub fn new(host: Arc<dyn SessionHost>, store: ArtifactStore) -> Self {
        let defaults = TaskmuxConfig::default();
        Self {
            host,
            store,
            snapshot_lines: defaults.tail_lines,
            summary_limit: defaults.summary_limit,
        }
    }

    pub fn from_config(host: Arc<dyn SessionHost>, config: &TaskmuxConfig) -> Self {
        Self::new(host, ArtifactStore::from_config(config))
            .with_snapshot_lines(config.tail_lines)
            .with_summary_limit(config.summary_limit)
    }

    pub fn with_snapshot_lines(mut self, lines: usize) -> Self {
        self.snapshot_lines = lines;
        self
    }

    pub fn with_summary_limit(mut self, limit: usize) -> Self {
        self.summary_limit = limit;
        self
    }

    /// Live snapshot, recorded outcome, or unknown outcome of one task
    pub async fn check(&self, name: &str) -> Result<CheckReport> {
        if let Some(output) = self.capture_live(name, self.snapshot_lines).await? {
            return Ok(CheckReport::Running {
                name: name.to_string(),
                output,
                record: self.store.read_status(name)?,
            });
        }

        let log_tail = self.store.read_log_tail(name, FINISHED_LOG_LINES)?;
        match (self.store.read_status(name)?, log_tail) {
            (Some(record), log_tail) => Ok(CheckReport::Finished {
                name: name.to_string(),
                record,
                log_tail: log_tail.unwrap_or_default(),
            }),
            (None, Some(log_tail)) => Ok(CheckReport::Unknown {
                name: name.to_string(),
                log_file: self.store.log_path(name),
                log_tail,
            }),
            (None, None) => Err(Error::NotFound(format!(
                "no session, status record or log for {}",
                name
            ))),
        }
    }

    /// Status record of one task
    pub async fn status(&self, name: &str) -> Result<TaskStatus> {
        let record = self.store.read_status(name)?;
        if self.host.is_alive(name).await? {
            return Ok(TaskStatus::Running {
                name: name.to_string(),
                record,
            });
        }
        match record {
            Some(record) => Ok(TaskStatus::Finished {
                name: name.to_string(),
                record,
            }),
            None => Err(Error::NotFound(format!("no status record for {}", name))),
        }
    }

    /// Live task sessions plus the most recent finished ones
    pub async fn list(&self) -> Result<TaskListing> {
        let live_names = self.host.list_by_prefix(TASK_PREFIX).await?;

        let live = live_names
            .iter()
            .map(|name| LiveTask::new(name.clone(), self.store.read_status(name).ok().flatten()))
            .collect();

        let history = self
            .store
            .history()?
            .into_iter()
            .filter(|entry| !live_names.contains(&entry.name))
            .take(self.summary_limit)
            .map(|entry| {
                let record = match status::read(&entry.path) {
                    Ok(record) => record.unwrap_or_default(),
                    Err(e) => {
                        debug!("Unreadable status record {}: {}", entry.path.display(), e);
                        StatusRecord::default()
                    }
                };
                HistoryRow::from_record(entry.name, &record)
            })
            .collect();

        Ok(TaskListing { live, history })
    }

    /// Poll a session until it ends or `cancel` fires.
    ///
    /// Yields a snapshot of the last `lines` lines every `interval` while the
    /// session is alive, then the tail of its log once it has ended.
    pub fn tail<'a>(
        &'a self,
        name: &'a str,
        interval: Duration,
        lines: usize,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Result<TailEvent>> + 'a {
        let interval = interval.max(MIN_TAIL_INTERVAL);
        try_stream! {
            while !cancel.is_cancelled() {
                let Some(output) = self.capture_live(name, lines).await? else {
                    let log_tail = self.store.read_log_tail(name, lines)?.ok_or_else(|| {
                        Error::NotFound(format!("no session or log for {}", name))
                    })?;
                    yield TailEvent::Ended { log_tail };
                    break;
                };

                yield TailEvent::Snapshot {
                    at: Utc::now(),
                    output,
                };

                let cancelled = tokio::select! {
                    _ = cancel.cancelled() => true,
                    _ = tokio::time::sleep(interval) => false,
                };
                if cancelled {
                    break;
                }
            }
        }
    }

    /// Recent output while the session is alive; `None` once it has ended.
    ///
    /// A capture failure counts as "ended" when the session is gone by the
    /// time we look again, or when the runner already wrote its status record.
    async fn capture_live(&self, name: &str, lines: usize) -> Result<Option<String>> {
        if !self.host.is_alive(name).await? {
            return Ok(None);
        }
        match self.host.capture_output(name, lines).await {
            Ok(output) => Ok(Some(tidy_capture(&output, lines))),
            Err(e) => {
                let alive = self.host.is_alive(name).await.unwrap_or(false);
                if !alive || self.store.status_path(name).exists() {
                    debug!("Session {} ended during capture: {}", name, e);
                    Ok(None)
                } else {
                    Err(e)
                }
            }
        }
    }
}

fn tidy_capture(output: &str, lines: usize) -> String {
    last_lines(&trim_trailing_blank(output), lines).join("\n")
}
