//! Session terminator - kills task sessions and drops their status records
//!
//! `kill_all` only touches sessions carrying the task prefix and reports
//! each session separately; one failure never aborts the rest.

use crate::artifact::ArtifactStore;
use crate::host::SessionHost;
use crate::task::is_task_session;
use serde::Serialize;
use std::sync::Arc;
use taskmux_foundation::{Error, Result, TaskmuxConfig, TASK_PREFIX};
use tracing::{debug, info, warn};

/// Outcome for a single session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum KillOutcome {
    /// Session killed; `status_removed` tells whether a record was deleted
    Killed { status_removed: bool },
    /// The host refused to kill the session
    Failed { error: String },
}

impl KillOutcome {
    pub fn is_killed(&self) -> bool {
        matches!(self, KillOutcome::Killed { .. })
    }
}

/// Per-session results of a kill pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct KillReport {
    pub sessions: Vec<(String, KillOutcome)>,
}

impl KillReport {
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn killed(&self) -> usize {
        self.sessions.iter().filter(|(_, o)| o.is_killed()).count()
    }

    pub fn failed(&self) -> usize {
        self.sessions.len() - self.killed()
    }
}

/// Kills task sessions
pub struct Terminator {
    host: Arc<dyn SessionHost>,
    store: ArtifactStore,
}

impl Terminator {
    pub fn new(host: Arc<dyn SessionHost>, store: ArtifactStore) -> Self {
        Self { host, store }
    }

    pub fn from_config(host: Arc<dyn SessionHost>, config: &TaskmuxConfig) -> Self {
        Self::new(host, ArtifactStore::from_config(config))
    }

    /// Kill one live task session and remove its status record
    pub async fn kill(&self, name: &str) -> Result<KillOutcome> {
        if !is_task_session(name) {
            return Err(Error::NotFound(format!("{} is not a task session", name)));
        }
        if !self.host.is_alive(name).await? {
            return Err(Error::NotFound(format!("no running session named {}", name)));
        }
        self.host.kill(name).await?;
        info!("Killed session {}", name);

        Ok(KillOutcome::Killed {
            status_removed: self.remove_status(name),
        })
    }

    /// Kill every session named with the task prefix
    pub async fn kill_all(&self) -> Result<KillReport> {
        let names = self.host.list_by_prefix(TASK_PREFIX).await?;
        let mut report = KillReport::default();

        for name in names {
            let outcome = match self.host.kill(&name).await {
                Ok(()) => {
                    info!("Killed session {}", name);
                    KillOutcome::Killed {
                        status_removed: self.remove_status(&name),
                    }
                }
                Err(e) => {
                    warn!("Failed to kill {}: {}", name, e);
                    KillOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            report.sessions.push((name, outcome));
        }

        Ok(report)
    }

    fn remove_status(&self, name: &str) -> bool {
        match self.store.remove_status(name) {
            Ok(removed) => removed,
            Err(e) => {
                debug!("Could not remove status record for {}: {}", name, e);
                false
            }
        }
    }
}
