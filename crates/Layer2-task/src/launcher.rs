//! Task launcher - validates a request and starts a detached session
//!
//! Flow:
//! 1. validate command, type, workdir and env overrides
//! 2. prune old artifacts (best-effort)
//! 3. allocate a free `task-<type>-<epoch>` name
//! 4. build the wrapped command and hand it to the session host
//! 5. check liveness once after a short grace delay

use crate::artifact::ArtifactStore;
use crate::host::SessionHost;
use crate::runner::RunSpec;
use crate::status::StatusRecord;
use crate::task::{sanitize_task_type, session_name, EnvOverride, LaunchRequest, TaskCommand};
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use taskmux_foundation::{Error, Result, TaskmuxConfig};
use tracing::{debug, info, warn};

/// Upper bound on epoch bumps while looking for a free name
const MAX_NAME_ATTEMPTS: i64 = 60;

/// Log lines attached to a launch failure
const DIAGNOSTIC_LINES: usize = 20;

/// State observed by the post-launch liveness check
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LaunchState {
    /// Session still alive
    Running,
    /// Command already finished within the grace delay
    Finished { record: StatusRecord },
}

/// A freshly started task session
#[derive(Debug, Clone, Serialize)]
pub struct LaunchedTask {
    pub name: String,
    pub log_file: PathBuf,
    pub status_file: PathBuf,
    pub workdir: PathBuf,
    pub state: LaunchState,
}

/// Starts tasks in detached sessions
pub struct Launcher {
    host: Arc<dyn SessionHost>,
    store: ArtifactStore,
    /// Executable that implements the hidden `exec` subcommand
    runner_program: PathBuf,
    retention_days: u64,
    grace: Duration,
}

impl Launcher {
    pub fn new(host: Arc<dyn SessionHost>, store: ArtifactStore, runner_program: PathBuf) -> Self {
        let defaults = TaskmuxConfig::default();
        Self {
            host,
            store,
            runner_program,
            retention_days: defaults.retention_days,
            grace: defaults.launch_grace(),
        }
    }

    pub fn from_config(
        host: Arc<dyn SessionHost>,
        config: &TaskmuxConfig,
        runner_program: PathBuf,
    ) -> Self {
        Self::new(host, ArtifactStore::from_config(config), runner_program)
            .with_retention_days(config.retention_days)
            .with_grace(config.launch_grace())
    }

    pub fn with_retention_days(mut self, days: u64) -> Self {
        self.retention_days = days;
        self
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Validate, spawn and check a task session
    pub async fn launch(&self, request: LaunchRequest) -> Result<LaunchedTask> {
        let command = TaskCommand::new(request.command)?;
        let task_type = sanitize_task_type(&request.task_type)?;
        let workdir = resolve_workdir(request.workdir.as_deref())?;
        let env = request
            .env
            .into_iter()
            .map(|e| EnvOverride::new(e.key, e.value))
            .collect::<Result<Vec<_>>>()?;

        self.store.ensure_dirs()?;
        let pruned = self.store.prune(self.retention_days);
        if !pruned.removed.is_empty() {
            debug!("Pruned {} expired artifact(s)", pruned.removed.len());
        }

        let name = self.allocate_name(&task_type).await?;
        let log_file = self.store.log_path(&name);
        let status_file = self.store.status_path(&name);
        if self.store.remove_status(&name)? {
            debug!("Removed stale status record for {}", name);
        }
        self.store.create_log(&name)?;

        let spec = RunSpec {
            name: name.clone(),
            command,
            log_file: log_file.clone(),
            status_file: status_file.clone(),
            workdir: workdir.clone(),
            env,
            notify: request.notify,
        };
        let wrapped = build_wrapped_command(&self.runner_program, &spec)?;
        debug!("Wrapped command for {}: {}", name, wrapped);

        self.host.create(&name, &wrapped, Some(workdir.as_path())).await?;
        info!("Started session {} ({})", name, spec.command.display());

        let state = self.await_started(&name).await?;
        Ok(LaunchedTask {
            name,
            log_file,
            status_file,
            workdir,
            state,
        })
    }

    /// Find a name whose session and artifacts are all free.
    /// Same-second launches of one type get the next epoch value.
    async fn allocate_name(&self, task_type: &str) -> Result<String> {
        let epoch = Utc::now().timestamp();
        for offset in 0..MAX_NAME_ATTEMPTS {
            let name = session_name(task_type, epoch + offset);
            if self.store.has_artifacts(&name) || self.host.is_alive(&name).await? {
                debug!("Session name {} is taken", name);
                continue;
            }
            return Ok(name);
        }
        Err(Error::launch(
            format!("no free session name for type '{}'", task_type),
            "",
        ))
    }

    async fn await_started(&self, name: &str) -> Result<LaunchState> {
        if !self.grace.is_zero() {
            tokio::time::sleep(self.grace).await;
        }
        if self.host.is_alive(name).await? {
            return Ok(LaunchState::Running);
        }

        match self.store.read_status(name)? {
            Some(record) => Ok(LaunchState::Finished { record }),
            None => {
                warn!("Session {} ended without a status record", name);
                let log_tail = self
                    .store
                    .read_log_tail(name, DIAGNOSTIC_LINES)?
                    .unwrap_or_default()
                    .join("\n");
                Err(Error::launch(
                    format!("session {} exited before recording a status", name),
                    log_tail,
                ))
            }
        }
    }
}

fn resolve_workdir(workdir: Option<&Path>) -> Result<PathBuf> {
    let Some(dir) = workdir else {
        return Ok(std::env::current_dir()?);
    };
    if !dir.is_dir() {
        return Err(Error::NotFound(format!(
            "working directory {} does not exist",
            dir.display()
        )));
    }
    Ok(dir.canonicalize()?)
}

/// Shell command line that re-executes the runner inside the session
pub fn build_wrapped_command(program: &Path, spec: &RunSpec) -> Result<String> {
    let program = program.to_string_lossy();
    let mut words = vec!["exec".to_string(), quote_word(&program)?];
    for arg in spec.to_args() {
        words.push(quote_word(&arg)?);
    }
    Ok(words.join(" "))
}

fn quote_word(word: &str) -> Result<String> {
    shlex::try_quote(word)
        .map(|q| q.into_owned())
        .map_err(|e| Error::InvalidArgument(format!("cannot quote '{}': {}", word, e)))
}
