//! Task definition and types

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;
use taskmux_foundation::{Error, Result, TASK_PREFIX};

/// Valid environment variable identifier
fn env_key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"))
}

/// `task-<type>-<digits>`
fn session_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^task-(.+)-(\d+)$").expect("valid regex"))
}

// ============================================================================
// Session Naming
// ============================================================================

/// Replace characters tmux or the filesystem cannot hold in a session name.
/// Returns `InvalidArgument` when nothing usable remains.
pub fn sanitize_task_type(task_type: &str) -> Result<String> {
    let sanitized: String = task_type
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | '.' | ':' => '_',
            c if c.is_whitespace() || c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return Err(Error::InvalidArgument(
            "task type must not be empty".to_string(),
        ));
    }
    Ok(sanitized)
}

/// Compose a session name from an already sanitized type
pub fn session_name(task_type: &str, epoch_secs: i64) -> String {
    format!("{}{}-{}", TASK_PREFIX, task_type, epoch_secs)
}

/// Whether `name` follows the task-session naming convention
pub fn is_task_session(name: &str) -> bool {
    name.starts_with(TASK_PREFIX)
}

/// Split a session name into `(type, epoch_secs)`
pub fn parse_session_name(name: &str) -> Option<(&str, i64)> {
    let caps = session_name_pattern().captures(name)?;
    let task_type = caps.get(1)?.as_str();
    let epoch = caps.get(2)?.as_str().parse().ok()?;
    Some((task_type, epoch))
}

// ============================================================================
// Environment Overrides
// ============================================================================

/// A single `KEY=VALUE` override applied to the task's environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvOverride {
    pub key: String,
    pub value: String,
}

impl EnvOverride {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if !env_key_pattern().is_match(&key) {
            return Err(Error::InvalidArgument(format!(
                "invalid environment variable name '{}'",
                key
            )));
        }
        Ok(Self {
            key,
            value: value.into(),
        })
    }
}

impl FromStr for EnvOverride {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (key, value) = s.split_once('=').ok_or_else(|| {
            Error::InvalidArgument(format!("expected KEY=VALUE, got '{}'", s))
        })?;
        Self::new(key, value)
    }
}

impl std::fmt::Display for EnvOverride {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Display string stored in the status record's `env_vars` field
pub fn env_display(env: &[EnvOverride]) -> String {
    env.iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// Command
// ============================================================================

/// The argument vector a task executes.
///
/// A single element is treated as a shell snippet and run through `sh -c`;
/// several elements are executed directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCommand(Vec<String>);

impl TaskCommand {
    pub fn new(args: Vec<String>) -> Result<Self> {
        if args.is_empty() || args.iter().all(|a| a.trim().is_empty()) {
            return Err(Error::InvalidArgument("command must not be empty".to_string()));
        }
        Ok(Self(args))
    }

    pub fn args(&self) -> &[String] {
        &self.0
    }

    /// Whether the command is a single shell snippet
    pub fn is_shell_snippet(&self) -> bool {
        self.0.len() == 1
    }

    /// Program and arguments as actually spawned
    pub fn program_and_args(&self) -> (String, Vec<String>) {
        if self.is_shell_snippet() {
            ("sh".to_string(), vec!["-c".to_string(), self.0[0].clone()])
        } else {
            (self.0[0].clone(), self.0[1..].to_vec())
        }
    }

    /// Human readable form recorded in the status record
    pub fn display(&self) -> String {
        self.0.join(" ")
    }
}

// ============================================================================
// Launch Request
// ============================================================================

/// Everything the caller supplies to `run`
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    /// Caller-chosen label, e.g. "build" or "test"
    pub task_type: String,
    pub command: Vec<String>,
    pub workdir: Option<PathBuf>,
    pub env: Vec<EnvOverride>,
    pub notify: bool,
}

impl LaunchRequest {
    pub fn new(task_type: impl Into<String>, command: Vec<String>) -> Self {
        Self {
            task_type: task_type.into(),
            command,
            workdir: None,
            env: Vec::new(),
            notify: false,
        }
    }

    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    pub fn with_env(mut self, env: EnvOverride) -> Self {
        self.env.push(env);
        self
    }

    pub fn with_notify(mut self, notify: bool) -> Self {
        self.notify = notify;
        self
    }
}
