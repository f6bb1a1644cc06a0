//! tmux session host
//!
//! Every call shells out to the tmux binary. Session targets use the
//! `=name` form so `task-build-1` never matches `task-build-10`.

use super::SessionHost;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use taskmux_foundation::strings::ENV_TMUX;
use taskmux_foundation::{Error, Result, TaskmuxConfig};
use tokio::process::Command;
use tracing::{debug, warn};

/// stderr fragments tmux prints when no server is running
const NO_SERVER_MARKERS: [&str; 3] = ["no server running", "error connecting", "No such file"];

/// tmux-backed session host
#[derive(Debug, Clone)]
pub struct TmuxHost {
    bin: PathBuf,
}

impl TmuxHost {
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        Self { bin: bin.into() }
    }

    /// Resolve the tmux binary from config or PATH
    pub fn detect(config: &TaskmuxConfig) -> Result<Self> {
        if let Some(bin) = &config.tmux_bin {
            return which::which(bin).map(Self::new).map_err(|_| {
                Error::MissingDependency(format!("tmux binary not found at {}", bin.display()))
            });
        }
        which::which("tmux")
            .map(Self::new)
            .map_err(|_| Error::MissingDependency("tmux is not installed or not in PATH".into()))
    }

    pub fn bin(&self) -> &Path {
        &self.bin
    }

    async fn run(&self, args: &[&str]) -> Result<Output> {
        debug!("tmux {}", args.join(" "));
        Command::new(&self.bin)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))
    }

    fn spawn_error(&self, e: std::io::Error) -> Error {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::MissingDependency(format!("tmux binary not found at {}", self.bin.display()))
        } else {
            Error::Io(e)
        }
    }

    async fn new_session(&self, name: &str, command: &str, workdir: Option<&Path>) -> Result<Output> {
        let dir: Option<String> = workdir.map(|w| w.to_string_lossy().into_owned());
        let mut args = vec!["new-session", "-d", "-s", name];
        if let Some(dir) = &dir {
            args.extend(["-c", dir.as_str()]);
        }
        args.push(command);
        self.run(&args).await
    }
}

fn target(name: &str) -> String {
    format!("={}", name)
}

fn pane_target(name: &str) -> String {
    format!("={}:", name)
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

/// Wrap a command so it changes directory first
pub fn with_cd_prefix(command: &str, workdir: &Path) -> Result<String> {
    let dir = workdir.to_string_lossy();
    let quoted = shlex::try_quote(&dir)
        .map_err(|e| Error::InvalidArgument(format!("cannot quote workdir: {}", e)))?;
    Ok(format!("cd {} && {}", quoted, command))
}

#[async_trait]
impl SessionHost for TmuxHost {
    async fn create(&self, name: &str, command: &str, workdir: Option<&Path>) -> Result<()> {
        let first = self.new_session(name, command, workdir).await?;
        if first.status.success() {
            return Ok(());
        }

        let first_err = stderr_of(&first);
        let Some(workdir) = workdir else {
            return Err(Error::launch(
                format!("tmux could not create session {}", name),
                first_err,
            ));
        };

        // Older tmux builds lack `-c`; change directory inside the command instead
        warn!(
            "tmux new-session -c failed for {} ({}), retrying with cd prefix",
            name, first_err
        );
        let fallback = with_cd_prefix(command, workdir)?;
        let second = self.new_session(name, &fallback, None).await?;
        if second.status.success() {
            return Ok(());
        }

        Err(Error::launch(
            format!("tmux could not create session {}", name),
            format!("{}\n{}", first_err, stderr_of(&second)),
        ))
    }

    async fn is_alive(&self, name: &str) -> Result<bool> {
        let output = self.run(&["has-session", "-t", &target(name)]).await?;
        Ok(output.status.success())
    }

    async fn capture_output(&self, name: &str, last_n: usize) -> Result<String> {
        let start = format!("-{}", last_n);
        let output = self
            .run(&["capture-pane", "-p", "-J", "-t", &pane_target(name), "-S", &start])
            .await?;
        if !output.status.success() {
            return Err(Error::NotFound(format!(
                "cannot capture session {}: {}",
                name,
                stderr_of(&output)
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn kill(&self, name: &str) -> Result<()> {
        let output = self.run(&["kill-session", "-t", &target(name)]).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(Error::Host(format!(
                "failed to kill session {}: {}",
                name,
                stderr_of(&output)
            )))
        }
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let output = self.run(&["list-sessions", "-F", "#{session_name}"]).await?;
        if !output.status.success() {
            let err = stderr_of(&output);
            if NO_SERVER_MARKERS.iter().any(|m| err.contains(m)) {
                return Ok(Vec::new());
            }
            return Err(Error::Host(format!("failed to list sessions: {}", err)));
        }

        let mut names: Vec<String> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|n| n.starts_with(prefix))
            .map(str::to_string)
            .collect();
        names.sort();
        Ok(names)
    }

    async fn attach(&self, name: &str) -> Result<()> {
        let subcommand = if std::env::var_os(ENV_TMUX).is_some() {
            "switch-client"
        } else {
            "attach-session"
        };
        let status = Command::new(&self.bin)
            .args([subcommand, "-t", &target(name)])
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if status.success() {
            Ok(())
        } else {
            Err(Error::Host(format!("tmux {} failed for {}", subcommand, name)))
        }
    }
}
