//! Task runner - executes a task inside its session
//!
//! This is the body of the wrapped command a session host runs. It:
//! - applies environment overrides
//! - streams combined stdout/stderr to the log file and to its own stdout
//! - captures the command's own exit code
//! - writes the log trailer and then the status record in one rename
//! - optionally sends a completion notification

use crate::notify::notify_completion;
use crate::status::{self, StatusRecord};
use crate::task::{env_display, EnvOverride, TaskCommand};
use chrono::{SubsecRound, Utc};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use taskmux_foundation::{trailer_for, Error, Result};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Exit code recorded when the command cannot be started at all
pub const EXIT_SPAWN_FAILED: i32 = 127;

const CHUNK_SIZE: usize = 8 * 1024;
const CHANNEL_CAPACITY: usize = 64;

/// Everything the runner needs, passed through the wrapped command line
#[derive(Debug, Clone)]
pub struct RunSpec {
    pub name: String,
    pub command: TaskCommand,
    pub log_file: PathBuf,
    pub status_file: PathBuf,
    pub workdir: PathBuf,
    pub env: Vec<EnvOverride>,
    pub notify: bool,
}

impl RunSpec {
    /// Arguments of the hidden `exec` subcommand that reproduce this spec
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "exec".to_string(),
            "--name".to_string(),
            self.name.clone(),
            "--log-file".to_string(),
            self.log_file.display().to_string(),
            "--status-file".to_string(),
            self.status_file.display().to_string(),
            "--workdir".to_string(),
            self.workdir.display().to_string(),
        ];
        for env in &self.env {
            args.push("--env".to_string());
            args.push(env.to_string());
        }
        if self.notify {
            args.push("--notify".to_string());
        }
        args.push("--".to_string());
        args.extend(self.command.args().iter().cloned());
        args
    }
}

/// Runs one task to completion
#[derive(Debug, Clone)]
pub struct TaskRunner {
    /// Mirror output to our own stdout (the session pane)
    echo: bool,
}

impl Default for TaskRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRunner {
    pub fn new() -> Self {
        Self { echo: true }
    }

    /// Runner that only writes to the log file
    pub fn quiet() -> Self {
        Self { echo: false }
    }

    /// Execute the task and persist its status record
    pub async fn run(&self, spec: &RunSpec) -> Result<StatusRecord> {
        let started_at = Utc::now().trunc_subsecs(0);
        info!("Task {} started: {}", spec.name, spec.command.display());

        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&spec.log_file)
            .await?;

        let (exit_code, mut log, ends_with_newline) = self.execute(spec, log).await?;

        let mut trailer = String::new();
        if !ends_with_newline {
            trailer.push('\n');
        }
        trailer.push_str(&trailer_for(exit_code));
        trailer.push('\n');
        log.write_all(trailer.as_bytes()).await?;
        log.flush().await?;
        if self.echo {
            print!("{}", trailer);
        }

        let finished_at = Utc::now().trunc_subsecs(0);
        let record = StatusRecord {
            exit_code: Some(exit_code),
            command: spec.command.display(),
            started_at: Some(started_at),
            finished_at: Some(finished_at),
            duration_seconds: Some((finished_at - started_at).num_seconds()),
            log_file: spec.log_file.display().to_string(),
            workdir: spec.workdir.display().to_string(),
            env_vars: env_display(&spec.env),
        };
        status::write_atomic(&spec.status_file, &record)?;
        info!("Task {} finished with exit code {}", spec.name, exit_code);

        if spec.notify {
            notify_completion(&spec.name, exit_code).await;
        }

        Ok(record)
    }

    /// Spawn the command and pump its output. Returns the exit code, the
    /// log handle and whether the output ended on a newline.
    async fn execute(
        &self,
        spec: &RunSpec,
        mut log: tokio::fs::File,
    ) -> Result<(i32, tokio::fs::File, bool)> {
        let (program, args) = spec.command.program_and_args();
        let mut cmd = Command::new(&program);
        cmd.args(&args)
            .current_dir(&spec.workdir)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for env in &spec.env {
            cmd.env(&env.key, &env.value);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to start {}: {}", program, e);
                let line = format!("taskmux: failed to start '{}': {}\n", program, e);
                log.write_all(line.as_bytes()).await?;
                if self.echo {
                    eprint!("{}", line);
                }
                return Ok((EXIT_SPAWN_FAILED, log, true));
            }
        };

        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(CHANNEL_CAPACITY);
        let mut pumps = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            pumps.push(tokio::spawn(pump(stdout, tx.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(tokio::spawn(pump(stderr, tx.clone())));
        }
        drop(tx);

        let echo = self.echo;
        let writer = tokio::spawn(async move {
            let mut stdout = tokio::io::stdout();
            let mut ends_with_newline = true;
            while let Some(chunk) = rx.recv().await {
                if let Some(last) = chunk.last() {
                    ends_with_newline = *last == b'\n';
                }
                log.write_all(&chunk).await?;
                if echo {
                    // The pane going away must not abort the log
                    let _ = stdout.write_all(&chunk).await;
                    let _ = stdout.flush().await;
                }
            }
            log.flush().await?;
            Ok::<_, std::io::Error>((log, ends_with_newline))
        });

        let status = child.wait().await?;
        for pump in pumps {
            if let Err(e) = pump.await {
                debug!("Output pump for {} ended abnormally: {}", spec.name, e);
            }
        }
        let (log, ends_with_newline) = writer
            .await
            .map_err(|e| Error::Internal(format!("log writer: {}", e)))??;

        Ok((exit_code_of(status), log, ends_with_newline))
    }
}

async fn pump<R>(mut reader: R, tx: mpsc::Sender<Vec<u8>>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!("Output read error: {}", e);
                break;
            }
        }
    }
}

/// Exit code of the command itself; signals map to `128 + signo`
pub fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}
