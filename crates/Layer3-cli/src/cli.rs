//! Subcommand dispatch
//!
//! Each variant maps to exactly one component call. Handlers return the
//! process exit code; errors bubble up to `main` for mapping.

use crate::render;
use crate::Command;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use taskmux_foundation::{Error, TaskmuxConfig};
use taskmux_task::{
    Inspector, LaunchRequest, Launcher, RunSpec, SessionHost, TaskCommand, TaskRunner,
    Terminator, TmuxHost,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// `kill` target that selects every task session
const KILL_ALL: &str = "all";

/// Run one subcommand to completion
pub async fn dispatch(command: Command, config: &TaskmuxConfig) -> anyhow::Result<i32> {
    match command {
        Command::Run {
            task_type,
            workdir,
            env,
            notify,
            command,
        } => {
            let mut request = LaunchRequest::new(task_type, command).with_notify(notify);
            request.workdir = workdir;
            request.env = env;
            run(config, request).await
        }
        Command::Check { name, json } => {
            let report = inspector(config)?.check(&name).await?;
            render::check(&report, json)?;
            Ok(0)
        }
        Command::List { json } => list(config, json).await,
        Command::Status { name: None, json } => list(config, json).await,
        Command::Status {
            name: Some(name),
            json,
        } => {
            let status = inspector(config)?.status(&name).await?;
            render::status(&status, json)?;
            Ok(0)
        }
        Command::Tail {
            name,
            interval,
            lines,
        } => {
            let interval = interval
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.tail_interval());
            tail(config, &name, interval, lines.unwrap_or(config.tail_lines)).await
        }
        Command::Attach { name } => {
            let host = host(config)?;
            if !host.is_alive(&name).await? {
                return Err(Error::NotFound(format!("no running session named {}", name)).into());
            }
            host.attach(&name).await?;
            Ok(0)
        }
        Command::Kill { target } => kill(config, &target).await,
        Command::Exec {
            name,
            log_file,
            status_file,
            workdir,
            env,
            notify,
            command,
        } => {
            exec(RunSpec {
                name,
                command: TaskCommand::new(command)?,
                log_file,
                status_file,
                workdir,
                env,
                notify,
            })
            .await
        }
    }
}

fn host(config: &TaskmuxConfig) -> taskmux_foundation::Result<Arc<dyn SessionHost>> {
    let host = TmuxHost::detect(config)?;
    debug!("Using tmux at {}", host.bin().display());
    Ok(Arc::new(host))
}

fn inspector(config: &TaskmuxConfig) -> taskmux_foundation::Result<Inspector> {
    Ok(Inspector::from_config(host(config)?, config))
}

async fn run(config: &TaskmuxConfig, request: LaunchRequest) -> anyhow::Result<i32> {
    let program = runner_program()?;
    let launcher = Launcher::from_config(host(config)?, config, program);
    let launched = launcher.launch(request).await?;
    render::launched(&launched);
    Ok(0)
}

async fn list(config: &TaskmuxConfig, json: bool) -> anyhow::Result<i32> {
    let listing = inspector(config)?.list().await?;
    render::listing(&listing, json)?;
    Ok(0)
}

async fn tail(
    config: &TaskmuxConfig,
    name: &str,
    interval: Duration,
    lines: usize,
) -> anyhow::Result<i32> {
    let inspector = inspector(config)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let stream = inspector.tail(name, interval, lines, cancel.clone());
    futures::pin_mut!(stream);
    while let Some(event) = stream.next().await {
        render::tail_event(name, &event?);
    }

    if cancel.is_cancelled() {
        eprintln!("Stopped following {}; the task keeps running.", name);
    }
    Ok(0)
}

async fn kill(config: &TaskmuxConfig, target: &str) -> anyhow::Result<i32> {
    let terminator = Terminator::from_config(host(config)?, config);

    if target == KILL_ALL {
        let report = terminator.kill_all().await?;
        render::kill_report(&report);
        return Ok(if report.failed() > 0 { 1 } else { 0 });
    }

    let outcome = terminator.kill(target).await?;
    render::killed(target, &outcome);
    Ok(0)
}

/// Body of the wrapped command; exits with the task's own exit code
async fn exec(spec: RunSpec) -> anyhow::Result<i32> {
    let record = TaskRunner::new().run(&spec).await?;
    Ok(record.exit_code.unwrap_or(1))
}

fn runner_program() -> taskmux_foundation::Result<PathBuf> {
    std::env::current_exe()
        .map_err(|e| Error::Internal(format!("cannot locate taskmux executable: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use taskmux_task::EnvOverride;

    #[derive(Parser, Debug)]
    struct TestArgs {
        #[command(subcommand)]
        command: Command,
    }

    fn parse(args: &[&str]) -> Command {
        let mut argv = vec!["taskmux"];
        argv.extend_from_slice(args);
        TestArgs::try_parse_from(argv).unwrap().command
    }

    #[test]
    fn test_run_collects_trailing_command() {
        match parse(&[
            "run", "build", "--env", "FOO=bar", "--notify", "--", "cargo", "build", "--release",
        ]) {
            Command::Run {
                task_type,
                env,
                notify,
                command,
                ..
            } => {
                assert_eq!(task_type, "build");
                assert_eq!(env, vec![EnvOverride::new("FOO", "bar").unwrap()]);
                assert!(notify);
                assert_eq!(command, vec!["cargo", "build", "--release"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_run_rejects_bad_env_key() {
        let argv = ["taskmux", "run", "job", "--env", "1X=y", "true"];
        assert!(TestArgs::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_status_name_is_optional() {
        assert!(matches!(
            parse(&["status"]),
            Command::Status { name: None, .. }
        ));
        assert!(matches!(
            parse(&["status", "task-build-1", "--json"]),
            Command::Status { name: Some(_), json: true }
        ));
    }

    #[test]
    fn test_exec_round_trips_run_spec_args() {
        let spec = RunSpec {
            name: "task-job-1".to_string(),
            command: TaskCommand::new(vec!["printenv FOO".to_string()]).unwrap(),
            log_file: PathBuf::from("/tmp/logs/task-job-1.log"),
            status_file: PathBuf::from("/tmp/status/task-job-1.status"),
            workdir: PathBuf::from("/srv"),
            env: vec!["FOO=bar".parse().unwrap()],
            notify: true,
        };
        let args = spec.to_args();
        let argv: Vec<&str> = args.iter().map(String::as_str).collect();

        match parse(&argv) {
            Command::Exec {
                name,
                log_file,
                status_file,
                workdir,
                env,
                notify,
                command,
            } => {
                assert_eq!(name, spec.name);
                assert_eq!(log_file, spec.log_file);
                assert_eq!(status_file, spec.status_file);
                assert_eq!(workdir, spec.workdir);
                assert_eq!(env, spec.env);
                assert!(notify);
                assert_eq!(command, vec!["printenv FOO"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_tail_flags() {
        match parse(&["tail", "task-build-1", "--interval", "5", "-n", "20"]) {
            Command::Tail {
                name,
                interval,
                lines,
            } => {
                assert_eq!(name, "task-build-1");
                assert_eq!(interval, Some(5));
                assert_eq!(lines, Some(20));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
