//! Desktop notifications on task completion
//!
//! Best-effort only: a missing notifier or a failed delivery is logged at
//! debug level and otherwise ignored.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Longest a notifier may run before it is abandoned
pub const NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Supported notifier binaries, in detection order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierKind {
    NotifySend,
    TerminalNotifier,
    Osascript,
}

impl NotifierKind {
    const ALL: [NotifierKind; 3] = [
        NotifierKind::NotifySend,
        NotifierKind::TerminalNotifier,
        NotifierKind::Osascript,
    ];

    pub fn binary(&self) -> &'static str {
        match self {
            Self::NotifySend => "notify-send",
            Self::TerminalNotifier => "terminal-notifier",
            Self::Osascript => "osascript",
        }
    }

    /// Arguments for one notification
    pub fn args(&self, title: &str, body: &str) -> Vec<String> {
        match self {
            Self::NotifySend => vec![title.to_string(), body.to_string()],
            Self::TerminalNotifier => vec![
                "-title".to_string(),
                title.to_string(),
                "-message".to_string(),
                body.to_string(),
            ],
            Self::Osascript => vec![
                "-e".to_string(),
                format!(
                    "display notification \"{}\" with title \"{}\"",
                    applescript_escape(body),
                    applescript_escape(title)
                ),
            ],
        }
    }
}

fn applescript_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// A resolved notifier binary
#[derive(Debug, Clone)]
pub struct Notifier {
    kind: NotifierKind,
    bin: PathBuf,
    timeout: Duration,
}

impl Notifier {
    pub fn new(kind: NotifierKind, bin: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            bin: bin.into(),
            timeout: NOTIFY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// First notifier found on PATH
    pub fn detect() -> Option<Self> {
        NotifierKind::ALL.iter().find_map(|kind| {
            which::which(kind.binary())
                .ok()
                .map(|bin| Self::new(*kind, bin))
        })
    }

    /// Send a notification, swallowing every failure.
    ///
    /// A notifier still running after the timeout is killed.
    pub async fn send(&self, title: &str, body: &str) {
        let status = Command::new(&self.bin)
            .args(self.kind.args(title, body))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        match tokio::time::timeout(self.timeout, status).await {
            Ok(Ok(status)) if status.success() => {}
            Ok(Ok(status)) => debug!("{} exited with {}", self.kind.binary(), status),
            Ok(Err(e)) => debug!("Failed to run {}: {}", self.kind.binary(), e),
            Err(_) => debug!(
                "{} did not finish within {:?}; abandoned",
                self.kind.binary(),
                self.timeout
            ),
        }
    }
}

/// Title and body for a completion notification
pub fn completion_message(name: &str, exit_code: i32) -> (String, String) {
    let title = format!("taskmux: {}", name);
    let body = if exit_code == 0 {
        "completed successfully".to_string()
    } else {
        format!("failed with exit code {}", exit_code)
    };
    (title, body)
}

/// Notify completion through whichever notifier is available
pub async fn notify_completion(name: &str, exit_code: i32) {
    let Some(notifier) = Notifier::detect() else {
        debug!("No notifier available for {}", name);
        return;
    };
    let (title, body) = completion_message(name, exit_code);
    notifier.send(&title, &body).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_message() {
        let (title, body) = completion_message("task-build-1", 0);
        assert_eq!(title, "taskmux: task-build-1");
        assert_eq!(body, "completed successfully");

        let (_, body) = completion_message("task-build-1", 2);
        assert_eq!(body, "failed with exit code 2");
    }

    #[test]
    fn test_osascript_args_escape_quotes() {
        let args = NotifierKind::Osascript.args("t \"1\"", "b");
        assert_eq!(args[0], "-e");
        assert_eq!(
            args[1],
            "display notification \"b\" with title \"t \\\"1\\\"\""
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_send_gives_up_on_hung_notifier() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("notify-send");
        std::fs::write(&bin, "#!/bin/sh\nsleep 5\n").unwrap();
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();

        let notifier = Notifier::new(NotifierKind::NotifySend, &bin)
            .with_timeout(Duration::from_millis(100));
        let started = std::time::Instant::now();
        notifier.send("title", "body").await;
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_notify_send_args() {
        assert_eq!(
            NotifierKind::NotifySend.args("title", "body"),
            vec!["title", "body"]
        );
    }
}
