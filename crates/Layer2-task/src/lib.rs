//! # taskmux-task
//!
//! Task session lifecycle for taskmux.
//! Runs long-lived commands in detached sessions with durable logs,
//! a completion status record and on-demand inspection.
//!
//! ## Features
//!
//! - Launcher: validation, naming, wrapped command, post-launch liveness check
//! - Runner: the process inside the session that writes log + status
//! - Inspector: `check`, `status`, `list` and a cancellable `tail` stream
//! - Terminator: kill one or all task sessions
//! - Artifact store with age-based pruning

pub mod artifact;
pub mod format;
pub mod host;
pub mod inspector;
pub mod launcher;
pub mod notify;
pub mod runner;
pub mod status;
pub mod task;
pub mod terminator;

// Artifacts
pub use artifact::{ArtifactStore, HistoryEntry, PruneReport};
pub use status::StatusRecord;

// Session host
pub use host::{SessionHost, TmuxHost};

// Task lifecycle
pub use inspector::{CheckReport, HistoryRow, Inspector, LiveTask, TailEvent, TaskListing, TaskStatus};
pub use launcher::{LaunchState, LaunchedTask, Launcher};
pub use runner::{RunSpec, TaskRunner};
pub use task::{EnvOverride, LaunchRequest, TaskCommand};
pub use terminator::{KillOutcome, KillReport, Terminator};

// Helpers
pub use format::{abbreviate, format_duration};
pub use notify::{notify_completion, Notifier};
