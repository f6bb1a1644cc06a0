//! Session hosts
//!
//! A session host runs a command detached under a unique name and can
//! report liveness, capture recent output and terminate it.
//! - `TmuxHost` - tmux-backed implementation

pub mod tmux;

pub use tmux::TmuxHost;

use async_trait::async_trait;
use std::path::Path;
use taskmux_foundation::Result;

/// Session host trait - implement to add new detached-execution backends
#[async_trait]
pub trait SessionHost: Send + Sync {
    /// Start `command` detached under `name`, optionally inside `workdir`
    async fn create(&self, name: &str, command: &str, workdir: Option<&Path>) -> Result<()>;

    /// Check if a session with exactly this name exists
    async fn is_alive(&self, name: &str) -> Result<bool>;

    /// Recent output of the session, at most `last_n` lines
    async fn capture_output(&self, name: &str, last_n: usize) -> Result<String>;

    /// Terminate the session
    async fn kill(&self, name: &str) -> Result<()>;

    /// Names of all sessions starting with `prefix`
    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<String>>;

    /// Hand the terminal over to the session
    async fn attach(&self, name: &str) -> Result<()>;
}
