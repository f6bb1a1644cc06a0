//! In-memory session host shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use taskmux_foundation::{Error, Result};
use taskmux_task::{ArtifactStore, SessionHost};

/// A session created through [`FakeHost::create`]
#[derive(Debug, Clone)]
pub struct Created {
    pub name: String,
    pub command: String,
    pub workdir: Option<PathBuf>,
}

#[derive(Default)]
struct State {
    /// Live sessions and their pane contents
    sessions: BTreeMap<String, String>,
    created: Vec<Created>,
    killed: Vec<String>,
    refuse_kill: HashSet<String>,
    fail_capture: HashSet<String>,
    die_on_create: bool,
    refuse_create: bool,
}

/// Session host that keeps everything in memory
#[derive(Default)]
pub struct FakeHost {
    state: Mutex<State>,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add a live session that was not created by a launcher
    pub fn add_session(&self, name: &str) {
        self.state.lock().sessions.insert(name.to_string(), String::new());
    }

    /// Mark a session as ended
    pub fn end(&self, name: &str) {
        self.state.lock().sessions.remove(name);
    }

    pub fn set_output(&self, name: &str, output: &str) {
        if let Some(pane) = self.state.lock().sessions.get_mut(name) {
            *pane = output.to_string();
        }
    }

    /// Sessions exit immediately after being created
    pub fn die_on_create(&self) {
        self.state.lock().die_on_create = true;
    }

    pub fn refuse_create(&self) {
        self.state.lock().refuse_create = true;
    }

    pub fn refuse_kill(&self, name: &str) {
        self.state.lock().refuse_kill.insert(name.to_string());
    }

    /// `has-session` keeps succeeding but `capture-pane` fails, as when a
    /// session exits between the two calls
    pub fn fail_capture(&self, name: &str) {
        self.state.lock().fail_capture.insert(name.to_string());
    }

    pub fn created(&self) -> Vec<Created> {
        self.state.lock().created.clone()
    }

    pub fn killed(&self) -> Vec<String> {
        self.state.lock().killed.clone()
    }

    pub fn live(&self) -> Vec<String> {
        self.state.lock().sessions.keys().cloned().collect()
    }
}

#[async_trait]
impl SessionHost for FakeHost {
    async fn create(&self, name: &str, command: &str, workdir: Option<&Path>) -> Result<()> {
        let mut state = self.state.lock();
        if state.refuse_create {
            return Err(Error::launch(
                format!("could not create session {}", name),
                "fake host refused",
            ));
        }
        state.created.push(Created {
            name: name.to_string(),
            command: command.to_string(),
            workdir: workdir.map(Path::to_path_buf),
        });
        if !state.die_on_create {
            state.sessions.insert(name.to_string(), String::new());
        }
        Ok(())
    }

    async fn is_alive(&self, name: &str) -> Result<bool> {
        Ok(self.state.lock().sessions.contains_key(name))
    }

    async fn capture_output(&self, name: &str, last_n: usize) -> Result<String> {
        let state = self.state.lock();
        if state.fail_capture.contains(name) {
            return Err(Error::NotFound(format!("can't find pane: {}", name)));
        }
        let pane = state
            .sessions
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("no session {}", name)))?;
        let lines: Vec<&str> = pane.lines().collect();
        let start = lines.len().saturating_sub(last_n);
        Ok(lines[start..].join("\n"))
    }

    async fn kill(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock();
        if state.refuse_kill.contains(name) {
            return Err(Error::Host(format!("refusing to kill {}", name)));
        }
        if state.sessions.remove(name).is_none() {
            return Err(Error::Host(format!("no session {}", name)));
        }
        state.killed.push(name.to_string());
        Ok(())
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .state
            .lock()
            .sessions
            .keys()
            .filter(|n| n.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn attach(&self, name: &str) -> Result<()> {
        if self.is_alive(name).await? {
            Ok(())
        } else {
            Err(Error::NotFound(name.to_string()))
        }
    }
}

/// Artifact store rooted in a fresh temp dir
pub fn temp_store() -> (tempfile::TempDir, ArtifactStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path().join("logs"), dir.path().join("status"));
    store.ensure_dirs().unwrap();
    (dir, store)
}
