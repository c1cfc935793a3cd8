use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Durable client-side state: the bearer token and the id of the one job
/// currently being tracked. Both survive restarts so a tracker can resume.
pub trait ClientStore {
    fn auth_token(&self) -> Option<String>;
    fn set_auth_token(&mut self, token: &str) -> Result<()>;
    fn clear_auth_token(&mut self) -> Result<()>;

    fn active_job(&self) -> Option<String>;
    fn set_active_job(&mut self, job_id: &str) -> Result<()>;
    fn clear_active_job(&mut self) -> Result<()>;
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct PersistedState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    auth_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    active_job: Option<String>,
}

/// JSON file backed store (`<state_dir>/state.json`).
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    state: PersistedState,
}

impl FileStore {
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join("state.json");

        let state = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                log::warn!("ignoring unreadable state file {}: {e}", path.display());
                PersistedState::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => PersistedState::default(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self { path, state })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        let tmp = self.path.with_extension("part");
        fs::write(&tmp, serde_json::to_vec_pretty(&self.state)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl ClientStore for FileStore {
    fn auth_token(&self) -> Option<String> {
        self.state.auth_token.clone()
    }

    fn set_auth_token(&mut self, token: &str) -> Result<()> {
        self.state.auth_token = Some(token.to_string());
        self.flush()
    }

    fn clear_auth_token(&mut self) -> Result<()> {
        self.state.auth_token = None;
        self.flush()
    }

    fn active_job(&self) -> Option<String> {
        self.state.active_job.clone()
    }

    fn set_active_job(&mut self, job_id: &str) -> Result<()> {
        self.state.active_job = Some(job_id.to_string());
        self.flush()
    }

    fn clear_active_job(&mut self) -> Result<()> {
        self.state.active_job = None;
        self.flush()
    }
}

/// In-process store, for tests and for embedding without a disk.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    state: PersistedState,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            state: PersistedState {
                auth_token: Some(token.to_string()),
                active_job: None,
            },
        }
    }
}

impl ClientStore for MemoryStore {
    fn auth_token(&self) -> Option<String> {
        self.state.auth_token.clone()
    }

    fn set_auth_token(&mut self, token: &str) -> Result<()> {
        self.state.auth_token = Some(token.to_string());
        Ok(())
    }

    fn clear_auth_token(&mut self) -> Result<()> {
        self.state.auth_token = None;
        Ok(())
    }

    fn active_job(&self) -> Option<String> {
        self.state.active_job.clone()
    }

    fn set_active_job(&mut self, job_id: &str) -> Result<()> {
        self.state.active_job = Some(job_id.to_string());
        Ok(())
    }

    fn clear_active_job(&mut self) -> Result<()> {
        self.state.active_job = None;
        Ok(())
    }
}
