use crate::error::{Result, StudioError};
use std::{env, path::PathBuf, time::Duration};
use url::Url;

pub const DEFAULT_API_BASE: &str = "http://localhost:3000/api";

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base every endpoint path is joined onto, e.g. `http://host:3000/api`.
    pub api_base: Url,
    pub poll_interval: Duration,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Overrides the platform data dir for the persisted client state.
    pub state_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: Url::parse(DEFAULT_API_BASE).expect("default API base is a valid URL"),
            poll_interval: Duration::from_millis(1500),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60 * 10),
            state_dir: None,
        }
    }
}

impl ClientConfig {
    /// Defaults, overridden by `STEM_STUDIO_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();

        if let Ok(base) = env::var("STEM_STUDIO_API_BASE") {
            cfg = cfg.with_api_base(&base)?;
        }
        if let Ok(ms) = env::var("STEM_STUDIO_POLL_MS") {
            let ms: u64 = ms
                .parse()
                .map_err(|_| StudioError::Config(format!("STEM_STUDIO_POLL_MS: `{ms}`")))?;
            cfg.poll_interval = Duration::from_millis(ms);
        }
        if let Ok(secs) = env::var("STEM_STUDIO_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|_| StudioError::Config(format!("STEM_STUDIO_TIMEOUT_SECS: `{secs}`")))?;
            cfg.request_timeout = Duration::from_secs(secs);
        }
        if let Ok(dir) = env::var("STEM_STUDIO_STATE_DIR") {
            cfg.state_dir = Some(PathBuf::from(dir));
        }

        Ok(cfg)
    }

    pub fn with_api_base(mut self, base: &str) -> Result<Self> {
        // Url::join drops the last segment unless the base ends with '/'.
        let normalized = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{base}/")
        };
        self.api_base = Url::parse(&normalized)?;
        Ok(self)
    }

    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let base = if self.api_base.path().ends_with('/') {
            self.api_base.clone()
        } else {
            Url::parse(&format!("{}/", self.api_base))?
        };
        Ok(base.join(path.trim_start_matches('/'))?)
    }

    /// `endpoint(path)` with `id` appended as one percent-encoded segment.
    pub fn endpoint_for(&self, path: &str, id: &str) -> Result<Url> {
        let mut url = self.endpoint(path.trim_end_matches('/'))?;
        let url_str = url.to_string();
        url.path_segments_mut()
            .map_err(|_| StudioError::Config(format!("API base cannot hold a path: {url_str}")))?
            .push(id);
        Ok(url)
    }

    /// Stem URLs come back server-relative (`/stems/...`); resolve them
    /// against the API origin.
    pub fn resolve_media(&self, url: &str) -> Result<Url> {
        Ok(self.api_base.join(url)?)
    }

    pub fn state_dir(&self) -> Result<PathBuf> {
        match &self.state_dir {
            Some(dir) => Ok(dir.clone()),
            None => crate::io::paths::state_dir(),
        }
    }
}
