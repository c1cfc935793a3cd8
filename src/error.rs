use thiserror::Error;

/// Central error type for the stem-studio-core crate.
#[derive(Debug, Error)]
pub enum StudioError {
    // Generic fallback (wraps anyhow)
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),

    // Job lifecycle
    #[error("Login required")]
    AuthRequired,

    #[error("A job is already being tracked ({job_id})")]
    JobAlreadyActive { job_id: String },

    #[error("Job {job_id} is no longer known to the server")]
    JobLost { job_id: String },

    #[error("Job failed: {message}")]
    JobFailed { message: String },

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Insufficient credits: {0}")]
    InsufficientCredits(String),

    #[error("Job {job_id} is tracked but could not be saved; it will not survive a restart ({reason})")]
    NotPersisted { job_id: String, reason: String },

    #[error("Sign-up rejected: {0}")]
    SignupRejected(String),

    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Server returned HTTP {status} for {url}")]
    Http { status: u16, url: String },

    // Mixer
    #[error("Stem `{channel}` unavailable: {reason}")]
    ChannelLoad { channel: String, reason: String },

    #[error("No channel named `{0}` in the open session")]
    UnknownChannel(String),

    #[error("No mixer session is open")]
    NoSession,

    // Environment
    #[error("Config error: {0}")]
    Config(String),

    #[error("State dir not available")]
    StateDirUnavailable,
}

// --- Implement From conversions for common errors ---
impl From<std::io::Error> for StudioError {
    fn from(e: std::io::Error) -> Self {
        StudioError::Anyhow(e.into())
    }
}

impl From<serde_json::Error> for StudioError {
    fn from(e: serde_json::Error) -> Self {
        StudioError::Anyhow(e.into())
    }
}

impl From<reqwest::Error> for StudioError {
    fn from(e: reqwest::Error) -> Self {
        StudioError::Network(e)
    }
}

impl From<url::ParseError> for StudioError {
    fn from(e: url::ParseError) -> Self {
        StudioError::Config(e.to_string())
    }
}

impl From<symphonia::core::errors::Error> for StudioError {
    fn from(e: symphonia::core::errors::Error) -> Self {
        StudioError::Anyhow(e.into())
    }
}

pub type Result<T> = std::result::Result<T, StudioError>;
