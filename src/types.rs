use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, path::PathBuf};

/// Stem name → playable audio URL, as returned by the server.
pub type StemMap = BTreeMap<String, String>;

/// What the user hands to the tracker: a local file or a remote-media link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobSource {
    File(PathBuf),
    Url(String),
}

impl fmt::Display for JobSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobSource::File(p) => write!(f, "{}", p.display()),
            JobSource::Url(u) => f.write_str(u),
        }
    }
}

/// Backend job status. Only `completed` and `failed` are terminal; anything
/// the server invents beyond the known words is kept verbatim as a stage
/// message and treated as in progress.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    Queued,
    Downloading,
    Processing,
    Completed,
    Failed,
    Stage(String),
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl From<String> for JobStatus {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "queued" => JobStatus::Queued,
            "downloading" => JobStatus::Downloading,
            "processing" => JobStatus::Processing,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            _ => JobStatus::Stage(s),
        }
    }
}

impl From<JobStatus> for String {
    fn from(s: JobStatus) -> Self {
        s.to_string()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Queued => f.write_str("queued"),
            JobStatus::Downloading => f.write_str("downloading"),
            JobStatus::Processing => f.write_str("processing"),
            JobStatus::Completed => f.write_str("completed"),
            JobStatus::Failed => f.write_str("failed"),
            JobStatus::Stage(msg) => f.write_str(msg),
        }
    }
}

/// Body of `GET /jobs/{id}`.
#[derive(Clone, Debug, Deserialize)]
pub struct JobSnapshot {
    pub status: JobStatus,
    #[serde(default)]
    pub progress: Option<f32>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub result: Option<JobResult>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub project: ProjectRef,
    pub stems: StemMap,
    #[serde(default)]
    pub credits_left: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectRef {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SubmitResponse {
    pub job_id: String,
}

/// One row of the user's library.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    #[serde(default, alias = "filename")]
    pub name: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub stems: StemMap,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

/// `/history` answers `{ "projects": [...] }`; older servers answer a bare list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum HistoryResponse {
    Wrapped { projects: Vec<Project> },
    Bare(Vec<Project>),
}

impl HistoryResponse {
    pub(crate) fn into_projects(self) -> Vec<Project> {
        match self {
            HistoryResponse::Wrapped { projects } => projects,
            HistoryResponse::Bare(projects) => projects,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Only read by sign-up.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            email: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub credits: i64,
    #[serde(default)]
    pub plan: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Error body the API sends with non-2xx answers: `{ "detail": ... }`.
/// `detail` is a string for handled errors and a list for validation errors.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub(crate) detail: serde_json::Value,
}

impl ApiErrorBody {
    pub(crate) fn message(&self) -> String {
        match &self.detail {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}
