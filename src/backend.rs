use crate::{
    config::ClientConfig,
    error::{Result, StudioError},
    io::net::{check_status, download_with_progress, error_detail, http_client},
    types::{
        Credentials, HistoryResponse, JobSnapshot, JobSource, LoginResponse, Project,
        SubmitResponse, UserProfile,
    },
};
use reqwest::{
    blocking::{multipart::Form, Client, RequestBuilder},
    StatusCode,
};
use std::path::Path;

/// Outcome of reading a job's status.
#[derive(Clone, Debug)]
pub enum JobPoll {
    Found(JobSnapshot),
    /// The server has no record of the id (e.g. it restarted and dropped
    /// its in-memory job table).
    NotFound,
}

/// The slice of the server API the tracker talks to.
pub trait Backend {
    /// Start a separation job; returns the server-assigned job id.
    fn submit(&self, token: &str, source: &JobSource) -> Result<String>;

    fn fetch_job(&self, job_id: &str) -> Result<JobPoll>;

    fn history(&self, token: &str) -> Result<Vec<Project>>;
}

impl<B: Backend + ?Sized> Backend for &B {
    fn submit(&self, token: &str, source: &JobSource) -> Result<String> {
        (**self).submit(token, source)
    }

    fn fetch_job(&self, job_id: &str) -> Result<JobPoll> {
        (**self).fetch_job(job_id)
    }

    fn history(&self, token: &str) -> Result<Vec<Project>> {
        (**self).history(token)
    }
}

/// reqwest-backed client for the HTTP API.
pub struct HttpBackend {
    client: Client,
    cfg: ClientConfig,
}

impl HttpBackend {
    pub fn new(cfg: ClientConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(&cfg)?,
            cfg,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.cfg
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn authed(&self, req: RequestBuilder, token: &str) -> RequestBuilder {
        req.header(reqwest::header::AUTHORIZATION, format!("Bearer {token}"))
    }

    pub fn login(&self, creds: &Credentials) -> Result<LoginResponse> {
        let url = self.cfg.endpoint("login")?;
        let resp = self.client.post(url).json(creds).send()?;
        if resp.status() == StatusCode::BAD_REQUEST || resp.status() == StatusCode::UNAUTHORIZED {
            return Err(StudioError::AuthRequired);
        }
        Ok(check_status(resp)?.json()?)
    }

    /// Create an account. The server answers 400 for a taken username.
    pub fn signup(&self, creds: &Credentials) -> Result<()> {
        let url = self.cfg.endpoint("signup")?;
        let resp = self.client.post(url).json(creds).send()?;
        if resp.status() == StatusCode::BAD_REQUEST {
            return Err(StudioError::SignupRejected(error_detail(resp)));
        }
        check_status(resp)?;
        Ok(())
    }

    /// Log in, creating the account first if the server does not know it.
    pub fn login_or_signup(&self, creds: &Credentials) -> Result<LoginResponse> {
        match self.login(creds) {
            Err(StudioError::AuthRequired) => {
                log::info!("login for `{}` refused; trying sign-up", creds.username);
                self.signup(creds)?;
                self.login(creds)
            }
            other => other,
        }
    }

    pub fn logout(&self, token: &str) -> Result<()> {
        let url = self.cfg.endpoint("logout")?;
        check_status(self.authed(self.client.post(url), token).send()?)?;
        Ok(())
    }

    /// Profile and remaining credits of the signed-in user.
    pub fn me(&self, token: &str) -> Result<UserProfile> {
        let url = self.cfg.endpoint("me")?;
        let resp = self.authed(self.client.get(url), token).send()?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(StudioError::AuthRequired);
        }
        Ok(check_status(resp)?.json()?)
    }

    /// Remove a project and its stems from the library.
    pub fn delete_project(&self, token: &str, project_id: &str) -> Result<()> {
        let url = self.cfg.endpoint_for("projects", project_id)?;
        let resp = self.authed(self.client.delete(url), token).send()?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(StudioError::AuthRequired);
        }
        check_status(resp)?;
        log::info!("deleted project {project_id}");
        Ok(())
    }

    /// Fetch the zip of every stem in a project to `dest`.
    pub fn download_zip(
        &self,
        project_id: &str,
        dest: &Path,
        on_progress: &mut dyn FnMut(u64, u64),
    ) -> Result<u64> {
        let url = self.cfg.endpoint_for("download_zip", project_id)?;
        download_with_progress(&self.client, url.as_str(), dest, on_progress)
    }
}

impl Backend for HttpBackend {
    fn submit(&self, token: &str, source: &JobSource) -> Result<String> {
        let req = match source {
            JobSource::File(path) => {
                let form = Form::new().file("file", path).map_err(|e| {
                    StudioError::UploadFailed(format!("cannot read {}: {e}", path.display()))
                })?;
                self.client
                    .post(self.cfg.endpoint("process_file_async")?)
                    .multipart(form)
            }
            JobSource::Url(link) => self
                .client
                .post(self.cfg.endpoint("process_youtube_async")?)
                .form(&[("url", link.as_str())]),
        };

        let resp = self.authed(req, token).send()?;
        match resp.status() {
            StatusCode::UNAUTHORIZED => return Err(StudioError::AuthRequired),
            StatusCode::PAYMENT_REQUIRED => {
                return Err(StudioError::InsufficientCredits(error_detail(resp)))
            }
            s if !s.is_success() => return Err(StudioError::UploadFailed(error_detail(resp))),
            _ => {}
        }

        let body: SubmitResponse = resp.json()?;
        Ok(body.job_id)
    }

    fn fetch_job(&self, job_id: &str) -> Result<JobPoll> {
        let url = self.cfg.endpoint_for("jobs", job_id)?;
        let resp = self.client.get(url).send()?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(JobPoll::NotFound);
        }
        let snapshot: JobSnapshot = check_status(resp)?.json()?;
        Ok(JobPoll::Found(snapshot))
    }

    fn history(&self, token: &str) -> Result<Vec<Project>> {
        let url = self.cfg.endpoint("history")?;
        let resp = self.authed(self.client.get(url), token).send()?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(StudioError::AuthRequired);
        }
        let body: HistoryResponse = check_status(resp)?.json()?;
        Ok(body.into_projects())
    }
}

/// Stem URLs look like `/stems/<model>/<project_id>/<stem>.wav`; the
/// project id is the directory holding the file.
pub fn project_id_from_stem_url(url: &str) -> Option<String> {
    let path = match url::Url::parse(url) {
        Ok(u) => u.path().to_string(),
        Err(_) => url.split(|c: char| c == '?' || c == '#').next().unwrap_or(url).to_string(),
    };
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let at = segments.iter().position(|s| *s == "stems")?;
    // stems / model / project / file
    if segments.len() >= at + 4 {
        Some(segments[at + 2].to_string())
    } else {
        None
    }
}
