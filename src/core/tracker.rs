//! Tracks the single in-flight separation job for this client.
//!
//! `Idle → Submitting → Polling → {Completed, Failed, Lost} → Idle`, plus
//! `Idle → Polling` through [`JobTracker::resume`]. Terminal outcomes are
//! reported by [`JobTracker::poll`]; the tracker itself is back in `Idle`
//! by the time the caller sees them.

use crate::{
    backend::{Backend, JobPoll},
    error::{Result, StudioError},
    io::store::ClientStore,
    types::{JobResult, JobSource, JobStatus},
};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrackerState {
    Idle,
    Submitting,
    Polling { job_id: String },
}

/// What one poll tick observed.
#[derive(Clone, Debug, PartialEq)]
pub enum PollOutcome {
    /// Nothing is being tracked; no request was made.
    Idle,
    InProgress {
        job_id: String,
        status: JobStatus,
        progress: Option<f32>,
    },
    /// The read itself failed; tracking continues.
    Transient { job_id: String, message: String },
    Completed { job_id: String, result: JobResult },
    Failed { job_id: String, message: String },
    Lost { job_id: String },
}

impl PollOutcome {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PollOutcome::Completed { .. } | PollOutcome::Failed { .. } | PollOutcome::Lost { .. }
        )
    }
}

pub struct JobTracker<B: Backend, S: ClientStore> {
    backend: B,
    store: S,
    state: TrackerState,
}

impl<B: Backend, S: ClientStore> JobTracker<B, S> {
    pub fn new(backend: B, store: S) -> Self {
        Self {
            backend,
            store,
            state: TrackerState::Idle,
        }
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn active_job(&self) -> Option<&str> {
        match &self.state {
            TrackerState::Polling { job_id } => Some(job_id),
            _ => None,
        }
    }

    pub fn is_polling(&self) -> bool {
        matches!(self.state, TrackerState::Polling { .. })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Hand a file or link to the server and start tracking the job.
    ///
    /// Refused while a job is being polled or while an earlier job id is
    /// still persisted (call [`resume`](Self::resume) or
    /// [`forget`](Self::forget) first). If the new id cannot be persisted
    /// the job is still tracked in memory and `NotPersisted` is returned.
    pub fn submit(&mut self, source: JobSource) -> Result<String> {
        if let TrackerState::Polling { job_id } = &self.state {
            return Err(StudioError::JobAlreadyActive {
                job_id: job_id.clone(),
            });
        }
        if let Some(job_id) = self.store.active_job() {
            return Err(StudioError::JobAlreadyActive { job_id });
        }
        let token = self.store.auth_token().ok_or(StudioError::AuthRequired)?;

        self.state = TrackerState::Submitting;
        log::info!("submitting {source}");

        let job_id = match self.backend.submit(&token, &source) {
            Ok(id) => id,
            Err(e) => {
                self.state = TrackerState::Idle;
                log::warn!("submission of {source} failed: {e}");
                return Err(e);
            }
        };

        self.state = TrackerState::Polling {
            job_id: job_id.clone(),
        };
        log::info!("tracking job {job_id}");

        if let Err(e) = self.store.set_active_job(&job_id) {
            log::warn!("could not persist job id {job_id}: {e}");
            return Err(StudioError::NotPersisted {
                job_id,
                reason: e.to_string(),
            });
        }
        Ok(job_id)
    }

    /// Pick up a job persisted by an earlier run. Does nothing unless idle.
    pub fn resume(&mut self) -> Option<String> {
        if self.state != TrackerState::Idle {
            return None;
        }
        let job_id = self.store.active_job()?;
        log::info!("resuming job {job_id}");
        self.state = TrackerState::Polling {
            job_id: job_id.clone(),
        };
        Some(job_id)
    }

    /// One status read. Read errors are reported but never end tracking.
    pub fn poll(&mut self) -> PollOutcome {
        let job_id = match &self.state {
            TrackerState::Polling { job_id } => job_id.clone(),
            _ => return PollOutcome::Idle,
        };

        let snapshot = match self.backend.fetch_job(&job_id) {
            Ok(JobPoll::Found(s)) => s,
            Ok(JobPoll::NotFound) => {
                log::warn!("job {job_id} unknown to server; dropping it");
                self.finish();
                return PollOutcome::Lost { job_id };
            }
            Err(e) => {
                log::warn!("poll of job {job_id} failed, will retry: {e}");
                return PollOutcome::Transient {
                    job_id,
                    message: e.to_string(),
                };
            }
        };

        log::debug!(
            "job {job_id}: {} ({:?})",
            snapshot.status,
            snapshot.progress
        );

        match snapshot.status {
            JobStatus::Completed => {
                self.finish();
                match snapshot.result {
                    Some(result) => {
                        log::info!("job {job_id} completed: {}", result.project.name);
                        PollOutcome::Completed { job_id, result }
                    }
                    None => PollOutcome::Failed {
                        job_id,
                        message: "server reported completion without a result".into(),
                    },
                }
            }
            JobStatus::Failed => {
                self.finish();
                let message = snapshot
                    .error
                    .unwrap_or_else(|| "unknown error".to_string());
                log::info!("job {job_id} failed: {message}");
                PollOutcome::Failed { job_id, message }
            }
            status => PollOutcome::InProgress {
                job_id,
                status,
                progress: snapshot.progress,
            },
        }
    }

    /// Poll every `interval` until a terminal outcome (or until there is
    /// nothing to track). `sleep` is injected so callers can drive this
    /// without real time passing.
    pub fn run_until_terminal(
        &mut self,
        interval: Duration,
        mut sleep: impl FnMut(Duration),
        mut on_tick: impl FnMut(&PollOutcome),
    ) -> PollOutcome {
        loop {
            let outcome = self.poll();
            on_tick(&outcome);
            if outcome.is_terminal() || outcome == PollOutcome::Idle {
                return outcome;
            }
            sleep(interval);
        }
    }

    /// Stop polling locally. The server keeps working and the persisted id
    /// stays, so a later `resume` reconciles with it.
    pub fn cancel(&mut self) {
        if let TrackerState::Polling { job_id } = &self.state {
            log::info!("stopped polling job {job_id}");
        }
        self.state = TrackerState::Idle;
    }

    /// Stop polling and drop the persisted id as well.
    pub fn forget(&mut self) -> Result<()> {
        self.cancel();
        self.store.clear_active_job()
    }

    fn finish(&mut self) {
        self.state = TrackerState::Idle;
        if let Err(e) = self.store.clear_active_job() {
            log::warn!("could not clear persisted job id: {e}");
        }
    }
}
