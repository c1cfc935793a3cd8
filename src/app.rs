//! Root controller: owns the tracker, the mixer and the persisted client
//! state, and is the only place that turns tracker outcomes into mixer
//! actions and user-facing events.

use crate::{
    backend::Backend,
    core::{
        mixer::MixerEngine,
        playback::PlaybackFactory,
        tracker::{JobTracker, PollOutcome},
    },
    error::{Result, StudioError},
    events::{EventSink, StudioEvent},
    io::store::ClientStore,
    types::{JobSource, Project, StemMap},
};
use std::time::Duration;

pub struct StudioApp<B, S, F, E>
where
    B: Backend,
    S: ClientStore,
    F: PlaybackFactory,
    E: EventSink,
{
    tracker: JobTracker<B, S>,
    mixer: MixerEngine<F>,
    events: E,
}

impl<B, S, F, E> StudioApp<B, S, F, E>
where
    B: Backend,
    S: ClientStore,
    F: PlaybackFactory,
    E: EventSink,
{
    pub fn new(backend: B, store: S, factory: F, events: E) -> Self {
        Self {
            tracker: JobTracker::new(backend, store),
            mixer: MixerEngine::new(factory),
            events,
        }
    }

    pub fn tracker(&self) -> &JobTracker<B, S> {
        &self.tracker
    }

    pub fn mixer(&self) -> &MixerEngine<F> {
        &self.mixer
    }

    pub fn mixer_mut(&mut self) -> &mut MixerEngine<F> {
        &mut self.mixer
    }

    pub fn events(&self) -> &E {
        &self.events
    }

    pub fn is_signed_in(&self) -> bool {
        self.tracker.store().auth_token().is_some()
    }

    pub fn sign_in(&mut self, token: &str) -> Result<()> {
        self.tracker.store_mut().set_auth_token(token)
    }

    /// Stop polling, close the mixer and drop the session token.
    pub fn sign_out(&mut self) -> Result<()> {
        self.tracker.forget()?;
        self.close_mixer();
        self.tracker.store_mut().clear_auth_token()
    }

    pub fn submit(&mut self, source: JobSource) -> Result<String> {
        match self.tracker.submit(source) {
            Ok(job_id) => {
                self.events.emit(StudioEvent::Notice(
                    "Upload complete. Processing...".into(),
                ));
                self.events.emit(StudioEvent::JobSubmitted {
                    job_id: job_id.clone(),
                });
                Ok(job_id)
            }
            Err(StudioError::NotPersisted { job_id, reason }) => {
                self.events.emit(StudioEvent::Notice(format!(
                    "Processing, but this job could not be saved and will not survive a restart: {reason}"
                )));
                self.events.emit(StudioEvent::JobSubmitted {
                    job_id: job_id.clone(),
                });
                Ok(job_id)
            }
            Err(e) => {
                match &e {
                    StudioError::AuthRequired => {
                        self.events.emit(StudioEvent::LoginRequired);
                    }
                    StudioError::JobAlreadyActive { .. } => {
                        self.events.emit(StudioEvent::Notice(e.to_string()));
                    }
                    StudioError::InsufficientCredits(_) => {
                        self.events.emit(StudioEvent::Notice(e.to_string()));
                        self.events.emit(StudioEvent::UploadViewRestored);
                    }
                    _ => {
                        self.events.emit(StudioEvent::Notice("Upload failed".into()));
                        self.events.emit(StudioEvent::UploadViewRestored);
                    }
                }
                Err(e)
            }
        }
    }

    pub fn resume(&mut self) -> Option<String> {
        let job_id = self.tracker.resume()?;
        self.events.emit(StudioEvent::JobResumed {
            job_id: job_id.clone(),
        });
        Some(job_id)
    }

    /// One poll tick plus whatever the outcome calls for.
    pub fn tick(&mut self) -> PollOutcome {
        let outcome = self.tracker.poll();
        self.react(&outcome);
        outcome
    }

    /// Tick until the tracked job ends (or nothing is tracked).
    pub fn run_until_terminal(
        &mut self,
        interval: Duration,
        mut sleep: impl FnMut(Duration),
    ) -> PollOutcome {
        loop {
            let outcome = self.tick();
            if outcome.is_terminal() || outcome == PollOutcome::Idle {
                return outcome;
            }
            sleep(interval);
        }
    }

    fn react(&mut self, outcome: &PollOutcome) {
        match outcome {
            PollOutcome::Idle => {}
            PollOutcome::InProgress {
                job_id,
                status,
                progress,
            } => self.events.emit(StudioEvent::JobProgress {
                job_id: job_id.clone(),
                status: status.clone(),
                progress: *progress,
            }),
            PollOutcome::Transient { job_id, message } => {
                self.events.emit(StudioEvent::PollError {
                    job_id: job_id.clone(),
                    message: message.clone(),
                })
            }
            PollOutcome::Completed { job_id, result } => {
                self.events.emit(StudioEvent::JobCompleted {
                    job_id: job_id.clone(),
                    project: result.project.name.clone(),
                });
                self.open_mixer(&result.project.name, &result.stems);
                self.refresh_history();
            }
            PollOutcome::Failed { job_id, message } => {
                self.events.emit(StudioEvent::JobFailed {
                    job_id: job_id.clone(),
                    message: message.clone(),
                });
                self.events
                    .emit(StudioEvent::Notice(format!("Processing failed: {message}")));
                self.events.emit(StudioEvent::UploadViewRestored);
                self.refresh_history();
            }
            PollOutcome::Lost { job_id } => {
                self.events.emit(StudioEvent::JobLost {
                    job_id: job_id.clone(),
                });
                self.events.emit(StudioEvent::Notice(
                    "The server lost track of this job (it may have restarted).".into(),
                ));
                self.events.emit(StudioEvent::UploadViewRestored);
                self.refresh_history();
            }
        }
    }

    pub fn open_mixer(&mut self, title: &str, stems: &StemMap) {
        let channels = self
            .mixer
            .open(title, stems)
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        self.events.emit(StudioEvent::MixerOpened {
            title: title.to_string(),
            channels,
        });
    }

    /// Open a project from the library.
    pub fn open_project(&mut self, project: &Project) {
        self.open_mixer(&project.name, &project.stems);
    }

    pub fn close_mixer(&mut self) {
        if self.mixer.close() {
            self.events.emit(StudioEvent::MixerClosed);
            self.events.emit(StudioEvent::LibraryRequested);
        }
    }

    /// Reload the library listing. Failures are only logged.
    pub fn refresh_history(&mut self) -> Option<Vec<Project>> {
        let token = self.tracker.store().auth_token()?;
        match self.tracker.backend().history(&token) {
            Ok(projects) => {
                self.events
                    .emit(StudioEvent::HistoryRefreshed(projects.clone()));
                Some(projects)
            }
            Err(e) => {
                log::warn!("history refresh failed: {e}");
                None
            }
        }
    }
}
