use crate::types::{JobStatus, Project};

/// Everything the core tells the presentation layer.
#[derive(Clone, Debug, PartialEq)]
pub enum StudioEvent {
    /// Prompt for credentials.
    LoginRequired,
    /// Dismissable toast / notice.
    Notice(String),
    JobSubmitted {
        job_id: String,
    },
    JobResumed {
        job_id: String,
    },
    JobProgress {
        job_id: String,
        status: JobStatus,
        progress: Option<f32>,
    },
    PollError {
        job_id: String,
        message: String,
    },
    JobCompleted {
        job_id: String,
        project: String,
    },
    JobFailed {
        job_id: String,
        message: String,
    },
    JobLost {
        job_id: String,
    },
    /// The drop zone / upload view should be shown again.
    UploadViewRestored,
    HistoryRefreshed(Vec<Project>),
    MixerOpened {
        title: String,
        channels: Vec<String>,
    },
    MixerClosed,
    /// Control goes back to the library listing.
    LibraryRequested,
}

pub trait EventSink {
    fn emit(&mut self, event: StudioEvent);
}

impl<F: FnMut(StudioEvent)> EventSink for F {
    fn emit(&mut self, event: StudioEvent) {
        self(event)
    }
}
