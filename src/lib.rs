//! # stem-studio-core
//!
//! Client core for a stem-separation service: submit a track, follow the
//! server-side job until it finishes, then mix the returned stems under a
//! single synchronized transport.

pub mod app;
pub mod backend;
pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod io;
pub mod types;

pub use crate::{
    app::StudioApp,
    backend::{project_id_from_stem_url, Backend, HttpBackend, JobPoll},
    config::ClientConfig,
    core::{
        headless::{HeadlessFactory, HeadlessPlayback},
        mixer::{ChannelStatus, MixerEngine, StemChannel, Transport, TransportReport},
        playback::{ChannelEvent, PlaybackFactory, PlaybackHandle},
        stem::StemKind,
        tracker::{JobTracker, PollOutcome, TrackerState},
    },
    error::{Result, StudioError},
    events::{EventSink, StudioEvent},
    io::store::{ClientStore, FileStore, MemoryStore},
    types::{JobResult, JobSnapshot, JobSource, JobStatus, Project, ProjectRef, StemMap},
};
