#![allow(dead_code)]

use serde_json::json;
use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, VecDeque},
    rc::Rc,
};
use stem_studio_core::{
    Backend, ClientStore, JobPoll, JobSnapshot, JobSource, MemoryStore, PlaybackFactory,
    PlaybackHandle, Project, Result, StudioError,
};

// ---------------------------------------------------------------------------
// Backend that replays a fixed script of poll answers.

pub struct ScriptedBackend {
    pub job_id: String,
    pub polls: RefCell<VecDeque<Result<JobPoll>>>,
    pub fetches: Cell<usize>,
    pub submits: Cell<usize>,
    pub history_calls: Cell<usize>,
    pub reject_submit: bool,
}

impl ScriptedBackend {
    pub fn new(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            polls: RefCell::new(VecDeque::new()),
            fetches: Cell::new(0),
            submits: Cell::new(0),
            history_calls: Cell::new(0),
            reject_submit: false,
        }
    }

    pub fn then(self, answer: Result<JobPoll>) -> Self {
        self.polls.borrow_mut().push_back(answer);
        self
    }

    pub fn then_status(self, status: &str) -> Self {
        self.then(Ok(found(json!({ "status": status }))))
    }
}

impl Backend for ScriptedBackend {
    fn submit(&self, _token: &str, _source: &JobSource) -> Result<String> {
        self.submits.set(self.submits.get() + 1);
        if self.reject_submit {
            return Err(StudioError::UploadFailed("server answered HTTP 500".into()));
        }
        Ok(self.job_id.clone())
    }

    fn fetch_job(&self, _job_id: &str) -> Result<JobPoll> {
        self.fetches.set(self.fetches.get() + 1);
        self.polls
            .borrow_mut()
            .pop_front()
            .expect("poll issued after the script ran out")
    }

    fn history(&self, _token: &str) -> Result<Vec<Project>> {
        self.history_calls.set(self.history_calls.get() + 1);
        Ok(Vec::new())
    }
}

pub fn found(body: serde_json::Value) -> JobPoll {
    let snap: JobSnapshot = serde_json::from_value(body).expect("valid snapshot");
    JobPoll::Found(snap)
}

pub fn completed(name: &str, stems: serde_json::Value) -> JobPoll {
    found(json!({
        "status": "completed",
        "progress": 100,
        "result": { "project": { "name": name }, "stems": stems }
    }))
}

// ---------------------------------------------------------------------------
// Store that counts how often the persisted job id is cleared and can be
// told to refuse saving one.

#[derive(Default)]
pub struct CountingStore {
    pub inner: MemoryStore,
    pub job_clears: usize,
    pub fail_job_writes: bool,
}

impl CountingStore {
    pub fn signed_in() -> Self {
        Self {
            inner: MemoryStore::with_token("tok"),
            ..Self::default()
        }
    }
}

impl ClientStore for CountingStore {
    fn auth_token(&self) -> Option<String> {
        self.inner.auth_token()
    }

    fn set_auth_token(&mut self, token: &str) -> Result<()> {
        self.inner.set_auth_token(token)
    }

    fn clear_auth_token(&mut self) -> Result<()> {
        self.inner.clear_auth_token()
    }

    fn active_job(&self) -> Option<String> {
        self.inner.active_job()
    }

    fn set_active_job(&mut self, job_id: &str) -> Result<()> {
        if self.fail_job_writes {
            return Err(anyhow::anyhow!("disk full").into());
        }
        self.inner.set_active_job(job_id)
    }

    fn clear_active_job(&mut self) -> Result<()> {
        self.job_clears += 1;
        self.inner.clear_active_job()
    }
}

// ---------------------------------------------------------------------------
// Playback double whose state the test can inspect after handing it over.

#[derive(Debug, Default)]
pub struct Probe {
    pub position: f64,
    pub muted: bool,
    pub playing: bool,
    pub released: bool,
    pub fail_play: bool,
    pub duration: Option<f64>,
}

pub struct FakeHandle(Rc<RefCell<Probe>>);

impl PlaybackHandle for FakeHandle {
    fn play(&mut self) -> Result<()> {
        let mut p = self.0.borrow_mut();
        if p.fail_play {
            return Err(anyhow::anyhow!("media not ready").into());
        }
        p.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.0.borrow_mut().playing = false;
    }

    fn set_time(&mut self, secs: f64) {
        self.0.borrow_mut().position = secs;
    }

    fn set_muted(&mut self, muted: bool) {
        self.0.borrow_mut().muted = muted;
    }

    fn position(&self) -> f64 {
        self.0.borrow().position
    }

    fn duration(&self) -> Option<f64> {
        self.0.borrow().duration
    }

    fn release(&mut self) {
        let mut p = self.0.borrow_mut();
        p.playing = false;
        p.released = true;
    }
}

#[derive(Default)]
pub struct FakeFactory {
    pub probes: HashMap<String, Rc<RefCell<Probe>>>,
    pub created: Vec<String>,
    pub broken: Vec<String>,
    pub fail_play: Vec<String>,
    pub duration: Option<f64>,
}

impl FakeFactory {
    pub fn probe(&self, name: &str) -> Rc<RefCell<Probe>> {
        self.probes
            .get(name)
            .cloned()
            .unwrap_or_else(|| panic!("no handle created for {name}"))
    }
}

impl PlaybackFactory for FakeFactory {
    fn create(&mut self, name: &str, _url: &str) -> Result<Box<dyn PlaybackHandle>> {
        self.created.push(name.to_string());
        if self.broken.iter().any(|b| b == name) {
            return Err(StudioError::ChannelLoad {
                channel: name.to_string(),
                reason: "decode failed".into(),
            });
        }
        let probe = Rc::new(RefCell::new(Probe {
            fail_play: self.fail_play.iter().any(|f| f == name),
            duration: self.duration,
            ..Probe::default()
        }));
        self.probes.insert(name.to_string(), probe.clone());
        Ok(Box::new(FakeHandle(probe)))
    }
}
