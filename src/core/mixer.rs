//! Multi-stem mixer: one playback channel per stem, all slaved to a single
//! transport clock.
//!
//! The first channel in priority order is the driver. Only its events move
//! the transport readout; every other channel just follows whatever
//! play/pause/seek the transport issues.

use crate::{
    core::{
        playback::{ChannelEvent, PlaybackFactory, PlaybackHandle},
        stem::{sort_stems, StemKind},
    },
    error::{Result, StudioError},
};

#[derive(Clone, Debug, PartialEq)]
pub enum ChannelStatus {
    Loading,
    Ready,
    Unavailable(String),
}

pub struct StemChannel {
    name: String,
    kind: StemKind,
    source_url: String,
    muted: bool,
    status: ChannelStatus,
    handle: Option<Box<dyn PlaybackHandle>>,
}

impl StemChannel {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StemKind {
        self.kind
    }

    pub fn label(&self) -> String {
        self.kind.label(&self.name)
    }

    pub fn color(&self) -> &'static str {
        self.kind.color()
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// The user's own mute flag, independent of solo.
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn status(&self) -> &ChannelStatus {
        &self.status
    }

    /// Current play head of the underlying media, if it loaded.
    pub fn position(&self) -> Option<f64> {
        self.handle.as_ref().map(|h| h.position())
    }

    pub fn duration(&self) -> Option<f64> {
        self.handle.as_ref().and_then(|h| h.duration())
    }

    /// Whether this channel still has media behind it.
    pub fn is_playable(&self) -> bool {
        self.handle.is_some()
    }

    fn mark_unavailable(&mut self, reason: String) {
        log::warn!("stem `{}` unavailable: {}", self.name, reason);
        if let Some(mut h) = self.handle.take() {
            h.release();
        }
        self.status = ChannelStatus::Unavailable(reason);
    }
}

impl std::fmt::Debug for StemChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StemChannel")
            .field("name", &self.name)
            .field("source_url", &self.source_url)
            .field("muted", &self.muted)
            .field("status", &self.status)
            .finish()
    }
}

/// Shared clock state. `position` and `duration` mirror the driver.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Transport {
    pub is_playing: bool,
    pub position: f64,
    pub duration: Option<f64>,
}

/// Result of a play/pause request. The transport always takes the requested
/// state; channels that refused are listed here and marked unavailable.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransportReport {
    pub is_playing: bool,
    pub failed: Vec<String>,
}

struct Session {
    title: String,
    channels: Vec<StemChannel>,
    solo: Option<usize>,
    transport: Transport,
}

impl Session {
    fn index_of(&self, name: &str) -> Result<usize> {
        self.channels
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| StudioError::UnknownChannel(name.to_string()))
    }

    fn effective_muted(&self, idx: usize) -> bool {
        match self.solo {
            Some(target) => idx != target,
            None => self.channels[idx].muted,
        }
    }

    fn apply_volumes(&mut self) {
        for idx in 0..self.channels.len() {
            let muted = self.effective_muted(idx);
            if let Some(h) = self.channels[idx].handle.as_mut() {
                h.set_muted(muted);
            }
        }
    }

    fn seek_all(&mut self, secs: f64) -> f64 {
        let mut t = if secs.is_finite() { secs.max(0.0) } else { 0.0 };
        if let Some(d) = self.transport.duration {
            t = t.min(d);
        }
        for ch in &mut self.channels {
            if let Some(h) = ch.handle.as_mut() {
                h.set_time(t);
            }
        }
        self.transport.position = t;
        t
    }

    fn pause_all(&mut self) {
        for ch in &mut self.channels {
            if let Some(h) = ch.handle.as_mut() {
                h.pause();
            }
        }
        self.transport.is_playing = false;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for ch in &mut self.channels {
            if let Some(mut h) = ch.handle.take() {
                h.pause();
                h.release();
            }
        }
        log::debug!("mixer session `{}` released", self.title);
    }
}

pub struct MixerEngine<F: PlaybackFactory> {
    factory: F,
    session: Option<Session>,
}

impl<F: PlaybackFactory> MixerEngine<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            session: None,
        }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Replace whatever is open with a fresh session for `stems`.
    pub fn open<I, K, V>(&mut self, title: &str, stems: I) -> &[StemChannel]
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        // Old handles go first; never two sessions alive at once.
        self.session = None;

        // One channel per name; a repeated name keeps its first slot and
        // takes the later URL.
        let mut entries: Vec<(String, String)> = Vec::new();
        for (name, url) in stems {
            let (name, url): (String, String) = (name.into(), url.into());
            match entries.iter_mut().find(|(n, _)| *n == name) {
                Some(slot) => {
                    log::warn!("stem `{name}` listed twice; using {url}");
                    slot.1 = url;
                }
                None => entries.push((name, url)),
            }
        }
        sort_stems(&mut entries);

        let mut channels = Vec::with_capacity(entries.len());
        for (name, url) in entries {
            let kind = StemKind::from_name(&name);
            let mut ch = StemChannel {
                name,
                kind,
                source_url: url,
                muted: false,
                status: ChannelStatus::Loading,
                handle: None,
            };
            match self.factory.create(&ch.name, &ch.source_url) {
                Ok(mut h) => {
                    h.set_muted(false);
                    ch.handle = Some(h);
                }
                Err(e) => ch.mark_unavailable(e.to_string()),
            }
            channels.push(ch);
        }

        log::info!(
            "opened mixer `{}` with {} channel(s): [{}]",
            title,
            channels.len(),
            channels
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let mut session = Session {
            title: title.to_string(),
            channels,
            solo: None,
            transport: Transport::default(),
        };

        // Backends that know the duration up front count as already ready.
        let ready: Vec<(String, f64)> = session
            .channels
            .iter()
            .filter_map(|c| c.duration().map(|d| (c.name.clone(), d)))
            .collect();
        for (name, duration) in ready {
            Self::dispatch(&mut session, &name, ChannelEvent::Ready { duration });
        }

        &self.session.insert(session).channels
    }

    /// Tear down the open session. Returns false when nothing was open.
    pub fn close(&mut self) -> bool {
        match self.session.take() {
            Some(s) => {
                log::info!("closed mixer `{}`", s.title);
                true
            }
            None => false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn title(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.title.as_str())
    }

    pub fn channels(&self) -> &[StemChannel] {
        self.session
            .as_ref()
            .map(|s| s.channels.as_slice())
            .unwrap_or(&[])
    }

    pub fn channel(&self, name: &str) -> Option<&StemChannel> {
        self.channels().iter().find(|c| c.name == name)
    }

    /// True when at least one channel can still produce sound.
    pub fn has_playable(&self) -> bool {
        self.channels().iter().any(|c| c.is_playable())
    }

    pub fn driver(&self) -> Option<&StemChannel> {
        self.channels().first()
    }

    pub fn transport(&self) -> Option<&Transport> {
        self.session.as_ref().map(|s| &s.transport)
    }

    pub fn soloed(&self) -> Option<&str> {
        let s = self.session.as_ref()?;
        s.solo.map(|i| s.channels[i].name.as_str())
    }

    /// Whether `name` is currently silent once solo is taken into account.
    pub fn is_effectively_muted(&self, name: &str) -> Result<bool> {
        let s = self.session()?;
        Ok(s.effective_muted(s.index_of(name)?))
    }

    pub fn play(&mut self) -> Result<TransportReport> {
        let s = self.session_mut()?;
        let mut failed = Vec::new();
        for ch in &mut s.channels {
            let outcome = match ch.handle.as_mut() {
                Some(h) => h.play(),
                None => continue,
            };
            if let Err(e) = outcome {
                failed.push(ch.name.clone());
                ch.mark_unavailable(e.to_string());
            }
        }
        s.transport.is_playing = true;
        log::debug!("play ({} channel(s) failed)", failed.len());
        Ok(TransportReport {
            is_playing: true,
            failed,
        })
    }

    pub fn pause(&mut self) -> Result<TransportReport> {
        let s = self.session_mut()?;
        s.pause_all();
        log::debug!("pause at {:.3}s", s.transport.position);
        Ok(TransportReport::default())
    }

    pub fn toggle(&mut self) -> Result<TransportReport> {
        if self.session()?.transport.is_playing {
            self.pause()
        } else {
            self.play()
        }
    }

    /// Move every channel to `secs`, clamped to the known duration.
    /// Returns the position actually applied.
    pub fn seek(&mut self, secs: f64) -> Result<f64> {
        Ok(self.session_mut()?.seek_all(secs))
    }

    pub fn set_muted(&mut self, name: &str, muted: bool) -> Result<()> {
        let s = self.session_mut()?;
        let idx = s.index_of(name)?;
        s.channels[idx].muted = muted;
        let effective = s.effective_muted(idx);
        if let Some(h) = s.channels[idx].handle.as_mut() {
            h.set_muted(effective);
        }
        Ok(())
    }

    /// Toggle solo on `name`. Returns whether `name` is soloed afterwards.
    pub fn set_solo(&mut self, name: &str) -> Result<bool> {
        let s = self.session_mut()?;
        let idx = s.index_of(name)?;
        s.solo = if s.solo == Some(idx) { None } else { Some(idx) };
        s.apply_volumes();
        Ok(s.solo.is_some())
    }

    /// Feed an event coming from channel `name`'s media.
    pub fn handle_event(&mut self, name: &str, event: ChannelEvent) -> Result<()> {
        let s = self.session_mut()?;
        s.index_of(name)?;
        Self::dispatch(s, name, event);
        Ok(())
    }

    /// The user scrubbed channel `name`'s timeline to `secs`.
    pub fn interaction(&mut self, name: &str, secs: f64) -> Result<()> {
        self.handle_event(name, ChannelEvent::Interaction(secs))
    }

    pub fn load_failed(&mut self, name: &str, reason: &str) -> Result<()> {
        self.handle_event(name, ChannelEvent::LoadFailed(reason.to_string()))
    }

    /// Advance pull-style handles by `dt` seconds and route what they report.
    pub fn advance(&mut self, dt: f64) -> Result<()> {
        let s = self.session_mut()?;
        let mut events = Vec::new();
        for ch in &mut s.channels {
            if let Some(ev) = ch.handle.as_mut().and_then(|h| h.advance(dt)) {
                events.push((ch.name.clone(), ev));
            }
        }
        for (name, ev) in events {
            Self::dispatch(s, &name, ev);
        }
        Ok(())
    }

    fn dispatch(s: &mut Session, name: &str, event: ChannelEvent) {
        let Some(idx) = s.channels.iter().position(|c| c.name == name) else {
            return;
        };
        let is_driver = idx == 0;

        match event {
            ChannelEvent::Ready { duration } => {
                if !matches!(s.channels[idx].status, ChannelStatus::Unavailable(_)) {
                    s.channels[idx].status = ChannelStatus::Ready;
                }
                if is_driver && duration.is_finite() && duration > 0.0 {
                    s.transport.duration = Some(duration);
                }
            }
            ChannelEvent::Position(t) if is_driver => {
                s.transport.position = t;
            }
            ChannelEvent::Finished if is_driver => {
                s.pause_all();
                if let Some(d) = s.transport.duration {
                    s.transport.position = d;
                }
                log::debug!("driver finished; transport stopped");
            }
            ChannelEvent::Position(_) | ChannelEvent::Finished => {}
            ChannelEvent::LoadFailed(reason) => {
                s.channels[idx].mark_unavailable(reason);
            }
            ChannelEvent::Interaction(t) => {
                s.seek_all(t);
            }
        }
    }

    fn session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(StudioError::NoSession)
    }

    fn session_mut(&mut self) -> Result<&mut Session> {
        self.session.as_mut().ok_or(StudioError::NoSession)
    }
}
