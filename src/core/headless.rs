use crate::{
    config::ClientConfig,
    core::playback::{ChannelEvent, PlaybackFactory, PlaybackHandle},
    error::{Result, StudioError},
    io::{
        audio::{probe_audio, AudioInfo},
        net::{download_with_progress, http_client},
    },
};
use reqwest::blocking::Client;
use std::path::Path;

/// A playback handle with no audio device behind it: the media is fetched
/// and decoded once to learn its length, after which the play head is a
/// virtual clock moved by `advance`.
#[derive(Debug)]
pub struct HeadlessPlayback {
    info: AudioInfo,
    position: f64,
    playing: bool,
    muted: bool,
    released: bool,
}

impl HeadlessPlayback {
    pub fn new(info: AudioInfo) -> Self {
        Self {
            info,
            position: 0.0,
            playing: false,
            muted: false,
            released: false,
        }
    }

    pub fn info(&self) -> &AudioInfo {
        &self.info
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }
}

impl PlaybackHandle for HeadlessPlayback {
    fn play(&mut self) -> Result<()> {
        if self.released {
            return Err(anyhow::anyhow!("handle already released").into());
        }
        self.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn set_time(&mut self, secs: f64) {
        self.position = secs.clamp(0.0, self.info.duration_secs());
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    fn position(&self) -> f64 {
        self.position
    }

    fn duration(&self) -> Option<f64> {
        Some(self.info.duration_secs())
    }

    fn release(&mut self) {
        self.playing = false;
        self.released = true;
    }

    fn advance(&mut self, dt: f64) -> Option<ChannelEvent> {
        if !self.playing {
            return None;
        }
        let end = self.info.duration_secs();
        self.position = (self.position + dt).min(end);
        if self.position >= end {
            self.playing = false;
            Some(ChannelEvent::Finished)
        } else {
            Some(ChannelEvent::Position(self.position))
        }
    }
}

/// Downloads each stem to a temp file, decodes it and hands back a
/// [`HeadlessPlayback`].
pub struct HeadlessFactory {
    client: Client,
    cfg: ClientConfig,
}

impl HeadlessFactory {
    pub fn new(cfg: ClientConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(&cfg)?,
            cfg,
        })
    }

    fn load(&self, url: &str) -> Result<AudioInfo> {
        let url = self.cfg.resolve_media(url)?;
        let ext = Path::new(url.path())
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();

        let dir = tempfile::tempdir()?;
        let dest = dir.path().join(format!("stem{ext}"));

        download_with_progress(&self.client, url.as_str(), &dest, &mut |_: u64, _: u64| {})?;
        probe_audio(&dest)
    }
}

impl PlaybackFactory for HeadlessFactory {
    fn create(&mut self, name: &str, url: &str) -> Result<Box<dyn PlaybackHandle>> {
        let info = self.load(url).map_err(|e| StudioError::ChannelLoad {
            channel: name.to_string(),
            reason: e.to_string(),
        })?;
        if info.is_silent() {
            log::info!("stem `{name}` is silent (peak {:.5})", info.peak);
        }
        Ok(Box::new(HeadlessPlayback::new(info)))
    }
}
