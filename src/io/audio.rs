use std::{fs::File, path::Path};

use anyhow::Context;
use symphonia::core::{
    audio::SampleBuffer, codecs::DecoderOptions, errors::Error as DecodeError,
    formats::FormatOptions, io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
};
use symphonia::default::{get_codecs, get_probe};

use crate::error::Result;

/// Peak amplitude under which a stem counts as silent (≈150 on the i16 scale).
pub const SILENCE_PEAK: f32 = 150.0 / 32768.0;

/// What the mixer needs to know about a decoded stem.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub frames: u64,
    pub peak: f32,
}

impl AudioInfo {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames as f64 / self.sample_rate as f64
        }
    }

    pub fn is_silent(&self) -> bool {
        self.peak < SILENCE_PEAK
    }
}

/// Decode a whole file, collecting length and peak level.
pub fn probe_audio<P: AsRef<Path>>(path: P) -> Result<AudioInfo> {
    let path: &Path = path.as_ref();

    let file: File =
        File::open(path).with_context(|| format!("Failed to open audio file: {:?}", path))?;

    let mss: MediaSourceStream = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint: Hint = Hint::new();

    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let mut format = probed.format;
    let track = format.default_track().context("No default track found")?;
    let track_id = track.id;

    let mut decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut sample_rate: u32 = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels: u16 = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(0);
    let mut frames: u64 = 0;
    let mut peak: f32 = 0.0;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(DecodeError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder.decode(&packet)?;
        sample_rate = decoded.spec().rate;
        channels = decoded.spec().channels.count() as u16;
        frames += decoded.frames() as u64;

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        buffer.copy_interleaved_ref(decoded);

        peak = buffer
            .samples()
            .iter()
            .fold(peak, |acc, s| acc.max(s.abs()));
    }

    log::debug!(
        "probed {}: sample_rate={}, channels={}, frames={}, peak={:.4}",
        path.display(),
        sample_rate,
        channels,
        frames,
        peak
    );

    Ok(AudioInfo {
        sample_rate,
        channels,
        frames,
        peak,
    })
}
