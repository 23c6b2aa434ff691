// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Call legs: WAV decoding and arrival scheduling.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, bail, Context};
use callmix_core::AudioFrame;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// A leg given on the command line as `PATH[@JOIN_MS]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegSpec {
    pub path: PathBuf,
    /// Delay before the leg's first frame arrives.
    pub join_ms: u64,
}

impl FromStr for LegSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (path, join_ms) = match s.rsplit_once('@') {
            Some((path, delay)) => {
                let join_ms = delay
                    .parse()
                    .map_err(|e| format!("invalid join delay '{delay}' in '{s}': {e}"))?;
                (path, join_ms)
            },
            None => (s, 0),
        };
        if path.is_empty() {
            return Err(format!("missing path in '{s}'"));
        }
        Ok(Self { path: PathBuf::from(path), join_ms })
    }
}

/// A fully decoded leg, interleaved 16-bit.
#[derive(Debug, Clone)]
pub struct DecodedLeg {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl DecodedLeg {
    pub fn samples_per_channel(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / usize::from(self.channels)
        }
    }
}

/// Decodes a WAV file into interleaved 16-bit samples.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or is not decodable PCM.
pub fn decode_wav(path: &Path) -> anyhow::Result<DecodedLeg> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());

    let mut hint = Hint::new();
    hint.with_extension("wav");

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .with_context(|| format!("failed to probe {}", path.display()))?;
    let mut format_reader = probed.format;

    let track = format_reader
        .default_track()
        .ok_or_else(|| anyhow!("no default track in {}", path.display()))?;
    let codec_params = &track.codec_params;
    let sample_rate =
        codec_params.sample_rate.ok_or_else(|| anyhow!("no sample rate in {}", path.display()))?;
    let channel_count = codec_params
        .channels
        .ok_or_else(|| anyhow!("no channel info in {}", path.display()))?
        .count();
    let channels = u16::try_from(channel_count)
        .map_err(|_| anyhow!("channel count {channel_count} exceeds u16::MAX"))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(codec_params, &DecoderOptions::default())
        .with_context(|| format!("failed to create decoder for {}", path.display()))?;
    let track_id = track.id;

    let mut sample_buf: Option<SampleBuffer<i16>> = None;
    let mut samples = Vec::new();

    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(Error::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => {
                tracing::warn!(path = %path.display(), "Error reading WAV packet: {}", e);
                break;
            },
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(audio_buf) => {
                let buf = sample_buf.get_or_insert_with(|| {
                    SampleBuffer::<i16>::new(audio_buf.capacity() as u64, *audio_buf.spec())
                });
                buf.copy_interleaved_ref(audio_buf);
                samples.extend_from_slice(buf.samples());
            },
            Err(Error::DecodeError(err)) => {
                tracing::warn!(path = %path.display(), "WAV decode error (continuing): {}", err);
            },
            Err(e) => bail!("failed to decode {}: {e}", path.display()),
        }
    }

    tracing::info!(
        path = %path.display(),
        sample_rate,
        channels,
        samples = samples.len() / usize::from(channels.max(1)),
        "Decoded leg"
    );
    Ok(DecodedLeg { sample_rate, channels, samples })
}

/// Cuts one decoded leg into frames stamped with the leg's own clock, arriving
/// `join_ms` after the call starts.
#[derive(Debug)]
pub struct LegFeed {
    leg: DecodedLeg,
    join_us: u64,
    frame_samples: usize,
    frame_us: u64,
    next_frame: usize,
    /// Session input index, allocated when the first frame arrives.
    pub index: Option<usize>,
}

impl LegFeed {
    pub fn new(leg: DecodedLeg, join_ms: u64, frame_ms: u32) -> Self {
        let frame_samples =
            usize::try_from(u64::from(leg.sample_rate) * u64::from(frame_ms) / 1000)
                .unwrap_or(usize::MAX)
                .max(1);
        Self {
            leg,
            join_us: join_ms * 1000,
            frame_samples,
            frame_us: u64::from(frame_ms.max(1)) * 1000,
            next_frame: 0,
            index: None,
        }
    }

    /// `(sample_rate, channels)` of the leg.
    pub const fn format(&self) -> (u32, u16) {
        (self.leg.sample_rate, self.leg.channels)
    }

    fn remaining(&self) -> bool {
        self.next_frame * self.frame_samples < self.leg.samples_per_channel()
    }

    /// When the next frame is due, in microseconds of call time.
    pub fn next_arrival_us(&self) -> Option<u64> {
        self.remaining().then(|| self.join_us + self.next_frame as u64 * self.frame_us)
    }

    /// Produces the next frame. The last one may be short.
    pub fn next_frame(&mut self) -> Option<AudioFrame> {
        if !self.remaining() {
            return None;
        }
        let channels = usize::from(self.leg.channels);
        let start = self.next_frame * self.frame_samples;
        let end = (start + self.frame_samples).min(self.leg.samples_per_channel());
        let data = self.leg.samples[start * channels..end * channels].to_vec();
        let timestamp = i64::try_from(start).unwrap_or(i64::MAX);
        self.next_frame += 1;
        Some(AudioFrame::from_interleaved_s16(self.leg.sample_rate, self.leg.channels, timestamp, data))
    }
}

/// Index of the feed whose next frame arrives first. Ties go to the lower index.
pub fn next_due(feeds: &[LegFeed]) -> Option<usize> {
    feeds
        .iter()
        .enumerate()
        .filter_map(|(i, feed)| feed.next_arrival_us().map(|at| (at, i)))
        .min()
        .map(|(_, i)| i)
}
