// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Core data types that flow through the mixer.
//!
//! - [`SampleFormat`]: sample encoding tag (type + interleaved/planar)
//! - [`ChannelLayout`]: channel count with its default speaker mask
//! - [`Plane`]: one buffer of typed samples
//! - [`AudioFrame`]: a timestamped block of PCM audio
//!
//! Timestamps are expressed in sample-clock units (one tick per sample frame at the
//! frame's sample rate), which is what the synchronizer does all of its arithmetic in.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Primitive type of a single sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleType {
    S16,
    S32,
    F32,
}

/// Describes the encoding of raw audio data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum SampleFormat {
    /// 16-bit signed integer, interleaved
    #[serde(rename = "s16")]
    S16,
    /// 16-bit signed integer, one plane per channel
    #[serde(rename = "s16p")]
    S16Planar,
    /// 32-bit signed integer, interleaved
    #[serde(rename = "s32")]
    S32,
    /// 32-bit signed integer, one plane per channel
    #[serde(rename = "s32p")]
    S32Planar,
    /// 32-bit floating point, interleaved
    #[serde(rename = "f32")]
    F32,
    /// 32-bit floating point, one plane per channel
    #[serde(rename = "f32p")]
    F32Planar,
}

impl SampleFormat {
    pub const fn sample_type(self) -> SampleType {
        match self {
            Self::S16 | Self::S16Planar => SampleType::S16,
            Self::S32 | Self::S32Planar => SampleType::S32,
            Self::F32 | Self::F32Planar => SampleType::F32,
        }
    }

    pub const fn is_planar(self) -> bool {
        matches!(self, Self::S16Planar | Self::S32Planar | Self::F32Planar)
    }

    pub const fn bytes_per_sample(self) -> usize {
        match self.sample_type() {
            SampleType::S16 => 2,
            SampleType::S32 | SampleType::F32 => 4,
        }
    }

    /// Number of buffers a frame of this format carries for `channels` channels.
    pub const fn plane_count(self, channels: u16) -> usize {
        if self.is_planar() {
            channels as usize
        } else {
            1
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::S16 => "s16",
            Self::S16Planar => "s16p",
            Self::S32 => "s32",
            Self::S32Planar => "s32p",
            Self::F32 => "f32",
            Self::F32Planar => "f32p",
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A channel count together with its speaker-position bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelLayout {
    channels: u16,
    mask: u64,
}

impl ChannelLayout {
    pub const MONO: Self = Self { channels: 1, mask: 0x4 };
    pub const STEREO: Self = Self { channels: 2, mask: 0x3 };

    /// The conventional layout for a bare channel count.
    ///
    /// Counts without a conventional arrangement get an unspecified (zero) mask.
    pub const fn default_for(channels: u16) -> Self {
        let mask = match channels {
            1 => 0x4,   // FC
            2 => 0x3,   // FL FR
            3 => 0x7,   // FL FR FC
            4 => 0x107, // FL FR FC BC
            5 => 0x37,  // FL FR FC BL BR
            6 => 0x3f,  // FL FR FC LFE BL BR
            7 => 0x70f, // FL FR FC LFE BC SL SR
            8 => 0x63f, // FL FR FC LFE BL BR SL SR
            _ => 0,
        };
        Self { channels, mask }
    }

    pub const fn channels(self) -> u16 {
        self.channels
    }

    pub const fn mask(self) -> u64 {
        self.mask
    }
}

impl fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ch (0x{:x})", self.channels, self.mask)
    }
}

/// One buffer of samples. Interleaved frames carry a single plane holding every
/// channel; planar frames carry one plane per channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Plane {
    S16(Vec<i16>),
    S32(Vec<i32>),
    F32(Vec<f32>),
}

impl Plane {
    pub fn zeroed(sample_type: SampleType, len: usize) -> Self {
        match sample_type {
            SampleType::S16 => Self::S16(vec![0; len]),
            SampleType::S32 => Self::S32(vec![0; len]),
            SampleType::F32 => Self::F32(vec![0.0; len]),
        }
    }

    pub const fn sample_type(&self) -> SampleType {
        match self {
            Self::S16(_) => SampleType::S16,
            Self::S32(_) => SampleType::S32,
            Self::F32(_) => SampleType::F32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::S16(v) => v.len(),
            Self::S32(v) => v.len(),
            Self::F32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        match self {
            Self::S16(v) => v.capacity(),
            Self::S32(v) => v.capacity(),
            Self::F32(v) => v.capacity(),
        }
    }

    fn resize(&mut self, len: usize) {
        match self {
            Self::S16(v) => v.resize(len, 0),
            Self::S32(v) => v.resize(len, 0),
            Self::F32(v) => v.resize(len, 0.0),
        }
    }

    fn drain_front(&mut self, n: usize) {
        let n = n.min(self.len());
        match self {
            Self::S16(v) => {
                v.drain(..n);
            },
            Self::S32(v) => {
                v.drain(..n);
            },
            Self::F32(v) => {
                v.drain(..n);
            },
        }
    }
}

/// A block of PCM audio positioned on a sample-clock timeline.
///
/// The frame keeps its planes consistent with `format`, `layout` and
/// `samples_per_channel`: an interleaved frame holds one plane of
/// `samples_per_channel * channels` samples, a planar frame holds `channels` planes of
/// `samples_per_channel` samples each.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// Start position in sample-clock units.
    pub timestamp: i64,
    sample_rate: u32,
    format: SampleFormat,
    layout: ChannelLayout,
    samples: usize,
    planes: SmallVec<[Plane; 2]>,
}

impl AudioFrame {
    /// A zero-filled frame.
    pub fn silence(
        format: SampleFormat,
        sample_rate: u32,
        layout: ChannelLayout,
        samples_per_channel: usize,
    ) -> Self {
        let plane_len = Self::plane_len(format, layout.channels(), samples_per_channel);
        let planes = (0..format.plane_count(layout.channels()))
            .map(|_| Plane::zeroed(format.sample_type(), plane_len))
            .collect();
        Self { timestamp: 0, sample_rate, format, layout, samples: samples_per_channel, planes }
    }

    /// Wraps interleaved 16-bit samples. A trailing partial sample frame is discarded.
    ///
    /// # Example
    /// ```rust
    /// use callmix_core::types::{AudioFrame, SampleFormat};
    /// let frame = AudioFrame::from_interleaved_s16(8000, 2, 160, vec![1, -1, 2, -2]);
    /// assert_eq!(frame.format(), SampleFormat::S16);
    /// assert_eq!(frame.samples_per_channel(), 2);
    /// assert_eq!(frame.end_timestamp(), 162);
    /// ```
    pub fn from_interleaved_s16(
        sample_rate: u32,
        channels: u16,
        timestamp: i64,
        data: Vec<i16>,
    ) -> Self {
        Self::from_interleaved(SampleFormat::S16, sample_rate, channels, timestamp, Plane::S16(data))
    }

    /// Wraps interleaved 32-bit float samples. A trailing partial sample frame is discarded.
    pub fn from_interleaved_f32(
        sample_rate: u32,
        channels: u16,
        timestamp: i64,
        data: Vec<f32>,
    ) -> Self {
        Self::from_interleaved(SampleFormat::F32, sample_rate, channels, timestamp, Plane::F32(data))
    }

    /// Wraps one 32-bit float buffer per channel. Planes are cut to the shortest one.
    pub fn from_planar_f32(sample_rate: u32, timestamp: i64, planes: Vec<Vec<f32>>) -> Self {
        let samples = planes.iter().map(Vec::len).min().unwrap_or(0);
        let channels = u16::try_from(planes.len()).unwrap_or(u16::MAX);
        let planes = planes
            .into_iter()
            .take(usize::from(channels))
            .map(|mut plane| {
                plane.truncate(samples);
                Plane::F32(plane)
            })
            .collect();
        Self {
            timestamp,
            sample_rate,
            format: SampleFormat::F32Planar,
            layout: ChannelLayout::default_for(channels),
            samples,
            planes,
        }
    }

    fn from_interleaved(
        format: SampleFormat,
        sample_rate: u32,
        channels: u16,
        timestamp: i64,
        mut plane: Plane,
    ) -> Self {
        let samples = if channels == 0 { 0 } else { plane.len() / usize::from(channels) };
        plane.resize(samples * usize::from(channels));
        let mut planes = SmallVec::new();
        planes.push(plane);
        Self {
            timestamp,
            sample_rate,
            format,
            layout: ChannelLayout::default_for(channels),
            samples,
            planes,
        }
    }

    const fn plane_len(format: SampleFormat, channels: u16, samples_per_channel: usize) -> usize {
        if format.is_planar() {
            samples_per_channel
        } else {
            samples_per_channel * channels as usize
        }
    }

    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub const fn format(&self) -> SampleFormat {
        self.format
    }

    pub const fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub const fn channels(&self) -> u16 {
        self.layout.channels()
    }

    /// Number of sample frames (samples per channel).
    pub const fn samples_per_channel(&self) -> usize {
        self.samples
    }

    pub const fn is_empty(&self) -> bool {
        self.samples == 0
    }

    /// Timestamp one past the last sample of this frame.
    pub fn end_timestamp(&self) -> i64 {
        self.timestamp.saturating_add(i64::try_from(self.samples).unwrap_or(i64::MAX))
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    /// Whether the planes match the format, channel count and sample count.
    ///
    /// Always true for frames built by the constructors here; replacing a plane through
    /// [`AudioFrame::planes_mut`] can break it.
    pub fn planes_consistent(&self) -> bool {
        let plane_len = Self::plane_len(self.format, self.channels(), self.samples);
        let sample_type = self.format.sample_type();
        self.planes.len() == self.format.plane_count(self.channels())
            && self
                .planes
                .iter()
                .all(|plane| plane.sample_type() == sample_type && plane.len() == plane_len)
    }

    /// Mutable access to the sample buffers.
    ///
    /// Callers may rewrite samples in place but must not change plane lengths or
    /// sample types; use [`AudioFrame::set_samples_per_channel`] to resize.
    pub fn planes_mut(&mut self) -> &mut [Plane] {
        &mut self.planes
    }

    /// Sample frames the planes can hold without reallocating.
    pub fn capacity(&self) -> usize {
        let channels = usize::from(self.channels());
        self.planes
            .iter()
            .map(|plane| {
                if self.format.is_planar() {
                    plane.capacity()
                } else if channels == 0 {
                    0
                } else {
                    plane.capacity() / channels
                }
            })
            .min()
            .unwrap_or(0)
    }

    /// Resizes every plane to hold `samples_per_channel` sample frames, zero-filling growth.
    pub fn set_samples_per_channel(&mut self, samples_per_channel: usize) {
        let plane_len = Self::plane_len(self.format, self.channels(), samples_per_channel);
        for plane in &mut self.planes {
            plane.resize(plane_len);
        }
        self.samples = samples_per_channel;
    }

    /// Drops sample frames past `samples_per_channel`. Capacity is kept.
    pub fn truncate(&mut self, samples_per_channel: usize) {
        if samples_per_channel < self.samples {
            self.set_samples_per_channel(samples_per_channel);
        }
    }

    /// Removes the first `n` sample frames and moves the timestamp forward accordingly.
    pub fn skip_front(&mut self, n: usize) {
        let n = n.min(self.samples);
        let per_plane = if self.format.is_planar() { n } else { n * usize::from(self.channels()) };
        for plane in &mut self.planes {
            plane.drain_front(per_plane);
        }
        self.samples -= n;
        self.timestamp = self.timestamp.saturating_add(i64::try_from(n).unwrap_or(i64::MAX));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn silence_frame_shapes_planes_by_format() {
        let interleaved = AudioFrame::silence(SampleFormat::S16, 8000, ChannelLayout::STEREO, 80);
        assert_eq!(interleaved.planes().len(), 1);
        assert_eq!(interleaved.planes()[0].len(), 160);

        let planar =
            AudioFrame::silence(SampleFormat::F32Planar, 8000, ChannelLayout::STEREO, 80);
        assert_eq!(planar.planes().len(), 2);
        assert!(planar.planes().iter().all(|p| p.len() == 80));
    }

    #[test]
    fn interleaved_constructor_drops_partial_sample_frame() {
        let frame = AudioFrame::from_interleaved_s16(8000, 2, 0, vec![1, 2, 3, 4, 5]);
        assert_eq!(frame.samples_per_channel(), 2);
        assert_eq!(frame.planes()[0], Plane::S16(vec![1, 2, 3, 4]));
    }

    #[test]
    fn skip_front_advances_timestamp() {
        let mut frame = AudioFrame::from_interleaved_s16(8000, 1, 100, vec![1, 2, 3, 4]);
        frame.skip_front(3);
        assert_eq!(frame.timestamp, 103);
        assert_eq!(frame.samples_per_channel(), 1);
        assert_eq!(frame.planes()[0], Plane::S16(vec![4]));
    }

    #[test]
    fn truncate_keeps_capacity() {
        let mut frame = AudioFrame::silence(SampleFormat::S16, 8000, ChannelLayout::MONO, 160);
        frame.truncate(80);
        assert_eq!(frame.samples_per_channel(), 80);
        assert!(frame.capacity() >= 160);
    }

    #[test]
    fn default_layouts() {
        assert_eq!(ChannelLayout::default_for(1), ChannelLayout::MONO);
        assert_eq!(ChannelLayout::default_for(2), ChannelLayout::STEREO);
        assert_eq!(ChannelLayout::default_for(6).mask(), 0x3f);
        assert_eq!(ChannelLayout::default_for(12).mask(), 0);
    }

    #[test]
    fn sample_format_serde_names() {
        let json = serde_json::to_string(&SampleFormat::F32Planar).unwrap();
        assert_eq!(json, "\"f32p\"");
        let parsed: SampleFormat = serde_json::from_str("\"s16\"").unwrap();
        assert_eq!(parsed, SampleFormat::S16);
    }

    #[test]
    fn replaced_planes_break_consistency() {
        let mut frame = AudioFrame::silence(SampleFormat::S16, 8000, ChannelLayout::STEREO, 80);
        assert!(frame.planes_consistent());

        frame.planes_mut()[0] = Plane::S16(vec![0; 10]);
        assert!(!frame.planes_consistent());

        frame.planes_mut()[0] = Plane::F32(vec![0.0; 160]);
        assert!(!frame.planes_consistent());
    }
}
