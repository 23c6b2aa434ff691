// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Output-stage format adapter.
//!
//! Combined frames leave the engine in whatever format the engine produces. The adapter
//! hands canonical frames through untouched and converts everything else into a single
//! reusable buffer. The buffer is sized for the worst case the converter can emit:
//!
//! ```text
//! needed = available + ceil((delay + samples) * out_rate / in_rate)
//! ```
//!
//! and only ever grows.

use callmix_core::{
    AudioFrame, ChannelLayout, ResampleError, Resampler, ResamplerFactory, ResamplerSpec,
    SampleFormat,
};

/// Lazily opened converter plus reusable output buffer.
pub struct ResampleAdapter<R> {
    canonical: SampleFormat,
    rate: u32,
    layout: ChannelLayout,
    context: Option<(SampleFormat, R)>,
    buffer: Option<AudioFrame>,
    allocations: u64,
    reuses: u64,
}

impl<R: Resampler> ResampleAdapter<R> {
    pub const fn new(canonical: SampleFormat, rate: u32, layout: ChannelLayout) -> Self {
        Self {
            canonical,
            rate,
            layout,
            context: None,
            buffer: None,
            allocations: 0,
            reuses: 0,
        }
    }

    /// Re-targets the adapter at a new output rate and layout. The converter context and
    /// buffer are released; counters are kept.
    pub fn reset(&mut self, rate: u32, layout: ChannelLayout) {
        self.rate = rate;
        self.layout = layout;
        self.context = None;
        self.buffer = None;
    }

    /// Times the buffer had to grow.
    pub const fn allocations(&self) -> u64 {
        self.allocations
    }

    /// Times the buffer was large enough already.
    pub const fn reuses(&self) -> u64 {
        self.reuses
    }

    /// Sample frames the reusable buffer holds without reallocating.
    pub fn buffer_capacity(&self) -> usize {
        self.buffer.as_ref().map_or(0, AudioFrame::capacity)
    }

    /// Returns `frame` in the canonical format.
    ///
    /// # Errors
    ///
    /// Returns an error if no converter can be opened for the frame's format or the
    /// conversion itself fails.
    pub fn process<'a, F>(
        &'a mut self,
        factory: &F,
        frame: &'a AudioFrame,
    ) -> Result<&'a AudioFrame, ResampleError>
    where
        F: ResamplerFactory<Resampler = R>,
    {
        if frame.format() == self.canonical {
            return Ok(frame);
        }

        let reopen = self.context.as_ref().is_none_or(|(format, _)| *format != frame.format());
        if reopen {
            let spec = ResamplerSpec {
                input_format: frame.format(),
                output_format: self.canonical,
                input_rate: frame.sample_rate(),
                output_rate: self.rate,
                layout: frame.layout(),
            };
            let context = factory.open(&spec)?;
            tracing::debug!("Converting combined output {} -> {}", frame.format(), self.canonical);
            self.context = Some((frame.format(), context));
        }
        let Some((_, context)) = self.context.as_mut() else {
            return Err(ResampleError::Failed("converter context unavailable".into()));
        };

        let needed = worst_case_samples(
            context.available(),
            context.delay(),
            frame.samples_per_channel(),
            frame.sample_rate(),
            self.rate,
        )?;

        let grow = self
            .buffer
            .as_ref()
            .is_none_or(|buf| buf.capacity() < needed || buf.channels() != frame.channels());
        if grow {
            self.allocations += 1;
        } else {
            self.reuses += 1;
        }

        if self.buffer.as_ref().is_none_or(|buf| buf.channels() != frame.channels()) {
            self.buffer = Some(AudioFrame::silence(self.canonical, self.rate, frame.layout(), 0));
        }
        let Some(buffer) = self.buffer.as_mut() else {
            return Err(ResampleError::Failed("resample buffer unavailable".into()));
        };
        buffer.set_samples_per_channel(needed);

        let written = context.convert(buffer, frame)?;
        buffer.truncate(written);
        buffer.timestamp = frame.timestamp;
        Ok(buffer)
    }
}

impl<R> std::fmt::Debug for ResampleAdapter<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResampleAdapter")
            .field("canonical", &self.canonical)
            .field("rate", &self.rate)
            .field("layout", &self.layout)
            .field("open", &self.context.as_ref().map(|(format, _)| *format))
            .field("allocations", &self.allocations)
            .field("reuses", &self.reuses)
            .finish_non_exhaustive()
    }
}

/// `available + ceil((delay + samples) * out_rate / in_rate)`.
fn worst_case_samples(
    available: usize,
    delay: usize,
    samples: usize,
    in_rate: u32,
    out_rate: u32,
) -> Result<usize, ResampleError> {
    if in_rate == 0 {
        return Err(ResampleError::Failed("input sample rate is zero".into()));
    }
    let pending = (delay + samples) as u64;
    let scaled = (pending * u64::from(out_rate)).div_ceil(u64::from(in_rate));
    usize::try_from(scaled)
        .map(|scaled| available + scaled)
        .map_err(|_| ResampleError::Failed("conversion output too large".into()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::convert::FormatConverterFactory;
    use crate::test_utils::ScriptedResamplerFactory;

    fn adapter() -> ResampleAdapter<crate::convert::FormatConverter> {
        ResampleAdapter::new(SampleFormat::S16, 8000, ChannelLayout::MONO)
    }

    #[test]
    fn canonical_frames_pass_through() {
        let mut adapter = adapter();
        let frame = AudioFrame::from_interleaved_s16(8000, 1, 0, vec![1, 2, 3]);
        let out = adapter.process(&FormatConverterFactory, &frame).unwrap();
        assert!(std::ptr::eq(out, &frame));
        assert_eq!(adapter.allocations(), 0);
        assert_eq!(adapter.buffer_capacity(), 0);
    }

    #[test]
    fn buffer_grows_then_is_reused() {
        let mut adapter = adapter();
        let big = AudioFrame::from_planar_f32(8000, 0, vec![vec![0.25; 160]]);
        let small = AudioFrame::from_planar_f32(8000, 160, vec![vec![0.5; 80]]);

        let out = adapter.process(&FormatConverterFactory, &big).unwrap();
        assert_eq!(out.format(), SampleFormat::S16);
        assert_eq!(out.samples_per_channel(), 160);

        let out = adapter.process(&FormatConverterFactory, &small).unwrap();
        assert_eq!(out.samples_per_channel(), 80);
        assert_eq!(out.timestamp, 160);
        assert_eq!(out.planes()[0], callmix_core::Plane::S16(vec![16384; 80]));

        assert_eq!(adapter.allocations(), 1);
        assert_eq!(adapter.reuses(), 1);
        assert!(adapter.buffer_capacity() >= 160);
    }

    #[test]
    fn sizing_accounts_for_delay_and_rate_ratio() {
        assert_eq!(worst_case_samples(0, 0, 160, 8000, 8000).unwrap(), 160);
        assert_eq!(worst_case_samples(4, 16, 160, 8000, 16000).unwrap(), 356);
        assert_eq!(worst_case_samples(0, 0, 1, 3, 2).unwrap(), 1);
        assert!(worst_case_samples(0, 0, 1, 0, 8000).is_err());
    }

    #[test]
    fn sizes_buffer_from_converter_state() {
        let factory = ScriptedResamplerFactory::new(10, 6);
        let mut adapter = ResampleAdapter::new(SampleFormat::S16, 8000, ChannelLayout::MONO);
        let frame = AudioFrame::from_planar_f32(8000, 0, vec![vec![0.0; 100]]);

        adapter.process(&factory, &frame).unwrap();

        assert_eq!(factory.requested(), vec![116]);
    }

    #[test]
    fn reopens_when_input_format_changes() {
        let factory = ScriptedResamplerFactory::default();
        let mut adapter = ResampleAdapter::new(SampleFormat::S16, 8000, ChannelLayout::MONO);

        let planar = AudioFrame::from_planar_f32(8000, 0, vec![vec![0.0; 10]]);
        let interleaved = AudioFrame::from_interleaved_f32(8000, 1, 0, vec![0.0; 10]);
        adapter.process(&factory, &planar).unwrap();
        adapter.process(&factory, &planar).unwrap();
        adapter.process(&factory, &interleaved).unwrap();

        assert_eq!(factory.opened(), 2);
    }

    #[test]
    fn conversion_errors_surface() {
        let factory = ScriptedResamplerFactory::failing();
        let mut adapter = ResampleAdapter::new(SampleFormat::S16, 8000, ChannelLayout::MONO);
        let frame = AudioFrame::from_planar_f32(8000, 0, vec![vec![0.0; 10]]);
        assert!(adapter.process(&factory, &frame).is_err());
    }
}
