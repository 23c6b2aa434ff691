// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Resampler seam used by the output stage.

use crate::error::ResampleError;
use crate::types::{AudioFrame, ChannelLayout, SampleFormat};

/// Parameters a converter context is opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResamplerSpec {
    pub input_format: SampleFormat,
    pub output_format: SampleFormat,
    pub input_rate: u32,
    pub output_rate: u32,
    pub layout: ChannelLayout,
}

/// An open converter context.
pub trait Resampler {
    /// Converted sample frames already queued inside the converter.
    fn available(&self) -> usize;

    /// Input sample frames held back by the converter (filter delay).
    fn delay(&self) -> usize;

    /// Converts `input` into `output`, which has been sized by the caller to the worst
    /// case output length. Returns the number of sample frames written.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be converted or `output` is too small.
    fn convert(&mut self, output: &mut AudioFrame, input: &AudioFrame)
        -> Result<usize, ResampleError>;
}

/// Opens [`Resampler`] contexts.
pub trait ResamplerFactory {
    type Resampler: Resampler;

    /// # Errors
    ///
    /// Returns an error if the requested conversion is not supported.
    fn open(&self, spec: &ResamplerSpec) -> Result<Self::Resampler, ResampleError>;
}
