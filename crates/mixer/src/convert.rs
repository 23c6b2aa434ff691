// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Sample format conversion.
//!
//! [`FormatConverter`] is the bundled [`Resampler`]: it converts between the interleaved
//! and planar 16-bit, 32-bit and float encodings at a fixed rate. Float samples are
//! clamped to [-1.0, 1.0] on their way to integer formats.

use callmix_core::{
    AudioFrame, Plane, ResampleError, Resampler, ResamplerFactory, ResamplerSpec, SampleFormat,
};

const S16_SCALE: f32 = 32768.0;
const S32_SCALE: f64 = 2_147_483_648.0;

/// Reads a frame into one float buffer per channel.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn to_planar_f32(frame: &AudioFrame) -> Vec<Vec<f32>> {
    let channels = usize::from(frame.channels());
    let samples = frame.samples_per_channel();
    let mut out = vec![Vec::with_capacity(samples); channels];

    let read = |plane: &Plane, idx: usize| -> f32 {
        match plane {
            Plane::S16(v) => f32::from(v[idx]) / S16_SCALE,
            Plane::S32(v) => (f64::from(v[idx]) / S32_SCALE) as f32,
            Plane::F32(v) => v[idx],
        }
    };

    if frame.format().is_planar() {
        for (channel, plane) in out.iter_mut().zip(frame.planes()) {
            channel.extend((0..samples).map(|i| read(plane, i)));
        }
    } else if let Some(plane) = frame.planes().first() {
        for i in 0..samples {
            for (ch, channel) in out.iter_mut().enumerate() {
                channel.push(read(plane, i * channels + ch));
            }
        }
    }
    out
}

/// Writes float channel buffers into `output` starting at sample frame 0.
///
/// `output` must already hold at least `samples` sample frames.
#[allow(clippy::cast_possible_truncation)]
pub fn write_planar_f32(output: &mut AudioFrame, channels: &[Vec<f32>], samples: usize) {
    let planar = output.format().is_planar();
    let stride = usize::from(output.channels());

    let write = |plane: &mut Plane, idx: usize, value: f32| match plane {
        Plane::S16(v) => {
            v[idx] = (value.clamp(-1.0, 1.0) * S16_SCALE)
                .round()
                .clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16;
        },
        Plane::S32(v) => {
            v[idx] = (f64::from(value.clamp(-1.0, 1.0)) * S32_SCALE)
                .round()
                .clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32;
        },
        Plane::F32(v) => v[idx] = value,
    };

    if planar {
        for (plane, channel) in output.planes_mut().iter_mut().zip(channels) {
            for (i, value) in channel.iter().take(samples).enumerate() {
                write(plane, i, *value);
            }
        }
    } else if let Some(plane) = output.planes_mut().first_mut() {
        for (ch, channel) in channels.iter().enumerate().take(stride) {
            for (i, value) in channel.iter().take(samples).enumerate() {
                write(plane, i * stride + ch, *value);
            }
        }
    }
}

/// Opens [`FormatConverter`] contexts.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatConverterFactory;

impl ResamplerFactory for FormatConverterFactory {
    type Resampler = FormatConverter;

    fn open(&self, spec: &ResamplerSpec) -> Result<FormatConverter, ResampleError> {
        if spec.input_rate != spec.output_rate {
            return Err(ResampleError::Unsupported {
                from: format!("{} Hz", spec.input_rate),
                to: format!("{} Hz", spec.output_rate),
            });
        }
        if spec.layout.channels() == 0 {
            return Err(ResampleError::Failed("channel layout has no channels".into()));
        }
        tracing::debug!(
            "Opened format converter {} -> {} ({} Hz, {})",
            spec.input_format,
            spec.output_format,
            spec.input_rate,
            spec.layout
        );
        Ok(FormatConverter { input: spec.input_format, output: spec.output_format })
    }
}

/// Equal-rate format converter. Holds no samples between calls.
#[derive(Debug, Clone, Copy)]
pub struct FormatConverter {
    input: SampleFormat,
    output: SampleFormat,
}

impl Resampler for FormatConverter {
    fn available(&self) -> usize {
        0
    }

    fn delay(&self) -> usize {
        0
    }

    fn convert(
        &mut self,
        output: &mut AudioFrame,
        input: &AudioFrame,
    ) -> Result<usize, ResampleError> {
        if input.format() != self.input || output.format() != self.output {
            return Err(ResampleError::Unsupported {
                from: input.format().to_string(),
                to: output.format().to_string(),
            });
        }
        if input.channels() != output.channels() {
            return Err(ResampleError::Failed(format!(
                "channel count changed from {} to {}",
                input.channels(),
                output.channels()
            )));
        }
        let needed = input.samples_per_channel();
        if output.samples_per_channel() < needed {
            return Err(ResampleError::BufferTooSmall {
                needed,
                available: output.samples_per_channel(),
            });
        }

        let channels = to_planar_f32(input);
        write_planar_f32(output, &channels, needed);
        Ok(needed)
    }
}
