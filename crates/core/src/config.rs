// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Mixer session configuration.

use crate::error::MixError;
use crate::types::SampleFormat;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Combiner arity of the reference recording setup.
pub const DEFAULT_INPUT_CAPACITY: usize = 4;

const fn default_input_capacity() -> usize {
    DEFAULT_INPUT_CAPACITY
}

const fn default_sample_format() -> SampleFormat {
    SampleFormat::S16
}

const fn default_silence_chunk_ms() -> u32 {
    10
}

const fn default_drift_window_ms() -> u32 {
    1000
}

const fn default_fill_threshold_ms() -> u32 {
    1000
}

/// Tuning for one mixer session.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
#[serde(default)]
pub struct MixerConfig {
    /// Number of combiner inputs (one per call leg). Fixed for the session's lifetime.
    pub input_capacity: usize,

    /// Canonical sample format. Inputs are submitted in this format and combined output
    /// is converted to it before reaching the sink.
    pub sample_format: SampleFormat,

    /// Duration of each injected silence chunk.
    pub silence_chunk_ms: u32,

    /// Maximum lag an input may show behind the output position before it is
    /// force-advanced with silence.
    pub drift_window_ms: u32,

    /// Output position that must be reached before lagging inputs are force-advanced.
    /// Avoids injecting silence while legs are still starting up.
    pub fill_threshold_ms: u32,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            input_capacity: default_input_capacity(),
            sample_format: default_sample_format(),
            silence_chunk_ms: default_silence_chunk_ms(),
            drift_window_ms: default_drift_window_ms(),
            fill_threshold_ms: default_fill_threshold_ms(),
        }
    }
}

impl MixerConfig {
    /// # Errors
    ///
    /// Returns `MixError::InvalidConfig` for a zero capacity or zero chunk duration.
    pub fn validate(&self) -> Result<(), MixError> {
        if self.input_capacity == 0 {
            return Err(MixError::InvalidConfig("input_capacity must be greater than 0".into()));
        }
        if self.silence_chunk_ms == 0 {
            return Err(MixError::InvalidConfig(
                "silence_chunk_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Silence chunk length in samples at `clock_rate`, never less than one.
    pub fn silence_chunk_samples(&self, clock_rate: u32) -> usize {
        let samples = samples_for_ms(clock_rate, self.silence_chunk_ms).max(1);
        usize::try_from(samples).unwrap_or(usize::MAX)
    }

    pub fn drift_window_samples(&self, clock_rate: u32) -> i64 {
        samples_for_ms(clock_rate, self.drift_window_ms)
    }

    pub fn fill_threshold_samples(&self, clock_rate: u32) -> i64 {
        samples_for_ms(clock_rate, self.fill_threshold_ms)
    }
}

/// Number of sample frames covering `ms` milliseconds at `clock_rate`.
pub fn samples_for_ms(clock_rate: u32, ms: u32) -> i64 {
    i64::from(clock_rate) * i64::from(ms) / 1000
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_setup() {
        let config = MixerConfig::default();
        assert_eq!(config.input_capacity, 4);
        assert_eq!(config.sample_format, SampleFormat::S16);
        assert_eq!(config.silence_chunk_samples(8000), 80);
        assert_eq!(config.drift_window_samples(8000), 8000);
        assert_eq!(config.fill_threshold_samples(48000), 48000);
    }

    #[test]
    fn partial_config_uses_defaults() {
        let config: MixerConfig =
            serde_json::from_str(r#"{"input_capacity": 2, "sample_format": "f32"}"#).unwrap();
        assert_eq!(config.input_capacity, 2);
        assert_eq!(config.sample_format, SampleFormat::F32);
        assert_eq!(config.silence_chunk_ms, 10);
    }

    #[test]
    fn silence_chunk_never_empty() {
        let config = MixerConfig::default();
        assert_eq!(config.silence_chunk_samples(50), 1);
    }

    #[test]
    fn validate_rejects_zero_capacity() {
        let config = MixerConfig { input_capacity: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(MixError::InvalidConfig(_))));
    }
}
