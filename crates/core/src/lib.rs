// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! callmix core - frame types and collaborator seams for the call-recording mixer.
//!
//! ## Core Modules
//!
//! - [`types`]: Sample formats, channel layouts and timestamped [`AudioFrame`]s
//! - [`engine`]: [`MixingEngine`] / [`EngineFactory`] traits for the combiner topology
//! - [`resampler`]: [`Resampler`] / [`ResamplerFactory`] traits for the output stage
//! - [`sink`]: [`OutputSink`] trait for combined output
//! - [`state`]: Session state machine
//! - [`config`]: Session tuning
//! - [`error`]: Error types and handling

pub mod config;
pub mod engine;
pub mod error;
pub mod resampler;
pub mod sink;
pub mod state;
pub mod types;

// Error handling
pub use error::{BuildError, BuildStage, EngineError, MixError, ResampleError, SinkError};

// Collaborator seams
pub use engine::{EngineFactory, MixingEngine, Pull, TopologySpec};
pub use resampler::{Resampler, ResamplerFactory, ResamplerSpec};
pub use sink::OutputSink;

// Data types
pub use types::{AudioFrame, ChannelLayout, Plane, SampleFormat, SampleType};

pub use config::MixerConfig;
pub use state::{SessionState, StreamFormat};
