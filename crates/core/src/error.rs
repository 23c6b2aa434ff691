// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Structured error types for callmix.
//!
//! [`MixError`] is what the session entry points return. The collaborator errors
//! ([`BuildError`], [`EngineError`], [`ResampleError`], [`SinkError`]) are what the
//! pluggable mixing engine, resampler and output sink report; they convert into
//! `MixError` with `?`.

use std::fmt;
use thiserror::Error;

/// Main error type for mixer session operations.
///
/// Each variant maps onto one failure class of the synchronizer so callers can decide
/// whether the session is still usable:
/// - configuration failures leave the session uninitialized,
/// - index and frame errors reject a single submission without touching any state,
/// - sink and engine errors abort the current submission only.
#[derive(Debug, Error)]
pub enum MixError {
    /// Topology build failed. The session is back in the uninitialized state.
    #[error("Configuration error: {0}")]
    Configuration(#[from] BuildError),

    /// A configuration value is out of its accepted range.
    ///
    /// Examples:
    /// - `input_capacity` of zero
    /// - `silence_chunk_ms` of zero
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Submission before the session was configured.
    #[error("mixer not initialized")]
    NotConfigured,

    /// Input index beyond the fixed combiner arity.
    #[error("index {index} out of range (capacity {capacity})")]
    IndexOutOfRange { index: usize, capacity: usize },

    /// Input index that was never handed out by `allocate_input_index`.
    #[error("input {0} has not been allocated")]
    InputNotAllocated(usize),

    /// Every input slot has already been handed out.
    #[error("all {capacity} inputs are already allocated")]
    CapacityExhausted { capacity: usize },

    /// Submitted frame does not match the configured clock rate or channel count.
    #[error("frame rejected: {0}")]
    FrameMismatch(String),

    /// The mixing engine refused a frame or failed while producing output.
    #[error("Mixing engine error: {0}")]
    Engine(#[from] EngineError),

    /// The resampler could not be opened or failed to convert.
    #[error("Conversion error: {0}")]
    Conversion(#[from] ResampleError),

    /// The output sink rejected a drained frame.
    #[error("Output sink error: {0}")]
    Sink(#[from] SinkError),
}

/// Convenience type alias for Results using `MixError`.
pub type Result<T> = std::result::Result<T, MixError>;

/// Stage of a topology build, used to describe where a build failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    /// Validating the requested stream format.
    Format,
    /// Creating the combiner node.
    Combiner,
    /// Creating the buffer source endpoint for one input.
    Source(usize),
    /// Linking one input source into the combiner.
    LinkSource(usize),
    /// Creating the sink endpoint.
    Sink,
    /// Linking the combiner into the sink endpoint.
    LinkSink,
    /// Validating and activating the finished topology.
    Activate,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Format => write!(f, "invalid stream format"),
            Self::Combiner => write!(f, "failed to create combiner"),
            Self::Source(idx) => write!(f, "failed to create source for input {idx}"),
            Self::LinkSource(idx) => write!(f, "failed to link input {idx} to combiner"),
            Self::Sink => write!(f, "failed to create sink endpoint"),
            Self::LinkSink => write!(f, "failed to link combiner to sink"),
            Self::Activate => write!(f, "failed to configure topology"),
        }
    }
}

/// Aggregated topology build failure.
#[derive(Debug, Error)]
#[error("{stage}: {reason}")]
pub struct BuildError {
    pub stage: BuildStage,
    pub reason: String,
}

impl BuildError {
    pub fn new(stage: BuildStage, reason: impl Into<String>) -> Self {
        Self { stage, reason: reason.into() }
    }
}

/// Errors reported by a [`MixingEngine`](crate::engine::MixingEngine).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no source endpoint for input {0}")]
    UnknownInput(usize),

    #[error("input {input} expects {expected}, got {actual}")]
    FormatMismatch { input: usize, expected: String, actual: String },

    #[error("{0}")]
    Internal(String),
}

/// Errors reported by a [`Resampler`](crate::resampler::Resampler).
#[derive(Debug, Error)]
pub enum ResampleError {
    #[error("unsupported conversion {from} -> {to}")]
    Unsupported { from: String, to: String },

    #[error("output buffer too small: need {needed} samples, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("{0}")]
    Failed(String),
}

/// Errors reported by an [`OutputSink`](crate::sink::OutputSink).
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sink closed")]
    Closed,

    #[error("sink is full")]
    Full,

    #[error("frame rejected: {0}")]
    Rejected(String),
}
