// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Mixing engine seam.
//!
//! The session never sums samples itself. It builds a topology through an
//! [`EngineFactory`], pushes per-input frames into the resulting [`MixingEngine`] and
//! pulls whatever combined output the engine is ready to release. Tearing a topology
//! down is dropping the engine.

use crate::error::{BuildError, EngineError};
use crate::types::{AudioFrame, ChannelLayout, SampleFormat};

/// Parameters a topology is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopologySpec {
    /// Fixed combiner arity; every input index below this has its own source endpoint.
    pub inputs: usize,
    pub sample_format: SampleFormat,
    pub clock_rate: u32,
    pub layout: ChannelLayout,
}

/// Outcome of a non-blocking pull from the engine's sink endpoint.
#[derive(Debug)]
pub enum Pull {
    /// A combined frame is ready.
    Frame(AudioFrame),
    /// Not enough input buffered yet. This is the normal steady-state answer.
    NotReady,
}

/// A built combiner topology: one source per input, one combiner, one sink endpoint.
pub trait MixingEngine {
    /// Queues a frame on the source endpoint of `input`.
    ///
    /// # Errors
    ///
    /// Returns an error if `input` has no source endpoint or the frame does not match
    /// the format the topology was built for.
    fn submit(&mut self, input: usize, frame: AudioFrame) -> Result<(), EngineError>;

    /// Pulls the next combined frame if one is ready.
    ///
    /// # Errors
    ///
    /// Returns an error only for real failures; starvation is [`Pull::NotReady`].
    fn try_pull(&mut self) -> Result<Pull, EngineError>;
}

/// Builds [`MixingEngine`] topologies.
pub trait EngineFactory {
    type Engine: MixingEngine;

    /// Builds and activates a complete topology for `spec`.
    ///
    /// # Errors
    ///
    /// Returns a [`BuildError`] naming the stage that failed. Nothing of a failed build
    /// is left behind.
    fn build(&self, spec: &TopologySpec) -> Result<Self::Engine, BuildError>;
}

impl<E: MixingEngine + ?Sized> MixingEngine for Box<E> {
    fn submit(&mut self, input: usize, frame: AudioFrame) -> Result<(), EngineError> {
        (**self).submit(input, frame)
    }

    fn try_pull(&mut self) -> Result<Pull, EngineError> {
        (**self).try_pull()
    }
}
