// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Mixer session: one per recorded call.
//!
//! The session owns the combiner topology and all synchronization state for a call.
//! Every submission runs to completion on the caller's thread:
//!
//! 1. validate the input index and frame shape,
//! 2. map the frame onto the output timeline (offset resolution),
//! 3. backfill silence up to the frame's start,
//! 4. forward the frame and advance the counters,
//! 5. force-advance every input lagging more than the drift window,
//! 6. drain all combined output that is ready into the sink.
//!
//! Calls into one session must be serialized by the caller; see
//! [`crate::driver`] for an async wrapper that does so.

use callmix_core::{
    AudioFrame, ChannelLayout, EngineFactory, MixError, MixerConfig, MixingEngine, OutputSink,
    ResamplerFactory, SessionState, StreamFormat, TopologySpec,
};

use crate::drain::drain;
use crate::offset;
use crate::resample::ResampleAdapter;
use crate::silence::SilenceFiller;
use crate::stats::SessionStats;
use crate::timeline::{InputState, Timeline};

/// A built topology together with the state that lives and dies with it.
struct Topology<E> {
    engine: E,
    silence: SilenceFiller,
    format: StreamFormat,
}

/// Synchronizes call legs onto one timeline and drives them through a mixing engine.
pub struct MixerSession<F: EngineFactory, R: ResamplerFactory> {
    config: MixerConfig,
    engine_factory: F,
    resampler_factory: R,
    state: SessionState,
    topology: Option<Topology<F::Engine>>,
    builds: u64,
    next_free: usize,
    timeline: Timeline,
    adapter: ResampleAdapter<R::Resampler>,
    stats: SessionStats,
}

impl<F: EngineFactory, R: ResamplerFactory> MixerSession<F, R> {
    /// Creates an unconfigured session.
    ///
    /// # Errors
    ///
    /// Returns `MixError::InvalidConfig` if `config` does not validate.
    pub fn new(config: MixerConfig, engine_factory: F, resampler_factory: R) -> Result<Self, MixError> {
        config.validate()?;
        let timeline = Timeline::new(config.input_capacity);
        let adapter = ResampleAdapter::new(config.sample_format, 0, ChannelLayout::MONO);
        Ok(Self {
            config,
            engine_factory,
            resampler_factory,
            state: SessionState::Uninitialized,
            topology: None,
            builds: 0,
            next_free: 0,
            timeline,
            adapter,
            stats: SessionStats::default(),
        })
    }

    pub const fn config(&self) -> &MixerConfig {
        &self.config
    }

    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Number of successful topology builds over the session's lifetime.
    pub const fn topology_generation(&self) -> u64 {
        self.builds
    }

    pub const fn output_timestamp(&self) -> i64 {
        self.timeline.output_timestamp()
    }

    pub fn input(&self, index: usize) -> Option<&InputState> {
        self.timeline.input(index)
    }

    /// Number of input indices handed out so far.
    pub const fn allocated_inputs(&self) -> usize {
        self.next_free
    }

    /// The engine of the current topology, if one is built.
    pub fn engine(&self) -> Option<&F::Engine> {
        self.topology.as_ref().map(|topology| &topology.engine)
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            resample_allocations: self.adapter.allocations(),
            resample_reuses: self.adapter.reuses(),
            ..self.stats
        }
    }

    /// Locks the session to `clock_rate` and `channels`, building the topology.
    ///
    /// Calling again with the same format does nothing. A different format tears the
    /// current topology down (its buffered output is discarded) and builds a new one on
    /// a fresh timeline. Allocated input indices stay valid.
    ///
    /// # Errors
    ///
    /// Returns `MixError::Configuration` naming the failed build stage. The session is
    /// left uninitialized.
    pub fn configure(&mut self, clock_rate: u32, channels: u16) -> Result<(), MixError> {
        let format = StreamFormat::new(clock_rate, channels);
        if self.state.format() == Some(format) {
            return Ok(());
        }

        self.teardown();

        let layout = ChannelLayout::default_for(channels);
        let spec = TopologySpec {
            inputs: self.config.input_capacity,
            sample_format: self.config.sample_format,
            clock_rate,
            layout,
        };
        let engine = self.engine_factory.build(&spec).map_err(|e| {
            tracing::error!(stage = %e.stage, "Failed to build mixer topology for {}: {}", format, e);
            e
        })?;

        self.builds += 1;
        self.adapter.reset(clock_rate, layout);
        let silence = SilenceFiller::new(
            self.config.sample_format,
            clock_rate,
            layout,
            self.config.silence_chunk_samples(clock_rate),
        );
        self.topology = Some(Topology { engine, silence, format });
        self.state = SessionState::Configured { format, generation: self.builds };

        tracing::info!(
            inputs = self.config.input_capacity,
            generation = self.builds,
            "Mixer topology built for {} ({})",
            format,
            self.config.sample_format
        );
        Ok(())
    }

    /// Releases the topology and resets the timeline. Input allocations are kept.
    pub fn teardown(&mut self) {
        if let Some(topology) = self.topology.take() {
            tracing::info!("Tearing down mixer topology for {}", topology.format);
        }
        self.state = SessionState::Uninitialized;
        self.timeline.reset();
    }

    /// Hands out the next unused input index.
    ///
    /// # Errors
    ///
    /// Returns `MixError::CapacityExhausted` once every index has been handed out.
    pub fn allocate_input_index(&mut self) -> Result<usize, MixError> {
        let capacity = self.config.input_capacity;
        if self.next_free >= capacity {
            return Err(MixError::CapacityExhausted { capacity });
        }
        let index = self.next_free;
        self.next_free += 1;
        tracing::debug!(input = index, "Allocated mixer input");
        Ok(index)
    }

    /// Submits one frame for `index`, stamped with that input's own clock, and drains
    /// whatever combined output becomes ready into `sink`.
    ///
    /// # Errors
    ///
    /// - index and frame errors reject the frame without touching any state,
    /// - `MixError::Engine` if the engine refuses the frame or fails while pulling,
    /// - `MixError::Sink` as soon as the sink rejects a frame.
    pub fn submit<S>(&mut self, index: usize, frame: AudioFrame, sink: &mut S) -> Result<(), MixError>
    where
        S: OutputSink + ?Sized,
    {
        let capacity = self.config.input_capacity;
        if index >= capacity {
            return Err(MixError::IndexOutOfRange { index, capacity });
        }
        let Some(topology) = self.topology.as_mut() else {
            return Err(MixError::NotConfigured);
        };
        if index >= self.next_free {
            return Err(MixError::InputNotAllocated(index));
        }
        let format = topology.format;
        if frame.sample_rate() != format.clock_rate || frame.channels() != format.channels {
            return Err(MixError::FrameMismatch(format!(
                "expected {}, got {} Hz/{}ch",
                format,
                frame.sample_rate(),
                frame.channels()
            )));
        }
        if frame.format() != self.config.sample_format {
            return Err(MixError::FrameMismatch(format!(
                "expected {} samples, got {}",
                self.config.sample_format,
                frame.format()
            )));
        }
        if !frame.planes_consistent() {
            return Err(MixError::FrameMismatch(format!(
                "planes do not hold {} samples per channel",
                frame.samples_per_channel()
            )));
        }

        self.stats.submitted();
        let mut frame = frame;
        let output = self.timeline.output_timestamp();
        let Some(input) = self.timeline.input_mut(index) else {
            return Err(MixError::IndexOutOfRange { index, capacity });
        };
        let source_timestamp = frame.timestamp;
        frame.timestamp = offset::resolve(input, output, source_timestamp);
        let next_expected = input.next_expected;

        tracing::debug!(
            input = index,
            source_timestamp,
            timestamp = frame.timestamp,
            offset = ?input.offset,
            next_expected,
            output,
            samples = frame.samples_per_channel(),
            "Mixer input frame"
        );

        if frame.is_empty() {
            return Ok(());
        }
        if frame.end_timestamp() <= next_expected {
            self.stats.stale();
            tracing::warn!(
                input = index,
                timestamp = frame.timestamp,
                next_expected,
                "Dropping stale frame"
            );
            return Ok(());
        }
        if frame.timestamp < next_expected {
            let overlap = usize::try_from(next_expected - frame.timestamp).unwrap_or(usize::MAX);
            self.stats.trimmed();
            tracing::debug!(input = index, overlap, "Trimming overlapping frame");
            frame.skip_front(overlap);
        }

        topology.silence.fill_to(
            &mut topology.engine,
            &mut self.timeline,
            index,
            frame.timestamp,
            &mut self.stats,
        );

        let end = frame.end_timestamp();
        topology.engine.submit(index, frame)?;
        self.timeline.advance(index, end);
        self.timeline.record_frame(index);

        let output = self.timeline.output_timestamp();
        if output >= self.config.fill_threshold_samples(format.clock_rate) {
            let target = output - self.config.drift_window_samples(format.clock_rate);
            for slot in 0..capacity {
                topology.silence.fill_to(
                    &mut topology.engine,
                    &mut self.timeline,
                    slot,
                    target,
                    &mut self.stats,
                );
            }
        }

        drain(
            &mut topology.engine,
            &mut self.adapter,
            &self.resampler_factory,
            sink,
            &mut self.stats,
        )?;
        Ok(())
    }
}

impl<F: EngineFactory, R: ResamplerFactory> MixerSession<F, R> {
    /// Ends the call: pads every input with silence up to the output timestamp and
    /// drains the remaining combined output into `sink`. Returns the number of frames
    /// delivered.
    ///
    /// Inputs that lag by less than the drift window are otherwise never caught up,
    /// so the tail of the recording stays inside the engine until this runs.
    ///
    /// # Errors
    ///
    /// Returns `MixError::NotConfigured` before `configure`, and engine and sink errors
    /// as `submit` does.
    pub fn flush<S>(&mut self, sink: &mut S) -> Result<usize, MixError>
    where
        S: OutputSink + ?Sized,
    {
        let Some(topology) = self.topology.as_mut() else {
            return Err(MixError::NotConfigured);
        };
        let output = self.timeline.output_timestamp();
        let mut chunks = 0;
        for slot in 0..self.config.input_capacity {
            chunks += topology.silence.fill_to(
                &mut topology.engine,
                &mut self.timeline,
                slot,
                output,
                &mut self.stats,
            );
        }
        tracing::debug!(output, chunks, "Flushing mixer session");

        drain(
            &mut topology.engine,
            &mut self.adapter,
            &self.resampler_factory,
            sink,
            &mut self.stats,
        )
    }
}

impl<F, R> std::fmt::Debug for MixerSession<F, R>
where
    F: EngineFactory,
    R: ResamplerFactory,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MixerSession")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("allocated_inputs", &self.next_free)
            .field("output_timestamp", &self.timeline.output_timestamp())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
