// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Test utilities for mixer testing

use std::sync::{Arc, Mutex};

use callmix_core::{
    AudioFrame, BuildError, BuildStage, EngineError, EngineFactory, MixerConfig, MixingEngine,
    OutputSink, Pull, ResampleError, Resampler, ResamplerFactory, ResamplerSpec, SinkError,
    TopologySpec,
};

use crate::convert::FormatConverterFactory;
use crate::session::MixerSession;
use crate::summing::{SummingEngineConfig, SummingEngineFactory};

/// Session type used by most tests: reference engine, reference converter.
pub type TestSession = MixerSession<SummingEngineFactory, FormatConverterFactory>;

/// Creates an 8000 Hz mono session with `capacity` inputs, configured and with every
/// input allocated.
#[allow(clippy::missing_panics_doc, clippy::unwrap_used)]
pub fn mono_session(capacity: usize, engine: SummingEngineConfig) -> TestSession {
    let config = MixerConfig { input_capacity: capacity, ..Default::default() };
    let mut session =
        MixerSession::new(config, SummingEngineFactory::new(engine), FormatConverterFactory)
            .unwrap();
    session.configure(8000, 1).unwrap();
    for _ in 0..capacity {
        session.allocate_input_index().unwrap();
    }
    session
}

/// Mono s16 frame of `samples` samples, all equal to `value`.
pub fn mono_frame(sample_rate: u32, timestamp: i64, samples: usize, value: i16) -> AudioFrame {
    AudioFrame::from_interleaved_s16(sample_rate, 1, timestamp, vec![value; samples])
}

/// Sink that accepts `accept_first` frames and fails every call after that.
#[derive(Debug, Default)]
pub struct FailingSink {
    pub accept_first: usize,
    pub accepted: Vec<AudioFrame>,
    pub calls: usize,
}

impl FailingSink {
    pub fn failing_after(accept_first: usize) -> Self {
        Self { accept_first, ..Default::default() }
    }
}

impl OutputSink for FailingSink {
    fn accept(&mut self, frame: &AudioFrame) -> Result<(), SinkError> {
        self.calls += 1;
        if self.accepted.len() >= self.accept_first {
            return Err(SinkError::Rejected("test sink refuses frame".into()));
        }
        self.accepted.push(frame.clone());
        Ok(())
    }
}

/// Engine that records what it is fed and never produces output.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    /// `(input, timestamp, samples)` of every accepted frame
    pub submitted: Vec<(usize, i64, usize)>,
    /// Input whose frames are refused
    pub refuse_input: Option<usize>,
    /// Fail every pull instead of reporting `NotReady`
    pub fail_pull: bool,
}

impl MixingEngine for RecordingEngine {
    fn submit(&mut self, input: usize, frame: AudioFrame) -> Result<(), EngineError> {
        if self.refuse_input == Some(input) {
            return Err(EngineError::Internal("input refused".into()));
        }
        self.submitted.push((input, frame.timestamp, frame.samples_per_channel()));
        Ok(())
    }

    fn try_pull(&mut self) -> Result<Pull, EngineError> {
        if self.fail_pull {
            return Err(EngineError::Internal("combiner stalled".into()));
        }
        Ok(Pull::NotReady)
    }
}

/// Factory whose builds always fail at `stage`.
#[derive(Debug, Clone, Copy)]
pub struct FailingEngineFactory {
    pub stage: BuildStage,
}

impl EngineFactory for FailingEngineFactory {
    type Engine = RecordingEngine;

    fn build(&self, _spec: &TopologySpec) -> Result<RecordingEngine, BuildError> {
        Err(BuildError::new(self.stage, "injected failure"))
    }
}

/// Factory building [`RecordingEngine`]s whose pulls always fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct PullFailingEngineFactory;

impl EngineFactory for PullFailingEngineFactory {
    type Engine = RecordingEngine;

    fn build(&self, _spec: &TopologySpec) -> Result<RecordingEngine, BuildError> {
        Ok(RecordingEngine { fail_pull: true, ..Default::default() })
    }
}

#[derive(Debug, Default)]
struct ResamplerLog {
    opened: usize,
    requested: Vec<usize>,
}

/// Resampler factory reporting fixed `available`/`delay` figures and recording the
/// output sizes it is handed.
#[derive(Debug, Clone, Default)]
pub struct ScriptedResamplerFactory {
    pub available: usize,
    pub delay: usize,
    pub fail_convert: bool,
    log: Arc<Mutex<ResamplerLog>>,
}

impl ScriptedResamplerFactory {
    pub fn new(available: usize, delay: usize) -> Self {
        Self { available, delay, ..Default::default() }
    }

    /// Factory whose contexts fail every conversion.
    pub fn failing() -> Self {
        Self { fail_convert: true, ..Default::default() }
    }

    /// Number of contexts opened so far.
    pub fn opened(&self) -> usize {
        self.log.lock().map_or(0, |log| log.opened)
    }

    /// Output sizes (sample frames) passed to every `convert` call.
    pub fn requested(&self) -> Vec<usize> {
        self.log.lock().map(|log| log.requested.clone()).unwrap_or_default()
    }
}

/// Context opened by [`ScriptedResamplerFactory`]. Writes silence.
#[derive(Debug)]
pub struct ScriptedResampler {
    available: usize,
    delay: usize,
    fail_convert: bool,
    log: Arc<Mutex<ResamplerLog>>,
}

impl ResamplerFactory for ScriptedResamplerFactory {
    type Resampler = ScriptedResampler;

    fn open(&self, _spec: &ResamplerSpec) -> Result<ScriptedResampler, ResampleError> {
        if let Ok(mut log) = self.log.lock() {
            log.opened += 1;
        }
        Ok(ScriptedResampler {
            available: self.available,
            delay: self.delay,
            fail_convert: self.fail_convert,
            log: Arc::clone(&self.log),
        })
    }
}

impl Resampler for ScriptedResampler {
    fn available(&self) -> usize {
        self.available
    }

    fn delay(&self) -> usize {
        self.delay
    }

    fn convert(
        &mut self,
        output: &mut AudioFrame,
        input: &AudioFrame,
    ) -> Result<usize, ResampleError> {
        if let Ok(mut log) = self.log.lock() {
            log.requested.push(output.samples_per_channel());
        }
        if self.fail_convert {
            return Err(ResampleError::Failed("scripted failure".into()));
        }
        Ok(input.samples_per_channel().min(output.samples_per_channel()))
    }
}
