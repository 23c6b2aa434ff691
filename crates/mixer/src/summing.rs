// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Reference mixing engine.
//!
//! The topology is one buffer source per input, a combiner of fixed arity and a sink
//! endpoint. The combiner releases a period only once every source holds samples for
//! it, so a starving input holds everything back until it is fed (real audio or
//! silence). Contributions are summed unweighted in 32-bit float and emitted as planar
//! float frames stamped with the combiner's own running position.

use std::collections::VecDeque;

use callmix_core::{
    AudioFrame, BuildError, BuildStage, ChannelLayout, EngineError, EngineFactory, MixingEngine,
    Pull, SampleFormat, TopologySpec,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::convert::to_planar_f32;

/// Configuration for the reference summing engine.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
#[serde(default)]
pub struct SummingEngineConfig {
    /// Largest combined frame released per pull, in sample frames.
    pub max_frame_samples: usize,
}

impl Default for SummingEngineConfig {
    fn default() -> Self {
        Self { max_frame_samples: 1024 }
    }
}

/// Builds [`SummingEngine`] topologies.
#[derive(Debug, Clone, Default)]
pub struct SummingEngineFactory {
    config: SummingEngineConfig,
}

impl SummingEngineFactory {
    pub const fn new(config: SummingEngineConfig) -> Self {
        Self { config }
    }
}

/// Per-input buffer source. Only accepts frames in the format it was built for.
#[derive(Debug)]
struct Source {
    queue: SmallVec<[VecDeque<f32>; 2]>,
}

impl Source {
    fn new(channels: u16) -> Self {
        Self { queue: (0..channels).map(|_| VecDeque::new()).collect() }
    }

    fn buffered(&self) -> usize {
        self.queue.iter().map(VecDeque::len).min().unwrap_or(0)
    }
}

/// Combiner slot table; a source is linked into exactly one slot.
#[derive(Debug)]
struct Combiner {
    slots: Vec<bool>,
}

impl Combiner {
    fn link(&mut self, input: usize) -> Result<(), String> {
        match self.slots.get_mut(input) {
            Some(linked) if *linked => Err(format!("slot {input} already linked")),
            Some(linked) => {
                *linked = true;
                Ok(())
            },
            None => Err(format!("combiner has {} slots", self.slots.len())),
        }
    }

    fn fully_linked(&self) -> bool {
        self.slots.iter().all(|linked| *linked)
    }
}

impl EngineFactory for SummingEngineFactory {
    type Engine = SummingEngine;

    fn build(&self, spec: &TopologySpec) -> Result<SummingEngine, BuildError> {
        if spec.clock_rate == 0 {
            return Err(BuildError::new(BuildStage::Format, "clock rate must be non-zero"));
        }
        if spec.layout.channels() == 0 {
            return Err(BuildError::new(BuildStage::Format, "channel count must be non-zero"));
        }

        if spec.inputs == 0 {
            return Err(BuildError::new(BuildStage::Combiner, "combiner needs at least one input"));
        }
        let mut combiner = Combiner { slots: vec![false; spec.inputs] };

        let mut sources = Vec::with_capacity(spec.inputs);
        for input in 0..spec.inputs {
            sources.push(Source::new(spec.layout.channels()));
            combiner
                .link(input)
                .map_err(|reason| BuildError::new(BuildStage::LinkSource(input), reason))?;
        }

        if self.config.max_frame_samples == 0 {
            return Err(BuildError::new(BuildStage::Sink, "max_frame_samples must be non-zero"));
        }

        if !combiner.fully_linked() {
            return Err(BuildError::new(BuildStage::Activate, "combiner has unlinked slots"));
        }

        tracing::debug!(
            inputs = spec.inputs,
            format = %spec.sample_format,
            clock_rate = spec.clock_rate,
            layout = %spec.layout,
            "Built summing topology"
        );

        Ok(SummingEngine {
            format: spec.sample_format,
            clock_rate: spec.clock_rate,
            layout: spec.layout,
            max_frame_samples: self.config.max_frame_samples,
            sources,
            position: 0,
        })
    }
}

/// A built summing topology.
#[derive(Debug)]
pub struct SummingEngine {
    format: SampleFormat,
    clock_rate: u32,
    layout: ChannelLayout,
    max_frame_samples: usize,
    sources: Vec<Source>,
    position: i64,
}

impl SummingEngine {
    /// Sample frames waiting on `input`'s source.
    pub fn buffered(&self, input: usize) -> Option<usize> {
        self.sources.get(input).map(Source::buffered)
    }
}

impl MixingEngine for SummingEngine {
    fn submit(&mut self, input: usize, frame: AudioFrame) -> Result<(), EngineError> {
        let Some(source) = self.sources.get_mut(input) else {
            return Err(EngineError::UnknownInput(input));
        };
        if frame.format() != self.format
            || frame.sample_rate() != self.clock_rate
            || frame.channels() != self.layout.channels()
        {
            return Err(EngineError::FormatMismatch {
                input,
                expected: format!("{} {} Hz {}ch", self.format, self.clock_rate, self.layout.channels()),
                actual: format!(
                    "{} {} Hz {}ch",
                    frame.format(),
                    frame.sample_rate(),
                    frame.channels()
                ),
            });
        }

        if !frame.planes_consistent() {
            return Err(EngineError::Internal(format!(
                "input {input} frame planes do not match its sample count"
            )));
        }

        for (queue, samples) in source.queue.iter_mut().zip(to_planar_f32(&frame)) {
            queue.extend(samples);
        }
        Ok(())
    }

    fn try_pull(&mut self) -> Result<Pull, EngineError> {
        let ready = self.sources.iter().map(Source::buffered).min().unwrap_or(0);
        if ready == 0 {
            return Ok(Pull::NotReady);
        }
        let samples = ready.min(self.max_frame_samples);

        let mut mixed = vec![vec![0.0f32; samples]; usize::from(self.layout.channels())];
        for source in &mut self.sources {
            for (out, queue) in mixed.iter_mut().zip(source.queue.iter_mut()) {
                for (acc, sample) in out.iter_mut().zip(queue.drain(..samples)) {
                    *acc += sample;
                }
            }
        }

        let frame = AudioFrame::from_planar_f32(self.clock_rate, self.position, mixed);
        self.position = frame.end_timestamp();
        Ok(Pull::Frame(frame))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use callmix_core::Plane;

    fn spec(inputs: usize) -> TopologySpec {
        TopologySpec {
            inputs,
            sample_format: SampleFormat::S16,
            clock_rate: 8000,
            layout: ChannelLayout::MONO,
        }
    }

    fn pull_frame(engine: &mut SummingEngine) -> AudioFrame {
        match engine.try_pull().unwrap() {
            Pull::Frame(frame) => frame,
            Pull::NotReady => panic!("expected a combined frame"),
        }
    }

    #[test]
    fn starves_until_every_input_has_data() {
        let mut engine = SummingEngineFactory::default().build(&spec(2)).unwrap();
        engine.submit(0, AudioFrame::from_interleaved_s16(8000, 1, 0, vec![100; 160])).unwrap();
        assert!(matches!(engine.try_pull().unwrap(), Pull::NotReady));

        engine.submit(1, AudioFrame::from_interleaved_s16(8000, 1, 0, vec![50; 80])).unwrap();
        let frame = pull_frame(&mut engine);
        assert_eq!(frame.samples_per_channel(), 80);
        assert_eq!(frame.format(), SampleFormat::F32Planar);
        assert_eq!(engine.buffered(0), Some(80));
        assert!(matches!(engine.try_pull().unwrap(), Pull::NotReady));
    }

    #[test]
    fn sums_contributions() {
        let mut engine = SummingEngineFactory::default().build(&spec(2)).unwrap();
        engine.submit(0, AudioFrame::from_interleaved_s16(8000, 1, 0, vec![8192, -8192])).unwrap();
        engine.submit(1, AudioFrame::from_interleaved_s16(8000, 1, 0, vec![8192, 0])).unwrap();

        let frame = pull_frame(&mut engine);
        assert_eq!(frame.planes()[0], Plane::F32(vec![0.5, -0.25]));
    }

    #[test]
    fn output_is_stamped_on_running_position() {
        let config = SummingEngineConfig { max_frame_samples: 100 };
        let mut engine = SummingEngineFactory::new(config).build(&spec(1)).unwrap();
        engine.submit(0, AudioFrame::from_interleaved_s16(8000, 1, 5000, vec![0; 250])).unwrap();

        let stamps: Vec<_> = (0..3).map(|_| pull_frame(&mut engine)).map(|f| f.timestamp).collect();
        assert_eq!(stamps, vec![0, 100, 200]);
    }

    #[test]
    fn rejects_foreign_format() {
        let mut engine = SummingEngineFactory::default().build(&spec(1)).unwrap();
        let err = engine.submit(0, AudioFrame::from_interleaved_s16(16000, 1, 0, vec![0; 10]));
        assert!(matches!(err, Err(EngineError::FormatMismatch { input: 0, .. })));
        assert!(matches!(
            engine.submit(3, AudioFrame::from_interleaved_s16(8000, 1, 0, vec![0; 10])),
            Err(EngineError::UnknownInput(3))
        ));
    }

    #[test]
    fn rejects_truncated_planes() {
        let mut engine = SummingEngineFactory::default().build(&spec(1)).unwrap();
        let mut frame = AudioFrame::from_interleaved_s16(8000, 1, 0, vec![0; 160]);
        frame.planes_mut()[0] = Plane::S16(vec![0; 10]);

        assert!(matches!(engine.submit(0, frame), Err(EngineError::Internal(_))));
        assert_eq!(engine.buffered(0), Some(0));
    }

    #[test]
    fn build_failures_name_the_stage() {
        let factory = SummingEngineFactory::default();

        let mut bad = spec(2);
        bad.clock_rate = 0;
        assert_eq!(factory.build(&bad).unwrap_err().stage, BuildStage::Format);

        assert_eq!(factory.build(&spec(0)).unwrap_err().stage, BuildStage::Combiner);

        let zero_frames = SummingEngineFactory::new(SummingEngineConfig { max_frame_samples: 0 });
        assert_eq!(zero_frames.build(&spec(1)).unwrap_err().stage, BuildStage::Sink);
    }

    #[test]
    fn double_link_is_refused() {
        let mut combiner = Combiner { slots: vec![false; 2] };
        combiner.link(1).unwrap();
        assert!(combiner.link(1).is_err());
        assert!(combiner.link(2).is_err());
        assert!(!combiner.fully_linked());
    }
}
