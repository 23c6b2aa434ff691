// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Silence injection.
//!
//! The engine only releases combined output once every input has data for the
//! period, so an input that stalls (or never starts) would hold back the whole
//! recording. The filler synthesizes zero-amplitude chunks for lagging inputs and
//! forwards them exactly like real frames.

use crate::stats::SessionStats;
use crate::timeline::Timeline;
use callmix_core::{AudioFrame, ChannelLayout, MixingEngine, SampleFormat};

/// Produces and forwards silence chunks for one topology.
#[derive(Debug)]
pub struct SilenceFiller {
    format: SampleFormat,
    clock_rate: u32,
    layout: ChannelLayout,
    chunk_samples: usize,
    template: Option<AudioFrame>,
}

impl SilenceFiller {
    pub const fn new(
        format: SampleFormat,
        clock_rate: u32,
        layout: ChannelLayout,
        chunk_samples: usize,
    ) -> Self {
        Self { format, clock_rate, layout, chunk_samples, template: None }
    }

    /// Reusable zero-filled chunk, created on first use.
    fn template(&mut self) -> &AudioFrame {
        let (format, rate, layout, samples) =
            (self.format, self.clock_rate, self.layout, self.chunk_samples);
        self.template.get_or_insert_with(|| AudioFrame::silence(format, rate, layout, samples))
    }

    /// Forwards silence on `index` until its counter reaches `upto`.
    ///
    /// Chunks are clamped so the counter lands exactly on `upto`. The counter advances
    /// before each chunk is forwarded, so a chunk the engine refuses is logged and
    /// skipped without stalling the loop. Returns the number of chunks produced.
    pub fn fill_to<E: MixingEngine>(
        &mut self,
        engine: &mut E,
        timeline: &mut Timeline,
        index: usize,
        upto: i64,
        stats: &mut SessionStats,
    ) -> usize {
        let mut chunks = 0;
        loop {
            let Some(position) = timeline.input(index).map(|input| input.next_expected()) else {
                return chunks;
            };
            if position >= upto {
                return chunks;
            }

            let remaining = usize::try_from(upto - position).unwrap_or(usize::MAX);
            let samples = remaining.min(self.chunk_samples);
            let mut chunk = self.template().clone();
            chunk.truncate(samples);
            chunk.timestamp = position;

            let end = chunk.end_timestamp();
            timeline.advance(index, end);
            timeline.record_silence(index, samples as u64);
            chunks += 1;

            match engine.submit(index, chunk) {
                Ok(()) => stats.silence_injected(),
                Err(e) => {
                    stats.silence_failed();
                    tracing::warn!(
                        input = index,
                        timestamp = position,
                        samples,
                        "Failed to inject silence chunk: {}",
                        e
                    );
                },
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::RecordingEngine;

    fn filler() -> SilenceFiller {
        SilenceFiller::new(SampleFormat::S16, 8000, ChannelLayout::MONO, 80)
    }

    #[test]
    fn fills_in_clamped_chunks() {
        let mut engine = RecordingEngine::default();
        let mut timeline = Timeline::new(1);
        let mut stats = SessionStats::default();

        let chunks = filler().fill_to(&mut engine, &mut timeline, 0, 200, &mut stats);

        assert_eq!(chunks, 3);
        let sizes: Vec<_> = engine.submitted.iter().map(|(_, ts, n)| (*ts, *n)).collect();
        assert_eq!(sizes, vec![(0, 80), (80, 80), (160, 40)]);
        assert_eq!(timeline.input(0).unwrap().next_expected(), 200);
        assert_eq!(timeline.input(0).unwrap().silence_samples(), 200);
        assert_eq!(timeline.output_timestamp(), 200);
        assert_eq!(stats.silence_chunks_injected, 3);
    }

    #[test]
    fn nothing_to_do_when_caught_up() {
        let mut engine = RecordingEngine::default();
        let mut timeline = Timeline::new(1);
        timeline.advance(0, 400);
        let mut stats = SessionStats::default();

        assert_eq!(filler().fill_to(&mut engine, &mut timeline, 0, 300, &mut stats), 0);
        assert!(engine.submitted.is_empty());
    }

    #[test]
    fn refused_chunks_still_advance_counter() {
        let mut engine = RecordingEngine { refuse_input: Some(0), ..Default::default() };
        let mut timeline = Timeline::new(1);
        let mut stats = SessionStats::default();

        let chunks = filler().fill_to(&mut engine, &mut timeline, 0, 160, &mut stats);

        assert_eq!(chunks, 2);
        assert_eq!(timeline.input(0).unwrap().next_expected(), 160);
        assert_eq!(stats.silence_chunks_failed, 2);
        assert_eq!(stats.silence_chunks_injected, 0);
    }

    #[test]
    fn chunks_are_silent_and_well_formed() {
        let mut filler = SilenceFiller::new(SampleFormat::S16, 8000, ChannelLayout::STEREO, 80);
        let chunk = filler.template().clone();
        assert_eq!(chunk.channels(), 2);
        assert_eq!(chunk.samples_per_channel(), 80);
        assert_eq!(chunk.planes()[0], callmix_core::Plane::S16(vec![0; 160]));
    }
}
