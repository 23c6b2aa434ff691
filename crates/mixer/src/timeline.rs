// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Running timestamp counters.
//!
//! Every frame forwarded to the engine, real or synthesized, moves the counter of its
//! input and the shared output position forward to the frame's end. Counters only
//! ever move forward.

use serde::Serialize;

/// Synchronization state of one combiner input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InputState {
    /// Adjustment mapping this input's clock onto the output timeline. Fixed by the
    /// first frame the input contributes.
    pub(crate) offset: Option<i64>,
    pub(crate) next_expected: i64,
    pub(crate) silence_samples: u64,
    pub(crate) frames: u64,
}

impl InputState {
    pub const fn offset(&self) -> Option<i64> {
        self.offset
    }

    /// Timestamp the next frame on this input is expected to start at.
    pub const fn next_expected(&self) -> i64 {
        self.next_expected
    }

    /// Total silence injected into this input, in sample frames.
    pub const fn silence_samples(&self) -> u64 {
        self.silence_samples
    }

    /// Real frames forwarded on this input.
    pub const fn frames(&self) -> u64 {
        self.frames
    }
}

/// Per-input and global counters for one topology.
#[derive(Debug, Clone)]
pub struct Timeline {
    inputs: Vec<InputState>,
    output: i64,
}

impl Timeline {
    pub fn new(capacity: usize) -> Self {
        Self { inputs: vec![InputState::default(); capacity], output: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.inputs.len()
    }

    /// Current position of the shared output timeline.
    pub const fn output_timestamp(&self) -> i64 {
        self.output
    }

    pub fn input(&self, index: usize) -> Option<&InputState> {
        self.inputs.get(index)
    }

    pub(crate) fn input_mut(&mut self, index: usize) -> Option<&mut InputState> {
        self.inputs.get_mut(index)
    }

    /// Records that a frame ending at `end` was forwarded on `index`.
    pub fn advance(&mut self, index: usize, end: i64) {
        if let Some(input) = self.inputs.get_mut(index) {
            input.next_expected = input.next_expected.max(end);
        }
        self.output = self.output.max(end);
    }

    pub(crate) fn record_frame(&mut self, index: usize) {
        if let Some(input) = self.inputs.get_mut(index) {
            input.frames += 1;
        }
    }

    pub(crate) fn record_silence(&mut self, index: usize, samples: u64) {
        if let Some(input) = self.inputs.get_mut(index) {
            input.silence_samples += samples;
        }
    }

    /// Starts a fresh timeline: offsets unset, every counter back at zero.
    pub fn reset(&mut self) {
        self.inputs.fill(InputState::default());
        self.output = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_moves_input_and_output() {
        let mut timeline = Timeline::new(2);
        timeline.advance(0, 160);
        assert_eq!(timeline.input(0).map(InputState::next_expected), Some(160));
        assert_eq!(timeline.input(1).map(InputState::next_expected), Some(0));
        assert_eq!(timeline.output_timestamp(), 160);

        timeline.advance(1, 80);
        assert_eq!(timeline.output_timestamp(), 160);
    }

    #[test]
    fn counters_never_move_backwards() {
        let mut timeline = Timeline::new(1);
        timeline.advance(0, 320);
        timeline.advance(0, 160);
        assert_eq!(timeline.input(0).map(InputState::next_expected), Some(320));
        assert_eq!(timeline.output_timestamp(), 320);
    }

    #[test]
    fn reset_clears_offsets_and_counters() {
        let mut timeline = Timeline::new(2);
        if let Some(input) = timeline.input_mut(1) {
            input.offset = Some(42);
        }
        timeline.advance(1, 500);
        timeline.record_silence(1, 80);
        timeline.reset();

        assert_eq!(timeline.capacity(), 2);
        assert_eq!(timeline.output_timestamp(), 0);
        assert_eq!(timeline.input(1), Some(&InputState::default()));
    }
}
