// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Per-input clock alignment.
//!
//! Legs join a call at arbitrary points and stamp frames with their own clocks. The
//! first frame of an input fixes `offset = output_timestamp - frame_timestamp`, so that
//! frame lands exactly where the output timeline currently is. Every later frame of the
//! input is shifted by the same amount.

use crate::timeline::InputState;

/// Maps `timestamp` onto the output timeline, fixing the input's offset on first use.
pub(crate) fn resolve(input: &mut InputState, output_timestamp: i64, timestamp: i64) -> i64 {
    let offset = *input.offset.get_or_insert_with(|| output_timestamp.saturating_sub(timestamp));
    timestamp.saturating_add(offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_lands_on_output_position() {
        let mut input = InputState::default();
        assert_eq!(resolve(&mut input, 8000, 123_456), 8000);
        assert_eq!(input.offset(), Some(8000 - 123_456));
    }

    #[test]
    fn offset_is_fixed_after_first_frame() {
        let mut input = InputState::default();
        resolve(&mut input, 500, 100);
        // Output moved on, offset must not.
        assert_eq!(resolve(&mut input, 9000, 260), 660);
        assert_eq!(input.offset(), Some(400));
    }

    #[test]
    fn negative_offsets_are_allowed() {
        let mut input = InputState::default();
        assert_eq!(resolve(&mut input, 0, 1_000), 0);
        assert_eq!(resolve(&mut input, 0, 1_160), 160);
    }
}
