// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Session statistics.

use serde::{Deserialize, Serialize};

/// Counters accumulated over the lifetime of a mixer session. Rebuilding the topology
/// does not reset them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Frames accepted by `submit` (after validation)
    pub frames_submitted: u64,
    /// Frames dropped because they ended before their input's next expected timestamp
    pub stale_frames_dropped: u64,
    /// Frames trimmed at the front because they overlapped already forwarded audio
    pub frames_trimmed: u64,
    /// Silence chunks forwarded to the engine
    pub silence_chunks_injected: u64,
    /// Silence chunks the engine refused (logged and skipped)
    pub silence_chunks_failed: u64,
    /// Combined frames delivered to the output sink
    pub frames_drained: u64,
    /// Combined frames dropped because conversion to the canonical format failed
    pub conversion_failures: u64,
    /// Times the resample buffer had to grow
    pub resample_allocations: u64,
    /// Times the resample buffer was reused without growing
    pub resample_reuses: u64,
}

impl SessionStats {
    #[inline]
    pub(crate) const fn submitted(&mut self) {
        self.frames_submitted += 1;
    }

    #[inline]
    pub(crate) const fn stale(&mut self) {
        self.stale_frames_dropped += 1;
    }

    #[inline]
    pub(crate) const fn trimmed(&mut self) {
        self.frames_trimmed += 1;
    }

    #[inline]
    pub(crate) const fn silence_injected(&mut self) {
        self.silence_chunks_injected += 1;
    }

    #[inline]
    pub(crate) const fn silence_failed(&mut self) {
        self.silence_chunks_failed += 1;
    }

    #[inline]
    pub(crate) const fn drained(&mut self) {
        self.frames_drained += 1;
    }

    #[inline]
    pub(crate) const fn conversion_failed(&mut self) {
        self.conversion_failures += 1;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_field_names() {
        let mut stats = SessionStats::default();
        stats.submitted();
        stats.silence_injected();
        stats.silence_injected();

        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["frames_submitted"], 1);
        assert_eq!(json["silence_chunks_injected"], 2);
        assert_eq!(json["conversion_failures"], 0);

        let parsed: SessionStats = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, stats);
    }
}
