// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use callmix_core::{AudioFrame, OutputSink, SinkError};

/// In-memory sink.
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    frames: Vec<AudioFrame>,
}

impl CollectingSink {
    pub fn frames(&self) -> &[AudioFrame] {
        &self.frames
    }

    /// Sample frames received across all frames.
    pub fn total_samples(&self) -> usize {
        self.frames.iter().map(AudioFrame::samples_per_channel).sum()
    }
}

impl OutputSink for CollectingSink {
    fn accept(&mut self, frame: &AudioFrame) -> Result<(), SinkError> {
        self.frames.push(frame.clone());
        Ok(())
    }
}
