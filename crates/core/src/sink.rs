// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Output sink seam.

use crate::error::SinkError;
use crate::types::AudioFrame;

/// Destination for combined, canonical-format frames.
///
/// `accept` is called synchronously from the drain loop, once per drained frame. An
/// error aborts the submission that triggered the drain; the mixer never retries.
pub trait OutputSink {
    /// # Errors
    ///
    /// Returns an error if the frame cannot be persisted or forwarded.
    fn accept(&mut self, frame: &AudioFrame) -> Result<(), SinkError>;
}

impl<S: OutputSink + ?Sized> OutputSink for &mut S {
    fn accept(&mut self, frame: &AudioFrame) -> Result<(), SinkError> {
        (**self).accept(frame)
    }
}

impl<S: OutputSink + ?Sized> OutputSink for Box<S> {
    fn accept(&mut self, frame: &AudioFrame) -> Result<(), SinkError> {
        (**self).accept(frame)
    }
}
