// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use callmix_core::{AudioFrame, OutputSink, SinkError};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Forwards combined frames to a tokio mpsc channel.
///
/// The drain loop is synchronous, so the sink never waits for room: a full channel
/// is reported as [`SinkError::Full`] and a dropped receiver as [`SinkError::Closed`].
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<AudioFrame>,
}

impl ChannelSink {
    pub const fn new(tx: mpsc::Sender<AudioFrame>) -> Self {
        Self { tx }
    }

    /// Creates a sink and the receiver its frames arrive on.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<AudioFrame>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }
}

impl OutputSink for ChannelSink {
    fn accept(&mut self, frame: &AudioFrame) -> Result<(), SinkError> {
        self.tx.try_send(frame.clone()).map_err(|e| match e {
            TrySendError::Full(_) => SinkError::Full,
            TrySendError::Closed(_) => SinkError::Closed,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn forwards_until_full() {
        let (mut sink, mut rx) = ChannelSink::channel(1);
        let frame = AudioFrame::from_interleaved_s16(8000, 1, 0, vec![1; 80]);

        sink.accept(&frame).unwrap();
        assert!(matches!(sink.accept(&frame), Err(SinkError::Full)));
        assert_eq!(rx.try_recv().unwrap(), frame);
    }

    #[test]
    fn closed_receiver_is_an_error() {
        let (mut sink, rx) = ChannelSink::channel(4);
        drop(rx);
        let frame = AudioFrame::from_interleaved_s16(8000, 1, 0, vec![1; 80]);
        assert!(matches!(sink.accept(&frame), Err(SinkError::Closed)));
    }
}
