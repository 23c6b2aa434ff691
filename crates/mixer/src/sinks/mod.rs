// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Bundled [`OutputSink`](callmix_core::OutputSink) implementations.
//!
//! - [`CollectingSink`]: keeps every frame in memory
//! - [`WavFileSink`]: writes 16-bit PCM to a WAV file
//! - [`ChannelSink`]: forwards frames to a tokio mpsc channel

mod channel;
mod collect;
mod wav;

pub use channel::ChannelSink;
pub use collect::CollectingSink;
pub use wav::WavFileSink;
