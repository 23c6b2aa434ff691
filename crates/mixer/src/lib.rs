// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! callmix-mixer: stream synchronizer and silence filler for call recording.
//!
//! Call legs arrive independently, start late and stall. [`MixerSession`] puts them on
//! one timeline (per-input offsets), keeps every leg within a bounded distance of the
//! output position (silence injection), feeds a [`callmix_core::MixingEngine`] and
//! drains the combined audio into a [`callmix_core::OutputSink`].
//!
//! Reference collaborators are included: [`SummingEngineFactory`] for mixing,
//! [`FormatConverterFactory`] for output format conversion and the sinks in [`sinks`].

pub mod convert;
pub mod drain;
pub mod driver;
mod offset;
pub mod resample;
pub mod session;
pub mod silence;
pub mod sinks;
pub mod stats;
pub mod summing;
pub mod test_utils;
pub mod timeline;

pub use convert::{FormatConverter, FormatConverterFactory};
pub use driver::{spawn_session_driver, DriverError, SessionCommand, SessionHandle};
pub use resample::ResampleAdapter;
pub use session::MixerSession;
pub use stats::SessionStats;
pub use summing::{SummingEngine, SummingEngineConfig, SummingEngineFactory};
pub use timeline::{InputState, Timeline};
