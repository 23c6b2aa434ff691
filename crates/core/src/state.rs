// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Session state machine.
//!
//! ```text
//!     Uninitialized ──configure──▶ Configured
//!           ▲                          │
//!           └──── teardown / format ───┘
//!                   change
//! ```
//!
//! A format change passes through `Uninitialized` on its way to the new
//! `Configured` state; the whole topology is rebuilt as one unit.

use std::fmt;

/// Format parameters a topology is locked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamFormat {
    pub clock_rate: u32,
    pub channels: u16,
}

impl StreamFormat {
    pub const fn new(clock_rate: u32, channels: u16) -> Self {
        Self { clock_rate, channels }
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz/{}ch", self.clock_rate, self.channels)
    }
}

/// Lifecycle state of a mixer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No topology. Submissions are rejected.
    #[default]
    Uninitialized,
    /// Topology built for `format`. `generation` counts successful builds over the
    /// session's lifetime, so an unchanged generation means no rebuild happened.
    Configured { format: StreamFormat, generation: u64 },
}

impl SessionState {
    pub const fn is_configured(&self) -> bool {
        matches!(self, Self::Configured { .. })
    }

    pub const fn format(&self) -> Option<StreamFormat> {
        match self {
            Self::Configured { format, .. } => Some(*format),
            Self::Uninitialized => None,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Configured { format, generation } => {
                write!(f, "configured ({format}, generation {generation})")
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_uninitialized() {
        let state = SessionState::default();
        assert!(!state.is_configured());
        assert_eq!(state.format(), None);
    }

    #[test]
    fn configured_display() {
        let state =
            SessionState::Configured { format: StreamFormat::new(8000, 1), generation: 3 };
        assert_eq!(state.to_string(), "configured (8000 Hz/1ch, generation 3)");
    }
}
