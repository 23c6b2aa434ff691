// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Drain loop: engine output to sink.

use callmix_core::{MixError, MixingEngine, OutputSink, Pull, ResamplerFactory};

use crate::resample::ResampleAdapter;
use crate::stats::SessionStats;

/// Pulls every combined frame the engine is ready to release, converts it to the
/// canonical format and hands it to `sink`. Returns the number of frames delivered.
///
/// `NotReady` ends the loop normally. A frame that fails conversion is dropped and
/// the loop moves on to the next pull. A sink failure ends the loop immediately and
/// is returned; frames already delivered stay delivered.
///
/// # Errors
///
/// Returns `MixError::Engine` if pulling fails and `MixError::Sink` if the sink
/// rejects a frame.
pub fn drain<E, F, S>(
    engine: &mut E,
    adapter: &mut ResampleAdapter<F::Resampler>,
    factory: &F,
    sink: &mut S,
    stats: &mut SessionStats,
) -> Result<usize, MixError>
where
    E: MixingEngine + ?Sized,
    F: ResamplerFactory,
    S: OutputSink + ?Sized,
{
    let mut delivered = 0;
    loop {
        let frame = match engine.try_pull()? {
            Pull::Frame(frame) => frame,
            Pull::NotReady => break,
        };

        let converted = match adapter.process(factory, &frame) {
            Ok(converted) => converted,
            Err(e) => {
                stats.conversion_failed();
                tracing::error!(
                    timestamp = frame.timestamp,
                    samples = frame.samples_per_channel(),
                    "Failed to convert combined frame, dropping it: {}",
                    e
                );
                continue;
            },
        };

        sink.accept(converted)?;
        stats.drained();
        delivered += 1;
    }
    Ok(delivered)
}
