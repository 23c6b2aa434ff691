// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Timeline alignment and drift bounds across inputs.

#![allow(clippy::unwrap_used)]

use callmix_core::{AudioFrame, MixerConfig};
use callmix_mixer::sinks::CollectingSink;
use callmix_mixer::test_utils::{mono_frame, mono_session};
use callmix_mixer::{FormatConverterFactory, MixerSession, SummingEngineConfig, SummingEngineFactory};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A leg joining late with an unrelated clock lands on the current output position,
/// and its later frames keep the same offset.
#[test]
fn late_joiner_is_aligned_to_output() {
    init_tracing();
    let mut session = mono_session(2, SummingEngineConfig::default());
    let mut sink = CollectingSink::default();

    for n in 0..10 {
        session.submit(0, mono_frame(8000, 3_000 + n * 160, 160, 10), &mut sink).unwrap();
    }
    assert_eq!(session.input(0).unwrap().offset(), Some(-3_000));
    let joined_at = session.output_timestamp();
    assert_eq!(joined_at, 1_600);

    let base = 987_654;
    let mut previous_end = i64::MIN;
    for n in 0..5 {
        session.submit(1, mono_frame(8000, base + n * 160, 160, 20), &mut sink).unwrap();
        let end = session.input(1).unwrap().next_expected();
        assert_eq!(end, joined_at + (n + 1) * 160);
        assert!(end > previous_end);
        previous_end = end;
    }
    assert_eq!(session.input(1).unwrap().offset(), Some(joined_at - base));
    // Backfilled from zero to the join point so both legs line up in the combiner.
    assert_eq!(session.input(1).unwrap().silence_samples(), 1_600);
}

/// Gaps inside one leg are filled with silence before the next frame is forwarded.
#[test]
fn gap_in_leg_is_filled() {
    init_tracing();
    let mut session = mono_session(1, SummingEngineConfig::default());
    let mut sink = CollectingSink::default();

    session.submit(0, mono_frame(8000, 0, 160, 1), &mut sink).unwrap();
    session.submit(0, mono_frame(8000, 400, 160, 1), &mut sink).unwrap();

    let input = session.input(0).unwrap();
    assert_eq!(input.silence_samples(), 240);
    assert_eq!(input.next_expected(), 560);
    assert_eq!(sink.total_samples(), 560);
}

/// With one active and one silent leg, no leg lags the output by more than one
/// second once a second of output exists.
#[test]
fn drift_is_bounded_at_one_second() {
    init_tracing();
    let config = MixerConfig { input_capacity: 2, ..Default::default() };
    let mut session =
        MixerSession::new(config, SummingEngineFactory::default(), FormatConverterFactory).unwrap();
    session.configure(16_000, 2).unwrap();
    let active = session.allocate_input_index().unwrap();
    let silent = session.allocate_input_index().unwrap();
    let mut sink = CollectingSink::default();

    for n in 0..250 {
        let frame = AudioFrame::from_interleaved_s16(16_000, 2, n * 320, vec![7; 640]);
        session.submit(active, frame, &mut sink).unwrap();

        let output = session.output_timestamp();
        if output >= 16_000 {
            for index in [active, silent] {
                let lag = output - session.input(index).unwrap().next_expected();
                assert!(lag <= 16_000, "input {index} lags {lag} at {output}");
            }
        }
    }
    assert_eq!(session.output_timestamp(), 80_000);
    assert_eq!(session.input(silent).unwrap().next_expected(), 64_000);
    assert!(sink.frames().iter().all(|f| f.channels() == 2 && f.sample_rate() == 16_000));
}

/// Slots nobody allocated are force-advanced too; otherwise the combiner would wait
/// on them forever.
#[test]
fn unallocated_slots_are_filled() {
    init_tracing();
    let config = MixerConfig::default();
    let mut session =
        MixerSession::new(config, SummingEngineFactory::default(), FormatConverterFactory).unwrap();
    session.configure(8000, 1).unwrap();
    let index = session.allocate_input_index().unwrap();
    let mut sink = CollectingSink::default();

    for n in 0..60 {
        session.submit(index, mono_frame(8000, n * 160, 160, 3), &mut sink).unwrap();
    }

    let output = session.output_timestamp();
    assert_eq!(output, 9_600);
    for slot in 1..4 {
        assert_eq!(session.input(slot).unwrap().next_expected(), output - 8000);
    }
    assert_eq!(sink.total_samples(), 1_600);
}

/// A shorter drift window and threshold tighten the bound accordingly.
#[test]
fn drift_window_is_tunable() {
    init_tracing();
    let config = MixerConfig {
        input_capacity: 2,
        drift_window_ms: 100,
        fill_threshold_ms: 200,
        ..Default::default()
    };
    let mut session =
        MixerSession::new(config, SummingEngineFactory::default(), FormatConverterFactory).unwrap();
    session.configure(8000, 1).unwrap();
    session.allocate_input_index().unwrap();
    let mut sink = CollectingSink::default();

    for n in 0..10 {
        session.submit(0, mono_frame(8000, n * 160, 160, 3), &mut sink).unwrap();
    }
    assert_eq!(session.output_timestamp(), 1_600);
    assert_eq!(session.input(1).unwrap().next_expected(), 800);
}
