// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Concurrent producers feeding one session through the async driver.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use callmix_core::MixerConfig;
use callmix_mixer::sinks::ChannelSink;
use callmix_mixer::test_utils::mono_frame;
use callmix_mixer::{
    spawn_session_driver, FormatConverterFactory, MixerSession, SummingEngineFactory,
};

#[tokio::test]
async fn concurrent_legs_are_serialized() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let config = MixerConfig { input_capacity: 2, ..Default::default() };
    let session =
        MixerSession::new(config, SummingEngineFactory::default(), FormatConverterFactory).unwrap();
    let (sink, mut rx) = ChannelSink::channel(4096);
    let handle = Arc::new(spawn_session_driver(session, sink, 16));
    handle.configure(8000, 1).await.unwrap();

    let mut legs = Vec::new();
    for leg in 0..2i64 {
        let handle = Arc::clone(&handle);
        legs.push(tokio::spawn(async move {
            let index = handle.allocate_input().await.unwrap();
            for n in 0..60 {
                let frame = mono_frame(8000, leg * 10_000 + n * 160, 160, 100);
                handle.submit(index, frame).await.unwrap();
                tokio::task::yield_now().await;
            }
            index
        }));
    }
    let mut indices = Vec::new();
    for leg in legs {
        indices.push(leg.await.unwrap());
    }
    indices.sort_unstable();
    assert_eq!(indices, vec![0, 1]);

    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.frames_submitted, 120);
    assert_eq!(stats.stale_frames_dropped, 0);

    let handle = Arc::try_unwrap(handle).ok().expect("legs still hold the handle");
    let (session, _sink) = handle.shutdown().await.unwrap();
    for index in indices {
        assert_eq!(session.input(index).unwrap().frames(), 60);
    }

    let mut received = 0;
    while let Ok(frame) = rx.try_recv() {
        assert_eq!(frame.sample_rate(), 8000);
        received += 1;
    }
    assert_eq!(received, stats.frames_drained);
}
