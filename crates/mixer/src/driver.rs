// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Async per-call driver.
//!
//! A [`MixerSession`] is synchronous and must not be entered concurrently. The driver
//! moves a session and its sink into a tokio task and feeds it through a command
//! channel, so any number of producers (one per call leg, typically) can submit
//! frames while every call into the session stays serialized.

use callmix_core::{AudioFrame, EngineFactory, MixError, OutputSink, ResamplerFactory};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::session::MixerSession;
use crate::stats::SessionStats;

/// Default depth of the command channel.
pub const DEFAULT_COMMAND_CAPACITY: usize = 64;

/// Errors returned through a [`SessionHandle`].
#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Mix(#[from] MixError),

    #[error("session driver has stopped")]
    Stopped,

    #[error("session driver task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

type Reply<T> = oneshot::Sender<Result<T, MixError>>;

/// Commands accepted by the driver task.
#[derive(Debug)]
pub enum SessionCommand {
    Configure { clock_rate: u32, channels: u16, reply: Reply<()> },
    AllocateInput { reply: Reply<usize> },
    Submit { index: usize, frame: AudioFrame, reply: Reply<()> },
    Flush { reply: Reply<usize> },
    Stats { reply: oneshot::Sender<SessionStats> },
    Shutdown,
}

/// Client side of a running session driver.
pub struct SessionHandle<F: EngineFactory, R: ResamplerFactory, S> {
    tx: mpsc::Sender<SessionCommand>,
    cancel: CancellationToken,
    task: JoinHandle<(MixerSession<F, R>, S)>,
}

/// Moves `session` and `sink` into a new task on the current tokio runtime.
pub fn spawn_session_driver<F, R, S>(
    session: MixerSession<F, R>,
    sink: S,
    capacity: usize,
) -> SessionHandle<F, R, S>
where
    F: EngineFactory + Send + 'static,
    F::Engine: Send,
    R: ResamplerFactory + Send + 'static,
    R::Resampler: Send,
    S: OutputSink + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run(session, sink, rx, cancel.clone()));
    SessionHandle { tx, cancel, task }
}

async fn run<F, R, S>(
    mut session: MixerSession<F, R>,
    mut sink: S,
    mut rx: mpsc::Receiver<SessionCommand>,
    cancel: CancellationToken,
) -> (MixerSession<F, R>, S)
where
    F: EngineFactory,
    R: ResamplerFactory,
    S: OutputSink,
{
    tracing::info!("Session driver started");
    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                tracing::info!("Session driver cancelled");
                break;
            },
            command = rx.recv() => {
                let Some(command) = command else {
                    tracing::debug!("All session handles dropped");
                    break;
                };
                match command {
                    SessionCommand::Configure { clock_rate, channels, reply } => {
                        let _ = reply.send(session.configure(clock_rate, channels));
                    },
                    SessionCommand::AllocateInput { reply } => {
                        let _ = reply.send(session.allocate_input_index());
                    },
                    SessionCommand::Submit { index, frame, reply } => {
                        let result = session.submit(index, frame, &mut sink);
                        if let Err(e) = &result {
                            tracing::warn!(input = index, "Submission failed: {}", e);
                        }
                        let _ = reply.send(result);
                    },
                    SessionCommand::Flush { reply } => {
                        let _ = reply.send(session.flush(&mut sink));
                    },
                    SessionCommand::Stats { reply } => {
                        let _ = reply.send(session.stats());
                    },
                    SessionCommand::Shutdown => break,
                }
            },
        }
    }
    tracing::info!(stats = ?session.stats(), "Session driver shutting down");
    (session, sink)
}

impl<F: EngineFactory, R: ResamplerFactory, S> SessionHandle<F, R, S> {
    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> SessionCommand,
    ) -> Result<T, DriverError> {
        let (reply, response) = oneshot::channel();
        self.tx.send(command(reply)).await.map_err(|_| DriverError::Stopped)?;
        Ok(response.await.map_err(|_| DriverError::Stopped)??)
    }

    /// # Errors
    ///
    /// Returns the session's configuration error, or `DriverError::Stopped`.
    pub async fn configure(&self, clock_rate: u32, channels: u16) -> Result<(), DriverError> {
        self.request(|reply| SessionCommand::Configure { clock_rate, channels, reply }).await
    }

    /// # Errors
    ///
    /// Returns `MixError::CapacityExhausted` once every input is taken.
    pub async fn allocate_input(&self) -> Result<usize, DriverError> {
        self.request(|reply| SessionCommand::AllocateInput { reply }).await
    }

    /// # Errors
    ///
    /// Returns whatever the session's `submit` returned for this frame.
    pub async fn submit(&self, index: usize, frame: AudioFrame) -> Result<(), DriverError> {
        self.request(|reply| SessionCommand::Submit { index, frame, reply }).await
    }

    /// Pads every input up to the output position and drains the rest of the call.
    ///
    /// # Errors
    ///
    /// Returns whatever the session's `flush` returned.
    pub async fn flush(&self) -> Result<usize, DriverError> {
        self.request(|reply| SessionCommand::Flush { reply }).await
    }

    /// # Errors
    ///
    /// Returns `DriverError::Stopped` if the driver is gone.
    pub async fn stats(&self) -> Result<SessionStats, DriverError> {
        let (reply, response) = oneshot::channel();
        self.tx.send(SessionCommand::Stats { reply }).await.map_err(|_| DriverError::Stopped)?;
        response.await.map_err(|_| DriverError::Stopped)
    }

    /// A token that stops the driver when cancelled. Pending commands are dropped.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stops the driver after every command sent so far and returns the session and sink.
    ///
    /// # Errors
    ///
    /// Returns `DriverError::Join` if the driver task panicked.
    pub async fn shutdown(self) -> Result<(MixerSession<F, R>, S), DriverError> {
        // A closed channel means the task is already on its way out.
        let _ = self.tx.send(SessionCommand::Shutdown).await;
        Ok(self.task.await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::convert::FormatConverterFactory;
    use crate::sinks::CollectingSink;
    use crate::summing::SummingEngineFactory;
    use crate::test_utils::mono_frame;
    use callmix_core::MixerConfig;

    fn session() -> MixerSession<SummingEngineFactory, FormatConverterFactory> {
        MixerSession::new(
            MixerConfig { input_capacity: 1, ..Default::default() },
            SummingEngineFactory::default(),
            FormatConverterFactory,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn commands_run_in_order() {
        let handle = spawn_session_driver(session(), CollectingSink::default(), 8);
        handle.configure(8000, 1).await.unwrap();
        let index = handle.allocate_input().await.unwrap();
        handle.submit(index, mono_frame(8000, 0, 160, 100)).await.unwrap();

        assert!(matches!(
            handle.allocate_input().await,
            Err(DriverError::Mix(MixError::CapacityExhausted { capacity: 1 }))
        ));

        let (session, sink) = handle.shutdown().await.unwrap();
        assert_eq!(session.output_timestamp(), 160);
        assert_eq!(sink.total_samples(), 160);
    }

    #[tokio::test]
    async fn flush_drains_idle_slots() {
        let config = MixerConfig { input_capacity: 2, ..Default::default() };
        let session =
            MixerSession::new(config, SummingEngineFactory::default(), FormatConverterFactory)
                .unwrap();
        let handle = spawn_session_driver(session, CollectingSink::default(), 8);
        handle.configure(8000, 1).await.unwrap();
        let index = handle.allocate_input().await.unwrap();
        handle.submit(index, mono_frame(8000, 0, 160, 100)).await.unwrap();

        assert_eq!(handle.flush().await.unwrap(), 1);

        let (_, sink) = handle.shutdown().await.unwrap();
        assert_eq!(sink.total_samples(), 160);
    }

    #[tokio::test]
    async fn cancelled_driver_reports_stopped() {
        let handle = spawn_session_driver(session(), CollectingSink::default(), 8);
        handle.cancellation_token().cancel();
        // The task exits on its own; later requests cannot be answered.
        while handle.stats().await.is_ok() {
            tokio::task::yield_now().await;
        }
        assert!(matches!(handle.configure(8000, 1).await, Err(DriverError::Stopped)));
        handle.shutdown().await.unwrap();
    }
}
