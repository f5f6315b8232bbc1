//! Host-side handle to a compiler worker thread.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

use super::dispatcher::Dispatcher;
use super::engine::EngineLoader;
use super::error::{WorkerError, WorkerResult};
use crate::protocol::{WorkerCommand, WorkerEvent};

/// Owning handle for one worker thread.
///
/// Commands go to the worker over a std channel (the worker blocks on it);
/// events come back over an unbounded tokio channel so the host can await
/// them. Dropping the handle closes the command channel, which ends the
/// worker loop once its current command finishes.
///
/// # Example
///
/// ```ignore
/// let mut worker = WorkerHandle::spawn(MyLoader)?;
/// worker.send(WorkerCommand::SharedMemory(true))?;
/// worker.send(WorkerCommand::Startup(options))?;
/// assert!(matches!(worker.next_event().await, Some(WorkerEvent::Ready)));
/// ```
pub struct WorkerHandle {
    commands: mpsc::Sender<WorkerCommand>,
    events: UnboundedReceiver<WorkerEvent>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Spawn a worker thread running a fresh [`Dispatcher`].
    pub fn spawn<L: EngineLoader>(loader: L) -> WorkerResult<Self> {
        Self::spawn_with(move |events| Dispatcher::new(loader, events))
    }

    /// Spawn a worker thread running a dispatcher built by `build`.
    pub fn spawn_with<L, F>(build: F) -> WorkerResult<Self>
    where
        L: EngineLoader,
        F: FnOnce(tokio::sync::mpsc::UnboundedSender<WorkerEvent>) -> Dispatcher<L>
            + Send
            + 'static,
    {
        let (command_tx, command_rx) = mpsc::channel();
        let (event_tx, event_rx) = unbounded_channel();

        let thread = thread::Builder::new()
            .name("typst-compiler".into())
            .spawn(move || build(event_tx).run(command_rx))
            .map_err(WorkerError::SpawnFailed)?;

        Ok(Self {
            commands: command_tx,
            events: event_rx,
            thread: Some(thread),
        })
    }

    /// Send a command to the worker.
    pub fn send(&self, command: WorkerCommand) -> WorkerResult<()> {
        self.commands.send(command)?;
        Ok(())
    }

    /// Wait for the next event. `None` once the worker has exited.
    pub async fn next_event(&mut self) -> Option<WorkerEvent> {
        self.events.recv().await
    }

    /// Check if the worker thread is still running.
    pub fn is_alive(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|thread| !thread.is_finished())
    }
}
