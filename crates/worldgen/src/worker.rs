use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::error::GenError;

enum WorkerMessage<Req> {
    Job(Req),
    Shutdown,
}

/// A long-lived background thread that answers one request with one response.
///
/// Requests are processed in order. The owner polls responses with
/// [`Worker::try_recv`] and never blocks on the thread.
pub struct Worker<Req, Resp> {
    name: &'static str,
    tx: Sender<WorkerMessage<Req>>,
    rx: Receiver<Resp>,
    handle: Option<JoinHandle<()>>,
}

impl<Req, Resp> Worker<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    pub fn spawn<F>(name: &'static str, mut handler: F) -> Result<Self, GenError>
    where
        F: FnMut(Req) -> Resp + Send + 'static,
    {
        let (tx, job_rx) = mpsc::channel::<WorkerMessage<Req>>();
        let (resp_tx, rx) = mpsc::channel::<Resp>();

        let handle = thread::Builder::new()
            .name(format!("voxelcore-{name}"))
            .spawn(move || {
                while let Ok(message) = job_rx.recv() {
                    match message {
                        WorkerMessage::Job(req) => {
                            if resp_tx.send(handler(req)).is_err() {
                                break;
                            }
                        }
                        WorkerMessage::Shutdown => break,
                    }
                }
                debug!(worker = name, "worker loop exited");
            })
            .map_err(|source| GenError::Spawn { name, source })?;

        info!(worker = name, "worker started");
        Ok(Self {
            name,
            tx,
            rx,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn send(&self, req: Req) -> Result<(), GenError> {
        if self.handle.is_none() {
            return Err(GenError::WorkerUnavailable(self.name));
        }
        self.tx
            .send(WorkerMessage::Job(req))
            .map_err(|_| GenError::WorkerDisconnected(self.name))
    }

    /// Next buffered response, if any. Fails once the thread has gone away
    /// and every response it produced has been drained.
    pub fn try_recv(&self) -> Result<Option<Resp>, GenError> {
        match self.rx.try_recv() {
            Ok(resp) => Ok(Some(resp)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(GenError::WorkerDisconnected(self.name)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the thread and wait for it. Safe to call more than once.
    pub fn terminate(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        // The thread may already be gone; a failed send is fine.
        let _ = self.tx.send(WorkerMessage::Shutdown);
        if handle.join().is_err() {
            warn!(worker = self.name, "worker thread panicked");
        }
        info!(worker = self.name, "worker stopped");
    }
}

impl<Req, Resp> Drop for Worker<Req, Resp> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.tx.send(WorkerMessage::Shutdown);
            let _ = handle.join();
        }
    }
}
