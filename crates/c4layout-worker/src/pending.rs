use crate::client::Shared;
use crate::error::WorkerError;
use crate::telemetry;
use c4layout_engine::LayoutResult;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub(crate) type Reply = Result<LayoutResult, WorkerError>;

struct Entry {
    generation: u64,
    reply: Sender<Reply>,
}

/// Requests sent to a worker and not yet answered, keyed by correlation id.
#[derive(Default)]
pub(crate) struct PendingTable {
    entries: HashMap<String, Entry>,
}

impl PendingTable {
    pub fn insert(&mut self, id: String, generation: u64) -> Receiver<Reply> {
        let (reply, receiver) = bounded(1);
        self.entries.insert(id, Entry { generation, reply });
        receiver
    }

    /// Deliver a reply; `false` when nobody is waiting for `id`.
    pub fn resolve(&mut self, id: &str, reply: Reply) -> bool {
        match self.entries.remove(id) {
            Some(entry) => {
                // the waiter may already have given up
                let _ = entry.reply.send(reply);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.entries.remove(id).is_some()
    }

    /// Fail every request sent to `generation`, returning their ids.
    pub fn fail_generation(
        &mut self,
        generation: u64,
        error: impl Fn() -> WorkerError,
    ) -> Vec<String> {
        let ids: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.generation == generation)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &ids {
            self.resolve(id, Err(error()));
        }
        ids
    }

    pub fn fail_all(&mut self, error: impl Fn() -> WorkerError) -> Vec<String> {
        let ids: Vec<String> = self.entries.keys().cloned().collect();
        for id in &ids {
            self.resolve(id, Err(error()));
        }
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Handle to one submitted layout request.
///
/// Dropping it without waiting forgets the request; a late response is then
/// ignored like any other unknown id.
pub struct PendingLayout {
    id: String,
    receiver: Receiver<Reply>,
    timeout: Duration,
    submitted: Instant,
    shared: Arc<Shared>,
}

impl PendingLayout {
    pub(crate) fn new(
        id: String,
        receiver: Receiver<Reply>,
        timeout: Duration,
        shared: Arc<Shared>,
    ) -> Self {
        Self {
            id,
            receiver,
            timeout,
            submitted: Instant::now(),
            shared,
        }
    }

    /// Correlation id carried by the request and its response.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Block until the response arrives or the timeout elapses.
    pub fn wait(self) -> Result<LayoutResult, WorkerError> {
        let remaining = self.timeout.saturating_sub(self.submitted.elapsed());
        let reply = match self.receiver.recv_timeout(remaining) {
            Ok(reply) => reply,
            Err(RecvTimeoutError::Timeout) => {
                let was_pending = self.shared.forget(&self.id);
                // a response that raced the deadline still counts
                match self.receiver.try_recv() {
                    Ok(reply) if !was_pending => reply,
                    _ => {
                        let timeout_ms = self.timeout.as_millis() as u64;
                        telemetry::request_timeout(&self.id, timeout_ms);
                        return Err(WorkerError::Timeout {
                            id: self.id.clone(),
                            timeout_ms,
                        });
                    }
                }
            }
            Err(RecvTimeoutError::Disconnected) => Err(WorkerError::Disconnected),
        };

        match &reply {
            Ok(_) => {
                telemetry::request_success(&self.id, self.submitted.elapsed().as_millis());
            }
            Err(error) => {
                telemetry::request_failure(&self.id, Some(error.to_string()));
            }
        }
        reply
    }
}

impl Drop for PendingLayout {
    fn drop(&mut self) {
        self.shared.forget(&self.id);
    }
}
