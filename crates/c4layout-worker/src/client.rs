//! Client side of the worker boundary.
//!
//! The client owns one worker generation at a time: a worker thread running
//! a fresh `LayoutEngine`, and a reader thread that matches its responses to
//! pending requests. When the worker thread dies every request sent to it is
//! failed, and the next submission starts a new generation.

use crate::error::WorkerError;
use crate::pending::{PendingLayout, PendingTable};
use crate::telemetry;
use crate::wire::{self, LayoutRequest, LayoutResponse, WorkerMessage};
use crate::worker::{self, WorkerHandle};
use c4layout_core::{C4Graph, ViewState};
use c4layout_engine::{LayoutEngine, LayoutOptions, LayoutResult};
use crossbeam_channel::{Receiver, unbounded};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

type EngineFactory = Box<dyn Fn() -> LayoutEngine + Send + Sync>;

#[derive(Default)]
struct State {
    pending: PendingTable,
    worker: Option<WorkerHandle>,
    generation: u64,
    shut_down: bool,
}

pub(crate) struct Shared {
    factory: EngineFactory,
    state: Mutex<State>,
}

impl Shared {
    fn spawn_worker(self: &Arc<Self>, state: &mut State) -> Result<(), WorkerError> {
        state.generation += 1;
        let generation = state.generation;
        let (request_tx, request_rx) = unbounded();
        let (response_tx, response_rx) = unbounded();

        let engine = (self.factory)();
        let thread = worker::spawn(engine, generation, request_rx, response_tx)
            .map_err(|e| WorkerError::WorkerCrashed(format!("failed to start worker: {e}")))?;

        let shared = Arc::clone(self);
        let reader = thread::Builder::new()
            .name(format!("c4layout-reader-{generation}"))
            .spawn(move || shared.read_responses(generation, response_rx))
            .map_err(|e| WorkerError::WorkerCrashed(format!("failed to start reader: {e}")))?;

        tracing::debug!(generation, "layout worker spawned");
        state.worker = Some(WorkerHandle {
            generation,
            requests: request_tx,
            thread: Some(thread),
            reader: Some(reader),
        });
        Ok(())
    }

    /// Send `message` to the live worker, starting one if needed.
    /// Returns the generation that received it.
    fn send(self: &Arc<Self>, state: &mut State, message: String) -> Result<u64, WorkerError> {
        for _ in 0..2 {
            if state.worker.is_none() {
                self.spawn_worker(state)?;
            }
            if let Some(worker) = &state.worker {
                if worker.requests.send(message.clone()).is_ok() {
                    return Ok(worker.generation);
                }
            }
            // the worker died before its reader noticed
            state.worker = None;
        }
        Err(WorkerError::Disconnected)
    }

    fn read_responses(&self, generation: u64, responses: Receiver<String>) {
        for raw in responses.iter() {
            match wire::decode(&raw) {
                Ok(WorkerMessage::LayoutResponse(response)) => {
                    self.dispatch(response);
                }
                Ok(WorkerMessage::LayoutRequest(request)) => {
                    tracing::warn!(id = %request.id, "worker sent a request message");
                }
                Err(error) => tracing::warn!(%error, "undecodable worker response"),
            }
        }
        self.worker_exited(generation);
    }

    /// Route a response to its waiter; unknown ids are ignored.
    pub(crate) fn dispatch(&self, response: LayoutResponse) -> bool {
        let id = response.id.clone();
        let delivered = self.state.lock().pending.resolve(&id, response.into_reply());
        if !delivered {
            telemetry::orphan_response(&id);
        }
        delivered
    }

    fn worker_exited(&self, generation: u64) {
        let mut state = self.state.lock();
        if state.worker.as_ref().is_some_and(|w| w.generation == generation) {
            state.worker = None;
        }
        if state.shut_down {
            return;
        }
        let failed = state.pending.fail_generation(generation, || {
            WorkerError::WorkerCrashed(format!("worker generation {generation} exited"))
        });
        if !failed.is_empty() {
            tracing::warn!(generation, failed = failed.len(), "layout worker crashed");
        }
    }

    pub(crate) fn forget(&self, id: &str) -> bool {
        self.state.lock().pending.remove(id)
    }
}

/// Runs layouts on a background thread.
///
/// Explicitly owned: create one, share it by reference and call
/// [`shutdown`](Self::shutdown) (or drop it) when done.
pub struct LayoutWorkerClient {
    shared: Arc<Shared>,
    timeout: Duration,
}

impl LayoutWorkerClient {
    /// `factory` builds the engine for every worker generation.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> LayoutEngine + Send + Sync + 'static,
    {
        Self {
            shared: Arc::new(Shared {
                factory: Box::new(factory),
                state: Mutex::new(State::default()),
            }),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn submit(
        &self,
        graph: &C4Graph,
        view: &ViewState,
        options: Option<&LayoutOptions>,
    ) -> Result<PendingLayout, WorkerError> {
        self.submit_with_timeout(graph, view, options, self.timeout)
    }

    pub fn submit_with_timeout(
        &self,
        graph: &C4Graph,
        view: &ViewState,
        options: Option<&LayoutOptions>,
        timeout: Duration,
    ) -> Result<PendingLayout, WorkerError> {
        let id = telemetry::new_correlation_id();
        let request = LayoutRequest::new(id.clone(), graph, view, options.cloned());
        let message = wire::encode_request(request).inspect_err(|error| {
            telemetry::request_failure(&id, Some(error.to_string()));
        })?;

        telemetry::request_start(&id, graph.node_count());
        let receiver = {
            let mut state = self.shared.state.lock();
            if state.shut_down {
                return Err(WorkerError::ShutDown);
            }
            let generation = self.shared.send(&mut state, message)?;
            state.pending.insert(id.clone(), generation)
        };
        Ok(PendingLayout::new(id, receiver, timeout, Arc::clone(&self.shared)))
    }

    /// Submit and block for the result.
    pub fn layout(
        &self,
        graph: &C4Graph,
        view: &ViewState,
        options: Option<&LayoutOptions>,
    ) -> Result<LayoutResult, WorkerError> {
        self.submit(graph, view, options)?.wait()
    }

    pub fn pending_count(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    /// Number of workers started so far.
    pub fn generation(&self) -> u64 {
        self.shared.state.lock().generation
    }

    /// Fail outstanding requests and stop the worker. Later submissions fail.
    pub fn shutdown(&self) {
        let worker = {
            let mut state = self.shared.state.lock();
            if state.shut_down {
                return;
            }
            state.shut_down = true;
            let failed = state.pending.fail_all(|| WorkerError::ShutDown);
            tracing::debug!(failed = failed.len(), "layout worker client shutting down");
            state.worker.take()
        };
        if let Some(worker) = worker {
            worker.join();
        }
    }
}

impl Drop for LayoutWorkerClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}
