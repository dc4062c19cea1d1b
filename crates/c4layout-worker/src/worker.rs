//! Background thread that owns one `LayoutEngine` generation.

use crate::wire::{self, LayoutResponse, WorkerMessage};
use c4layout_core::{C4Graph, ViewState};
use c4layout_engine::LayoutEngine;
use crossbeam_channel::{Receiver, Sender};
use std::thread::{self, JoinHandle};

pub(crate) struct WorkerHandle {
    pub generation: u64,
    pub requests: Sender<String>,
    pub thread: Option<JoinHandle<()>>,
    pub reader: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Close the request channel and wait for both threads to finish.
    pub fn join(self) {
        let WorkerHandle {
            requests,
            thread,
            reader,
            ..
        } = self;
        drop(requests);
        for handle in [thread, reader].into_iter().flatten() {
            if handle.join().is_err() {
                tracing::debug!("layout worker thread ended with a panic");
            }
        }
    }
}

pub(crate) fn spawn(
    engine: LayoutEngine,
    generation: u64,
    requests: Receiver<String>,
    responses: Sender<String>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("c4layout-worker-{generation}"))
        .spawn(move || run(engine, generation, requests, responses))
}

fn run(
    engine: LayoutEngine,
    generation: u64,
    requests: Receiver<String>,
    responses: Sender<String>,
) {
    tracing::debug!(generation, "layout worker started");
    for raw in requests.iter() {
        let response = handle(&engine, &raw);
        match wire::encode(&WorkerMessage::LayoutResponse(response)) {
            Ok(text) => {
                if responses.send(text).is_err() {
                    break;
                }
            }
            Err(error) => tracing::warn!(%error, "failed to encode layout response"),
        }
    }
    tracing::debug!(generation, "layout worker stopped");
}

fn handle(engine: &LayoutEngine, raw: &str) -> LayoutResponse {
    let request = match wire::decode(raw) {
        Ok(WorkerMessage::LayoutRequest(request)) => request,
        Ok(WorkerMessage::LayoutResponse(response)) => {
            return LayoutResponse::failure(response.id, "worker received a response message");
        }
        Err(error) => {
            let id = wire::message_id(raw).unwrap_or_default();
            return LayoutResponse::failure(id, error.to_string());
        }
    };

    let graph: C4Graph = request.graph.into();
    let view: ViewState = request.view.into();
    match engine.layout(&graph, &view, request.options.as_ref(), None) {
        Ok(result) => LayoutResponse::success(request.id, result),
        Err(error) => LayoutResponse::failure(request.id, error.describe()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use c4layout_core::{C4Node, NodeKind, ViewLevel};

    #[test]
    fn test_undecodable_request_is_answered_under_its_own_id() {
        let raw = r#"{"type":"LAYOUT_REQUEST","payload":{"id":"req-9","graph":{"nodes":[]}}}"#;
        let response = handle(&LayoutEngine::new(), raw);

        assert_eq!(response.id, "req-9");
        assert!(response.result.is_none());
        assert!(response.error.is_some());
    }

    #[test]
    fn test_request_is_laid_out() {
        let mut graph = C4Graph::new();
        graph.add_node(C4Node::new("a", NodeKind::SERVICE, "A"));
        let view = ViewState::new(ViewLevel::Container);
        let request = wire::LayoutRequest::new("req-1".into(), &graph, &view, None);
        let raw = wire::encode_request(request).expect("encode");

        let response = handle(&LayoutEngine::new(), &raw);
        assert_eq!(response.id, "req-1");
        assert!(response.error.is_none());
        assert_eq!(response.result.map(|r| r.nodes.len()), Some(1));
    }
}
