//! Message schema crossing the worker boundary.
//!
//! Messages travel as JSON text. Maps and sets are flattened into arrays so
//! the schema does not depend on any in-memory container type:
//! graph nodes become `[id, node]` pairs and view sets become id arrays.

use crate::error::WorkerError;
use c4layout_core::{C4Graph, C4Node, C4Relationship, NodeId, ViewLevel, ViewState};
use c4layout_engine::{LayoutOptions, LayoutResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireGraph {
    pub nodes: Vec<(NodeId, C4Node)>,
    pub relationships: Vec<C4Relationship>,
}

impl From<&C4Graph> for WireGraph {
    fn from(graph: &C4Graph) -> Self {
        Self {
            nodes: graph
                .nodes
                .iter()
                .map(|(id, node)| (id.clone(), node.clone()))
                .collect(),
            relationships: graph.relationships.clone(),
        }
    }
}

impl From<WireGraph> for C4Graph {
    fn from(wire: WireGraph) -> Self {
        Self {
            nodes: wire.nodes.into_iter().collect(),
            relationships: wire.relationships,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireView {
    pub level: ViewLevel,
    pub expanded: Vec<NodeId>,
    pub hidden: Vec<NodeId>,
    pub grid_size: f32,
    pub snap_to_grid: bool,
}

impl From<&ViewState> for WireView {
    fn from(view: &ViewState) -> Self {
        Self {
            level: view.level,
            expanded: view.expanded.iter().cloned().collect(),
            hidden: view.hidden.iter().cloned().collect(),
            grid_size: view.grid_size,
            snap_to_grid: view.snap_to_grid,
        }
    }
}

impl From<WireView> for ViewState {
    fn from(wire: WireView) -> Self {
        Self {
            level: wire.level,
            expanded: wire.expanded.into_iter().collect(),
            hidden: wire.hidden.into_iter().collect(),
            grid_size: wire.grid_size,
            snap_to_grid: wire.snap_to_grid,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutRequest {
    pub id: String,
    pub graph: WireGraph,
    pub view: WireView,
    #[serde(default)]
    pub options: Option<LayoutOptions>,
}

impl LayoutRequest {
    pub fn new(
        id: String,
        graph: &C4Graph,
        view: &ViewState,
        options: Option<LayoutOptions>,
    ) -> Self {
        Self {
            id,
            graph: graph.into(),
            view: view.into(),
            options,
        }
    }
}

/// Exactly one of `result` and `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutResponse {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<LayoutResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LayoutResponse {
    pub fn success(id: impl Into<String>, result: LayoutResult) -> Self {
        Self {
            id: id.into(),
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            result: None,
            error: Some(error.into()),
        }
    }

    pub fn into_reply(self) -> Result<LayoutResult, WorkerError> {
        match (self.result, self.error) {
            (_, Some(error)) => Err(WorkerError::Layout(error)),
            (Some(result), None) => Ok(result),
            (None, None) => Err(WorkerError::Layout(
                "response carried neither result nor error".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    LayoutRequest(LayoutRequest),
    LayoutResponse(LayoutResponse),
}

pub fn encode(message: &WorkerMessage) -> Result<String, WorkerError> {
    Ok(serde_json::to_string(message)?)
}

pub fn decode(text: &str) -> Result<WorkerMessage, WorkerError> {
    Ok(serde_json::from_str(text)?)
}

/// Encode a request and make sure the worker will be able to read it back.
///
/// serde_json writes non-finite floats as `null`, which then fails to decode
/// on the worker side, so such requests are rejected here instead.
pub fn encode_request(request: LayoutRequest) -> Result<String, WorkerError> {
    let text = encode(&WorkerMessage::LayoutRequest(request))?;
    decode(&text)?;
    Ok(text)
}

#[derive(Deserialize)]
struct IdEnvelope {
    payload: IdPayload,
}

#[derive(Deserialize)]
struct IdPayload {
    id: String,
}

/// Correlation id of a message whose payload does not fully decode.
pub fn message_id(text: &str) -> Option<String> {
    serde_json::from_str::<IdEnvelope>(text)
        .ok()
        .map(|envelope| envelope.payload.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use c4layout_core::NodeKind;

    #[test]
    fn test_request_envelope_shape() {
        let mut graph = C4Graph::new();
        graph.add_node(C4Node::new("api", NodeKind::API, "API"));
        let mut view = ViewState::new(ViewLevel::Container);
        view.hidden.insert(NodeId::new("api"));

        let request = LayoutRequest::new("req-1".into(), &graph, &view, None);
        let message = WorkerMessage::LayoutRequest(request);
        let value: serde_json::Value =
            serde_json::from_str(&encode(&message).expect("encode")).expect("json");

        assert_eq!(value["type"], "LAYOUT_REQUEST");
        assert_eq!(value["payload"]["id"], "req-1");
        assert_eq!(value["payload"]["graph"]["nodes"][0][0], "api");
        assert_eq!(value["payload"]["view"]["hidden"][0], "api");
    }

    #[test]
    fn test_view_survives_the_boundary() {
        let mut view = ViewState::new(ViewLevel::Component);
        view.expanded.insert(NodeId::new("b"));
        view.expanded.insert(NodeId::new("a"));
        view.snap_to_grid = true;

        let back: ViewState = WireView::from(&view).into();
        assert_eq!(back, view);
    }

    #[test]
    fn test_response_error_wins() {
        let reply = LayoutResponse::failure("x", "graph has no nodes").into_reply();
        assert!(matches!(reply, Err(WorkerError::Layout(message)) if message.contains("no nodes")));

        let text = r#"{"type":"LAYOUT_RESPONSE","payload":{"id":"x"}}"#;
        match decode(text).expect("decode") {
            WorkerMessage::LayoutResponse(response) => assert!(response.into_reply().is_err()),
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn test_garbage_is_a_serialization_error() {
        assert!(matches!(decode("{not json"), Err(WorkerError::Serialization(_))));
        assert_eq!(message_id("{not json"), None);
    }

    #[test]
    fn test_non_finite_request_is_rejected_before_sending() {
        let mut graph = C4Graph::new();
        graph.add_node(C4Node::new("a", NodeKind::SERVICE, "A").with_position(f32::NAN, 0.0));
        let view = ViewState::new(ViewLevel::Container);

        let request = LayoutRequest::new("req-nan".into(), &graph, &view, None);
        let err = encode_request(request).expect_err("NaN does not survive JSON");
        assert!(matches!(err, WorkerError::Serialization(_)));

        let mut options = LayoutOptions::default();
        options.spacing.node_padding = f32::INFINITY;
        let graph = C4Graph::new();
        let request = LayoutRequest::new("req-inf".into(), &graph, &view, Some(options));
        assert!(encode_request(request).is_err());
    }

    #[test]
    fn test_message_id_survives_a_broken_payload() {
        let text = concat!(
            r#"{"type":"LAYOUT_REQUEST","payload":{"id":"req-7","graph":{"nodes":[["a","#,
            r#"{"id":"a","kind":"SERVICE","level":"Container","label":"A","#,
            r#""position":{"x":null,"y":0.0}}]],"relationships":[]},"#,
            r#""view":{"level":"Container","expanded":[],"hidden":[],"#,
            r#""grid_size":10.0,"snap_to_grid":false}}}"#,
        );
        assert!(decode(text).is_err());
        assert_eq!(message_id(text).as_deref(), Some("req-7"));
    }
}
