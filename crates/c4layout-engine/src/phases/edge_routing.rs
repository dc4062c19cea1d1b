use super::{EDGE_ROUTING, LAYOUT, LayoutPhase};
use crate::algorithms::routing::EdgeRouter;
use crate::analysis::port_usage;
use crate::context::{LayoutContext, ancestors};
use crate::model::{LayoutEdge, LayoutNode};
use c4layout_core::{C4Graph, EdgeId, NodeId, ViewState};
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct EdgeRoutingPhase;

impl LayoutPhase for EdgeRoutingPhase {
    fn name(&self) -> &str {
        EDGE_ROUTING
    }

    fn dependencies(&self) -> &[&str] {
        &[LAYOUT]
    }

    fn execute(&self, ctx: &LayoutContext) -> anyhow::Result<LayoutContext> {
        let mut next = ctx.clone();
        let (mut edges, warnings) = build_edges(&ctx.graph, &ctx.view, &ctx.nodes);
        let default_route = ctx.options.edge_routing.default_route;
        for edge in edges.values_mut() {
            if edge.relationship.preferred_route.is_none() {
                edge.route = default_route;
            }
        }
        for warning in warnings {
            next.warn(warning);
        }
        next.edges = Arc::new(edges);
        reroute(&mut next);
        Ok(next)
    }
}

/// Nearest visible node at or above `id`, `None` when `id` is explicitly hidden.
fn visible_endpoint(
    nodes: &BTreeMap<NodeId, LayoutNode>,
    view: &ViewState,
    id: &NodeId,
) -> Option<NodeId> {
    let chain = ancestors(nodes, id);
    if view.is_hidden(id) || chain.iter().any(|a| view.is_hidden(a)) {
        return None;
    }
    std::iter::once(id.clone())
        .chain(chain)
        .find(|candidate| nodes.get(candidate).is_some_and(|node| node.visible))
}

/// One edge per relationship, with endpoints lifted out of collapsed containers.
pub fn build_edges(
    graph: &C4Graph,
    view: &ViewState,
    nodes: &BTreeMap<NodeId, LayoutNode>,
) -> (BTreeMap<EdgeId, LayoutEdge>, Vec<String>) {
    let mut edges = BTreeMap::new();
    let mut warnings = Vec::new();

    for relationship in &graph.relationships {
        let source = visible_endpoint(nodes, view, &relationship.from);
        let target = visible_endpoint(nodes, view, &relationship.to);
        let (Some(source), Some(target)) = (source, target) else {
            warnings.push(format!(
                "relationship {} dropped: endpoint is hidden",
                relationship.id
            ));
            continue;
        };
        if source == target {
            warnings.push(format!(
                "relationship {} dropped: both endpoints collapse into {source}",
                relationship.id
            ));
            continue;
        }
        if edges.contains_key(&relationship.id) {
            warnings.push(format!(
                "duplicate relationship id {}; keeping the last",
                relationship.id
            ));
        }
        let edge = LayoutEdge::new(relationship.clone(), source, target);
        edges.insert(edge.id.clone(), edge);
    }

    (edges, warnings)
}

/// Route every edge against the current node boxes and refresh node ports.
pub fn reroute(ctx: &mut LayoutContext) {
    let nodes = ctx.nodes.clone();
    let spatial = ctx.spatial.clone();
    let options = ctx.options.clone();

    let mut edges = (*ctx.edges).clone();
    EdgeRouter::new(&nodes, &spatial, &options.edge_routing)
        .with_spatial_index(options.performance.spatial_indexing)
        .route_all(&mut edges);

    let nodes = ctx.nodes_mut();
    for node in nodes.values_mut() {
        node.ports.clear();
    }
    for edge in edges.values() {
        let ends = [
            (&edge.source, &edge.source_port),
            (&edge.target, &edge.target_port),
        ];
        for (endpoint, port) in ends {
            if let (Some(node), Some(port)) = (nodes.get_mut(endpoint), port) {
                node.ports.push(port.clone());
            }
        }
    }

    if options.debug.show_port_usage {
        ctx.debug_mut().port_usage = port_usage(&edges);
    }
    ctx.edges = Arc::new(edges);
    ctx.routed = true;
}
