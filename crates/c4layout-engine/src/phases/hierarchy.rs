use super::{HIERARCHY, LayoutPhase};
use crate::classifier::classify;
use crate::context::{LayoutContext, ancestors};
use crate::model::LayoutNode;
use c4layout_core::{C4Graph, NodeId, ViewState};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builds the parent/child tree, depth, visibility and semantic info.
pub struct HierarchyPhase;

impl LayoutPhase for HierarchyPhase {
    fn name(&self) -> &str {
        HIERARCHY
    }

    fn execute(&self, ctx: &LayoutContext) -> anyhow::Result<LayoutContext> {
        let mut next = ctx.clone();
        if ctx.graph.is_empty() {
            next.warn("hierarchy skipped: graph has no nodes");
            return Ok(next);
        }

        let (nodes, warnings) = build_tree(&ctx.graph, &ctx.view);
        next.nodes = Arc::new(nodes);
        for warning in warnings {
            next.warn(warning);
        }
        next.rebuild_spatial_index();
        Ok(next)
    }
}

/// Parent id after dropping references to unknown nodes and cyclic chains.
fn resolve_parent(graph: &C4Graph, id: &NodeId, warnings: &mut Vec<String>) -> Option<NodeId> {
    let parent = graph.node(id)?.parent.clone()?;
    if !graph.nodes.contains_key(&parent) {
        warnings.push(format!("node {id} references unknown parent {parent}; treated as root"));
        return None;
    }

    let mut seen = vec![id.clone()];
    let mut current = Some(parent.clone());
    while let Some(step) = current {
        if seen.contains(&step) {
            warnings.push(format!("node {id} has a cyclic parent chain; treated as root"));
            return None;
        }
        current = graph.node(&step).and_then(|node| node.parent.clone());
        seen.push(step);
    }
    Some(parent)
}

pub fn build_tree(
    graph: &C4Graph,
    view: &ViewState,
) -> (BTreeMap<NodeId, LayoutNode>, Vec<String>) {
    let mut warnings = Vec::new();

    let mut degree: BTreeMap<&NodeId, usize> = BTreeMap::new();
    for relationship in &graph.relationships {
        *degree.entry(&relationship.from).or_default() += 1;
        *degree.entry(&relationship.to).or_default() += 1;
    }

    let mut nodes: BTreeMap<NodeId, LayoutNode> = BTreeMap::new();
    for (order, (id, source)) in graph.nodes.iter().enumerate() {
        let mut node = LayoutNode::new(source.clone());
        node.parent = resolve_parent(graph, id, &mut warnings);
        node.collapsed = source.collapsed && !view.is_expanded(id);
        node.metadata.processing_order = order;
        node.metadata.semantic = classify(source);
        node.metadata.weight = degree.get(id).copied().unwrap_or(0) as f32
            + source.priority.unwrap_or(0) as f32;
        nodes.insert(id.clone(), node);
    }

    // ids iterate in order, so children lists come out sorted
    let links: Vec<(NodeId, NodeId)> = nodes
        .values()
        .filter_map(|node| node.parent.clone().map(|parent| (parent, node.id.clone())))
        .collect();
    for (parent, child) in links {
        if let Some(parent) = nodes.get_mut(&parent) {
            parent.children.push(child);
        }
    }

    let ids: Vec<NodeId> = nodes.keys().cloned().collect();
    for id in ids {
        let chain = ancestors(&nodes, &id);
        let hidden = view.is_hidden(&id) || chain.iter().any(|a| view.is_hidden(a));
        let folded = chain
            .iter()
            .any(|a| nodes.get(a).is_some_and(|ancestor| ancestor.collapsed));
        if let Some(node) = nodes.get_mut(&id) {
            node.depth = chain.len();
            node.z_index = chain.len() as i32;
            node.visible = !hidden && !folded;
        }
    }

    (nodes, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Tier;
    use c4layout_core::{C4Node, C4Relationship, NodeKind, ViewLevel};

    fn graph() -> C4Graph {
        let mut graph = C4Graph::new();
        graph.add_node(C4Node::new("shop", NodeKind::SOFTWARE_SYSTEM, "Shop"));
        graph.add_node(C4Node::new("web", NodeKind::WEB_APP, "Storefront").with_parent("shop"));
        graph.add_node(C4Node::new("db", NodeKind::DATABASE, "Orders DB").with_parent("shop"));
        graph.add_node(C4Node::new("user", NodeKind::PERSON, "Customer"));
        graph.add_relationship(C4Relationship::new("r1", "user", "web"));
        graph.add_relationship(C4Relationship::new("r2", "web", "db"));
        graph
    }

    #[test]
    fn test_links_and_depth_are_consistent() {
        let (nodes, warnings) = build_tree(&graph(), &ViewState::new(ViewLevel::Container));
        assert!(warnings.is_empty());

        let shop = &nodes[&NodeId::new("shop")];
        assert_eq!(shop.children, vec![NodeId::new("db"), NodeId::new("web")]);
        assert_eq!(shop.depth, 0);
        for child in &shop.children {
            assert_eq!(nodes[child].parent.as_ref(), Some(&shop.id));
            assert_eq!(nodes[child].depth, 1);
        }
        assert_eq!(nodes[&NodeId::new("db")].metadata.semantic.tier, Tier::Data);
        assert_eq!(nodes[&NodeId::new("web")].metadata.weight, 2.0);
    }

    #[test]
    fn test_unknown_parent_and_cycle_become_roots() {
        let mut graph = C4Graph::new();
        graph.add_node(C4Node::new("orphan", NodeKind::CONTAINER, "Orphan").with_parent("ghost"));
        graph.add_node(C4Node::new("a", NodeKind::CONTAINER, "A").with_parent("b"));
        graph.add_node(C4Node::new("b", NodeKind::CONTAINER, "B").with_parent("a"));

        let (nodes, warnings) = build_tree(&graph, &ViewState::default());
        assert_eq!(warnings.len(), 3);
        assert!(nodes.values().all(|node| node.parent.is_none() && node.depth == 0));
    }

    #[test]
    fn test_collapsed_and_hidden_visibility() {
        let mut graph = graph();
        graph.add_node(C4Node::new("shop", NodeKind::SOFTWARE_SYSTEM, "Shop").collapsed());

        let mut view = ViewState::new(ViewLevel::Container);
        view.hidden.insert(NodeId::new("user"));
        let (nodes, _) = build_tree(&graph, &view);
        assert!(nodes[&NodeId::new("shop")].collapsed);
        assert!(!nodes[&NodeId::new("web")].visible);
        assert!(!nodes[&NodeId::new("user")].visible);

        view.expanded.insert(NodeId::new("shop"));
        let (nodes, _) = build_tree(&graph, &view);
        assert!(!nodes[&NodeId::new("shop")].collapsed);
        assert!(nodes[&NodeId::new("web")].visible);
    }
}
