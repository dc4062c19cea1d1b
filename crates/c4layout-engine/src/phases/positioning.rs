use super::{LAYOUT, LayoutPhase, SIZING};
use crate::algorithms::{self, GroupEdge, PlacementItem, PlacementSpacing};
use crate::context::{LayoutContext, ancestors, sibling_groups_bottom_up};
use crate::model::LayoutNode;
use crate::options::{LayoutOptions, LayoutStrategy};
use crate::phases::sizing::{container_size, frame_at_origin};
use c4layout_core::{C4Graph, NodeId, Vec2, ViewState};
use std::collections::{BTreeMap, BTreeSet};

/// Assigns every visible node its final top-left corner.
///
/// Sibling groups are arranged innermost first so a container knows the
/// extent of its children before its own group is placed.
pub struct PositioningPhase;

impl LayoutPhase for PositioningPhase {
    fn name(&self) -> &str {
        LAYOUT
    }

    fn dependencies(&self) -> &[&str] {
        &[SIZING]
    }

    fn execute(&self, ctx: &LayoutContext) -> anyhow::Result<LayoutContext> {
        let mut next = ctx.clone();
        let graph = ctx.graph.clone();
        let view = ctx.view.clone();
        let options = ctx.options.clone();

        let strategy = options.strategies.for_level(view.level);
        tracing::debug!(?strategy, level = ?view.level, "positioning nodes");
        position_nodes(next.nodes_mut(), &graph, &view, &options);

        next.rebuild_spatial_index();
        next.positioned = true;
        Ok(next)
    }
}

/// Strategy for a group: the level's strategy at the root, a compact one inside containers.
fn group_strategy(root: LayoutStrategy, nested: bool) -> LayoutStrategy {
    match (root, nested) {
        (strategy, false) => strategy,
        (LayoutStrategy::Layered, true) => LayoutStrategy::Layered,
        (_, true) => LayoutStrategy::Grid,
    }
}

/// Relationships between members of one group, lifted to the members that contain their endpoints.
fn group_edges(
    graph: &C4Graph,
    nodes: &BTreeMap<NodeId, LayoutNode>,
    members: &[NodeId],
) -> Vec<GroupEdge> {
    let index: BTreeMap<&NodeId, usize> =
        members.iter().enumerate().map(|(i, id)| (id, i)).collect();
    let member_of = |id: &NodeId| -> Option<usize> {
        std::iter::once(id.clone())
            .chain(ancestors(nodes, id))
            .find_map(|candidate| index.get(&candidate).copied())
    };

    let mut edges = BTreeSet::new();
    for relationship in &graph.relationships {
        let ends = (member_of(&relationship.from), member_of(&relationship.to));
        if let (Some(from), Some(to)) = ends {
            if from != to {
                edges.insert((from, to));
            }
        }
    }
    edges.into_iter().collect()
}

fn snap(value: f32, grid: f32) -> f32 {
    if grid > 0.0 { (value / grid).round() * grid } else { value }
}

pub fn position_nodes(
    nodes: &mut BTreeMap<NodeId, LayoutNode>,
    graph: &C4Graph,
    view: &ViewState,
    options: &LayoutOptions,
) {
    let spacing = &options.spacing;
    let placement = PlacementSpacing {
        horizontal: spacing.horizontal.max(spacing.node_padding),
        vertical: spacing.vertical.max(spacing.node_padding),
        radial_gap: spacing.radial_gap,
        center_layers: options.alignment.center_layers,
    };
    let root_strategy = options.strategies.for_level(view.level);

    // top-left of each node relative to its parent's content origin
    let mut local: BTreeMap<NodeId, Vec2> = BTreeMap::new();

    for (parent, members) in sibling_groups_bottom_up(nodes) {
        let items: Vec<PlacementItem> = members
            .iter()
            .filter_map(|id| nodes.get(id))
            .map(|node| PlacementItem {
                id: node.id.clone(),
                size: node.bbox.size(),
                semantic: node.metadata.semantic,
                priority: node.node.priority.unwrap_or(0),
            })
            .collect();
        let edges = group_edges(graph, nodes, &members);
        let strategy = group_strategy(root_strategy, parent.is_some());
        let mut positions = algorithms::arrange(strategy, &items, &edges, &placement);

        for (item, position) in items.iter().zip(positions.iter_mut()) {
            if let Some(hint) = nodes.get(&item.id).and_then(|node| node.node.position) {
                *position = hint;
            }
        }
        if parent.is_some() {
            algorithms::normalize(&mut positions);
        }

        for (item, position) in items.iter().zip(&positions) {
            local.insert(item.id.clone(), *position);
        }

        if let Some(parent) = parent {
            let extent = algorithms::extent(&positions, &items);
            if let Some(node) = nodes.get_mut(&parent) {
                let size = container_size(extent, node.metadata.label_width, spacing);
                frame_at_origin(node, size, spacing.parent_child_padding + spacing.label_buffer);
            }
        }
    }

    let snapping = view.snap_to_grid && options.alignment.align_to_grid;
    let mut order: Vec<(usize, NodeId)> = nodes
        .values()
        .filter(|node| node.visible)
        .map(|node| (node.depth, node.id.clone()))
        .collect();
    order.sort();

    let content_offset = Vec2::new(
        spacing.parent_child_padding,
        spacing.parent_child_padding + spacing.label_buffer,
    );
    for (_, id) in order {
        let Some(offset) = local.get(&id).copied() else {
            continue;
        };
        let origin = match nodes.get(&id).and_then(|node| node.parent.clone()) {
            Some(parent) => nodes
                .get(&parent)
                .map(|p| p.bbox.min + content_offset)
                .unwrap_or(Vec2::ZERO),
            None => Vec2::ZERO,
        };
        let mut target = origin + offset;
        if snapping && nodes.get(&id).is_some_and(|node| node.parent.is_none()) {
            target = Vec2::new(snap(target.x, view.grid_size), snap(target.y, view.grid_size));
        }
        if let Some(node) = nodes.get_mut(&id) {
            let delta = target - node.bbox.min;
            node.translate(delta);
        }
    }
}
