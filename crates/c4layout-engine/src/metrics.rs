//! Final layout statistics.

use crate::analysis;
use crate::context::LayoutContext;
use crate::model::{LayoutEdge, LayoutNode};
use crate::options::SpacingOptions;
use c4layout_core::{EdgeId, NodeId, Rect};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutMetrics {
    pub node_count: usize,
    pub visible_nodes: usize,
    pub edge_count: usize,
    pub max_depth: usize,

    pub crossings: usize,
    pub overlaps: usize,
    pub containment_violations: usize,
    /// Visible nodes with a visible parent.
    pub nested_nodes: usize,

    pub total_edge_length: f32,
    pub avg_edge_length: f32,
    pub max_edge_length: f32,
    pub total_bends: usize,
    pub avg_bends: f32,

    pub width: f32,
    pub height: f32,
    pub aspect_ratio: f32,
    /// Leaf box area over bounding box area.
    pub compactness: f32,
    /// 1.0 when the area-weighted center of the leaves sits on the bounds center.
    pub balance: f32,
    pub avg_node_size: f32,

    pub min_spacing: Option<f32>,
    pub clipped_labels: usize,
    pub congested_sides: usize,
    pub used_sides: usize,
    pub tier_pairs: (usize, usize),
    pub rank_pairs: (usize, usize),
    pub clear_boundaries: (usize, usize),
}

fn ratio((good, total): (usize, usize)) -> f32 {
    if total == 0 { 1.0 } else { good as f32 / total as f32 }
}

impl LayoutMetrics {
    pub fn calculate(
        nodes: &BTreeMap<NodeId, LayoutNode>,
        edges: &BTreeMap<EdgeId, LayoutEdge>,
        spacing: &SpacingOptions,
    ) -> Self {
        let visible: Vec<&LayoutNode> = nodes.values().filter(|node| node.visible).collect();
        let leaves: Vec<&LayoutNode> = visible
            .iter()
            .copied()
            .filter(|node| !node.is_container())
            .collect();
        let bounds = Rect::bounding(visible.iter().map(|node| &node.bbox)).unwrap_or(Rect::NOTHING);

        let routed: Vec<&LayoutEdge> = edges.values().filter(|edge| edge.is_routed()).collect();
        let total_edge_length: f32 = routed.iter().map(|edge| edge.length).sum();
        let total_bends: usize = routed.iter().map(|edge| edge.bend_count).sum();
        let per_edge = |total: f32| {
            if routed.is_empty() { 0.0 } else { total / routed.len() as f32 }
        };

        let leaf_area: f32 = leaves.iter().map(|node| node.bbox.area()).sum();
        let balance = if leaf_area > 0.0 && bounds.area() > 0.0 {
            let (mut cx, mut cy) = (0.0, 0.0);
            for node in &leaves {
                let (center, area) = (node.bbox.center(), node.bbox.area());
                cx += center.x * area;
                cy += center.y * area;
            }
            let mass = c4layout_core::Vec2::new(cx / leaf_area, cy / leaf_area);
            let half_diagonal = bounds.size().length() * 0.5;
            (1.0 - mass.distance(bounds.center()) / half_diagonal).clamp(0.0, 1.0)
        } else {
            1.0
        };

        let (congested, used_sides) = analysis::congested_sides(nodes, edges);

        Self {
            node_count: nodes.len(),
            visible_nodes: visible.len(),
            edge_count: edges.len(),
            max_depth: visible.iter().map(|node| node.depth).max().unwrap_or(0),

            crossings: analysis::edge_crossings(edges).len(),
            overlaps: analysis::overlapping_pairs(nodes).len(),
            containment_violations: analysis::containment_violations(
                nodes,
                spacing.parent_child_padding,
                spacing.label_buffer,
            )
            .len(),
            nested_nodes: analysis::nested_count(nodes),

            total_edge_length,
            avg_edge_length: per_edge(total_edge_length),
            max_edge_length: routed.iter().map(|edge| edge.length).fold(0.0, f32::max),
            total_bends,
            avg_bends: per_edge(total_bends as f32),

            width: bounds.width(),
            height: bounds.height(),
            aspect_ratio: if bounds.height() > 0.0 {
                bounds.width() / bounds.height()
            } else {
                1.0
            },
            compactness: if bounds.area() > 0.0 { leaf_area / bounds.area() } else { 0.0 },
            balance,
            avg_node_size: if leaves.is_empty() {
                0.0
            } else {
                leaves.iter().map(|node| node.bbox.width().max(node.bbox.height())).sum::<f32>()
                    / leaves.len() as f32
            },

            min_spacing: analysis::min_sibling_gap(nodes),
            clipped_labels: analysis::clipped_labels(nodes).len(),
            congested_sides: congested.len(),
            used_sides,
            tier_pairs: analysis::tier_order(nodes),
            rank_pairs: analysis::rank_order(nodes),
            clear_boundaries: analysis::clear_boundaries(
                nodes,
                spacing.parent_child_padding,
                spacing.label_buffer,
                spacing.node_padding,
            ),
        }
    }

    pub fn from_context(ctx: &LayoutContext) -> Self {
        Self::calculate(&ctx.nodes, &ctx.edges, &ctx.options.spacing)
    }

    pub fn tier_compliance(&self) -> f32 {
        ratio(self.tier_pairs)
    }

    pub fn rank_compliance(&self) -> f32 {
        ratio(self.rank_pairs)
    }

    pub fn boundary_clarity(&self) -> f32 {
        ratio(self.clear_boundaries)
    }
}
