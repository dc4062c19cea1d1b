//! Geometry algorithms used by the phases.
//!
//! Placement strategies work on one sibling group at a time and return
//! top-left corners in group-local coordinates.

pub mod grid;
pub mod layered;
pub mod overlap;
pub mod radial;
pub mod routing;

use crate::classifier::SemanticInfo;
use crate::options::LayoutStrategy;
use c4layout_core::{NodeId, Vec2};

/// One box to place inside a sibling group.
#[derive(Debug, Clone)]
pub struct PlacementItem {
    pub id: NodeId,
    pub size: Vec2,
    pub semantic: SemanticInfo,
    pub priority: i32,
}

/// Directed relation between two items of one group, as indices.
pub type GroupEdge = (usize, usize);

#[derive(Debug, Clone, Copy)]
pub struct PlacementSpacing {
    /// Gap between neighbours in a row or rank.
    pub horizontal: f32,
    /// Gap between rows or ranks.
    pub vertical: f32,
    pub radial_gap: f32,
    pub center_layers: bool,
}

/// Deterministic order used before any strategy specific ordering:
/// semantic rank, then higher priority first, then id.
pub fn semantic_order(items: &[PlacementItem]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by(|&a, &b| {
        let (ia, ib) = (&items[a], &items[b]);
        ia.semantic
            .rank
            .cmp(&ib.semantic.rank)
            .then_with(|| ib.priority.cmp(&ia.priority))
            .then_with(|| ia.id.cmp(&ib.id))
    });
    order
}

pub fn arrange(
    strategy: LayoutStrategy,
    items: &[PlacementItem],
    edges: &[GroupEdge],
    spacing: &PlacementSpacing,
) -> Vec<Vec2> {
    let mut positions = match strategy {
        LayoutStrategy::Grid => grid::arrange(items, spacing),
        LayoutStrategy::Radial => radial::arrange(items, edges, spacing),
        LayoutStrategy::Layered => layered::arrange(items, edges, spacing),
    };
    normalize(&mut positions);
    positions
}

/// Shift positions so the group's bounding box starts at the origin.
pub fn normalize(positions: &mut [Vec2]) {
    let min_x = positions.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
    let min_y = positions.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
    if !min_x.is_finite() || !min_y.is_finite() {
        return;
    }
    for p in positions.iter_mut() {
        p.x -= min_x;
        p.y -= min_y;
    }
}

/// Width and height of the group once placed.
pub fn extent(positions: &[Vec2], items: &[PlacementItem]) -> Vec2 {
    positions
        .iter()
        .zip(items)
        .fold(Vec2::ZERO, |acc, (p, item)| {
            Vec2::new(acc.x.max(p.x + item.size.x), acc.y.max(p.y + item.size.y))
        })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::classifier::classify;
    use c4layout_core::{C4Node, NodeKind};

    pub fn item(id: &str, kind: NodeKind, w: f32, h: f32) -> PlacementItem {
        PlacementItem {
            id: NodeId::new(id),
            size: Vec2::new(w, h),
            semantic: classify(&C4Node::new(id, kind, id)),
            priority: 0,
        }
    }

    pub fn spacing() -> PlacementSpacing {
        PlacementSpacing {
            horizontal: 80.0,
            vertical: 100.0,
            radial_gap: 120.0,
            center_layers: true,
        }
    }

    pub fn boxes(items: &[PlacementItem], positions: &[Vec2]) -> Vec<c4layout_core::Rect> {
        items
            .iter()
            .zip(positions)
            .map(|(item, p)| c4layout_core::Rect::from_pos_size(*p, item.size))
            .collect()
    }

    pub fn assert_separated(rects: &[c4layout_core::Rect], min_gap: f32) {
        for (i, a) in rects.iter().enumerate() {
            for b in rects.iter().skip(i + 1) {
                assert!(
                    a.gap(b) + 1e-3 >= min_gap,
                    "boxes too close: {a:?} {b:?} (gap {})",
                    a.gap(b)
                );
            }
        }
    }
}
