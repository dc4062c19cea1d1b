//! Read-only measurements over a laid out node/edge set.
//!
//! Shared by validation, the quality evaluator and the metrics calculator so
//! that all three count overlaps, crossings and tiers the same way.

use crate::context::related;
use crate::model::{LayoutEdge, LayoutNode, PortSide};
use c4layout_core::geometry::{EPSILON, segments_cross};
use c4layout_core::{EdgeId, NodeId, Rect};
use std::collections::BTreeMap;

/// Ports closer than this along one side count as congested.
pub const MIN_PORT_SPACING: f32 = 12.0;

fn visible(nodes: &BTreeMap<NodeId, LayoutNode>) -> Vec<&LayoutNode> {
    let mut out: Vec<&LayoutNode> = nodes.values().filter(|node| node.visible).collect();
    out.sort_by(|a, b| a.bbox.min.x.total_cmp(&b.bbox.min.x).then_with(|| a.id.cmp(&b.id)));
    out
}

/// Pairs of visible, unrelated nodes whose boxes share positive area.
pub fn overlapping_pairs(nodes: &BTreeMap<NodeId, LayoutNode>) -> Vec<(NodeId, NodeId)> {
    let sorted = visible(nodes);
    let mut pairs = Vec::new();

    // Sweep along x: once b starts right of a's end no later b can overlap a.
    for (i, a) in sorted.iter().enumerate() {
        for b in sorted.iter().skip(i + 1) {
            if b.bbox.min.x >= a.bbox.max.x - EPSILON {
                break;
            }
            if a.bbox.overlaps(&b.bbox) && !related(nodes, &a.id, &b.id) {
                let pair = if a.id < b.id {
                    (a.id.clone(), b.id.clone())
                } else {
                    (b.id.clone(), a.id.clone())
                };
                pairs.push(pair);
            }
        }
    }

    pairs.sort();
    pairs
}

/// Area a child must stay inside.
pub fn containment_area(parent: &Rect, padding: f32, label_buffer: f32) -> Rect {
    parent.inset(padding, label_buffer)
}

/// Visible children that leave their visible parent's padded content area.
pub fn containment_violations(
    nodes: &BTreeMap<NodeId, LayoutNode>,
    padding: f32,
    label_buffer: f32,
) -> Vec<NodeId> {
    nodes
        .values()
        .filter(|node| node.visible)
        .filter(|node| {
            node.parent
                .as_ref()
                .and_then(|parent| nodes.get(parent))
                .filter(|parent| parent.visible)
                .is_some_and(|parent| {
                    !containment_area(&parent.bbox, padding, label_buffer).contains_rect(&node.bbox)
                })
        })
        .map(|node| node.id.clone())
        .collect()
}

/// Number of visible nodes that have a visible parent.
pub fn nested_count(nodes: &BTreeMap<NodeId, LayoutNode>) -> usize {
    nodes
        .values()
        .filter(|node| node.visible)
        .filter(|node| {
            node.parent
                .as_ref()
                .and_then(|parent| nodes.get(parent))
                .is_some_and(|parent| parent.visible)
        })
        .count()
}

/// Pairs of routed edges without a shared endpoint whose paths cross.
pub fn edge_crossings(edges: &BTreeMap<EdgeId, LayoutEdge>) -> Vec<(EdgeId, EdgeId)> {
    let routed: Vec<&LayoutEdge> = edges.values().filter(|edge| edge.is_routed()).collect();
    let mut pairs = Vec::new();

    for (i, a) in routed.iter().enumerate() {
        for b in routed.iter().skip(i + 1) {
            if shares_endpoint(a, b) {
                continue;
            }
            if paths_cross(a, b) {
                pairs.push((a.id.clone(), b.id.clone()));
            }
        }
    }
    pairs
}

pub fn shares_endpoint(a: &LayoutEdge, b: &LayoutEdge) -> bool {
    a.source == b.source || a.source == b.target || a.target == b.source || a.target == b.target
}

pub fn paths_cross(a: &LayoutEdge, b: &LayoutEdge) -> bool {
    if !bounds_of(&a.points).intersects(&bounds_of(&b.points)) {
        return false;
    }
    a.segments()
        .any(|(a1, a2)| b.segments().any(|(b1, b2)| segments_cross(a1, a2, b1, b2)))
}

fn bounds_of(points: &[c4layout_core::Vec2]) -> Rect {
    let mut iter = points.iter();
    let Some(first) = iter.next() else {
        return Rect::NOTHING;
    };
    iter.fold(Rect::from_min_max(*first, *first), |acc, p| {
        acc.union(&Rect::from_min_max(*p, *p))
    })
}

/// Compliant and total counts of sibling pairs from different ordered tiers.
///
/// A pair is compliant when the node of the upper tier does not sit below
/// the node of the lower tier.
pub fn tier_order(nodes: &BTreeMap<NodeId, LayoutNode>) -> (usize, usize) {
    sibling_pairs(nodes, |a, b| {
        let (ta, tb) = (a.metadata.semantic.tier, b.metadata.semantic.tier);
        if !ta.is_ordered() || !tb.is_ordered() || ta.band() == tb.band() {
            return None;
        }
        let (upper, lower) = if ta.band() < tb.band() { (a, b) } else { (b, a) };
        Some(upper.bbox.center().y <= lower.bbox.center().y + EPSILON)
    })
}

/// Like [`tier_order`] but over fine-grained semantic ranks.
pub fn rank_order(nodes: &BTreeMap<NodeId, LayoutNode>) -> (usize, usize) {
    sibling_pairs(nodes, |a, b| {
        let (ra, rb) = (a.metadata.semantic.rank, b.metadata.semantic.rank);
        if ra == rb
            || !a.metadata.semantic.tier.is_ordered()
            || !b.metadata.semantic.tier.is_ordered()
        {
            return None;
        }
        let (upper, lower) = if ra < rb { (a, b) } else { (b, a) };
        Some(upper.bbox.center().y <= lower.bbox.center().y + EPSILON)
    })
}

fn sibling_pairs(
    nodes: &BTreeMap<NodeId, LayoutNode>,
    judge: impl Fn(&LayoutNode, &LayoutNode) -> Option<bool>,
) -> (usize, usize) {
    let mut groups: BTreeMap<Option<&NodeId>, Vec<&LayoutNode>> = BTreeMap::new();
    for node in nodes.values().filter(|node| node.visible) {
        groups.entry(node.parent.as_ref()).or_default().push(node);
    }

    let mut compliant = 0;
    let mut total = 0;
    for members in groups.values() {
        for (i, a) in members.iter().enumerate() {
            for b in members.iter().skip(i + 1) {
                if let Some(ok) = judge(a, b) {
                    total += 1;
                    if ok {
                        compliant += 1;
                    }
                }
            }
        }
    }
    (compliant, total)
}

/// Smallest axis-aligned clearance between visible sibling boxes.
pub fn min_sibling_gap(nodes: &BTreeMap<NodeId, LayoutNode>) -> Option<f32> {
    let mut groups: BTreeMap<Option<&NodeId>, Vec<&Rect>> = BTreeMap::new();
    for node in nodes.values().filter(|node| node.visible) {
        groups.entry(node.parent.as_ref()).or_default().push(&node.bbox);
    }

    let mut best: Option<f32> = None;
    for rects in groups.values() {
        for (i, a) in rects.iter().enumerate() {
            for b in rects.iter().skip(i + 1) {
                let gap = if a.overlaps(b) { 0.0 } else { a.gap(b) };
                best = Some(best.map_or(gap, |current| current.min(gap)));
            }
        }
    }
    best
}

/// Containers whose children respect the padded content area and whose box
/// keeps at least half of `node_padding` clearance from sibling boxes.
pub fn clear_boundaries(
    nodes: &BTreeMap<NodeId, LayoutNode>,
    padding: f32,
    label_buffer: f32,
    node_padding: f32,
) -> (usize, usize) {
    let containers: Vec<&LayoutNode> = nodes
        .values()
        .filter(|node| node.visible && node.is_container())
        .collect();

    let mut clear = 0;
    for container in &containers {
        let area = containment_area(&container.bbox, padding, label_buffer);
        let children_inside = container
            .children
            .iter()
            .filter_map(|child| nodes.get(child))
            .filter(|child| child.visible)
            .all(|child| area.contains_rect(&child.bbox));

        let separated = nodes
            .values()
            .filter(|other| {
                other.visible && other.id != container.id && other.parent == container.parent
            })
            .all(|other| {
                !container.bbox.overlaps(&other.bbox)
                    && container.bbox.gap(&other.bbox) + EPSILON >= node_padding * 0.5
            });

        if children_inside && separated {
            clear += 1;
        }
    }
    (clear, containers.len())
}

/// Visible nodes whose measured label is wider than their box.
pub fn clipped_labels(nodes: &BTreeMap<NodeId, LayoutNode>) -> Vec<NodeId> {
    nodes
        .values()
        .filter(|node| node.visible && node.metadata.label_width > node.bbox.width() + EPSILON)
        .map(|node| node.id.clone())
        .collect()
}

/// Ports attached to each side of each node.
pub fn port_usage(
    edges: &BTreeMap<EdgeId, LayoutEdge>,
) -> BTreeMap<NodeId, BTreeMap<PortSide, usize>> {
    let mut usage: BTreeMap<NodeId, BTreeMap<PortSide, usize>> = BTreeMap::new();
    for edge in edges.values() {
        for (node, port) in [(&edge.source, &edge.source_port), (&edge.target, &edge.target_port)] {
            if let Some(port) = port {
                *usage
                    .entry(node.clone())
                    .or_default()
                    .entry(port.side)
                    .or_default() += 1;
            }
        }
    }
    usage
}

/// Node sides carrying more ports than fit at [`MIN_PORT_SPACING`], with the total of used sides.
pub fn congested_sides(
    nodes: &BTreeMap<NodeId, LayoutNode>,
    edges: &BTreeMap<EdgeId, LayoutEdge>,
) -> (Vec<(NodeId, PortSide)>, usize) {
    let usage = port_usage(edges);
    let mut congested = Vec::new();
    let mut used = 0;

    for (id, sides) in &usage {
        let Some(node) = nodes.get(id) else {
            continue;
        };
        for (side, count) in sides {
            used += 1;
            let length = if side.is_horizontal() {
                node.bbox.height()
            } else {
                node.bbox.width()
            };
            let capacity = ((length / MIN_PORT_SPACING).floor() as usize).max(1);
            if *count > capacity {
                congested.push((id.clone(), *side));
            }
        }
    }
    (congested, used)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use c4layout_core::{C4Node, C4Relationship, NodeKind, Vec2};

    fn node(id: &str, kind: NodeKind, x: f32, y: f32) -> LayoutNode {
        let c4 = C4Node::new(id, kind, id);
        let mut node = LayoutNode::new(c4.clone());
        node.metadata.semantic = classify(&c4);
        node.bbox = Rect::from_pos_size(Vec2::new(x, y), Vec2::new(100.0, 60.0));
        node
    }

    fn map(nodes: Vec<LayoutNode>) -> BTreeMap<NodeId, LayoutNode> {
        nodes.into_iter().map(|n| (n.id.clone(), n)).collect()
    }

    fn edge(id: &str, from: &str, to: &str, points: &[(f32, f32)]) -> LayoutEdge {
        let mut edge = LayoutEdge::new(
            C4Relationship::new(id, from, to),
            NodeId::new(from),
            NodeId::new(to),
        );
        edge.points = points.iter().map(|(x, y)| Vec2::new(*x, *y)).collect();
        edge
    }

    #[test]
    fn test_overlapping_pairs_skip_ancestors() {
        let mut parent = node("p", NodeKind::CONTAINER, 0.0, 0.0);
        parent.bbox = Rect::from_pos_size(Vec2::ZERO, Vec2::new(400.0, 400.0));
        parent.children = vec![NodeId::new("c")];
        let mut child = node("c", NodeKind::COMPONENT, 50.0, 50.0);
        child.parent = Some(NodeId::new("p"));
        let other = node("o", NodeKind::CONTAINER, 80.0, 80.0);

        let nodes = map(vec![parent, child, other]);
        let pairs = overlapping_pairs(&nodes);
        assert_eq!(
            pairs,
            vec![
                (NodeId::new("c"), NodeId::new("o")),
                (NodeId::new("o"), NodeId::new("p"))
            ]
        );
    }

    #[test]
    fn test_containment_respects_label_buffer() {
        let mut parent = node("p", NodeKind::CONTAINER, 0.0, 0.0);
        parent.bbox = Rect::from_pos_size(Vec2::ZERO, Vec2::new(300.0, 300.0));
        let mut inside = node("in", NodeKind::COMPONENT, 20.0, 60.0);
        inside.parent = Some(NodeId::new("p"));
        let mut under_label = node("label", NodeKind::COMPONENT, 120.0, 25.0);
        under_label.parent = Some(NodeId::new("p"));

        let nodes = map(vec![parent, inside, under_label]);
        assert_eq!(containment_violations(&nodes, 20.0, 30.0), vec![NodeId::new("label")]);
        assert_eq!(nested_count(&nodes), 2);
    }

    #[test]
    fn test_crossings_ignore_shared_endpoints() {
        let mut edges = BTreeMap::new();
        for e in [
            edge("e1", "a", "b", &[(0.0, 0.0), (100.0, 100.0)]),
            edge("e2", "c", "d", &[(0.0, 100.0), (100.0, 0.0)]),
            edge("e3", "a", "d", &[(0.0, 50.0), (100.0, 50.0)]),
        ] {
            edges.insert(e.id.clone(), e);
        }
        let crossings = edge_crossings(&edges);
        assert_eq!(crossings, vec![(EdgeId::new("e1"), EdgeId::new("e2"))]);
    }

    #[test]
    fn test_tier_order() {
        let person = node("person", NodeKind::PERSON, 0.0, 0.0);
        let db = node("db", NodeKind::DATABASE, 0.0, 300.0);
        let web = node("web", NodeKind::WEB_APP, 200.0, 400.0);

        let (ok, total) = tier_order(&map(vec![person, db, web]));
        // person above db and web; web (presentation) below db (data) is wrong
        assert_eq!(total, 3);
        assert_eq!(ok, 2);
    }

    #[test]
    fn test_min_gap_and_clipping() {
        let a = node("a", NodeKind::CONTAINER, 0.0, 0.0);
        let mut b = node("b", NodeKind::CONTAINER, 130.0, 0.0);
        b.metadata.label_width = 140.0;
        let nodes = map(vec![a, b]);
        assert_eq!(min_sibling_gap(&nodes), Some(30.0));
        assert_eq!(clipped_labels(&nodes), vec![NodeId::new("b")]);
    }
}
