//! Hierarchy-aware overlap removal and containment.
//!
//! Every pass moves whole subtrees, so a container always carries its
//! children along. Pushes are bounded by `push_factor` times the displacement
//! that resolves the pair, which keeps repeated pushes from compounding.

use crate::analysis::{containment_area, overlapping_pairs};
use crate::context::{sibling_ancestors, sibling_groups_bottom_up, translate_subtree};
use crate::model::LayoutNode;
use crate::options::LayoutOptions;
use c4layout_core::geometry::EPSILON;
use c4layout_core::{NodeId, Rect, Vec2};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Separation {
    /// Required clearance between siblings.
    pub padding: f32,
    pub parent_child_padding: f32,
    pub label_buffer: f32,
    pub tolerance: f32,
    pub push_factor: f32,
    pub max_iterations: usize,
}

impl Separation {
    pub fn from_options(options: &LayoutOptions) -> Self {
        Self {
            padding: options.spacing.node_padding,
            parent_child_padding: options.spacing.parent_child_padding,
            label_buffer: options.spacing.label_buffer,
            tolerance: options.optimization.tolerance.max(0.0),
            push_factor: options.optimization.push_factor(),
            max_iterations: options.optimization.max_iterations.max(1),
        }
    }
}

/// Displacement along x and y that would leave `padding` between the boxes.
/// Values at or below zero mean the axis already has enough clearance.
pub fn separation_needed(a: &Rect, b: &Rect, padding: f32) -> (f32, f32) {
    let (ox, oy) = a.overlap_extent(b);
    (ox + padding, oy + padding)
}

fn violation(a: &Rect, b: &Rect, s: &Separation) -> Option<(f32, f32)> {
    let (nx, ny) = separation_needed(a, b, s.padding);
    (nx > s.tolerance && ny > s.tolerance).then_some((nx, ny))
}

fn rect_of(nodes: &BTreeMap<NodeId, LayoutNode>, id: &NodeId) -> Option<Rect> {
    nodes.get(id).map(|node| node.bbox)
}

/// -1 when `a` should move toward negative coordinates on this axis.
fn direction(a_center: f32, b_center: f32, a: &NodeId, b: &NodeId) -> f32 {
    if a_center < b_center - EPSILON {
        -1.0
    } else if a_center > b_center + EPSILON {
        1.0
    } else if a < b {
        -1.0
    } else {
        1.0
    }
}

fn push_apart(
    nodes: &mut BTreeMap<NodeId, LayoutNode>,
    a: &NodeId,
    b: &NodeId,
    needed: (f32, f32),
    s: &Separation,
) {
    let (Some(ra), Some(rb)) = (rect_of(nodes, a), rect_of(nodes, b)) else {
        return;
    };
    let (ca, cb) = (ra.center(), rb.center());
    let (nx, ny) = needed;

    let delta = if nx <= ny {
        Vec2::new(direction(ca.x, cb.x, a, b) * nx * s.push_factor * 0.5, 0.0)
    } else {
        Vec2::new(0.0, direction(ca.y, cb.y, a, b) * ny * s.push_factor * 0.5)
    };
    translate_subtree(nodes, a, delta);
    translate_subtree(nodes, b, delta * -1.0);
}

fn separate_group(
    nodes: &mut BTreeMap<NodeId, LayoutNode>,
    group: &[NodeId],
    s: &Separation,
) -> usize {
    let mut moves = 0;
    for _ in 0..s.max_iterations {
        let mut moved = false;
        for (i, a) in group.iter().enumerate() {
            for b in group.iter().skip(i + 1) {
                let (Some(ra), Some(rb)) = (rect_of(nodes, a), rect_of(nodes, b)) else {
                    continue;
                };
                if let Some(needed) = violation(&ra, &rb, s) {
                    push_apart(nodes, a, b, needed, s);
                    moved = true;
                    moves += 1;
                }
            }
        }
        if !moved {
            break;
        }
    }
    moves
}

/// Grow a visible parent until its padded content area holds every visible child.
///
/// Returns whether the parent changed.
pub fn fit_parent(nodes: &mut BTreeMap<NodeId, LayoutNode>, id: &NodeId, s: &Separation) -> bool {
    let Some(parent) = nodes.get(id) else {
        return false;
    };
    if !parent.visible || parent.collapsed {
        return false;
    }
    let Some(children) = Rect::bounding(
        parent
            .children
            .iter()
            .filter_map(|child| nodes.get(child))
            .filter(|child| child.visible)
            .map(|child| &child.bbox),
    ) else {
        return false;
    };

    let pad = s.parent_child_padding;
    let required = Rect::from_min_max(
        Vec2::new(children.min.x - pad, children.min.y - pad - s.label_buffer),
        Vec2::new(children.max.x + pad, children.max.y + pad),
    );
    let grown = parent.bbox.union(&required);
    if parent.bbox.contains_rect(&grown) {
        return false;
    }
    if let Some(parent) = nodes.get_mut(id) {
        parent.reframe(grown);
    }
    true
}

/// Fit every parent, deepest first. Returns the number of parents grown.
pub fn fit_parents(nodes: &mut BTreeMap<NodeId, LayoutNode>, s: &Separation) -> usize {
    let mut grown = 0;
    for (parent, _) in sibling_groups_bottom_up(nodes) {
        if let Some(parent) = parent {
            if fit_parent(nodes, &parent, s) {
                grown += 1;
            }
        }
    }
    grown
}

/// Push apart siblings closer than the padding, innermost groups first.
pub fn remove_sibling_overlaps(nodes: &mut BTreeMap<NodeId, LayoutNode>, s: &Separation) -> usize {
    let mut moves = 0;
    for (parent, group) in sibling_groups_bottom_up(nodes) {
        moves += separate_group(nodes, &group, s);
        if let Some(parent) = parent {
            fit_parent(nodes, &parent, s);
        }
    }
    moves
}

/// Resolve overlaps between nodes from different subtrees by moving the
/// subtree of the shallower node, never the nested one.
pub fn resolve_cross_hierarchy(nodes: &mut BTreeMap<NodeId, LayoutNode>, s: &Separation) -> usize {
    let mut moves = 0;
    for _ in 0..s.max_iterations {
        let pairs: Vec<(NodeId, NodeId)> = overlapping_pairs(nodes)
            .into_iter()
            .filter(|(a, b)| {
                nodes.get(a).map(|n| &n.parent) != nodes.get(b).map(|n| &n.parent)
            })
            .collect();
        if pairs.is_empty() {
            break;
        }

        let mut moved = false;
        for (a, b) in pairs {
            let (Some(ra), Some(rb)) = (rect_of(nodes, &a), rect_of(nodes, &b)) else {
                continue;
            };
            // an earlier push in this round may already have cleared the pair
            if !ra.overlaps(&rb) {
                continue;
            }
            let Some((xa, xb)) = sibling_ancestors(nodes, &a, &b) else {
                continue;
            };
            let depth = |id: &NodeId| nodes.get(id).map(|n| n.depth).unwrap_or(0);
            let (mover, mover_rect, anchor_rect) = if depth(&a) <= depth(&b) {
                (xa, ra, rb)
            } else {
                (xb, rb, ra)
            };

            let (nx, ny) = separation_needed(&mover_rect, &anchor_rect, s.padding);
            let (cm, ca) = (mover_rect.center(), anchor_rect.center());
            let delta = if nx <= ny {
                Vec2::new(if cm.x < ca.x { -nx } else { nx }, 0.0)
            } else {
                Vec2::new(0.0, if cm.y < ca.y { -ny } else { ny })
            };
            translate_subtree(nodes, &mover, delta);
            moved = true;
            moves += 1;
        }
        if !moved {
            break;
        }
    }
    if moves > 0 {
        fit_parents(nodes, s);
    }
    moves
}

/// Clamp children into their parent's padded content area, top-down.
///
/// Children too large for the area grow the parent instead.
pub fn enforce_containment(nodes: &mut BTreeMap<NodeId, LayoutNode>, s: &Separation) -> usize {
    let mut parents: Vec<(usize, NodeId)> = nodes
        .values()
        .filter(|node| node.visible && node.is_container())
        .map(|node| (node.depth, node.id.clone()))
        .collect();
    parents.sort();

    let mut fixes = 0;
    for (_, parent) in parents {
        let Some(node) = nodes.get(&parent) else {
            continue;
        };
        let area = containment_area(&node.bbox, s.parent_child_padding, s.label_buffer);
        let children: Vec<NodeId> = node.children.clone();

        let mut grow = false;
        for child in children {
            let Some(rect) = nodes.get(&child).filter(|c| c.visible).map(|c| c.bbox) else {
                continue;
            };
            if area.contains_rect(&rect) {
                continue;
            }
            if rect.width() > area.width() + EPSILON || rect.height() > area.height() + EPSILON {
                grow = true;
                continue;
            }
            let dx = if rect.min.x < area.min.x {
                area.min.x - rect.min.x
            } else if rect.max.x > area.max.x {
                area.max.x - rect.max.x
            } else {
                0.0
            };
            let dy = if rect.min.y < area.min.y {
                area.min.y - rect.min.y
            } else if rect.max.y > area.max.y {
                area.max.y - rect.max.y
            } else {
                0.0
            };
            translate_subtree(nodes, &child, Vec2::new(dx, dy));
            fixes += 1;
        }
        if grow && fit_parent(nodes, &parent, s) {
            fixes += 1;
        }
    }

    fixes + fit_parents(nodes, s)
}

/// Closing sweep: inside each group, shift nodes right past any placed
/// sibling they still crowd. Terminates because a node only moves right and
/// passes each placed sibling at most once.
pub fn force_separate(nodes: &mut BTreeMap<NodeId, LayoutNode>, s: &Separation) -> usize {
    let mut shifts = 0;
    for (parent, group) in sibling_groups_bottom_up(nodes) {
        let mut order: Vec<(f32, NodeId)> = group
            .iter()
            .filter_map(|id| rect_of(nodes, id).map(|rect| (rect.min.x, id.clone())))
            .collect();
        order.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        let mut placed: Vec<NodeId> = Vec::with_capacity(order.len());
        for (_, id) in order {
            for _ in 0..=placed.len() {
                let Some(rect) = rect_of(nodes, &id) else {
                    break;
                };
                let blocker = placed.iter().find_map(|other| {
                    let other_rect = rect_of(nodes, other)?;
                    violation(&other_rect, &rect, s).map(|_| other_rect)
                });
                let Some(blocker) = blocker else {
                    break;
                };
                let shift = blocker.max.x + s.padding - rect.min.x;
                translate_subtree(nodes, &id, Vec2::new(shift.max(0.0), 0.0));
                shifts += 1;
            }
            placed.push(id);
        }

        if let Some(parent) = parent {
            fit_parent(nodes, &parent, s);
        }
    }
    shifts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::containment_violations;
    use c4layout_core::{C4Node, NodeKind};
    use proptest::prelude::*;

    fn settings() -> Separation {
        Separation {
            padding: 50.0,
            parent_child_padding: 30.0,
            label_buffer: 30.0,
            tolerance: 0.5,
            push_factor: 1.25,
            max_iterations: 50,
        }
    }

    fn add(nodes: &mut BTreeMap<NodeId, LayoutNode>, id: &str, parent: Option<&str>, rect: Rect) {
        let mut node = LayoutNode::new(C4Node::new(id, NodeKind::CONTAINER, id));
        node.bbox = rect;
        node.label_box = Rect::from_pos_size(rect.min, Vec2::new(rect.width(), 20.0));
        node.content_box = Rect::from_min_max(Vec2::new(rect.min.x, rect.min.y + 20.0), rect.max);
        if let Some(parent) = parent {
            let parent_id = NodeId::new(parent);
            node.parent = Some(parent_id.clone());
            if let Some(p) = nodes.get_mut(&parent_id) {
                node.depth = p.depth + 1;
                p.children.push(node.id.clone());
            }
        }
        nodes.insert(node.id.clone(), node);
    }

    fn rect(x: f32, y: f32, w: f32, h: f32) -> Rect {
        Rect::from_pos_size(Vec2::new(x, y), Vec2::new(w, h))
    }

    fn assert_clear(nodes: &BTreeMap<NodeId, LayoutNode>) {
        assert!(overlapping_pairs(nodes).is_empty(), "{:?}", overlapping_pairs(nodes));
    }

    #[test]
    fn test_push_stays_bounded() {
        let mut nodes = BTreeMap::new();
        add(&mut nodes, "a", None, rect(0.0, 0.0, 200.0, 200.0));
        add(&mut nodes, "b", None, rect(50.0, 50.0, 200.0, 200.0));

        remove_sibling_overlaps(&mut nodes, &settings());

        assert_clear(&nodes);
        let bounds = Rect::bounding(nodes.values().map(|n| &n.bbox)).unwrap_or(Rect::NOTHING);
        assert!(bounds.width() < 600.0, "width {}", bounds.width());
        assert!(bounds.height() < 600.0, "height {}", bounds.height());
    }

    #[test]
    fn test_identical_boxes_split_by_id() {
        let mut nodes = BTreeMap::new();
        add(&mut nodes, "a", None, rect(0.0, 0.0, 100.0, 100.0));
        add(&mut nodes, "b", None, rect(0.0, 0.0, 100.0, 100.0));

        remove_sibling_overlaps(&mut nodes, &settings());

        assert!(nodes[&NodeId::new("a")].bbox.min.x < nodes[&NodeId::new("b")].bbox.min.x);
        assert_clear(&nodes);
    }

    #[test]
    fn test_children_move_with_parent() {
        let mut nodes = BTreeMap::new();
        add(&mut nodes, "p", None, rect(0.0, 0.0, 300.0, 300.0));
        add(&mut nodes, "c", Some("p"), rect(40.0, 80.0, 100.0, 100.0));
        add(&mut nodes, "q", None, rect(100.0, 100.0, 300.0, 300.0));

        remove_sibling_overlaps(&mut nodes, &settings());

        let p = nodes[&NodeId::new("p")].bbox;
        let c = nodes[&NodeId::new("c")].bbox;
        assert!(p.contains_rect(&c));
        assert_clear(&nodes);
    }

    #[test]
    fn test_parent_grows_around_separated_children() {
        let mut nodes = BTreeMap::new();
        add(&mut nodes, "p", None, rect(0.0, 0.0, 200.0, 200.0));
        add(&mut nodes, "c1", Some("p"), rect(30.0, 60.0, 100.0, 100.0));
        add(&mut nodes, "c2", Some("p"), rect(60.0, 60.0, 100.0, 100.0));

        let s = settings();
        remove_sibling_overlaps(&mut nodes, &s);

        assert!(containment_violations(&nodes, s.parent_child_padding, s.label_buffer).is_empty());
        assert_clear(&nodes);
    }

    #[test]
    fn test_containment_clamps_child() {
        let mut nodes = BTreeMap::new();
        add(&mut nodes, "p", None, rect(0.0, 0.0, 400.0, 400.0));
        add(&mut nodes, "c", Some("p"), rect(350.0, 350.0, 100.0, 100.0));

        let s = settings();
        enforce_containment(&mut nodes, &s);

        assert_eq!(nodes[&NodeId::new("p")].bbox, rect(0.0, 0.0, 400.0, 400.0));
        assert!(containment_violations(&nodes, s.parent_child_padding, s.label_buffer).is_empty());
    }

    #[test]
    fn test_cross_hierarchy_moves_shallow_subtree() {
        let mut nodes = BTreeMap::new();
        add(&mut nodes, "p", None, rect(0.0, 0.0, 400.0, 400.0));
        add(&mut nodes, "c", Some("p"), rect(250.0, 60.0, 120.0, 100.0));
        add(&mut nodes, "r", None, rect(420.0, 0.0, 100.0, 100.0));
        // c escaped its parent and now covers r
        translate_subtree(&mut nodes, &NodeId::new("c"), Vec2::new(150.0, 0.0));

        let before_c = nodes[&NodeId::new("c")].bbox;
        resolve_cross_hierarchy(&mut nodes, &settings());

        assert_eq!(nodes[&NodeId::new("c")].bbox, before_c);
        assert!(!nodes[&NodeId::new("c")].bbox.overlaps(&nodes[&NodeId::new("r")].bbox));
    }

    #[test]
    fn test_valid_layout_is_left_alone() {
        let mut nodes = BTreeMap::new();
        add(&mut nodes, "p", None, rect(0.0, 0.0, 400.0, 300.0));
        add(&mut nodes, "c1", Some("p"), rect(30.0, 60.0, 100.0, 100.0));
        add(&mut nodes, "c2", Some("p"), rect(200.0, 60.0, 100.0, 100.0));
        add(&mut nodes, "r", None, rect(500.0, 0.0, 100.0, 100.0));
        let before: Vec<Rect> = nodes.values().map(|n| n.bbox).collect();

        let s = settings();
        assert_eq!(remove_sibling_overlaps(&mut nodes, &s), 0);
        assert_eq!(resolve_cross_hierarchy(&mut nodes, &s), 0);
        assert_eq!(enforce_containment(&mut nodes, &s), 0);
        assert_eq!(force_separate(&mut nodes, &s), 0);

        let after: Vec<Rect> = nodes.values().map(|n| n.bbox).collect();
        assert_eq!(before, after);
    }

    proptest! {
        #[test]
        fn prop_force_separate_clears_every_group(
            boxes in proptest::collection::vec(
                (0.0f32..400.0, 0.0f32..400.0, 20.0f32..150.0, 20.0f32..150.0),
                2..12,
            )
        ) {
            let mut nodes = BTreeMap::new();
            for (i, (x, y, w, h)) in boxes.iter().enumerate() {
                add(&mut nodes, &format!("n{i:02}"), None, rect(*x, *y, *w, *h));
            }
            let s = settings();
            force_separate(&mut nodes, &s);

            let rects: Vec<Rect> = nodes.values().map(|n| n.bbox).collect();
            for (i, a) in rects.iter().enumerate() {
                for b in rects.iter().skip(i + 1) {
                    prop_assert!(violation(a, b, &s).is_none(), "{:?} {:?}", a, b);
                }
            }
        }
    }
}
