//! Working representation of nodes and edges while the pipeline runs.

use crate::classifier::SemanticInfo;
use c4layout_core::geometry::polyline_length;
use c4layout_core::{C4Node, C4Relationship, EdgeId, NodeId, Rect, RouteKind, Vec2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PortSide {
    Top,
    Bottom,
    Left,
    Right,
}

impl PortSide {
    pub const ALL: [PortSide; 4] = [
        PortSide::Top,
        PortSide::Bottom,
        PortSide::Left,
        PortSide::Right,
    ];

    /// Outward unit normal of the side.
    pub fn normal(self) -> Vec2 {
        match self {
            PortSide::Top => Vec2::new(0.0, -1.0),
            PortSide::Bottom => Vec2::new(0.0, 1.0),
            PortSide::Left => Vec2::new(-1.0, 0.0),
            PortSide::Right => Vec2::new(1.0, 0.0),
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, PortSide::Left | PortSide::Right)
    }

    /// Point on the side of `rect` at fraction `t` (0..1) along it.
    pub fn point_on(self, rect: &Rect, t: f32) -> Vec2 {
        let t = t.clamp(0.0, 1.0);
        match self {
            PortSide::Top => Vec2::new(rect.min.x + rect.width() * t, rect.min.y),
            PortSide::Bottom => Vec2::new(rect.min.x + rect.width() * t, rect.max.y),
            PortSide::Left => Vec2::new(rect.min.x, rect.min.y + rect.height() * t),
            PortSide::Right => Vec2::new(rect.max.x, rect.min.y + rect.height() * t),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PortSide::Top => "top",
            PortSide::Bottom => "bottom",
            PortSide::Left => "left",
            PortSide::Right => "right",
        }
    }
}

/// Named attachment point on a node boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub id: String,
    pub side: PortSide,
    pub position: Vec2,
    pub edge: EdgeId,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMetadata {
    /// Position of the node in the deterministic id-ordered traversal.
    pub processing_order: usize,
    /// Importance derived from degree and priority.
    pub weight: f32,
    pub tags: Vec<String>,
    pub semantic: SemanticInfo,
    pub label_height: f32,
    pub label_width: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutNode {
    pub id: NodeId,
    pub node: C4Node,
    pub bbox: Rect,
    pub content_box: Rect,
    pub label_box: Rect,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub depth: usize,
    pub visible: bool,
    pub collapsed: bool,
    pub z_index: i32,
    pub ports: Vec<Port>,
    pub metadata: NodeMetadata,
}

impl LayoutNode {
    pub fn new(node: C4Node) -> Self {
        let tags = node.tags.iter().cloned().collect();
        Self {
            id: node.id.clone(),
            node,
            bbox: Rect::NOTHING,
            content_box: Rect::NOTHING,
            label_box: Rect::NOTHING,
            parent: None,
            children: Vec::new(),
            depth: 0,
            visible: true,
            collapsed: false,
            z_index: 0,
            ports: Vec::new(),
            metadata: NodeMetadata {
                tags,
                ..NodeMetadata::default()
            },
        }
    }

    /// Children are laid out inside this node.
    pub fn is_container(&self) -> bool {
        !self.children.is_empty() && !self.collapsed
    }

    /// Move every box owned by the node.
    pub fn translate(&mut self, delta: Vec2) {
        self.bbox = self.bbox.translate(delta);
        self.content_box = self.content_box.translate(delta);
        self.label_box = self.label_box.translate(delta);
        for port in &mut self.ports {
            port.position = port.position + delta;
        }
    }

    /// Replace the outer box, keeping label and content boxes in the same relative place.
    pub fn reframe(&mut self, bbox: Rect) {
        let delta = bbox.min - self.bbox.min;
        let label_height = self.label_box.height();
        self.translate(delta);
        self.bbox = bbox;
        self.label_box = Rect::from_pos_size(bbox.min, Vec2::new(bbox.width(), label_height));
        self.content_box = Rect::from_min_max(
            Vec2::new(bbox.min.x, (bbox.min.y + label_height).min(bbox.max.y)),
            bbox.max,
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentType {
    Line,
    Horizontal,
    Vertical,
    Curve,
    Arc,
}

impl SegmentType {
    /// Classify a straight segment by its direction.
    pub fn between(a: Vec2, b: Vec2) -> SegmentType {
        if (a.y - b.y).abs() <= c4layout_core::geometry::EPSILON {
            SegmentType::Horizontal
        } else if (a.x - b.x).abs() <= c4layout_core::geometry::EPSILON {
            SegmentType::Vertical
        } else {
            SegmentType::Line
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutEdge {
    pub id: EdgeId,
    pub relationship: C4Relationship,
    /// Visible endpoints; differ from the relationship's when lifted.
    pub source: NodeId,
    pub target: NodeId,
    pub route: RouteKind,
    pub points: Vec<Vec2>,
    pub segment_types: Vec<SegmentType>,
    pub control_points: Vec<Vec2>,
    pub source_port: Option<Port>,
    pub target_port: Option<Port>,
    pub label_position: Option<Vec2>,
    pub bundle: Option<usize>,
    pub length: f32,
    pub bend_count: usize,
    pub lifted: bool,
}

impl LayoutEdge {
    pub fn new(relationship: C4Relationship, source: NodeId, target: NodeId) -> Self {
        let lifted = source != relationship.from || target != relationship.to;
        Self {
            id: relationship.id.clone(),
            route: relationship.preferred_route.unwrap_or_default(),
            relationship,
            source,
            target,
            points: Vec::new(),
            segment_types: Vec::new(),
            control_points: Vec::new(),
            source_port: None,
            target_port: None,
            label_position: None,
            bundle: None,
            length: 0.0,
            bend_count: 0,
            lifted,
        }
    }

    pub fn is_routed(&self) -> bool {
        self.points.len() >= 2
    }

    /// Straight segments as point pairs; curves are approximated by their chord.
    pub fn segments(&self) -> impl Iterator<Item = (Vec2, Vec2)> + '_ {
        self.points.windows(2).map(|w| (w[0], w[1]))
    }

    /// Derive length, bend count and label anchor from the current points.
    pub fn recompute_metrics(&mut self) {
        self.length = polyline_length(&self.points);
        self.bend_count = self
            .segment_types
            .windows(2)
            .filter(|w| {
                matches!(
                    (w[0], w[1]),
                    (SegmentType::Horizontal, SegmentType::Vertical)
                        | (SegmentType::Vertical, SegmentType::Horizontal)
                        | (SegmentType::Line, SegmentType::Line)
                )
            })
            .count()
            + self
                .segment_types
                .iter()
                .filter(|s| **s == SegmentType::Arc)
                .count();
        self.label_position = self.longest_segment_midpoint();
    }

    fn longest_segment_midpoint(&self) -> Option<Vec2> {
        self.segments()
            .enumerate()
            .max_by(|(ia, (a1, a2)), (ib, (b1, b2))| {
                a1.distance(*a2)
                    .total_cmp(&b1.distance(*b2))
                    // keep the first of equally long segments
                    .then(ib.cmp(ia))
            })
            .map(|(_, (a, b))| (a + b) * 0.5)
    }
}
