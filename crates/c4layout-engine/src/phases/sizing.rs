use super::{HIERARCHY, LayoutPhase, SIZING};
use crate::algorithms::grid::packed_size;
use crate::context::LayoutContext;
use crate::measure::{TextMeasurer, TextStyle, wrap_text};
use crate::model::LayoutNode;
use crate::options::SpacingOptions;
use c4layout_core::{NodeId, NodeKind, Rect, Vec2};
use std::collections::BTreeMap;

/// Inner padding between a leaf's border and its text.
const TEXT_PADDING: f32 = 16.0;
/// Vertical gap between the label, technology and description blocks.
const LINE_GAP: f32 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeConstraints {
    pub min: Vec2,
    pub max: Vec2,
}

impl SizeConstraints {
    pub fn clamp(&self, size: Vec2) -> Vec2 {
        Vec2::new(
            size.x.clamp(self.min.x, self.max.x),
            size.y.clamp(self.min.y, self.max.y),
        )
    }
}

pub fn constraints_for(kind: NodeKind) -> SizeConstraints {
    let (min, max) = match kind {
        NodeKind::PERSON | NodeKind::EXTERNAL_PERSON => ((160.0, 140.0), (320.0, 260.0)),
        NodeKind::DATABASE
        | NodeKind::QUEUE
        | NodeKind::TOPIC
        | NodeKind::CACHE
        | NodeKind::FILE_SYSTEM => ((160.0, 100.0), (360.0, 240.0)),
        NodeKind::SOFTWARE_SYSTEM | NodeKind::EXTERNAL_SYSTEM => ((200.0, 120.0), (420.0, 300.0)),
        NodeKind::BOUNDARY => ((240.0, 160.0), (480.0, 320.0)),
        _ => ((160.0, 100.0), (380.0, 280.0)),
    };
    SizeConstraints {
        min: Vec2::new(min.0, min.1),
        max: Vec2::new(max.0, max.1),
    }
}

/// Computes every node's boxes at the origin; positioning moves them later.
pub struct SizingPhase;

impl LayoutPhase for SizingPhase {
    fn name(&self) -> &str {
        SIZING
    }

    fn dependencies(&self) -> &[&str] {
        &[HIERARCHY]
    }

    fn execute(&self, ctx: &LayoutContext) -> anyhow::Result<LayoutContext> {
        let mut next = ctx.clone();
        let measurer = ctx.measurer.clone();
        let spacing = ctx.options.spacing.clone();
        size_nodes(next.nodes_mut(), measurer.as_ref(), &spacing);
        Ok(next)
    }
}

struct LeafText {
    size: Vec2,
    label_height: f32,
    label_width: f32,
}

fn measure_leaf(node: &LayoutNode, measurer: &dyn TextMeasurer) -> LeafText {
    let source = &node.node;
    let constraints = constraints_for(source.kind);
    let wrap_width = constraints.max.x - 2.0 * TEXT_PADDING;

    let block = |text: &str, style: &TextStyle| -> (f32, f32) {
        wrap_text(measurer, text, style, wrap_width)
            .iter()
            .map(|line| measurer.measure(line, style))
            .fold((0.0f32, 0.0f32), |(w, h), size| (w.max(size.width), h + size.height))
    };

    let (label_width, label_height) = block(&source.label, &TextStyle::LABEL);
    let mut width = label_width;
    let mut height = label_height;

    if let Some(technology) = source.technology.as_deref().filter(|t| !t.is_empty()) {
        let (w, h) = block(&format!("[{technology}]"), &TextStyle::TECHNOLOGY);
        width = width.max(w);
        height += LINE_GAP + h;
    }
    if let Some(description) = source.description.as_deref().filter(|d| !d.is_empty()) {
        let (w, h) = block(description, &TextStyle::DESCRIPTION);
        width = width.max(w);
        height += LINE_GAP + h;
    }

    let natural = Vec2::new(width + 2.0 * TEXT_PADDING, height + 2.0 * TEXT_PADDING);
    LeafText {
        size: constraints.clamp(source.size.unwrap_or(natural)),
        label_height: label_height + TEXT_PADDING,
        label_width: label_width + 2.0 * TEXT_PADDING,
    }
}

/// Set the three boxes of a node of `size` anchored at the origin.
pub fn frame_at_origin(node: &mut LayoutNode, size: Vec2, label_height: f32) {
    let label_height = label_height.min(size.y);
    node.bbox = Rect::from_pos_size(Vec2::ZERO, size);
    node.label_box = Rect::from_pos_size(Vec2::ZERO, Vec2::new(size.x, label_height));
    node.content_box = Rect::from_min_max(Vec2::new(0.0, label_height), size);
}

/// Outer size of a container whose children occupy `inner`.
pub fn container_size(inner: Vec2, label_width: f32, spacing: &SpacingOptions) -> Vec2 {
    let pad = spacing.parent_child_padding;
    Vec2::new(
        (inner.x + 2.0 * pad).max(label_width + 2.0 * pad),
        inner.y + 2.0 * pad + spacing.label_buffer,
    )
}

pub fn size_nodes(
    nodes: &mut BTreeMap<NodeId, LayoutNode>,
    measurer: &dyn TextMeasurer,
    spacing: &SpacingOptions,
) {
    let mut order: Vec<(usize, NodeId)> = nodes
        .values()
        .map(|node| (node.depth, node.id.clone()))
        .collect();
    // children before parents
    order.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    for (_, id) in order {
        let Some(node) = nodes.get(&id) else {
            continue;
        };
        let text = measure_leaf(node, measurer);

        let child_sizes: Vec<Vec2> = if node.is_container() {
            node.children
                .iter()
                .filter_map(|child| nodes.get(child))
                .filter(|child| child.visible)
                .map(|child| child.bbox.size())
                .collect()
        } else {
            Vec::new()
        };

        let (size, label_height) = if child_sizes.is_empty() {
            (text.size, text.label_height)
        } else {
            let gap_x = spacing.horizontal.max(spacing.node_padding);
            let gap_y = spacing.vertical.max(spacing.node_padding);
            let inner = packed_size(&child_sizes, gap_x, gap_y);
            let outer = container_size(inner, text.label_width, spacing);
            let min = constraints_for(node.node.kind).min;
            (
                Vec2::new(outer.x.max(min.x), outer.y.max(min.y)),
                spacing.parent_child_padding + spacing.label_buffer,
            )
        };

        if let Some(node) = nodes.get_mut(&id) {
            frame_at_origin(node, size, label_height);
            node.metadata.label_height = text.label_height;
            node.metadata.label_width = text.label_width;
        }
    }
}
