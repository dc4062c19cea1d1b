//! Pipeline state threaded through every phase.
//!
//! Phases never mutate the context they receive. They clone it (every heavy
//! field is behind an `Arc`) and write through the `*_mut` accessors, which
//! copy a shared map only when it is actually modified.

use crate::measure::TextMeasurer;
use crate::model::{LayoutEdge, LayoutNode, PortSide};
use crate::options::LayoutOptions;
use crate::quality::QualityScore;
use crate::spatial::QuadTree;
use c4layout_core::{C4Graph, EdgeId, NodeId, Rect, Vec2, ViewState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhaseState {
    Pending,
    Running,
    Completed,
    Skipped,
    RolledBack,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRun {
    pub name: String,
    pub state: PhaseState,
    pub duration_ms: f64,
}

/// Node boxes captured after a phase when `debug.save_intermediates` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub phase: String,
    pub boxes: BTreeMap<NodeId, Rect>,
}

/// Coarse occupancy grid over the final layout bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heatmap {
    pub origin: Vec2,
    pub cell_size: f32,
    pub columns: usize,
    pub rows: usize,
    /// Row-major count of node boxes and edge points per cell.
    pub cells: Vec<u32>,
}

impl Heatmap {
    pub const MAX_CELLS_PER_AXIS: usize = 32;

    pub fn build(bounds: Rect, nodes: &[Rect], points: &[Vec2]) -> Self {
        let extent = bounds.width().max(bounds.height()).max(1.0);
        let cell_size = (extent / Self::MAX_CELLS_PER_AXIS as f32).max(1.0);
        let cells_along = |length: f32| {
            ((length / cell_size).ceil() as usize).clamp(1, Self::MAX_CELLS_PER_AXIS)
        };
        let columns = cells_along(bounds.width());
        let rows = cells_along(bounds.height());
        let mut cells = vec![0u32; columns * rows];

        let cell_of = |p: Vec2| -> (usize, usize) {
            let cx = ((p.x - bounds.min.x) / cell_size).floor().max(0.0) as usize;
            let cy = ((p.y - bounds.min.y) / cell_size).floor().max(0.0) as usize;
            (cx.min(columns - 1), cy.min(rows - 1))
        };

        for rect in nodes {
            let (x0, y0) = cell_of(rect.min);
            let (x1, y1) = cell_of(rect.max);
            for y in y0..=y1 {
                for x in x0..=x1 {
                    cells[y * columns + x] += 1;
                }
            }
        }
        for point in points {
            let (x, y) = cell_of(*point);
            cells[y * columns + x] += 1;
        }

        Self {
            origin: bounds.min,
            cell_size,
            columns,
            rows,
            cells,
        }
    }

    pub fn hottest(&self) -> u32 {
        self.cells.iter().copied().max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebugInfo {
    pub phases: Vec<PhaseRun>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub snapshots: Vec<Snapshot>,
    pub heatmap: Option<Heatmap>,
    pub port_usage: BTreeMap<NodeId, BTreeMap<PortSide, usize>>,
}

impl DebugInfo {
    pub fn phase_state(&self, name: &str) -> Option<PhaseState> {
        self.phases
            .iter()
            .rev()
            .find(|run| run.name == name)
            .map(|run| run.state)
    }
}

/// Findings of the validation phase. Never fatal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub containment_violations: Vec<NodeId>,
    pub overlaps: Vec<(NodeId, NodeId)>,
    pub crossings: Vec<(EdgeId, EdgeId)>,
    /// Share of differently tiered sibling pairs in the expected vertical order.
    pub tier_compliance: f32,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.containment_violations.is_empty() && self.overlaps.is_empty()
    }
}

#[derive(Clone)]
pub struct LayoutContext {
    pub graph: Arc<C4Graph>,
    pub view: Arc<ViewState>,
    pub options: Arc<LayoutOptions>,
    pub nodes: Arc<BTreeMap<NodeId, LayoutNode>>,
    pub edges: Arc<BTreeMap<EdgeId, LayoutEdge>>,
    pub spatial: Arc<QuadTree>,
    pub measurer: Arc<dyn TextMeasurer>,
    pub quality: Option<QualityScore>,
    pub validation: Option<ValidationReport>,
    pub debug: Arc<DebugInfo>,
    /// Set once node boxes carry final coordinates.
    pub positioned: bool,
    /// Set once every edge has a route.
    pub routed: bool,
}

impl std::fmt::Debug for LayoutContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutContext")
            .field("nodes", &self.nodes.len())
            .field("edges", &self.edges.len())
            .field("positioned", &self.positioned)
            .field("routed", &self.routed)
            .finish_non_exhaustive()
    }
}

impl LayoutContext {
    pub fn new(
        graph: C4Graph,
        view: ViewState,
        options: LayoutOptions,
        measurer: Arc<dyn TextMeasurer>,
    ) -> Self {
        Self {
            graph: Arc::new(graph),
            view: Arc::new(view),
            options: Arc::new(options),
            nodes: Arc::new(BTreeMap::new()),
            edges: Arc::new(BTreeMap::new()),
            spatial: Arc::new(QuadTree::default()),
            measurer,
            quality: None,
            validation: None,
            debug: Arc::new(DebugInfo::default()),
            positioned: false,
            routed: false,
        }
    }

    pub fn nodes_mut(&mut self) -> &mut BTreeMap<NodeId, LayoutNode> {
        Arc::make_mut(&mut self.nodes)
    }

    pub fn edges_mut(&mut self) -> &mut BTreeMap<EdgeId, LayoutEdge> {
        Arc::make_mut(&mut self.edges)
    }

    pub fn debug_mut(&mut self) -> &mut DebugInfo {
        Arc::make_mut(&mut self.debug)
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(warning = %message, "layout warning");
        self.debug_mut().warnings.push(message);
    }

    pub fn visible_nodes(&self) -> impl Iterator<Item = &LayoutNode> {
        self.nodes.values().filter(|node| node.visible)
    }

    /// Rebuild the spatial index from the current visible node boxes.
    pub fn rebuild_spatial_index(&mut self) {
        let items: Vec<(NodeId, Rect)> = self
            .visible_nodes()
            .map(|node| (node.id.clone(), node.bbox))
            .collect();
        self.spatial = Arc::new(QuadTree::from_rects(items));
    }

    /// Bounding box of every visible node, `None` for an empty layout.
    pub fn bounds(&self) -> Option<Rect> {
        Rect::bounding(self.visible_nodes().map(|node| &node.bbox))
    }

    pub fn snapshot(&mut self, phase: &str) {
        let boxes = self
            .nodes
            .iter()
            .map(|(id, node)| (id.clone(), node.bbox))
            .collect();
        self.debug_mut().snapshots.push(Snapshot {
            phase: phase.to_string(),
            boxes,
        });
    }
}

/// Ancestors of `id`, nearest first.
pub fn ancestors(nodes: &BTreeMap<NodeId, LayoutNode>, id: &NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut current = nodes.get(id).and_then(|node| node.parent.clone());
    while let Some(parent) = current {
        if out.contains(&parent) {
            break;
        }
        current = nodes.get(&parent).and_then(|node| node.parent.clone());
        out.push(parent);
    }
    out
}

pub fn is_ancestor(nodes: &BTreeMap<NodeId, LayoutNode>, ancestor: &NodeId, id: &NodeId) -> bool {
    ancestors(nodes, id).contains(ancestor)
}

/// Either node contains the other.
pub fn related(nodes: &BTreeMap<NodeId, LayoutNode>, a: &NodeId, b: &NodeId) -> bool {
    is_ancestor(nodes, a, b) || is_ancestor(nodes, b, a)
}

/// `id` followed by all of its descendants in depth-first order.
pub fn subtree(nodes: &BTreeMap<NodeId, LayoutNode>, id: &NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack = vec![id.clone()];
    while let Some(current) = stack.pop() {
        if let Some(node) = nodes.get(&current) {
            stack.extend(node.children.iter().rev().cloned());
        }
        out.push(current);
    }
    out
}

pub fn translate_subtree(nodes: &mut BTreeMap<NodeId, LayoutNode>, id: &NodeId, delta: Vec2) {
    for member in subtree(nodes, id) {
        if let Some(node) = nodes.get_mut(&member) {
            node.translate(delta);
        }
    }
}

/// The two distinct siblings under the lowest common ancestor of `a` and `b`.
///
/// Returns `None` when one node contains the other.
pub fn sibling_ancestors(
    nodes: &BTreeMap<NodeId, LayoutNode>,
    a: &NodeId,
    b: &NodeId,
) -> Option<(NodeId, NodeId)> {
    let mut chain_a = ancestors(nodes, a);
    chain_a.reverse();
    chain_a.push(a.clone());
    let mut chain_b = ancestors(nodes, b);
    chain_b.reverse();
    chain_b.push(b.clone());

    let shared = chain_a
        .iter()
        .zip(chain_b.iter())
        .take_while(|(x, y)| x == y)
        .count();

    match (chain_a.get(shared), chain_b.get(shared)) {
        (Some(x), Some(y)) => Some((x.clone(), y.clone())),
        _ => None,
    }
}

/// Visible nodes grouped by parent (`None` for roots), deepest groups first.
pub fn sibling_groups_bottom_up(
    nodes: &BTreeMap<NodeId, LayoutNode>,
) -> Vec<(Option<NodeId>, Vec<NodeId>)> {
    let mut groups: BTreeMap<Option<NodeId>, Vec<NodeId>> = BTreeMap::new();
    for node in nodes.values().filter(|node| node.visible) {
        groups.entry(node.parent.clone()).or_default().push(node.id.clone());
    }

    let depth_of = |parent: &Option<NodeId>| -> usize {
        parent
            .as_ref()
            .and_then(|id| nodes.get(id))
            .map(|node| node.depth + 1)
            .unwrap_or(0)
    };

    let mut ordered: Vec<(Option<NodeId>, Vec<NodeId>)> = groups.into_iter().collect();
    ordered.sort_by(|(pa, _), (pb, _)| depth_of(pb).cmp(&depth_of(pa)).then_with(|| pa.cmp(pb)));
    ordered
}
