use crate::context::{DebugInfo, LayoutContext, ValidationReport};
use crate::metrics::LayoutMetrics;
use crate::model::{LayoutEdge, LayoutNode};
use crate::quality::QualityScore;
use c4layout_core::{NodeId, Rect, Vec2};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Final output of one `layout()` call. Owned by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutResult {
    /// Visible nodes only.
    pub nodes: BTreeMap<NodeId, LayoutNode>,
    pub edges: Vec<LayoutEdge>,
    pub bounds: Rect,
    pub center: Vec2,
    pub metrics: LayoutMetrics,
    pub quality: QualityScore,
    pub validation: Option<ValidationReport>,
    pub debug: DebugInfo,
    pub timestamp: DateTime<Utc>,
}

impl LayoutResult {
    pub fn from_context(ctx: LayoutContext, metrics: LayoutMetrics, quality: QualityScore) -> Self {
        let bounds = ctx.bounds().unwrap_or(Rect::NOTHING);
        let nodes = ctx
            .nodes
            .iter()
            .filter(|(_, node)| node.visible)
            .map(|(id, node)| (id.clone(), node.clone()))
            .collect();

        Self {
            nodes,
            edges: ctx.edges.values().cloned().collect(),
            bounds,
            center: bounds.center(),
            metrics,
            quality,
            validation: ctx.validation.clone(),
            debug: (*ctx.debug).clone(),
            timestamp: Utc::now(),
        }
    }

    pub fn node(&self, id: &str) -> Option<&LayoutNode> {
        self.nodes.get(&NodeId::new(id))
    }

    pub fn edge(&self, id: &str) -> Option<&LayoutEdge> {
        self.edges.iter().find(|edge| edge.id.as_str() == id)
    }

    pub fn warnings(&self) -> &[String] {
        &self.debug.warnings
    }
}
