use super::edge_routing::reroute;
use super::{EDGE_ROUTING, LAYOUT, LayoutPhase, OPTIMIZATION};
use crate::algorithms::overlap::{
    Separation, enforce_containment, fit_parents, force_separate, remove_sibling_overlaps,
    resolve_cross_hierarchy,
};
use crate::context::LayoutContext;
use crate::model::{LayoutEdge, LayoutNode};
use crate::options::OptimizationPass;
use c4layout_core::{NodeId, Rect, Vec2};
use std::collections::BTreeMap;

pub struct OptimizationPhase;

impl LayoutPhase for OptimizationPhase {
    fn name(&self) -> &str {
        OPTIMIZATION
    }

    fn dependencies(&self) -> &[&str] {
        &[LAYOUT, EDGE_ROUTING]
    }

    fn execute(&self, ctx: &LayoutContext) -> anyhow::Result<LayoutContext> {
        let mut next = ctx.clone();
        let options = ctx.options.clone();
        if !options.optimization.enabled {
            tracing::debug!("optimization disabled");
            return Ok(next);
        }

        let s = Separation::from_options(&options);
        let passes = &options.optimization;
        let before = boxes(&ctx.nodes);

        let nodes = next.nodes_mut();
        let mut report = Vec::new();
        if passes.runs(OptimizationPass::OverlapRemoval) {
            report.push(("overlap", remove_sibling_overlaps(nodes, &s)));
        }
        if passes.runs(OptimizationPass::CrossHierarchy) {
            report.push(("cross-hierarchy", resolve_cross_hierarchy(nodes, &s)));
        }
        if passes.runs(OptimizationPass::Containment) {
            report.push(("containment", enforce_containment(nodes, &s)));
        }
        if passes.runs(OptimizationPass::GlobalOverlap) {
            let moves = remove_sibling_overlaps(nodes, &s)
                + force_separate(nodes, &s)
                + fit_parents(nodes, &s);
            report.push(("global", moves));
        }
        for (pass, moves) in &report {
            tracing::debug!(pass, moves, "optimization pass");
        }

        if boxes(&next.nodes) != before {
            next.rebuild_spatial_index();
            reroute(&mut next);
        }
        if passes.runs(OptimizationPass::LabelPlacement) {
            let nodes = next.nodes.clone();
            for edge in next.edges_mut().values_mut() {
                place_label(edge, &nodes);
            }
        }
        Ok(next)
    }

    fn rollback(&self, previous: &LayoutContext) -> Option<LayoutContext> {
        Some(previous.clone())
    }
}

fn boxes(nodes: &BTreeMap<NodeId, LayoutNode>) -> Vec<Rect> {
    nodes.values().map(|node| node.bbox).collect()
}

/// Midpoint of the longest segment whose midpoint is not covered by an
/// unrelated node; falls back to the plain longest segment.
fn place_label(edge: &mut LayoutEdge, nodes: &BTreeMap<NodeId, LayoutNode>) {
    edge.recompute_metrics();
    if edge.relationship.label.is_empty() {
        return;
    }

    let mut candidates: Vec<(usize, f32, Vec2)> = edge
        .segments()
        .enumerate()
        .map(|(i, (a, b))| (i, a.distance(b), (a + b) * 0.5))
        .collect();
    candidates.sort_by(|x, y| y.1.total_cmp(&x.1).then(x.0.cmp(&y.0)));

    let covered = |point: Vec2| {
        nodes.values().any(|node| {
            node.visible
                && !node.is_container()
                && node.id != edge.source
                && node.id != edge.target
                && node.bbox.expand(-1.0).contains(point)
        })
    };
    if let Some((_, _, point)) = candidates.into_iter().find(|(_, _, point)| !covered(*point)) {
        edge.label_position = Some(point);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::MonospaceMeasurer;
    use crate::options::LayoutOptions;
    use c4layout_core::{C4Graph, C4Node, C4Relationship, NodeKind, ViewLevel, ViewState};
    use std::sync::Arc;

    fn context(options: LayoutOptions) -> LayoutContext {
        let mut graph = C4Graph::new();
        graph.add_node(C4Node::new("a", NodeKind::CONTAINER, "A"));
        graph.add_node(C4Node::new("b", NodeKind::CONTAINER, "B"));
        graph.add_relationship(C4Relationship::new("r", "a", "b").with_label("calls"));

        let mut ctx = LayoutContext::new(
            graph,
            ViewState::new(ViewLevel::Container),
            options,
            Arc::new(MonospaceMeasurer::default()),
        );
        let phases: [&dyn LayoutPhase; 4] = [
            &crate::phases::hierarchy::HierarchyPhase,
            &crate::phases::sizing::SizingPhase,
            &crate::phases::positioning::PositioningPhase,
            &crate::phases::edge_routing::EdgeRoutingPhase,
        ];
        for phase in phases {
            ctx = phase.execute(&ctx).unwrap_or_else(|e| panic!("{e}"));
        }
        ctx
    }

    fn overlap(ctx: &mut LayoutContext) {
        // drop b onto a
        let target = ctx.nodes[&NodeId::new("a")].bbox.min + Vec2::new(20.0, 20.0);
        if let Some(b) = ctx.nodes_mut().get_mut(&NodeId::new("b")) {
            let delta = target - b.bbox.min;
            b.translate(delta);
        }
        ctx.rebuild_spatial_index();
    }

    #[test]
    fn test_optimization_separates_and_reroutes() {
        let mut ctx = context(LayoutOptions::default());
        overlap(&mut ctx);

        let next = OptimizationPhase.execute(&ctx).unwrap_or_else(|e| panic!("{e}"));
        let a = next.nodes[&NodeId::new("a")].bbox;
        let b = next.nodes[&NodeId::new("b")].bbox;
        assert!(!a.overlaps(&b));
        let edge = &next.edges[&c4layout_core::EdgeId::new("r")];
        assert!(edge.is_routed());
        assert!(edge.label_position.is_some());
        // the input context is untouched
        assert!(ctx.nodes[&NodeId::new("a")].bbox.overlaps(&ctx.nodes[&NodeId::new("b")].bbox));
    }

    #[test]
    fn test_optimization_is_idempotent() {
        let ctx = context(LayoutOptions::default());
        let once = OptimizationPhase.execute(&ctx).unwrap_or_else(|e| panic!("{e}"));
        let twice = OptimizationPhase.execute(&once).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(boxes(&once.nodes), boxes(&twice.nodes));
    }

    #[test]
    fn test_disabled_optimization_moves_nothing() {
        let mut options = LayoutOptions::default();
        options.optimization.enabled = false;
        let mut ctx = context(options);
        overlap(&mut ctx);

        let next = OptimizationPhase.execute(&ctx).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(boxes(&next.nodes), boxes(&ctx.nodes));
    }
}
