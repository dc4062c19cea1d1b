use super::edge_routing::reroute;
use super::{EDGE_ROUTING, LAYOUT, LayoutPhase, VALIDATION};
use crate::algorithms::overlap::{Separation, fit_parents, force_separate, remove_sibling_overlaps};
use crate::analysis::{containment_violations, edge_crossings, overlapping_pairs, tier_order};
use crate::context::{LayoutContext, ValidationReport};
use crate::model::{LayoutEdge, LayoutNode};
use c4layout_core::{EdgeId, NodeId};
use std::collections::BTreeMap;

/// Safety-net overlap removal followed by read-only checks.
///
/// Findings are recorded as warnings; this phase never fails on them.
pub struct ValidationPhase;

impl LayoutPhase for ValidationPhase {
    fn name(&self) -> &str {
        VALIDATION
    }

    fn dependencies(&self) -> &[&str] {
        &[LAYOUT, EDGE_ROUTING]
    }

    fn execute(&self, ctx: &LayoutContext) -> anyhow::Result<LayoutContext> {
        let mut next = ctx.clone();
        let options = ctx.options.clone();

        let s = Separation::from_options(&options);
        let nodes = next.nodes_mut();
        let moved = remove_sibling_overlaps(nodes, &s)
            + force_separate(nodes, &s)
            + fit_parents(nodes, &s);
        if moved > 0 {
            tracing::debug!(moved, "validation safety net moved nodes");
            next.rebuild_spatial_index();
            reroute(&mut next);
        }

        if !options.quality.validate_constraints {
            return Ok(next);
        }

        let report = validate(
            &next.nodes,
            &next.edges,
            s.parent_child_padding,
            s.label_buffer,
        );
        for warning in report.warnings.clone() {
            next.warn(warning);
        }
        next.validation = Some(report);
        Ok(next)
    }
}

pub fn validate(
    nodes: &BTreeMap<NodeId, LayoutNode>,
    edges: &BTreeMap<EdgeId, LayoutEdge>,
    padding: f32,
    label_buffer: f32,
) -> ValidationReport {
    let containment = containment_violations(nodes, padding, label_buffer);
    let overlaps = overlapping_pairs(nodes);
    let crossings = edge_crossings(edges);
    let (compliant, total) = tier_order(nodes);
    let tier_compliance = if total == 0 {
        1.0
    } else {
        compliant as f32 / total as f32
    };

    let mut warnings = Vec::new();
    for id in &containment {
        warnings.push(format!("containment: {id} extends outside its parent"));
    }
    for (a, b) in &overlaps {
        warnings.push(format!("overlap: {a} and {b} overlap"));
    }
    if !crossings.is_empty() {
        warnings.push(format!("crossings: {} edge crossings", crossings.len()));
    }
    if tier_compliance < 1.0 {
        warnings.push(format!(
            "tiers: {compliant} of {total} sibling pairs follow the tier order ({:.0}%)",
            tier_compliance * 100.0
        ));
    }

    ValidationReport {
        containment_violations: containment,
        overlaps,
        crossings,
        tier_compliance,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::MonospaceMeasurer;
    use crate::options::LayoutOptions;
    use c4layout_core::{C4Graph, C4Node, NodeKind, Rect, Vec2, ViewLevel, ViewState};
    use std::sync::Arc;

    fn node(id: &str, kind: NodeKind, x: f32, y: f32) -> LayoutNode {
        let mut node = LayoutNode::new(C4Node::new(id, kind, id));
        node.metadata.semantic = crate::classifier::classify(&node.node);
        node.bbox = Rect::from_pos_size(Vec2::new(x, y), Vec2::new(100.0, 80.0));
        node
    }

    #[test]
    fn test_report_flags_inverted_tiers() {
        let nodes: BTreeMap<NodeId, LayoutNode> = [
            node("db", NodeKind::DATABASE, 0.0, 0.0),
            node("user", NodeKind::PERSON, 0.0, 300.0),
        ]
        .into_iter()
        .map(|n| (n.id.clone(), n))
        .collect();

        let report = validate(&nodes, &BTreeMap::new(), 30.0, 30.0);
        assert_eq!(report.tier_compliance, 0.0);
        assert!(report.overlaps.is_empty());
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_clean_layout_has_no_warnings() {
        let nodes: BTreeMap<NodeId, LayoutNode> = [
            node("user", NodeKind::PERSON, 0.0, 0.0),
            node("db", NodeKind::DATABASE, 0.0, 300.0),
        ]
        .into_iter()
        .map(|n| (n.id.clone(), n))
        .collect();

        let report = validate(&nodes, &BTreeMap::new(), 30.0, 30.0);
        assert!(report.is_clean());
        assert!(report.warnings.is_empty());
    }

    fn inverted_context(validate_constraints: bool) -> LayoutContext {
        let mut options = LayoutOptions::default();
        options.quality.validate_constraints = validate_constraints;
        let mut ctx = LayoutContext::new(
            C4Graph::new(),
            ViewState::new(ViewLevel::Container),
            options,
            Arc::new(MonospaceMeasurer::default()),
        );
        for n in [
            node("db", NodeKind::DATABASE, 0.0, 0.0),
            node("user", NodeKind::PERSON, 0.0, 300.0),
        ] {
            ctx.nodes_mut().insert(n.id.clone(), n);
        }
        ctx
    }

    #[test]
    fn test_phase_records_report_and_warnings() {
        let ctx = inverted_context(true);
        let next = ValidationPhase.execute(&ctx).unwrap_or_else(|e| panic!("{e}"));
        let report = next.validation.as_ref().unwrap_or_else(|| panic!("missing report"));
        assert_eq!(report.tier_compliance, 0.0);
        assert_eq!(next.debug.warnings, report.warnings);
    }

    #[test]
    fn test_disabled_constraint_checks_skip_the_report() {
        let ctx = inverted_context(false);
        let next = ValidationPhase.execute(&ctx).unwrap_or_else(|e| panic!("{e}"));
        assert!(next.validation.is_none());
        assert!(next.debug.warnings.is_empty());
        // the safety net still ran and found nothing to move
        assert_eq!(
            next.nodes[&NodeId::new("db")].bbox,
            ctx.nodes[&NodeId::new("db")].bbox
        );
    }
}
