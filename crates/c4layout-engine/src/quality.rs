//! Weighted multi-metric quality scoring.
//!
//! A score starts at 100. Every metric below its target costs a penalty
//! proportional to the shortfall, every violation costs a flat amount, and
//! fully achieved C4 metrics earn a small bonus. A single critical violation
//! caps the final score at [`CRITICAL_CAP`].

use crate::context::LayoutContext;
use crate::metrics::LayoutMetrics;
use crate::options::{Grade, QualityOptions, SpacingOptions};
use c4layout_core::{EdgeId, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MAX_SCORE: f32 = 100.0;
pub const CRITICAL_CAP: f32 = 60.0;
/// Per-metric penalty ceiling before the C4 multiplier.
pub const METRIC_PENALTY_CAP: f32 = 20.0;
pub const C4_MULTIPLIER: f32 = 1.5;
pub const C4_BONUS: f32 = 10.0;
/// Crossing violations together never cost more than this.
pub const CROSSING_PENALTY_CAP: f32 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    EdgeCrossings,
    NodeOverlaps,
    Containment,
    EdgeLength,
    Bends,
    MinSpacing,
    AspectRatio,
    ViewportUtilization,
    LabelClipping,
    PortCongestion,
    SemanticPositioning,
    TierSeparation,
    BoundaryClarity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Impact {
    Low,
    Medium,
    High,
}

impl Metric {
    pub const ALL: [Metric; 13] = [
        Metric::EdgeCrossings,
        Metric::NodeOverlaps,
        Metric::Containment,
        Metric::EdgeLength,
        Metric::Bends,
        Metric::MinSpacing,
        Metric::AspectRatio,
        Metric::ViewportUtilization,
        Metric::LabelClipping,
        Metric::PortCongestion,
        Metric::SemanticPositioning,
        Metric::TierSeparation,
        Metric::BoundaryClarity,
    ];

    pub fn weight(self) -> f32 {
        match self {
            Metric::EdgeCrossings | Metric::NodeOverlaps => 0.15,
            Metric::Containment | Metric::SemanticPositioning | Metric::TierSeparation => 0.10,
            _ => 0.05,
        }
    }

    /// Every metric value is normalized so that 1.0 is perfect.
    pub fn target(self) -> f32 {
        match self {
            Metric::NodeOverlaps | Metric::Containment | Metric::LabelClipping => 1.0,
            Metric::EdgeCrossings
            | Metric::MinSpacing
            | Metric::PortCongestion
            | Metric::TierSeparation
            | Metric::BoundaryClarity => 0.9,
            Metric::AspectRatio | Metric::SemanticPositioning => 0.8,
            Metric::EdgeLength => 0.7,
            Metric::Bends | Metric::ViewportUtilization => 0.6,
        }
    }

    pub fn impact(self) -> Impact {
        match self {
            Metric::EdgeCrossings
            | Metric::NodeOverlaps
            | Metric::Containment
            | Metric::SemanticPositioning
            | Metric::TierSeparation => Impact::High,
            Metric::EdgeLength
            | Metric::Bends
            | Metric::MinSpacing
            | Metric::LabelClipping
            | Metric::BoundaryClarity => Impact::Medium,
            Metric::AspectRatio
            | Metric::ViewportUtilization
            | Metric::PortCongestion => Impact::Low,
        }
    }

    pub fn is_c4(self) -> bool {
        matches!(
            self,
            Metric::SemanticPositioning | Metric::TierSeparation | Metric::BoundaryClarity
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::EdgeCrossings => "edge_crossings",
            Metric::NodeOverlaps => "node_overlaps",
            Metric::Containment => "containment",
            Metric::EdgeLength => "edge_length",
            Metric::Bends => "bends",
            Metric::MinSpacing => "min_spacing",
            Metric::AspectRatio => "aspect_ratio",
            Metric::ViewportUtilization => "viewport_utilization",
            Metric::LabelClipping => "label_clipping",
            Metric::PortCongestion => "port_congestion",
            Metric::SemanticPositioning => "semantic_positioning",
            Metric::TierSeparation => "tier_separation",
            Metric::BoundaryClarity => "boundary_clarity",
        }
    }

    fn advice(self) -> &'static str {
        match self {
            Metric::EdgeCrossings => "reorder nodes within ranks or enable more crossing passes",
            Metric::NodeOverlaps => "enable the overlap removal and global overlap passes",
            Metric::Containment => "enable containment enforcement",
            Metric::EdgeLength => "reduce spacing or switch to a layered strategy",
            Metric::Bends => "prefer direct or curved routes for long connections",
            Metric::MinSpacing => "increase node padding",
            Metric::AspectRatio => "use a grid strategy for wide or tall groups",
            Metric::ViewportUtilization => "reduce radial gap and spacing",
            Metric::LabelClipping => "shorten labels or raise maximum node sizes",
            Metric::PortCongestion => "raise the port balance weight",
            Metric::SemanticPositioning => "give key systems a higher layout priority",
            Metric::TierSeparation => "use a layered strategy so tiers stack vertically",
            Metric::BoundaryClarity => "increase parent/child padding or the label buffer",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricScore {
    pub value: f32,
    pub target: f32,
    pub weight: f32,
    pub achieved: bool,
    pub impact: Impact,
}

impl MetricScore {
    pub fn new(metric: Metric, value: f32) -> Self {
        let value = if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 };
        let target = metric.target();
        Self {
            value,
            target,
            weight: metric.weight(),
            achieved: value >= target - 1e-4,
            impact: metric.impact(),
        }
    }

    /// Score points lost to this metric.
    pub fn penalty(&self, metric: Metric) -> f32 {
        if self.achieved || self.target <= 0.0 {
            return 0.0;
        }
        let raw = (self.target - self.value) / self.target * self.weight * MAX_SCORE;
        let capped = raw.min(METRIC_PENALTY_CAP);
        if metric.is_c4() { capped * C4_MULTIPLIER } else { capped }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    Major,
    Minor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Overlap,
    Containment,
    Crossing,
    LabelClipping,
    PortCongestion,
    TierOrder,
    Spacing,
    Validation,
    MissedTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub severity: Severity,
    pub message: String,
    pub nodes: Vec<NodeId>,
    pub edges: Vec<EdgeId>,
    pub auto_fixable: bool,
    pub penalty: f32,
}

impl Violation {
    fn new(
        kind: ViolationKind,
        severity: Severity,
        penalty: f32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            auto_fixable: false,
            penalty,
        }
    }

    fn with_nodes(mut self, nodes: impl IntoIterator<Item = NodeId>) -> Self {
        self.nodes.extend(nodes);
        self
    }

    fn with_edges(mut self, edges: impl IntoIterator<Item = EdgeId>) -> Self {
        self.edges.extend(edges);
        self
    }

    fn fixable(mut self) -> Self {
        self.auto_fixable = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub metric: Metric,
    pub message: String,
    /// Score points recovered if the metric reaches its target.
    pub expected_gain: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    pub grade: Grade,
    pub score: f32,
    pub metrics: BTreeMap<Metric, MetricScore>,
    pub violations: Vec<Violation>,
    /// Highest expected gain first.
    pub recommendations: Vec<Recommendation>,
}

impl QualityScore {
    pub fn meets(&self, target: Grade) -> bool {
        self.score >= target.threshold()
    }

    pub fn has_critical(&self) -> bool {
        self.violations
            .iter()
            .any(|violation| violation.severity == Severity::Critical)
    }
}

pub struct QualityEvaluator {
    quality: QualityOptions,
    spacing: SpacingOptions,
}

impl QualityEvaluator {
    pub fn new(quality: QualityOptions, spacing: SpacingOptions) -> Self {
        Self { quality, spacing }
    }

    pub fn from_context(ctx: &LayoutContext) -> Self {
        Self::new(ctx.options.quality.clone(), ctx.options.spacing.clone())
    }

    /// Score the context's current state.
    ///
    /// Validation warnings are taken from the context's validation report,
    /// so strict mode only escalates once validation has run.
    pub fn evaluate(&self, ctx: &LayoutContext) -> QualityScore {
        let metrics = LayoutMetrics::from_context(ctx);
        let scores = self.measure(&metrics);
        let mut violations = self.violations(ctx);

        if self.quality.strict_mode {
            let warnings = ctx.validation.iter().flat_map(|report| report.warnings.iter());
            violations.extend(warnings.map(|w| {
                Violation::new(ViolationKind::Validation, Severity::Major, 5.0, w.clone())
            }));
        }
        if self.quality.enforce_metrics {
            violations.extend(scores.iter().filter(|(_, s)| !s.achieved).map(|(metric, s)| {
                Violation::new(
                    ViolationKind::MissedTarget,
                    Severity::Minor,
                    2.0,
                    format!("{} is {:.2}, target {:.2}", metric.as_str(), s.value, s.target),
                )
            }));
        }

        Self::score(scores, violations)
    }

    /// Normalize raw layout statistics into per-metric scores in `0.0..=1.0`.
    pub fn measure(&self, m: &LayoutMetrics) -> BTreeMap<Metric, MetricScore> {
        let per = |bad: usize, total: usize| {
            if total == 0 { 1.0 } else { 1.0 - bad as f32 / total as f32 }
        };

        let reference_length = 3.0 * m.avg_node_size + self.spacing.horizontal;
        let edge_length = if m.avg_edge_length <= reference_length || m.avg_edge_length <= 0.0 {
            1.0
        } else {
            reference_length / m.avg_edge_length
        };

        let min_spacing = match m.min_spacing {
            Some(gap) if self.spacing.node_padding > 0.0 => gap / self.spacing.node_padding,
            _ => 1.0,
        };

        let aspect = if (0.5..=2.0).contains(&m.aspect_ratio) {
            1.0
        } else {
            m.aspect_ratio.min(1.0 / m.aspect_ratio.max(f32::EPSILON)) * 2.0
        };

        let values = [
            (Metric::EdgeCrossings, per(m.crossings, m.edge_count.max(1))),
            (Metric::NodeOverlaps, per(m.overlaps, m.visible_nodes)),
            (Metric::Containment, per(m.containment_violations, m.nested_nodes)),
            (Metric::EdgeLength, edge_length),
            (Metric::Bends, 1.0 / (1.0 + 0.25 * m.avg_bends)),
            (Metric::MinSpacing, min_spacing),
            (Metric::AspectRatio, aspect),
            // a quarter of the canvas covered by leaves is considered full use
            (Metric::ViewportUtilization, m.compactness / 0.25),
            (Metric::LabelClipping, per(m.clipped_labels, m.visible_nodes)),
            (Metric::PortCongestion, per(m.congested_sides, m.used_sides)),
            (Metric::SemanticPositioning, m.rank_compliance()),
            (Metric::TierSeparation, m.tier_compliance()),
            (Metric::BoundaryClarity, m.boundary_clarity()),
        ];
        values
            .into_iter()
            .map(|(metric, value)| (metric, MetricScore::new(metric, value)))
            .collect()
    }

    /// Structural violations found in the current layout.
    pub fn violations(&self, ctx: &LayoutContext) -> Vec<Violation> {
        use crate::analysis;

        let nodes = &ctx.nodes;
        let spacing = &self.spacing;
        let mut out = Vec::new();

        for (a, b) in analysis::overlapping_pairs(nodes) {
            out.push(
                Violation::new(
                    ViolationKind::Overlap,
                    Severity::Critical,
                    25.0,
                    format!("{a} overlaps {b}"),
                )
                    .with_nodes([a, b])
                    .fixable(),
            );
        }
        let (padding, buffer) = (spacing.parent_child_padding, spacing.label_buffer);
        for id in analysis::containment_violations(nodes, padding, buffer) {
            out.push(
                Violation::new(
                    ViolationKind::Containment,
                    Severity::Critical,
                    30.0,
                    format!("{id} leaves its parent"),
                )
                .with_nodes([id])
                .fixable(),
            );
        }

        let mut crossing_budget = CROSSING_PENALTY_CAP;
        for (a, b) in analysis::edge_crossings(&ctx.edges) {
            let penalty = crossing_budget.min(2.0);
            crossing_budget -= penalty;
            out.push(
                Violation::new(
                    ViolationKind::Crossing,
                    Severity::Minor,
                    penalty,
                    format!("{a} crosses {b}"),
                )
                    .with_edges([a, b]),
            );
        }

        for id in analysis::clipped_labels(nodes) {
            out.push(
                Violation::new(
                    ViolationKind::LabelClipping,
                    Severity::Minor,
                    5.0,
                    format!("label of {id} is clipped"),
                )
                    .with_nodes([id]),
            );
        }
        let (congested, _) = analysis::congested_sides(nodes, &ctx.edges);
        for (id, side) in congested {
            out.push(
                Violation::new(
                    ViolationKind::PortCongestion,
                    Severity::Minor,
                    3.0,
                    format!("{} side of {id} is congested", side.as_str()),
                )
                .with_nodes([id]),
            );
        }

        let (compliant, total) = analysis::tier_order(nodes);
        if compliant < total {
            out.push(Violation::new(
                ViolationKind::TierOrder,
                Severity::Major,
                5.0,
                format!("{} of {total} sibling pairs break the tier order", total - compliant),
            ));
        }
        if let Some(gap) = analysis::min_sibling_gap(nodes) {
            if gap < spacing.node_padding * 0.5 {
                out.push(
                    Violation::new(
                        ViolationKind::Spacing,
                        Severity::Minor,
                        3.0,
                        format!("closest siblings are {gap:.1}px apart"),
                    )
                    .fixable(),
                );
            }
        }
        out
    }

    /// Combine metric scores and violations into a final score and grade.
    pub fn score(
        metrics: BTreeMap<Metric, MetricScore>,
        violations: Vec<Violation>,
    ) -> QualityScore {
        let metric_penalty: f32 = metrics.iter().map(|(metric, s)| s.penalty(*metric)).sum();
        let violation_penalty: f32 = violations.iter().map(|v| v.penalty).sum();
        let c4_metrics = Metric::ALL.iter().filter(|m| m.is_c4()).count() as f32;
        let bonus: f32 = metrics
            .iter()
            .filter(|(metric, s)| metric.is_c4() && s.achieved)
            .map(|_| C4_BONUS / c4_metrics)
            .sum();

        let mut score =
            (MAX_SCORE - metric_penalty - violation_penalty + bonus).clamp(0.0, MAX_SCORE);
        if violations.iter().any(|v| v.severity == Severity::Critical) {
            score = score.min(CRITICAL_CAP);
        }

        let mut recommendations: Vec<Recommendation> = metrics
            .iter()
            .filter(|(_, s)| !s.achieved)
            .map(|(metric, s)| Recommendation {
                metric: *metric,
                message: format!(
                    "{}: {:.2} of {:.2}; {}",
                    metric.as_str(),
                    s.value,
                    s.target,
                    metric.advice()
                ),
                expected_gain: s.penalty(*metric),
            })
            .collect();
        recommendations.sort_by(|a, b| {
            b.expected_gain
                .total_cmp(&a.expected_gain)
                .then(a.metric.cmp(&b.metric))
        });

        QualityScore {
            grade: Grade::from_score(score),
            score,
            metrics,
            violations,
            recommendations,
        }
    }
}
