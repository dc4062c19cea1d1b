//! Layout configuration.
//!
//! Every section carries documented defaults and deserializes with
//! `#[serde(default)]`, so partial JSON documents are valid option files.

use c4layout_core::{RouteKind, ViewLevel};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Positioning strategy applied to one sibling group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayoutStrategy {
    /// Row-major flow of equally sized cells.
    Grid,
    /// Primary systems in the middle, satellites on a ring around them.
    Radial,
    /// Sugiyama-style ranks with barycenter ordering.
    Layered,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyOptions {
    pub landscape: LayoutStrategy,
    pub context: LayoutStrategy,
    pub container: LayoutStrategy,
    pub component: LayoutStrategy,
}

impl Default for StrategyOptions {
    fn default() -> Self {
        Self {
            landscape: LayoutStrategy::Grid,
            context: LayoutStrategy::Radial,
            container: LayoutStrategy::Layered,
            component: LayoutStrategy::Layered,
        }
    }
}

impl StrategyOptions {
    pub fn for_level(&self, level: ViewLevel) -> LayoutStrategy {
        match level {
            ViewLevel::Landscape => self.landscape,
            ViewLevel::Context => self.context,
            ViewLevel::Container => self.container,
            ViewLevel::Component => self.component,
        }
    }
}

/// Individual passes of the optimization phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptimizationPass {
    OverlapRemoval,
    CrossHierarchy,
    Containment,
    GlobalOverlap,
    LabelPlacement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationOptions {
    pub enabled: bool,
    pub max_iterations: usize,
    /// Overlaps smaller than this many pixels are ignored.
    pub tolerance: f32,
    /// 0.0 pushes nodes apart by exactly the overlap, 1.0 by 1.5x the overlap.
    pub aggressiveness: f32,
    pub phases: Vec<OptimizationPass>,
}

impl Default for OptimizationOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            max_iterations: 50,
            tolerance: 0.5,
            aggressiveness: 0.5,
            phases: vec![
                OptimizationPass::OverlapRemoval,
                OptimizationPass::CrossHierarchy,
                OptimizationPass::Containment,
                OptimizationPass::GlobalOverlap,
                OptimizationPass::LabelPlacement,
            ],
        }
    }
}

impl OptimizationOptions {
    /// Upper bound on how far one push may exceed the overlap it resolves.
    pub const MAX_PUSH_FACTOR: f32 = 1.5;

    pub fn push_factor(&self) -> f32 {
        (1.0 + 0.5 * self.aggressiveness.clamp(0.0, 1.0)).min(Self::MAX_PUSH_FACTOR)
    }

    pub fn runs(&self, pass: OptimizationPass) -> bool {
        self.phases.contains(&pass)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeRoutingOptions {
    /// Route used when a relationship has no preference.
    pub default_route: RouteKind,
    /// Length of the straight stub leaving a port before the first bend.
    pub port_stub: f32,
    /// Clearance kept between routed segments and obstacle boxes.
    pub obstacle_margin: f32,
    /// Cost of reusing a busy node side, in pixels of extra travel.
    pub port_balance_weight: f32,
    pub minimize_crossings: bool,
    pub crossing_passes: usize,
    pub bundling: bool,
    pub bundle_threshold: usize,
    pub rounded_corners: bool,
    pub corner_radius: f32,
    /// Control point distance for curved routes, relative to endpoint distance.
    pub curvature: f32,
}

impl Default for EdgeRoutingOptions {
    fn default() -> Self {
        Self {
            default_route: RouteKind::Orthogonal,
            port_stub: 20.0,
            obstacle_margin: 10.0,
            port_balance_weight: 40.0,
            minimize_crossings: true,
            crossing_passes: 4,
            bundling: false,
            bundle_threshold: 3,
            rounded_corners: false,
            corner_radius: 8.0,
            curvature: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpacingOptions {
    /// Minimum clearance between sibling boxes.
    pub node_padding: f32,
    /// Inset between a container border and its children.
    pub parent_child_padding: f32,
    /// Extra band reserved at the top of containers for their label.
    pub label_buffer: f32,
    /// Gap between nodes inside a rank.
    pub horizontal: f32,
    /// Gap between ranks.
    pub vertical: f32,
    /// Clearance between the radial hub and its satellites.
    pub radial_gap: f32,
}

impl Default for SpacingOptions {
    fn default() -> Self {
        Self {
            node_padding: 40.0,
            parent_child_padding: 30.0,
            label_buffer: 30.0,
            horizontal: 80.0,
            vertical: 100.0,
            radial_gap: 120.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentOptions {
    /// Center every rank on the widest one.
    pub center_layers: bool,
    /// Honour `ViewState::snap_to_grid`.
    pub align_to_grid: bool,
}

impl Default for AlignmentOptions {
    fn default() -> Self {
        Self {
            center_layers: true,
            align_to_grid: true,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum Grade {
    #[default]
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    /// Minimum score required for the grade.
    pub fn threshold(self) -> f32 {
        match self {
            Grade::A => 90.0,
            Grade::B => 80.0,
            Grade::C => 70.0,
            Grade::D => 60.0,
            Grade::F => 0.0,
        }
    }

    pub fn from_score(score: f32) -> Grade {
        [Grade::A, Grade::B, Grade::C, Grade::D]
            .into_iter()
            .find(|grade| score >= grade.threshold())
            .unwrap_or(Grade::F)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityOptions {
    /// Grade that counts as good enough for early exit. `F` accepts any layout.
    pub target_grade: Grade,
    /// Escalate validation warnings into quality violations.
    pub strict_mode: bool,
    pub validate_constraints: bool,
    /// Report every missed metric target as a violation.
    pub enforce_metrics: bool,
    /// Stop running phases once the target grade is reached.
    pub early_exit: bool,
}

impl Default for QualityOptions {
    fn default() -> Self {
        Self {
            target_grade: Grade::A,
            strict_mode: false,
            validate_constraints: true,
            enforce_metrics: false,
            early_exit: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceOptions {
    pub max_nodes: usize,
    pub max_edges: usize,
    pub spatial_indexing: bool,
}

impl Default for PerformanceOptions {
    fn default() -> Self {
        Self {
            max_nodes: 500,
            max_edges: 1000,
            spatial_indexing: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugOptions {
    pub enabled: bool,
    pub save_intermediates: bool,
    pub show_metrics: bool,
    pub show_heatmap: bool,
    pub show_port_usage: bool,
    pub verbose_logging: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    pub strategies: StrategyOptions,
    pub optimization: OptimizationOptions,
    pub edge_routing: EdgeRoutingOptions,
    pub spacing: SpacingOptions,
    pub alignment: AlignmentOptions,
    pub quality: QualityOptions,
    pub performance: PerformanceOptions,
    pub debug: DebugOptions,
}

impl LayoutOptions {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read options {}: {e}", path.display()))?;
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let options = LayoutOptions::from_json_str(
            r#"{"spacing":{"node_padding":12.0},"quality":{"early_exit":true}}"#,
        )
        .expect("parse options");

        assert_eq!(options.spacing.node_padding, 12.0);
        assert_eq!(options.spacing.horizontal, SpacingOptions::default().horizontal);
        assert!(options.quality.early_exit);
        assert_eq!(options.quality.target_grade, Grade::A);
        assert!(options.optimization.enabled);
    }

    #[test]
    fn test_options_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"performance":{{"max_nodes":3}}}}"#).expect("write");

        let options = LayoutOptions::from_json_file(file.path()).expect("load options");
        assert_eq!(options.performance.max_nodes, 3);
        assert_eq!(options.performance.max_edges, 1000);
    }

    #[test]
    fn test_grade_thresholds() {
        assert_eq!(Grade::from_score(95.0), Grade::A);
        assert_eq!(Grade::from_score(90.0), Grade::A);
        assert_eq!(Grade::from_score(89.9), Grade::B);
        assert_eq!(Grade::from_score(70.0), Grade::C);
        assert_eq!(Grade::from_score(60.0), Grade::D);
        assert_eq!(Grade::from_score(59.9), Grade::F);
    }

    #[test]
    fn test_lenient_target_grades_parse() {
        let options = LayoutOptions::from_json_str(r#"{"quality":{"target_grade":"D"}}"#)
            .expect("parse options");
        assert_eq!(options.quality.target_grade, Grade::D);

        let options = LayoutOptions::from_json_str(r#"{"quality":{"target_grade":"F"}}"#)
            .expect("parse options");
        assert_eq!(options.quality.target_grade, Grade::F);
        assert_eq!(Grade::F.threshold(), 0.0);
        assert!(LayoutOptions::from_json_str(r#"{"quality":{"target_grade":"E"}}"#).is_err());
    }

    #[test]
    fn test_push_factor_is_bounded() {
        let mut options = OptimizationOptions::default();
        options.aggressiveness = 10.0;
        assert!(options.push_factor() <= OptimizationOptions::MAX_PUSH_FACTOR);
        options.aggressiveness = 0.0;
        assert_eq!(options.push_factor(), 1.0);
    }

    #[test]
    fn test_default_strategies_per_level() {
        let strategies = StrategyOptions::default();
        assert_eq!(strategies.for_level(ViewLevel::Landscape), LayoutStrategy::Grid);
        assert_eq!(strategies.for_level(ViewLevel::Context), LayoutStrategy::Radial);
        assert_eq!(strategies.for_level(ViewLevel::Container), LayoutStrategy::Layered);
        assert_eq!(strategies.for_level(ViewLevel::Component), LayoutStrategy::Layered);
    }
}
