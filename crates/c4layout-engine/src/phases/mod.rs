//! The layout pipeline as a set of named phases.
//!
//! A phase receives the previous context by reference and returns the next
//! one. The orchestrator keeps the previous context alive so a failing phase
//! can fall back to it through [`LayoutPhase::rollback`].

pub mod edge_routing;
pub mod hierarchy;
pub mod optimization;
pub mod positioning;
pub mod sizing;
pub mod validation;

use crate::context::LayoutContext;

pub const HIERARCHY: &str = "hierarchy";
pub const SIZING: &str = "sizing";
pub const LAYOUT: &str = "layout";
pub const EDGE_ROUTING: &str = "edge-routing";
pub const OPTIMIZATION: &str = "optimization";
pub const VALIDATION: &str = "validation";

/// One step of the layout pipeline.
pub trait LayoutPhase: Send + Sync {
    /// Unique name, used for dependency resolution and reporting.
    fn name(&self) -> &str;

    /// Names of phases that must have run before this one.
    fn dependencies(&self) -> &[&str] {
        &[]
    }

    fn execute(&self, ctx: &LayoutContext) -> anyhow::Result<LayoutContext>;

    /// Context to continue with after `execute` failed, if the phase can recover.
    fn rollback(&self, _previous: &LayoutContext) -> Option<LayoutContext> {
        None
    }
}

/// The built-in pipeline, in declaration order.
pub fn default_phases() -> Vec<Box<dyn LayoutPhase>> {
    vec![
        Box::new(hierarchy::HierarchyPhase),
        Box::new(sizing::SizingPhase),
        Box::new(positioning::PositioningPhase),
        Box::new(edge_routing::EdgeRoutingPhase),
        Box::new(optimization::OptimizationPhase),
        Box::new(validation::ValidationPhase),
    ]
}
