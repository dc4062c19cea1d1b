//! C4 diagram layout engine.
//!
//! Turns a [`C4Graph`](c4layout_core::C4Graph) into positioned, sized and
//! routed nodes and edges by running a pipeline of [`LayoutPhase`]s, then
//! scores the result with the [`QualityEvaluator`].

pub mod algorithms;
pub mod analysis;
pub mod classifier;
pub mod context;
pub mod engine;
pub mod measure;
pub mod metrics;
pub mod model;
pub mod options;
pub mod phases;
pub mod quality;
pub mod result;
pub mod spatial;

pub use classifier::{SemanticInfo, classify};
pub use context::{DebugInfo, LayoutContext, PhaseRun, PhaseState, ValidationReport};
pub use engine::{LayoutEngine, LayoutProgress};
pub use measure::{MonospaceMeasurer, TextMeasurer, TextSize, TextStyle};
pub use metrics::LayoutMetrics;
pub use model::{LayoutEdge, LayoutNode, Port, PortSide, SegmentType};
pub use options::{Grade, LayoutOptions, LayoutStrategy};
pub use phases::LayoutPhase;
pub use quality::{Metric, QualityEvaluator, QualityScore, Severity, Violation};
pub use result::LayoutResult;
pub use spatial::QuadTree;
