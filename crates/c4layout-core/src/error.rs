use crate::{EdgeId, NodeId};
use thiserror::Error;

/// Failures that prevent a layout result from being produced at all.
///
/// Quality problems (overlaps, crossings, tier order) are never errors; they are
/// reported as warnings and quality violations on the result instead.
#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("graph has no nodes")]
    EmptyGraph,

    #[error("relationship {relationship} references unknown node {endpoint}")]
    DanglingRelationship {
        relationship: EdgeId,
        endpoint: NodeId,
    },

    #[error("node {node} has a non-finite {field}")]
    NonFiniteGeometry { node: NodeId, field: &'static str },

    #[error("phase {phase} depends on unregistered phase {dependency}")]
    MissingDependency { phase: String, dependency: String },

    #[error("phase dependencies form a cycle: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    #[error("phase {phase} failed")]
    PhaseFailed {
        phase: String,
        #[source]
        source: anyhow::Error,
    },
}

impl LayoutError {
    /// Input validation errors are raised before any phase runs.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            LayoutError::EmptyGraph
                | LayoutError::DanglingRelationship { .. }
                | LayoutError::NonFiniteGeometry { .. }
        )
    }

    /// Render the error together with its source chain on a single line.
    pub fn describe(&self) -> String {
        match self {
            LayoutError::PhaseFailed { phase, source } => {
                format!("phase {phase} failed: {source:#}")
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_failed_describe_includes_source_chain() {
        let err = LayoutError::PhaseFailed {
            phase: "sizing".to_string(),
            source: anyhow::anyhow!("measurer unavailable").context("sizing leaf nodes"),
        };

        let text = err.describe();
        assert!(text.contains("sizing"));
        assert!(text.contains("measurer unavailable"));
        assert!(!err.is_input_error());
    }

    #[test]
    fn test_cycle_message_lists_phases() {
        let err = LayoutError::DependencyCycle(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(err.to_string(), "phase dependencies form a cycle: a -> b -> a");
    }
}
