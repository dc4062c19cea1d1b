//! Phase orchestration.
//!
//! Phases are kept in registration order and executed in a dependency
//! respecting order. Each phase gets the previous context by reference, so
//! a failed phase can hand control back to its rollback routine with the
//! untouched pre-phase state.

use crate::context::{Heatmap, LayoutContext, PhaseRun, PhaseState};
use crate::measure::{MonospaceMeasurer, TextMeasurer};
use crate::metrics::LayoutMetrics;
use crate::options::LayoutOptions;
use crate::phases::{LayoutPhase, default_phases};
use crate::quality::QualityEvaluator;
use crate::result::LayoutResult;
use c4layout_core::{C4Graph, LayoutError, Rect, Vec2, ViewState};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Reported to the progress callback before and after every phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutProgress {
    pub phase: String,
    /// Position in the execution order, starting at 0.
    pub index: usize,
    pub total: usize,
    pub state: PhaseState,
}

pub struct LayoutEngine {
    phases: Vec<Box<dyn LayoutPhase>>,
    options: LayoutOptions,
    measurer: Arc<dyn TextMeasurer>,
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutEngine {
    pub fn new() -> Self {
        Self::with_phases(default_phases())
    }

    pub fn with_phases(phases: Vec<Box<dyn LayoutPhase>>) -> Self {
        let mut engine = Self {
            phases: Vec::new(),
            options: LayoutOptions::default(),
            measurer: Arc::new(MonospaceMeasurer::default()),
        };
        for phase in phases {
            engine.add_phase(phase);
        }
        engine
    }

    pub fn with_options(mut self, options: LayoutOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_measurer(mut self, measurer: Arc<dyn TextMeasurer>) -> Self {
        self.measurer = measurer;
        self
    }

    pub fn options(&self) -> &LayoutOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: LayoutOptions) {
        self.options = options;
    }

    /// Register a phase.
    ///
    /// # Panics
    ///
    /// Panics when a phase with the same name is already registered.
    pub fn add_phase(&mut self, phase: Box<dyn LayoutPhase>) {
        assert!(
            self.get_phase(phase.name()).is_none(),
            "layout phase {} is already registered",
            phase.name()
        );
        self.phases.push(phase);
    }

    pub fn remove_phase(&mut self, name: &str) -> Option<Box<dyn LayoutPhase>> {
        let index = self.phases.iter().position(|phase| phase.name() == name)?;
        Some(self.phases.remove(index))
    }

    pub fn get_phase(&self, name: &str) -> Option<&dyn LayoutPhase> {
        self.phases
            .iter()
            .find(|phase| phase.name() == name)
            .map(|phase| phase.as_ref())
    }

    /// Registered phase names in registration order.
    pub fn list_phases(&self) -> Vec<&str> {
        self.phases.iter().map(|phase| phase.name()).collect()
    }

    /// Phase names in the order `layout` runs them.
    pub fn execution_order(&self) -> Result<Vec<&str>, LayoutError> {
        Ok(self
            .resolve_order()?
            .into_iter()
            .map(|i| self.phases[i].name())
            .collect())
    }

    /// Kahn's algorithm; among ready phases the earliest registered runs first.
    fn resolve_order(&self) -> Result<Vec<usize>, LayoutError> {
        let index: HashMap<&str, usize> = self
            .phases
            .iter()
            .enumerate()
            .map(|(i, phase)| (phase.name(), i))
            .collect();

        let mut deps: Vec<Vec<usize>> = Vec::with_capacity(self.phases.len());
        for phase in &self.phases {
            let mut resolved = Vec::new();
            for dependency in phase.dependencies() {
                let Some(&i) = index.get(dependency) else {
                    return Err(LayoutError::MissingDependency {
                        phase: phase.name().to_string(),
                        dependency: dependency.to_string(),
                    });
                };
                resolved.push(i);
            }
            deps.push(resolved);
        }

        let mut done = vec![false; self.phases.len()];
        let mut order = Vec::with_capacity(self.phases.len());
        while order.len() < self.phases.len() {
            let ready = (0..self.phases.len())
                .find(|&i| !done[i] && deps[i].iter().all(|&d| done[d]));
            match ready {
                Some(i) => {
                    done[i] = true;
                    order.push(i);
                }
                None => return Err(LayoutError::DependencyCycle(self.find_cycle(&deps, &done))),
            }
        }
        Ok(order)
    }

    /// Follow unresolved dependencies from the first blocked phase until one repeats.
    fn find_cycle(&self, deps: &[Vec<usize>], done: &[bool]) -> Vec<String> {
        let mut path: Vec<usize> = Vec::new();
        let mut current = done.iter().position(|d| !d);
        while let Some(i) = current {
            if let Some(start) = path.iter().position(|&p| p == i) {
                let mut cycle: Vec<String> = path[start..]
                    .iter()
                    .map(|&p| self.phases[p].name().to_string())
                    .collect();
                cycle.push(self.phases[i].name().to_string());
                return cycle;
            }
            path.push(i);
            current = deps[i].iter().copied().find(|&d| !done[d]);
        }
        path.iter().map(|&p| self.phases[p].name().to_string()).collect()
    }

    /// Run the full pipeline.
    ///
    /// `options` replaces the engine's options for this call only. The
    /// progress callback sees every phase twice: once running and once with
    /// its final state.
    pub fn layout(
        &self,
        graph: &C4Graph,
        view: &ViewState,
        options: Option<&LayoutOptions>,
        mut progress: Option<&mut dyn FnMut(&LayoutProgress)>,
    ) -> Result<LayoutResult, LayoutError> {
        let started = Instant::now();
        graph.validate()?;
        let order = self.resolve_order()?;
        let options = options.unwrap_or(&self.options).clone();

        let mut ctx = LayoutContext::new(
            graph.clone(),
            view.clone(),
            options.clone(),
            self.measurer.clone(),
        );
        self.check_performance(&mut ctx);

        let total = order.len();
        let mut notify = |phase: &str, index: usize, state: PhaseState| {
            if let Some(callback) = progress.as_mut() {
                callback(&LayoutProgress {
                    phase: phase.to_string(),
                    index,
                    total,
                    state,
                });
            }
        };

        let mut skipping = false;
        for (index, &i) in order.iter().enumerate() {
            let phase = &self.phases[i];
            let name = phase.name();

            if skipping {
                ctx.debug_mut().phases.push(PhaseRun {
                    name: name.to_string(),
                    state: PhaseState::Skipped,
                    duration_ms: 0.0,
                });
                notify(name, index, PhaseState::Skipped);
                continue;
            }

            notify(name, index, PhaseState::Running);
            tracing::debug!(phase = name, index, total, "phase start");
            let phase_started = Instant::now();

            let state = match phase.execute(&ctx) {
                Ok(next) => {
                    ctx = next;
                    PhaseState::Completed
                }
                Err(err) => match phase.rollback(&ctx) {
                    Some(restored) => {
                        tracing::warn!(
                            phase = name,
                            error = %format!("{err:#}"),
                            "phase rolled back"
                        );
                        ctx = restored;
                        ctx.debug_mut().errors.push(format!("{name}: {err:#}"));
                        ctx.warn(format!("phase {name} failed and was rolled back"));
                        PhaseState::RolledBack
                    }
                    None => {
                        tracing::warn!(phase = name, error = %format!("{err:#}"), "phase failed");
                        notify(name, index, PhaseState::Failed);
                        return Err(LayoutError::PhaseFailed {
                            phase: name.to_string(),
                            source: err,
                        });
                    }
                },
            };

            let duration_ms = phase_started.elapsed().as_secs_f64() * 1000.0;
            ctx.debug_mut().phases.push(PhaseRun {
                name: name.to_string(),
                state,
                duration_ms,
            });
            if options.debug.save_intermediates {
                ctx.snapshot(name);
            }
            if options.debug.verbose_logging {
                tracing::info!(
                    phase = name,
                    nodes = ctx.nodes.len(),
                    edges = ctx.edges.len(),
                    duration_ms,
                    "phase finished"
                );
            } else {
                tracing::debug!(phase = name, ?state, duration_ms, "phase finished");
            }
            notify(name, index, state);

            if options.quality.early_exit && ctx.positioned && ctx.routed {
                let quality = QualityEvaluator::from_context(&ctx).evaluate(&ctx);
                let target = options.quality.target_grade;
                if quality.meets(target) && index + 1 < total {
                    tracing::info!(
                        after = name,
                        score = quality.score,
                        target_grade = target.as_str(),
                        "target grade reached, skipping remaining phases"
                    );
                    skipping = true;
                }
                ctx.quality = Some(quality);
            }
        }

        let metrics = LayoutMetrics::from_context(&ctx);
        let quality = QualityEvaluator::from_context(&ctx).evaluate(&ctx);
        ctx.quality = Some(quality.clone());

        if options.debug.show_heatmap {
            let bounds = ctx.bounds().unwrap_or(Rect::NOTHING);
            let boxes: Vec<Rect> = ctx
                .visible_nodes()
                .filter(|node| !node.is_container())
                .map(|node| node.bbox)
                .collect();
            let points: Vec<Vec2> = ctx
                .edges
                .values()
                .flat_map(|edge| edge.points.iter().copied())
                .collect();
            ctx.debug_mut().heatmap = Some(Heatmap::build(bounds, &boxes, &points));
        }
        if options.debug.show_metrics {
            tracing::info!(
                crossings = metrics.crossings,
                overlaps = metrics.overlaps,
                avg_edge_length = metrics.avg_edge_length,
                compactness = metrics.compactness,
                balance = metrics.balance,
                "layout metrics"
            );
        }
        if options.debug.enabled {
            tracing::debug!(
                warnings = ctx.debug.warnings.len(),
                errors = ctx.debug.errors.len(),
                snapshots = ctx.debug.snapshots.len(),
                "layout debug summary"
            );
        }

        tracing::info!(
            nodes = ctx.nodes.len(),
            edges = ctx.edges.len(),
            grade = quality.grade.as_str(),
            score = quality.score,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "layout complete"
        );
        Ok(LayoutResult::from_context(ctx, metrics, quality))
    }

    /// `layout` with the engine's own options and no progress reporting.
    pub fn layout_sync(
        &self,
        graph: &C4Graph,
        view: &ViewState,
    ) -> Result<LayoutResult, LayoutError> {
        self.layout(graph, view, None, None)
    }

    fn check_performance(&self, ctx: &mut LayoutContext) {
        let limits = ctx.options.performance.clone();
        let (nodes, edges) = (ctx.graph.node_count(), ctx.graph.relationship_count());
        if nodes > limits.max_nodes {
            let max_nodes = limits.max_nodes;
            tracing::warn!(nodes, max_nodes, "node count exceeds performance ceiling");
            ctx.warn(format!("{nodes} nodes exceed the configured maximum of {max_nodes}"));
        }
        if edges > limits.max_edges {
            let max_edges = limits.max_edges;
            tracing::warn!(edges, max_edges, "relationship count exceeds performance ceiling");
            ctx.warn(format!(
                "{edges} relationships exceed the configured maximum of {max_edges}"
            ));
        }
    }
}
