use anyhow::{Context, Result};
use c4layout_core::{C4Graph, C4Node, C4Relationship, NodeId, ViewLevel, ViewState};
use c4layout_engine::{LayoutEngine, LayoutOptions, LayoutResult};
use c4layout_worker::LayoutWorkerClient;
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Lay out a C4 architecture graph", long_about = None)]
struct Args {
    /// Graph document (JSON) to lay out
    graph: PathBuf,

    /// Abstraction level; overrides the document's view
    #[arg(short, long, value_enum)]
    level: Option<Level>,

    /// Layout options (JSON); missing keys keep their defaults
    #[arg(long)]
    options: Option<PathBuf>,

    /// Write the result JSON here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Run the layout on a background worker thread
    #[arg(long)]
    worker: bool,

    /// Worker request timeout
    #[arg(long, default_value_t = 30_000, requires = "worker")]
    timeout_ms: u64,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Level {
    Landscape,
    Context,
    Container,
    Component,
}

impl From<Level> for ViewLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::Landscape => ViewLevel::Landscape,
            Level::Context => ViewLevel::Context,
            Level::Container => ViewLevel::Container,
            Level::Component => ViewLevel::Component,
        }
    }
}

/// On-disk graph format: node and relationship lists plus an optional view.
#[derive(Debug, Deserialize)]
struct GraphDocument {
    nodes: Vec<C4Node>,
    #[serde(default)]
    relationships: Vec<C4Relationship>,
    #[serde(default)]
    view: Option<ViewState>,
}

impl GraphDocument {
    fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("invalid graph document")
    }

    fn into_parts(self, level: Option<ViewLevel>) -> Result<(C4Graph, ViewState)> {
        let mut graph = C4Graph::new();
        let mut seen = BTreeSet::<NodeId>::new();
        for node in self.nodes {
            if !seen.insert(node.id.clone()) {
                anyhow::bail!("duplicate node id {}", node.id.as_str());
            }
            graph.add_node(node);
        }
        for relationship in self.relationships {
            graph.add_relationship(relationship);
        }

        let mut view = self.view.unwrap_or_default();
        if let Some(level) = level {
            view.level = level;
        }
        Ok((graph, view))
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load(path: &Path, level: Option<ViewLevel>) -> Result<(C4Graph, ViewState)> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read graph {}", path.display()))?;
    GraphDocument::parse(&text)?.into_parts(level)
}

fn run_layout(
    args: &Args,
    graph: &C4Graph,
    view: &ViewState,
    options: &LayoutOptions,
) -> Result<LayoutResult> {
    if args.worker {
        let client = LayoutWorkerClient::new(LayoutEngine::new)
            .with_timeout(Duration::from_millis(args.timeout_ms));
        let result = client.layout(graph, view, Some(options));
        client.shutdown();
        return Ok(result?);
    }

    let engine = LayoutEngine::new().with_options(options.clone());
    Ok(engine.layout(graph, view, None, None)?)
}

fn summary(result: &LayoutResult) -> String {
    let quality = &result.quality;
    let mut lines = vec![format!(
        "grade {} ({:.1}), {} nodes, {} edges, {} crossings, {} overlaps",
        quality.grade.as_str(),
        quality.score,
        result.nodes.len(),
        result.edges.len(),
        result.metrics.crossings,
        result.metrics.overlaps,
    )];
    for violation in &quality.violations {
        lines.push(format!("  {:?}: {}", violation.severity, violation.message));
    }
    for recommendation in quality.recommendations.iter().take(3) {
        lines.push(format!(
            "  hint (+{:.1}): {}",
            recommendation.expected_gain, recommendation.message
        ));
    }
    lines.join("\n")
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let (graph, view) = load(&args.graph, args.level.map(ViewLevel::from))?;
    let options = match &args.options {
        Some(path) => LayoutOptions::from_json_file(path)?,
        None => LayoutOptions::default(),
    };
    tracing::debug!(
        nodes = graph.node_count(),
        relationships = graph.relationship_count(),
        level = ?view.level,
        worker = args.worker,
        "starting layout"
    );

    let result = run_layout(&args, &graph, &view, &options)?;
    let json = serde_json::to_string_pretty(&result)?;
    match &args.output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{json}"),
    }
    eprintln!("{}", summary(&result));

    Ok(())
}
