use c4layout_core::{C4Graph, C4Node, C4Relationship, NodeKind, ViewLevel, ViewState};
use c4layout_engine::{Grade, LayoutEngine, LayoutOptions};
use c4layout_worker::{LayoutWorkerClient, WorkerError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn system_graph() -> C4Graph {
    let mut graph = C4Graph::new();
    graph.add_node(C4Node::new("user", NodeKind::PERSON, "User"));
    graph.add_node(C4Node::new("shop", NodeKind::SOFTWARE_SYSTEM, "Shop"));
    graph.add_node(C4Node::new("mail", NodeKind::EXTERNAL_SYSTEM, "Mail"));
    graph.add_relationship(C4Relationship::new("r1", "user", "shop").with_label("buys"));
    graph.add_relationship(C4Relationship::new("r2", "shop", "mail").with_label("sends"));
    graph
}

#[test]
fn test_worker_matches_in_process_layout() {
    let graph = system_graph();
    let view = ViewState::new(ViewLevel::Context);

    let local = LayoutEngine::new().layout(&graph, &view, None, None).expect("local layout");
    let client = LayoutWorkerClient::new(LayoutEngine::new);
    let remote = client.layout(&graph, &view, None).expect("worker layout");

    assert_eq!(remote.nodes, local.nodes);
    assert_eq!(remote.edges, local.edges);
    assert_eq!(remote.quality.grade, local.quality.grade);
}

#[test]
fn test_options_cross_the_boundary() {
    let mut options = LayoutOptions::default();
    options.quality.target_grade = Grade::C;
    options.debug.show_port_usage = true;

    let client = LayoutWorkerClient::new(LayoutEngine::new);
    let result = client
        .layout(&system_graph(), &ViewState::new(ViewLevel::Context), Some(&options))
        .expect("layout");
    assert!(!result.debug.port_usage.is_empty());
}

#[test]
fn test_concurrent_callers_get_their_own_results() {
    let client = Arc::new(LayoutWorkerClient::new(LayoutEngine::new));
    let handles: Vec<_> = (1..=4usize)
        .map(|n| {
            let client = Arc::clone(&client);
            thread::spawn(move || {
                let mut graph = C4Graph::new();
                for i in 0..n {
                    graph.add_node(C4Node::new(format!("s{i}"), NodeKind::SOFTWARE_SYSTEM, "S"));
                }
                let result = client
                    .layout(&graph, &ViewState::new(ViewLevel::Context), None)
                    .expect("layout");
                (n, result.nodes.len())
            })
        })
        .collect();

    for handle in handles {
        let (expected, actual) = handle.join().expect("caller thread");
        assert_eq!(expected, actual);
    }
    assert_eq!(client.pending_count(), 0);
}

#[test]
fn test_invalid_graph_is_reported_not_crashed() {
    let mut graph = system_graph();
    graph.add_relationship(C4Relationship::new("bad", "user", "ghost"));

    let client = LayoutWorkerClient::new(LayoutEngine::new);
    let err = client
        .submit_with_timeout(
            &graph,
            &ViewState::new(ViewLevel::Context),
            None,
            Duration::from_secs(10),
        )
        .expect("submit")
        .wait()
        .expect_err("dangling relationship");

    assert!(matches!(err, WorkerError::Layout(message) if message.contains("ghost")));
    assert_eq!(client.generation(), 1);
}
