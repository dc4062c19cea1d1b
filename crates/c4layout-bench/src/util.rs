use c4layout_core::{C4Graph, C4Node, C4Relationship, NodeKind, ViewLevel};

const CONTAINER_KINDS: [NodeKind; 5] = [
    NodeKind::WEB_APP,
    NodeKind::API,
    NodeKind::SERVICE,
    NodeKind::DATABASE,
    NodeKind::QUEUE,
];

/// `systems` software systems, each holding `containers_per_system`
/// containers, plus one user. Every container calls its successor and the
/// first container of each system calls into the next system.
pub fn generate_landscape(systems: usize, containers_per_system: usize) -> C4Graph {
    let mut graph = C4Graph::new();
    graph.add_node(C4Node::new("user", NodeKind::PERSON, "User").with_level(ViewLevel::Context));

    for s in 0..systems {
        let system = format!("system_{s}");
        graph.add_node(
            C4Node::new(&system, NodeKind::SOFTWARE_SYSTEM, format!("System {s}"))
                .with_level(ViewLevel::Context),
        );

        for c in 0..containers_per_system {
            let kind = CONTAINER_KINDS[c % CONTAINER_KINDS.len()];
            graph.add_node(
                C4Node::new(container_id(s, c), kind, format!("Container {s}.{c}"))
                    .with_parent(&system)
                    .with_level(ViewLevel::Container),
            );
            if c > 0 {
                graph.add_relationship(C4Relationship::new(
                    format!("r_{s}_{c}"),
                    container_id(s, c - 1),
                    container_id(s, c),
                ));
            }
        }

        if s == 0 {
            graph.add_relationship(C4Relationship::new("r_user", "user", &system));
        } else if containers_per_system > 0 {
            graph.add_relationship(C4Relationship::new(
                format!("r_link_{s}"),
                container_id(s - 1, 0),
                container_id(s, 0),
            ));
        }
    }

    graph
}

fn container_id(system: usize, container: usize) -> String {
    format!("container_{system}_{container}")
}

/// Flat chain of `count` services with a skip edge every third node.
pub fn generate_flat(count: usize) -> C4Graph {
    let mut graph = C4Graph::new();
    for i in 0..count {
        graph.add_node(
            C4Node::new(format!("svc_{i}"), NodeKind::SERVICE, format!("Service {i}"))
                .with_level(ViewLevel::Container),
        );
        if i > 0 {
            graph.add_relationship(C4Relationship::new(
                format!("e_{i}"),
                format!("svc_{}", i - 1),
                format!("svc_{i}"),
            ));
        }
        if i >= 3 && i % 3 == 0 {
            graph.add_relationship(C4Relationship::new(
                format!("skip_{i}"),
                format!("svc_{}", i - 3),
                format!("svc_{i}"),
            ));
        }
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_graphs_are_valid() {
        let landscape = generate_landscape(4, 5);
        assert_eq!(landscape.node_count(), 1 + 4 + 4 * 5);
        assert!(landscape.validate().is_ok());

        let flat = generate_flat(10);
        assert_eq!(flat.node_count(), 10);
        assert_eq!(flat.relationship_count(), 9 + 3);
        assert!(flat.validate().is_ok());
    }
}
