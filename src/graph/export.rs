//
//  export.rs
//  routegraph
//
//  Created by hak (tharun)
//

use std::collections::HashMap;

use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};

use super::id::ResourceId;
use super::store::ResourceStore;
use super::types::Resource;

/// Mount relations between route trees: nodes are tree names, edges carry
/// the mount prefix. References whose target was never discovered are
/// left out.
pub fn mount_graph(store: &ResourceStore) -> DiGraph<String, String> {
    let mut graph = DiGraph::new();
    let mut index: HashMap<&ResourceId, NodeIndex> = HashMap::new();

    for tree in store.route_trees() {
        let label = format!("{} ({}:{})", tree.name, tree.file, tree.offset);
        index.insert(&tree.id, graph.add_node(label));
    }

    for tree in store.route_trees() {
        let Some(&from) = index.get(&tree.id) else {
            continue;
        };
        for entry in &tree.entries {
            if let Some(Resource::RouteTreeReference(reference)) = store.get(entry) {
                if let Some(&to) = index.get(&reference.target_id) {
                    graph.add_edge(from, to, reference.path.clone());
                }
            }
        }
    }

    graph
}

/// Graphviz rendering of [`mount_graph`].
pub fn to_dot(store: &ResourceStore) -> String {
    let graph = mount_graph(store);
    let body = Dot::with_config(&graph, &[Config::GraphContentOnly]);
    format!("digraph routes {{\n{body}}}\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use std::path::Path;

    #[test]
    fn test_mount_graph_edges() {
        let mut store = ResourceStore::new("/p", Diagnostics::memory().0);
        let file = Path::new("/p/app.ts");
        let a = store.create_route_tree("app", "Hono", file, 0).id.clone();
        let b = store.create_route_tree("users", "Hono", file, 40).id.clone();
        let reference = store
            .create_route_tree_reference("/users", b.clone(), "users", file, 80)
            .id
            .clone();
        store.append_entry(&a, reference).unwrap();
        let dangling = store
            .create_route_tree_reference("/gone", ResourceId::parse("ROUTE_TREE:x.ts@1").unwrap(), "x", file, 90)
            .id
            .clone();
        store.append_entry(&a, dangling).unwrap();

        let graph = mount_graph(&store);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1, "dangling mount is skipped");

        let dot = to_dot(&store);
        assert!(dot.starts_with("digraph routes {"));
        assert!(dot.contains("/users"));
    }
}
