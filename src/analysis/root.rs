//
//  root.rs
//  routegraph
//
//  Created by hak (tharun)
//

//! Entry-point selection.
//!
//! The root is the tree that (transitively) registers the most entries:
//! its own entry count plus the complexity of every tree it mounts.

use std::collections::HashSet;

use crate::error::{Result, RouteGraphError};
use crate::graph::{Resource, ResourceId, ResourceStore, RouteTree};

/// Total complexity of the tree `id`. Trees already on `visited` count 0,
/// which cuts mount cycles.
pub fn complexity(store: &ResourceStore, id: &ResourceId, visited: &mut HashSet<ResourceId>) -> usize {
    if !visited.insert(id.clone()) {
        return 0;
    }
    let Some(tree) = store.route_tree(id) else {
        return 0;
    };

    let mounted: usize = tree
        .entries
        .iter()
        .filter_map(|entry| match store.get(entry) {
            Some(Resource::RouteTreeReference(reference)) => Some(reference.target_id.clone()),
            _ => None,
        })
        .map(|target| complexity(store, &target, visited))
        .sum();
    tree.entries.len() + mounted
}

/// The most complex tree, first in discovery order on ties. `None` when
/// nothing was discovered.
pub fn select_root(store: &ResourceStore) -> Option<&RouteTree> {
    let mut best: Option<(&RouteTree, usize)> = None;
    for tree in store.route_trees() {
        let score = complexity(store, &tree.id, &mut HashSet::new());
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((tree, score));
        }
    }
    best.map(|(tree, _)| tree)
}

/// Like [`select_root`], for callers that cannot proceed without a root.
pub fn require_root(store: &ResourceStore) -> Result<&RouteTree> {
    select_root(store).ok_or(RouteGraphError::NoRouteTrees)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::diagnostics::Diagnostics;

    fn store() -> ResourceStore {
        ResourceStore::new("/p", Diagnostics::memory().0)
    }

    fn tree(store: &mut ResourceStore, name: &str, offset: usize, entries: usize) -> ResourceId {
        let file = Path::new("/p/app.ts");
        let id = store.create_route_tree(name, "Hono", file, offset).id.clone();
        for i in 0..entries {
            let entry = store
                .create_route_entry(None, "/", file, offset + 1 + i)
                .id
                .clone();
            store.append_entry(&id, entry).unwrap();
        }
        id
    }

    fn mount(store: &mut ResourceStore, from: &ResourceId, to: &ResourceId, offset: usize) {
        let name = store.route_tree(to).unwrap().name.clone();
        let reference = store
            .create_route_tree_reference("/x", to.clone(), &name, Path::new("/p/app.ts"), offset)
            .id
            .clone();
        store.append_entry(from, reference).unwrap();
    }

    #[test]
    fn test_mounting_tree_is_root() {
        let mut store = store();
        let a = tree(&mut store, "a", 0, 1);
        let b = tree(&mut store, "b", 100, 3);
        mount(&mut store, &a, &b, 50);

        assert_eq!(complexity(&store, &a, &mut HashSet::new()), 5);
        assert_eq!(complexity(&store, &b, &mut HashSet::new()), 3);
        assert_eq!(select_root(&store).unwrap().id, a);
    }

    #[test]
    fn test_mutual_mounts_terminate() {
        let mut store = store();
        let a = tree(&mut store, "a", 0, 1);
        let b = tree(&mut store, "b", 100, 1);
        mount(&mut store, &a, &b, 50);
        mount(&mut store, &b, &a, 150);

        // a: own 2 entries + b's 2 entries, b's mount of a short-circuits
        assert_eq!(complexity(&store, &a, &mut HashSet::new()), 4);
        assert_eq!(complexity(&store, &b, &mut HashSet::new()), 4);
        assert_eq!(select_root(&store).unwrap().id, a, "ties keep discovery order");
    }

    #[test]
    fn test_empty_store_has_no_root() {
        let store = store();
        assert!(select_root(&store).is_none());
        assert!(matches!(require_root(&store), Err(RouteGraphError::NoRouteTrees)));
    }
}
