//
//  routes.rs
//  routegraph
//
//  Created by hak (tharun)
//

use anyhow::Result;
use serde_json::json;

use super::Project;
use crate::analysis::AnalysisOutcome;
use crate::diagnostics::Diagnostics;
use crate::graph::{to_dot, Resource, ResourceStore, RouteTree};

/// Print every route tree with its entries, or the whole node map as JSON.
pub fn list(project: &Project, diagnostics: &Diagnostics, json: bool) -> Result<()> {
    let outcome = project.analyze(diagnostics);

    if json {
        let resources: Vec<&Resource> = outcome.store.all().collect();
        let dump = json!({
            "rootId": outcome.root_id,
            "errorCount": outcome.error_count,
            "resources": resources,
        });
        println!("{}", serde_json::to_string_pretty(&dump)?);
        return Ok(());
    }

    print!("{}", render_listing(&outcome));
    Ok(())
}

/// Print the mount graph as DOT.
pub fn graph(project: &Project, diagnostics: &Diagnostics) -> Result<()> {
    let outcome = project.analyze(diagnostics);
    print!("{}", to_dot(&outcome.store));
    Ok(())
}

fn render_listing(outcome: &AnalysisOutcome) -> String {
    let store = &outcome.store;
    let mut out = String::new();
    if store.route_trees().next().is_none() {
        out.push_str("No route trees found\n");
    }
    for tree in store.route_trees() {
        let marker = if outcome.root_id.as_ref() == Some(&tree.id) { " [root]" } else { "" };
        out.push_str(&format!(
            "{} ({}) {}:{}{}\n",
            tree.name, tree.router_type, tree.file, tree.offset, marker
        ));
        if let Some(base_url) = &tree.base_url {
            out.push_str(&format!("  base {base_url}\n"));
        }
        for line in entry_lines(store, tree) {
            out.push_str(&format!("  {line}\n"));
        }
    }
    if outcome.error_count > 0 {
        out.push_str(&format!("{} error(s) during discovery\n", outcome.error_count));
    }
    out
}

fn entry_lines(store: &ResourceStore, tree: &RouteTree) -> Vec<String> {
    tree.entries
        .iter()
        .filter_map(|id| match store.get(id)? {
            Resource::RouteEntry(e) => Some(format!(
                "{:<7} {}",
                e.method.map_or("ALL".to_string(), |m| m.as_str().to_uppercase()),
                e.path
            )),
            Resource::MiddlewareEntry(m) => Some(format!("{:<7} {}", "USE", m.path)),
            Resource::RouteTreeReference(r) => {
                Some(format!("{:<7} {} -> {}", "ROUTE", r.path, r.target_name))
            }
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use super::*;
    use crate::graph::HttpVerb;

    #[test]
    fn test_render_listing() {
        let mut store = ResourceStore::new("/p", Diagnostics::memory().0);
        let file = Path::new("/p/src/index.ts");
        let app = store.create_route_tree("app", "Hono", file, 6).id.clone();
        let users = store.create_route_tree("users", "Hono", file, 60).id.clone();
        let get = store
            .create_route_entry(Some(HttpVerb::Get), "/", file, 20)
            .id
            .clone();
        let mount = store
            .create_route_tree_reference("/users", users, "users", file, 40)
            .id
            .clone();
        store.append_entry(&app, get).unwrap();
        store.append_entry(&app, mount).unwrap();

        let outcome = AnalysisOutcome {
            store: Arc::new(store),
            root_id: Some(app),
            error_count: 1,
        };
        assert_eq!(
            render_listing(&outcome),
            "app (Hono) src/index.ts:6 [root]\n  GET     /\n  ROUTE   /users -> users\nusers (Hono) src/index.ts:60\n1 error(s) during discovery\n"
        );
    }
}
