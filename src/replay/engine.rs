//
//  engine.rs
//  routegraph
//
//  Created by hak (tharun)
//

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use http::{Method, StatusCode};

use super::router::PathPattern;
use crate::diagnostics::Diagnostics;
use crate::error::{Result, RouteGraphError};
use crate::graph::{Resource, ResourceId, ResourceStore};

const COMPONENT: &str = "replay";

/// Body returned by every matched route.
pub const MATCHED_BODY: &str = "Ok";
pub const NOT_FOUND_BODY: &str = "404 Not Found";

/// What a dispatched request produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: StatusCode,
    pub body: String,
}

impl Response {
    fn ok() -> Self {
        Self {
            status: StatusCode::OK,
            body: MATCHED_BODY.to_string(),
        }
    }

    fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: NOT_FOUND_BODY.to_string(),
        }
    }

    pub fn is_match(&self) -> bool {
        self.status == StatusCode::OK
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status.as_u16(), self.body)
    }
}

#[derive(Debug, Clone)]
enum Step {
    Middleware {
        id: ResourceId,
        pattern: PathPattern,
    },
    Route {
        id: ResourceId,
        /// `None` answers every method.
        method: Option<Method>,
        pattern: PathPattern,
    },
    Mount {
        pattern: PathPattern,
        router: usize,
    },
}

/// Executable counterpart of one route tree.
#[derive(Debug)]
struct Router {
    tree_id: ResourceId,
    steps: Vec<Step>,
}

/// Rebuilds routers from a resource graph and records which resources a
/// request passes through.
///
/// Routers live in an arena and mount each other by index, so mutually
/// mounted trees are built once and dispatch guards against revisiting the
/// same (router, path) pair.
#[derive(Debug)]
pub struct ReplayEngine {
    store: Arc<ResourceStore>,
    diagnostics: Diagnostics,
    routers: Vec<Router>,
    built: HashMap<ResourceId, usize>,
    root: Option<usize>,
    history: Vec<ResourceId>,
}

impl ReplayEngine {
    pub fn new(store: Arc<ResourceStore>, diagnostics: Diagnostics) -> Self {
        Self {
            store,
            diagnostics,
            routers: Vec::new(),
            built: HashMap::new(),
            root: None,
            history: Vec::new(),
        }
    }

    pub fn store(&self) -> &ResourceStore {
        &self.store
    }

    /// Build the router for `id` (and everything it mounts) and make it the
    /// dispatch target. Clears the history.
    pub fn set_root(&mut self, id: &ResourceId) -> Result<()> {
        self.store.require_route_tree(id)?;
        self.routers.clear();
        self.built.clear();
        self.history.clear();
        let root = self.build(id);
        self.root = Some(root);
        Ok(())
    }

    pub fn root_id(&self) -> Option<&ResourceId> {
        self.root
            .and_then(|idx| self.routers.get(idx))
            .map(|router| &router.tree_id)
    }

    fn build(&mut self, tree_id: &ResourceId) -> usize {
        if let Some(&idx) = self.built.get(tree_id) {
            return idx;
        }
        let idx = self.routers.len();
        self.routers.push(Router {
            tree_id: tree_id.clone(),
            steps: Vec::new(),
        });
        // Registered before the entries so a mount cycle finds it.
        self.built.insert(tree_id.clone(), idx);

        let store = Arc::clone(&self.store);
        let Some(tree) = store.route_tree(tree_id) else {
            return idx;
        };

        let mut steps = Vec::with_capacity(tree.entries.len());
        for entry_id in &tree.entries {
            let step = match store.get(entry_id) {
                Some(Resource::RouteEntry(entry)) => self.pattern(&entry.path).map(|pattern| Step::Route {
                    id: entry.id.clone(),
                    method: entry.method.map(|m| m.to_method()),
                    pattern,
                }),
                Some(Resource::MiddlewareEntry(entry)) => {
                    self.pattern(&entry.path).map(|pattern| Step::Middleware {
                        id: entry.id.clone(),
                        pattern,
                    })
                }
                Some(Resource::RouteTreeReference(reference)) => {
                    if store.route_tree(&reference.target_id).is_none() {
                        self.diagnostics.warn(
                            COMPONENT,
                            format!("referred route tree {} not found", reference.target_id),
                        );
                        None
                    } else {
                        let pattern = self.pattern(&reference.path);
                        let router = self.build(&reference.target_id);
                        pattern.map(|pattern| Step::Mount { pattern, router })
                    }
                }
                Some(other) => {
                    self.diagnostics.warn(
                        COMPONENT,
                        format!("unsupported entry {} in {tree_id}", other.id()),
                    );
                    None
                }
                None => {
                    self.diagnostics
                        .warn(COMPONENT, format!("resource {entry_id} not found"));
                    None
                }
            };
            steps.extend(step);
        }
        self.routers[idx].steps = steps;
        idx
    }

    fn pattern(&self, path: &str) -> Option<PathPattern> {
        match PathPattern::parse(path) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                self.diagnostics.warn(COMPONENT, e);
                None
            }
        }
    }

    /// Run a synthetic request through the root router, appending what it
    /// touches to the history. Unparseable methods or paths produce 404.
    pub fn dispatch(&mut self, method: &str, path: &str) -> Result<Response> {
        let root = self.root.ok_or(RouteGraphError::NoRootSet)?;
        let method = match Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes()) {
            Ok(method) => method,
            Err(e) => {
                self.diagnostics
                    .warn(COMPONENT, format!("unsupported method {method:?}: {e}"));
                return Ok(Response::not_found());
            }
        };
        let path = request_path(path);

        let mut trace = Vec::new();
        let mut stack = Vec::new();
        let matched = self.handle(root, &method, &path, &mut stack, &mut trace);
        self.history.extend(trace);
        Ok(if matched { Response::ok() } else { Response::not_found() })
    }

    fn handle(
        &self,
        idx: usize,
        method: &Method,
        path: &str,
        stack: &mut Vec<(usize, String)>,
        trace: &mut Vec<ResourceId>,
    ) -> bool {
        let frame = (idx, path.to_string());
        if stack.contains(&frame) {
            return false;
        }
        let Some(router) = self.routers.get(idx) else {
            return false;
        };
        stack.push(frame);
        trace.push(router.tree_id.clone());

        let mut matched = false;
        for step in &router.steps {
            match step {
                Step::Middleware { id, pattern } => {
                    if pattern.matches_prefix(path) {
                        trace.push(id.clone());
                    }
                }
                Step::Route { id, method: expected, pattern } => {
                    let method_ok = expected.as_ref().map_or(true, |m| m == method);
                    if method_ok && pattern.matches(path) {
                        trace.push(id.clone());
                        matched = true;
                        break;
                    }
                }
                Step::Mount { pattern, router } => {
                    if let Some(rest) = pattern.strip_prefix(path) {
                        if self.handle(*router, method, &rest, stack, trace) {
                            matched = true;
                            break;
                        }
                    }
                }
            }
        }
        stack.pop();
        matched
    }

    pub fn history(&self) -> &[ResourceId] {
        &self.history
    }

    pub fn history_length(&self) -> usize {
        self.history.len()
    }

    pub fn has_visited(&self, id: &ResourceId) -> bool {
        self.history.contains(id)
    }

    pub fn reset_history(&mut self) {
        self.history.clear();
    }
}

/// Path component of a request target: `https://h/a?b` -> `/a`.
fn request_path(target: &str) -> String {
    let target = target.trim();
    let without_origin = match target.find("://") {
        Some(scheme_end) => {
            let rest = &target[scheme_end + 3..];
            rest.find('/').map_or("/", |slash| &rest[slash..])
        }
        None => target,
    };
    let path = without_origin
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::graph::HttpVerb;

    /// app: use logger, GET /, mount users at /user; users: GET /:id
    fn fixture() -> (Arc<ResourceStore>, ResourceId, ResourceId, ResourceId) {
        let mut store = ResourceStore::new("/p", Diagnostics::memory().0);
        let file = Path::new("/p/src/index.ts");
        let app = store.create_route_tree("app", "Hono", file, 10).id.clone();
        let users = store.create_route_tree("users", "Hono", file, 500).id.clone();

        let logger = store.create_middleware_entry("/", file, 20).id.clone();
        let root = store
            .create_route_entry(Some(HttpVerb::Get), "/", file, 30)
            .id
            .clone();
        let mount = store
            .create_route_tree_reference("/user", users.clone(), "users", file, 40)
            .id
            .clone();
        for entry in [logger, root, mount] {
            store.append_entry(&app, entry).unwrap();
        }
        let by_id = store
            .create_route_entry(Some(HttpVerb::Get), "/:id", file, 510)
            .id
            .clone();
        store.append_entry(&users, by_id.clone()).unwrap();
        (Arc::new(store), app, users, by_id)
    }

    #[test]
    fn test_dispatch_requires_root() {
        let (store, _, _, _) = fixture();
        let mut engine = ReplayEngine::new(store, Diagnostics::memory().0);
        assert!(matches!(engine.dispatch("GET", "/"), Err(RouteGraphError::NoRootSet)));
    }

    #[test]
    fn test_set_root_rejects_unknown_and_wrong_kind() {
        let (store, app, _, by_id) = fixture();
        let mut engine = ReplayEngine::new(store, Diagnostics::memory().0);
        let missing = ResourceId::parse("ROUTE_TREE:nope.ts@1").unwrap();
        assert!(matches!(
            engine.set_root(&missing),
            Err(RouteGraphError::ResourceNotFound(_))
        ));
        assert!(matches!(
            engine.set_root(&by_id),
            Err(RouteGraphError::UnexpectedKind { .. })
        ));
        engine.set_root(&app).unwrap();
        assert_eq!(engine.root_id(), Some(&app));
    }

    #[test]
    fn test_mounted_route_history() {
        let (store, app, users, by_id) = fixture();
        let mut engine = ReplayEngine::new(store, Diagnostics::memory().0);
        engine.set_root(&app).unwrap();

        let response = engine.dispatch("GET", "/user/1").unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, "Ok");
        // app, logger, users, users' route
        assert_eq!(engine.history_length(), 4);
        assert!(engine.has_visited(&app));
        assert!(engine.has_visited(&users));
        assert_eq!(engine.history().last(), Some(&by_id));
    }

    #[test]
    fn test_unmatched_requests_degrade_to_404() {
        let (store, app, _, _) = fixture();
        let mut engine = ReplayEngine::new(store, Diagnostics::memory().0);
        engine.set_root(&app).unwrap();

        let response = engine.dispatch("POST", "/").unwrap();
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.body, "404 Not Found");

        engine.reset_history();
        let response = engine.dispatch("NOT A METHOD", "/").unwrap();
        assert!(!response.is_match());
        assert_eq!(engine.history_length(), 0);
    }

    #[test]
    fn test_full_urls_and_queries() {
        let (store, app, _, by_id) = fixture();
        let mut engine = ReplayEngine::new(store, Diagnostics::memory().0);
        engine.set_root(&app).unwrap();
        assert!(engine
            .dispatch("get", "http://localhost:8787/user/7?expand=true")
            .unwrap()
            .is_match());
        assert!(engine.has_visited(&by_id));
    }

    #[test]
    fn test_mutual_mounts_do_not_loop() {
        let mut store = ResourceStore::new("/p", Diagnostics::memory().0);
        let file = Path::new("/p/a.ts");
        let a = store.create_route_tree("a", "Hono", file, 0).id.clone();
        let b = store.create_route_tree("b", "Hono", file, 100).id.clone();
        let a_to_b = store
            .create_route_tree_reference("/", b.clone(), "b", file, 10)
            .id
            .clone();
        let b_to_a = store
            .create_route_tree_reference("/", a.clone(), "a", file, 110)
            .id
            .clone();
        store.append_entry(&a, a_to_b).unwrap();
        store.append_entry(&b, b_to_a).unwrap();

        let mut engine = ReplayEngine::new(Arc::new(store), Diagnostics::memory().0);
        engine.set_root(&a).unwrap();
        let response = engine.dispatch("GET", "/x").unwrap();
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(engine.history(), &[a, b]);
    }

    #[test]
    fn test_request_path() {
        assert_eq!(request_path("https://api.example.com"), "/");
        assert_eq!(request_path("users?x=1#top"), "/users");
        assert_eq!(request_path("/a/b"), "/a/b");
    }
}
