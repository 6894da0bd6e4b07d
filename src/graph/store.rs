//
//  store.rs
//  routegraph
//
//  Created by hak (tharun)
//

use std::path::{Component, Path, PathBuf};

use indexmap::IndexMap;

use super::id::{ResourceId, ResourceKind};
use super::types::*;
use crate::diagnostics::Diagnostics;
use crate::error::{Result, RouteGraphError};

const COMPONENT: &str = "store";

/// Arena of every discovered resource, keyed by id.
///
/// Iteration follows insertion order, which is discovery order. A pass
/// starts from an empty store; nothing is patched incrementally.
#[derive(Debug, Clone)]
pub struct ResourceStore {
    root: PathBuf,
    nodes: IndexMap<ResourceId, Resource>,
    diagnostics: Diagnostics,
}

impl ResourceStore {
    /// Create an empty store whose ids are relative to `root`.
    pub fn new(root: impl Into<PathBuf>, diagnostics: Diagnostics) -> Self {
        Self {
            root: root.into(),
            nodes: IndexMap::new(),
            diagnostics,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // ─── Paths & Ids ────────────────────────────────────────────

    /// Project-relative, `/`-separated form of `path`. Absolute paths
    /// outside the root keep a leading `/`.
    pub fn relative_path(&self, path: &Path) -> String {
        let (relative, outside) = match path.strip_prefix(&self.root) {
            Ok(relative) => (relative, false),
            Err(_) => (path, path.has_root()),
        };
        let joined = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                Component::ParentDir => Some("..".to_string()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/");
        if outside {
            format!("/{joined}")
        } else {
            joined
        }
    }

    pub fn absolute_path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn id_for(&self, kind: ResourceKind, file: &Path, offset: usize) -> ResourceId {
        ResourceId::positioned(kind, &self.relative_path(file), offset)
    }

    // ─── Creation ───────────────────────────────────────────────

    pub fn create_route_tree(
        &mut self,
        name: &str,
        router_type: &str,
        file: &Path,
        offset: usize,
    ) -> &RouteTree {
        let tree = RouteTree {
            id: self.id_for(ResourceKind::RouteTree, file, offset),
            name: name.to_string(),
            router_type: router_type.to_string(),
            base_url: None,
            entries: Vec::new(),
            modules: Default::default(),
            file: self.relative_path(file),
            offset,
        };
        match self.insert(Resource::RouteTree(tree)) {
            Resource::RouteTree(tree) => tree,
            _ => unreachable!("inserted a route tree"),
        }
    }

    pub fn create_route_entry(
        &mut self,
        method: Option<HttpVerb>,
        path: &str,
        file: &Path,
        offset: usize,
    ) -> &RouteEntry {
        let entry = RouteEntry {
            id: self.id_for(ResourceKind::RouteEntry, file, offset),
            method,
            path: path.to_string(),
            sources: Default::default(),
            modules: Default::default(),
            file: self.relative_path(file),
            offset,
        };
        match self.insert(Resource::RouteEntry(entry)) {
            Resource::RouteEntry(entry) => entry,
            _ => unreachable!("inserted a route entry"),
        }
    }

    pub fn create_middleware_entry(
        &mut self,
        path: &str,
        file: &Path,
        offset: usize,
    ) -> &MiddlewareEntry {
        let entry = MiddlewareEntry {
            id: self.id_for(ResourceKind::MiddlewareEntry, file, offset),
            path: path.to_string(),
            sources: Default::default(),
            modules: Default::default(),
            file: self.relative_path(file),
            offset,
        };
        match self.insert(Resource::MiddlewareEntry(entry)) {
            Resource::MiddlewareEntry(entry) => entry,
            _ => unreachable!("inserted a middleware entry"),
        }
    }

    pub fn create_route_tree_reference(
        &mut self,
        path: &str,
        target_id: ResourceId,
        target_name: &str,
        file: &Path,
        offset: usize,
    ) -> &RouteTreeReference {
        let reference = RouteTreeReference {
            id: self.id_for(ResourceKind::RouteTreeReference, file, offset),
            path: path.to_string(),
            target_id,
            target_name: target_name.to_string(),
            file: self.relative_path(file),
            offset,
        };
        match self.insert(Resource::RouteTreeReference(reference)) {
            Resource::RouteTreeReference(reference) => reference,
            _ => unreachable!("inserted a route tree reference"),
        }
    }

    pub fn create_source_fragment(
        &mut self,
        content: &str,
        file: &Path,
        offset: usize,
        line: usize,
        column: usize,
    ) -> &SourceFragment {
        let fragment = SourceFragment {
            id: self.id_for(ResourceKind::SourceFragment, file, offset),
            content: content.to_string(),
            file: self.relative_path(file),
            offset,
            line,
            column,
            references: Default::default(),
            modules: Default::default(),
        };
        match self.insert(Resource::SourceFragment(fragment)) {
            Resource::SourceFragment(fragment) => fragment,
            _ => unreachable!("inserted a source fragment"),
        }
    }

    /// Module references are shared by every fragment importing the same
    /// binding, so an existing one is returned untouched.
    pub fn ensure_module_reference(
        &mut self,
        import_path: &str,
        binding: &str,
        style: ImportStyle,
        package: Option<PackageIdentity>,
    ) -> &ModuleReference {
        let id = ResourceId::module(import_path, binding);
        let resource = self.nodes.entry(id.clone()).or_insert_with(|| {
            Resource::ModuleReference(ModuleReference {
                id,
                import_path: import_path.to_string(),
                binding: binding.to_string(),
                style,
                package,
            })
        });
        match resource {
            Resource::ModuleReference(module) => module,
            _ => unreachable!("module ids only address module references"),
        }
    }

    fn insert(&mut self, resource: Resource) -> &mut Resource {
        let id = resource.id().clone();
        if self.nodes.contains_key(&id) {
            self.diagnostics
                .warn(COMPONENT, format!("resource {id} already exists, replacing it"));
        }
        let (index, _) = self.nodes.insert_full(id, resource);
        &mut self.nodes[index]
    }

    // ─── Lookup ─────────────────────────────────────────────────

    pub fn get(&self, id: &ResourceId) -> Option<&Resource> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn remove(&mut self, id: &ResourceId) -> Option<Resource> {
        self.nodes.shift_remove(id)
    }

    /// Every node, in discovery order.
    pub fn all(&self) -> impl Iterator<Item = &Resource> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    pub fn route_trees(&self) -> impl Iterator<Item = &RouteTree> {
        self.nodes.values().filter_map(|r| match r {
            Resource::RouteTree(tree) => Some(tree),
            _ => None,
        })
    }

    pub fn route_tree(&self, id: &ResourceId) -> Option<&RouteTree> {
        match self.nodes.get(id) {
            Some(Resource::RouteTree(tree)) => Some(tree),
            _ => None,
        }
    }

    pub fn source_fragment(&self, id: &ResourceId) -> Option<&SourceFragment> {
        match self.nodes.get(id) {
            Some(Resource::SourceFragment(fragment)) => Some(fragment),
            _ => None,
        }
    }

    pub fn module_reference(&self, id: &ResourceId) -> Option<&ModuleReference> {
        match self.nodes.get(id) {
            Some(Resource::ModuleReference(module)) => Some(module),
            _ => None,
        }
    }

    /// Fetch a route tree, failing when the id is missing or of another kind.
    pub fn require_route_tree(&self, id: &ResourceId) -> Result<&RouteTree> {
        match self.nodes.get(id) {
            Some(Resource::RouteTree(tree)) => Ok(tree),
            Some(other) => Err(RouteGraphError::UnexpectedKind {
                id: id.clone(),
                expected: ResourceKind::RouteTree.as_str(),
                actual: other.kind().as_str(),
            }),
            None => Err(RouteGraphError::ResourceNotFound(id.clone())),
        }
    }

    // ─── Mutation ───────────────────────────────────────────────

    /// Append an entry id to a tree, preserving call order.
    pub fn append_entry(&mut self, tree_id: &ResourceId, entry_id: ResourceId) -> Result<()> {
        match self.nodes.get_mut(tree_id) {
            Some(Resource::RouteTree(tree)) => {
                tree.entries.push(entry_id);
                Ok(())
            }
            _ => Err(RouteGraphError::ResourceNotFound(tree_id.clone())),
        }
    }

    pub fn set_base_url(&mut self, tree_id: &ResourceId, base_url: &str) -> Result<()> {
        match self.nodes.get_mut(tree_id) {
            Some(Resource::RouteTree(tree)) => {
                tree.base_url = Some(base_url.to_string());
                Ok(())
            }
            _ => Err(RouteGraphError::ResourceNotFound(tree_id.clone())),
        }
    }

    /// Attach a handler fragment to a route or middleware entry.
    pub fn add_entry_source(&mut self, entry_id: &ResourceId, fragment: ResourceId) -> Result<()> {
        match self.nodes.get_mut(entry_id) {
            Some(Resource::RouteEntry(entry)) => {
                entry.sources.insert(fragment);
                Ok(())
            }
            Some(Resource::MiddlewareEntry(entry)) => {
                entry.sources.insert(fragment);
                Ok(())
            }
            _ => Err(RouteGraphError::ResourceNotFound(entry_id.clone())),
        }
    }

    /// Record that `from` depends on the fragment `to`.
    pub fn add_fragment_reference(&mut self, from: &ResourceId, to: ResourceId) -> Result<()> {
        match self.nodes.get_mut(from) {
            Some(Resource::SourceFragment(fragment)) => {
                fragment.references.insert(to);
                Ok(())
            }
            _ => Err(RouteGraphError::ResourceNotFound(from.clone())),
        }
    }

    pub fn add_tree_module(&mut self, tree: &ResourceId, module: ResourceId) -> Result<()> {
        match self.nodes.get_mut(tree) {
            Some(Resource::RouteTree(route_tree)) => {
                route_tree.modules.insert(module);
                Ok(())
            }
            _ => Err(RouteGraphError::ResourceNotFound(tree.clone())),
        }
    }

    pub fn add_fragment_module(&mut self, from: &ResourceId, module: ResourceId) -> Result<()> {
        match self.nodes.get_mut(from) {
            Some(Resource::SourceFragment(fragment)) => {
                fragment.modules.insert(module);
                Ok(())
            }
            _ => Err(RouteGraphError::ResourceNotFound(from.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ResourceStore {
        ResourceStore::new("/project", Diagnostics::memory().0)
    }

    #[test]
    fn test_ids_are_project_relative() {
        let mut store = store();
        let tree = store.create_route_tree("app", "Hono", Path::new("/project/src/index.ts"), 6);
        assert_eq!(tree.file, "src/index.ts");
        assert_eq!(tree.id.as_str(), "ROUTE_TREE:src%2Findex.ts@6");
    }

    #[test]
    fn test_duplicate_create_warns_and_keeps_position() {
        let (diagnostics, sink) = Diagnostics::memory();
        let mut store = ResourceStore::new("/project", diagnostics);
        let file = Path::new("/project/a.ts");

        let first = store.create_route_tree("a", "Hono", file, 0).id.clone();
        store.create_route_tree("b", "Hono", file, 10);
        store.append_entry(&first, ResourceId::positioned(ResourceKind::RouteEntry, "a.ts", 3)).unwrap();
        store.create_route_tree("a2", "Hono", file, 0);

        assert_eq!(sink.warnings().len(), 1, "one duplicate warning");
        let names: Vec<_> = store.route_trees().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a2", "b"], "replacement keeps discovery position");
        assert!(store.route_tree(&first).unwrap().entries.is_empty());
    }

    #[test]
    fn test_module_reference_is_shared() {
        let mut store = store();
        let a = store
            .ensure_module_reference("hono", "Hono", ImportStyle::Named, None)
            .id
            .clone();
        let b = store
            .ensure_module_reference("hono", "Hono", ImportStyle::Named, None)
            .id
            .clone();
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_typed_accessors_and_remove() {
        let mut store = store();
        let file = Path::new("/project/a.ts");
        let tree = store.create_route_tree("app", "Hono", file, 0).id.clone();
        let entry = store.create_route_entry(Some(HttpVerb::Get), "/", file, 20).id.clone();

        assert!(store.route_tree(&entry).is_none());
        assert!(matches!(
            store.require_route_tree(&entry),
            Err(RouteGraphError::UnexpectedKind { .. })
        ));
        assert!(store.require_route_tree(&tree).is_ok());

        assert!(store.remove(&tree).is_some());
        assert!(store.get(&tree).is_none());
        assert!(matches!(
            store.require_route_tree(&tree),
            Err(RouteGraphError::ResourceNotFound(_))
        ));
    }

    #[test]
    fn test_relative_path_outside_root() {
        let store = store();
        assert_eq!(store.relative_path(Path::new("/elsewhere/x.ts")), "/elsewhere/x.ts");
        assert_eq!(store.relative_path(Path::new("/project/elsewhere/x.ts")), "elsewhere/x.ts");
        assert_eq!(store.relative_path(Path::new("/project/src/../b.ts")), "src/../b.ts");
        assert_eq!(store.absolute_path("/elsewhere/x.ts"), Path::new("/elsewhere/x.ts"));

        let inside = store.id_for(ResourceKind::SourceFragment, Path::new("/project/elsewhere/x.ts"), 0);
        let outside = store.id_for(ResourceKind::SourceFragment, Path::new("/elsewhere/x.ts"), 0);
        assert_ne!(inside, outside);
    }
}
