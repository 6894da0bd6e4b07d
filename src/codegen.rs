//
//  codegen.rs
//  routegraph
//
//  Created by hak (tharun)
//

//! Turns a visitation trace back into source text.
//!
//! Every visited resource becomes a section keyed by its offset in its own
//! file; per file, imports come first and sections follow in offset order.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::Path;

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::diagnostics::Diagnostics;
use crate::graph::{
    ImportStyle, Resource, ResourceId, ResourceStore, RouteTree, RouteTreeReference,
};

const COMPONENT: &str = "codegen";

/// Rendered source per project-relative file, in first-visited order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct GeneratedFiles(IndexMap<String, String>);

impl GeneratedFiles {
    pub fn get(&self, file: &str) -> Option<&str> {
        self.0.get(file).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(file, content)| (file.as_str(), content.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> IndexMap<String, String> {
        self.0
    }
}

/// All files concatenated, each wrapped in `/* file */ ... /* EOF: file */`.
impl fmt::Display for GeneratedFiles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (file, content)) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "/* {file} */\n{content}\n/* EOF: {file} */")?;
        }
        Ok(())
    }
}

pub struct CodeGenerator<'s> {
    store: &'s ResourceStore,
    include_ids: bool,
    diagnostics: Diagnostics,
}

impl<'s> CodeGenerator<'s> {
    pub fn new(store: &'s ResourceStore, diagnostics: Diagnostics) -> Self {
        Self {
            store,
            include_ids: false,
            diagnostics,
        }
    }

    /// Prefix every section with a `// id: <id>` comment.
    pub fn include_ids(mut self, include: bool) -> Self {
        self.include_ids = include;
        self
    }

    /// Render the resources in `history` (and everything they depend on).
    pub fn generate(&self, history: &[ResourceId]) -> GeneratedFiles {
        let mut pass = Pass {
            store: self.store,
            include_ids: self.include_ids,
            diagnostics: &self.diagnostics,
            owners: owners(self.store),
            files: IndexMap::new(),
            visited: HashSet::new(),
            current: None,
        };
        for id in history {
            pass.visit(id);
        }
        GeneratedFiles(
            pass.files
                .into_iter()
                .map(|(file, sections)| (file, sections.render()))
                .collect(),
        )
    }
}

/// Route tree owning each entry id.
fn owners(store: &ResourceStore) -> HashMap<&ResourceId, &RouteTree> {
    store
        .route_trees()
        .flat_map(|tree| tree.entries.iter().map(move |entry| (entry, tree)))
        .collect()
}

#[derive(Debug, Default)]
struct FileSections {
    /// import path -> bindings, deduplicated.
    imports: IndexMap<String, IndexSet<(ImportStyle, String)>>,
    sections: BTreeMap<usize, String>,
}

impl FileSections {
    fn render(&self) -> String {
        let mut lines = Vec::new();
        for (path, bindings) in &self.imports {
            let mut named = Vec::new();
            for (style, binding) in bindings {
                match style {
                    ImportStyle::Named => named.push(binding.as_str()),
                    ImportStyle::Default | ImportStyle::Namespace => {
                        lines.push(format!("import {binding} from \"{path}\";"));
                    }
                }
            }
            if !named.is_empty() {
                lines.push(format!("import {{ {} }} from \"{path}\";", named.join(", ")));
            }
        }
        lines.extend(self.sections.values().cloned());
        lines.join("\n")
    }
}

struct Pass<'s, 'g> {
    store: &'s ResourceStore,
    include_ids: bool,
    diagnostics: &'g Diagnostics,
    owners: HashMap<&'s ResourceId, &'s RouteTree>,
    files: IndexMap<String, FileSections>,
    visited: HashSet<ResourceId>,
    /// Tree most recently visited; entries of unknown ownership render
    /// against it.
    current: Option<&'s RouteTree>,
}

impl<'s, 'g> Pass<'s, 'g> {
    fn visit(&mut self, id: &ResourceId) {
        if !self.visited.insert(id.clone()) {
            return;
        }
        let store = self.store;
        let Some(resource) = store.get(id) else {
            self.diagnostics
                .warn(COMPONENT, format!("resource {id} not found"));
            return;
        };

        match resource {
            Resource::RouteTree(tree) => self.visit_tree(tree),
            Resource::RouteEntry(entry) => {
                let Some(app) = self.owner_name(&entry.id) else {
                    self.diagnostics
                        .warn(COMPONENT, format!("route entry {id} outside of a route tree"));
                    return;
                };
                let method = entry.method.map_or("all", |m| m.as_str());
                let handlers = self.inline_sources(&entry.file, &entry.sources);
                let args = std::iter::once(format!("\"{}\"", entry.path))
                    .chain(handlers)
                    .collect::<Vec<_>>()
                    .join(", ");
                self.section(&entry.file, entry.offset, id, format!("{app}.{method}({args});"));
            }
            Resource::MiddlewareEntry(entry) => {
                let Some(app) = self.owner_name(&entry.id) else {
                    self.diagnostics
                        .warn(COMPONENT, format!("middleware entry {id} outside of a route tree"));
                    return;
                };
                let handlers = self.inline_sources(&entry.file, &entry.sources);
                let args = (!entry.path.is_empty())
                    .then(|| format!("\"{}\"", entry.path))
                    .into_iter()
                    .chain(handlers)
                    .collect::<Vec<_>>()
                    .join(", ");
                self.section(&entry.file, entry.offset, id, format!("{app}.use({args});"));
            }
            Resource::RouteTreeReference(reference) => {
                let Some(app) = self.owner_name(&reference.id) else {
                    self.diagnostics
                        .warn(COMPONENT, format!("mount {id} outside of a route tree"));
                    return;
                };
                self.mount(app, reference);
            }
            Resource::SourceFragment(fragment) => {
                self.section(&fragment.file, fragment.offset, id, fragment.content.clone());
                self.add_modules(&fragment.file, &fragment.modules);
                for child in &fragment.references {
                    self.visit(child);
                }
            }
            Resource::ModuleReference(_) => {
                self.diagnostics
                    .debug(COMPONENT, format!("skipping bare module reference {id}"));
            }
        }
    }

    fn visit_tree(&mut self, tree: &'s RouteTree) {
        let mount = self.parent_mount(tree);
        let exported = mount.is_some_and(|(_, reference)| reference.file != tree.file);

        let mut content = format!(
            "{}const {} = new {}();",
            if exported { "export " } else { "" },
            tree.name,
            tree.router_type
        );
        if let Some(base_url) = &tree.base_url {
            content.push_str(&format!("\n{}.baseUrl = \"{base_url}\";", tree.name));
        }
        self.section(&tree.file, tree.offset, &tree.id, content);
        self.add_modules(&tree.file, &tree.modules);

        if let Some((parent, reference)) = mount {
            if self.visited.insert(reference.id.clone()) {
                self.mount(&parent.name, reference);
            }
        }
        self.current = Some(tree);
    }

    /// Mount of `tree` inside an already visited tree, checking the most
    /// recent one first. Sibling sub-apps are visited in between a parent
    /// and its matched child.
    fn parent_mount(&self, tree: &RouteTree) -> Option<(&'s RouteTree, &'s RouteTreeReference)> {
        let store = self.store;
        let mounted_in = |parent: &'s RouteTree| {
            parent.entries.iter().find_map(|entry| match store.get(entry) {
                Some(Resource::RouteTreeReference(r)) if r.target_id == tree.id => Some((parent, r)),
                _ => None,
            })
        };
        self.current
            .into_iter()
            .chain(store.route_trees().filter(|t| self.visited.contains(&t.id)))
            .filter(|parent| parent.id != tree.id)
            .find_map(mounted_in)
    }

    /// `app.route("path", target);`, importing the target when it lives in
    /// another file.
    fn mount(&mut self, app: &str, reference: &'s RouteTreeReference) {
        let content = format!("{app}.route(\"{}\", {});", reference.path, reference.target_name);
        self.section(&reference.file, reference.offset, &reference.id, content);

        let store = self.store;
        if let Some(target) = store.route_tree(&reference.target_id) {
            if target.file != reference.file {
                self.file(&reference.file)
                    .imports
                    .entry(relative_specifier(&reference.file, &target.file))
                    .or_default()
                    .insert((ImportStyle::Named, target.name.clone()));
            }
        }
    }

    fn owner_name(&self, entry: &ResourceId) -> Option<&'s str> {
        self.owners
            .get(entry)
            .copied()
            .or(self.current)
            .map(|tree| tree.name.as_str())
    }

    /// Literal text of each handler fragment, pulling its imports into
    /// `file` and visiting its dependencies.
    fn inline_sources(&mut self, file: &str, sources: &'s IndexSet<ResourceId>) -> Vec<String> {
        let store = self.store;
        let mut handlers = Vec::with_capacity(sources.len());
        for source in sources {
            let Some(fragment) = store.source_fragment(source) else {
                self.diagnostics
                    .warn(COMPONENT, format!("source {source} not found"));
                continue;
            };
            self.add_modules(file, &fragment.modules);
            for child in &fragment.references {
                self.visit(child);
            }
            handlers.push(fragment.content.clone());
        }
        handlers
    }

    fn add_modules(&mut self, file: &str, modules: &'s IndexSet<ResourceId>) {
        let store = self.store;
        for id in modules {
            let Some(module) = store.module_reference(id) else {
                self.diagnostics
                    .warn(COMPONENT, format!("module {id} not found"));
                continue;
            };
            self.file(file)
                .imports
                .entry(module.import_path.clone())
                .or_default()
                .insert((module.style, module.binding.clone()));
        }
    }

    fn section(&mut self, file: &str, offset: usize, id: &ResourceId, content: String) {
        let content = if self.include_ids {
            format!("// id: {id}\n{content}")
        } else {
            content
        };
        self.file(file).sections.entry(offset).or_insert(content);
    }

    fn file(&mut self, file: &str) -> &mut FileSections {
        self.files.entry(file.to_string()).or_default()
    }
}

/// Import specifier for `to_file` as seen from `from_file`, both
/// project-relative: `src/index.ts` -> `src/routes/a.ts` is `./routes/a`.
fn relative_specifier(from_file: &str, to_file: &str) -> String {
    let from: Vec<&str> = from_file.split('/').collect();
    let from_dir = &from[..from.len().saturating_sub(1)];
    let target = Path::new(to_file).with_extension("");
    let target = target.to_string_lossy();
    let to: Vec<&str> = target.split('/').collect();

    let common = from_dir
        .iter()
        .zip(&to)
        .take_while(|(a, b)| a == b)
        .count()
        .min(to.len().saturating_sub(1));
    let mut parts = vec![".."; from_dir.len() - common];
    parts.extend(&to[common..]);
    let joined = parts.join("/");
    if joined.starts_with("..") {
        joined
    } else {
        format!("./{joined}")
    }
}
