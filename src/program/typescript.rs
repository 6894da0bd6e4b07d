//
//  typescript.rs
//  routegraph
//
//  Created by hak (tharun)
//

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rayon::prelude::*;

use super::binder::{self, ExportTarget};
use super::source::SourceFile;
use super::syntax::{descendants, is_identifier, named_children};
use super::walk::source_files;
use super::{Declaration, DeclarationKind, InferredType, Location, ProgramModel, ResolvedModule};
use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::graph::PackageIdentity;

pub(super) const COMPONENT: &str = "program";

/// Bound on `export *` / alias hops followed for one lookup.
const MAX_ALIAS_HOPS: usize = 32;

/// tree-sitter backed [`ProgramModel`] for TypeScript and JavaScript projects.
#[derive(Debug)]
pub struct TypeScriptProgram {
    root: PathBuf,
    files: BTreeMap<PathBuf, SourceFile>,
    /// package.json lookups, keyed by package directory.
    pub(super) packages: Mutex<HashMap<PathBuf, Option<PackageIdentity>>>,
    pub(super) diagnostics: Diagnostics,
}

impl TypeScriptProgram {
    /// Empty program rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files: BTreeMap::new(),
            packages: Mutex::new(HashMap::new()),
            diagnostics: Diagnostics::tracing(),
        }
    }

    /// Route this program's diagnostics to `diagnostics`.
    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Load every analysable file under `locations`, parsing in parallel.
    pub fn load(
        root: impl Into<PathBuf>,
        locations: &[PathBuf],
        extensions: &[String],
        ignore: &[String],
        diagnostics: Diagnostics,
    ) -> Self {
        let mut program = Self::new(root).with_diagnostics(diagnostics);
        let paths = source_files(locations, extensions, ignore);

        let diagnostics = &program.diagnostics;
        let parsed: Vec<SourceFile> = paths
            .par_iter()
            .filter_map(|path| {
                let text = match fs::read_to_string(path) {
                    Ok(text) => text,
                    Err(e) => {
                        diagnostics.warn(COMPONENT, format!("failed to read {}: {e}", path.display()));
                        return None;
                    }
                };
                match SourceFile::parse(path, text, 1) {
                    Ok(file) => Some(file),
                    Err(e) => {
                        diagnostics.warn(COMPONENT, format!("failed to parse {}: {e}", path.display()));
                        None
                    }
                }
            })
            .collect();

        diagnostics.debug(COMPONENT, format!("{} file(s) loaded", parsed.len()));
        for file in parsed {
            program.files.insert(file.path().to_path_buf(), file);
        }
        program
    }

    /// Program over in-memory sources.
    pub fn from_sources<I, P, S>(root: impl Into<PathBuf>, sources: I) -> Result<Self>
    where
        I: IntoIterator<Item = (P, S)>,
        P: AsRef<Path>,
        S: Into<String>,
    {
        let mut program = Self::new(root);
        for (path, text) in sources {
            program.upsert_file(path.as_ref(), text.into())?;
        }
        Ok(program)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub(super) fn file(&self, path: &Path) -> Option<&SourceFile> {
        self.files.get(path)
    }

    pub(super) fn has_file(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    /// Resolve a specifier to a project file, if it is local.
    pub(super) fn local_module(&self, specifier: &str, from: &Path) -> Option<PathBuf> {
        match self.resolve_module(specifier, from) {
            Some(ResolvedModule {
                is_external: false,
                resolved_file,
                ..
            }) => resolved_file,
            _ => None,
        }
    }

    /// Declaration `file` exports as `name`, one hop only.
    fn exported_declaration(
        &self,
        file: &Path,
        name: &str,
        seen: &mut HashSet<PathBuf>,
    ) -> Option<Declaration> {
        if !seen.insert(file.to_path_buf()) || seen.len() > MAX_ALIAS_HOPS {
            return None;
        }
        let source = self.files.get(file)?;
        match binder::export_target(source, name)? {
            ExportTarget::Declaration(decl) | ExportTarget::ReExport(decl) => Some(decl),
            ExportTarget::Local(local) => binder::top_level_binding(source, &local),
            ExportTarget::Star(specifiers) => specifiers.iter().find_map(|specifier| {
                let target = self.local_module(specifier, file)?;
                self.exported_declaration(&target, name, seen)
            }),
        }
    }

    /// Fully alias-resolved identity of a declaration.
    fn canonical_key(&self, decl: &Declaration) -> (PathBuf, usize) {
        let resolved = if decl.kind.is_alias() {
            self.resolve_alias(decl).unwrap_or_else(|| decl.clone())
        } else {
            decl.clone()
        };
        (resolved.file, resolved.name_offset)
    }

    /// Local names that may refer to the symbol, across import/export renames.
    fn candidate_names(&self, seeds: &[&str]) -> HashSet<String> {
        let mut names: HashSet<String> = seeds.iter().map(|s| s.to_string()).collect();
        let renames: Vec<(String, String)> = self
            .files
            .values()
            .flat_map(|file| {
                descendants(file.root(), |n| {
                    matches!(n.kind(), "import_specifier" | "export_specifier" | "import_clause")
                })
                .into_iter()
                .flat_map(|node| renames_in(file, node))
                .collect::<Vec<_>>()
            })
            .collect();

        loop {
            let before = names.len();
            for (from, to) in &renames {
                if names.contains(from) {
                    names.insert(to.clone());
                }
            }
            if names.len() == before {
                return names;
            }
        }
    }
}

/// `(imported, local)` name pairs introduced by an import/export node.
fn renames_in(file: &SourceFile, node: tree_sitter::Node<'_>) -> Vec<(String, String)> {
    match node.kind() {
        "import_clause" => named_children(node)
            .into_iter()
            .filter(|n| n.kind() == "identifier")
            .map(|n| ("default".to_string(), file.node_text(n).to_string()))
            .collect(),
        _ => {
            let (Some(name), Some(alias)) = (
                node.child_by_field_name("name"),
                node.child_by_field_name("alias"),
            ) else {
                return Vec::new();
            };
            vec![(
                file.node_text(name).to_string(),
                file.node_text(alias).to_string(),
            )]
        }
    }
}

impl ProgramModel for TypeScriptProgram {
    fn root(&self) -> &Path {
        &self.root
    }

    fn files(&self) -> Vec<&Path> {
        self.files.keys().map(|p| p.as_path()).collect()
    }

    fn source(&self, file: &Path) -> Option<&SourceFile> {
        self.files.get(file)
    }

    fn upsert_file(&mut self, file: &Path, text: String) -> Result<u32> {
        let version = self.files.get(file).map_or(1, |f| f.version() + 1);
        let parsed = SourceFile::parse(file, text, version)?;
        self.files.insert(file.to_path_buf(), parsed);
        Ok(version)
    }

    fn remove_file(&mut self, file: &Path) -> bool {
        self.files.remove(file).is_some()
    }

    fn declaration_of(&self, file: &Path, offset: usize) -> Option<Declaration> {
        binder::declaration_at(self.files.get(file)?, offset)
    }

    fn resolve_alias(&self, declaration: &Declaration) -> Option<Declaration> {
        let mut current = declaration.clone();
        let mut hops = 0;
        while current.kind.is_alias() {
            hops += 1;
            if hops > MAX_ALIAS_HOPS {
                return None;
            }
            let imported = match current.kind {
                DeclarationKind::NamespaceImport => return None,
                _ => current.imported_name.clone()?,
            };
            let specifier = current.module_specifier.clone()?;
            let target = self.local_module(&specifier, &current.file)?;
            current = self.exported_declaration(&target, &imported, &mut HashSet::new())?;
        }
        Some(current)
    }

    fn find_references(&self, file: &Path, offset: usize) -> Vec<Location> {
        let Some(target) = self.declaration_of(file, offset) else {
            return Vec::new();
        };
        let key = self.canonical_key(&target);
        let resolved_name = self
            .resolve_alias(&target)
            .map(|d| d.name)
            .unwrap_or_else(|| target.name.clone());
        let names = self.candidate_names(&[target.name.as_str(), resolved_name.as_str()]);

        let mut locations = Vec::new();
        for (path, source) in &self.files {
            if !names.iter().any(|n| source.text().contains(n.as_str())) {
                continue;
            }
            let occurrences = descendants(source.root(), |n| {
                is_identifier(n) && names.contains(source.node_text(n))
            });
            for node in occurrences {
                let Some(decl) = binder::declaration_at(source, node.start_byte()) else {
                    continue;
                };
                if self.canonical_key(&decl) == key {
                    locations.push(Location {
                        file: path.clone(),
                        offset: node.start_byte(),
                    });
                }
            }
        }
        locations
    }

    fn resolve_module(&self, specifier: &str, from: &Path) -> Option<ResolvedModule> {
        self.resolve_specifier(specifier, from)
    }

    fn type_of(&self, file: &Path, start: usize, end: usize) -> InferredType {
        let Some(source) = self.files.get(file) else {
            return InferredType::Unknown;
        };
        match source.node_at(start, end, None) {
            Some(node) => self.infer(source, node, 0),
            None => InferredType::Unknown,
        }
    }

    fn constant_value(&self, file: &Path, start: usize, end: usize) -> Option<String> {
        let source = self.files.get(file)?;
        let node = source.node_at(start, end, None)?;
        self.evaluate(source, node, 0)
    }
}
