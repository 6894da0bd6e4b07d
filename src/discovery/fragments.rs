//
//  fragments.rs
//  routegraph
//
//  Created by hak (tharun)
//

//! Handler source extraction.
//!
//! A fragment is the literal text of a handler or helper, shaped so it can
//! be pasted back into a file on its own, plus links to the fragments and
//! imports it needs. Fragments are keyed by (file, offset) and reused, so a
//! helper shared by many routes is extracted once.

use std::path::{Path, PathBuf};

use tree_sitter::Node;

use super::{record, SearchContext, COMPONENT};
use crate::graph::{ImportStyle, PackageIdentity, ResourceId, ResourceKind};
use crate::program::syntax::{descendants, is_identifier};
use crate::program::{Declaration, DeclarationKind, SourceFile};

/// The fragment currently being filled.
#[derive(Clone, Copy)]
struct Owner<'r> {
    id: &'r ResourceId,
    file: &'r Path,
    start: usize,
    end: usize,
}

impl<'a> SearchContext<'a> {
    /// Create (or reuse) the fragment for `node` and everything it depends on.
    pub(super) fn extract_fragment(&mut self, source: &'a SourceFile, node: Node<'a>) -> ResourceId {
        let file = source.path();
        let id = self
            .store
            .id_for(ResourceKind::SourceFragment, file, node.start_byte());
        if self.store.contains(&id) {
            self.diagnostics
                .debug(COMPONENT, format!("reusing fragment {id}"));
            return id;
        }

        let at = node.start_position();
        self.store.create_source_fragment(
            &fragment_content(source, node),
            file,
            node.start_byte(),
            at.row,
            at.column,
        );

        let owner = Owner {
            id: &id,
            file,
            start: node.start_byte(),
            end: node.end_byte(),
        };
        for ident in descendants(node, is_identifier) {
            self.visit_identifier(owner, source, ident);
        }
        id
    }

    fn visit_identifier(&mut self, owner: Owner<'_>, source: &'a SourceFile, ident: Node<'a>) {
        let program = self.program;
        let Some(declaration) = program.declaration_of(source.path(), ident.start_byte()) else {
            return;
        };

        let target = if declaration.kind.is_import() {
            match self.visit_import(owner, &declaration) {
                Some(target) => target,
                None => return,
            }
        } else if declaration.kind == DeclarationKind::ExportSpecifier
            && declaration.overlaps(owner.file, owner.start, owner.end)
        {
            // The fragment is the re-export itself: continue to what it names.
            match self.follow_reexport(&declaration) {
                Some(target) => target,
                None => return,
            }
        } else {
            declaration
        };

        if target.function_scoped || program.is_external_file(&target.file) {
            return;
        }
        let Some((target_source, value)) = self.declaration_value(&target) else {
            return;
        };
        let overlaps = target_source.path() == owner.file
            && value.start_byte() < owner.end
            && owner.start < value.end_byte();
        if overlaps {
            return;
        }

        let dependency = self.extract_fragment(target_source, value);
        record(
            &self.diagnostics,
            self.store.add_fragment_reference(owner.id, dependency),
        );
    }

    /// Record the module reference for an imported name. Returns the
    /// project declaration to continue from, `None` for external packages.
    fn visit_import(&mut self, owner: Owner<'_>, declaration: &Declaration) -> Option<Declaration> {
        let (module_id, local_file) = self.import_module(declaration)?;
        record(
            &self.diagnostics,
            self.store.add_fragment_module(owner.id, module_id),
        );

        let local_file = local_file?;
        self.declaration_in(declaration, &local_file)
            .or_else(|| self.program.resolve_alias(declaration))
    }

    /// Attach the import of `new X()` in a router initializer to the tree.
    pub(super) fn record_constructor_import(&mut self, tree_id: &ResourceId, source: &'a SourceFile, constructor: Node<'a>) {
        if constructor.kind() != "identifier" {
            return;
        }
        let Some(declaration) = self.program.declaration_of(source.path(), constructor.start_byte()) else {
            return;
        };
        if !declaration.kind.is_import() {
            return;
        }
        if let Some((module_id, _)) = self.import_module(&declaration) {
            record(&self.diagnostics, self.store.add_tree_module(tree_id, module_id));
        }
    }

    /// Module reference for an import declaration, plus the project file it
    /// resolves to (`None` for packages).
    fn import_module(&mut self, declaration: &Declaration) -> Option<(ResourceId, Option<PathBuf>)> {
        let specifier = declaration.module_specifier.clone()?;
        let binding = self.binding_text(declaration)?;
        let style = match declaration.kind {
            DeclarationKind::DefaultImport => ImportStyle::Default,
            DeclarationKind::NamespaceImport => ImportStyle::Namespace,
            _ => ImportStyle::Named,
        };

        let resolved = self.program.resolve_module(&specifier, &declaration.file);
        let local_file = resolved
            .as_ref()
            .filter(|r| !r.is_external)
            .and_then(|r| r.resolved_file.clone());

        let package = match (&resolved, &local_file) {
            (_, Some(_)) => None,
            (Some(r), None) => Some(PackageIdentity {
                name: r.package_name.clone().unwrap_or_else(|| specifier.clone()),
                version: r.package_version.clone(),
            }),
            (None, None) => Some(PackageIdentity {
                name: specifier.clone(),
                version: None,
            }),
        };
        let module_id = self
            .store
            .ensure_module_reference(&specifier, &binding, style, package)
            .id
            .clone();
        Some((module_id, local_file))
    }

    /// Continue an `export { x } from "./x"` to the declaration of `x`.
    fn follow_reexport(&self, declaration: &Declaration) -> Option<Declaration> {
        let specifier = declaration.module_specifier.as_deref()?;
        let resolved = self.program.resolve_module(specifier, &declaration.file)?;
        if resolved.is_external {
            return None;
        }
        let file = resolved.resolved_file?;
        self.declaration_in(declaration, &file)
            .or_else(|| self.program.resolve_alias(declaration))
    }

    /// The symbol's declaration as seen from `file`, found through the
    /// symbol's occurrences in that file. Stops at re-exports, so a barrel
    /// becomes a fragment of its own.
    fn declaration_in(&self, declaration: &Declaration, file: &Path) -> Option<Declaration> {
        self.program
            .find_references(&declaration.file, declaration.name_offset)
            .into_iter()
            .filter(|location| location.file == file)
            .filter_map(|location| self.program.declaration_of(&location.file, location.offset))
            .find(|d| d.file == file && !d.kind.is_import())
    }

    /// Node to extract for a declaration: the declarator for variables,
    /// the declaration itself otherwise.
    fn declaration_value(&self, declaration: &Declaration) -> Option<(&'a SourceFile, Node<'a>)> {
        let program = self.program;
        match declaration.kind {
            DeclarationKind::Variable
            | DeclarationKind::Function
            | DeclarationKind::Class
            | DeclarationKind::Interface
            | DeclarationKind::TypeAlias
            | DeclarationKind::Enum
            | DeclarationKind::ExportSpecifier => {
                let source = program.source(&declaration.file)?;
                let node = source.node_at(
                    declaration.start,
                    declaration.end,
                    Some(&declaration.syntax_kind),
                )?;
                Some((source, node))
            }
            DeclarationKind::Parameter
            | DeclarationKind::ImportSpecifier
            | DeclarationKind::DefaultImport
            | DeclarationKind::NamespaceImport => None,
        }
    }

    /// Literal binding text: `Hono`, `Hono as H`, `* as z`.
    fn binding_text(&self, declaration: &Declaration) -> Option<String> {
        let source = self.program.source(&declaration.file)?;
        let node = source.node_at(declaration.start, declaration.end, Some(&declaration.syntax_kind))?;
        Some(source.node_text(node).to_string())
    }
}

/// Text for `node` that stands on its own when re-inserted.
fn fragment_content(source: &SourceFile, node: Node<'_>) -> String {
    let statement = match node.kind() {
        "variable_declarator" => node.parent(),
        "export_specifier" => {
            let statement = node.parent().and_then(|clause| clause.parent());
            let from = statement
                .and_then(|s| s.child_by_field_name("source"))
                .map(|s| source.node_text(s).to_string())
                .unwrap_or_else(|| "\"\"".to_string());
            return format!("export {{ {} }} from {from}", source.node_text(node));
        }
        _ => node
            .parent()
            .filter(|p| p.kind() == "variable_declarator" && is_value_of(*p, node))
            .and_then(|declarator| declarator.parent()),
    };

    let target = match statement {
        Some(statement) => statement,
        None => node,
    };
    let exported = target
        .parent()
        .filter(|p| p.kind() == "export_statement");
    source.node_text(exported.unwrap_or(target)).to_string()
}

fn is_value_of(declarator: Node<'_>, node: Node<'_>) -> bool {
    declarator
        .child_by_field_name("value")
        .is_some_and(|value| value.id() == node.id())
}
