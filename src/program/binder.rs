//
//  binder.rs
//  routegraph
//
//  Created by hak (tharun)
//

//! Lexical binding resolution within one file.
//!
//! Scopes are found by walking ancestors of a use site: blocks and the
//! program body contribute their declarations (hoisted, order-insensitive),
//! functions contribute parameters, loops and catch clauses their heads.

use tree_sitter::Node;

use super::source::SourceFile;
use super::syntax::{
    is_field_of, is_function, is_identifier, named_children, string_value, within_function,
};
use super::{Declaration, DeclarationKind};

/// Declaration of the identifier starting at `offset`, either because the
/// identifier names it or because it is in scope.
pub(crate) fn declaration_at(file: &SourceFile, offset: usize) -> Option<Declaration> {
    let node = file.named_node_at(offset)?;
    if !is_identifier(node) {
        return None;
    }
    if let Some(decl) = declaration_site(file, node) {
        return Some(decl);
    }
    lookup(file, node, file.node_text(node))
}

/// Resolve `name` as seen from `from`.
pub(crate) fn lookup(file: &SourceFile, from: Node<'_>, name: &str) -> Option<Declaration> {
    let mut current = from.parent();
    while let Some(scope) = current {
        if let Some(decl) = scope_binding(file, scope, name) {
            return Some(decl);
        }
        current = scope.parent();
    }
    None
}

/// A top-level binding of the file.
pub(crate) fn top_level_binding(file: &SourceFile, name: &str) -> Option<Declaration> {
    scope_binding(file, file.root(), name)
}

/// What an exported name of a module refers to.
#[derive(Debug, Clone)]
pub(crate) enum ExportTarget {
    /// Declared (and exported) in this file.
    Declaration(Declaration),
    /// `export { local as name }` or `export default local`.
    Local(String),
    /// `export { x as name } from "..."`; the export specifier itself.
    ReExport(Declaration),
    /// Candidates from `export * from "..."`.
    Star(Vec<String>),
}

/// Find what `file` exports under `name` (`default` for the default export).
pub(crate) fn export_target(file: &SourceFile, name: &str) -> Option<ExportTarget> {
    let mut stars = Vec::new();

    for stmt in named_children(file.root()) {
        if stmt.kind() != "export_statement" {
            continue;
        }
        let source = stmt
            .child_by_field_name("source")
            .and_then(|s| string_value(file.node_text(s)));
        let clause = named_children(stmt)
            .into_iter()
            .find(|n| n.kind() == "export_clause");

        if let Some(clause) = clause {
            for spec in named_children(clause) {
                if spec.kind() != "export_specifier" {
                    continue;
                }
                let Some(local) = spec.child_by_field_name("name") else {
                    continue;
                };
                let exported = spec.child_by_field_name("alias").unwrap_or(local);
                if export_name(file, exported) != name {
                    continue;
                }
                return match source {
                    Some(_) => declaration_site(file, local).map(ExportTarget::ReExport),
                    None => Some(ExportTarget::Local(export_name(file, local))),
                };
            }
            continue;
        }

        if let Some(source) = source {
            let namespaced = named_children(stmt)
                .iter()
                .any(|n| n.kind() == "namespace_export");
            if !namespaced {
                stars.push(source);
            }
            continue;
        }

        let is_default = has_token(stmt, "default");
        if let Some(decl) = stmt.child_by_field_name("declaration") {
            if is_default {
                if name == "default" {
                    return first_binding(file, decl).map(ExportTarget::Declaration);
                }
            } else if let Some(found) = statement_binding(file, decl, name) {
                return Some(ExportTarget::Declaration(found));
            }
        } else if is_default && name == "default" {
            let value = stmt.child_by_field_name("value")?;
            if value.kind() == "identifier" {
                return Some(ExportTarget::Local(file.node_text(value).to_string()));
            }
            return None;
        }
    }

    (!stars.is_empty()).then_some(ExportTarget::Star(stars))
}

fn export_name(file: &SourceFile, node: Node<'_>) -> String {
    let text = file.node_text(node);
    string_value(text).unwrap_or_else(|| text.to_string())
}

fn has_token(node: Node<'_>, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|c| c.kind() == token);
    found
}

/// If `node` is the name of a declaration, that declaration.
fn declaration_site(file: &SourceFile, node: Node<'_>) -> Option<Declaration> {
    let parent = node.parent()?;
    let kind = match parent.kind() {
        "variable_declarator" if is_field_of(parent, "name", node) => DeclarationKind::Variable,
        "function_declaration" | "generator_function_declaration"
            if is_field_of(parent, "name", node) =>
        {
            DeclarationKind::Function
        }
        "function_expression" | "function" | "generator_function"
            if is_field_of(parent, "name", node) =>
        {
            return Some(make(file, DeclarationKind::Function, node, parent, true));
        }
        "class_declaration" | "abstract_class_declaration" if is_field_of(parent, "name", node) => {
            DeclarationKind::Class
        }
        "interface_declaration" if is_field_of(parent, "name", node) => DeclarationKind::Interface,
        "type_alias_declaration" if is_field_of(parent, "name", node) => DeclarationKind::TypeAlias,
        "enum_declaration" if is_field_of(parent, "name", node) => DeclarationKind::Enum,
        "import_specifier" => return Some(import_declaration(file, parent)),
        "namespace_import" => return Some(import_declaration(file, parent)),
        "import_clause" => return Some(import_declaration(file, node)),
        "export_specifier" => return export_specifier_site(file, parent),
        "required_parameter" | "optional_parameter" if is_field_of(parent, "pattern", node) => {
            return Some(make(file, DeclarationKind::Parameter, node, parent, true));
        }
        "arrow_function" if is_field_of(parent, "parameter", node) => {
            return Some(make(file, DeclarationKind::Parameter, node, node, true));
        }
        "catch_clause" if is_field_of(parent, "parameter", node) => {
            return Some(make(file, DeclarationKind::Parameter, node, node, true));
        }
        _ => return pattern_site(file, node),
    };
    Some(make(file, kind, node, parent, within_function(parent)))
}

/// Identifiers inside destructuring patterns.
fn pattern_site(file: &SourceFile, node: Node<'_>) -> Option<Declaration> {
    let mut child = node;
    let mut current = node.parent()?;
    loop {
        match current.kind() {
            "object_pattern" | "array_pattern" | "rest_pattern" | "pair_pattern"
            | "assignment_pattern" | "object_assignment_pattern" => {
                if matches!(current.kind(), "assignment_pattern" | "object_assignment_pattern")
                    && !is_field_of(current, "left", child)
                {
                    return None;
                }
                if current.kind() == "pair_pattern" && !is_field_of(current, "value", child) {
                    return None;
                }
            }
            "variable_declarator" if is_field_of(current, "name", child) => {
                return Some(make(
                    file,
                    DeclarationKind::Variable,
                    node,
                    current,
                    within_function(current),
                ));
            }
            "required_parameter" | "optional_parameter" if is_field_of(current, "pattern", child) => {
                return Some(make(file, DeclarationKind::Parameter, node, current, true));
            }
            _ => return None,
        }
        child = current;
        current = current.parent()?;
    }
}

fn export_specifier_site(file: &SourceFile, spec: Node<'_>) -> Option<Declaration> {
    let stmt = spec.parent().and_then(|clause| clause.parent())?;
    let local = spec.child_by_field_name("name")?;
    let source = stmt
        .child_by_field_name("source")
        .and_then(|s| string_value(file.node_text(s)));

    match source {
        Some(specifier) => {
            let exported = spec.child_by_field_name("alias").unwrap_or(local);
            let mut decl = make(file, DeclarationKind::ExportSpecifier, exported, spec, false);
            decl.name = export_name(file, exported);
            decl.module_specifier = Some(specifier);
            decl.imported_name = Some(export_name(file, local));
            Some(decl)
        }
        None => lookup(file, stmt, file.node_text(local)),
    }
}

fn import_declaration(file: &SourceFile, node: Node<'_>) -> Declaration {
    let (kind, local, imported) = match node.kind() {
        "import_specifier" => {
            let name = node.child_by_field_name("name");
            let local = node.child_by_field_name("alias").or(name).unwrap_or(node);
            let imported = name.map(|n| export_name(file, n));
            (DeclarationKind::ImportSpecifier, local, imported)
        }
        "namespace_import" => {
            let local = named_children(node)
                .into_iter()
                .find(|n| n.kind() == "identifier")
                .unwrap_or(node);
            (DeclarationKind::NamespaceImport, local, None)
        }
        _ => (DeclarationKind::DefaultImport, node, Some("default".to_string())),
    };

    let mut decl = make(file, kind, local, node, false);
    decl.imported_name = imported;
    decl.module_specifier = import_source(file, node);
    decl
}

fn import_source(file: &SourceFile, node: Node<'_>) -> Option<String> {
    let mut current = node.parent();
    while let Some(n) = current {
        if n.kind() == "import_statement" {
            return n
                .child_by_field_name("source")
                .and_then(|s| string_value(file.node_text(s)));
        }
        current = n.parent();
    }
    None
}

fn make(
    file: &SourceFile,
    kind: DeclarationKind,
    name: Node<'_>,
    decl: Node<'_>,
    function_scoped: bool,
) -> Declaration {
    Declaration {
        kind,
        file: file.path().to_path_buf(),
        name: file.node_text(name).to_string(),
        name_offset: name.start_byte(),
        start: decl.start_byte(),
        end: decl.end_byte(),
        syntax_kind: decl.kind().to_string(),
        function_scoped,
        module_specifier: None,
        imported_name: None,
    }
}

// ─── Scopes ─────────────────────────────────────────────────

fn scope_binding(file: &SourceFile, scope: Node<'_>, name: &str) -> Option<Declaration> {
    match scope.kind() {
        "program" | "statement_block" | "switch_body" | "class_static_block" => named_children(scope)
            .into_iter()
            .find_map(|stmt| statement_binding(file, stmt, name)),
        "for_statement" => scope
            .child_by_field_name("initializer")
            .and_then(|init| statement_binding(file, init, name)),
        "for_in_statement" => {
            let left = scope.child_by_field_name("left")?;
            find_name_in_pattern(file, left, name)
                .map(|n| make(file, DeclarationKind::Variable, n, scope, true))
        }
        "catch_clause" => {
            let param = scope.child_by_field_name("parameter")?;
            find_name_in_pattern(file, param, name)
                .map(|n| make(file, DeclarationKind::Parameter, n, n, true))
        }
        kind if is_function(scope) => {
            if let Some(param) = scope.child_by_field_name("parameter") {
                if file.node_text(param) == name {
                    return Some(make(file, DeclarationKind::Parameter, param, param, true));
                }
            }
            if let Some(params) = scope.child_by_field_name("parameters") {
                for param in named_children(params) {
                    let Some(pattern) = param.child_by_field_name("pattern") else {
                        continue;
                    };
                    if let Some(n) = find_name_in_pattern(file, pattern, name) {
                        return Some(make(file, DeclarationKind::Parameter, n, param, true));
                    }
                }
            }
            if matches!(kind, "function_expression" | "function" | "generator_function") {
                let own = scope.child_by_field_name("name")?;
                if file.node_text(own) == name {
                    return Some(make(file, DeclarationKind::Function, own, scope, true));
                }
            }
            None
        }
        _ => None,
    }
}

/// Binding for `name` introduced by one statement.
fn statement_binding(file: &SourceFile, stmt: Node<'_>, name: &str) -> Option<Declaration> {
    match stmt.kind() {
        "lexical_declaration" | "variable_declaration" => {
            named_children(stmt).into_iter().find_map(|declarator| {
                if declarator.kind() != "variable_declarator" {
                    return None;
                }
                let pattern = declarator.child_by_field_name("name")?;
                let found = find_name_in_pattern(file, pattern, name)?;
                Some(make(
                    file,
                    DeclarationKind::Variable,
                    found,
                    declarator,
                    within_function(declarator),
                ))
            })
        }
        "function_declaration" | "generator_function_declaration" | "class_declaration"
        | "abstract_class_declaration" | "interface_declaration" | "type_alias_declaration"
        | "enum_declaration" => {
            let own = stmt.child_by_field_name("name")?;
            if file.node_text(own) != name {
                return None;
            }
            declaration_site(file, own)
        }
        "export_statement" => {
            let decl = stmt.child_by_field_name("declaration")?;
            statement_binding(file, decl, name)
        }
        "ambient_declaration" => named_children(stmt)
            .into_iter()
            .find_map(|inner| statement_binding(file, inner, name)),
        "import_statement" => {
            let clause = named_children(stmt)
                .into_iter()
                .find(|n| n.kind() == "import_clause")?;
            for part in named_children(clause) {
                match part.kind() {
                    "identifier" if file.node_text(part) == name => {
                        return Some(import_declaration(file, part));
                    }
                    "namespace_import" => {
                        let decl = import_declaration(file, part);
                        if decl.name == name {
                            return Some(decl);
                        }
                    }
                    "named_imports" => {
                        for spec in named_children(part) {
                            if spec.kind() != "import_specifier" {
                                continue;
                            }
                            let decl = import_declaration(file, spec);
                            if decl.name == name {
                                return Some(decl);
                            }
                        }
                    }
                    _ => {}
                }
            }
            None
        }
        _ => None,
    }
}

/// First named binding of a declaration (for `export default function f`).
fn first_binding(file: &SourceFile, decl: Node<'_>) -> Option<Declaration> {
    let own = decl.child_by_field_name("name")?;
    declaration_site(file, own)
}

/// The identifier inside a (possibly destructuring) pattern that binds `name`.
fn find_name_in_pattern<'t>(file: &SourceFile, pattern: Node<'t>, name: &str) -> Option<Node<'t>> {
    match pattern.kind() {
        "identifier" | "shorthand_property_identifier_pattern" => {
            (file.node_text(pattern) == name).then_some(pattern)
        }
        "assignment_pattern" | "object_assignment_pattern" => {
            find_name_in_pattern(file, pattern.child_by_field_name("left")?, name)
        }
        "pair_pattern" => find_name_in_pattern(file, pattern.child_by_field_name("value")?, name),
        "object_pattern" | "array_pattern" | "rest_pattern" => named_children(pattern)
            .into_iter()
            .find_map(|child| find_name_in_pattern(file, child, name)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn parse(text: &str) -> SourceFile {
        SourceFile::parse(Path::new("/p/a.ts"), text.to_string(), 1).unwrap()
    }

    fn offset_of(file: &SourceFile, needle: &str, nth: usize) -> usize {
        file.text()
            .match_indices(needle)
            .nth(nth)
            .map(|(i, _)| i)
            .unwrap()
    }

    #[test]
    fn test_resolves_top_level_const() {
        let file = parse("const app = new Hono();\napp.get('/', h);\n");
        let decl = declaration_at(&file, offset_of(&file, "app", 1)).unwrap();
        assert_eq!(decl.kind, DeclarationKind::Variable);
        assert_eq!(decl.name_offset, 6);
        assert_eq!(decl.syntax_kind, "variable_declarator");
        assert!(!decl.function_scoped);
    }

    #[test]
    fn test_parameters_shadow_outer_bindings() {
        let file = parse("const c = 1;\nconst h = (c) => c.text('x');\n");
        let decl = declaration_at(&file, offset_of(&file, "c.text", 0)).unwrap();
        assert_eq!(decl.kind, DeclarationKind::Parameter);
        assert!(decl.function_scoped);
    }

    #[test]
    fn test_locals_inside_functions_are_function_scoped() {
        let file = parse("function f() { const db = open(); return db; }\n");
        let decl = declaration_at(&file, offset_of(&file, "db;", 0)).unwrap();
        assert_eq!(decl.kind, DeclarationKind::Variable);
        assert!(decl.function_scoped);
    }

    #[test]
    fn test_imports_carry_module_and_imported_name() {
        let file = parse(
            "import { Hono as H } from 'hono';\nimport * as z from 'zod';\nimport def from './d';\nH; z; def;\n",
        );
        let h = declaration_at(&file, offset_of(&file, "H;", 0)).unwrap();
        assert_eq!(h.kind, DeclarationKind::ImportSpecifier);
        assert_eq!(h.name, "H");
        assert_eq!(h.imported_name.as_deref(), Some("Hono"));
        assert_eq!(h.module_specifier.as_deref(), Some("hono"));
        assert_eq!(file.node_text(file.node_at(h.start, h.end, None).unwrap()), "Hono as H");

        let z = declaration_at(&file, offset_of(&file, "z;", 0)).unwrap();
        assert_eq!(z.kind, DeclarationKind::NamespaceImport);
        assert_eq!(z.name, "z");

        let d = declaration_at(&file, offset_of(&file, "def;", 0)).unwrap();
        assert_eq!(d.kind, DeclarationKind::DefaultImport);
        assert_eq!(d.module_specifier.as_deref(), Some("./d"));
    }

    #[test]
    fn test_destructured_binding() {
        let file = parse("const { a, b: renamed } = obj;\nrenamed;\n");
        let decl = declaration_at(&file, offset_of(&file, "renamed;", 0)).unwrap();
        assert_eq!(decl.kind, DeclarationKind::Variable);
        assert_eq!(decl.name, "renamed");
    }

    #[test]
    fn test_unknown_global_has_no_declaration() {
        let file = parse("console.log(1);\n");
        assert!(declaration_at(&file, 0).is_none());
    }

    #[test]
    fn test_export_targets() {
        let file = parse(concat!(
            "export const a = 1;\n",
            "const b = 2;\n",
            "export { b as c };\n",
            "export { d } from './d';\n",
            "export * from './star';\n",
            "export default b;\n",
        ));
        assert!(matches!(export_target(&file, "a"), Some(ExportTarget::Declaration(d)) if d.name == "a"));
        assert!(matches!(export_target(&file, "c"), Some(ExportTarget::Local(l)) if l == "b"));
        match export_target(&file, "d") {
            Some(ExportTarget::ReExport(d)) => {
                assert_eq!(d.kind, DeclarationKind::ExportSpecifier);
                assert_eq!(d.module_specifier.as_deref(), Some("./d"));
            }
            other => panic!("expected re-export, got {other:?}"),
        }
        assert!(matches!(export_target(&file, "default"), Some(ExportTarget::Local(l)) if l == "b"));
        assert!(matches!(export_target(&file, "zzz"), Some(ExportTarget::Star(s)) if s == vec!["./star".to_string()]));
    }

    #[test]
    fn test_local_export_specifier_resolves_to_binding() {
        let file = parse("const routes = 1;\nexport { routes };\n");
        let decl = declaration_at(&file, offset_of(&file, "routes", 1)).unwrap();
        assert_eq!(decl.kind, DeclarationKind::Variable);
        assert_eq!(decl.name_offset, 6);
    }
}
