//
//  infer.rs
//  routegraph
//
//  Created by hak (tharun)
//

//! Approximate static typing and constant evaluation.
//!
//! Only what router detection and route-path folding need: constructor
//! names, annotations, factory return types, router method chains, and
//! literal / enum / const-object values.

use tree_sitter::Node;

use super::binder;
use super::source::SourceFile;
use super::syntax::{descendants_in_body, named_children, string_value, unwrap_expression};
use super::typescript::TypeScriptProgram;
use super::{Declaration, DeclarationKind, InferredType, ProgramModel};

const MAX_DEPTH: usize = 24;

/// Router methods that return the router they are called on.
const CHAINING_METHODS: &[&str] = &[
    "get", "post", "put", "delete", "patch", "options", "head", "all", "on", "use", "route",
    "basePath", "mount", "notFound", "onError", "openapi", "doc", "doc31",
];

/// Names that exist without a declaration in every JS runtime.
const GLOBALS: &[&str] = &[
    "Array", "Boolean", "Buffer", "Date", "Error", "Headers", "JSON", "Map", "Math", "Number",
    "Object", "Promise", "Reflect", "RegExp", "Request", "Response", "Set", "String", "Symbol",
    "URL", "URLSearchParams", "WeakMap", "WeakSet", "console", "crypto", "fetch", "globalThis",
    "module", "exports", "process", "require", "setTimeout", "setInterval", "structuredClone",
    "undefined",
];

impl TypeScriptProgram {
    pub(super) fn infer(&self, file: &SourceFile, node: Node<'_>, depth: usize) -> InferredType {
        if depth > MAX_DEPTH {
            return InferredType::Unknown;
        }
        match node.kind() {
            "variable_declarator" => {
                if let Some(annotation) = node.child_by_field_name("type") {
                    return type_name(file, annotation);
                }
                match node.child_by_field_name("value") {
                    Some(value) => self.infer(file, value, depth + 1),
                    None => InferredType::Unknown,
                }
            }
            "as_expression" | "satisfies_expression" => {
                let asserted = node.named_child(1).map(|t| type_name(file, t));
                match asserted {
                    Some(named @ InferredType::Named(_)) => named,
                    _ => self.infer_inner(file, node, depth),
                }
            }
            "parenthesized_expression" | "non_null_expression" | "await_expression" => {
                self.infer_inner(file, node, depth)
            }
            "new_expression" => match node.child_by_field_name("constructor") {
                Some(ctor) => self.constructor_type(file, ctor),
                None => InferredType::Unknown,
            },
            "call_expression" => self.call_type(file, node, depth),
            "identifier" => self.identifier_type(file, node, depth),
            _ => InferredType::Unknown,
        }
    }

    fn infer_inner(&self, file: &SourceFile, node: Node<'_>, depth: usize) -> InferredType {
        match node.named_child(0) {
            Some(inner) => self.infer(file, inner, depth + 1),
            None => InferredType::Unknown,
        }
    }

    fn constructor_type(&self, file: &SourceFile, ctor: Node<'_>) -> InferredType {
        match ctor.kind() {
            "identifier" => {
                let name = file.node_text(ctor);
                let Some(decl) = binder::declaration_at(file, ctor.start_byte()) else {
                    return match unresolved_unless_global(name) {
                        InferredType::Unknown => InferredType::Named(name.to_string()),
                        other => other,
                    };
                };
                if decl.kind.is_import() {
                    return match self.resolve_alias(&decl) {
                        Some(target) if target.kind == DeclarationKind::Class => {
                            InferredType::Named(target.name)
                        }
                        _ => InferredType::Named(
                            decl.imported_name
                                .filter(|n| n != "default")
                                .unwrap_or(decl.name),
                        ),
                    };
                }
                InferredType::Named(decl.name)
            }
            "member_expression" => match ctor.child_by_field_name("property") {
                Some(property) => InferredType::Named(file.node_text(property).to_string()),
                None => InferredType::Unknown,
            },
            _ => InferredType::Unknown,
        }
    }

    fn call_type(&self, file: &SourceFile, call: Node<'_>, depth: usize) -> InferredType {
        let Some(function) = call.child_by_field_name("function") else {
            return InferredType::Unknown;
        };
        match function.kind() {
            "identifier" => {
                let name = file.node_text(function);
                let Some(decl) = binder::declaration_at(file, function.start_byte()) else {
                    return unresolved_unless_global(name);
                };
                let Some(decl) = self.follow(decl) else {
                    return InferredType::Unknown;
                };
                match self.function_node(&decl) {
                    Some((source, func)) => self.return_type(source, func, depth + 1),
                    None => InferredType::Unknown,
                }
            }
            "member_expression" => {
                let (Some(object), Some(property)) = (
                    function.child_by_field_name("object"),
                    function.child_by_field_name("property"),
                ) else {
                    return InferredType::Unknown;
                };
                match self.infer(file, object, depth + 1) {
                    named @ InferredType::Named(_)
                        if CHAINING_METHODS.contains(&file.node_text(property)) =>
                    {
                        named
                    }
                    InferredType::Unresolved => InferredType::Unresolved,
                    _ => InferredType::Unknown,
                }
            }
            _ => InferredType::Unknown,
        }
    }

    fn identifier_type(&self, file: &SourceFile, ident: Node<'_>, depth: usize) -> InferredType {
        let name = file.node_text(ident);
        let Some(decl) = binder::declaration_at(file, ident.start_byte()) else {
            return unresolved_unless_global(name);
        };
        let Some(decl) = self.follow(decl) else {
            return InferredType::Unknown;
        };
        let Some(source) = self.file(&decl.file) else {
            return InferredType::Unknown;
        };
        let Some(node) = source.node_at(decl.start, decl.end, Some(&decl.syntax_kind)) else {
            return InferredType::Unknown;
        };
        match decl.kind {
            DeclarationKind::Variable => self.infer(source, node, depth + 1),
            DeclarationKind::Parameter => match node.child_by_field_name("type") {
                Some(annotation) => type_name(source, annotation),
                None => InferredType::Unknown,
            },
            _ => InferredType::Unknown,
        }
    }

    fn return_type(&self, file: &SourceFile, func: Node<'_>, depth: usize) -> InferredType {
        if depth > MAX_DEPTH {
            return InferredType::Unknown;
        }
        if let Some(annotation) = func.child_by_field_name("return_type") {
            return type_name(file, annotation);
        }
        let Some(body) = func.child_by_field_name("body") else {
            return InferredType::Unknown;
        };
        if body.kind() != "statement_block" {
            return self.infer(file, body, depth + 1);
        }
        descendants_in_body(body, |n| n.kind() == "return_statement")
            .into_iter()
            .filter_map(|ret| ret.named_child(0))
            .map(|expr| self.infer(file, expr, depth + 1))
            .find(|t| matches!(t, InferredType::Named(_)))
            .unwrap_or(InferredType::Unknown)
    }

    /// Resolve aliases; `None` when the chain leaves the project.
    fn follow(&self, decl: Declaration) -> Option<Declaration> {
        if decl.kind.is_alias() {
            self.resolve_alias(&decl)
        } else {
            Some(decl)
        }
    }

    /// The function node behind a function declaration or a variable
    /// initialised with a function expression.
    fn function_node(&self, decl: &Declaration) -> Option<(&SourceFile, Node<'_>)> {
        let source = self.file(&decl.file)?;
        let node = source.node_at(decl.start, decl.end, Some(&decl.syntax_kind))?;
        match decl.kind {
            DeclarationKind::Function => Some((source, node)),
            DeclarationKind::Variable => {
                let value = unwrap_expression(node.child_by_field_name("value")?);
                matches!(value.kind(), "arrow_function" | "function_expression" | "function")
                    .then_some((source, value))
            }
            _ => None,
        }
    }

    // ─── Constants ──────────────────────────────────────────────

    pub(super) fn evaluate(&self, file: &SourceFile, node: Node<'_>, depth: usize) -> Option<String> {
        if depth > MAX_DEPTH {
            return None;
        }
        match node.kind() {
            "string" => string_value(file.node_text(node)),
            "number" => Some(file.node_text(node).to_string()),
            "template_string" => Some(self.expand_template(file, node, depth)),
            "parenthesized_expression" | "as_expression" | "satisfies_expression" => {
                self.evaluate(file, node.named_child(0)?, depth + 1)
            }
            "identifier" => {
                let decl = self.follow(binder::declaration_at(file, node.start_byte())?)?;
                if decl.kind != DeclarationKind::Variable {
                    return None;
                }
                let source = self.file(&decl.file)?;
                let declarator = source.node_at(decl.start, decl.end, Some(&decl.syntax_kind))?;
                self.evaluate(source, declarator.child_by_field_name("value")?, depth + 1)
            }
            "member_expression" => {
                let object = node.child_by_field_name("object")?;
                let property = node.child_by_field_name("property")?;
                self.member_value(file, object, file.node_text(property), depth)
            }
            "subscript_expression" => {
                let object = node.child_by_field_name("object")?;
                let index = node.child_by_field_name("index")?;
                let key = self.evaluate(file, index, depth + 1)?;
                self.member_value(file, object, &key, depth)
            }
            _ => None,
        }
    }

    /// Literal text with each `${...}` folded, or left as written when it
    /// cannot be evaluated.
    fn expand_template(&self, file: &SourceFile, node: Node<'_>, depth: usize) -> String {
        let text = file.text();
        let (start, end) = (node.start_byte() + 1, node.end_byte().saturating_sub(1));
        let mut out = String::new();
        let mut cursor = start;
        for sub in named_children(node)
            .into_iter()
            .filter(|n| n.kind() == "template_substitution")
        {
            out.push_str(text.get(cursor..sub.start_byte()).unwrap_or(""));
            if let Some(expr) = sub.named_child(0) {
                let value = self
                    .evaluate(file, expr, depth + 1)
                    .unwrap_or_else(|| file.node_text(expr).to_string());
                out.push_str(&value);
            }
            cursor = sub.end_byte();
        }
        if cursor < end {
            out.push_str(text.get(cursor..end).unwrap_or(""));
        }
        out
    }

    /// `object.key` where `object` is an enum or a `const` object literal.
    fn member_value(&self, file: &SourceFile, object: Node<'_>, key: &str, depth: usize) -> Option<String> {
        let (source, container) = self.container(file, object, depth + 1)?;
        match container.kind() {
            "enum_declaration" => enum_member_value(self, source, container, key, depth),
            "object" => named_children(container).into_iter().find_map(|pair| {
                if pair.kind() != "pair" {
                    return None;
                }
                let pair_key = pair.child_by_field_name("key")?;
                let pair_name = string_value(source.node_text(pair_key))
                    .unwrap_or_else(|| source.node_text(pair_key).to_string());
                if pair_name != key {
                    return None;
                }
                self.evaluate(source, pair.child_by_field_name("value")?, depth + 1)
            }),
            _ => None,
        }
    }

    /// The enum declaration or object literal an expression refers to.
    fn container<'a>(
        &'a self,
        file: &'a SourceFile,
        expr: Node<'a>,
        depth: usize,
    ) -> Option<(&'a SourceFile, Node<'a>)> {
        if depth > MAX_DEPTH {
            return None;
        }
        let expr = unwrap_expression(expr);
        match expr.kind() {
            "object" => Some((file, expr)),
            "identifier" => {
                let decl = self.follow(binder::declaration_at(file, expr.start_byte())?)?;
                let source = self.file(&decl.file)?;
                let node = source.node_at(decl.start, decl.end, Some(&decl.syntax_kind))?;
                match decl.kind {
                    DeclarationKind::Enum => Some((source, node)),
                    DeclarationKind::Variable => {
                        self.container(source, node.child_by_field_name("value")?, depth + 1)
                    }
                    _ => None,
                }
            }
            "member_expression" => {
                let (source, parent) =
                    self.container(file, expr.child_by_field_name("object")?, depth + 1)?;
                let key = source_text_key(file, expr.child_by_field_name("property")?);
                let value = named_children(parent).into_iter().find_map(|pair| {
                    let pair_key = pair.child_by_field_name("key")?;
                    (source_text_key(source, pair_key) == key)
                        .then(|| pair.child_by_field_name("value"))
                        .flatten()
                })?;
                self.container(source, value, depth + 1)
            }
            _ => None,
        }
    }
}

fn source_text_key(file: &SourceFile, node: Node<'_>) -> String {
    string_value(file.node_text(node)).unwrap_or_else(|| file.node_text(node).to_string())
}

/// Value of an enum member: its initializer, or the auto-incremented
/// number following the previous numeric member.
fn enum_member_value(
    program: &TypeScriptProgram,
    file: &SourceFile,
    decl: Node<'_>,
    key: &str,
    depth: usize,
) -> Option<String> {
    let body = decl.child_by_field_name("body")?;
    let mut next_auto: Option<i64> = Some(0);
    for member in named_children(body) {
        let (name_node, value) = match member.kind() {
            "enum_assignment" => (member.child_by_field_name("name")?, member.child_by_field_name("value")),
            "comment" => continue,
            _ => (member, None),
        };
        let name = source_text_key(file, name_node);
        let evaluated = match value {
            Some(value) => program.evaluate(file, value, depth + 1),
            None => next_auto.map(|n| n.to_string()),
        };
        next_auto = evaluated
            .as_deref()
            .and_then(|v| v.parse::<i64>().ok())
            .map(|n| n + 1);
        if name == key {
            return evaluated;
        }
    }
    None
}

/// Statically known type written in an annotation.
fn type_name(file: &SourceFile, node: Node<'_>) -> InferredType {
    match node.kind() {
        "type_annotation" => match node.named_child(0) {
            Some(inner) => type_name(file, inner),
            None => InferredType::Unknown,
        },
        "type_identifier" | "predefined_type" => InferredType::Named(file.node_text(node).to_string()),
        "generic_type" => {
            let base = node.child_by_field_name("name").map(|n| type_name(file, n));
            match (base, node.child_by_field_name("type_arguments")) {
                (Some(InferredType::Named(name)), Some(args)) => {
                    InferredType::Named(format!("{name}{}", file.node_text(args)))
                }
                (Some(named), _) => named,
                (None, _) => InferredType::Unknown,
            }
        }
        "nested_type_identifier" => match node.child_by_field_name("name") {
            Some(name) => InferredType::Named(file.node_text(name).to_string()),
            None => InferredType::Unknown,
        },
        _ => InferredType::Unknown,
    }
}

fn unresolved_unless_global(name: &str) -> InferredType {
    if GLOBALS.contains(&name) {
        InferredType::Unknown
    } else {
        InferredType::Unresolved
    }
}
