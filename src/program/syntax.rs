//
//  syntax.rs
//  routegraph
//
//  Created by hak (tharun)
//

//! Small tree-sitter helpers shared by the binder and discovery.

use tree_sitter::Node;

/// Node kinds that name a binding at a use site.
pub const IDENTIFIER_KINDS: &[&str] = &[
    "identifier",
    "shorthand_property_identifier",
    "type_identifier",
];

/// Node kinds that open a function scope.
pub const FUNCTION_KINDS: &[&str] = &[
    "function_declaration",
    "generator_function_declaration",
    "function_expression",
    "function",
    "generator_function",
    "arrow_function",
    "method_definition",
];

pub fn is_identifier(node: Node<'_>) -> bool {
    IDENTIFIER_KINDS.contains(&node.kind())
}

pub fn is_function(node: Node<'_>) -> bool {
    FUNCTION_KINDS.contains(&node.kind())
}

pub fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// Whether `node` is the `field` child of its parent.
pub fn is_field_of(parent: Node<'_>, field: &str, node: Node<'_>) -> bool {
    parent
        .child_by_field_name(field)
        .is_some_and(|child| child.id() == node.id())
}

/// Whether any ancestor of `node` is a function.
pub fn within_function(node: Node<'_>) -> bool {
    let mut current = node.parent();
    while let Some(n) = current {
        if is_function(n) {
            return true;
        }
        current = n.parent();
    }
    false
}

/// Pre-order list of nodes below (and including) `node` matching `predicate`.
pub fn descendants<'t>(node: Node<'t>, predicate: impl Fn(Node<'t>) -> bool) -> Vec<Node<'t>> {
    let mut found = Vec::new();
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if predicate(current) {
            found.push(current);
        }
        let mut cursor = current.walk();
        let children: Vec<_> = current.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    found
}

/// Like [`descendants`], without entering nested functions below `node`.
pub fn descendants_in_body<'t>(
    node: Node<'t>,
    predicate: impl Fn(Node<'t>) -> bool,
) -> Vec<Node<'t>> {
    let mut found = Vec::new();
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if predicate(current) {
            found.push(current);
        }
        if current.id() != node.id() && is_function(current) {
            continue;
        }
        let mut cursor = current.walk();
        let children: Vec<_> = current.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    found
}

/// Strip wrappers that do not change an expression's value.
pub fn unwrap_expression(node: Node<'_>) -> Node<'_> {
    let mut current = node;
    loop {
        match current.kind() {
            "parenthesized_expression" | "non_null_expression" | "await_expression"
            | "as_expression" | "satisfies_expression" => match current.named_child(0) {
                Some(inner) => current = inner,
                None => return current,
            },
            _ => return current,
        }
    }
}

/// Contents of a quoted string literal.
pub fn string_value(text: &str) -> Option<String> {
    let mut chars = text.chars();
    let quote = chars.next()?;
    if !matches!(quote, '"' | '\'') || text.len() < 2 || !text.ends_with(quote) {
        return None;
    }
    Some(unescape(&text[1..text.len() - 1]))
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// One `.method(args)` step of a call chain.
#[derive(Debug, Clone, Copy)]
pub struct ChainCall<'t> {
    pub call: Node<'t>,
    pub property: Node<'t>,
}

/// Split `base.a(..).b(..)` into its base expression and calls, innermost
/// (= first in source) first.
pub fn unwind_chain(expr: Node<'_>) -> (Node<'_>, Vec<ChainCall<'_>>) {
    let mut calls = Vec::new();
    let mut current = expr;
    loop {
        if current.kind() != "call_expression" {
            break;
        }
        let Some(function) = current.child_by_field_name("function") else {
            break;
        };
        if function.kind() != "member_expression" {
            break;
        }
        let (Some(object), Some(property)) = (
            function.child_by_field_name("object"),
            function.child_by_field_name("property"),
        ) else {
            break;
        };
        calls.push(ChainCall {
            call: current,
            property,
        });
        current = object;
    }
    calls.reverse();
    (current, calls)
}

/// If `node` is the object of `node.method(..)`, that call.
pub fn method_call_on(node: Node<'_>) -> Option<ChainCall<'_>> {
    let member = node.parent()?;
    if member.kind() != "member_expression" || !is_field_of(member, "object", node) {
        return None;
    }
    let call = member.parent()?;
    if call.kind() != "call_expression" || !is_field_of(call, "function", member) {
        return None;
    }
    Some(ChainCall {
        call,
        property: member.child_by_field_name("property")?,
    })
}

/// Argument expressions of a call, comments skipped.
pub fn call_arguments(call: Node<'_>) -> Vec<Node<'_>> {
    call.child_by_field_name("arguments")
        .filter(|args| args.kind() == "arguments")
        .map(|args| {
            named_children(args)
                .into_iter()
                .filter(|n| n.kind() != "comment")
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::SourceFile;
    use std::path::Path;

    fn parse(text: &str) -> SourceFile {
        SourceFile::parse(Path::new("/p/t.ts"), text.to_string(), 1).unwrap()
    }

    #[test]
    fn test_string_value() {
        assert_eq!(string_value("\"/users\"").as_deref(), Some("/users"));
        assert_eq!(string_value("'a\\'b'").as_deref(), Some("a'b"));
        assert_eq!(string_value("`x`"), None);
        assert_eq!(string_value("\""), None);
    }

    #[test]
    fn test_unwind_chain_orders_calls() {
        let file = parse("new Hono().get('/a', h).post('/b', h);");
        let calls = descendants(file.root(), |n| n.kind() == "call_expression");
        let outer = calls[0];
        let (base, chain) = unwind_chain(outer);
        assert_eq!(base.kind(), "new_expression");
        let names: Vec<_> = chain.iter().map(|c| file.node_text(c.property)).collect();
        assert_eq!(names, vec!["get", "post"]);
    }

    #[test]
    fn test_method_call_on_object() {
        let file = parse("app.use(mw);");
        let app = descendants(file.root(), |n| file.node_text(n) == "app" && n.kind() == "identifier")[0];
        let call = method_call_on(app).unwrap();
        assert_eq!(file.node_text(call.property), "use");
        assert_eq!(call_arguments(call.call).len(), 1);

        let mw = descendants(file.root(), |n| file.node_text(n) == "mw")[0];
        assert!(method_call_on(mw).is_none(), "arguments are not call objects");
    }

    #[test]
    fn test_descendants_in_body_skips_nested_functions() {
        let file = parse("function f() { return a; function g() { return b; } }");
        let f = descendants(file.root(), |n| n.kind() == "function_declaration")[0];
        let body = f.child_by_field_name("body").unwrap();
        let returns = descendants_in_body(body, |n| n.kind() == "return_statement");
        assert_eq!(returns.len(), 1);
        assert!(within_function(returns[0]));
    }
}
