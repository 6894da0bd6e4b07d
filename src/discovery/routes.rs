//
//  routes.rs
//  routegraph
//
//  Created by hak (tharun)
//

use std::str::FromStr;

use tree_sitter::Node;

use super::{record, SearchContext, COMPONENT};
use crate::graph::{HttpVerb, ResourceId, ResourceKind};
use crate::program::syntax::{
    call_arguments, descendants, descendants_in_body, method_call_on, named_children,
    string_value, unwind_chain, unwrap_expression, ChainCall,
};
use crate::program::{Declaration, DeclarationKind, InferredType, SourceFile};

/// Argument kinds accepted as route handlers and middleware.
pub(super) const HANDLER_KINDS: &[&str] = &[
    "arrow_function",
    "function_expression",
    "function",
    "call_expression",
    "identifier",
    "member_expression",
];

impl<'a> SearchContext<'a> {
    /// Look for router declarations among the statements of `scope`
    /// (a program or a function body).
    pub(super) fn visit_scope(&mut self, source: &'a SourceFile, scope: Node<'a>) {
        for stmt in named_children(scope) {
            let declaration = match stmt.kind() {
                "lexical_declaration" | "variable_declaration" => Some(stmt),
                "export_statement" => stmt
                    .child_by_field_name("declaration")
                    .filter(|d| matches!(d.kind(), "lexical_declaration" | "variable_declaration")),
                _ => None,
            };
            let Some(declaration) = declaration else {
                continue;
            };
            for declarator in named_children(declaration) {
                if declarator.kind() == "variable_declarator" {
                    self.visit_declarator(source, declarator);
                }
            }
        }
    }

    fn visit_declarator(&mut self, source: &'a SourceFile, declarator: Node<'a>) {
        let Some(name) = declarator.child_by_field_name("name") else {
            return;
        };
        if name.kind() != "identifier" {
            return;
        }

        let file = source.path();
        let inferred = self
            .program
            .type_of(file, declarator.start_byte(), declarator.end_byte());
        if inferred == InferredType::Unresolved {
            self.error_count += 1;
            let at = declarator.start_position();
            self.diagnostics.info(
                COMPONENT,
                format!(
                    "type check failed for `{}` at {}:{}:{}",
                    source.node_text(name),
                    file.display(),
                    at.row + 1,
                    at.column + 1
                ),
            );
            return;
        }
        let Some(router_type) = self.config.router_type_for(|t| inferred.matches(t)) else {
            return;
        };
        let router_type = router_type.to_string();

        let tree_id = self
            .store
            .id_for(ResourceKind::RouteTree, file, name.start_byte());
        if self.store.contains(&tree_id) {
            self.diagnostics
                .debug(COMPONENT, format!("route tree {tree_id} already discovered"));
            return;
        }
        self.store.create_route_tree(
            source.node_text(name),
            &router_type,
            file,
            name.start_byte(),
        );

        // TODO: `let app: Hono; app = new Hono();` is not followed, only
        // initializers are.
        if let Some(value) = declarator.child_by_field_name("value") {
            let (base, chain) = unwind_chain(unwrap_expression(value));
            match base.kind() {
                "call_expression" => self.visit_factory_call(&tree_id, source, base),
                "new_expression" => {
                    if let Some(constructor) = base.child_by_field_name("constructor") {
                        self.record_constructor_import(&tree_id, source, constructor);
                    }
                }
                _ => {}
            }
            for call in chain {
                self.classify_call(&tree_id, source, call);
            }
        }

        let references = self.program.find_references(file, name.start_byte());
        for location in references {
            if location.file != file || location.offset == name.start_byte() {
                continue;
            }
            let Some(node) = source.named_node_at(location.offset) else {
                continue;
            };
            let mut object = node;
            while let Some(call) = method_call_on(object) {
                self.classify_call(&tree_id, source, call);
                object = call.call;
            }
        }
    }

    // ─── Factories ──────────────────────────────────────────────

    /// `const app = createApp()`: discover routers inside the factory and
    /// mount what it returns.
    fn visit_factory_call(&mut self, tree_id: &ResourceId, source: &'a SourceFile, call: Node<'a>) {
        let Some(callee) = call.child_by_field_name("function") else {
            return;
        };
        if callee.kind() != "identifier" {
            return;
        }
        let Some(declaration) = self.resolved_declaration(source, callee) else {
            self.diagnostics.debug(
                COMPONENT,
                format!("no factory found for {}", source.node_text(call)),
            );
            return;
        };
        let Some((factory_source, function)) = self.function_node(&declaration) else {
            return;
        };

        let key = (declaration.file.clone(), declaration.start);
        if !self.active_factories.insert(key.clone()) {
            return;
        }

        let Some(body) = function.child_by_field_name("body") else {
            self.active_factories.remove(&key);
            return;
        };
        let returned: Vec<Node<'a>> = if body.kind() == "statement_block" {
            self.visit_scope(factory_source, body);
            descendants_in_body(body, |n| n.kind() == "return_statement")
                .into_iter()
                .filter_map(|ret| ret.named_child(0))
                .collect()
        } else {
            vec![body]
        };

        for expression in returned {
            for ident in descendants(expression, |n| n.kind() == "identifier") {
                self.mount_returned_router(tree_id, factory_source, ident);
            }
        }
        self.active_factories.remove(&key);
    }

    fn mount_returned_router(&mut self, tree_id: &ResourceId, source: &'a SourceFile, ident: Node<'a>) {
        let Some(target) = self.program.declaration_of(source.path(), ident.start_byte()) else {
            return;
        };
        if target.kind != DeclarationKind::Variable || !self.is_router(&target) {
            return;
        }
        let target_id = self
            .store
            .id_for(ResourceKind::RouteTree, &target.file, target.name_offset);
        let reference_id = self
            .store
            .create_route_tree_reference(
                "/",
                target_id,
                &target.name,
                source.path(),
                ident.start_byte(),
            )
            .id
            .clone();
        record(&self.diagnostics, self.store.append_entry(tree_id, reference_id));
    }

    fn is_router(&self, declaration: &Declaration) -> bool {
        let inferred = self
            .program
            .type_of(&declaration.file, declaration.start, declaration.end);
        self.config.router_type_for(|t| inferred.matches(t)).is_some()
    }

    /// Function node behind a function declaration, or a variable bound to
    /// a function expression.
    fn function_node(&self, declaration: &Declaration) -> Option<(&'a SourceFile, Node<'a>)> {
        let program = self.program;
        let source = program.source(&declaration.file)?;
        let node = source.node_at(declaration.start, declaration.end, Some(&declaration.syntax_kind))?;
        match declaration.kind {
            DeclarationKind::Function => Some((source, node)),
            DeclarationKind::Variable => {
                let value = unwrap_expression(node.child_by_field_name("value")?);
                matches!(value.kind(), "arrow_function" | "function_expression" | "function")
                    .then_some((source, value))
            }
            _ => None,
        }
    }

    /// Declaration of `ident`, with import aliases followed.
    fn resolved_declaration(&self, source: &SourceFile, ident: Node<'_>) -> Option<Declaration> {
        let declaration = self.program.declaration_of(source.path(), ident.start_byte())?;
        if self.program.is_alias(&declaration) {
            self.program.resolve_alias(&declaration)
        } else {
            Some(declaration)
        }
    }

    // ─── Method calls ───────────────────────────────────────────

    fn classify_call(&mut self, tree_id: &ResourceId, source: &'a SourceFile, call: ChainCall<'a>) {
        let method = source.node_text(call.property);
        match method {
            "route" => self.handle_route(tree_id, source, call),
            "use" => self.handle_use(tree_id, source, call),
            "openapi" => self.handle_openapi(tree_id, source, call),
            "all" => self.handle_verb(tree_id, source, call, None),
            name if self.config.is_base_url_method(name) => {
                let base_url = call_arguments(call.call)
                    .first()
                    .and_then(|arg| string_value(source.node_text(*arg)));
                if let Some(base_url) = base_url {
                    record(&self.diagnostics, self.store.set_base_url(tree_id, &base_url));
                }
            }
            name if self.config.is_http_method(name) => match HttpVerb::from_str(name) {
                Ok(verb) => self.handle_verb(tree_id, source, call, Some(verb)),
                Err(()) => self
                    .diagnostics
                    .debug(COMPONENT, format!("unsupported http method `{name}`")),
            },
            _ => {}
        }
    }

    fn handle_verb(
        &mut self,
        tree_id: &ResourceId,
        source: &'a SourceFile,
        call: ChainCall<'a>,
        verb: Option<HttpVerb>,
    ) {
        let arguments = call_arguments(call.call);
        let Some((first, handlers)) = arguments.split_first() else {
            self.error_count += 1;
            self.diagnostics.warn(
                COMPONENT,
                format!("no path argument for {}", source.node_text(call.call)),
            );
            return;
        };

        let path = self.route_path(source, *first);
        let entry_id = self
            .store
            .create_route_entry(verb, &path, source.path(), call.property.start_byte())
            .id
            .clone();
        record(&self.diagnostics, self.store.append_entry(tree_id, entry_id.clone()));
        self.attach_handlers(&entry_id, source, handlers);
    }

    /// `use([path], ...middleware)`
    fn handle_use(&mut self, tree_id: &ResourceId, source: &'a SourceFile, call: ChainCall<'a>) {
        let arguments = call_arguments(call.call);
        let (path, handlers) = match arguments.split_first() {
            Some((first, rest)) => match self.use_path(source, *first) {
                Some(path) => (path, rest),
                None => ("/".to_string(), arguments.as_slice()),
            },
            None => ("/".to_string(), arguments.as_slice()),
        };

        let entry_id = self
            .store
            .create_middleware_entry(&path, source.path(), call.property.start_byte())
            .id
            .clone();
        record(&self.diagnostics, self.store.append_entry(tree_id, entry_id.clone()));
        self.attach_handlers(&entry_id, source, handlers);
    }

    /// Path scope of a `use` call when its first argument folds to a
    /// constant; `None` when the argument is middleware.
    fn use_path(&self, source: &SourceFile, argument: Node<'_>) -> Option<String> {
        match argument.kind() {
            "string" => string_value(source.node_text(argument)),
            "arrow_function" | "function_expression" | "function" | "call_expression" => None,
            _ => self
                .program
                .constant_value(source.path(), argument.start_byte(), argument.end_byte()),
        }
    }

    /// `route(path, subApp)`
    fn handle_route(&mut self, tree_id: &ResourceId, source: &'a SourceFile, call: ChainCall<'a>) {
        let arguments = call_arguments(call.call);
        let (Some(first), Some(app)) = (arguments.first(), arguments.get(1)) else {
            return;
        };
        let path = self.program
            .constant_value(source.path(), first.start_byte(), first.end_byte())
            .unwrap_or_default();

        let app = unwrap_expression(*app);
        let target = match app.kind() {
            "identifier" => self
                .resolved_declaration(source, app)
                .filter(|d| d.kind == DeclarationKind::Variable),
            _ => None,
        };
        let Some(target) = target else {
            self.diagnostics.info(
                COMPONENT,
                format!("no target found for {}", source.node_text(app)),
            );
            return;
        };

        let target_id = self
            .store
            .id_for(ResourceKind::RouteTree, &target.file, target.name_offset);
        let reference_id = self
            .store
            .create_route_tree_reference(
                &path,
                target_id,
                &target.name,
                source.path(),
                call.property.start_byte(),
            )
            .id
            .clone();
        record(&self.diagnostics, self.store.append_entry(tree_id, reference_id));
    }

    /// `openapi(createRoute({ method, path, ... }), handler)` on OpenAPIHono
    /// routers; the route definition may also be a const.
    fn handle_openapi(&mut self, tree_id: &ResourceId, source: &'a SourceFile, call: ChainCall<'a>) {
        let arguments = call_arguments(call.call);
        let Some((first, handlers)) = arguments.split_first() else {
            return;
        };

        let definition = match unwrap_expression(*first).kind() {
            "call_expression" => Some((source, unwrap_expression(*first))),
            "identifier" => self
                .program
                .declaration_of(source.path(), first.start_byte())
                .filter(|d| d.kind == DeclarationKind::Variable)
                .and_then(|d| {
                    let program = self.program;
                    let decl_source = program.source(&d.file)?;
                    let declarator = decl_source.node_at(d.start, d.end, Some(&d.syntax_kind))?;
                    let value = unwrap_expression(declarator.child_by_field_name("value")?);
                    (value.kind() == "call_expression").then_some((decl_source, value))
                }),
            _ => None,
        };
        let Some((definition_source, definition)) = definition else {
            self.diagnostics.warn(
                COMPONENT,
                format!("unsupported openapi route definition {}", source.node_text(*first)),
            );
            return;
        };
        let Some((method, path)) = self.openapi_route(definition_source, definition) else {
            return;
        };

        let entry_id = self
            .store
            .create_route_entry(method, &path, source.path(), call.property.start_byte())
            .id
            .clone();
        record(&self.diagnostics, self.store.append_entry(tree_id, entry_id.clone()));

        let fragment = self.extract_fragment(definition_source, definition);
        record(&self.diagnostics, self.store.add_entry_source(&entry_id, fragment));
        self.attach_handlers(&entry_id, source, handlers);
    }

    /// Method and path of a `createRoute({...})` call.
    fn openapi_route(&self, source: &SourceFile, call: Node<'_>) -> Option<(Option<HttpVerb>, String)> {
        let callee = call.child_by_field_name("function")?;
        if source.node_text(callee) != "createRoute" {
            self.diagnostics.warn(
                COMPONENT,
                format!("unsupported openapi route call {}", source.node_text(call)),
            );
            return None;
        }
        let config = call_arguments(call).into_iter().next().map(unwrap_expression)?;
        if config.kind() != "object" {
            return None;
        }

        let mut method = None;
        let mut path = None;
        for pair in named_children(config) {
            let (Some(key), Some(value)) = (
                pair.child_by_field_name("key"),
                pair.child_by_field_name("value"),
            ) else {
                continue;
            };
            match source.node_text(key) {
                "method" => {
                    method = string_value(source.node_text(value))
                        .and_then(|m| HttpVerb::from_str(&m).ok());
                }
                "path" => path = string_value(source.node_text(value)),
                _ => {}
            }
        }
        Some((method, path?))
    }

    fn attach_handlers(&mut self, entry_id: &ResourceId, source: &'a SourceFile, arguments: &[Node<'a>]) {
        for argument in arguments {
            if !HANDLER_KINDS.contains(&argument.kind()) {
                continue;
            }
            let fragment = self.extract_fragment(source, *argument);
            record(&self.diagnostics, self.store.add_entry_source(entry_id, fragment));
        }
    }

    /// Literal path, folded template, or constant; empty when unknown.
    fn route_path(&self, source: &SourceFile, argument: Node<'_>) -> String {
        match argument.kind() {
            "string" => string_value(source.node_text(argument)).unwrap_or_default(),
            _ => self
                .program
                .constant_value(source.path(), argument.start_byte(), argument.end_byte())
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use crate::config::DiscoveryConfig;
    use crate::diagnostics::Diagnostics;
    use crate::discovery::discover_routes;
    use crate::graph::{HttpVerb, Resource, ResourceStore, RouteTree};
    use crate::program::TypeScriptProgram;

    fn discover(files: &[(&str, &str)]) -> (ResourceStore, usize) {
        let program = TypeScriptProgram::from_sources(
            "/p",
            files.iter().map(|(p, t)| (PathBuf::from("/p").join(p), t.to_string())),
        )
        .unwrap();
        let result = discover_routes(&program, &DiscoveryConfig::default(), &Diagnostics::memory().0);
        (result.store, result.error_count)
    }

    fn tree<'s>(store: &'s ResourceStore, name: &str) -> &'s RouteTree {
        store.route_trees().find(|t| t.name == name).unwrap()
    }

    fn entry_summary(store: &ResourceStore, tree: &RouteTree) -> Vec<String> {
        tree.entries
            .iter()
            .map(|id| match store.get(id).unwrap() {
                Resource::RouteEntry(e) => format!(
                    "{} {}",
                    e.method.map(|m| m.as_str()).unwrap_or("all"),
                    e.path
                ),
                Resource::MiddlewareEntry(m) => format!("use {}", m.path),
                Resource::RouteTreeReference(r) => format!("route {} {}", r.path, r.target_name),
                other => format!("unexpected {}", other.kind()),
            })
            .collect()
    }

    #[test]
    fn test_entries_in_source_order() {
        let (store, errors) = discover(&[(
            "src/index.ts",
            concat!(
                "import { Hono } from 'hono';\n",
                "import { logger } from 'hono/logger';\n",
                "const app = new Hono();\n",
                "app.use(logger());\n",
                "app.get('/', (c) => c.text('hi'));\n",
                "app.post('/users', (c) => c.json({}))\n",
                "  .delete('/users/:id', (c) => c.body(null));\n",
                "app.all('/any', (c) => c.text('any'));\n",
                "export default app;\n",
            ),
        )]);
        assert_eq!(errors, 0);
        let app = tree(&store, "app");
        assert_eq!(app.router_type, "Hono");
        assert_eq!(
            entry_summary(&store, app),
            vec!["use /", "get /", "post /users", "delete /users/:id", "all /any"]
        );

        assert_eq!(app.modules.len(), 1);
        let constructor = store.module_reference(&app.modules[0]).unwrap();
        assert_eq!((constructor.import_path.as_str(), constructor.binding.as_str()), ("hono", "Hono"));
    }

    #[test]
    fn test_mount_across_files() {
        let (store, _) = discover(&[
            (
                "src/users.ts",
                "import { Hono } from 'hono';\nexport const users = new Hono();\nusers.get('/:id', (c) => c.text('u'));\n",
            ),
            (
                "src/index.ts",
                "import { Hono } from 'hono';\nimport { users } from './users';\nconst app = new Hono();\napp.route('/user', users);\n",
            ),
        ]);
        let app = tree(&store, "app");
        let users = tree(&store, "users");
        assert_eq!(entry_summary(&store, app), vec!["route /user users"]);
        match store.get(&app.entries[0]).unwrap() {
            Resource::RouteTreeReference(r) => assert_eq!(r.target_id, users.id),
            other => panic!("expected a reference, got {other:?}"),
        }
    }

    #[test]
    fn test_factory_return_is_mounted() {
        let (store, _) = discover(&[
            (
                "src/factory.ts",
                concat!(
                    "import { Hono } from 'hono';\n",
                    "export function createApp() {\n",
                    "  const inner = new Hono();\n",
                    "  inner.get('/health', (c) => c.text('ok'));\n",
                    "  return inner;\n",
                    "}\n",
                ),
            ),
            ("src/index.ts", "import { createApp } from './factory';\nconst app = createApp();\napp.get('/', (c) => c.text('root'));\n"),
        ]);
        let app = tree(&store, "app");
        let inner = tree(&store, "inner");
        assert_eq!(entry_summary(&store, inner), vec!["get /health"]);
        assert_eq!(entry_summary(&store, app), vec!["route / inner", "get /"]);
    }

    #[test]
    fn test_template_paths_and_base_url() {
        let (store, _) = discover(&[(
            "src/index.ts",
            concat!(
                "import { Hono } from 'hono';\n",
                "enum Version { V1 = 'v1' }\n",
                "const prefix = '/api';\n",
                "const app = new Hono();\n",
                "app.baseUrl('https://example.com');\n",
                "app.get(`${prefix}/${Version.V1}/items`, (c) => c.text('x'));\n",
            ),
        )]);
        let app = tree(&store, "app");
        assert_eq!(app.base_url.as_deref(), Some("https://example.com"));
        assert_eq!(entry_summary(&store, app), vec!["get /api/v1/items"]);
    }

    #[test]
    fn test_errors_are_counted_not_fatal() {
        let (store, errors) = discover(&[(
            "src/index.ts",
            concat!(
                "import { Hono } from 'hono';\n",
                "const broken = new NotImported();\n",
                "const app = new Hono();\n",
                "app.get();\n",
                "app.get('/ok', (c) => c.text('ok'));\n",
            ),
        )]);
        assert_eq!(errors, 2);
        let app = tree(&store, "app");
        assert_eq!(entry_summary(&store, app), vec!["get /ok"]);
    }

    #[test]
    fn test_constant_use_path_is_not_a_handler() {
        let (store, errors) = discover(&[(
            "src/index.ts",
            concat!(
                "import { Hono } from 'hono';\n",
                "import { logger } from 'hono/logger';\n",
                "const API = '/api/*';\n",
                "const PATHS = { admin: '/admin/*' } as const;\n",
                "const app = new Hono();\n",
                "app.use(API, logger());\n",
                "app.use(PATHS.admin, logger(), (c, next) => next());\n",
                "app.use(logger());\n",
            ),
        )]);
        assert_eq!(errors, 0);
        let app = tree(&store, "app");
        assert_eq!(
            entry_summary(&store, app),
            vec!["use /api/*", "use /admin/*", "use /"]
        );

        let sources: Vec<Vec<&str>> = app
            .entries
            .iter()
            .map(|id| match store.get(id).unwrap() {
                Resource::MiddlewareEntry(m) => m
                    .sources
                    .iter()
                    .map(|s| store.source_fragment(s).unwrap().content.as_str())
                    .collect(),
                other => panic!("expected middleware, got {other:?}"),
            })
            .collect();
        assert_eq!(sources[0], vec!["logger()"]);
        assert_eq!(sources[1], vec!["logger()", "(c, next) => next()"]);
        assert_eq!(sources[2], vec!["logger()"]);
    }

    #[test]
    fn test_openapi_route_definition() {
        let (store, _) = discover(&[(
            "src/index.ts",
            concat!(
                "import { OpenAPIHono, createRoute } from '@hono/zod-openapi';\n",
                "const app = new OpenAPIHono();\n",
                "const getUser = createRoute({ method: 'get', path: '/users/{id}' });\n",
                "app.openapi(getUser, (c) => c.json({}));\n",
            ),
        )]);
        let app = tree(&store, "app");
        assert_eq!(app.router_type, "OpenAPIHono");
        match store.get(&app.entries[0]).unwrap() {
            Resource::RouteEntry(e) => {
                assert_eq!(e.method, Some(HttpVerb::Get));
                assert_eq!(e.path, "/users/{id}");
                assert_eq!(e.sources.len(), 2, "route definition and handler");
            }
            other => panic!("expected a route entry, got {other:?}"),
        }
    }
}
