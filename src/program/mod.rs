//! Program model: parse trees plus the semantic queries discovery needs.
//!
//! Discovery only talks to [`ProgramModel`]; [`TypeScriptProgram`] is the
//! tree-sitter backed implementation shipped with the crate.

mod binder;
mod infer;
pub mod language;
mod resolve;
pub mod source;
pub mod syntax;
mod typescript;
pub mod walk;

use std::path::{Path, PathBuf};

use crate::error::Result;

pub use language::{is_declaration_file, is_vendored, SourceLanguage};
pub use source::SourceFile;
pub use typescript::TypeScriptProgram;
pub use walk::{has_source_extension, is_ignored, source_files, BUILTIN_IGNORE};

/// A position in a project file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location {
    pub file: PathBuf,
    pub offset: usize,
}

/// What kind of syntax introduced a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    Variable,
    Function,
    Class,
    Interface,
    TypeAlias,
    Enum,
    Parameter,
    ImportSpecifier,
    DefaultImport,
    NamespaceImport,
    /// `export { x } from "..."`
    ExportSpecifier,
}

impl DeclarationKind {
    pub fn is_import(self) -> bool {
        matches!(
            self,
            DeclarationKind::ImportSpecifier
                | DeclarationKind::DefaultImport
                | DeclarationKind::NamespaceImport
        )
    }

    /// Bindings that only forward to a declaration in another module.
    pub fn is_alias(self) -> bool {
        self.is_import() || self == DeclarationKind::ExportSpecifier
    }
}

/// A resolved binding site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub kind: DeclarationKind,
    pub file: PathBuf,
    /// Local name of the binding.
    pub name: String,
    pub name_offset: usize,
    /// Byte range of the declaring node (declarator, function, specifier...).
    pub start: usize,
    pub end: usize,
    /// tree-sitter kind of the declaring node.
    pub syntax_kind: String,
    /// Parameters and bindings nested in a function body.
    pub function_scoped: bool,
    /// Module specifier for imports and re-exports.
    pub module_specifier: Option<String>,
    /// Name as exported by the source module (`default` for default imports).
    pub imported_name: Option<String>,
}

impl Declaration {
    /// Whether this declaration's range intersects `start..end` in `file`.
    pub fn overlaps(&self, file: &Path, start: usize, end: usize) -> bool {
        self.file == file && self.start < end && start < self.end
    }
}

/// Outcome of resolving a module specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModule {
    pub is_external: bool,
    pub resolved_file: Option<PathBuf>,
    pub package_name: Option<String>,
    pub package_version: Option<String>,
}

/// Statically inferred type name of an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InferredType {
    Named(String),
    Unknown,
    /// The expression is rooted in a name that resolves to nothing.
    Unresolved,
}

impl InferredType {
    /// Whether this is `signature` or an instantiation of it
    /// (`Hono` matches `Hono` and `Hono<Env>`).
    pub fn matches(&self, signature: &str) -> bool {
        match self {
            InferredType::Named(name) => {
                name == signature
                    || name
                        .strip_prefix(signature)
                        .is_some_and(|rest| rest.starts_with('<'))
            }
            _ => false,
        }
    }
}

/// Semantic queries over a set of source files.
pub trait ProgramModel {
    /// Project root every analysed file lives under.
    fn root(&self) -> &Path;

    /// Analysed files in a stable order.
    fn files(&self) -> Vec<&Path>;

    fn source(&self, file: &Path) -> Option<&SourceFile>;

    /// Register or replace a file snapshot; returns its new version.
    fn upsert_file(&mut self, file: &Path, text: String) -> Result<u32>;

    /// Drop a file snapshot; returns whether it existed.
    fn remove_file(&mut self, file: &Path) -> bool;

    /// Declaration of the identifier starting at `offset`.
    fn declaration_of(&self, file: &Path, offset: usize) -> Option<Declaration>;

    fn is_alias(&self, declaration: &Declaration) -> bool {
        declaration.kind.is_alias()
    }

    /// Follow import / re-export chains to the declaration they forward to.
    /// `None` when the chain ends outside the project.
    fn resolve_alias(&self, declaration: &Declaration) -> Option<Declaration>;

    /// Every occurrence, project-wide, of the symbol declared or used at
    /// `offset`, ordered by file then offset.
    fn find_references(&self, file: &Path, offset: usize) -> Vec<Location>;

    /// `None` when the specifier cannot be resolved at all.
    fn resolve_module(&self, specifier: &str, from: &Path) -> Option<ResolvedModule>;

    /// Static type name of the expression or declarator spanning `start..end`.
    fn type_of(&self, file: &Path, start: usize, end: usize) -> InferredType;

    /// Compile-time string value of the expression spanning `start..end`.
    fn constant_value(&self, file: &Path, start: usize, end: usize) -> Option<String>;

    /// Whether `file` belongs to an installed third-party package.
    fn is_external_file(&self, file: &Path) -> bool {
        is_vendored(file.strip_prefix(self.root()).unwrap_or(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_signature_matching() {
        let hono = InferredType::Named("Hono".to_string());
        let generic = InferredType::Named("Hono<Env>".to_string());
        let other = InferredType::Named("HonoRequest".to_string());

        assert!(hono.matches("Hono"));
        assert!(generic.matches("Hono"));
        assert!(!other.matches("Hono"), "prefix without type arguments is a different type");
        assert!(!InferredType::Unresolved.matches("Hono"));
    }

    #[test]
    fn test_overlap_is_file_aware() {
        let decl = Declaration {
            kind: DeclarationKind::Variable,
            file: PathBuf::from("/p/a.ts"),
            name: "x".into(),
            name_offset: 6,
            start: 6,
            end: 20,
            syntax_kind: "variable_declarator".into(),
            function_scoped: false,
            module_specifier: None,
            imported_name: None,
        };
        assert!(decl.overlaps(Path::new("/p/a.ts"), 10, 30));
        assert!(!decl.overlaps(Path::new("/p/a.ts"), 20, 30));
        assert!(!decl.overlaps(Path::new("/p/b.ts"), 10, 30));
    }
}
