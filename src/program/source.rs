//
//  source.rs
//  routegraph
//
//  Created by hak (tharun)
//

use std::path::{Path, PathBuf};

use tree_sitter::{Node, Parser, Tree};

use super::language::SourceLanguage;
use crate::error::{Result, RouteGraphError};

/// One parsed, versioned file snapshot.
#[derive(Debug, Clone)]
pub struct SourceFile {
    path: PathBuf,
    version: u32,
    text: String,
    tree: Tree,
}

impl SourceFile {
    /// Parse `text` as the dialect implied by `path`'s extension.
    pub fn parse(path: &Path, text: String, version: u32) -> Result<Self> {
        let lang = SourceLanguage::from_path(path)
            .ok_or_else(|| RouteGraphError::UnsupportedLanguage(path.to_path_buf()))?;

        let mut parser = Parser::new();
        parser
            .set_language(&lang.tree_sitter_language())
            .map_err(|e| RouteGraphError::ParserInitError(path.to_path_buf(), e.to_string()))?;

        let tree = parser
            .parse(&text, None)
            .ok_or_else(|| RouteGraphError::TreeSitterParseFailed(path.to_path_buf()))?;

        Ok(Self {
            path: path.to_path_buf(),
            version,
            text,
            tree,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Source text of `node`.
    pub fn node_text(&self, node: Node<'_>) -> &str {
        self.text.get(node.byte_range()).unwrap_or("")
    }

    /// The node spanning exactly `start..end`, preferring `kind` when
    /// several nested nodes share the range.
    pub fn node_at(&self, start: usize, end: usize, kind: Option<&str>) -> Option<Node<'_>> {
        let mut node = self.root().descendant_for_byte_range(start, end)?;
        let mut fallback = None;
        loop {
            if node.start_byte() == start && node.end_byte() == end {
                match kind {
                    Some(kind) if node.kind() == kind => return Some(node),
                    Some(_) => fallback = fallback.or(Some(node)),
                    None => return Some(node),
                }
            } else if node.start_byte() < start || node.end_byte() > end {
                break;
            }
            node = node.parent()?;
        }
        fallback
    }

    /// The smallest named node starting at `offset`.
    pub fn named_node_at(&self, offset: usize) -> Option<Node<'_>> {
        self.root()
            .named_descendant_for_byte_range(offset, offset)
    }
}
