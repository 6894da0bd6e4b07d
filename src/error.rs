//
//  error.rs
//  routegraph
//
//  Created by hak (tharun)
//

use std::path::PathBuf;

use thiserror::Error;

use crate::graph::ResourceId;

/// Errors surfaced by routegraph.
///
/// Analysis problems (unresolved symbols, dangling ids) are logged and
/// counted instead; only broken preconditions end up here.
#[derive(Debug, Error)]
pub enum RouteGraphError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported language for file: {0}")]
    UnsupportedLanguage(PathBuf),

    #[error("Failed to initialize parser for {0}: {1}")]
    ParserInitError(PathBuf, String),

    #[error("tree-sitter failed to parse {0}")]
    TreeSitterParseFailed(PathBuf),

    #[error("Malformed resource id: {0}")]
    MalformedId(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(ResourceId),

    #[error("Resource {id} is a {actual}, expected a {expected}")]
    UnexpectedKind {
        id: ResourceId,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("No root route tree has been set")]
    NoRootSet,

    #[error("No route trees were discovered")]
    NoRouteTrees,

    #[error("Invalid route pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Monitor is not running")]
    NotRunning,

    #[error("Analysis failed: {0}")]
    Analysis(String),
}

/// Result type alias for routegraph operations.
pub type Result<T> = std::result::Result<T, RouteGraphError>;
