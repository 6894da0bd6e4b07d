//
//  id.rs
//  routegraph
//
//  Created by hak (tharun)
//

//! Content-derived resource identifiers.
//!
//! Position-addressed kinds encode as `KIND:<file>@<offset>`, module
//! references as `MODULE_REFERENCE:<import path>@<binding>`. Paths and
//! bindings are percent-encoded, so `:` and `@` only ever appear as
//! separators and [`ResourceId::decode`] inverts the encoding exactly.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RouteGraphError};

/// The closed set of resource kinds stored in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceKind {
    RouteTree,
    RouteEntry,
    MiddlewareEntry,
    RouteTreeReference,
    SourceFragment,
    ModuleReference,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::RouteTree,
        ResourceKind::RouteEntry,
        ResourceKind::MiddlewareEntry,
        ResourceKind::RouteTreeReference,
        ResourceKind::SourceFragment,
        ResourceKind::ModuleReference,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::RouteTree => "ROUTE_TREE",
            ResourceKind::RouteEntry => "ROUTE_ENTRY",
            ResourceKind::MiddlewareEntry => "MIDDLEWARE_ENTRY",
            ResourceKind::RouteTreeReference => "ROUTE_TREE_REFERENCE",
            ResourceKind::SourceFragment => "SOURCE_FRAGMENT",
            ResourceKind::ModuleReference => "MODULE_REFERENCE",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = RouteGraphError;

    fn from_str(s: &str) -> Result<Self> {
        ResourceKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| RouteGraphError::MalformedId(s.to_string()))
    }
}

/// A decoded identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedId {
    Positioned {
        kind: ResourceKind,
        file: String,
        offset: usize,
    },
    Module {
        import_path: String,
        binding: String,
    },
}

/// Flat, sortable, round-trippable resource identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Id for a position-addressed kind. `file` must already be
    /// project-relative.
    pub fn positioned(kind: ResourceKind, file: &str, offset: usize) -> Self {
        debug_assert_ne!(kind, ResourceKind::ModuleReference);
        Self(format!(
            "{}:{}@{}",
            kind.as_str(),
            urlencoding::encode(file),
            offset
        ))
    }

    pub fn module(import_path: &str, binding: &str) -> Self {
        Self(format!(
            "{}:{}@{}",
            ResourceKind::ModuleReference.as_str(),
            urlencoding::encode(import_path),
            urlencoding::encode(binding)
        ))
    }

    /// Parse and validate an id string.
    pub fn parse(raw: &str) -> Result<Self> {
        let id = Self(raw.to_string());
        id.decode()?;
        Ok(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn kind(&self) -> Option<ResourceKind> {
        let (kind, _) = self.0.split_once(':')?;
        kind.parse().ok()
    }

    pub fn decode(&self) -> Result<DecodedId> {
        let malformed = || RouteGraphError::MalformedId(self.0.clone());
        let (kind, rest) = self.0.split_once(':').ok_or_else(malformed)?;
        let kind: ResourceKind = kind.parse().map_err(|_| malformed())?;
        let (head, tail) = rest.rsplit_once('@').ok_or_else(malformed)?;
        let head = urlencoding::decode(head).map_err(|_| malformed())?;

        match kind {
            ResourceKind::ModuleReference => {
                let binding = urlencoding::decode(tail).map_err(|_| malformed())?;
                Ok(DecodedId::Module {
                    import_path: head.into_owned(),
                    binding: binding.into_owned(),
                })
            }
            kind => Ok(DecodedId::Positioned {
                kind,
                file: head.into_owned(),
                offset: tail.parse().map_err(|_| malformed())?,
            }),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
