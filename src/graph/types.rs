//
//  types.rs
//  routegraph
//
//  Created by hak (tharun)
//

use std::fmt;
use std::str::FromStr;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use super::id::{ResourceId, ResourceKind};

/// HTTP verb a route entry is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
}

impl HttpVerb {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpVerb::Get => "get",
            HttpVerb::Post => "post",
            HttpVerb::Put => "put",
            HttpVerb::Delete => "delete",
            HttpVerb::Patch => "patch",
            HttpVerb::Options => "options",
            HttpVerb::Head => "head",
        }
    }

    pub fn to_method(self) -> http::Method {
        match self {
            HttpVerb::Get => http::Method::GET,
            HttpVerb::Post => http::Method::POST,
            HttpVerb::Put => http::Method::PUT,
            HttpVerb::Delete => http::Method::DELETE,
            HttpVerb::Patch => http::Method::PATCH,
            HttpVerb::Options => http::Method::OPTIONS,
            HttpVerb::Head => http::Method::HEAD,
        }
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpVerb {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(HttpVerb::Get),
            "post" => Ok(HttpVerb::Post),
            "put" => Ok(HttpVerb::Put),
            "delete" => Ok(HttpVerb::Delete),
            "patch" => Ok(HttpVerb::Patch),
            "options" => Ok(HttpVerb::Options),
            "head" => Ok(HttpVerb::Head),
            _ => Err(()),
        }
    }
}

/// One router instance and its ordered entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteTree {
    pub id: ResourceId,
    pub name: String,
    /// Type the router was constructed as (`Hono`, `OpenAPIHono`, ...).
    pub router_type: String,
    pub base_url: Option<String>,
    /// Route entries, middleware entries and references, in source order.
    pub entries: Vec<ResourceId>,
    /// Import of the router constructor, when it was imported.
    #[serde(default)]
    pub modules: IndexSet<ResourceId>,
    pub file: String,
    pub offset: usize,
}

/// One verb + path registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteEntry {
    pub id: ResourceId,
    /// `None` means the entry answers every method.
    pub method: Option<HttpVerb>,
    pub path: String,
    pub sources: IndexSet<ResourceId>,
    pub modules: IndexSet<ResourceId>,
    pub file: String,
    pub offset: usize,
}

/// A path-scoped or global interceptor registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiddlewareEntry {
    pub id: ResourceId,
    pub path: String,
    pub sources: IndexSet<ResourceId>,
    pub modules: IndexSet<ResourceId>,
    pub file: String,
    pub offset: usize,
}

/// A mount point of another route tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteTreeReference {
    pub id: ResourceId,
    pub path: String,
    pub target_id: ResourceId,
    pub target_name: String,
    pub file: String,
    pub offset: usize,
}

/// Self-contained piece of handler or helper source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFragment {
    pub id: ResourceId,
    pub content: String,
    pub file: String,
    pub offset: usize,
    /// Zero-based.
    pub line: usize,
    /// Zero-based, in bytes.
    pub column: usize,
    pub references: IndexSet<ResourceId>,
    pub modules: IndexSet<ResourceId>,
}

/// How a binding was imported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStyle {
    /// `import { a } from "p"` / `import { a as b } from "p"`
    Named,
    /// `import X from "p"`
    Default,
    /// `import * as X from "p"`
    Namespace,
}

/// Resolved package identity of an external import.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageIdentity {
    pub name: String,
    pub version: Option<String>,
}

/// One imported binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleReference {
    pub id: ResourceId,
    pub import_path: String,
    /// Literal binding text: `Hono`, `Hono as H`, `* as z`.
    pub binding: String,
    pub style: ImportStyle,
    /// Set for external packages, absent for project-local modules.
    pub package: Option<PackageIdentity>,
}

impl ModuleReference {
    pub fn is_external(&self) -> bool {
        self.package.is_some()
    }
}

/// Every node stored in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Resource {
    RouteTree(RouteTree),
    RouteEntry(RouteEntry),
    MiddlewareEntry(MiddlewareEntry),
    RouteTreeReference(RouteTreeReference),
    SourceFragment(SourceFragment),
    ModuleReference(ModuleReference),
}

impl Resource {
    pub fn id(&self) -> &ResourceId {
        match self {
            Resource::RouteTree(r) => &r.id,
            Resource::RouteEntry(r) => &r.id,
            Resource::MiddlewareEntry(r) => &r.id,
            Resource::RouteTreeReference(r) => &r.id,
            Resource::SourceFragment(r) => &r.id,
            Resource::ModuleReference(r) => &r.id,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::RouteTree(_) => ResourceKind::RouteTree,
            Resource::RouteEntry(_) => ResourceKind::RouteEntry,
            Resource::MiddlewareEntry(_) => ResourceKind::MiddlewareEntry,
            Resource::RouteTreeReference(_) => ResourceKind::RouteTreeReference,
            Resource::SourceFragment(_) => ResourceKind::SourceFragment,
            Resource::ModuleReference(_) => ResourceKind::ModuleReference,
        }
    }

    /// Source location, for kinds that have one.
    pub fn location(&self) -> Option<(&str, usize)> {
        match self {
            Resource::RouteTree(r) => Some((&r.file, r.offset)),
            Resource::RouteEntry(r) => Some((&r.file, r.offset)),
            Resource::MiddlewareEntry(r) => Some((&r.file, r.offset)),
            Resource::RouteTreeReference(r) => Some((&r.file, r.offset)),
            Resource::SourceFragment(r) => Some((&r.file, r.offset)),
            Resource::ModuleReference(_) => None,
        }
    }
}
