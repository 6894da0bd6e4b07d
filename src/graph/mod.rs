//! Resource graph: identity scheme and typed node storage.
//!
//! Every discovered router, entry, fragment and import is a [`Resource`]
//! addressed by a content-derived [`ResourceId`].

pub mod export;
pub mod id;
pub mod store;
pub mod types;

pub use export::{mount_graph, to_dot};
pub use id::{DecodedId, ResourceId, ResourceKind};
pub use store::ResourceStore;
pub use types::{
    HttpVerb, ImportStyle, MiddlewareEntry, ModuleReference, PackageIdentity, Resource,
    RouteEntry, RouteTree, RouteTreeReference, SourceFragment,
};
