//! # routegraph
//!
//! Static route discovery, replay and source reconstruction for TypeScript
//! HTTP applications built on Hono-style routers.
//!
//! routegraph walks a project without executing it, records every router,
//! route, middleware, mount and handler it can resolve in a resource graph,
//! and lets you replay synthetic requests against that graph to see which
//! declarations a request would reach.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use routegraph::{analyze, Diagnostics, DiscoveryConfig, TypeScriptProgram};
//!
//! let program = TypeScriptProgram::from_sources(
//!     "/app",
//!     [("/app/src/index.ts", "import { Hono } from 'hono';\nconst app = new Hono();\napp.get('/', (c) => c.text('hi'));\n")],
//! ).unwrap();
//!
//! let diagnostics = Diagnostics::tracing();
//! let outcome = analyze(&program, &DiscoveryConfig::default(), &diagnostics);
//! let mut engine = outcome.replay(diagnostics.clone()).unwrap();
//! let response = engine.dispatch("GET", "/").unwrap();
//! assert!(response.is_match());
//!
//! // Source text of everything the request touched
//! let files = outcome.generate(engine.history(), false, diagnostics);
//! println!("{files}");
//! ```

pub mod analysis;
pub mod cli;
pub mod codegen;
pub mod config;
pub mod diagnostics;
pub mod discovery;
pub mod error;
pub mod graph;
pub mod monitor;
pub mod program;
pub mod replay;

// Re-exports for convenience
pub use analysis::{analyze, select_root, AnalysisOutcome};
pub use codegen::{CodeGenerator, GeneratedFiles};
pub use config::{DiscoveryConfig, RouteGraphConfig};
pub use diagnostics::{DiagnosticSink, Diagnostics, MemorySink};
pub use discovery::{discover_routes, DiscoveryResult};
pub use error::{Result, RouteGraphError};
pub use graph::{Resource, ResourceId, ResourceKind, ResourceStore};
pub use monitor::{AnalysisEvent, AnalysisPayload, FileEvent, FileWatcher, RoutesMonitor};
pub use program::{ProgramModel, TypeScriptProgram};
pub use replay::{ReplayEngine, Response};
