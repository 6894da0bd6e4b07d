//
//  mod.rs
//  routegraph
//
//  Created by hak (tharun)
//

//! One full analysis pass: discovery plus root selection.

pub mod root;

pub use root::{complexity, require_root, select_root};

use std::sync::Arc;

use serde::Serialize;

use crate::codegen::{CodeGenerator, GeneratedFiles};
use crate::config::DiscoveryConfig;
use crate::diagnostics::Diagnostics;
use crate::discovery::discover_routes;
use crate::error::{Result, RouteGraphError};
use crate::graph::{ResourceId, ResourceStore, RouteTree};
use crate::program::ProgramModel;
use crate::replay::ReplayEngine;

const COMPONENT: &str = "analysis";

/// Immutable result of one pass. Cheap to share between a monitor and its
/// consumers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    #[serde(skip)]
    pub store: Arc<ResourceStore>,
    /// `None` when no route tree was discovered.
    pub root_id: Option<ResourceId>,
    pub error_count: usize,
}

impl AnalysisOutcome {
    pub fn root(&self) -> Option<&RouteTree> {
        self.root_id.as_ref().and_then(|id| self.store.route_tree(id))
    }

    /// Replay engine with the selected root already set.
    pub fn replay(&self, diagnostics: Diagnostics) -> Result<ReplayEngine> {
        let root = self.root_id.as_ref().ok_or(RouteGraphError::NoRouteTrees)?;
        let mut engine = ReplayEngine::new(Arc::clone(&self.store), diagnostics);
        engine.set_root(root)?;
        Ok(engine)
    }

    pub fn generate(&self, history: &[ResourceId], include_ids: bool, diagnostics: Diagnostics) -> GeneratedFiles {
        CodeGenerator::new(&self.store, diagnostics)
            .include_ids(include_ids)
            .generate(history)
    }
}

/// Discover routes in `program` and pick the root tree.
pub fn analyze(
    program: &dyn ProgramModel,
    config: &DiscoveryConfig,
    diagnostics: &Diagnostics,
) -> AnalysisOutcome {
    let result = discover_routes(program, config, diagnostics);
    if result.error_count > 0 {
        diagnostics.warn(
            COMPONENT,
            format!("{} error(s) found while analyzing routes", result.error_count),
        );
    }

    let root_id = select_root(&result.store).map(|tree| tree.id.clone());
    match &root_id {
        Some(id) => diagnostics.debug(COMPONENT, format!("root route tree {id}")),
        None => diagnostics.info(COMPONENT, "no route trees found"),
    }

    AnalysisOutcome {
        store: Arc::new(result.store),
        root_id,
        error_count: result.error_count,
    }
}
