//
//  mod.rs
//  routegraph
//
//  Created by hak (tharun)
//

//! Route discovery: program model in, resource graph out.
//!
//! One pass walks every top-level declaration of every analysed file,
//! creates a route tree for each router-typed variable and classifies the
//! method calls made on it. Handlers are turned into source fragments by
//! [`fragments`]. Discovery is best effort: anything that cannot be
//! resolved is logged, counted when it is a type failure, and skipped.

mod fragments;
mod routes;

use std::collections::HashSet;
use std::path::PathBuf;

use crate::config::DiscoveryConfig;
use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::graph::ResourceStore;
use crate::program::{is_declaration_file, ProgramModel};

const COMPONENT: &str = "discovery";

/// Everything one discovery pass produced.
#[derive(Debug)]
pub struct DiscoveryResult {
    pub store: ResourceStore,
    /// Type-resolution failures and malformed registrations seen in the pass.
    pub error_count: usize,
}

/// Run a full discovery pass over `program` into a fresh store.
pub fn discover_routes(
    program: &dyn ProgramModel,
    config: &DiscoveryConfig,
    diagnostics: &Diagnostics,
) -> DiscoveryResult {
    let mut context = SearchContext::new(program, config, diagnostics.clone());
    for file in program.files() {
        if is_declaration_file(file) || program.is_external_file(file) {
            continue;
        }
        let Some(source) = program.source(file) else {
            continue;
        };
        context.visit_scope(source, source.root());
    }

    diagnostics.debug(
        COMPONENT,
        format!(
            "discovered {} resources ({} errors)",
            context.store.len(),
            context.error_count
        ),
    );
    DiscoveryResult {
        store: context.store,
        error_count: context.error_count,
    }
}

/// Shared state of one discovery pass.
pub(crate) struct SearchContext<'a> {
    program: &'a dyn ProgramModel,
    config: &'a DiscoveryConfig,
    diagnostics: Diagnostics,
    store: ResourceStore,
    error_count: usize,
    /// Factory functions currently being inlined, by (file, offset).
    active_factories: HashSet<(PathBuf, usize)>,
}

impl<'a> SearchContext<'a> {
    fn new(program: &'a dyn ProgramModel, config: &'a DiscoveryConfig, diagnostics: Diagnostics) -> Self {
        Self {
            program,
            config,
            store: ResourceStore::new(program.root(), diagnostics.clone()),
            diagnostics,
            error_count: 0,
            active_factories: HashSet::new(),
        }
    }
}

/// Log a failed store mutation; discovery carries on.
fn record(diagnostics: &Diagnostics, result: Result<()>) {
    if let Err(e) = result {
        diagnostics.warn(COMPONENT, e);
    }
}
