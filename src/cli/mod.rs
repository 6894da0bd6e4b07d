//
//  mod.rs
//  routegraph
//
//  Created by hak (tharun)
//

//! CLI module for routegraph.
//!
//! Commands:
//! - Inspect: routes, graph
//! - Replay: dispatch
//! - Live: watch

pub mod replay;
pub mod routes;
pub mod watch;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::{analyze, AnalysisOutcome};
use crate::config::RouteGraphConfig;
use crate::diagnostics::Diagnostics;
use crate::program::TypeScriptProgram;

#[derive(Parser)]
#[command(name = "routegraph")]
#[command(about = "routegraph - static route discovery and replay for Hono apps", long_about = None)]
pub struct Cli {
    /// Project directory holding routegraph.toml (default: current directory)
    #[arg(short, long, default_value = ".")]
    pub root: PathBuf,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List discovered route trees and their entries
    Routes {
        /// Dump every resource as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replay a request against the root route tree
    Dispatch {
        /// HTTP method (GET, POST, ...)
        method: String,

        /// Request path or full URL
        path: String,

        /// Print the source reconstructed from the visited resources
        #[arg(long)]
        code: bool,

        /// Prefix generated sections with their resource ids
        #[arg(long)]
        ids: bool,
    },

    /// Print the mount graph as Graphviz DOT
    Graph,

    /// Re-analyse on every change and print analysis events (Ctrl+C to stop)
    Watch,
}

/// A project directory with its configuration.
pub struct Project {
    pub root: PathBuf,
    pub config: RouteGraphConfig,
}

impl Project {
    /// Load `routegraph.toml` from `dir` (defaults when absent).
    pub fn open(dir: &Path) -> Self {
        let config = RouteGraphConfig::load_from_dir(dir);
        let root = config.resolve_root(dir);
        let root = root.canonicalize().unwrap_or(root);
        Self { root, config }
    }

    pub fn load_program(&self, diagnostics: &Diagnostics) -> TypeScriptProgram {
        TypeScriptProgram::load(
            &self.root,
            &self.config.watch_locations(&self.root),
            &self.config.project.extensions,
            &self.config.project.ignore,
            diagnostics.clone(),
        )
    }

    /// One analysis pass over the files currently on disk.
    pub fn analyze(&self, diagnostics: &Diagnostics) -> AnalysisOutcome {
        let program = self.load_program(diagnostics);
        analyze(&program, &self.config.discovery, diagnostics)
    }
}

/// Install the global tracing subscriber on stderr.
pub fn init_logging(verbose: bool, quiet: bool) {
    let filter = if verbose {
        EnvFilter::new("routegraph=debug")
    } else if quiet {
        EnvFilter::new("routegraph=error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("routegraph=info"))
    };

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

/// Execute a parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    let project = Project::open(&cli.root);
    let diagnostics = Diagnostics::tracing();

    match cli.command {
        Commands::Routes { json } => routes::list(&project, &diagnostics, json),
        Commands::Dispatch {
            method,
            path,
            code,
            ids,
        } => replay::dispatch(&project, &diagnostics, &method, &path, code, ids),
        Commands::Graph => routes::graph(&project, &diagnostics),
        Commands::Watch => watch::run(project, diagnostics).await,
    }
}
