//
//  cli.rs
//  routegraph
//
//  Created by hak (tharun)
//

//! routegraph CLI - inspect, replay and watch the routes of a project.

use clap::Parser;
use routegraph::cli::{init_logging, run, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
