//
//  watch.rs
//  routegraph
//
//  Created by hak (tharun)
//

use anyhow::Result;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use super::Project;
use crate::diagnostics::Diagnostics;
use crate::monitor::RoutesMonitor;

/// Run the monitor in the foreground, printing each analysis event as a
/// JSON line until Ctrl+C.
pub async fn run(project: Project, diagnostics: Diagnostics) -> Result<()> {
    let monitor = RoutesMonitor::new(project.root, project.config, diagnostics);
    let mut events = monitor.subscribe();
    monitor.start().await?;
    eprintln!("Watching {} (Ctrl+C to stop)...", monitor.root().display());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(event) => println!("{}", event.to_json_line()?),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "dropped analysis events"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    monitor.stop();
    Ok(())
}
