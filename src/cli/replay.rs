//
//  replay.rs
//  routegraph
//
//  Created by hak (tharun)
//

use anyhow::Result;

use super::Project;
use crate::diagnostics::Diagnostics;

/// Replay one request against the root tree and print what it touched.
pub fn dispatch(
    project: &Project,
    diagnostics: &Diagnostics,
    method: &str,
    path: &str,
    code: bool,
    ids: bool,
) -> Result<()> {
    let outcome = project.analyze(diagnostics);
    let mut engine = outcome.replay(diagnostics.clone())?;
    let response = engine.dispatch(method, path)?;

    println!("{response}");
    for id in engine.history() {
        println!("  {id}");
    }

    if code {
        let include_ids = ids || project.config.codegen.include_ids;
        let files = outcome.generate(engine.history(), include_ids, diagnostics.clone());
        println!();
        println!("{files}");
    }
    Ok(())
}
