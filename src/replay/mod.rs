//
//  mod.rs
//  routegraph
//
//  Created by hak (tharun)
//

//! Replays synthetic requests through a discovered route graph.

pub mod engine;
pub mod router;

pub use engine::{ReplayEngine, Response, MATCHED_BODY, NOT_FOUND_BODY};
pub use router::PathPattern;
