//! End-to-end test support for the tenet engine
//!
//! - `harness`: isolated engine instances over temp-file databases
//! - `mocks`: scripted plug-ins for deterministic pipeline behavior

pub mod harness;
pub mod mocks;

pub use harness::TestEngine;
pub use mocks::{
    canonical_sky_extractor, FailingCategorizer, FailingExtractor, ScriptedExtractor,
    SleepyExtractor,
};
