#![allow(dead_code)]

mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from frametrack for tests
pub use frametrack::{
    ArgList, CommandNames, ConfigError, FrameOutcome, FramePipeline, OutputLayout,
    RunConfiguration, RunSummary, Scale, Stage,
};
