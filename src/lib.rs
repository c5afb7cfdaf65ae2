pub mod config;
pub mod driver;
pub mod error;
pub mod external;
pub mod layout;
pub mod models;
pub mod params;
pub mod pipeline;

pub use driver::Driver;
pub use error::{ConfigError, InvokeError};
pub use external::{CommandRegistry, CommandRunner, Invocation, OutputMode};
pub use layout::OutputLayout;
pub use models::{ConfigFile, DataSpec, DetectionSpec, RunConfiguration, Scale, Stage, TrackingSpec, VariableSpec};
pub use params::{Arg, ArgList};
pub use pipeline::{
    CommandNames, FrameOutcome, FramePipeline, FrameReport, FrameState, RunSummary, StageReport,
};
