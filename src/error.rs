use std::path::PathBuf;
use thiserror::Error;

/// Problems with the run configuration, detected before any external process starts
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing '{0}' section")]
    MissingSection(&'static str),
    #[error("Missing '{0}'")]
    MissingField(&'static str),
    #[error("Start and end time index must both be set")]
    IncompleteTimeRange,
    #[error("Start time index {start} is after end time index {end}")]
    InvertedTimeRange { start: i64, end: i64 },
    #[error("Unbalanced quotes in parameters '{0}'")]
    MalformedParams(String),
    #[error("Invalid scale '{0}', expected a number")]
    InvalidScale(String),
}

/// Failures of the external process invoker.
/// A non-zero exit status is not an error here, it is reported in the invocation result.
#[derive(Error, Debug)]
pub enum InvokeError {
    #[error("Could not locate command {0}")]
    CommandNotFound(String),
    #[error("Command {} is not executable", .0.display())]
    NotExecutable(PathBuf),
    #[error("Command {0} was not located before use")]
    NotLocated(String),
    #[error("Failed to start {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to open log file {}: {source}", path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
