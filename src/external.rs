use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::error::InvokeError;
use crate::params::ArgList;

/// Standard locations searched for the external executables
pub const DEFAULT_SEARCH_PATHS: &[&str] = &["/usr/local/bin", "/usr/bin", "/bin", "/sbin"];

/// Where the standard output of an external process goes
#[derive(Debug, Clone, Copy)]
pub enum OutputMode<'a> {
    Inherit,
    /// Collect stdout and return it with the result
    Capture,
    /// Redirect stdout into a (truncated) log file, closed by a line with exit code and duration
    File(&'a Path),
}

/// Result of one finished external process
#[derive(Debug, Clone)]
pub struct Invocation {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: Option<String>,
    pub elapsed: Duration,
}

impl Invocation {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs located external programs.
/// Calls block until the process exits; there is no timeout.
pub trait CommandRunner {
    fn run(&self, name: &str, args: &ArgList, output: OutputMode<'_>) -> Result<Invocation, InvokeError>;
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|meta| meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    true
}

/// Record how the process ended at the bottom of its log
fn append_trailer(log_path: &Path, invocation: &Invocation) -> std::io::Result<()> {
    let mut log = OpenOptions::new().append(true).open(log_path)?;
    let seconds = invocation.elapsed.as_secs_f64();
    match invocation.exit_code {
        Some(code) => writeln!(log, "exit code {} after {:.2} seconds", code, seconds),
        None => writeln!(log, "terminated by signal after {:.2} seconds", seconds),
    }
}

/// Look for `command` directly in `dir`, then (if `recursive`) in its subdirectories
fn find_in_dir(command: &str, dir: &Path, recursive: bool) -> Result<Option<PathBuf>, InvokeError> {
    if !dir.is_dir() {
        return Ok(None);
    }

    let candidate = dir.join(command);
    if candidate.is_file() {
        if is_executable(&candidate) {
            return Ok(Some(candidate));
        }
        return Err(InvokeError::NotExecutable(candidate));
    }

    if recursive {
        let Ok(entries) = fs::read_dir(dir) else {
            return Ok(None);
        };
        let mut subdirs: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_dir())
            .collect();
        subdirs.sort();
        for subdir in subdirs {
            if let Some(found) = find_in_dir(command, &subdir, recursive)? {
                return Ok(Some(found));
            }
        }
    }

    Ok(None)
}

/// Resolved external commands of one run.
/// Commands must be located before they can be run.
#[derive(Debug, Clone)]
pub struct CommandRegistry {
    search_paths: Vec<PathBuf>,
    recursive: bool,
    resolved: HashMap<String, PathBuf>,
}

impl CommandRegistry {
    /// Registry searching the standard locations
    pub fn new() -> Self {
        Self::with_search_paths(DEFAULT_SEARCH_PATHS.iter().map(PathBuf::from))
    }

    pub fn with_search_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            search_paths: paths.into_iter().map(Into::into).collect(),
            recursive: false,
            resolved: HashMap::new(),
        }
    }

    /// Search `dir` before every other location
    pub fn prepend_search_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_paths.insert(0, dir.into());
        self
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Resolve every name in `names`.
    /// Nothing is registered unless all of them are found.
    pub fn locate<I, S>(&mut self, names: I) -> Result<&HashMap<String, PathBuf>, InvokeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut found = HashMap::new();
        for name in names {
            let name = name.as_ref();
            let mut location = None;
            for dir in &self.search_paths {
                if let Some(path) = find_in_dir(name, dir, self.recursive)? {
                    location = Some(path);
                    break;
                }
            }
            let path = location.ok_or_else(|| InvokeError::CommandNotFound(name.to_string()))?;
            tracing::debug!("Located {} at {:?}", name, path);
            found.insert(name.to_string(), path);
        }

        self.resolved.extend(found);
        Ok(&self.resolved)
    }

    pub fn resolved(&self, name: &str) -> Option<&Path> {
        self.resolved.get(name).map(PathBuf::as_path)
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for CommandRegistry {
    fn run(&self, name: &str, args: &ArgList, output: OutputMode<'_>) -> Result<Invocation, InvokeError> {
        let program = self
            .resolved(name)
            .ok_or_else(|| InvokeError::NotLocated(name.to_string()))?;

        let mut command = Command::new(program);
        command.args(args.to_args());
        tracing::debug!("Executing {} {}", program.display(), args);

        let spawn_error = |source: std::io::Error| InvokeError::Spawn {
            name: name.to_string(),
            source,
        };

        let start = Instant::now();
        match output {
            OutputMode::Capture => {
                let out = command
                    .stdout(Stdio::piped())
                    .output()
                    .map_err(spawn_error)?;
                Ok(Invocation {
                    exit_code: out.status.code(),
                    stdout: Some(String::from_utf8_lossy(&out.stdout).into_owned()),
                    elapsed: start.elapsed(),
                })
            }
            OutputMode::File(log_path) => {
                let log = File::create(log_path).map_err(|source| InvokeError::LogFile {
                    path: log_path.to_path_buf(),
                    source,
                })?;
                let status = command.stdout(log).status().map_err(spawn_error)?;
                let invocation = Invocation {
                    exit_code: status.code(),
                    stdout: None,
                    elapsed: start.elapsed(),
                };
                append_trailer(log_path, &invocation).map_err(|source| InvokeError::LogFile {
                    path: log_path.to_path_buf(),
                    source,
                })?;
                Ok(invocation)
            }
            OutputMode::Inherit => {
                let status = command.status().map_err(spawn_error)?;
                Ok(Invocation {
                    exit_code: status.code(),
                    stdout: None,
                    elapsed: start.elapsed(),
                })
            }
        }
    }
}
