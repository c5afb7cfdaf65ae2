use frametrack::{
    ArgList, CommandRunner, ConfigFile, DataSpec, DetectionSpec, Invocation, InvokeError,
    OutputMode, RunConfiguration, Scale, TrackingSpec, VariableSpec,
};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// One call made through the recording runner
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub name: String,
    pub args: ArgList,
    pub log_file: Option<PathBuf>,
}

impl RecordedCall {
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.args.value_of(flag)
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.args.has_flag(flag)
    }
}

/// Stands in for the external executables.
/// Records every call and optionally behaves like the real tools on disk.
#[derive(Default)]
pub struct RecordingRunner {
    calls: RefCell<Vec<RecordedCall>>,
    /// (command name, nth call of that command) -> exit code
    failing: HashMap<(String, usize), i32>,
    /// Create the `-o` artifact and the log file like the real tools do
    write_outputs: bool,
    /// Directory the fake tools drop a transient `.vtk` file into
    transient_dir: Option<PathBuf>,
    stale_transients_seen: Cell<usize>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writing_outputs(mut self) -> Self {
        self.write_outputs = true;
        self
    }

    pub fn failing_on(mut self, name: &str, nth_call: usize, exit_code: i32) -> Self {
        self.failing.insert((name.to_string(), nth_call), exit_code);
        self
    }

    pub fn dropping_transients_in(mut self, dir: &Path) -> Self {
        self.transient_dir = Some(dir.to_path_buf());
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.borrow().clone()
    }

    pub fn calls_for(&self, name: &str) -> Vec<RecordedCall> {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.name == name)
            .cloned()
            .collect()
    }

    /// Transient files that were still lying around when a later call started
    pub fn stale_transients_seen(&self) -> usize {
        self.stale_transients_seen.get()
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), InvokeError> {
    fs::write(path, contents).map_err(|source| InvokeError::LogFile {
        path: path.to_path_buf(),
        source,
    })
}

impl CommandRunner for RecordingRunner {
    fn run(&self, name: &str, args: &ArgList, output: OutputMode<'_>) -> Result<Invocation, InvokeError> {
        let log_file = match output {
            OutputMode::File(path) => Some(path.to_path_buf()),
            _ => None,
        };
        let nth = self
            .calls
            .borrow()
            .iter()
            .filter(|call| call.name == name)
            .count();

        if let Some(dir) = &self.transient_dir {
            let stale = count_transients(dir);
            self.stale_transients_seen
                .set(self.stale_transients_seen.get() + stale);
            write_file(&dir.join(format!("{}_{}.vtk", name, nth)), "vtk")?;
        }

        if self.write_outputs {
            if let Some(artifact) = args.value_of("-o") {
                write_file(Path::new(artifact), "artifact")?;
            }
            if let Some(log) = &log_file {
                write_file(log, &format!("{} {}\n", name, args))?;
            }
        }

        self.calls.borrow_mut().push(RecordedCall {
            name: name.to_string(),
            args: args.clone(),
            log_file,
        });

        let exit_code = self
            .failing
            .get(&(name.to_string(), nth))
            .copied()
            .unwrap_or(0);
        Ok(Invocation {
            exit_code: Some(exit_code),
            stdout: None,
            elapsed: Duration::from_millis(1),
        })
    }
}

pub fn count_transients(dir: &Path) -> usize {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|entry| {
                    entry
                        .path()
                        .extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| ext.starts_with("vt"))
                })
                .count()
        })
        .unwrap_or(0)
}

/// Creates a source directory holding empty files with the given names.
/// The directory is removed when the returned guard is dropped.
pub fn make_source_dir(names: &[&str]) -> TempDir {
    let dir = TempDir::new().expect("Failed to create source directory");
    for name in names {
        fs::write(dir.path().join(name), b"").expect("Failed to create input file");
    }
    dir
}

pub fn add_input(dir: &TempDir, name: &str) {
    fs::write(dir.path().join(name), b"").expect("Failed to create input file");
}

pub fn sample_data() -> DataSpec {
    DataSpec {
        dimensions: vec!["y".to_string(), "x".to_string()],
        variables: vec![VariableSpec {
            name: "RX".to_string(),
            lower_threshold: Some(35.0),
            upper_threshold: None,
            replacement_value: None,
        }],
        vtk_dimensions: Some(vec!["x".to_string(), "y".to_string()]),
    }
}

pub fn sample_detection() -> DetectionSpec {
    DetectionSpec {
        min_cluster_size: Some(50),
        use_previous: true,
        use_ci_score: false,
        extra_params: Some("--verbosity 1".to_string()),
    }
}

pub fn sample_tracking() -> TrackingSpec {
    TrackingSpec {
        histogram_variable: Some("RX".to_string()),
        position_weight: Some(1.0),
        ..TrackingSpec::default()
    }
}

pub fn sample_config_file() -> ConfigFile {
    ConfigFile {
        description: "test run".to_string(),
        data: Some(sample_data()),
        detection: Some(sample_detection()),
        tracking: Some(sample_tracking()),
        cleanup_vtk: false,
    }
}

/// Fresh file-per-frame run from `source` into `output`, working directory = `output`
pub fn run_config(source: &Path, output: &Path) -> RunConfiguration {
    RunConfiguration::new(sample_config_file(), source, output).with_working_directory(output)
}

/// Scale parsed from the text a user would pass on the command line
pub fn scale(text: &str) -> Scale {
    text.parse().expect("numeric scale")
}

pub const DETECT: &str = "meanie3D-detect";
pub const TRACK: &str = "meanie3D-track";
