use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::{RunConfiguration, Stage};

pub const LOG_DIR_NAME: &str = "log";
pub const ARTIFACT_DIR_NAME: &str = "netcdf";
/// Extension shared by input files and result artifacts
pub const DATA_EXTENSION: &str = "nc";
const ARTIFACT_SUFFIX: &str = "-clusters";
/// Transient files from visualization conversion (`*.vtk`, `*.vtr`, ...)
const TRANSIENT_EXTENSION_PREFIX: &str = "vt";

/// Output path of a run: `<output>/clustering`, or `<output>/scale<text>` when a scale is set
pub fn resolve_output_path(config: &RunConfiguration) -> PathBuf {
    match &config.scale {
        Some(scale) => config.output_directory.join(format!("scale{}", scale)),
        None => config.output_directory.join("clustering"),
    }
}

fn has_data_extension(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(DATA_EXTENSION)
}

fn sorted_data_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to list {:?}", dir))? {
        let path = entry?.path();
        if path.is_file() && has_data_extension(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Input files in lexicographic order, which the caller guarantees is temporal order.
/// A source path naming a single file yields just that file.
pub fn list_input_files(source: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if source.is_dir() {
        sorted_data_files(source)
    } else if source.is_file() {
        Ok(vec![source.to_path_buf()])
    } else {
        anyhow::bail!("Source {:?} does not exist", source)
    }
}

/// Count result artifacts in `artifact_dir`. A missing directory counts as zero.
pub fn count_existing_artifacts(artifact_dir: &Path) -> anyhow::Result<usize> {
    if !artifact_dir.is_dir() {
        return Ok(0);
    }
    Ok(sorted_data_files(artifact_dir)?.len())
}

/// Delete and recreate the log and artifact directories under `path`.
/// Destroys previous results, so it must never run when resuming.
pub fn prepare_directories(path: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(path).with_context(|| format!("Failed to create {:?}", path))?;

    for name in [LOG_DIR_NAME, ARTIFACT_DIR_NAME] {
        let dir = path.join(name);
        if dir.exists() {
            fs::remove_dir_all(&dir).with_context(|| format!("Failed to remove {:?}", dir))?;
        }
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {:?}", dir))?;
    }
    Ok(())
}

/// Remove transient visualization files from `dir`, returning how many were deleted
pub fn remove_transient_files(dir: &Path) -> anyhow::Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to list {:?}", dir))? {
        let path = entry?.path();
        let transient = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.starts_with(TRANSIENT_EXTENSION_PREFIX));
        if transient && path.is_file() {
            fs::remove_file(&path).with_context(|| format!("Failed to remove {:?}", path))?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// On-disk layout of one run. All path computations are pure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn for_run(config: &RunConfiguration) -> Self {
        Self::new(resolve_output_path(config))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join(LOG_DIR_NAME)
    }

    pub fn artifact_dir(&self) -> PathBuf {
        self.root.join(ARTIFACT_DIR_NAME)
    }

    pub fn prepare(&self) -> anyhow::Result<()> {
        prepare_directories(&self.root)
    }

    /// Create missing directories without touching existing results
    pub fn ensure(&self) -> anyhow::Result<()> {
        for dir in [self.log_dir(), self.artifact_dir()] {
            fs::create_dir_all(&dir).with_context(|| format!("Failed to create {:?}", dir))?;
        }
        Ok(())
    }

    pub fn count_existing_artifacts(&self) -> anyhow::Result<usize> {
        count_existing_artifacts(&self.artifact_dir())
    }

    /// Artifact the detect stage writes for `input`:
    /// `netcdf/<stem>-clusters.nc`, or `netcdf/<stem>-<t>-clusters.nc` for time slice `t`
    pub fn artifact_path(&self, input: &Path, time_index: i64) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = if time_index >= 0 {
            format!("{}-{}{}.{}", stem, time_index, ARTIFACT_SUFFIX, DATA_EXTENSION)
        } else {
            format!("{}{}.{}", stem, ARTIFACT_SUFFIX, DATA_EXTENSION)
        };
        self.artifact_dir().join(name)
    }

    /// `log/clustering_<n>.log` or `log/tracking_<n>.log`
    pub fn log_path(&self, stage: Stage, index: usize) -> PathBuf {
        self.log_dir()
            .join(format!("{}_{}.log", stage.log_prefix(), index))
    }
}
