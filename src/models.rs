use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::ConfigError;

/// One variable of the feature space
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement_value: Option<f64>,
}

/// The `data` section: which dimensions and variables the detect stage works on
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSpec {
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub variables: Vec<VariableSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vtk_dimensions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_cluster_size: Option<u32>,
    /// Feed the previous frame's artifact into detection
    #[serde(default)]
    pub use_previous: bool,
    #[serde(default, rename = "useCIScore")]
    pub use_ci_score: bool,
    /// Passed through verbatim to the detect executable
    #[serde(default, rename = "meanie3D-detect", skip_serializing_if = "Option::is_none")]
    pub extra_params: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub histogram_variable: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub histogram_weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_time: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size_deviation: Option<u32>,
    #[serde(default)]
    pub use_displacement_vectors: bool,
    /// Passed through verbatim to the track executable
    #[serde(default, rename = "meanie3D-track", skip_serializing_if = "Option::is_none")]
    pub extra_params: Option<String>,
}

/// Contents of the JSON configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub data: Option<DataSpec>,
    #[serde(default)]
    pub detection: Option<DetectionSpec>,
    #[serde(default)]
    pub tracking: Option<TrackingSpec>,
    /// Remove transient `*.vt*` files from the working directory after each frame
    #[serde(default, rename = "cleanup_vtk", alias = "cleanupVtk")]
    pub cleanup_vtk: bool,
}

/// Scale parameter as the user wrote it.
/// The text names the output directory and is forwarded unchanged, so `10.0` stays `10.0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scale(String);

impl Scale {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Scale {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        text.parse::<f64>()
            .map_err(|_| ConfigError::InvalidScale(s.to_string()))?;
        Ok(Self(text.to_string()))
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything one pipeline invocation needs. Never mutated while the pipeline runs.
#[derive(Debug, Clone)]
pub struct RunConfiguration {
    pub description: String,
    pub source_directory: PathBuf,
    pub output_directory: PathBuf,
    /// Directory the external tools drop transient files into
    pub working_directory: PathBuf,
    pub resume: bool,
    pub scale: Option<Scale>,
    pub ranges: Option<String>,
    pub data: Option<DataSpec>,
    pub detection: Option<DetectionSpec>,
    pub tracking: Option<TrackingSpec>,
    pub cleanup_vtk: bool,
    pub time_operations: bool,
    /// -1 processes one frame per file, otherwise the time slice within each file
    pub time_index: i64,
}

impl RunConfiguration {
    pub fn new(
        config: ConfigFile,
        source_directory: impl Into<PathBuf>,
        output_directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            description: config.description,
            source_directory: source_directory.into(),
            output_directory: output_directory.into(),
            working_directory: PathBuf::from("."),
            resume: false,
            scale: None,
            ranges: None,
            data: config.data,
            detection: config.detection,
            tracking: config.tracking,
            cleanup_vtk: config.cleanup_vtk,
            time_operations: false,
            time_index: -1,
        }
    }

    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    pub fn with_scale(mut self, scale: Option<Scale>) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_ranges(mut self, ranges: Option<String>) -> Self {
        self.ranges = ranges;
        self
    }

    pub fn with_time_index(mut self, time_index: i64) -> Self {
        self.time_index = time_index;
        self
    }

    pub fn with_time_operations(mut self, time_operations: bool) -> Self {
        self.time_operations = time_operations;
        self
    }

    pub fn with_working_directory(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_directory = dir.as_ref().to_path_buf();
        self
    }

    /// Check the mandatory `data` items and hand back the section
    pub fn validate(&self) -> Result<&DataSpec, ConfigError> {
        let data = self.data.as_ref().ok_or(ConfigError::MissingSection("data"))?;
        if data.variables.is_empty() {
            return Err(ConfigError::MissingField("data.variables"));
        }
        if data.dimensions.is_empty() {
            return Err(ConfigError::MissingField("data.dimensions"));
        }
        Ok(data)
    }

    pub fn is_time_series(&self) -> bool {
        self.time_index >= 0
    }
}

/// The two external stages run per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Detect,
    Track,
}

impl Stage {
    /// Prefix of the per-frame log file
    pub fn log_prefix(&self) -> &'static str {
        match self {
            Stage::Detect => "clustering",
            Stage::Track => "tracking",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Detect => write!(f, "detect"),
            Stage::Track => write!(f, "track"),
        }
    }
}
