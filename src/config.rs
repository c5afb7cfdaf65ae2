//! Loading the JSON run configuration

use anyhow::Context;
use std::ops::Range;
use std::path::Path;

use crate::error::ConfigError;
use crate::models::ConfigFile;

/// Printed by `--json-example`
pub const EXAMPLE_CONFIG: &str = r#"{
    "description": "Radar reflectivity, 2D",
    "data": {
        "dimensions": ["y", "x"],
        "vtkDimensions": ["x", "y"],
        "variables": [
            { "name": "RX", "lowerThreshold": 35 }
        ]
    },
    "detection": {
        "minClusterSize": 50,
        "usePrevious": true,
        "useCIScore": false,
        "meanie3D-detect": "--verbosity 1 --weight-function default"
    },
    "tracking": {
        "histogramVariable": "RX",
        "positionWeight": 1.0,
        "maxSpeed": 50,
        "maxTime": 930,
        "meanie3D-track": "--verbosity 1"
    },
    "cleanup_vtk": true
}"#;

pub fn parse_config(json: &str) -> anyhow::Result<ConfigFile> {
    let config: ConfigFile = serde_json::from_str(json).context("Malformed configuration")?;
    Ok(config)
}

pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<ConfigFile> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration {:?}", path))?;
    parse_config(&json).with_context(|| format!("Failed to parse configuration {:?}", path))
}

/// Turn the optional `--start`/`--end` pair into the time indices to process.
/// `None` means file-per-frame mode.
pub fn time_range(start: Option<i64>, end: Option<i64>) -> Result<Option<Range<i64>>, ConfigError> {
    match (start, end) {
        (None, None) => Ok(None),
        (Some(start), Some(end)) if start > end => {
            Err(ConfigError::InvertedTimeRange { start, end })
        }
        (Some(start), Some(end)) => Ok(Some(start..end)),
        _ => Err(ConfigError::IncompleteTimeRange),
    }
}
