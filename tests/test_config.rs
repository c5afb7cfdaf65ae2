//! Tests for configuration loading and validation.

mod common;

use common::*;
use frametrack::config::{EXAMPLE_CONFIG, load_config, parse_config, time_range};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

#[test]
fn test_example_config_parses() -> anyhow::Result<()> {
    let config = parse_config(EXAMPLE_CONFIG)?;

    let data = config.data.as_ref().expect("data section");
    assert_eq!(data.dimensions, vec!["y", "x"]);
    assert_eq!(data.variables[0].name, "RX");
    assert_eq!(data.variables[0].lower_threshold, Some(35.0));
    assert_eq!(data.vtk_dimensions, Some(vec!["x".to_string(), "y".to_string()]));

    let detection = config.detection.as_ref().expect("detection section");
    assert_eq!(detection.min_cluster_size, Some(50));
    assert!(detection.use_previous);
    assert!(!detection.use_ci_score);
    assert_eq!(
        detection.extra_params.as_deref(),
        Some("--verbosity 1 --weight-function default")
    );

    let tracking = config.tracking.as_ref().expect("tracking section");
    assert_eq!(tracking.histogram_variable.as_deref(), Some("RX"));
    assert_eq!(tracking.position_weight, Some(1.0));
    assert_eq!(tracking.histogram_weight, None);
    assert_eq!(tracking.max_time, Some(930));

    assert!(config.cleanup_vtk);

    Ok(())
}

#[test]
fn test_optional_sections_may_be_absent() -> anyhow::Result<()> {
    let config = parse_config(r#"{ "description": "tracking only", "tracking": {} }"#)?;

    assert!(config.data.is_none());
    assert!(config.detection.is_none());
    assert!(config.tracking.is_some());
    assert!(!config.cleanup_vtk);

    Ok(())
}

#[test]
fn test_ci_score_key() -> anyhow::Result<()> {
    let config = parse_config(r#"{ "detection": { "useCIScore": true } }"#)?;

    assert!(config.detection.expect("detection section").use_ci_score);

    Ok(())
}

#[test]
fn test_load_config_reports_path() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ not json")?;

    let err = load_config(&path).expect_err("malformed json must fail");
    assert!(format!("{:#}", err).contains("broken.json"));

    let loaded = {
        fs::write(&path, EXAMPLE_CONFIG)?;
        load_config(&path)?
    };
    assert_eq!(loaded.description, "Radar reflectivity, 2D");

    Ok(())
}

#[test]
fn test_validation_requires_variables_and_dimensions() {
    let mut config = run_config(Path::new("/in"), Path::new("/out"));
    assert!(config.validate().is_ok());

    if let Some(data) = config.data.as_mut() {
        data.dimensions.clear();
    }
    assert!(matches!(
        config.validate(),
        Err(ConfigError::MissingField("data.dimensions"))
    ));

    if let Some(data) = config.data.as_mut() {
        data.variables.clear();
    }
    assert!(matches!(
        config.validate(),
        Err(ConfigError::MissingField("data.variables"))
    ));

    config.data = None;
    assert!(matches!(config.validate(), Err(ConfigError::MissingSection("data"))));
}

#[test]
fn test_time_range() {
    assert_eq!(time_range(None, None).ok(), Some(None));
    assert_eq!(time_range(Some(2), Some(5)).ok(), Some(Some(2..5)));
    assert!(matches!(
        time_range(Some(2), None),
        Err(ConfigError::IncompleteTimeRange)
    ));
    assert!(matches!(
        time_range(Some(5), Some(2)),
        Err(ConfigError::InvertedTimeRange { start: 5, end: 2 })
    ));
}
