use std::fmt;

use crate::error::ConfigError;
use crate::models::RunConfiguration;

/// A single command line element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// `--flag`
    Flag(String),
    /// `--flag value`
    Option(String, String),
    /// Verbatim token from a user supplied parameter string
    Raw(String),
}

/// Ordered command line, serialized only when the process is spawned
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgList {
    args: Vec<Arg>,
}

impl ArgList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flag(&mut self, name: &str) -> &mut Self {
        self.args.push(Arg::Flag(name.to_string()));
        self
    }

    pub fn option(&mut self, name: &str, value: impl fmt::Display) -> &mut Self {
        self.args.push(Arg::Option(name.to_string(), value.to_string()));
        self
    }

    /// Append a free-form parameter string, split into words the way a POSIX shell would.
    /// Quoted values stay one argument; unbalanced quotes are rejected.
    pub fn raw(&mut self, params: &str) -> Result<&mut Self, ConfigError> {
        let words =
            shlex::split(params).ok_or_else(|| ConfigError::MalformedParams(params.to_string()))?;
        self.args.extend(words.into_iter().map(Arg::Raw));
        Ok(self)
    }

    pub fn extend(&mut self, other: &ArgList) -> &mut Self {
        self.args.extend(other.args.iter().cloned());
        self
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// True if `name` appears either as a bare flag or as an option
    pub fn has_flag(&self, name: &str) -> bool {
        self.args.iter().any(|arg| match arg {
            Arg::Flag(flag) | Arg::Option(flag, _) | Arg::Raw(flag) => flag == name,
        })
    }

    /// Value of the first option called `name`
    pub fn value_of(&self, name: &str) -> Option<&str> {
        self.args.iter().find_map(|arg| match arg {
            Arg::Option(flag, value) if flag == name => Some(value.as_str()),
            _ => None,
        })
    }

    /// Position of the first element named `name`, used to check ordering
    pub fn position(&self, name: &str) -> Option<usize> {
        self.args.iter().position(|arg| match arg {
            Arg::Flag(flag) | Arg::Option(flag, _) | Arg::Raw(flag) => flag == name,
        })
    }

    /// Flatten into process arguments
    pub fn to_args(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.args.len() * 2);
        for arg in &self.args {
            match arg {
                Arg::Flag(flag) | Arg::Raw(flag) => out.push(flag.clone()),
                Arg::Option(flag, value) => {
                    out.push(flag.clone());
                    out.push(value.clone());
                }
            }
        }
        out
    }
}

impl fmt::Display for ArgList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_args().join(" "))
    }
}

fn name_value_list<F>(config: &RunConfiguration, select: F) -> Vec<String>
where
    F: Fn(&crate::models::VariableSpec) -> Option<f64>,
{
    config
        .data
        .iter()
        .flat_map(|data| data.variables.iter())
        .filter_map(|variable| select(variable).map(|value| format!("{}={}", variable.name, value)))
        .collect()
}

/// Parameters shared by every detect invocation of a run.
/// Per-frame values (time index, previous artifact, input and output) are appended by the pipeline.
pub fn build_detect_params(config: &RunConfiguration) -> Result<ArgList, ConfigError> {
    let mut params = ArgList::new();
    let Some(detection) = &config.detection else {
        return Ok(params);
    };

    if let Some(data) = &config.data {
        params.option("-d", data.dimensions.join(","));

        let names: Vec<&str> = data.variables.iter().map(|v| v.name.as_str()).collect();
        params.option("-v", names.join(","));

        let lower = name_value_list(config, |v| v.lower_threshold);
        if !lower.is_empty() {
            params.option("--lower-thresholds", lower.join(","));
        }
        let upper = name_value_list(config, |v| v.upper_threshold);
        if !upper.is_empty() {
            params.option("--upper-thresholds", upper.join(","));
        }
        let replacements = name_value_list(config, |v| v.replacement_value);
        if !replacements.is_empty() {
            params.option("--replacement-values", replacements.join(","));
        }

        if let Some(vtk_dimensions) = &data.vtk_dimensions {
            if !vtk_dimensions.is_empty() {
                params.option("--vtk-dimensions", vtk_dimensions.join(","));
            }
        }
    }

    if let Some(min_cluster_size) = detection.min_cluster_size {
        params.option("-m", min_cluster_size);
    }

    if let Some(extra) = &detection.extra_params {
        params.raw(extra)?;
    }

    Ok(params)
}

/// Parameters shared by every track invocation of a run.
/// The weights are always present since the track executable requires all three.
pub fn build_track_params(config: &RunConfiguration) -> Result<ArgList, ConfigError> {
    let mut params = ArgList::new();
    let Some(tracking) = &config.tracking else {
        return Ok(params);
    };

    if let Some(extra) = &tracking.extra_params {
        params.raw(extra)?;
    }

    if let Some(variable) = &tracking.histogram_variable {
        params.option("-t", variable);
    }

    params
        .option("--wt", tracking.histogram_weight.unwrap_or(0.0))
        .option("--wr", tracking.position_weight.unwrap_or(0.0))
        .option("--ws", tracking.size_weight.unwrap_or(0.0));

    if let Some(max_speed) = tracking.max_speed {
        params.option("--max-speed", format!("{:.6}", max_speed));
    }
    if let Some(max_time) = tracking.max_time {
        params.option("--max-time", max_time);
    }
    if let Some(max_size_deviation) = tracking.max_size_deviation {
        params.option("--max-size-deviation", max_size_deviation);
    }
    // same letter as the detect variable list, the two lists never share a command line
    if tracking.use_displacement_vectors {
        params.flag("-v");
    }

    Ok(params)
}
