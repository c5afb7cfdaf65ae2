use anyhow::Result;
use std::ops::Range;
use tracing::{debug, info, warn};

use crate::external::CommandRunner;
use crate::layout::OutputLayout;
use crate::models::{RunConfiguration, Scale};
use crate::params::{build_detect_params, build_track_params};
use crate::pipeline::{CommandNames, FramePipeline, RunSummary};

/// Invokes the frame pipeline once per (scale, time index) combination
pub struct Driver<'a, R: CommandRunner + ?Sized> {
    base: &'a RunConfiguration,
    runner: &'a R,
    commands: CommandNames,
    scales: Vec<Scale>,
    time_range: Option<Range<i64>>,
}

impl<'a, R: CommandRunner + ?Sized> Driver<'a, R> {
    pub fn new(base: &'a RunConfiguration, runner: &'a R) -> Self {
        Self {
            base,
            runner,
            commands: CommandNames::default(),
            scales: Vec::new(),
            time_range: None,
        }
    }

    pub fn with_commands(mut self, commands: CommandNames) -> Self {
        self.commands = commands;
        self
    }

    pub fn with_scales(mut self, scales: Vec<Scale>) -> Self {
        self.scales = scales;
        self
    }

    /// Process time slices `start..end` of every file instead of one frame per file
    pub fn with_time_range(mut self, time_range: Option<Range<i64>>) -> Self {
        self.time_range = time_range;
        self
    }

    /// Every (scale, time index) pair in execution order
    pub fn invocations(&self) -> Vec<(Option<Scale>, i64)> {
        let scales: Vec<Option<Scale>> = if self.scales.is_empty() {
            vec![None]
        } else {
            self.scales.iter().cloned().map(Some).collect()
        };
        let time_indices: Vec<i64> = match &self.time_range {
            Some(range) => range.clone().collect(),
            None => vec![-1],
        };

        scales
            .into_iter()
            .flat_map(|scale| time_indices.iter().map(move |&t| (scale.clone(), t)))
            .collect()
    }

    pub fn run(&self) -> Result<Vec<RunSummary>> {
        if self.base.detection.is_none() && self.base.tracking.is_none() {
            warn!("Neither detection nor tracking configured, nothing to do");
            return Ok(Vec::new());
        }

        // reject a bad configuration before any tree is cleared
        self.base.validate()?;
        build_detect_params(self.base)?;
        build_track_params(self.base)?;

        let first_time_index = self.time_range.as_ref().map_or(-1, |range| range.start);

        let mut summaries = Vec::new();
        for (scale, time_index) in self.invocations() {
            let config = self
                .base
                .clone()
                .with_scale(scale)
                .with_time_index(time_index);
            match &config.scale {
                Some(scale) => info!("Running scale {} (time index {})", scale, time_index),
                None => info!("Running time index {}", time_index),
            }

            // a fresh run owns the whole tree of a scale, whichever time index it starts at
            if !config.resume && time_index == first_time_index {
                let layout = OutputLayout::for_run(&config);
                debug!("Clearing previous results in {:?}", layout.root());
                layout.prepare()?;
            }

            let summary = FramePipeline::new(&config, self.runner)
                .with_commands(self.commands.clone())
                .run()?;
            summaries.push(summary);
        }
        Ok(summaries)
    }
}
