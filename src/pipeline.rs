use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::external::{CommandRunner, OutputMode};
use crate::layout::{self, OutputLayout};
use crate::models::{DetectionSpec, RunConfiguration, Stage};
use crate::params::{ArgList, build_detect_params, build_track_params};

pub const DEFAULT_DETECT_COMMAND: &str = "meanie3D-detect";
pub const DEFAULT_TRACK_COMMAND: &str = "meanie3D-track";

/// Names of the external executables for the two stages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandNames {
    pub detect: String,
    pub track: String,
}

impl CommandNames {
    /// The executables a run with this configuration actually needs
    pub fn required(&self, config: &RunConfiguration) -> Vec<&str> {
        let mut names = Vec::new();
        if config.detection.is_some() {
            names.push(self.detect.as_str());
        }
        if config.tracking.is_some() {
            names.push(self.track.as_str());
        }
        names
    }

    fn for_stage(&self, stage: Stage) -> &str {
        match stage {
            Stage::Detect => &self.detect,
            Stage::Track => &self.track,
        }
    }
}

impl Default for CommandNames {
    fn default() -> Self {
        Self {
            detect: DEFAULT_DETECT_COMMAND.to_string(),
            track: DEFAULT_TRACK_COMMAND.to_string(),
        }
    }
}

/// One finished external invocation
#[derive(Debug, Clone)]
pub struct StageReport {
    pub stage: Stage,
    pub exit_code: Option<i32>,
    pub elapsed: Duration,
    pub log_file: PathBuf,
}

impl StageReport {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    Success,
    /// The first stage of the frame that exited unsuccessfully
    ExternalFailure { stage: Stage, exit_code: Option<i32> },
    /// Already completed by an earlier run
    Skipped,
}

#[derive(Debug, Clone)]
pub struct FrameReport {
    pub ordinal: usize,
    pub input: PathBuf,
    pub artifact: PathBuf,
    pub outcome: FrameOutcome,
    pub detect: Option<StageReport>,
    pub track: Option<StageReport>,
}

impl FrameReport {
    fn skipped(ordinal: usize, input: &Path, artifact: &Path) -> Self {
        Self {
            ordinal,
            input: input.to_path_buf(),
            artifact: artifact.to_path_buf(),
            outcome: FrameOutcome::Skipped,
            detect: None,
            track: None,
        }
    }

    fn processed(
        ordinal: usize,
        input: &Path,
        artifact: &Path,
        detect: Option<StageReport>,
        track: Option<StageReport>,
    ) -> Self {
        let outcome = detect
            .iter()
            .chain(track.iter())
            .find(|report| !report.success())
            .map(|report| FrameOutcome::ExternalFailure {
                stage: report.stage,
                exit_code: report.exit_code,
            })
            .unwrap_or(FrameOutcome::Success);

        Self {
            ordinal,
            input: input.to_path_buf(),
            artifact: artifact.to_path_buf(),
            outcome,
            detect,
            track,
        }
    }
}

/// Outcome of one pipeline invocation
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub output_path: PathBuf,
    pub time_index: i64,
    pub resume_at_index: usize,
    pub frames: Vec<FrameReport>,
}

impl RunSummary {
    pub fn processed_count(&self) -> usize {
        self.frames
            .iter()
            .filter(|frame| frame.outcome != FrameOutcome::Skipped)
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.frames.len() - self.processed_count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FrameReport> {
        self.frames
            .iter()
            .filter(|frame| matches!(frame.outcome, FrameOutcome::ExternalFailure { .. }))
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Loop state, owned by a single invocation
#[derive(Debug, Clone, Default)]
pub struct FrameState {
    pub run_count: usize,
    /// Artifact of the immediately preceding frame, real or skipped
    pub previous_artifact: Option<PathBuf>,
    pub resume_at_index: usize,
}

impl FrameState {
    pub fn new(resume_at_index: usize) -> Self {
        Self {
            run_count: 0,
            previous_artifact: None,
            resume_at_index,
        }
    }

    fn advance(&mut self, artifact: PathBuf) {
        self.previous_artifact = Some(artifact);
        self.run_count += 1;
    }
}

/// Runs every input file through detect and track, strictly in file order
pub struct FramePipeline<'a, R: CommandRunner + ?Sized> {
    config: &'a RunConfiguration,
    runner: &'a R,
    commands: CommandNames,
}

impl<'a, R: CommandRunner + ?Sized> FramePipeline<'a, R> {
    pub fn new(config: &'a RunConfiguration, runner: &'a R) -> Self {
        Self {
            config,
            runner,
            commands: CommandNames::default(),
        }
    }

    pub fn with_commands(mut self, commands: CommandNames) -> Self {
        self.commands = commands;
        self
    }

    pub fn run(&self) -> Result<RunSummary> {
        let config = self.config;
        config.validate()?;

        let detect_params = build_detect_params(config)?;
        let track_params = build_track_params(config)?;

        let time_index = config.time_index;
        let layout = OutputLayout::for_run(config);

        let resume_at_index = if config.resume {
            layout.ensure()?;
            let count = layout.count_existing_artifacts()?;
            info!("Resuming at index {}", count);
            count
        } else {
            // intermediate time slices reuse the directories made at the first one
            if time_index <= 0 {
                info!("Removing results from previous runs in {:?}", layout.root());
                layout.prepare()?;
            } else {
                layout.ensure()?;
            }
            0
        };

        let inputs = layout::list_input_files(&config.source_directory)?;

        // a time slice completed earlier covers every file of that slice
        let skip_invocation =
            config.resume && config.is_time_series() && (time_index as usize) < resume_at_index;

        let mut state = FrameState::new(resume_at_index);
        let mut frames = Vec::with_capacity(inputs.len());

        for (ordinal, input) in inputs.iter().enumerate() {
            let artifact = layout.artifact_path(input, time_index);

            let skip = skip_invocation
                || (!config.is_time_series() && ordinal < state.resume_at_index);
            if skip {
                debug!("Skipping {:?}, already processed", input);
                frames.push(FrameReport::skipped(ordinal, input, &artifact));
                state.advance(artifact);
                continue;
            }

            info!("Processing {:?}", input);

            let previous = if time_index > 0 {
                Some(layout.artifact_path(input, time_index - 1))
            } else {
                state.previous_artifact.clone()
            };
            let has_predecessor = ordinal > 0 || time_index > 0;
            let log_index = if config.is_time_series() {
                time_index as usize
            } else {
                ordinal
            };

            let mut detect = None;
            if let Some(detection) = &config.detection {
                let args = self.detect_args(
                    &detect_params,
                    detection,
                    &inputs,
                    ordinal,
                    &artifact,
                    previous.as_deref(),
                );
                let log_file = layout.log_path(Stage::Detect, log_index);
                detect = Some(self.invoke(Stage::Detect, &args, log_file)?);
            }

            let mut track = None;
            if config.tracking.is_some() && has_predecessor {
                if let Some(previous) = previous.as_deref() {
                    let mut args = track_params.clone();
                    args.option("-p", previous.display())
                        .option("-c", artifact.display());
                    let log_file = layout.log_path(Stage::Track, log_index);
                    track = Some(self.invoke(Stage::Track, &args, log_file)?);
                }
            }

            if config.cleanup_vtk {
                let removed = layout::remove_transient_files(&config.working_directory)?;
                debug!("Removed {} transient files", removed);
            }

            frames.push(FrameReport::processed(ordinal, input, &artifact, detect, track));
            state.advance(artifact);
        }

        info!(
            "Done. {} frames, {} run by this invocation",
            state.run_count,
            frames.iter().filter(|f| f.outcome != FrameOutcome::Skipped).count()
        );

        Ok(RunSummary {
            output_path: layout.root().to_path_buf(),
            time_index,
            resume_at_index,
            frames,
        })
    }

    /// Complete detect command for one frame.
    /// Appends in order: time index, scale, ranges, previous artifact, CI comparison, input and output.
    fn detect_args(
        &self,
        base: &ArgList,
        detection: &DetectionSpec,
        inputs: &[PathBuf],
        ordinal: usize,
        artifact: &Path,
        previous: Option<&Path>,
    ) -> ArgList {
        let config = self.config;
        let time_index = config.time_index;
        let mut args = base.clone();

        if config.is_time_series() {
            args.option("--time-index", time_index);
        }
        if let Some(scale) = &config.scale {
            args.option("--scale", scale);
        }
        if let Some(ranges) = &config.ranges {
            args.option("--ranges", ranges);
        }

        let has_predecessor = ordinal > 0 || time_index > 0;
        if detection.use_previous && has_predecessor {
            if let Some(previous) = previous {
                args.option("-p", previous.display())
                    .flag("--postprocess-with-previous-output");
            }
        }

        if detection.use_ci_score && ordinal >= 3 {
            let comparison = &inputs[ordinal - 3];
            let stem = comparison
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let protoclusters = config
                .working_directory
                .join(format!("protoclusters-{}.{}", stem, layout::DATA_EXTENSION));
            args.option("--ci-comparison-file", comparison.display())
                .option("--ci-comparison-protocluster-file", protoclusters.display());
        }

        let input = &inputs[ordinal];
        args.option("-f", input.display())
            .option("-o", artifact.display());
        args
    }

    fn invoke(&self, stage: Stage, args: &ArgList, log_file: PathBuf) -> Result<StageReport> {
        let name = self.commands.for_stage(stage);
        debug!("{} {}", name, args);

        let invocation = self
            .runner
            .run(name, args, OutputMode::File(&log_file))?;

        let seconds = invocation.elapsed.as_secs_f64();
        if self.config.time_operations {
            info!("{} finished ({:.2} seconds)", stage, seconds);
        } else {
            debug!("{} finished ({:.2} seconds)", stage, seconds);
        }
        if !invocation.success() {
            warn!(
                "{} failed with exit code {:?}, see {:?}",
                stage, invocation.exit_code, log_file
            );
        }

        Ok(StageReport {
            stage,
            exit_code: invocation.exit_code,
            elapsed: invocation.elapsed,
            log_file,
        })
    }
}
