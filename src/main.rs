use clap::Parser;
use std::path::PathBuf;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing_subscriber::EnvFilter;

use frametrack::config::{self, EXAMPLE_CONFIG};
use frametrack::{CommandNames, CommandRegistry, Driver, FrameOutcome, RunConfiguration, Scale};

#[derive(Parser)]
#[command(name = "frametrack")]
#[command(about = "Run a directory of data files through detection and tracking")]
struct Cli {
    /// JSON configuration specifying variables, detection and tracking
    #[arg(short, long, value_name = "JSON", required_unless_present = "json_example")]
    config: Option<PathBuf>,

    /// Directory of input files, processed in alphabetical order
    #[arg(short = 'f', long, value_name = "DIR", required_unless_present = "json_example")]
    source: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    output: PathBuf,

    /// Comma separated list of scale parameters, each kept as written
    #[arg(short, long, value_delimiter = ',')]
    scales: Vec<Scale>,

    /// Bandwidths, one per spatial and value range variable
    #[arg(short, long)]
    ranges: Option<String>,

    /// First time index to process in files with a time dimension
    #[arg(long)]
    start: Option<i64>,

    /// Time index to stop at (exclusive)
    #[arg(long)]
    end: Option<i64>,

    /// Continue where a previous run left off instead of erasing its results
    #[arg(long)]
    resume: bool,

    /// Report the elapsed time of every external invocation
    #[arg(long)]
    time_operations: bool,

    /// Additional directory to search for the executables, searched first
    #[arg(long, value_name = "DIR")]
    bin_dir: Vec<PathBuf>,

    /// Search the executable directories recursively
    #[arg(long)]
    recursive: bool,

    /// Print an example configuration and exit
    #[arg(long)]
    json_example: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "frametrack=debug" } else { "frametrack=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    if args.json_example {
        println!("{}", EXAMPLE_CONFIG);
        return Ok(());
    }

    init_logging(args.verbose);

    let (Some(config_path), Some(source)) = (args.config, args.source) else {
        anyhow::bail!("Both --config and --source are required");
    };
    let time_range = config::time_range(args.start, args.end)?;
    let config_file = config::load_config(&config_path)?;

    tracing::info!("Configuration: {}", config_file.description);

    let run_config = RunConfiguration::new(
        config_file,
        std::path::absolute(&source)?,
        std::path::absolute(&args.output)?,
    )
    .with_working_directory(std::env::current_dir()?)
    .with_resume(args.resume)
    .with_ranges(args.ranges)
    .with_time_operations(args.time_operations);
    run_config.validate()?;

    let commands = CommandNames::default();
    let mut registry = CommandRegistry::new().with_recursive(args.recursive);
    for dir in args.bin_dir.into_iter().rev() {
        registry = registry.prepend_search_path(dir);
    }
    registry.locate(commands.required(&run_config))?;

    let started_at = OffsetDateTime::now_utc();
    tracing::info!("Run started {}", started_at.format(&Rfc3339)?);
    let summaries = Driver::new(&run_config, &registry)
        .with_commands(commands)
        .with_scales(args.scales)
        .with_time_range(time_range)
        .run()?;

    let mut failed = 0;
    for summary in &summaries {
        println!(
            "{}: {} processed, {} skipped",
            summary.output_path.display(),
            summary.processed_count(),
            summary.skipped_count()
        );
        for frame in summary.failures() {
            if let FrameOutcome::ExternalFailure { stage, exit_code } = &frame.outcome {
                println!(
                    "  {} failed on {} (exit code {:?})",
                    stage,
                    frame.input.display(),
                    exit_code
                );
            }
            failed += 1;
        }
    }
    let elapsed = OffsetDateTime::now_utc() - started_at;
    println!("Finished after {:.1} seconds", elapsed.as_seconds_f64());

    if failed > 0 {
        anyhow::bail!("{} frame(s) failed, inspect the logs and rerun with --resume", failed);
    }
    Ok(())
}
