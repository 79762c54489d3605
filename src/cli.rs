//! The command line interface for deriving crop-yield hazards.
use crate::batch::{BatchPlan, run_batch};
use crate::log;
use crate::output::metadata::write_metadata;
use crate::output::{create_output_directory, get_output_dir};
use crate::parallel::ProcessingMode;
use crate::parameters::BatchParameters;
use crate::settings::Settings;
use crate::year::YearRange;
use ::log::{info, warn};
use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};

pub mod settings;
use settings::SettingsSubcommands;

/// The command line interface for deriving crop-yield hazards.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
    /// Flag to provide the CLI docs as markdown
    #[arg(long, hide = true)]
    markdown_help: bool,
}

/// Options for the run command
#[derive(Args, Default)]
pub struct RunOpts {
    /// Directory for output files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
    /// Path to a TOML file of batch parameters
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// The historical years to average over, e.g. 1976-2005
    #[arg(long)]
    pub reference_range: Option<YearRange>,
    /// Number of threads (0 = all cores, 1 = no parallelism)
    #[arg(long)]
    pub threads: Option<usize>,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Derive hazard products from a folder of crop-model outputs.
    Run {
        /// Path to the folder of input files.
        input_dir: PathBuf,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Check that a folder of input files can be processed, without reading any rasters.
    Validate {
        /// Path to the folder of input files.
        input_dir: PathBuf,
        /// Path to a TOML file of batch parameters
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Manage settings file.
    Settings {
        /// The subcommands for managing the settings file.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Run { input_dir, opts } => handle_run_command(&input_dir, &opts, None),
            Self::Validate { input_dir, config } => {
                handle_validate_command(&input_dir, config.as_deref(), None)
            }
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse CLI arguments and start the program
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Invoked as: `$ crop_potential --markdown-help`
    if cli.markdown_help {
        clap_markdown::print_help_markdown::<Cli>();
        return Ok(());
    }

    let Some(command) = cli.command else {
        // Output program help in markdown format
        let help_str = Cli::command().render_long_help().to_string();
        println!("{help_str}");
        return Ok(());
    };

    command.execute()
}

/// Load batch parameters, applying any overrides given on the command line
fn load_parameters(config: Option<&Path>, reference_range: Option<YearRange>) -> Result<BatchParameters> {
    let mut parameters = BatchParameters::load(config).context("Failed to load batch parameters.")?;
    if let Some(reference_range) = reference_range {
        parameters.reference_range = reference_range;
        parameters
            .validate()
            .context("Invalid value for --reference-range")?;
    }

    Ok(parameters)
}

/// Handle the `run` command.
pub fn handle_run_command(
    input_path: &Path,
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    // Load program settings, if not provided
    let mut settings = if let Some(settings) = settings {
        settings
    } else {
        Settings::load().context("Failed to load settings.")?
    };

    settings.apply_run_overrides(opts.overwrite, opts.threads);

    let parameters = load_parameters(opts.config.as_deref(), opts.reference_range)?;

    // Get path to output folder
    let pathbuf: PathBuf;
    let output_path = if let Some(p) = opts.output_dir.as_deref() {
        p
    } else {
        pathbuf = get_output_dir(input_path)?;
        &pathbuf
    };

    let overwrite = create_output_directory(output_path, settings.overwrite).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            output_path.display()
        )
    })?;

    // Initialise program logger
    log::init(Some(&settings.log_level), Some(output_path))
        .context("Failed to initialise logging.")?;
    info!("Input folder: {}", input_path.display());
    info!("Output folder: {}", output_path.display());

    // NB: We have to wait until the logger is initialised to display this warning
    if overwrite {
        warn!("Output folder will be overwritten");
    }

    write_metadata(output_path, input_path, &parameters).context("Failed to save metadata.")?;

    let mode = ProcessingMode::from_num_threads(settings.num_threads);
    run_batch(input_path, output_path, &parameters, mode)?;
    info!("Batch complete!");

    Ok(())
}

/// Handle the `validate` command.
pub fn handle_validate_command(
    input_path: &Path,
    config: Option<&Path>,
    settings: Option<Settings>,
) -> Result<()> {
    // Load program settings, if not provided
    let settings = if let Some(settings) = settings {
        settings
    } else {
        Settings::load().context("Failed to load settings.")?
    };

    // Initialise program logger (we won't save log files when running the validate command)
    log::init(Some(&settings.log_level), None).context("Failed to initialise logging.")?;

    let parameters = load_parameters(config, None)?;
    let plan = BatchPlan::discover(input_path, &parameters).context("Failed to validate inputs.")?;
    for (crop_irrigation, indices) in &plan.groups {
        info!("{crop_irrigation}: {} historical files", indices.len());
    }
    info!(
        "Validation successful: {} historical and {} future files ({} scenarios)",
        plan.historical.len(),
        plan.future.len(),
        plan.future_scenarios.len()
    );

    Ok(())
}
