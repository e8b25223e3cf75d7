use clap::{Args, Parser, Subcommand};
use hydrocorr::workflows::analyze::AnalysisKind;
use hydrocorr::workflows::ensemble::DEFAULT_IR_COLUMNS;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

pub const DEFAULT_TRAJECTORY_PATTERN: &str = "simu_*.xc.xyz";
pub const DEFAULT_TABLE_PATTERN: &str = "simu_*.dac.txt";

#[derive(Parser, Debug)]
#[command(
    author = "hydrocorr developers",
    version,
    about = "hydrocorr - time-correlation functions, vibrational spectra and structural statistics from water MD trajectories.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute correlation functions, spectra and distributions for every matching trajectory.
    Analyze(AnalyzeArgs),
    /// Average equally shaped output tables across an ensemble of runs.
    Average(AverageArgs),
    /// Extract a normalised IR lineshape from the ensemble average of dipole tables.
    Ir(IrArgs),
}

/// Arguments for the `analyze` subcommand.
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Directories searched for trajectory files.
    #[arg(required = true, value_name = "DIR")]
    pub dirs: Vec<PathBuf>,

    /// File-name pattern of trajectories inside each directory (`*` and `?` wildcards).
    #[arg(long, default_value = DEFAULT_TRAJECTORY_PATTERN, value_name = "GLOB")]
    pub pattern: String,

    /// Analysis to run; repeat for several. All analyses run when omitted.
    /// One of: vac, ohvac, dac, oac, bond-length, pair-distribution.
    #[arg(short, long = "analysis", value_name = "KIND")]
    pub analyses: Vec<AnalysisKind>,

    /// Correlate the dipole of a single molecule instead of the ensemble.
    #[arg(long, value_name = "IDX")]
    pub molecule: Option<usize>,

    /// Time between stored frames, in femtoseconds.
    #[arg(long, value_name = "FS")]
    pub timestep: Option<f64>,

    /// Maximum number of frames read from each trajectory.
    #[arg(long, value_name = "N")]
    pub max_frames: Option<usize>,

    /// Path to a TOML configuration file.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override configuration values (e.g., -S smoothing.length=21)
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,

    /// Recompute outputs even if their completion marker exists.
    #[arg(long)]
    pub force: bool,

    /// Neither read nor write `.npy` trajectory snapshots.
    #[arg(long)]
    pub no_cache: bool,
}

/// Arguments for the `average` subcommand.
#[derive(Args, Debug)]
pub struct AverageArgs {
    /// Directory containing the tables to average.
    #[arg(value_name = "DIR")]
    pub dir: PathBuf,

    /// File-name pattern of the tables (`*` and `?` wildcards).
    #[arg(long, default_value = DEFAULT_TABLE_PATTERN, value_name = "GLOB")]
    pub pattern: String,

    /// Path of the averaged table.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,
}

/// Arguments for the `ir` subcommand.
#[derive(Args, Debug)]
pub struct IrArgs {
    /// Directory containing the dipole correlation tables.
    #[arg(value_name = "DIR")]
    pub dir: PathBuf,

    /// File-name pattern of the tables (`*` and `?` wildcards).
    #[arg(long, default_value = DEFAULT_TABLE_PATTERN, value_name = "GLOB")]
    pub pattern: String,

    /// Zero-based spectral columns averaged into the lineshape.
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_IR_COLUMNS, value_name = "COLS")]
    pub columns: Vec<usize>,

    /// Path of the two-column `freq ir` table.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,
}
