use crate::cli::AnalyzeArgs;
use crate::config::PartialAnalysisConfig;
use crate::error::{CliError, Result};
use crate::utils::discovery::find_files;
use crate::utils::progress::CliProgressHandler;
use hydrocorr::core::analysis::quantities::DipoleSelection;
use hydrocorr::engine::progress::ProgressReporter;
use hydrocorr::workflows::analyze::{self, AnalysisKind, AnalysisOutcome, AnalysisRequest};
use tracing::{error, info, warn};

fn build_request(args: &AnalyzeArgs) -> AnalysisRequest {
    let mut kinds = if args.analyses.is_empty() {
        AnalysisKind::ALL.to_vec()
    } else {
        args.analyses.clone()
    };
    kinds.sort();
    kinds.dedup();
    AnalysisRequest {
        kinds,
        dipole: args
            .molecule
            .map_or(DipoleSelection::Ensemble, DipoleSelection::Molecule),
        force: args.force,
    }
}

pub fn run(args: AnalyzeArgs, show_progress: bool) -> Result<()> {
    let partial_config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            PartialAnalysisConfig::from_file(path)?
        }
        None => PartialAnalysisConfig::default(),
    };
    info!("Merging configuration from file and CLI arguments...");
    let config = partial_config.merge_with_cli(&args)?;
    let request = build_request(&args);

    let mut inputs = Vec::new();
    let mut failed_dirs = 0;
    for dir in &args.dirs {
        match find_files(dir, &args.pattern) {
            Ok(found) => {
                if found.is_empty() {
                    warn!(dir = %dir.display(), pattern = %args.pattern, "No trajectories found.");
                }
                inputs.extend(found);
            }
            Err(e) => {
                error!(dir = %dir.display(), "Skipping directory: {}", e);
                eprintln!("  ✗ {}: {}", dir.display(), e);
                failed_dirs += 1;
            }
        }
    }
    if inputs.is_empty() && failed_dirs == 0 {
        return Err(CliError::Argument(format!(
            "No trajectories matching '{}' in the given directories",
            args.pattern
        )));
    }
    info!(
        files = inputs.len(),
        analyses = request.kinds.len(),
        "Starting batch analysis."
    );

    let progress_handler = if show_progress {
        CliProgressHandler::new()
    } else {
        CliProgressHandler::hidden()
    };
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    let mut failed = failed_dirs;
    for input in &inputs {
        println!("Analyzing {}", input.display());
        match analyze::run(input, &config, &request, &reporter) {
            Ok(outcomes) => {
                for (kind, outcome) in outcomes {
                    match outcome {
                        AnalysisOutcome::Written(path) => {
                            println!("  ✓ {:<18} {}", kind.name(), path.display())
                        }
                        AnalysisOutcome::Skipped(path) => {
                            println!("  - {:<18} {} (already complete)", kind.name(), path.display())
                        }
                    }
                }
            }
            Err(e) => {
                error!(input = %input.display(), "Analysis failed: {}", e);
                eprintln!("  ✗ {}: {}", input.display(), e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(CliError::Batch {
            failed,
            total: inputs.len() + failed_dirs,
        });
    }
    println!("Processed {} trajectories.", inputs.len());
    Ok(())
}
