use super::{require_files, write_table};
use crate::cli::IrArgs;
use crate::error::{CliError, Result};
use hydrocorr::core::io::table::TableError;
use hydrocorr::engine::error::AnalysisError;
use hydrocorr::workflows::ensemble;
use tracing::info;

/// Averages the dipole tables in a directory and writes the normalised lineshape.
pub fn run(args: IrArgs) -> Result<()> {
    if args.columns.is_empty() {
        return Err(CliError::Argument(
            "at least one spectral column is required".to_string(),
        ));
    }
    let files = require_files(&args.dir, &args.pattern)?;
    info!(
        tables = files.len(),
        columns = ?args.columns,
        "Building IR lineshape."
    );

    let averaged = ensemble::average_tables(&files)?;
    let table_error = |source: TableError| {
        CliError::Core(AnalysisError::Table {
            path: args.output.clone(),
            source,
        })
    };
    let series = ensemble::ir_series(&averaged, &args.columns).map_err(table_error)?;
    let table = series.to_table().map_err(table_error)?;
    write_table(&table, &args.output)?;

    println!(
        "IR lineshape from {} tables written to {}",
        files.len(),
        args.output.display()
    );
    Ok(())
}
