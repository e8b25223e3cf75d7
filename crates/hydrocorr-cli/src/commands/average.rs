use super::{require_files, write_table};
use crate::cli::AverageArgs;
use crate::error::Result;
use hydrocorr::workflows::ensemble;
use tracing::info;

pub fn run(args: AverageArgs) -> Result<()> {
    let files = require_files(&args.dir, &args.pattern)?;
    info!("Averaging {} tables from {:?}", files.len(), &args.dir);

    let table = ensemble::average_tables(&files)?;
    write_table(&table, &args.output)?;

    println!(
        "Averaged {} tables ({} rows) into {}",
        files.len(),
        table.n_rows(),
        args.output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use hydrocorr::core::io::table::Table;
    use hydrocorr::engine::error::AnalysisError;
    use std::fs;
    use tempfile::TempDir;

    fn args(dir: &TempDir, output: &str) -> AverageArgs {
        AverageArgs {
            dir: dir.path().to_path_buf(),
            pattern: "simu_*.dac.txt".to_string(),
            output: dir.path().join(output),
        }
    }

    #[test]
    fn averages_matching_tables_and_keeps_the_header() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("simu_1.dac.txt"), "# a b\n1 2\n3 4\n").unwrap();
        fs::write(dir.path().join("simu_2.dac.txt"), "# a b\n3 6\n5 8\n").unwrap();
        fs::write(dir.path().join("unrelated.txt"), "# a b\n100 100\n100 100\n").unwrap();

        run(args(&dir, "mean.txt")).unwrap();

        let mean = Table::read_from_path(dir.path().join("mean.txt")).unwrap();
        assert_eq!(mean.columns(), ["a", "b"]);
        assert_eq!(mean.data().row(0).to_vec(), vec![2.0, 4.0]);
        assert_eq!(mean.data().row(1).to_vec(), vec![4.0, 6.0]);
    }

    #[test]
    fn mismatched_shapes_fail_without_writing() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("simu_1.dac.txt"), "# a b\n1 2\n").unwrap();
        fs::write(dir.path().join("simu_2.dac.txt"), "# a b\n1 2\n3 4\n").unwrap();

        let result = run(args(&dir, "mean.txt"));

        assert!(matches!(
            result,
            Err(CliError::Core(AnalysisError::Table { .. }))
        ));
        assert!(!dir.path().join("mean.txt").exists());
    }

    #[test]
    fn no_matching_tables_is_an_argument_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            run(args(&dir, "mean.txt")),
            Err(CliError::Argument(_))
        ));
    }
}
