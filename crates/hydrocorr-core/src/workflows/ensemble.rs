use crate::core::io::table::{Table, TableError};
use crate::engine::error::AnalysisError;
use ndarray::Array1;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Column holding the wavenumber axis in correlation tables.
pub const FREQUENCY_COLUMN: usize = 5;
/// Smoothed x and y spectral columns.
pub const DEFAULT_IR_COLUMNS: [usize; 2] = [6, 7];

fn read_table(path: &Path) -> Result<Table, AnalysisError> {
    Table::read_from_path(path).map_err(|source| AnalysisError::Table {
        path: path.to_path_buf(),
        source,
    })
}

/// Elementwise mean of equally shaped tables. The header of the first table is kept.
#[instrument(skip_all, name = "average_tables", fields(tables = paths.len()))]
pub fn average_tables(paths: &[PathBuf]) -> Result<Table, AnalysisError> {
    let (first, rest) = paths.split_first().ok_or(AnalysisError::NoInputs)?;
    let head = read_table(first)?;
    let mut sum = head.data().clone();
    for path in rest {
        let table = read_table(path)?;
        if table.data().dim() != sum.dim() {
            return Err(AnalysisError::Table {
                path: path.clone(),
                source: TableError::ShapeMismatch {
                    expected: sum.dim(),
                    found: table.data().dim(),
                },
            });
        }
        sum += table.data();
    }
    sum /= paths.len() as f64;
    info!(rows = sum.nrows(), "Averaged {} tables.", paths.len());
    Table::new(head.columns().to_vec(), sum).map_err(|source| AnalysisError::Table {
        path: first.clone(),
        source,
    })
}

/// An `(x, y)` series ready for a plotting layer.
#[derive(Debug, Clone, PartialEq)]
pub struct IrSeries {
    pub freq: Array1<f64>,
    pub intensity: Array1<f64>,
}

impl IrSeries {
    pub fn to_table(&self) -> Result<Table, TableError> {
        Table::from_columns(&["freq", "ir"], &[self.freq.view(), self.intensity.view()])
    }
}

/// Mean of the given spectral columns against the frequency column, scaled to a maximum of 1.
pub fn ir_series(table: &Table, columns: &[usize]) -> Result<IrSeries, TableError> {
    let freq = table.column(FREQUENCY_COLUMN)?.to_owned();
    let mut intensity = Array1::zeros(table.n_rows());
    for &index in columns {
        intensity += &table.column(index)?;
    }
    if !columns.is_empty() {
        intensity /= columns.len() as f64;
    }
    let max = intensity.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max > 0.0 && max.is_finite() {
        intensity /= max;
    } else {
        warn!(max, "Spectrum has no positive maximum; leaving it unnormalised.");
    }
    Ok(IrSeries { freq, intensity })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{Array2, array};
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, data: Array2<f64>) -> PathBuf {
        let columns = (0..data.ncols()).map(|i| format!("c{}", i)).collect();
        let path = dir.join(name);
        Table::new(columns, data).unwrap().write_to_path(&path).unwrap();
        path
    }

    #[test]
    fn average_tables_takes_elementwise_mean() {
        let dir = tempdir().unwrap();
        let a = write(dir.path(), "simu_1.dac.txt", array![[1.0, 2.0], [3.0, 4.0]]);
        let b = write(dir.path(), "simu_2.dac.txt", array![[3.0, 2.0], [5.0, 0.0]]);

        let mean = average_tables(&[a, b]).unwrap();
        assert_eq!(mean.columns(), &["c0", "c1"]);
        assert_eq!(mean.data(), &array![[2.0, 2.0], [4.0, 2.0]]);
    }

    #[test]
    fn average_tables_rejects_shape_mismatch() {
        let dir = tempdir().unwrap();
        let a = write(dir.path(), "a.txt", array![[1.0, 2.0], [3.0, 4.0]]);
        let b = write(dir.path(), "b.txt", array![[1.0, 2.0]]);
        assert!(matches!(
            average_tables(&[a, b]),
            Err(AnalysisError::Table {
                source: TableError::ShapeMismatch { .. },
                ..
            })
        ));
    }

    #[test]
    fn average_of_no_tables_is_an_error() {
        assert!(matches!(average_tables(&[]), Err(AnalysisError::NoInputs)));
    }

    #[test]
    fn ir_series_averages_columns_and_normalises() {
        let mut data = Array2::zeros((3, 8));
        data.column_mut(5).assign(&array![0.0, 100.0, 200.0]);
        data.column_mut(6).assign(&array![1.0, 4.0, 2.0]);
        data.column_mut(7).assign(&array![3.0, 8.0, 2.0]);
        let table = Table::new(Vec::new(), data).unwrap();

        let ir = ir_series(&table, &DEFAULT_IR_COLUMNS).unwrap();
        assert_eq!(ir.freq, array![0.0, 100.0, 200.0]);
        assert_relative_eq!(ir.intensity[1], 1.0);
        assert_relative_eq!(ir.intensity[0], 2.0 / 6.0);
    }

    #[test]
    fn ir_series_rejects_missing_columns() {
        let table = Table::new(Vec::new(), Array2::zeros((2, 6))).unwrap();
        assert!(matches!(
            ir_series(&table, &[6]),
            Err(TableError::ColumnOutOfRange { index: 6, .. })
        ));
    }

    #[test]
    fn ir_series_of_non_positive_spectrum_is_left_unscaled() {
        let mut data = Array2::zeros((2, 7));
        data.column_mut(6).assign(&array![-1.0, -2.0]);
        let table = Table::new(Vec::new(), data).unwrap();
        let ir = ir_series(&table, &[6]).unwrap();
        assert_eq!(ir.intensity, array![-1.0, -2.0]);
    }
}
