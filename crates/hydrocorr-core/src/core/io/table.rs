use ndarray::{Array2, ArrayView1, Axis};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

const HEADER_PREFIX: &str = "# ";

#[derive(Debug, Error)]
pub enum TableError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Table has no data rows")]
    Empty,
    #[error("Row {row} has {found} values, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Invalid number '{value}' in row {row}")]
    Parse { row: usize, value: String },
    #[error("Shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },
    #[error("Column index {index} is out of range for a table with {columns} columns")]
    ColumnOutOfRange { index: usize, columns: usize },
}

/// A whitespace-separated numeric table with a single `# `-prefixed header line.
///
/// Values are written in scientific notation with ten fractional digits.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    data: Array2<f64>,
}

impl Table {
    pub fn new(columns: Vec<String>, data: Array2<f64>) -> Result<Self, TableError> {
        if !columns.is_empty() && columns.len() != data.ncols() {
            return Err(TableError::ShapeMismatch {
                expected: (data.nrows(), columns.len()),
                found: data.dim(),
            });
        }
        Ok(Self { columns, data })
    }

    /// Builds a table from equally long columns.
    pub fn from_columns(names: &[&str], columns: &[ArrayView1<'_, f64>]) -> Result<Self, TableError> {
        let rows = columns.first().map_or(0, |c| c.len());
        if let Some(column) = columns.iter().find(|c| c.len() != rows) {
            return Err(TableError::ShapeMismatch {
                expected: (rows, columns.len()),
                found: (column.len(), columns.len()),
            });
        }
        let mut data = Array2::zeros((rows, columns.len()));
        for (mut dst, src) in data.axis_iter_mut(Axis(1)).zip(columns) {
            dst.assign(src);
        }
        Self::new(names.iter().map(|s| s.to_string()).collect(), data)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    #[inline]
    pub fn n_rows(&self) -> usize {
        self.data.nrows()
    }

    #[inline]
    pub fn n_columns(&self) -> usize {
        self.data.ncols()
    }

    pub fn column(&self, index: usize) -> Result<ArrayView1<'_, f64>, TableError> {
        if index >= self.n_columns() {
            return Err(TableError::ColumnOutOfRange {
                index,
                columns: self.n_columns(),
            });
        }
        Ok(self.data.column(index))
    }

    pub fn column_by_name(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| self.data.column(i))
    }

    pub fn write_to(&self, writer: impl Write) -> Result<(), TableError> {
        let mut writer = BufWriter::new(writer);
        if !self.columns.is_empty() {
            writeln!(writer, "{}{}", HEADER_PREFIX, self.columns.join(" "))?;
        }
        let mut csv = csv::WriterBuilder::new()
            .delimiter(b' ')
            .has_headers(false)
            .from_writer(writer);
        for row in self.data.rows() {
            csv.write_record(row.iter().map(|v| format!("{:.10e}", v)))?;
        }
        csv.flush()?;
        Ok(())
    }

    pub fn write_to_path(&self, path: impl AsRef<Path>) -> Result<(), TableError> {
        self.write_to(File::create(path)?)
    }

    pub fn read_from(reader: impl Read) -> Result<Self, TableError> {
        let mut reader = BufReader::new(reader);
        let mut first = String::new();
        reader.read_line(&mut first)?;
        let columns: Vec<String> = match first.trim_end().strip_prefix('#') {
            Some(header) => header.split_whitespace().map(String::from).collect(),
            None => Vec::new(),
        };

        let mut csv = csv::ReaderBuilder::new()
            .delimiter(b' ')
            .has_headers(false)
            .comment(Some(b'#'))
            .flexible(true)
            .from_reader(first.as_bytes().chain(reader));

        let mut values = Vec::new();
        let mut width = None;
        let mut rows = 0usize;
        for record in csv.records() {
            let record = record?;
            let before = values.len();
            for field in record.iter().filter(|f| !f.is_empty()) {
                let value = field.trim().parse::<f64>().map_err(|_| TableError::Parse {
                    row: rows,
                    value: field.to_string(),
                })?;
                values.push(value);
            }
            let found = values.len() - before;
            if found == 0 {
                continue;
            }
            let expected = *width.get_or_insert(found);
            if found != expected {
                return Err(TableError::Ragged {
                    row: rows,
                    expected,
                    found,
                });
            }
            rows += 1;
        }

        let width = width.ok_or(TableError::Empty)?;
        let data = Array2::from_shape_vec((rows, width), values)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Self::new(columns, data)
    }

    pub fn read_from_path(path: impl AsRef<Path>) -> Result<Self, TableError> {
        Self::read_from(File::open(path)?)
    }
}
