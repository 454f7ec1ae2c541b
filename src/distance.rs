use anyhow::{bail, Context, Result};
use std::{fs::File, io::Read, path::Path};

use crate::error::ForecastError;

/// Zone-to-zone trip distances. Rows are destination zones, columns are
/// origin zones, both 1-based in the request and 0-based here.
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    rows: usize,
    cols: usize,
    cells: Vec<f64>,
}

impl DistanceMatrix {
    /// Builds a matrix from row-major cells. Rows must all have the same width.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        let mut cells = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                bail!("row {} has {} cells, expected {}", i, row.len(), cols);
            }
            cells.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            cells,
        })
    }

    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open distance matrix at {}", path.display()))?;
        Self::from_reader(file)
            .with_context(|| format!("failed to parse distance matrix {}", path.display()))
    }

    /// Reads a CSV whose first line holds column labels. Cells are positional;
    /// blank cells and the usual missing-value markers (`nan`, `NA`, `#N/A`,
    /// `NULL`, `None`, `<NA>` and friends) mean the distance is unknown.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut rows = Vec::new();
        for (i, record) in rdr.records().enumerate() {
            let record = record.with_context(|| format!("failed to read row {}", i))?;
            let row = record
                .iter()
                .enumerate()
                .map(|(j, cell)| parse_cell(cell).with_context(|| format!("row {}, column {}", i, j)))
                .collect::<Result<Vec<f64>>>()?;
            rows.push(row);
        }
        Self::from_rows(rows)
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Distance for a 1-based zone pair. The destination picks the row and the
    /// origin picks the column; the table is not assumed symmetric.
    pub fn resolve(&self, origin: u32, destination: u32) -> Result<f64, ForecastError> {
        let out_of_range = || ForecastError::ZoneOutOfRange {
            origin,
            destination,
            rows: self.rows,
            cols: self.cols,
        };
        let row = (destination as usize).checked_sub(1).ok_or_else(out_of_range)?;
        let col = (origin as usize).checked_sub(1).ok_or_else(out_of_range)?;
        if row >= self.rows || col >= self.cols {
            return Err(out_of_range());
        }

        let distance = self.cells[row * self.cols + col];
        if distance.is_nan() {
            return Err(ForecastError::MissingDistance {
                origin,
                destination,
            });
        }
        Ok(distance)
    }
}

fn parse_cell(cell: &str) -> Result<f64> {
    match cell {
        "" | "#N/A" | "#N/A N/A" | "#NA" | "-1.#IND" | "-1.#QNAN" | "-NaN" | "-nan" | "1.#IND"
        | "1.#QNAN" | "<NA>" | "N/A" | "NA" | "NAN" | "NULL" | "NaN" | "None" | "n/a" | "nan"
        | "null" => Ok(f64::NAN),
        s => s
            .parse::<f64>()
            .with_context(|| format!("'{}' is not a number", s)),
    }
}
