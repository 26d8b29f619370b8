//! Data loading utilities

use crate::error::{ChurnError, Result};
use calamine::{open_workbook_auto, Data, Reader};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Loader for raw and processed datasets (CSV, TSV or spreadsheet)
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Rows scanned for dtype inference (`None` scans the whole file)
    infer_schema_length: Option<usize>,
    separator: u8,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader that infers dtypes from the full file.
    ///
    /// Full inference matters for columns like `TotalCharges` whose first
    /// non-numeric value can appear hundreds of rows in.
    pub fn new() -> Self {
        Self {
            infer_schema_length: None,
            separator: b',',
        }
    }

    /// Limit dtype inference to the first `n` rows
    pub fn with_infer_schema_length(mut self, n: usize) -> Self {
        self.infer_schema_length = Some(n);
        self
    }

    /// Set field separator
    pub fn with_separator(mut self, separator: u8) -> Self {
        self.separator = separator;
        self
    }

    /// Load a CSV file with a header row
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let start = Instant::now();

        let file = File::open(path).map_err(|e| {
            ChurnError::Data(format!("failed to open {}: {}", path.display(), e))
        })?;

        let parse_opts = CsvParseOptions::default().with_separator(self.separator);

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()?;

        info!(
            path = %path.display(),
            rows = df.height(),
            columns = df.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded CSV"
        );
        Ok(df)
    }

    /// Load the first worksheet of an `.xlsx`/`.xlsm`/`.xls`/`.ods` workbook.
    ///
    /// The first row is the header. A column whose non-empty cells are all
    /// numbers becomes `Int64` when every value is integral, `Float64`
    /// otherwise; any other column is text. Empty cells are null, which
    /// mirrors what the CSV reader infers for the same data.
    pub fn load_spreadsheet(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let start = Instant::now();

        let mut workbook = open_workbook_auto(path).map_err(|e| {
            ChurnError::Data(format!("failed to open {}: {}", path.display(), e))
        })?;
        let sheet = workbook.sheet_names().first().cloned().ok_or_else(|| {
            ChurnError::Data(format!("{} contains no worksheets", path.display()))
        })?;
        let range = workbook.worksheet_range(&sheet).map_err(|e| {
            ChurnError::Data(format!("failed to read sheet '{}' of {}: {}", sheet, path.display(), e))
        })?;

        let mut rows = range.rows();
        let header = rows
            .next()
            .ok_or_else(|| ChurnError::Data(format!("{} has no header row", path.display())))?;
        let body: Vec<&[Data]> = rows.collect();

        let columns = header
            .iter()
            .enumerate()
            .map(|(j, cell)| {
                let name = cell_text(Some(cell)).unwrap_or_else(|| format!("column_{}", j + 1));
                let cells: Vec<Option<&Data>> = body.iter().map(|row| row.get(j)).collect();
                sheet_column(&name, &cells)
            })
            .collect::<Vec<_>>();
        let df = DataFrame::new(columns)?;

        info!(
            path = %path.display(),
            sheet = %sheet,
            rows = df.height(),
            columns = df.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded spreadsheet"
        );
        Ok(df)
    }

    /// Pick the reader from the file extension; unknown extensions are read as CSV
    pub fn load_auto(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => self.load_spreadsheet(path),
            "tsv" => self.clone().with_separator(b'\t').load_csv(path),
            _ => self.load_csv(path),
        }
    }

    /// Load a tabular file, failing with a descriptive error when it does not exist
    pub fn load_required(&self, path: impl AsRef<Path>, what: &str) -> Result<DataFrame> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ChurnError::Data(format!(
                "{} not found at {}",
                what,
                path.display()
            )));
        }
        self.load_auto(path)
    }
}

fn cell_text(cell: Option<&Data>) -> Option<String> {
    match cell? {
        Data::Empty => None,
        Data::String(s) => Some(s.clone()),
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn sheet_column(name: &str, cells: &[Option<&Data>]) -> Column {
    let numeric: Option<Vec<Option<f64>>> = cells
        .iter()
        .map(|cell| match cell {
            None | Some(Data::Empty) => Some(None),
            Some(Data::Float(f)) => Some(Some(*f)),
            Some(Data::Int(i)) => Some(Some(*i as f64)),
            Some(_) => None,
        })
        .collect();

    match numeric {
        Some(values) if values.iter().flatten().all(|v| v.fract() == 0.0 && v.abs() < 9.0e15) => {
            let ints: Vec<Option<i64>> = values.iter().map(|v| v.map(|v| v as i64)).collect();
            Column::new(name.into(), ints)
        }
        Some(values) => Column::new(name.into(), values),
        None => {
            let text: Vec<Option<String>> = cells.iter().map(|cell| cell_text(*cell)).collect();
            Column::new(name.into(), text)
        }
    }
}

/// Save DataFrames to disk
pub struct DataSaver;

impl DataSaver {
    /// Save to CSV with a header row, creating parent directories
    pub fn save_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = File::create(path)?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(df)?;

        debug!(path = %path.display(), rows = df.height(), "Saved CSV");
        Ok(())
    }
}
