//! Delimited file input and output.

use crate::cleaner::{DataScrubber, RawTable};
use crate::error::{EtlError, Result, ResultExt};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

/// Read a delimited file without interpreting its header.
///
/// Every cell is read as text. The first row supplies the column names,
/// repeats included, so duplicate headers survive until column resolution.
pub fn read_raw_table(path: &Path) -> Result<RawTable> {
    if !path.is_file() {
        return Err(EtlError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("file not found: {}", path.display()),
        )));
    }

    let grid = CsvReadOptions::default()
        .with_has_header(false)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    if grid.height() == 0 {
        return Err(EtlError::InvalidOperation(format!(
            "{} has no header row",
            path.display()
        )));
    }

    let rows = grid.height() - 1;
    let mut columns = Vec::with_capacity(grid.width());
    for (idx, col) in grid.get_columns().iter().enumerate() {
        let series = col.as_materialized_series();
        let header = match series.str()?.get(0) {
            Some(name) => name.trim().to_string(),
            None => format!("Unnamed: {}", idx),
        };
        columns.push(series.slice(1, rows).with_name(header.into()));
    }

    let table = RawTable::new(columns)?;
    debug!(
        "Read {} rows x {} columns from {}",
        table.height(),
        table.width(),
        path.display()
    );
    Ok(table)
}

/// Read a prepared file back with column types inferred.
pub fn read_prepared(path: &Path) -> Result<DataFrame> {
    if !path.is_file() {
        return Err(EtlError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("prepared file not found: {}", path.display()),
        )));
    }

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
        .context(format!("Failed to read {}", path.display()))?;

    DataScrubber::infer_column_types(&df)
}

/// Write a frame as a delimited file with a header row and no index column.
///
/// The parent directory is created when missing.
pub fn write_prepared(df: &DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = File::create(path)?;
    let mut out = df.clone();
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .with_quote_char(b'"')
        .finish(&mut out)?;

    info!("Dataset saved: {}", path.display());
    Ok(())
}
