//! Date column detection and normalization.

use super::converters::series_to_cells;
use crate::error::{EtlError, Result};
use crate::types::Cell;
use crate::utils::{is_datetime_dtype, parse_flexible_date};
use polars::prelude::*;
use tracing::{debug, warn};

/// Canonical layout of a normalized date cell.
pub const CANONICAL_DATE_FORMAT: &str = "%Y-%m-%d";

/// Result of normalizing every date-like column of a frame.
#[derive(Debug, Clone)]
pub struct DateNormalization {
    pub frame: DataFrame,
    /// Columns rewritten to canonical dates.
    pub normalized: Vec<String>,
    /// Date-like columns left untouched because they could not be processed.
    pub skipped: Vec<String>,
    /// Cells across all normalized columns that did not parse.
    pub unparsable_cells: usize,
}

/// Detects date-like columns and rewrites them as `YYYY-MM-DD` text.
pub struct DateNormalizer;

impl DateNormalizer {
    /// A column is date-like when its name contains "date", ignoring case.
    pub fn is_date_column(name: &str) -> bool {
        name.to_lowercase().contains("date")
    }

    /// Normalize one column. Unparsable cells become missing.
    ///
    /// Text and date columns are accepted, as is a column with no values of
    /// any type; any other column fails as a whole. Returns the new series and
    /// the unparsable cell count.
    pub fn normalize_column(series: &Series) -> Result<(Series, usize)> {
        if series.null_count() == series.len() {
            let empty: Vec<Option<String>> = vec![None; series.len()];
            return Ok((Series::new(series.name().clone(), empty), 0));
        }

        let is_text = series.dtype() == &DataType::String;
        if !is_text && !is_datetime_dtype(series.dtype()) {
            return Err(EtlError::InvalidColumnType {
                column: series.name().to_string(),
                expected: "text or date".to_string(),
                actual: series.dtype().to_string(),
            });
        }

        let mut unparsable = 0;
        let formatted: Vec<Option<String>> = series_to_cells(series)?
            .into_iter()
            .map(|cell| {
                let date = match &cell {
                    Cell::Text(s) => parse_flexible_date(s),
                    Cell::Date(d) => Some(*d),
                    Cell::DateTime(dt) => Some(dt.date()),
                    _ => None,
                };
                if date.is_none() && !cell.is_missing() {
                    unparsable += 1;
                }
                date.map(|d| d.format(CANONICAL_DATE_FORMAT).to_string())
            })
            .collect();

        Ok((Series::new(series.name().clone(), formatted), unparsable))
    }

    /// Normalize every date-like column of a frame.
    ///
    /// A column that cannot be processed is reported and left unmodified;
    /// it never aborts the remaining columns.
    pub fn normalize(df: &DataFrame) -> Result<DateNormalization> {
        let mut frame = df.clone();
        let mut normalized = Vec::new();
        let mut skipped = Vec::new();
        let mut unparsable_cells = 0;

        let date_columns: Vec<String> = df
            .get_column_names()
            .into_iter()
            .filter(|name| Self::is_date_column(name))
            .map(|name| name.to_string())
            .collect();

        for name in date_columns {
            let series = frame.column(&name)?.as_materialized_series().clone();
            match Self::normalize_column(&series) {
                Ok((formatted, unparsable)) => {
                    frame.replace(&name, formatted)?;
                    if unparsable > 0 {
                        debug!("{} unparsable values in '{}' set to missing", unparsable, name);
                    }
                    unparsable_cells += unparsable;
                    normalized.push(name);
                }
                Err(e) => {
                    warn!("Could not format date column '{}': {}", name, e);
                    skipped.push(name);
                }
            }
        }

        Ok(DateNormalization {
            frame,
            normalized,
            skipped,
            unparsable_cells,
        })
    }
}
