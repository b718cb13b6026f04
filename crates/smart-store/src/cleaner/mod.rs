//! Data cleaning module for scrubbing datasets.
//!
//! This module provides functionality for:
//! - Resolving raw columns against an expected schema
//! - Normalizing date columns
//! - Removing duplicate rows and handling missing values
//! - Type conversion and text sanitization
//! - Column drops, renames and reordering
//!
//! Every operation takes a frame by reference and returns a new one. Any
//! operation naming columns validates every name before touching the data.

pub mod columns;
mod converters;
pub mod dates;
mod sanitizers;

pub use columns::{ColumnResolver, RawTable, Resolution};
pub use dates::{CANONICAL_DATE_FORMAT, DateNormalization, DateNormalizer};
pub(crate) use converters::series_to_cells;

use crate::error::{EtlError, Result};
use crate::pipeline::OutlierFilter;
use crate::profiler::DataProfiler;
use crate::types::{Cell, ColumnType, DataSummary};
use crate::utils::{is_integer_dtype, is_numeric_dtype};
use converters::{
    coerce_cell, convert_series, convert_series_lenient, infer_column_type, series_from_cells,
};
use polars::prelude::*;
use sanitizers::{CaseFold, fold_and_trim};
use std::collections::HashSet;
use tracing::debug;

/// Name of the derived column added by
/// [`DataScrubber::parse_dates_to_add_standard_datetime`].
pub const STANDARD_DATETIME_COLUMN: &str = "StandardDateTime";

/// Record-level cleaning operations.
pub struct DataScrubber;

impl DataScrubber {
    /// Drop rows identical to an earlier row. The first occurrence wins and
    /// row order is preserved. Two missing cells compare equal.
    pub fn remove_duplicates(df: &DataFrame) -> Result<DataFrame> {
        if df.width() == 0 {
            return Ok(df.clone());
        }
        let result = df.unique_stable(None, UniqueKeepStrategy::First, None)?;

        let removed = df.height() - result.height();
        if removed > 0 {
            debug!("Removed {} duplicate rows", removed);
        } else {
            debug!("No duplicate rows found");
        }

        Ok(result)
    }

    /// Re-type a column. One uncastable cell fails the call and the input
    /// is left as it was.
    pub fn convert_column_to_new_data_type(
        df: &DataFrame,
        column: &str,
        target: ColumnType,
    ) -> Result<DataFrame> {
        let converted = convert_series(series(df, column)?, target)?;
        let mut result = df.clone();
        result.replace(column, converted)?;
        Ok(result)
    }

    /// Remove every named column, or none if any name is absent.
    pub fn drop_columns<S: AsRef<str>>(df: &DataFrame, columns: &[S]) -> Result<DataFrame> {
        require_columns(df, columns)?;

        let names: Vec<PlSmallStr> = columns.iter().map(|c| c.as_ref().into()).collect();
        Ok(df.drop_many(names))
    }

    /// Rename columns through an ordered `(from, to)` mapping, all or nothing.
    pub fn rename_columns(df: &DataFrame, mapping: &[(&str, &str)]) -> Result<DataFrame> {
        let sources: Vec<&str> = mapping.iter().map(|(from, _)| *from).collect();
        require_columns(df, &sources)?;

        let mut renamed = Vec::with_capacity(df.width());
        let mut names = HashSet::with_capacity(df.width());

        for col in df.get_columns() {
            let current = col.name().as_str();
            let target = mapping
                .iter()
                .find(|(from, _)| *from == current)
                .map_or(current, |(_, to)| *to);

            if !names.insert(target.to_string()) {
                return Err(EtlError::InvalidOperation(format!(
                    "renaming would create duplicate column '{}'",
                    target
                )));
            }

            let series = col.as_materialized_series().clone().with_name(target.into());
            renamed.push(Column::from(series));
        }

        Ok(DataFrame::new(renamed)?)
    }

    /// Keep exactly the named columns, in the given order.
    pub fn reorder_columns<S: AsRef<str>>(df: &DataFrame, columns: &[S]) -> Result<DataFrame> {
        require_columns(df, columns)?;
        Ok(df.select(columns.iter().map(|c| c.as_ref()))?)
    }

    /// Keep rows whose value lies in the inclusive range `[lower, upper]`.
    pub fn filter_column_outliers(
        df: &DataFrame,
        column: &str,
        lower: f64,
        upper: f64,
    ) -> Result<DataFrame> {
        let result = OutlierFilter::filter_range(df, column, lower, upper)?;
        debug!(
            "Filtered '{}' to [{}, {}]: {} rows removed",
            column,
            lower,
            upper,
            df.height() - result.height()
        );
        Ok(result)
    }

    pub fn format_column_strings_to_lower_and_trim(
        df: &DataFrame,
        column: &str,
    ) -> Result<DataFrame> {
        Self::fold_column(df, column, CaseFold::Lower)
    }

    pub fn format_column_strings_to_upper_and_trim(
        df: &DataFrame,
        column: &str,
    ) -> Result<DataFrame> {
        Self::fold_column(df, column, CaseFold::Upper)
    }

    fn fold_column(df: &DataFrame, column: &str, fold: CaseFold) -> Result<DataFrame> {
        let cleaned = fold_and_trim(series(df, column)?, fold)?;
        let mut result = df.clone();
        result.replace(column, cleaned)?;
        Ok(result)
    }

    /// Drop rows containing any missing cell, or fill missing cells.
    ///
    /// `drop` wins over `fill_value`; with neither the frame is returned
    /// unchanged. A fill value the column cannot hold turns the column into
    /// text.
    pub fn handle_missing_data(
        df: &DataFrame,
        drop: bool,
        fill_value: Option<&Cell>,
    ) -> Result<DataFrame> {
        if drop {
            let result = df.drop_nulls::<String>(None)?;
            debug!("Dropped {} rows with missing values", df.height() - result.height());
            return Ok(result);
        }

        let Some(fill) = fill_value.filter(|f| !f.is_missing()) else {
            return Ok(df.clone());
        };

        let mut result = df.clone();
        for col in df.get_columns() {
            let series = col.as_materialized_series();
            if series.null_count() == 0 {
                continue;
            }
            result.replace(series.name().as_str(), fill_series(series, fill)?)?;
        }

        Ok(result)
    }

    /// Structural and statistical summary. Read-only.
    pub fn inspect_data(df: &DataFrame) -> Result<DataSummary> {
        DataProfiler::inspect(df)
    }

    /// Parse `column` into the derived `StandardDateTime` column.
    ///
    /// Unparsable cells become missing. An existing `StandardDateTime`
    /// column is overwritten.
    pub fn parse_dates_to_add_standard_datetime(df: &DataFrame, column: &str) -> Result<DataFrame> {
        let (parsed, failures) = convert_series_lenient(series(df, column)?, ColumnType::DateTime)?;
        if failures > 0 {
            debug!("{} values in '{}' could not be parsed as date/time", failures, column);
        }

        let mut result = df.clone();
        result.with_column(parsed.with_name(STANDARD_DATETIME_COLUMN.into()))?;
        Ok(result)
    }

    /// Infer the types of every text column (integer, then real, else text).
    ///
    /// Missing markers such as `NA` or blank cells become missing.
    pub fn infer_column_types(df: &DataFrame) -> Result<DataFrame> {
        let columns = df
            .get_columns()
            .iter()
            .map(|col| {
                let series = col.as_materialized_series();
                if series.dtype() == &DataType::String {
                    infer_column_type(series).map(Column::from)
                } else {
                    Ok(col.clone())
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(DataFrame::new(columns)?)
    }
}

fn series<'a>(df: &'a DataFrame, column: &str) -> Result<&'a Series> {
    df.column(column)
        .map(|col| col.as_materialized_series())
        .map_err(|_| EtlError::ColumnNotFound(column.to_string()))
}

/// Fail with the first absent name before any work is done.
fn require_columns<S: AsRef<str>>(df: &DataFrame, columns: &[S]) -> Result<()> {
    match columns.iter().find(|c| df.column(c.as_ref()).is_err()) {
        Some(absent) => Err(EtlError::ColumnNotFound(absent.as_ref().to_string())),
        None => Ok(()),
    }
}

fn column_type_of(dtype: &DataType) -> Option<ColumnType> {
    match dtype {
        DataType::String => Some(ColumnType::Text),
        DataType::Date => Some(ColumnType::Date),
        DataType::Datetime(_, _) => Some(ColumnType::DateTime),
        dt if is_integer_dtype(dt) => Some(ColumnType::Integer),
        dt if is_numeric_dtype(dt) => Some(ColumnType::Real),
        _ => None,
    }
}

/// The type a column must take to hold `fill` next to its current values.
fn fill_target(current: Option<ColumnType>, fill: &Cell) -> ColumnType {
    match (current, fill) {
        (Some(ColumnType::Integer), Cell::Integer(_)) => ColumnType::Integer,
        (Some(ColumnType::Integer | ColumnType::Real), Cell::Integer(_) | Cell::Real(_)) => {
            ColumnType::Real
        }
        (Some(ColumnType::Date), Cell::Date(_)) => ColumnType::Date,
        (Some(ColumnType::DateTime), Cell::Date(_) | Cell::DateTime(_)) => ColumnType::DateTime,
        _ => ColumnType::Text,
    }
}

fn fill_series(series: &Series, fill: &Cell) -> Result<Series> {
    let target = fill_target(column_type_of(series.dtype()), fill);

    let cells: Vec<Cell> = series_to_cells(series)?
        .into_iter()
        .map(|cell| {
            let cell = if cell.is_missing() { fill.clone() } else { cell };
            coerce_cell(&cell, target).unwrap_or(Cell::Missing)
        })
        .collect();

    if column_type_of(series.dtype()) != Some(target) {
        debug!("Column '{}' widened to {} to hold fill value", series.name(), target);
    }

    series_from_cells(series.name().clone(), &cells, target)
}
