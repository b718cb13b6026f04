//! Type conversion functions for data cleaning.
//!
//! Two flavours exist: strict conversion, where one bad cell fails the whole
//! column, and lenient conversion, where bad cells become missing.

use crate::error::{EtlError, Result};
use crate::types::{Cell, ColumnType, date_to_days};
use crate::utils::{is_missing_marker, parse_flexible_date, parse_flexible_datetime};
use polars::prelude::*;

/// 2^63, the first real past the top of the `i64` range.
const I64_LIMIT: f64 = 9_223_372_036_854_775_808.0;

/// Truncate a real to an integer; `None` when the result does not fit.
fn real_to_integer(value: f64) -> Option<i64> {
    let truncated = value.trunc();
    (truncated >= -I64_LIMIT && truncated < I64_LIMIT).then_some(truncated as i64)
}

/// Coerce one cell to the target type. `None` means the cell cannot be cast.
pub(crate) fn coerce_cell(cell: &Cell, target: ColumnType) -> Option<Cell> {
    if cell.is_missing() {
        return Some(Cell::Missing);
    }

    match target {
        ColumnType::Integer => match cell {
            Cell::Integer(v) => Some(Cell::Integer(*v)),
            Cell::Real(v) => real_to_integer(*v).map(Cell::Integer),
            Cell::Text(s) => s.trim().parse::<i64>().ok().map(Cell::Integer),
            _ => None,
        },
        ColumnType::Real => match cell {
            Cell::Integer(v) => Some(Cell::Real(*v as f64)),
            Cell::Real(v) => Some(Cell::Real(*v)),
            Cell::Text(s) => s.trim().parse::<f64>().ok().map(Cell::Real),
            _ => None,
        },
        ColumnType::Text => cell.to_text().map(Cell::Text),
        ColumnType::Date => match cell {
            Cell::Date(d) => Some(Cell::Date(*d)),
            Cell::DateTime(dt) => Some(Cell::Date(dt.date())),
            Cell::Text(s) => parse_flexible_date(s).map(Cell::Date),
            _ => None,
        },
        ColumnType::DateTime => match cell {
            Cell::DateTime(dt) => Some(Cell::DateTime(*dt)),
            Cell::Date(d) => d.and_hms_opt(0, 0, 0).map(Cell::DateTime),
            Cell::Text(s) => parse_flexible_datetime(s).map(Cell::DateTime),
            _ => None,
        },
    }
}

/// Read every value of a series as a cell.
pub(crate) fn series_to_cells(series: &Series) -> Result<Vec<Cell>> {
    let mut cells = Vec::with_capacity(series.len());
    for idx in 0..series.len() {
        cells.push(Cell::from_any_value(&series.get(idx)?));
    }
    Ok(cells)
}

/// Build a typed series from cells already coerced to `target`.
///
/// Cells of any other shape are stored as missing.
pub(crate) fn series_from_cells(
    name: PlSmallStr,
    cells: &[Cell],
    target: ColumnType,
) -> Result<Series> {
    let series = match target {
        ColumnType::Integer => {
            let values: Vec<Option<i64>> = cells
                .iter()
                .map(|c| match c {
                    Cell::Integer(v) => Some(*v),
                    _ => None,
                })
                .collect();
            Series::new(name, values)
        }
        ColumnType::Real => {
            let values: Vec<Option<f64>> = cells
                .iter()
                .map(|c| match c {
                    Cell::Real(v) => Some(*v),
                    _ => None,
                })
                .collect();
            Series::new(name, values)
        }
        ColumnType::Text => {
            let values: Vec<Option<String>> = cells
                .iter()
                .map(|c| match c {
                    Cell::Text(s) => Some(s.clone()),
                    _ => None,
                })
                .collect();
            Series::new(name, values)
        }
        ColumnType::Date => {
            let days: Vec<Option<i32>> = cells
                .iter()
                .map(|c| match c {
                    Cell::Date(d) => Some(date_to_days(*d)),
                    _ => None,
                })
                .collect();
            Series::new(name, days).cast(&DataType::Date)?
        }
        ColumnType::DateTime => {
            let millis: Vec<Option<i64>> = cells
                .iter()
                .map(|c| match c {
                    Cell::DateTime(dt) => Some(dt.and_utc().timestamp_millis()),
                    _ => None,
                })
                .collect();
            Series::new(name, millis).cast(&target.dtype())?
        }
    };

    Ok(series)
}

/// Convert a series to the target type, failing on the first bad cell.
pub(crate) fn convert_series(series: &Series, target: ColumnType) -> Result<Series> {
    let cells = series_to_cells(series)?;
    let mut converted = Vec::with_capacity(cells.len());

    for (row, cell) in cells.iter().enumerate() {
        match coerce_cell(cell, target) {
            Some(value) => converted.push(value),
            None => {
                return Err(EtlError::TypeConversionFailed {
                    column: series.name().to_string(),
                    target_type: target.to_string(),
                    reason: format!("value '{}' at row {} cannot be cast", cell, row),
                });
            }
        }
    }

    series_from_cells(series.name().clone(), &converted, target)
}

/// Convert a series to the target type, turning bad cells into missing.
///
/// Returns the converted series and the number of cells that failed.
pub(crate) fn convert_series_lenient(
    series: &Series,
    target: ColumnType,
) -> Result<(Series, usize)> {
    let cells = series_to_cells(series)?;
    let mut failures = 0;

    let converted: Vec<Cell> = cells
        .iter()
        .map(|cell| {
            coerce_cell(cell, target).unwrap_or_else(|| {
                failures += 1;
                Cell::Missing
            })
        })
        .collect();

    Ok((
        series_from_cells(series.name().clone(), &converted, target)?,
        failures,
    ))
}

/// Infer the type of a raw text column.
///
/// Missing markers become missing. The column becomes integer when every
/// remaining cell parses as an integer, real when every cell parses as a
/// number, and stays text otherwise. Text cells are kept verbatim.
pub(crate) fn infer_column_type(series: &Series) -> Result<Series> {
    let str_series = series.str()?;
    let values: Vec<Option<&str>> = str_series
        .into_iter()
        .map(|opt| opt.filter(|v| !is_missing_marker(v)))
        .collect();

    let present = || values.iter().flatten();

    if present().all(|v| v.trim().parse::<i64>().is_ok()) {
        let ints: Vec<Option<i64>> = values
            .iter()
            .map(|opt| opt.and_then(|v| v.trim().parse::<i64>().ok()))
            .collect();
        return Ok(Series::new(series.name().clone(), ints));
    }

    if present().all(|v| v.trim().parse::<f64>().is_ok()) {
        let floats: Vec<Option<f64>> = values
            .iter()
            .map(|opt| opt.and_then(|v| v.trim().parse::<f64>().ok()))
            .collect();
        return Ok(Series::new(series.name().clone(), floats));
    }

    Ok(Series::new(series.name().clone(), values))
}
