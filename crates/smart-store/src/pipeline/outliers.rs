//! Outlier handling module.
//!
//! Rows are removed when a numeric value falls outside the IQR fence
//! `[Q1 - k*IQR, Q3 + k*IQR]`. Fences are recomputed for every column on the
//! rows that survived the previous column, so filters compose by
//! intersection and the column order matters.

use crate::error::{EtlError, Result};
use crate::profiler::{present_values, quantile_linear, sorted};
use crate::utils::{is_numeric_dtype, numeric_column_names};
use polars::prelude::*;
use serde::Serialize;
use tracing::debug;

/// Default fence multiplier.
pub const DEFAULT_IQR_MULTIPLIER: f64 = 1.5;

/// Quartiles and the inclusive fence derived from them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IqrBounds {
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub lower: f64,
    pub upper: f64,
}

impl IqrBounds {
    /// Derive bounds from known quartiles.
    pub fn from_quartiles(q1: f64, q3: f64, multiplier: f64) -> Self {
        let iqr = q3 - q1;
        Self {
            q1,
            q3,
            iqr,
            lower: q1 - multiplier * iqr,
            upper: q3 + multiplier * iqr,
        }
    }

    /// Compute bounds from raw values. `None` when there are no values.
    pub fn from_values(values: Vec<f64>, multiplier: f64) -> Option<Self> {
        let values = sorted(values);
        let q1 = quantile_linear(&values, 0.25)?;
        let q3 = quantile_linear(&values, 0.75)?;
        Some(Self::from_quartiles(q1, q3, multiplier))
    }

    /// Inclusive range test.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// What filtering one column did.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnOutliers {
    pub column: String,
    /// `None` when the column had no values to compute quartiles from.
    pub bounds: Option<IqrBounds>,
    pub rows_removed: usize,
}

/// What filtering a whole frame did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OutlierReport {
    pub rows_before: usize,
    pub rows_after: usize,
    pub columns: Vec<ColumnOutliers>,
}

/// IQR-based row filter.
#[derive(Debug, Clone, Copy)]
pub struct OutlierFilter {
    multiplier: f64,
}

impl Default for OutlierFilter {
    fn default() -> Self {
        Self::new(DEFAULT_IQR_MULTIPLIER)
    }
}

impl OutlierFilter {
    pub fn new(multiplier: f64) -> Self {
        Self { multiplier }
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Keep rows whose value in `column` lies in `[lower, upper]`.
    ///
    /// Rows with a missing value are dropped, since an absent value is never
    /// inside a range.
    pub fn filter_range(df: &DataFrame, column: &str, lower: f64, upper: f64) -> Result<DataFrame> {
        let series = numeric_series(df, column)?;
        let float_series = series.cast(&DataType::Float64)?;
        let keep: Vec<bool> = float_series
            .f64()?
            .into_iter()
            .map(|v| v.is_some_and(|val| val >= lower && val <= upper))
            .collect();

        let mask = BooleanChunked::new("mask".into(), keep);
        Ok(df.filter(&mask)?)
    }

    /// Compute the IQR bounds of a numeric column on the given rows.
    pub fn bounds(&self, df: &DataFrame, column: &str) -> Result<Option<IqrBounds>> {
        let series = numeric_series(df, column)?;
        Ok(IqrBounds::from_values(present_values(series)?, self.multiplier))
    }

    /// Remove outlier rows for a single column.
    pub fn filter_column(&self, df: &DataFrame, column: &str) -> Result<(DataFrame, ColumnOutliers)> {
        let before = df.height();
        let bounds = self.bounds(df, column)?;

        let filtered = match bounds {
            Some(b) => Self::filter_range(df, column, b.lower, b.upper)?,
            // No quartiles: no value can satisfy the range test
            None => df.clear(),
        };

        let outcome = ColumnOutliers {
            column: column.to_string(),
            bounds,
            rows_removed: before - filtered.height(),
        };
        debug!(
            "Outlier filter on '{}': bounds {:?}, removed {} rows",
            column, outcome.bounds, outcome.rows_removed
        );

        Ok((filtered, outcome))
    }

    /// Filter the listed columns in order, each on the surviving rows.
    ///
    /// Names not present in the frame are skipped.
    pub fn filter_columns<S: AsRef<str>>(
        &self,
        df: &DataFrame,
        columns: &[S],
    ) -> Result<(DataFrame, OutlierReport)> {
        let mut report = OutlierReport {
            rows_before: df.height(),
            ..Default::default()
        };
        let mut current = df.clone();

        for column in columns.iter().map(AsRef::as_ref) {
            if current.column(column).is_err() {
                continue;
            }
            let (filtered, outcome) = self.filter_column(&current, column)?;
            current = filtered;
            report.columns.push(outcome);
        }

        report.rows_after = current.height();
        Ok((current, report))
    }

    /// Filter every numeric column, in frame order.
    pub fn filter_numeric(&self, df: &DataFrame) -> Result<(DataFrame, OutlierReport)> {
        let columns = numeric_column_names(df);
        self.filter_columns(df, &columns)
    }
}

fn numeric_series<'a>(df: &'a DataFrame, column: &str) -> Result<&'a Series> {
    let series = df
        .column(column)
        .map_err(|_| EtlError::ColumnNotFound(column.to_string()))?
        .as_materialized_series();

    if !is_numeric_dtype(series.dtype()) {
        return Err(EtlError::InvalidColumnType {
            column: column.to_string(),
            expected: "numeric".to_string(),
            actual: series.dtype().to_string(),
        });
    }
    Ok(series)
}
