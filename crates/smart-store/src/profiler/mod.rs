//! Data profiling module for dataset inspection.
//!
//! Produces the structural (per-column type and missing counts) and
//! statistical (count, moments, quartiles) views of a dataset. Profiling is
//! read-only; it never changes the frame it is given.

mod statistics;

pub(crate) use statistics::{present_values, quantile_linear, sorted};

use crate::error::Result;
use crate::types::{ColumnInfo, DataSummary};
use crate::utils::is_numeric_dtype;
use polars::prelude::*;
use tracing::debug;

/// Data profiler for summarising dataset structure and statistics.
pub struct DataProfiler;

impl DataProfiler {
    /// Summarise a dataset for diagnostics.
    pub fn inspect(df: &DataFrame) -> Result<DataSummary> {
        let mut info = Vec::with_capacity(df.width());
        let mut describe = Vec::new();

        for col in df.get_columns() {
            let series = col.as_materialized_series();
            let missing = series.null_count();

            info.push(ColumnInfo {
                name: series.name().to_string(),
                dtype: series.dtype().to_string(),
                non_missing: series.len() - missing,
                missing,
            });

            if is_numeric_dtype(series.dtype()) {
                describe.push(statistics::describe_numeric(series)?);
            }
        }

        debug!(
            "Inspected {} rows x {} columns ({} numeric)",
            df.height(),
            df.width(),
            describe.len()
        );

        Ok(DataSummary {
            rows: df.height(),
            columns: df.width(),
            info,
            describe,
        })
    }
}
