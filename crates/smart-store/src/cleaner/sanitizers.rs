//! Text sanitization functions for cleaning values.

use crate::error::{EtlError, Result};
use polars::prelude::*;

/// Case folding applied while trimming a text column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CaseFold {
    Lower,
    Upper,
}

impl CaseFold {
    fn apply(&self, value: &str) -> String {
        match self {
            CaseFold::Lower => value.trim().to_lowercase(),
            CaseFold::Upper => value.trim().to_uppercase(),
        }
    }
}

/// Trim surrounding whitespace and fold case for every cell of a text series.
///
/// Missing cells stay missing. Non-text series are rejected.
pub(crate) fn fold_and_trim(series: &Series, fold: CaseFold) -> Result<Series> {
    if series.dtype() != &DataType::String {
        return Err(EtlError::InvalidColumnType {
            column: series.name().to_string(),
            expected: "text".to_string(),
            actual: series.dtype().to_string(),
        });
    }

    let str_series = series.str()?;
    let cleaned_values: Vec<Option<String>> = str_series
        .into_iter()
        .map(|opt_val| opt_val.map(|val| fold.apply(val)))
        .collect();

    Ok(Series::new(series.name().clone(), cleaned_values))
}
