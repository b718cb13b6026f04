//! Statistical helpers shared by the profiler and the outlier filter.

use crate::error::Result;
use crate::types::NumericSummary;
use polars::prelude::*;

/// Non-missing values of a numeric series as `f64`, in row order.
pub(crate) fn present_values(series: &Series) -> Result<Vec<f64>> {
    let float_series = series.cast(&DataType::Float64)?;
    let values = float_series
        .f64()?
        .into_iter()
        .flatten()
        .filter(|v| !v.is_nan())
        .collect();
    Ok(values)
}

/// Quantile of already sorted values using linear interpolation.
///
/// The position is `(n - 1) * p`; the result interpolates between the two
/// neighbouring order statistics. Returns `None` for an empty slice.
pub(crate) fn quantile_linear(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }

    let pos = (sorted.len() - 1) as f64 * p.clamp(0.0, 1.0);
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

/// Sort values ascending for quantile estimation.
pub(crate) fn sorted(mut values: Vec<f64>) -> Vec<f64> {
    values.sort_by(|a, b| a.total_cmp(b));
    values
}

/// Calculate the sample standard deviation (n - 1 denominator).
pub(crate) fn calculate_std(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n == 0 {
        return None;
    }
    if n == 1 {
        return Some(f64::NAN);
    }

    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;

    Some(variance.sqrt())
}

/// Build the statistical summary of one numeric series.
pub(crate) fn describe_numeric(series: &Series) -> Result<NumericSummary> {
    let values = sorted(present_values(series)?);
    let count = values.len();
    let mean = (count > 0).then(|| values.iter().sum::<f64>() / count as f64);

    Ok(NumericSummary {
        column: series.name().to_string(),
        count,
        mean,
        std: calculate_std(&values),
        min: values.first().copied(),
        q25: quantile_linear(&values, 0.25),
        q50: quantile_linear(&values, 0.5),
        q75: quantile_linear(&values, 0.75),
        max: values.last().copied(),
    })
}
