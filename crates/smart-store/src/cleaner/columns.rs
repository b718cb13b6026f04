//! Column resolution against an expected schema.
//!
//! A delimited file may repeat a header name, which a `DataFrame` cannot
//! represent, so raw input lives in a [`RawTable`] until it is resolved.

use crate::error::{EtlError, Result};
use polars::prelude::*;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Columns as read from a source file. Names may repeat.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    columns: Vec<Series>,
}

impl RawTable {
    /// Build a raw table; every column must have the same length.
    pub fn new(columns: Vec<Series>) -> Result<Self> {
        if let Some(first) = columns.first()
            && let Some(bad) = columns.iter().find(|s| s.len() != first.len())
        {
            return Err(EtlError::InvalidOperation(format!(
                "column '{}' has {} rows, expected {}",
                bad.name(),
                bad.len(),
                first.len()
            )));
        }
        Ok(Self { columns })
    }

    /// Wrap an existing frame (names are already unique).
    pub fn from_frame(df: &DataFrame) -> Self {
        Self {
            columns: df
                .get_columns()
                .iter()
                .map(|col| col.as_materialized_series().clone())
                .collect(),
        }
    }

    /// Header names in source order, repeats included.
    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn columns(&self) -> &[Series] {
        &self.columns
    }

    pub fn height(&self) -> usize {
        self.columns.first().map_or(0, |s| s.len())
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }
}

/// Result of resolving a raw table.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Retained columns, in expected-list order.
    pub frame: DataFrame,
    /// Header names dropped because an earlier column had the same name.
    /// One entry per extra occurrence.
    pub duplicates: Vec<String>,
    /// Expected names with no matching column.
    pub missing: Vec<String>,
}

/// Reconciles a raw table against an expected column list.
pub struct ColumnResolver;

impl ColumnResolver {
    /// Keep only expected columns, collapsing repeated headers to their first
    /// occurrence.
    ///
    /// The expected list may itself repeat names; each name is placed at its
    /// first appearance. Expected names absent from the data are skipped.
    pub fn resolve<S: AsRef<str>>(raw: &RawTable, expected: &[S]) -> Result<Resolution> {
        let mut first_by_name: HashMap<&str, &Series> = HashMap::new();
        let mut duplicates = Vec::new();

        for series in raw.columns() {
            let name = series.name().as_str();
            if first_by_name.contains_key(name) {
                duplicates.push(name.to_string());
            } else {
                first_by_name.insert(name, series);
            }
        }

        if !duplicates.is_empty() {
            warn!("Duplicate columns found and removed: {:?}", duplicates);
        }

        let mut seen = HashSet::new();
        let mut retained = Vec::new();
        let mut missing = Vec::new();

        for name in expected.iter().map(AsRef::as_ref) {
            if !seen.insert(name) {
                continue;
            }
            match first_by_name.get(name) {
                Some(series) => retained.push(Column::from((*series).clone())),
                None => missing.push(name.to_string()),
            }
        }

        if !missing.is_empty() {
            debug!("Expected columns not present: {:?}", missing);
        }

        let frame = DataFrame::new(retained)?;
        debug!("Columns retained: {:?}", frame.get_column_names());

        Ok(Resolution {
            frame,
            duplicates,
            missing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn raw(columns: &[(&str, &[&str])]) -> RawTable {
        RawTable::new(
            columns
                .iter()
                .map(|(name, values)| Series::new((*name).into(), *values))
                .collect(),
        )
        .unwrap()
    }

    fn names(df: &DataFrame) -> Vec<String> {
        df.get_column_names().iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_orders_by_expected_list() {
        let table = raw(&[
            ("Name", &["Ann", "Bo"]),
            ("CustomerID", &["1", "2"]),
            ("Extra", &["x", "y"]),
        ]);

        let resolution = ColumnResolver::resolve(&table, &["CustomerID", "Name"]).unwrap();

        assert_eq!(names(&resolution.frame), vec!["CustomerID", "Name"]);
        assert!(resolution.duplicates.is_empty());
        assert!(resolution.missing.is_empty());
    }

    #[test]
    fn test_resolve_collapses_duplicate_headers_to_first() {
        let table = raw(&[
            ("DiscountPercent", &["5", "10"]),
            ("SaleAmount", &["1.0", "2.0"]),
            ("DiscountPercent", &["99", "99"]),
        ]);

        let resolution =
            ColumnResolver::resolve(&table, &["SaleAmount", "DiscountPercent"]).unwrap();

        assert_eq!(resolution.duplicates, vec!["DiscountPercent"]);
        let discount = resolution.frame.column("DiscountPercent").unwrap();
        assert_eq!(discount.str().unwrap().get(0), Some("5"));
    }

    #[test]
    fn test_resolve_deduplicates_expected_list() {
        let table = raw(&[("a", &["1"]), ("b", &["2"])]);

        let resolution = ColumnResolver::resolve(&table, &["b", "a", "b"]).unwrap();

        assert_eq!(names(&resolution.frame), vec!["b", "a"]);
    }

    #[test]
    fn test_resolve_skips_missing_expected_columns() {
        let table = raw(&[("ProductID", &["100"])]);

        let resolution =
            ColumnResolver::resolve(&table, &["ProductId", "ProductID", "Category"]).unwrap();

        // Matching is exact
        assert_eq!(names(&resolution.frame), vec!["ProductID"]);
        assert_eq!(resolution.missing, vec!["ProductId", "Category"]);
    }

    #[test]
    fn test_resolve_output_is_intersection_in_expected_order() {
        let table = raw(&[
            ("c", &["1"]),
            ("a", &["1"]),
            ("c", &["2"]),
            ("d", &["1"]),
        ]);
        let expected = ["d", "x", "a", "d", "c"];

        let resolution = ColumnResolver::resolve(&table, &expected).unwrap();

        assert_eq!(names(&resolution.frame), vec!["d", "a", "c"]);
    }

    #[test]
    fn test_raw_table_rejects_ragged_columns() {
        let result = RawTable::new(vec![
            Series::new("a".into(), &["1", "2"]),
            Series::new("b".into(), &["1"]),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_raw_table_headers_keep_repeats() {
        let table = raw(&[("a", &["1"]), ("a", &["2"])]);
        assert_eq!(table.headers(), vec!["a", "a"]);
        assert_eq!(table.height(), 1);
        assert_eq!(table.width(), 2);
    }
}
