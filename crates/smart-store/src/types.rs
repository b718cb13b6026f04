use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Days between 0001-01-01 (CE day 1) and the Unix epoch.
pub(crate) const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

// ============================================================================
// Cell values
// ============================================================================

/// A single dataset value.
///
/// Columns are typed in the frame; `Cell` is how one value crosses the API
/// (fill values, inspection in tests and diagnostics).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Integer(i64),
    Real(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Missing,
}

impl Cell {
    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// Convert a polars value into a cell.
    pub fn from_any_value(value: &AnyValue<'_>) -> Cell {
        match value {
            AnyValue::Null => Cell::Missing,
            AnyValue::Boolean(b) => Cell::Integer(i64::from(*b)),
            AnyValue::Int8(v) => Cell::Integer(i64::from(*v)),
            AnyValue::Int16(v) => Cell::Integer(i64::from(*v)),
            AnyValue::Int32(v) => Cell::Integer(i64::from(*v)),
            AnyValue::Int64(v) => Cell::Integer(*v),
            AnyValue::UInt8(v) => Cell::Integer(i64::from(*v)),
            AnyValue::UInt16(v) => Cell::Integer(i64::from(*v)),
            AnyValue::UInt32(v) => Cell::Integer(i64::from(*v)),
            AnyValue::UInt64(v) => i64::try_from(*v).map_or(Cell::Real(*v as f64), Cell::Integer),
            AnyValue::Float32(v) => Cell::Real(f64::from(*v)),
            AnyValue::Float64(v) => Cell::Real(*v),
            AnyValue::String(s) => Cell::Text((*s).to_string()),
            AnyValue::StringOwned(s) => Cell::Text(s.to_string()),
            AnyValue::Date(days) => days_to_date(*days).map_or(Cell::Missing, Cell::Date),
            AnyValue::Datetime(value, unit, _) => {
                timestamp_to_datetime(*value, *unit).map_or(Cell::Missing, Cell::DateTime)
            }
            other => Cell::Text(other.to_string()),
        }
    }

    /// Text form used when a value has to live in a text column.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Cell::Integer(v) => Some(v.to_string()),
            Cell::Real(v) => Some(v.to_string()),
            Cell::Text(s) => Some(s.clone()),
            Cell::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            Cell::DateTime(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
            Cell::Missing => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_text() {
            Some(text) => write!(f, "{}", text),
            None => write!(f, "<missing>"),
        }
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Integer(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Real(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<NaiveDate> for Cell {
    fn from(value: NaiveDate) -> Self {
        Cell::Date(value)
    }
}

/// Days since the Unix epoch to a calendar date.
pub(crate) fn days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

/// Calendar date to days since the Unix epoch.
pub(crate) fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

pub(crate) fn timestamp_to_datetime(value: i64, unit: TimeUnit) -> Option<NaiveDateTime> {
    let millis = match unit {
        TimeUnit::Nanoseconds => value.div_euclid(1_000_000),
        TimeUnit::Microseconds => value.div_euclid(1_000),
        TimeUnit::Milliseconds => value,
    };
    DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}

// ============================================================================
// Column types
// ============================================================================

/// Target type for explicit column coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    Date,
    DateTime,
}

impl ColumnType {
    /// The polars dtype a column of this type is stored as.
    pub fn dtype(&self) -> DataType {
        match self {
            ColumnType::Integer => DataType::Int64,
            ColumnType::Real => DataType::Float64,
            ColumnType::Text => DataType::String,
            ColumnType::Date => DataType::Date,
            ColumnType::DateTime => DataType::Datetime(TimeUnit::Milliseconds, None),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Integer => "integer",
            ColumnType::Real => "real",
            ColumnType::Text => "text",
            ColumnType::Date => "date",
            ColumnType::DateTime => "datetime",
        };
        write!(f, "{}", name)
    }
}

// ============================================================================
// Domain entities
// ============================================================================

/// The three source entities of the sales warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Customers,
    Products,
    Sales,
}

impl Entity {
    pub const ALL: [Entity; 3] = [Entity::Customers, Entity::Products, Entity::Sales];

    /// Stem of the raw source file, e.g. `customers_data`.
    pub fn file_stem(&self) -> &'static str {
        match self {
            Entity::Customers => "customers_data",
            Entity::Products => "products_data",
            Entity::Sales => "sales_data",
        }
    }

    /// Warehouse table the entity loads into.
    pub fn table(&self) -> &'static str {
        match self {
            Entity::Customers => "customer",
            Entity::Products => "product",
            Entity::Sales => "sale",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::Customers => "customers",
            Entity::Products => "products",
            Entity::Sales => "sales",
        };
        write!(f, "{}", name)
    }
}

// ============================================================================
// Diagnostics
// ============================================================================

/// Structural and statistical summary of a dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSummary {
    pub rows: usize,
    pub columns: usize,
    /// One entry per column, in frame order.
    pub info: Vec<ColumnInfo>,
    /// One entry per numeric column, in frame order.
    pub describe: Vec<NumericSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub dtype: String,
    pub non_missing: usize,
    pub missing: usize,
}

/// Count, moments and quartiles of one numeric column.
///
/// Statistics are `None` when the column has no non-missing values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericSummary {
    pub column: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub q50: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

/// Outcome of preparing one entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityPreparation {
    pub entity: Entity,
    pub rows_before: usize,
    pub rows_after_dedup: usize,
    pub rows_after: usize,
    pub columns_retained: Vec<String>,
    pub duplicates_collapsed: Vec<String>,
    pub date_columns_skipped: Vec<String>,
    pub output_path: PathBuf,
}

/// A per-entity failure that did not stop the other entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityFailure {
    pub entity: Entity,
    pub code: String,
    pub message: String,
}

/// Outcome of a full preparation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreparationReport {
    pub prepared: Vec<EntityPreparation>,
    pub failures: Vec<EntityFailure>,
}

impl PreparationReport {
    /// True when at least one entity was written.
    pub fn any_prepared(&self) -> bool {
        !self.prepared.is_empty()
    }
}

/// Row counts written by a warehouse load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    pub customers: usize,
    pub products: usize,
    pub sales: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_conversion() {
        let date = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        assert_eq!(date_to_days(date), 0);
        assert_eq!(days_to_date(0), Some(date));

        let date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        assert_eq!(days_to_date(date_to_days(date)), Some(date));
    }

    #[test]
    fn test_cell_from_any_value() {
        assert_eq!(Cell::from_any_value(&AnyValue::Null), Cell::Missing);
        assert_eq!(Cell::from_any_value(&AnyValue::Int32(7)), Cell::Integer(7));
        assert_eq!(Cell::from_any_value(&AnyValue::Float64(2.5)), Cell::Real(2.5));
        assert_eq!(Cell::from_any_value(&AnyValue::UInt64(42)), Cell::Integer(42));
        // Past i64::MAX the value is kept as a real instead of wrapping
        assert_eq!(
            Cell::from_any_value(&AnyValue::UInt64(u64::MAX)),
            Cell::Real(u64::MAX as f64)
        );
        assert_eq!(
            Cell::from_any_value(&AnyValue::String("West")),
            Cell::Text("West".to_string())
        );
        assert_eq!(
            Cell::from_any_value(&AnyValue::Date(18262)),
            Cell::Date(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())
        );
    }

    #[test]
    fn test_cell_text_form() {
        assert_eq!(Cell::Integer(3).to_text(), Some("3".to_string()));
        assert_eq!(
            Cell::Date(NaiveDate::from_ymd_opt(2021, 5, 20).unwrap()).to_text(),
            Some("2021-05-20".to_string())
        );
        assert_eq!(Cell::Missing.to_text(), None);
        assert_eq!(Cell::Missing.to_string(), "<missing>");
    }

    #[test]
    fn test_entity_names() {
        assert_eq!(Entity::Customers.file_stem(), "customers_data");
        assert_eq!(Entity::Sales.table(), "sale");
        assert_eq!(Entity::Products.to_string(), "products");
    }
}
