//! Integration tests for the sales ETL.
//!
//! These tests verify end-to-end behavior of preparation and loading using
//! the raw files under `tests/fixtures/raw`.

use pretty_assertions::assert_eq;
use polars::prelude::*;
use rusqlite::Connection;
use smart_store::{
    Cell, ColumnResolver, ColumnType, DataScrubber, DateNormalizer, Entity, EntityConfig, LoadReport,
    OutlierFilter, Pipeline, PipelineConfig, RawTable, WarehouseInput, WarehouseLoader,
    load_prepared, prepare_all, read_prepared, read_raw_table,
};
use std::path::{Path, PathBuf};

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn raw_fixtures() -> PathBuf {
    fixtures_path().join("raw")
}

fn config_in(dir: &Path, raw_dir: PathBuf) -> PipelineConfig {
    PipelineConfig::builder()
        .raw_dir(raw_dir)
        .prepared_dir(dir.join("prepared"))
        .warehouse_path(dir.join("dw").join("smart_sales.db"))
        .build()
        .unwrap()
}

fn names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|s| s.to_string()).collect()
}

fn int_column(df: &DataFrame, column: &str) -> Vec<Option<i64>> {
    df.column(column).unwrap().i64().unwrap().into_iter().collect()
}

fn ids(conn: &Connection, sql: &str) -> Vec<i64> {
    let mut stmt = conn.prepare(sql).unwrap();
    stmt.query_map([], |row| row.get(0))
        .unwrap()
        .collect::<rusqlite::Result<Vec<i64>>>()
        .unwrap()
}

fn raw_table(columns: &[(&str, &[&str])]) -> RawTable {
    RawTable::new(
        columns
            .iter()
            .map(|(name, values)| Series::new((*name).into(), *values))
            .collect(),
    )
    .unwrap()
}

fn star_input(customer_ids: &[i64]) -> WarehouseInput {
    let names: Vec<String> = customer_ids.iter().map(|id| format!("Customer {}", id)).collect();
    WarehouseInput {
        customers: df![
            "CustomerID" => customer_ids,
            "Name" => names,
        ]
        .unwrap(),
        products: df![
            "ProductID" => [100i64],
            "ProductName" => ["Widget"],
        ]
        .unwrap(),
        sales: df![
            "TransactionID" => [1000i64],
            "CustomerID" => [customer_ids[0]],
            "ProductID" => [100i64],
            "SaleAmount" => [42.0],
        ]
        .unwrap(),
    }
}

// ============================================================================
// Column Resolver
// ============================================================================

#[test]
fn test_resolver_output_is_ordered_intersection() {
    let table = raw_table(&[
        ("Region", &["East"]),
        ("CustomerID", &["1"]),
        ("Notes", &["x"]),
        ("Region", &["West"]),
        ("Name", &["Ann"]),
    ]);
    let expected = ["Name", "Missing", "CustomerID", "Name", "Region"];

    let resolution = ColumnResolver::resolve(&table, &expected).unwrap();

    assert_eq!(names(&resolution.frame), vec!["Name", "CustomerID", "Region"]);
    assert_eq!(resolution.duplicates, vec!["Region"]);
    assert_eq!(resolution.missing, vec!["Missing"]);
    assert_eq!(
        resolution.frame.column("Region").unwrap().str().unwrap().get(0),
        Some("East")
    );
}

#[test]
fn test_resolver_on_sales_fixture_collapses_discount() {
    let table = read_raw_table(&raw_fixtures().join("sales_data.csv")).unwrap();
    let sales = EntityConfig::default_for(Entity::Sales);

    let resolution = ColumnResolver::resolve(&table, &sales.expected_columns).unwrap();

    assert_eq!(resolution.duplicates, vec!["DiscountPercent"]);
    assert_eq!(
        names(&resolution.frame),
        vec![
            "TransactionId",
            "SaleDate",
            "CustomerID",
            "ProductID",
            "StoreID",
            "CampaignID",
            "SaleAmount",
            "DiscountPercent",
            "PaymentType",
        ]
    );
    // First occurrence wins, the trailing 99s are gone
    assert_eq!(
        resolution.frame.column("DiscountPercent").unwrap().str().unwrap().get(0),
        Some("5")
    );
}

// ============================================================================
// Outlier Filter
// ============================================================================

#[test]
fn test_outlier_bounds_are_inclusive() {
    // Q1 = 10, Q3 = 20 -> bounds [-5, 35]
    let df = df!["v" => [10.0, 10.0, 15.0, 20.0, 20.0]].unwrap();
    let filter = OutlierFilter::default();
    let bounds = filter.bounds(&df, "v").unwrap().unwrap();
    assert_eq!((bounds.lower, bounds.upper), (-5.0, 35.0));

    let probe = df!["v" => [-5.0, 35.0, 40.0]].unwrap();
    let kept = DataScrubber::filter_column_outliers(&probe, "v", bounds.lower, bounds.upper).unwrap();

    let values: Vec<Option<f64>> = kept.column("v").unwrap().f64().unwrap().into_iter().collect();
    assert_eq!(values, vec![Some(-5.0), Some(35.0)]);
}

#[test]
fn test_outlier_filter_is_idempotent_when_nothing_is_out() {
    let df = df![
        "LoyaltyPoints" => [450i64, 480, 500, 520],
        "UnitPrice" => [25.5, 85.0, 120.0, 150.0],
    ]
    .unwrap();
    let filter = OutlierFilter::default();

    let (once, _) = filter.filter_numeric(&df).unwrap();
    let (twice, report) = filter.filter_numeric(&once).unwrap();

    assert!(once.equals_missing(&df));
    assert!(twice.equals_missing(&once));
    assert_eq!(report.rows_before, report.rows_after);
}

// ============================================================================
// Record Scrubber
// ============================================================================

#[test]
fn test_drop_and_rename_are_atomic() {
    let df = df![
        "CustomerID" => [1i64, 2],
        "Name" => ["Ann", "Bo"],
        "Region" => ["East", "West"],
    ]
    .unwrap();

    let err = DataScrubber::drop_columns(&df, &["Region", "Ghost"]).unwrap_err();
    assert_eq!(err.error_code(), "COLUMN_NOT_FOUND");
    assert_eq!(err.column(), Some("Ghost"));

    let err = DataScrubber::rename_columns(&df, &[("Name", "FullName"), ("Ghost", "Spirit")])
        .unwrap_err();
    assert_eq!(err.column(), Some("Ghost"));

    let err = DataScrubber::reorder_columns(&df, &["Name", "Ghost"]).unwrap_err();
    assert_eq!(err.column(), Some("Ghost"));

    assert_eq!(names(&df), vec!["CustomerID", "Name", "Region"]);
}

#[test]
fn test_scrubber_chain() {
    let df = df![
        "CustomerID" => ["1", "2", "2", "3"],
        "Region" => ["  East", "west ", "west ", "NORTH"],
        "LoyaltyPoints" => [Some("10"), None, None, Some("30")],
        "JoinDate" => ["2020-01-01", "02/03/2020", "02/03/2020", "later"],
    ]
    .unwrap();

    let df = DataScrubber::remove_duplicates(&df).unwrap();
    let df = DataScrubber::format_column_strings_to_lower_and_trim(&df, "Region").unwrap();
    let df =
        DataScrubber::convert_column_to_new_data_type(&df, "CustomerID", ColumnType::Integer)
            .unwrap();
    let df = DataScrubber::handle_missing_data(&df, false, Some(&Cell::Integer(0))).unwrap();
    let df = DataScrubber::parse_dates_to_add_standard_datetime(&df, "JoinDate").unwrap();
    let df = DataScrubber::rename_columns(&df, &[("Region", "SalesRegion")]).unwrap();
    let df = DataScrubber::reorder_columns(&df, &["CustomerID", "SalesRegion", "StandardDateTime"])
        .unwrap();

    assert_eq!(df.height(), 3);
    assert_eq!(int_column(&df, "CustomerID"), vec![Some(1), Some(2), Some(3)]);
    assert_eq!(df.column("SalesRegion").unwrap().str().unwrap().get(2), Some("north"));

    let derived = df.column("StandardDateTime").unwrap().as_materialized_series();
    assert_eq!(derived.null_count(), 1);
    let summary = DataScrubber::inspect_data(&df).unwrap();
    assert_eq!(summary.rows, 3);
    assert_eq!(summary.columns, 3);
}

// ============================================================================
// Date Normalizer
// ============================================================================

#[test]
fn test_date_normalization_of_join_date() {
    let df = df!["JoinDate" => ["2020-01-01", "not a date"], "Name" => ["a", "b"]].unwrap();

    let result = DateNormalizer::normalize(&df).unwrap();
    let dates = result.frame.column("JoinDate").unwrap().str().unwrap().clone();

    assert_eq!(dates.get(0), Some("2020-01-01"));
    assert_eq!(dates.get(1), None);
    assert_eq!(result.unparsable_cells, 1);

    let typed = DataScrubber::convert_column_to_new_data_type(
        &result.frame,
        "JoinDate",
        ColumnType::Date,
    )
    .unwrap();
    let first = typed.column("JoinDate").unwrap().as_materialized_series().get(0).unwrap();
    assert_eq!(
        Cell::from_any_value(&first),
        Cell::Date(chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())
    );
}

// ============================================================================
// Preparation Stage
// ============================================================================

#[test]
fn test_prepare_fixtures() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), raw_fixtures());

    let report = prepare_all(&config).unwrap();

    assert!(report.failures.is_empty(), "{:?}", report.failures);
    let order: Vec<Entity> = report.prepared.iter().map(|p| p.entity).collect();
    assert_eq!(order, Entity::ALL.to_vec());

    let customers = &report.prepared[0];
    assert_eq!(customers.rows_before, 6);
    assert_eq!(customers.rows_after_dedup, 5);
    // LoyaltyPoints 99999 is filtered out
    assert_eq!(customers.rows_after, 4);
    assert!(!customers.columns_retained.contains(&"Notes".to_string()));
    assert!(
        customers
            .output_path
            .ends_with("prepared/customers_data_prepared.csv")
    );

    let sales = &report.prepared[2];
    assert_eq!(sales.duplicates_collapsed, vec!["DiscountPercent"]);
    assert_eq!(sales.rows_after, 4);

    let prepared = read_prepared(&customers.output_path).unwrap();
    assert_eq!(int_column(&prepared, "CustomerID"), vec![Some(1), Some(2), Some(3), Some(4)]);
    let join = prepared.column("JoinDate").unwrap().str().unwrap().clone();
    assert_eq!(join.get(0), Some("2021-01-15"));
    let last = prepared.column("LastPurchaseDate").unwrap();
    assert_eq!(last.null_count(), 1);

    let content = std::fs::read_to_string(&sales.output_path).unwrap();
    let header = content.lines().next().unwrap();
    assert_eq!(
        header,
        "TransactionId,SaleDate,CustomerID,ProductID,StoreID,CampaignID,SaleAmount,DiscountPercent,PaymentType"
    );
    assert!(content.contains("2023-01-08"));
}

#[test]
fn test_prepare_isolates_unreadable_files() {
    let dir = tempfile::tempdir().unwrap();
    let raw_dir = dir.path().join("raw");
    std::fs::create_dir_all(&raw_dir).unwrap();
    std::fs::copy(
        raw_fixtures().join("customers_data.csv"),
        raw_dir.join("customers_data.csv"),
    )
    .unwrap();
    std::fs::write(raw_dir.join("products_data.csv"), "").unwrap();

    let report = prepare_all(&config_in(dir.path(), raw_dir)).unwrap();

    assert_eq!(report.prepared.len(), 1);
    assert_eq!(report.prepared[0].entity, Entity::Customers);
    let failed: Vec<Entity> = report.failures.iter().map(|f| f.entity).collect();
    assert_eq!(failed, vec![Entity::Products, Entity::Sales]);
    assert!(report.failures.iter().all(|f| f.code == "INGESTION_FAILED"));
}

#[test]
fn test_prepare_keeps_rows_with_blank_date_column() {
    let dir = tempfile::tempdir().unwrap();
    let raw_dir = dir.path().join("raw");
    std::fs::create_dir_all(&raw_dir).unwrap();
    std::fs::write(
        raw_dir.join("customers_data.csv"),
        "CustomerID,Name,JoinDate,LoyaltyPoints,LastPurchaseDate\n\
         1,Ann,2021-01-15,500,\n\
         2,Bo,2021-02-20,450,\n\
         3,Cy,2021-03-05,520,\n",
    )
    .unwrap();

    let report = prepare_all(&config_in(dir.path(), raw_dir)).unwrap();

    let customers = &report.prepared[0];
    assert_eq!(customers.entity, Entity::Customers);
    assert_eq!(customers.rows_before, 3);
    assert_eq!(customers.rows_after, 3);
    assert!(customers.date_columns_skipped.is_empty());

    let prepared = read_prepared(&customers.output_path).unwrap();
    assert_eq!(prepared.height(), 3);
    assert_eq!(prepared.column("LastPurchaseDate").unwrap().null_count(), 3);
}

// ============================================================================
// Warehouse Loader
// ============================================================================

#[test]
fn test_load_is_full_replace() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dw").join("smart_sales.db");
    let loader = WarehouseLoader::new(&path);

    let report = loader.load(&star_input(&[1, 2])).unwrap();
    assert_eq!(report, LoadReport { customers: 2, products: 1, sales: 1 });

    let conn = Connection::open(&path).unwrap();
    assert_eq!(ids(&conn, "SELECT CustomerID FROM customer ORDER BY CustomerID"), vec![1, 2]);
    assert_eq!(ids(&conn, "SELECT ProductID FROM product"), vec![100]);
    assert_eq!(ids(&conn, "SELECT TransactionID FROM sale"), vec![1000]);
    assert_eq!(ids(&conn, "SELECT CustomerID FROM sale"), vec![1]);
    drop(conn);

    loader.load(&star_input(&[2])).unwrap();

    let conn = Connection::open(&path).unwrap();
    assert_eq!(ids(&conn, "SELECT CustomerID FROM customer"), vec![2]);
    assert_eq!(ids(&conn, "SELECT CustomerID FROM sale"), vec![2]);
    assert_eq!(ids(&conn, "SELECT QuantitySold FROM sale"), vec![1]);
}

#[test]
fn test_failed_load_keeps_previous_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("smart_sales.db");
    let loader = WarehouseLoader::new(&path);
    loader.load(&star_input(&[1, 2])).unwrap();

    // Duplicate primary keys fail the product insert after customers were
    // already replaced inside the transaction.
    let mut bad = star_input(&[7]);
    bad.products = df!["ProductID" => [100i64, 100]].unwrap();
    let err = loader.load(&bad).unwrap_err();
    assert_eq!(err.error_code(), "LOAD_FAILED");

    let conn = Connection::open(&path).unwrap();
    assert_eq!(ids(&conn, "SELECT CustomerID FROM customer ORDER BY CustomerID"), vec![1, 2]);
    assert_eq!(ids(&conn, "SELECT TransactionID FROM sale"), vec![1000]);
}

#[test]
fn test_prepare_then_load_fixtures() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::builder()
        .raw_dir(raw_fixtures())
        .prepared_dir(dir.path().join("prepared"))
        .warehouse_path(dir.path().join("dw").join("smart_sales.db"))
        .enforce_foreign_keys(true)
        .build()
        .unwrap();

    let report = Pipeline::new(config.clone()).unwrap().run().unwrap();
    let load = report.load.unwrap();
    assert_eq!(load, LoadReport { customers: 4, products: 4, sales: 4 });

    let conn = Connection::open(&config.warehouse_path).unwrap();
    assert_eq!(
        ids(&conn, "SELECT TransactionID FROM sale ORDER BY TransactionID"),
        vec![1000, 1001, 1002, 1003]
    );
    let date: String = conn
        .query_row("SELECT SaleDate FROM sale WHERE TransactionID = 1001", [], |row| row.get(0))
        .unwrap();
    assert_eq!(date, "2023-01-06");
    drop(conn);

    // Loading again from the same prepared files replaces, never appends
    let again = load_prepared(&config).unwrap();
    assert_eq!(again, load);
}

#[test]
fn test_load_prepared_reports_missing_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), raw_fixtures());

    let err = load_prepared(&config).unwrap_err();
    assert_eq!(err.error_code(), "INGESTION_FAILED");
    assert!(!config.warehouse_path.exists());
}
