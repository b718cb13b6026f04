//! Warehouse loader.
//!
//! Loads the three prepared datasets into a SQLite star schema. A load is a
//! full replace: every prior row is deleted and the new rows inserted inside
//! one transaction, so either all three tables are refreshed or none is.

pub mod schema;

use crate::cleaner::series_to_cells;
use crate::config::PipelineConfig;
use crate::error::{EtlError, Result, ResultExt};
use crate::io::read_prepared;
use crate::types::{Cell, Entity, LoadReport};
use polars::prelude::*;
use rusqlite::types::Value;
use rusqlite::{Connection, Transaction, params_from_iter};
use schema::{CREATE_SCHEMA, DEFAULT_QUANTITY_SOLD, DELETE_ORDER, QUANTITY_SOLD, insert_statement};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// The prepared datasets of one load.
#[derive(Debug, Clone)]
pub struct WarehouseInput {
    pub customers: DataFrame,
    pub products: DataFrame,
    pub sales: DataFrame,
}

impl WarehouseInput {
    /// Read the prepared file of every entity.
    pub fn read_prepared(config: &PipelineConfig) -> Result<Self> {
        let read = |entity: Entity| {
            let path = config.prepared_path_for(entity);
            debug!("Reading prepared {} from {}", entity, path.display());
            read_prepared(&path).map_err(|e| EtlError::Ingestion {
                entity: entity.to_string(),
                reason: e.to_string(),
            })
        };

        Ok(Self {
            customers: read(Entity::Customers)?,
            products: read(Entity::Products)?,
            sales: read(Entity::Sales)?,
        })
    }
}

/// Full-replace loader for the sales warehouse.
#[derive(Debug, Clone)]
pub struct WarehouseLoader {
    path: PathBuf,
    enforce_foreign_keys: bool,
}

impl WarehouseLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            enforce_foreign_keys: false,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(&config.warehouse_path).enforce_foreign_keys(config.enforce_foreign_keys)
    }

    /// Have SQLite check the fact table's references during the load.
    pub fn enforce_foreign_keys(mut self, enforce: bool) -> Self {
        self.enforce_foreign_keys = enforce;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the warehouse contents with the given datasets.
    ///
    /// On any failure the transaction is rolled back and the tables keep
    /// their previous rows. The connection is closed on return either way.
    pub fn load(&self, input: &WarehouseInput) -> Result<LoadReport> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let mut conn = Connection::open(&self.path)
            .context(format!("Failed to open warehouse {}", self.path.display()))?;
        let pragma = if self.enforce_foreign_keys { "ON" } else { "OFF" };
        conn.execute_batch(&format!("PRAGMA foreign_keys = {};", pragma))?;

        info!("Loading warehouse {}", self.path.display());
        let tx = conn.transaction()?;

        let report = match Self::replace_all(&tx, input) {
            Ok(report) => report,
            Err(e) => {
                warn!("Warehouse load failed, rolling back: {}", e);
                // The load error is the one reported; a dropped transaction
                // rolls back regardless.
                if let Err(rollback) = tx.rollback() {
                    error!("Rollback of {} failed: {}", self.path.display(), rollback);
                }
                return Err(EtlError::Load(e.to_string()).with_context(format!(
                    "Warehouse {} left unchanged",
                    self.path.display()
                )));
            }
        };

        tx.commit().context("Failed to commit warehouse load")?;
        info!(
            "Warehouse loaded: {} customers, {} products, {} sales",
            report.customers, report.products, report.sales
        );
        Ok(report)
    }

    fn replace_all(tx: &Transaction<'_>, input: &WarehouseInput) -> Result<LoadReport> {
        tx.execute_batch(CREATE_SCHEMA)
            .context("Failed to create warehouse schema")?;

        for table in DELETE_ORDER {
            let removed = tx
                .execute(&format!("DELETE FROM {}", table), [])
                .context(format!("Failed to clear table {}", table))?;
            debug!("Deleted {} rows from {}", removed, table);
        }

        Ok(LoadReport {
            customers: insert_frame(tx, Entity::Customers.table(), &input.customers, &[])?,
            products: insert_frame(tx, Entity::Products.table(), &input.products, &[])?,
            sales: insert_frame(
                tx,
                Entity::Sales.table(),
                &input.sales,
                &[(QUANTITY_SOLD, Value::Integer(DEFAULT_QUANTITY_SOLD))],
            )?,
        })
    }
}

/// Insert every row of `df` into `table`, binding values by column name.
///
/// `defaults` supplies columns the frame lacks; a default whose column the
/// frame already has (compared case-insensitively, like SQLite) is ignored.
fn insert_frame(
    tx: &Transaction<'_>,
    table: &str,
    df: &DataFrame,
    defaults: &[(&str, Value)],
) -> Result<usize> {
    let mut columns: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    let mut cells = Vec::with_capacity(columns.len());
    for col in df.get_columns() {
        cells.push(series_to_cells(col.as_materialized_series())?);
    }

    let mut applied = Vec::new();
    for (name, value) in defaults {
        if !columns.iter().any(|c| c.eq_ignore_ascii_case(name)) {
            debug!("Defaulting {}.{} to {:?}", table, name, value);
            columns.push((*name).to_string());
            applied.push(value.clone());
        }
    }

    if columns.is_empty() || df.height() == 0 {
        debug!("Nothing to insert into {}", table);
        return Ok(0);
    }

    let mut stmt = tx
        .prepare(&insert_statement(table, &columns))
        .context(format!("Failed to prepare insert into {}", table))?;

    for row in 0..df.height() {
        let values = cells
            .iter()
            .map(|column| to_sql_value(&column[row]))
            .chain(applied.iter().cloned());
        stmt.execute(params_from_iter(values))
            .context(format!("Failed to insert row {} into {}", row, table))?;
    }

    debug!("Inserted {} rows into {}", df.height(), table);
    Ok(df.height())
}

fn to_sql_value(cell: &Cell) -> Value {
    match cell {
        Cell::Integer(v) => Value::Integer(*v),
        Cell::Real(v) if v.is_nan() => Value::Null,
        Cell::Real(v) => Value::Real(*v),
        Cell::Missing => Value::Null,
        other => other.to_text().map_or(Value::Null, Value::Text),
    }
}

/// Load the prepared files named by the configuration.
pub fn load_prepared(config: &PipelineConfig) -> Result<LoadReport> {
    let input = WarehouseInput::read_prepared(config)?;
    WarehouseLoader::from_config(config).load(&input)
}
