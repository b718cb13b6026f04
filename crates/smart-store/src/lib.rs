//! Sales ETL Library
//!
//! Prepares raw sales data files and loads them into a SQLite star schema,
//! built with Rust and Polars.
//!
//! # Overview
//!
//! This library provides:
//!
//! - **Column Resolution**: Keep the expected columns of a raw file, collapsing repeated headers
//! - **Date Normalization**: Rewrite every date-like column as `YYYY-MM-DD`
//! - **Outlier Filtering**: Drop rows outside the IQR fence of each numeric column
//! - **Record Scrubbing**: Deduplication, missing values, type conversion, column edits
//! - **Warehouse Loading**: Transactional full-replace load of customers, products and sales
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use smart_store::{Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::builder()
//!     .raw_dir("data/raw")
//!     .prepared_dir("data/prepared")
//!     .warehouse_path("data/dw/smart_sales.db")
//!     .build()?;
//!
//! let report = Pipeline::new(config)?.run()?;
//! println!("Loaded: {:?}", report.load);
//! ```
//!
//! # Scrubbing
//!
//! Every [`DataScrubber`] operation takes a frame and returns a new one, so
//! steps chain by threading the result:
//!
//! ```rust,ignore
//! use smart_store::{ColumnType, DataScrubber};
//!
//! let df = DataScrubber::remove_duplicates(&df)?;
//! let df = DataScrubber::format_column_strings_to_lower_and_trim(&df, "Region")?;
//! let df = DataScrubber::convert_column_to_new_data_type(&df, "StockQuantity", ColumnType::Integer)?;
//! let df = DataScrubber::rename_columns(&df, &[("Name", "CustomerName")])?;
//! ```

pub mod cleaner;
pub mod config;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod profiler;
pub mod types;
pub mod utils;
pub mod warehouse;

// Re-exports for convenient access
pub use cleaner::{
    ColumnResolver, DataScrubber, DateNormalization, DateNormalizer, RawTable, Resolution,
    STANDARD_DATETIME_COLUMN,
};
pub use config::{ConfigValidationError, EntityConfig, PipelineConfig, PipelineConfigBuilder};
pub use error::{EtlError, Result, ResultExt};
pub use io::{read_prepared, read_raw_table, write_prepared};
pub use pipeline::{
    EtlReport, IqrBounds, OutlierFilter, OutlierReport, Pipeline, Preparer, prepare_all,
};
pub use profiler::DataProfiler;
pub use types::{
    Cell, ColumnInfo, ColumnType, DataSummary, Entity, EntityFailure, EntityPreparation,
    LoadReport, NumericSummary, PreparationReport,
};
pub use warehouse::{WarehouseInput, WarehouseLoader, load_prepared};
