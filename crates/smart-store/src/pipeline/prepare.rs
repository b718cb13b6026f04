//! Preparation stage: raw entity files to prepared files.
//!
//! Each entity runs through column resolution, type inference, duplicate
//! removal, date normalization and outlier filtering, then is written next
//! to the others in the prepared directory. A failing entity is recorded and
//! the remaining entities still run.

use crate::cleaner::{ColumnResolver, DataScrubber, DateNormalizer, RawTable};
use crate::config::{EntityConfig, PipelineConfig};
use crate::error::{EtlError, Result};
use crate::io::{read_raw_table, write_prepared};
use crate::pipeline::outliers::{OutlierFilter, OutlierReport};
use crate::types::{EntityFailure, EntityPreparation, PreparationReport};
use polars::prelude::*;
use tracing::{debug, error, info};

/// In-memory result of preparing one raw table.
#[derive(Debug, Clone)]
pub struct PreparedFrame {
    pub frame: DataFrame,
    pub rows_before: usize,
    pub rows_after_dedup: usize,
    pub duplicates_collapsed: Vec<String>,
    pub date_columns_skipped: Vec<String>,
    pub outliers: OutlierReport,
}

/// Runs the preparation stage for the configured entities.
pub struct Preparer<'a> {
    config: &'a PipelineConfig,
    outliers: OutlierFilter,
}

impl<'a> Preparer<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self {
            config,
            outliers: OutlierFilter::new(config.outlier_iqr_multiplier),
        }
    }

    /// Scrub one raw table. No file access.
    pub fn prepare_frame(&self, raw: &RawTable, entity: &EntityConfig) -> Result<PreparedFrame> {
        let rows_before = raw.height();

        let resolution = ColumnResolver::resolve(raw, &entity.expected_columns)?;
        let typed = DataScrubber::infer_column_types(&resolution.frame)?;

        let deduped = DataScrubber::remove_duplicates(&typed)?;
        let rows_after_dedup = deduped.height();

        let dates = DateNormalizer::normalize(&deduped)?;
        let (frame, outliers) = self.outliers.filter_numeric(&dates.frame)?;

        debug!(
            "{}: {} rows read, {} after dedup, {} after outlier filter",
            entity.entity,
            rows_before,
            rows_after_dedup,
            frame.height()
        );

        Ok(PreparedFrame {
            frame,
            rows_before,
            rows_after_dedup,
            duplicates_collapsed: resolution.duplicates,
            date_columns_skipped: dates.skipped,
            outliers,
        })
    }

    /// Read, scrub and write one entity.
    pub fn prepare_entity(&self, entity: &EntityConfig) -> Result<EntityPreparation> {
        let raw_path = self.config.raw_path(entity);
        info!("Preparing {} from {}", entity.entity, raw_path.display());

        let raw = read_raw_table(&raw_path).map_err(|e| EtlError::Ingestion {
            entity: entity.entity.to_string(),
            reason: e.to_string(),
        })?;

        let prepared = self.prepare_frame(&raw, entity)?;
        let output_path = self.config.prepared_path(entity);
        write_prepared(&prepared.frame, &output_path)?;

        Ok(EntityPreparation {
            entity: entity.entity,
            rows_before: prepared.rows_before,
            rows_after_dedup: prepared.rows_after_dedup,
            rows_after: prepared.frame.height(),
            columns_retained: prepared
                .frame
                .get_column_names()
                .iter()
                .map(|s| s.to_string())
                .collect(),
            duplicates_collapsed: prepared.duplicates_collapsed,
            date_columns_skipped: prepared.date_columns_skipped,
            output_path,
        })
    }

    /// Prepare every configured entity in order.
    ///
    /// Only a failure to create the prepared directory aborts the run; entity
    /// failures are collected in the report.
    pub fn run(&self) -> Result<PreparationReport> {
        std::fs::create_dir_all(&self.config.prepared_dir)?;

        let mut report = PreparationReport::default();
        for entity in &self.config.entities {
            match self.prepare_entity(entity) {
                Ok(prepared) => {
                    info!(
                        "Prepared {}: {} -> {} rows",
                        entity.entity, prepared.rows_before, prepared.rows_after
                    );
                    report.prepared.push(prepared);
                }
                Err(e) => {
                    error!("Failed to prepare {}: {}", entity.entity, e);
                    report.failures.push(EntityFailure {
                        entity: entity.entity,
                        code: e.error_code().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Preparation finished: {} prepared, {} failed",
            report.prepared.len(),
            report.failures.len()
        );
        Ok(report)
    }
}

/// Prepare every configured entity.
pub fn prepare_all(config: &PipelineConfig) -> Result<PreparationReport> {
    Preparer::new(config).run()
}
