//! Pipeline module.
//!
//! This module provides the preparation stage, the outlier filter it uses,
//! and [`Pipeline`], which chains preparation and the warehouse load.

pub mod outliers;
mod prepare;

pub use outliers::{ColumnOutliers, IqrBounds, OutlierFilter, OutlierReport};
pub use prepare::{PreparedFrame, Preparer, prepare_all};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::types::{LoadReport, PreparationReport};
use crate::warehouse::load_prepared;
use serde::Serialize;
use tracing::{info, warn};

/// Outcome of a prepare-then-load run.
#[derive(Debug, Clone, Serialize)]
pub struct EtlReport {
    pub preparation: PreparationReport,
    /// `None` when the load was skipped because an entity failed preparation.
    pub load: Option<LoadReport>,
}

/// The sales ETL: preparation followed by the warehouse load.
///
/// # Example
///
/// ```rust,ignore
/// use smart_store::{Pipeline, PipelineConfig};
///
/// let pipeline = Pipeline::new(PipelineConfig::default())?;
/// let report = pipeline.run()?;
/// println!("{} entities prepared", report.preparation.prepared.len());
/// ```
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline from a validated configuration.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Prepare every configured entity.
    pub fn prepare(&self) -> Result<PreparationReport> {
        info!("Step 1: Preparing raw data...");
        prepare_all(&self.config)
    }

    /// Load the prepared files into the warehouse.
    pub fn load(&self) -> Result<LoadReport> {
        info!("Step 2: Loading warehouse...");
        load_prepared(&self.config)
    }

    /// Prepare, then load when every entity was prepared.
    ///
    /// A load after a failed entity would mix fresh files with stale or
    /// absent ones, so it is skipped instead.
    pub fn run(&self) -> Result<EtlReport> {
        let preparation = self.prepare()?;

        if !preparation.failures.is_empty() {
            warn!(
                "Skipping warehouse load: {} entities failed preparation",
                preparation.failures.len()
            );
            return Ok(EtlReport {
                preparation,
                load: None,
            });
        }

        let load = self.load()?;
        Ok(EtlReport {
            preparation,
            load: Some(load),
        })
    }
}
