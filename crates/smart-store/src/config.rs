//! Configuration types for the preparation and load pipeline.
//!
//! This module provides configuration options using the builder pattern
//! for flexible and ergonomic pipeline setup. Configurations can also be
//! read from JSON.

use crate::error::{EtlError, Result};
use crate::pipeline::outliers::DEFAULT_IQR_MULTIPLIER;
use crate::types::Entity;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Suffix appended to a raw file stem to name its prepared output.
pub const PREPARED_SUFFIX: &str = "_prepared";

/// How one source entity is read and which columns it keeps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityConfig {
    pub entity: Entity,

    /// Raw file name inside the raw directory, e.g. `customers_data.csv`.
    pub file_name: String,

    /// Columns to keep, in output order. May repeat a name; only the first
    /// appearance counts.
    pub expected_columns: Vec<String>,
}

impl EntityConfig {
    pub fn new<S: Into<String>>(
        entity: Entity,
        expected_columns: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            entity,
            file_name: format!("{}.csv", entity.file_stem()),
            expected_columns: expected_columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Stock configuration for an entity.
    pub fn default_for(entity: Entity) -> Self {
        match entity {
            Entity::Customers => Self::new(
                entity,
                [
                    "CustomerID",
                    "Name",
                    "Region",
                    "JoinDate",
                    "LoyaltyPoints",
                    "CustomerSegment",
                    "LastPurchaseDate",
                ],
            ),
            Entity::Products => Self::new(
                entity,
                [
                    "ProductId",
                    "ProductName",
                    "Category",
                    "UnitPrice",
                    "StockQuantity",
                    "Supplier",
                    "AverageRating",
                ],
            ),
            Entity::Sales => Self::new(
                entity,
                [
                    "TransactionId",
                    "SaleDate",
                    "CustomerID",
                    "ProductID",
                    "StoreID",
                    "CampaignID",
                    "SaleAmount",
                    "DiscountPercent",
                    "PaymentType",
                    "DiscountPercent",
                ],
            ),
        }
    }

    /// Name of the prepared file, e.g. `customers_data_prepared.csv`.
    pub fn prepared_file_name(&self) -> String {
        let path = Path::new(&self.file_name);
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(self.entity.file_stem());
        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("csv");
        format!("{}{}.{}", stem, PREPARED_SUFFIX, extension)
    }
}

/// Configuration for the preparation and load pipeline.
///
/// Use [`PipelineConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use smart_store::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .raw_dir("data/raw")
///     .warehouse_path("data/dw/smart_sales.db")
///     .outlier_iqr_multiplier(3.0)
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding the raw entity files.
    /// Default: "data/raw"
    pub raw_dir: PathBuf,

    /// Directory the prepared files are written to (created if missing).
    /// Default: "data/prepared"
    pub prepared_dir: PathBuf,

    /// SQLite file of the warehouse (parent directory created if missing).
    /// Default: "data/dw/smart_sales.db"
    pub warehouse_path: PathBuf,

    /// Entities to process, in processing order.
    /// Default: customers, products, sales
    pub entities: Vec<EntityConfig>,

    /// Multiplier `k` of the outlier fence `[Q1 - k*IQR, Q3 + k*IQR]`.
    /// Default: 1.5
    pub outlier_iqr_multiplier: f64,

    /// Whether the warehouse enforces its foreign keys during the load.
    /// Default: false
    pub enforce_foreign_keys: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            prepared_dir: PathBuf::from("data/prepared"),
            warehouse_path: PathBuf::from("data/dw/smart_sales.db"),
            entities: Entity::ALL.into_iter().map(EntityConfig::default_for).collect(),
            outlier_iqr_multiplier: DEFAULT_IQR_MULTIPLIER,
            enforce_foreign_keys: false,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Read and validate a JSON configuration file. Absent fields take
    /// their default.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        config
            .validate()
            .map_err(|e| EtlError::InvalidConfig(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        if !self.outlier_iqr_multiplier.is_finite() || self.outlier_iqr_multiplier <= 0.0 {
            return Err(ConfigValidationError::InvalidMultiplier(
                self.outlier_iqr_multiplier,
            ));
        }

        let mut seen = HashSet::new();
        for entity in &self.entities {
            if !seen.insert(entity.entity) {
                return Err(ConfigValidationError::DuplicateEntity(entity.entity));
            }
            if entity.expected_columns.is_empty() {
                return Err(ConfigValidationError::NoExpectedColumns(entity.entity));
            }
        }

        Ok(())
    }

    /// Configuration of one entity, if it is processed.
    pub fn entity(&self, entity: Entity) -> Option<&EntityConfig> {
        self.entities.iter().find(|e| e.entity == entity)
    }

    pub fn raw_path(&self, entity: &EntityConfig) -> PathBuf {
        self.raw_dir.join(&entity.file_name)
    }

    pub fn prepared_path(&self, entity: &EntityConfig) -> PathBuf {
        self.prepared_dir.join(entity.prepared_file_name())
    }

    /// Prepared file of an entity; stock file name when it is not configured.
    pub fn prepared_path_for(&self, entity: Entity) -> PathBuf {
        match self.entity(entity) {
            Some(config) => self.prepared_path(config),
            None => self.prepared_path(&EntityConfig::default_for(entity)),
        }
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid outlier IQR multiplier: {0} (must be a positive number)")]
    InvalidMultiplier(f64),

    #[error("Entity '{0}' is configured more than once")]
    DuplicateEntity(Entity),

    #[error("Entity '{0}' has no expected columns")]
    NoExpectedColumns(Entity),
}

impl From<ConfigValidationError> for EtlError {
    fn from(err: ConfigValidationError) -> Self {
        EtlError::InvalidConfig(err.to_string())
    }
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    raw_dir: Option<PathBuf>,
    prepared_dir: Option<PathBuf>,
    warehouse_path: Option<PathBuf>,
    entities: Option<Vec<EntityConfig>>,
    outlier_iqr_multiplier: Option<f64>,
    enforce_foreign_keys: Option<bool>,
}

impl PipelineConfigBuilder {
    /// Set the directory holding the raw entity files.
    pub fn raw_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.raw_dir = Some(path.into());
        self
    }

    /// Set the directory the prepared files are written to.
    pub fn prepared_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.prepared_dir = Some(path.into());
        self
    }

    /// Set the warehouse SQLite file.
    pub fn warehouse_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.warehouse_path = Some(path.into());
        self
    }

    /// Replace the processed entities.
    pub fn entities(mut self, entities: Vec<EntityConfig>) -> Self {
        self.entities = Some(entities);
        self
    }

    /// Set the outlier fence multiplier.
    ///
    /// # Arguments
    /// * `multiplier` - Positive value (1.5 is the usual Tukey fence)
    pub fn outlier_iqr_multiplier(mut self, multiplier: f64) -> Self {
        self.outlier_iqr_multiplier = Some(multiplier);
        self
    }

    /// Enable or disable foreign key enforcement during the load.
    pub fn enforce_foreign_keys(mut self, enforce: bool) -> Self {
        self.enforce_foreign_keys = Some(enforce);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> std::result::Result<PipelineConfig, ConfigValidationError> {
        let defaults = PipelineConfig::default();
        let config = PipelineConfig {
            raw_dir: self.raw_dir.unwrap_or(defaults.raw_dir),
            prepared_dir: self.prepared_dir.unwrap_or(defaults.prepared_dir),
            warehouse_path: self.warehouse_path.unwrap_or(defaults.warehouse_path),
            entities: self.entities.unwrap_or(defaults.entities),
            outlier_iqr_multiplier: self
                .outlier_iqr_multiplier
                .unwrap_or(defaults.outlier_iqr_multiplier),
            enforce_foreign_keys: self
                .enforce_foreign_keys
                .unwrap_or(defaults.enforce_foreign_keys),
        };

        config.validate()?;
        Ok(config)
    }
}
