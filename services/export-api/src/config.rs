//! Export service configuration.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Job domain tag stamped on created jobs.
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Directory receiving finished GeoPackage archives.
    #[serde(default = "default_gpkgs_location")]
    pub gpkgs_location: PathBuf,

    /// Where the packaging worker writes tiles from.
    #[serde(default)]
    pub tiles_provider: TilesProvider,

    /// Priority assigned to jobs whose request carries none.
    #[serde(default = "default_priority")]
    pub default_priority: u32,

    /// Days a finished archive is kept before cleanup.
    #[serde(default = "default_expiration_days")]
    pub cleanup_expiration_days: i64,

    #[serde(default)]
    pub storage_estimation: StorageEstimationConfig,

    #[serde(default)]
    pub roi_similarity: RoiSimilarityConfig,

    #[serde(default)]
    pub job_definitions: JobDefinitionsConfig,

    #[serde(default)]
    pub external_clients: ExternalClientsConfig,
}

fn default_domain() -> String {
    "RASTER".to_string()
}

fn default_gpkgs_location() -> PathBuf {
    PathBuf::from("/app/tiles_outputs/gpkgs")
}

fn default_priority() -> u32 {
    1000
}

fn default_expiration_days() -> i64 {
    30
}

/// Storage backend the packaging worker reads tiles from; chooses the path
/// separator used in package-relative paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TilesProvider {
    S3,
    Fs,
}

impl Default for TilesProvider {
    fn default() -> Self {
        TilesProvider::S3
    }
}

impl TilesProvider {
    /// Path separator for package-relative paths on this provider.
    pub fn separator(&self) -> char {
        match self {
            TilesProvider::S3 => '/',
            TilesProvider::Fs => std::path::MAIN_SEPARATOR,
        }
    }
}

/// Archive size estimation constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageEstimationConfig {
    /// Estimated bytes per JPEG tile.
    #[serde(default = "default_tile_bytes")]
    pub jpeg_tile_estimated_size_bytes: u64,

    /// Estimated bytes per PNG tile.
    #[serde(default = "default_tile_bytes")]
    pub png_tile_estimated_size_bytes: u64,

    /// Safety factor applied to other running jobs' outstanding sizes.
    #[serde(default = "default_storage_factor")]
    pub storage_factor_buffer: f64,
}

fn default_tile_bytes() -> u64 {
    12500
}

fn default_storage_factor() -> f64 {
    1.25
}

impl Default for StorageEstimationConfig {
    fn default() -> Self {
        Self {
            jpeg_tile_estimated_size_bytes: default_tile_bytes(),
            png_tile_estimated_size_bytes: default_tile_bytes(),
            storage_factor_buffer: default_storage_factor(),
        }
    }
}

/// Thresholds for treating two regions of interest as the same request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoiSimilarityConfig {
    /// Tolerance buffer around a stored job's region, in meters.
    #[serde(default = "default_buffer_meters")]
    pub roi_buffer_meter: f64,

    /// Minimum area percentage the new region must cover of the stored one.
    #[serde(default = "default_contained_percentage")]
    pub min_contained_percentage: f64,
}

fn default_buffer_meters() -> f64 {
    5.0
}

fn default_contained_percentage() -> f64 {
    75.0
}

impl Default for RoiSimilarityConfig {
    fn default() -> Self {
        Self {
            roi_buffer_meter: default_buffer_meters(),
            min_contained_percentage: default_contained_percentage(),
        }
    }
}

/// Job and task type names in the Job Store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDefinitionsConfig {
    #[serde(default = "default_export_job_type")]
    pub export_job_type: String,

    #[serde(default = "default_init_task_type")]
    pub init_task_type: String,
}

fn default_export_job_type() -> String {
    "Export".to_string()
}

fn default_init_task_type() -> String {
    "init".to_string()
}

impl Default for JobDefinitionsConfig {
    fn default() -> Self {
        Self {
            export_job_type: default_export_job_type(),
            init_task_type: default_init_task_type(),
        }
    }
}

/// Collaborator endpoints and HTTP behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalClientsConfig {
    #[serde(default = "default_job_manager_url")]
    pub job_manager_url: String,

    #[serde(default = "default_catalog_url")]
    pub raster_catalog_url: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub http_retry: HttpRetrySettings,
}

fn default_job_manager_url() -> String {
    "http://job-manager".to_string()
}

fn default_catalog_url() -> String {
    "http://raster-catalog-manager".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for ExternalClientsConfig {
    fn default() -> Self {
        Self {
            job_manager_url: default_job_manager_url(),
            raster_catalog_url: default_catalog_url(),
            request_timeout_secs: default_request_timeout_secs(),
            http_retry: HttpRetrySettings::default(),
        }
    }
}

impl ExternalClientsConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Serializable mirror of the HTTP retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRetrySettings {
    #[serde(default = "default_retry_attempts")]
    pub attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_retry_attempts() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for HttpRetrySettings {
    fn default() -> Self {
        Self {
            attempts: default_retry_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl From<&HttpRetrySettings> for export_clients::HttpRetryConfig {
    fn from(settings: &HttpRetrySettings) -> Self {
        Self {
            attempts: settings.attempts,
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            gpkgs_location: default_gpkgs_location(),
            tiles_provider: TilesProvider::default(),
            default_priority: default_priority(),
            cleanup_expiration_days: default_expiration_days(),
            storage_estimation: StorageEstimationConfig::default(),
            roi_similarity: RoiSimilarityConfig::default(),
            job_definitions: JobDefinitionsConfig::default(),
            external_clients: ExternalClientsConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: ServiceConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load defaults with environment variable overrides for deploy-specific
    /// settings.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = env::var("JOB_MANAGER_URL") {
            config.external_clients.job_manager_url = url;
        }
        if let Ok(url) = env::var("RASTER_CATALOG_URL") {
            config.external_clients.raster_catalog_url = url;
        }
        if let Ok(location) = env::var("GPKGS_LOCATION") {
            config.gpkgs_location = PathBuf::from(location);
        }
        if let Ok(domain) = env::var("JOB_DOMAIN") {
            config.domain = domain;
        }

        config
    }
}
