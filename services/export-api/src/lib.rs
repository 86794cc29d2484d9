//! Raster export admission service.
//!
//! Accepts requests to export a raster layer region as a packaged tile
//! archive and decides whether to reuse an existing result, attach to an
//! in-flight job, or admit a brand-new job: geometry normalization and
//! footprint validation, duplicate detection against the Job Store, and
//! storage-capacity admission control.

pub mod config;
pub mod dedup;
pub mod export;
pub mod geometry;
pub mod roi;
pub mod status;
pub mod storage;
pub mod validation;

pub use config::ServiceConfig;
pub use dedup::{DuplicateDetector, DuplicateOutcome, DuplicationKey, ProcessingJob};
pub use export::{CreateExportJobResponse, CreateExportRequest, ExportResponse, ExportService};
pub use roi::GeometryRecord;
pub use status::{ExportStatusHandler, JobStatusResponse};
pub use storage::{estimate_gpkg_size, StorageGate};
