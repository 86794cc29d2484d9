//! Collaborator clients for the raster export service.
//!
//! Each external system (Job Store, Catalog, disk probe) is consumed through
//! a trait so the engine can be exercised against in-memory fakes; the
//! production implementations here compose a small retrying HTTP capability
//! rather than inheriting from a client base.

pub mod catalog;
pub mod disk;
pub mod http;
pub mod job_store;

pub use catalog::{Catalog, CatalogClient, LayerRecord};
pub use disk::{DiskProbe, StatvfsProbe, StorageStatus};
pub use http::{HttpCaller, HttpRetryConfig};
pub use job_store::{
    AdditionalParams, CallbackExportData, CallbackTarget, CleanupDataParams, CreateJobRequest,
    CreateJobTask, CreatedJob, ExportInputParams, ExportJob, ExportJobParameters, JobCriteria,
    JobQuery, JobStore, JobStoreClient, JobTask, JobUpdate, LinksDefinition, OperationStatus,
    TaskParameters,
};
