//! Export job status lookup.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use export_clients::{JobStore, OperationStatus};
use export_common::ExportResult;

/// Progress snapshot of an export job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobStatusResponse {
    pub percentage: Option<f64>,
    pub status: OperationStatus,
}

/// Read-only job status handler.
pub struct ExportStatusHandler {
    job_store: Arc<dyn JobStore>,
}

impl ExportStatusHandler {
    pub fn new(job_store: Arc<dyn JobStore>) -> Self {
        Self { job_store }
    }

    /// Fetch the status and completion percentage of a job.
    pub async fn get_job_status_by_job_id(&self, job_id: &str) -> ExportResult<JobStatusResponse> {
        let job = self.job_store.get_job(job_id).await?;
        debug!(job_id, status = %job.status, percentage = ?job.percentage, "Retrieved job status");
        Ok(JobStatusResponse {
            percentage: job.percentage,
            status: job.status,
        })
    }
}
