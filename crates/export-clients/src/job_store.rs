//! Job Store client and the export job wire model.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use export_common::{
    CrsCode, ExportResult, FeatureCollection, TileFormatStrategy, TileOutputFormat,
};

use crate::http::HttpCaller;

/// Lifecycle status of a job or task in the Job Store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationStatus {
    Pending,
    #[serde(rename = "In-Progress")]
    InProgress,
    Completed,
    Failed,
    Expired,
    Aborted,
    Suspended,
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OperationStatus::Pending => "Pending",
            OperationStatus::InProgress => "In-Progress",
            OperationStatus::Completed => "Completed",
            OperationStatus::Failed => "Failed",
            OperationStatus::Expired => "Expired",
            OperationStatus::Aborted => "Aborted",
            OperationStatus::Suspended => "Suspended",
        };
        write!(f, "{}", s)
    }
}

/// A callback registration attached to a job.
///
/// Targets are identified by the `(url, roi)` pair: the same URL registered
/// for two different regions is two distinct targets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallbackTarget {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roi: Option<FeatureCollection>,
}

impl CallbackTarget {
    /// The merge-identity predicate for callback targets.
    pub fn same_target(&self, other: &CallbackTarget) -> bool {
        self.url == other.url && self.roi == other.roi
    }
}

/// Output file name templates for a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinksDefinition {
    #[serde(rename = "dataURI")]
    pub data_uri: String,
    #[serde(rename = "metadataURI")]
    pub metadata_uri: String,
}

/// Caller-facing input parameters stored on a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportInputParams {
    pub crs: CrsCode,
    pub roi: FeatureCollection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_urls: Option<Vec<CallbackTarget>>,
}

/// Worker-facing parameters stored on a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalParams {
    pub file_names_templates: LinksDefinition,
    pub relative_directory_path: String,
    pub package_relative_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_format: Option<TileOutputFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format_strategy: Option<TileFormatStrategy>,
    pub gpkg_estimated_size: u64,
}

/// Cleanup bookkeeping stored on a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CleanupDataParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory_path: Option<String>,
    #[serde(rename = "cleanupExpirationTimeUTC", skip_serializing_if = "Option::is_none")]
    pub cleanup_expiration_time_utc: Option<DateTime<Utc>>,
}

/// The callback payload a completed job published, echoed back to callers
/// that hit the dedup cache. Fields beyond the ones the engine reads are
/// carried through untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CallbackExportData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_catalog_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<LinksDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OperationStatus>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Full parameter block of an export job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportJobParameters {
    pub export_input_params: ExportInputParams,
    pub additional_params: AdditionalParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup_data_params: Option<CleanupDataParams>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_params: Option<CallbackExportData>,
}

/// A task belonging to an export job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobTask {
    pub id: String,
    #[serde(rename = "type")]
    pub task_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OperationStatus>,
}

/// An export job as read from the Job Store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportJob {
    pub id: String,
    pub resource_id: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_id: Option<String>,
    pub status: OperationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    pub parameters: ExportJobParameters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<JobTask>>,
}

impl ExportJob {
    /// Ids of the job's tasks, in stored order.
    pub fn task_ids(&self) -> Vec<String> {
        self.tasks
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|t| t.id.clone())
            .collect()
    }
}

/// Single-status job lookup filter (`GET /jobs`).
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_cleaned: Option<bool>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub should_return_tasks: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OperationStatus>,
}

/// Multi-status job lookup body (`POST /jobs/find`), used to enumerate all
/// currently running export jobs.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobCriteria {
    pub is_cleaned: bool,
    pub types: Vec<String>,
    pub should_return_tasks: bool,
    pub statuses: Vec<OperationStatus>,
}

/// Patch body for `PUT /jobs/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobUpdate {
    pub parameters: ExportJobParameters,
}

/// Parameters of the single `init` task created with a new export job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskParameters {
    pub block_duplication: bool,
}

/// A task definition in a job-creation request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateJobTask {
    #[serde(rename = "type")]
    pub task_type: String,
    pub parameters: TaskParameters,
}

/// Body for `POST /jobs`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    pub resource_id: String,
    pub version: String,
    #[serde(rename = "type")]
    pub job_type: String,
    pub domain: String,
    pub parameters: ExportJobParameters,
    pub internal_id: String,
    pub product_type: String,
    pub product_name: String,
    pub priority: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: OperationStatus,
    pub percentage: u32,
    pub additional_identifiers: String,
    pub tasks: Vec<CreateJobTask>,
}

/// Response of `POST /jobs`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreatedJob {
    pub id: String,
    pub task_ids: Vec<String>,
}

/// The Job Store collaborator interface.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Find jobs matching a single-status filter. Empty when none match.
    async fn find_jobs(&self, query: &JobQuery) -> ExportResult<Vec<ExportJob>>;

    /// Find jobs matching a multi-status criteria body. Empty when none match.
    async fn find_jobs_by_criteria(&self, criteria: &JobCriteria) -> ExportResult<Vec<ExportJob>>;

    /// Fetch a single job by id.
    async fn get_job(&self, job_id: &str) -> ExportResult<ExportJob>;

    /// Patch a job.
    async fn update_job(&self, job_id: &str, update: &JobUpdate) -> ExportResult<()>;

    /// Create a job with its tasks.
    async fn create_job(&self, body: &CreateJobRequest) -> ExportResult<CreatedJob>;
}

/// HTTP implementation of [`JobStore`].
#[derive(Debug, Clone)]
pub struct JobStoreClient {
    http: HttpCaller,
}

impl JobStoreClient {
    pub fn new(http: HttpCaller) -> Self {
        Self { http }
    }
}

#[async_trait]
impl JobStore for JobStoreClient {
    async fn find_jobs(&self, query: &JobQuery) -> ExportResult<Vec<ExportJob>> {
        debug!(?query, "Getting jobs that match these parameters");
        let jobs: Option<Vec<ExportJob>> = self.http.get_json("/jobs", Some(query)).await?;
        Ok(jobs.unwrap_or_default())
    }

    async fn find_jobs_by_criteria(&self, criteria: &JobCriteria) -> ExportResult<Vec<ExportJob>> {
        debug!(?criteria, "Getting jobs that match criteria");
        let jobs: Option<Vec<ExportJob>> = self.http.post_json("/jobs/find", criteria).await?;
        Ok(jobs.unwrap_or_default())
    }

    async fn get_job(&self, job_id: &str) -> ExportResult<ExportJob> {
        let job: Option<ExportJob> = self
            .http
            .get_json::<ExportJob, ()>(&format!("/jobs/{}", job_id), None)
            .await?;
        job.ok_or_else(|| {
            export_common::ExportError::Collaborator(format!("Job {} returned no body", job_id))
        })
    }

    async fn update_job(&self, job_id: &str, update: &JobUpdate) -> ExportResult<()> {
        self.http.put_json(&format!("/jobs/{}", job_id), update).await
    }

    async fn create_job(&self, body: &CreateJobRequest) -> ExportResult<CreatedJob> {
        self.http.post_json("/jobs", body).await
    }
}
