//! Export request deduplication against the Job Store.
//!
//! Classifies a request as Completed (a finished job already covers it),
//! Processing (an in-flight job covers it) or Novel. Lookups race against
//! the worker advancing jobs; the detector compensates by re-checking for
//! completion once after a Processing hit rather than by locking. It does
//! not prevent two concurrent Novel requests from both creating a job.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, info_span, Instrument};

use export_clients::{
    CallbackExportData, CallbackTarget, CleanupDataParams, ExportJob, JobQuery, JobStore,
    JobUpdate, OperationStatus,
};
use export_common::{CrsCode, ExportResult, FeatureCollection};

use crate::config::RoiSimilarityConfig;
use crate::geometry::is_similar_roi;

/// Identity of a logical export request, independent of callback targets.
#[derive(Debug, Clone)]
pub struct DuplicationKey {
    pub resource_id: String,
    pub version: String,
    pub db_id: String,
    pub crs: CrsCode,
    pub roi: FeatureCollection,
}

/// A matched in-flight job.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingJob {
    pub job_id: String,
    pub task_ids: Vec<String>,
    pub status: OperationStatus,
}

/// Terminal classification of a request.
#[derive(Debug, Clone, PartialEq)]
pub enum DuplicateOutcome {
    /// A completed job covers the request; its callback payload is reusable.
    Completed(CallbackExportData),
    /// An in-flight job covers the request.
    Processing(ProcessingJob),
    /// No matching job exists.
    Novel,
}

/// Duplicate detection over the Job Store.
pub struct DuplicateDetector {
    job_store: Arc<dyn JobStore>,
    similarity: RoiSimilarityConfig,
    export_job_type: String,
    cleanup_expiration_days: i64,
}

impl DuplicateDetector {
    pub fn new(
        job_store: Arc<dyn JobStore>,
        similarity: RoiSimilarityConfig,
        export_job_type: impl Into<String>,
        cleanup_expiration_days: i64,
    ) -> Self {
        Self {
            job_store,
            similarity,
            export_job_type: export_job_type.into(),
            cleanup_expiration_days,
        }
    }

    /// Classify a request against existing jobs.
    ///
    /// New callback targets are merged into a matched in-flight job before
    /// it is returned.
    pub async fn check(
        &self,
        key: &DuplicationKey,
        new_callbacks: Option<&[CallbackTarget]>,
    ) -> ExportResult<DuplicateOutcome> {
        let span = info_span!(
            "check_for_export_duplicate",
            resource_id = %key.resource_id,
            version = %key.version,
            db_id = %key.db_id,
        );
        self.check_inner(key, new_callbacks).instrument(span).await
    }

    async fn check_inner(
        &self,
        key: &DuplicationKey,
        new_callbacks: Option<&[CallbackTarget]>,
    ) -> ExportResult<DuplicateOutcome> {
        if let Some(completed) = self.check_completed(key).await? {
            return Ok(DuplicateOutcome::Completed(completed));
        }

        if let Some(processing) = self.check_processing(key, new_callbacks).await? {
            // The matched job may have completed between the two lookups.
            if let Some(completed) = self.check_completed(key).await? {
                return Ok(DuplicateOutcome::Completed(completed));
            }
            return Ok(DuplicateOutcome::Processing(processing));
        }

        Ok(DuplicateOutcome::Novel)
    }

    async fn check_completed(
        &self,
        key: &DuplicationKey,
    ) -> ExportResult<Option<CallbackExportData>> {
        info!("Checking for completed export duplicates");
        let job = self
            .find_export_job(OperationStatus::Completed, key, false)
            .await?;
        let Some(job) = job else {
            return Ok(None);
        };

        self.validate_and_update_expiration(&job.id).await?;

        let mut callback = job.parameters.callback_params.unwrap_or_default();
        callback.status = Some(OperationStatus::Completed);
        Ok(Some(callback))
    }

    async fn check_processing(
        &self,
        key: &DuplicationKey,
        new_callbacks: Option<&[CallbackTarget]>,
    ) -> ExportResult<Option<ProcessingJob>> {
        info!("Checking for processing export duplicates");
        let job = match self
            .find_export_job(OperationStatus::InProgress, key, true)
            .await?
        {
            Some(job) => Some(job),
            None => {
                self.find_export_job(OperationStatus::Pending, key, true)
                    .await?
            }
        };
        let Some(job) = job else {
            return Ok(None);
        };

        self.merge_callback_targets(&job, new_callbacks).await?;

        let status = if job.status == OperationStatus::Pending {
            OperationStatus::Pending
        } else {
            OperationStatus::InProgress
        };
        Ok(Some(ProcessingJob {
            job_id: job.id.clone(),
            task_ids: job.task_ids(),
            status,
        }))
    }

    async fn find_export_job(
        &self,
        status: OperationStatus,
        key: &DuplicationKey,
        with_tasks: bool,
    ) -> ExportResult<Option<ExportJob>> {
        let query = JobQuery {
            resource_id: Some(key.resource_id.clone()),
            version: Some(key.version.clone()),
            is_cleaned: Some(false),
            job_type: Some(self.export_job_type.clone()),
            should_return_tasks: Some(with_tasks),
            status: Some(status),
        };
        let jobs = self.job_store.find_jobs(&query).await?;
        Ok(jobs.into_iter().find(|job| self.matches(job, key)))
    }

    /// A job covers the request when its identity fields match and its
    /// stored region is similar to the requested one.
    fn matches(&self, job: &ExportJob, key: &DuplicationKey) -> bool {
        job.internal_id.as_deref() == Some(key.db_id.as_str())
            && job.version == key.version
            && job.parameters.export_input_params.crs == key.crs
            && is_similar_roi(
                &job.parameters.export_input_params.roi,
                &key.roi,
                &self.similarity,
            )
    }

    /// Push a reused job's cleanup expiration out to the full retention
    /// window, unless the stored expiration is already later.
    async fn validate_and_update_expiration(&self, job_id: &str) -> ExportResult<()> {
        let job = self.job_store.get_job(job_id).await?;
        let new_expiration = Utc::now() + Duration::days(self.cleanup_expiration_days);
        let stored = job
            .parameters
            .cleanup_data_params
            .as_ref()
            .and_then(|c| c.cleanup_expiration_time_utc);

        match stored {
            Some(old_expiration) if old_expiration >= new_expiration => {
                info!(
                    job_id,
                    %old_expiration,
                    %new_expiration,
                    "Keeping stored expiration date, it is later than the new one"
                );
                Ok(())
            }
            _ => {
                info!(job_id, %new_expiration, "Updating expiration date");
                let mut parameters = job.parameters.clone();
                parameters.cleanup_data_params = Some(CleanupDataParams {
                    directory_path: job
                        .parameters
                        .cleanup_data_params
                        .as_ref()
                        .and_then(|c| c.directory_path.clone()),
                    cleanup_expiration_time_utc: Some(new_expiration),
                });
                self.job_store
                    .update_job(job_id, &JobUpdate { parameters })
                    .await
            }
        }
    }

    /// Merge newly supplied callback targets into a job's stored target
    /// list, deduplicated by the `(url, roi)` pair.
    async fn merge_callback_targets(
        &self,
        job: &ExportJob,
        new_callbacks: Option<&[CallbackTarget]>,
    ) -> ExportResult<()> {
        let Some(new_callbacks) = new_callbacks else {
            return Ok(());
        };
        if new_callbacks.is_empty() {
            return Ok(());
        }

        let mut parameters = job.parameters.clone();
        let targets = parameters
            .export_input_params
            .callback_urls
            .get_or_insert_with(Vec::new);
        for callback in new_callbacks {
            if !targets.iter().any(|existing| existing.same_target(callback)) {
                targets.push(callback.clone());
            }
        }

        self.job_store
            .update_job(&job.id, &JobUpdate { parameters })
            .await
    }
}
