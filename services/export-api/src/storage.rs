//! Archive size estimation and storage admission control.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info_span, Instrument};

use export_clients::{DiskProbe, JobCriteria, JobStore, OperationStatus, StorageStatus};
use export_common::grid::bbox_to_tile_range;
use export_common::{ExportError, ExportResult, TileOutputFormat};

use crate::config::StorageEstimationConfig;
use crate::roi::GeometryRecord;

/// Estimate the output archive size in bytes for a set of validated records.
///
/// Counts the tiles of every record's sanitized box across its full zoom
/// band and applies the per-tile constant of the output format.
pub fn estimate_gpkg_size(
    records: &[GeometryRecord],
    format: TileOutputFormat,
    estimation: &StorageEstimationConfig,
) -> u64 {
    let tile_estimated_size = match format {
        TileOutputFormat::Jpeg => estimation.jpeg_tile_estimated_size_bytes,
        TileOutputFormat::Png => estimation.png_tile_estimated_size_bytes,
    };
    debug!(?format, tile_estimated_size, "Per-tile size estimate");

    let mut total_tiles = 0u64;
    for record in records {
        let Some(bbox) = record.sanitized_box else {
            continue;
        };
        for zoom in record.min_zoom_level..=record.zoom_level {
            total_tiles += bbox_to_tile_range(&bbox, zoom).tile_count();
        }
    }

    total_tiles * tile_estimated_size
}

/// Storage admission control over the disk probe and the Job Store.
pub struct StorageGate {
    job_store: Arc<dyn JobStore>,
    disk: Arc<dyn DiskProbe>,
    estimation: StorageEstimationConfig,
    export_job_type: String,
}

impl StorageGate {
    pub fn new(
        job_store: Arc<dyn JobStore>,
        disk: Arc<dyn DiskProbe>,
        estimation: StorageEstimationConfig,
        export_job_type: impl Into<String>,
    ) -> Self {
        Self {
            job_store,
            disk,
            estimation,
            export_job_type: export_job_type.into(),
        }
    }

    /// Free and total capacity of the archive output location.
    pub async fn storage_status(&self, location: &Path) -> ExportResult<StorageStatus> {
        let status = self.disk.free_and_total(location).await?;
        debug!(
            free = status.free,
            size = status.size,
            "Current storage for archive location"
        );
        Ok(status)
    }

    /// Admit or reject an estimated archive size against the free capacity
    /// left once running jobs' outstanding estimates are reserved.
    pub async fn validate_free_space(
        &self,
        estimated_size: u64,
        location: &Path,
    ) -> ExportResult<()> {
        let span = info_span!("validate_free_space", estimated_size);
        self.validate_free_space_inner(estimated_size, location)
            .instrument(span)
            .await
    }

    async fn validate_free_space_inner(
        &self,
        estimated_size: u64,
        location: &Path,
    ) -> ExportResult<()> {
        let free_space = self.free_storage(location).await?;
        debug!(
            estimated_size,
            free_space, "Estimated archive size against adjusted free space"
        );

        if free_space - (estimated_size as f64) < 0.0 {
            error!(
                estimated_size,
                free_space, "Not enough free disk space to execute export"
            );
            return Err(ExportError::InsufficientStorage(
                "There isn't enough free disk space to execute the export".to_string(),
            ));
        }
        Ok(())
    }

    /// Free space at the location minus the buffered outstanding estimates
    /// of all currently running export jobs.
    ///
    /// A job reporting a completion percentage is assumed to still need the
    /// unfinished share of its estimate.
    async fn free_storage(&self, location: &Path) -> ExportResult<f64> {
        let status = self.disk.free_and_total(location).await?;

        let running = self
            .job_store
            .find_jobs_by_criteria(&JobCriteria {
                is_cleaned: false,
                types: vec![self.export_job_type.clone()],
                should_return_tasks: false,
                statuses: vec![OperationStatus::InProgress, OperationStatus::Pending],
            })
            .await?;

        let mut outstanding = 0.0;
        for job in &running {
            let mut remaining = job.parameters.additional_params.gpkg_estimated_size as f64;
            if let Some(percentage) = job.percentage {
                remaining *= 1.0 - percentage / 100.0;
            }
            outstanding += remaining;
        }

        Ok(status.free as f64 - outstanding * self.estimation.storage_factor_buffer)
    }
}
