//! In-memory collaborator fakes and request fixtures shared by the
//! component tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use export_api::config::ServiceConfig;
use export_api::ExportService;
use export_clients::{
    AdditionalParams, CallbackExportData, CallbackTarget, Catalog, CleanupDataParams,
    CreateJobRequest, CreatedJob, DiskProbe, ExportInputParams, ExportJob, ExportJobParameters,
    JobCriteria, JobQuery, JobStore, JobTask, JobUpdate, LinksDefinition, OperationStatus,
    StorageStatus,
};
use export_common::{
    CrsCode, ExportError, ExportResult, Feature, FeatureCollection, FeatureProperties, Geometry,
    LayerMetadata, TileFormatStrategy, TileOutputFormat,
};

pub const DB_ID: &str = "8b867544-2dab-43a1-be6e-f23ec83c19b4";
pub const RESOURCE_ID: &str = "SOME_NAME";
pub const VERSION: &str = "1.0";

/// In-memory Job Store double recording every write.
#[derive(Default)]
pub struct MockJobStore {
    pub jobs: Mutex<Vec<ExportJob>>,
    pub created: Mutex<Vec<CreateJobRequest>>,
    pub updates: Mutex<Vec<(String, JobUpdate)>>,
    pub find_calls: AtomicU32,
    /// Number of initial Completed-status lookups that report no match,
    /// regardless of stored jobs. Models a job completing between the
    /// detector's two passes.
    pub hide_completed_for: AtomicU32,
    /// When set, every lookup fails with this collaborator error.
    pub fail_lookups_with: Mutex<Option<String>>,
}

impl MockJobStore {
    pub fn with_jobs(jobs: Vec<ExportJob>) -> Self {
        Self {
            jobs: Mutex::new(jobs),
            ..Self::default()
        }
    }

    fn fail_if_configured(&self) -> ExportResult<()> {
        if let Some(message) = self.fail_lookups_with.lock().unwrap().clone() {
            return Err(ExportError::Collaborator(message));
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for MockJobStore {
    async fn find_jobs(&self, query: &JobQuery) -> ExportResult<Vec<ExportJob>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        self.fail_if_configured()?;

        assert_eq!(query.job_type.as_deref(), Some("Export"));
        assert_eq!(query.is_cleaned, Some(false));

        if query.status == Some(OperationStatus::Completed)
            && self
                .hide_completed_for
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            return Ok(Vec::new());
        }

        let jobs = self.jobs.lock().unwrap();
        Ok(jobs
            .iter()
            .filter(|job| {
                query.status.map_or(true, |status| job.status == status)
                    && query
                        .resource_id
                        .as_ref()
                        .map_or(true, |id| &job.resource_id == id)
                    && query.version.as_ref().map_or(true, |v| &job.version == v)
            })
            .cloned()
            .collect())
    }

    async fn find_jobs_by_criteria(&self, criteria: &JobCriteria) -> ExportResult<Vec<ExportJob>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        self.fail_if_configured()?;

        let jobs = self.jobs.lock().unwrap();
        Ok(jobs
            .iter()
            .filter(|job| criteria.statuses.contains(&job.status))
            .cloned()
            .collect())
    }

    async fn get_job(&self, job_id: &str) -> ExportResult<ExportJob> {
        self.fail_if_configured()?;
        let jobs = self.jobs.lock().unwrap();
        jobs.iter()
            .find(|job| job.id == job_id)
            .cloned()
            .ok_or_else(|| ExportError::Collaborator(format!("Job {} not found", job_id)))
    }

    async fn update_job(&self, job_id: &str, update: &JobUpdate) -> ExportResult<()> {
        self.fail_if_configured()?;
        {
            let mut jobs = self.jobs.lock().unwrap();
            if let Some(job) = jobs.iter_mut().find(|job| job.id == job_id) {
                job.parameters = update.parameters.clone();
            }
        }
        self.updates
            .lock()
            .unwrap()
            .push((job_id.to_string(), update.clone()));
        Ok(())
    }

    async fn create_job(&self, body: &CreateJobRequest) -> ExportResult<CreatedJob> {
        self.fail_if_configured()?;
        self.created.lock().unwrap().push(body.clone());
        Ok(CreatedJob {
            id: "ef1a76e2-3a4b-49e6-90ee-e97c402dd3d8".to_string(),
            task_ids: vec!["0dece32e-b04e-41cb-b133-f4d1a7e960a4".to_string()],
        })
    }
}

/// Catalog double resolving a single configured layer.
pub struct MockCatalog {
    pub layer: Option<LayerMetadata>,
}

#[async_trait]
impl Catalog for MockCatalog {
    async fn find_layer_by_internal_id(&self, id: &str) -> ExportResult<LayerMetadata> {
        self.layer
            .clone()
            .ok_or_else(|| ExportError::LayerNotFound(id.to_string()))
    }
}

/// Disk probe double reporting fixed capacity.
pub struct MockDiskProbe {
    pub free: u64,
    pub size: u64,
}

#[async_trait]
impl DiskProbe for MockDiskProbe {
    async fn free_and_total(&self, _path: &Path) -> ExportResult<StorageStatus> {
        Ok(StorageStatus {
            free: self.free,
            size: self.size,
        })
    }
}

pub fn square_polygon(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Geometry {
    Geometry::Polygon {
        coordinates: vec![vec![
            [min_x, min_y],
            [max_x, min_y],
            [max_x, max_y],
            [min_x, max_y],
            [min_x, min_y],
        ]],
    }
}

/// The test layer: a small orthophoto footprint published at zoom 0.
pub fn layer_metadata() -> LayerMetadata {
    LayerMetadata {
        id: DB_ID.to_string(),
        product_id: RESOURCE_ID.to_string(),
        product_version: VERSION.to_string(),
        product_type: "Orthophoto".to_string(),
        max_resolution_deg: 0.703125,
        footprint: square_polygon(34.85, 32.29, 34.87, 32.31),
        tile_output_format: TileOutputFormat::Png,
    }
}

/// A request region inside the layer footprint.
pub fn request_roi() -> FeatureCollection {
    FeatureCollection::of(Feature::new(
        square_polygon(34.855, 32.295, 34.865, 32.305),
        Some(FeatureProperties::with_max_resolution(0.703125)),
    ))
}

/// A region far away from the layer footprint.
pub fn distant_roi() -> FeatureCollection {
    FeatureCollection::of(Feature::new(
        square_polygon(10.0, 10.0, 11.0, 11.0),
        Some(FeatureProperties::with_max_resolution(0.703125)),
    ))
}

pub fn job_parameters(roi: FeatureCollection) -> ExportJobParameters {
    ExportJobParameters {
        export_input_params: ExportInputParams {
            crs: CrsCode::Epsg4326,
            roi,
            callback_urls: Some(vec![
                CallbackTarget {
                    url: "http://example.getmap.com/callback".to_string(),
                    roi: None,
                },
                CallbackTarget {
                    url: "http://example.getmap.com/callback2".to_string(),
                    roi: None,
                },
            ]),
        },
        additional_params: AdditionalParams {
            file_names_templates: LinksDefinition {
                data_uri: "Orthophoto_SOME_NAME_1_0_0_2025_01_02T12_00_02_621Z.gpkg".to_string(),
                metadata_uri: "Orthophoto_SOME_NAME_1_0_0_2025_01_02T12_00_02_621Z.json"
                    .to_string(),
            },
            relative_directory_path: "63baedae-cb5b-4c0a-a7db-8eb6b9105cb7".to_string(),
            package_relative_path:
                "63baedae-cb5b-4c0a-a7db-8eb6b9105cb7/Orthophoto_SOME_NAME_1_0_0.gpkg".to_string(),
            target_format: Some(TileOutputFormat::Png),
            output_format_strategy: Some(TileFormatStrategy::Mixed),
            gpkg_estimated_size: 11111,
        },
        cleanup_data_params: None,
        callback_params: None,
    }
}

/// A completed job covering `roi`, kept until far in the future.
pub fn completed_job(roi: FeatureCollection) -> ExportJob {
    let mut parameters = job_parameters(roi.clone());
    parameters.cleanup_data_params = Some(CleanupDataParams {
        directory_path: Some("63baedae-cb5b-4c0a-a7db-8eb6b9105cb7".to_string()),
        cleanup_expiration_time_utc: Some(Utc.with_ymd_and_hms(2099, 2, 1, 12, 28, 50).unwrap()),
    });
    parameters.callback_params = Some(CallbackExportData {
        job_id: Some("8eddc842-64ee-4e90-b3a5-b10d9e86acb2".to_string()),
        record_catalog_id: Some(DB_ID.to_string()),
        links: Some(LinksDefinition {
            data_uri: "https://downloads/63baedae/Orthophoto_SOME_NAME_1_0_0.gpkg".to_string(),
            metadata_uri: "https://downloads/63baedae/Orthophoto_SOME_NAME_1_0_0.json".to_string(),
        }),
        expiration_time: None,
        file_size: Some(77824),
        status: Some(OperationStatus::Completed),
        extra: serde_json::Map::new(),
    });

    ExportJob {
        id: "8eddc842-64ee-4e90-b3a5-b10d9e86acb2".to_string(),
        resource_id: RESOURCE_ID.to_string(),
        version: VERSION.to_string(),
        internal_id: Some(DB_ID.to_string()),
        status: OperationStatus::Completed,
        percentage: Some(100.0),
        parameters,
        tasks: None,
    }
}

/// An in-flight job covering `roi`.
pub fn in_progress_job(roi: FeatureCollection) -> ExportJob {
    ExportJob {
        id: "70c29b11-1bfd-4e43-a76a-ca3ab5d7b511".to_string(),
        resource_id: RESOURCE_ID.to_string(),
        version: VERSION.to_string(),
        internal_id: Some(DB_ID.to_string()),
        status: OperationStatus::InProgress,
        percentage: Some(4.0),
        parameters: job_parameters(roi),
        tasks: Some(vec![JobTask {
            id: "127610c6-b4ed-4fda-ab02-95356cb34801".to_string(),
            task_type: "init".to_string(),
            status: Some(OperationStatus::Pending),
        }]),
    }
}

/// Wire an [`ExportService`] over the fakes with plenty of disk.
pub fn service(store: Arc<MockJobStore>, catalog: MockCatalog) -> ExportService {
    service_with_disk(store, catalog, 1_000_000_000)
}

pub fn service_with_disk(
    store: Arc<MockJobStore>,
    catalog: MockCatalog,
    free_bytes: u64,
) -> ExportService {
    ExportService::new(
        ServiceConfig::default(),
        store,
        Arc::new(catalog),
        Arc::new(MockDiskProbe {
            free: free_bytes,
            size: 2_000_000_000,
        }),
    )
}
