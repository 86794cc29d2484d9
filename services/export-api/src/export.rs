//! Export orchestration: request validation, deduplication, admission and
//! job submission.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use export_clients::{
    AdditionalParams, CallbackExportData, CallbackTarget, Catalog, CatalogClient, CreateJobRequest,
    CreateJobTask, DiskProbe, ExportInputParams, ExportJobParameters, HttpCaller, JobStore,
    JobStoreClient, LinksDefinition, OperationStatus, StatvfsProbe, TaskParameters,
};
use export_common::grid::degrees_per_pixel_to_zoom_level;
use export_common::{
    CrsCode, ExportError, ExportResult, Feature, FeatureCollection, FeatureProperties,
    TileFormatStrategy,
};

use crate::config::ServiceConfig;
use crate::dedup::{DuplicateDetector, DuplicateOutcome, DuplicationKey};
use crate::roi::{parse_feature_collection, GeometryRecord};
use crate::storage::{estimate_gpkg_size, StorageGate};
use crate::validation::validate_features;

/// An inbound export request, as the boundary layer hands it over.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExportRequest {
    pub db_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roi: Option<FeatureCollection>,
    #[serde(rename = "callbackURLs", skip_serializing_if = "Option::is_none")]
    pub callback_urls: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Job handle returned for created or in-flight exports.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateExportJobResponse {
    pub job_id: String,
    pub task_ids: Vec<String>,
    pub status: OperationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_duplicated: Option<bool>,
}

/// Outcome of an export request.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ExportResponse {
    /// A completed job already covers the request; its callback payload is
    /// returned as-is.
    Completed(CallbackExportData),
    /// A job handle: newly created (Pending) or an attached in-flight job.
    Job(CreateExportJobResponse),
}

/// The export admission engine.
pub struct ExportService {
    config: ServiceConfig,
    job_store: Arc<dyn JobStore>,
    catalog: Arc<dyn Catalog>,
    detector: DuplicateDetector,
    storage: StorageGate,
}

impl ExportService {
    /// Wire the engine over explicit collaborator implementations.
    pub fn new(
        config: ServiceConfig,
        job_store: Arc<dyn JobStore>,
        catalog: Arc<dyn Catalog>,
        disk: Arc<dyn DiskProbe>,
    ) -> Self {
        let detector = DuplicateDetector::new(
            job_store.clone(),
            config.roi_similarity,
            config.job_definitions.export_job_type.clone(),
            config.cleanup_expiration_days,
        );
        let storage = StorageGate::new(
            job_store.clone(),
            disk,
            config.storage_estimation.clone(),
            config.job_definitions.export_job_type.clone(),
        );
        Self {
            config,
            job_store,
            catalog,
            detector,
            storage,
        }
    }

    /// Wire the engine over the production HTTP collaborators.
    pub fn from_config(config: ServiceConfig) -> ExportResult<Self> {
        let retry = (&config.external_clients.http_retry).into();
        let timeout = config.external_clients.request_timeout();

        let job_store = JobStoreClient::new(HttpCaller::new(
            config.external_clients.job_manager_url.clone(),
            retry,
            timeout,
        )?);
        let retry = (&config.external_clients.http_retry).into();
        let catalog = CatalogClient::new(HttpCaller::new(
            config.external_clients.raster_catalog_url.clone(),
            retry,
            timeout,
        )?);

        Ok(Self::new(
            config,
            Arc::new(job_store),
            Arc::new(catalog),
            Arc::new(StatvfsProbe),
        ))
    }

    /// Handle an export request: reuse a completed result, attach to an
    /// in-flight job, or admit and create a new one.
    pub async fn create_export(
        &self,
        request: CreateExportRequest,
    ) -> ExportResult<ExportResponse> {
        let span = info_span!("create_export", db_id = %request.db_id);
        self.create_export_inner(request).instrument(span).await
    }

    async fn create_export_inner(
        &self,
        request: CreateExportRequest,
    ) -> ExportResult<ExportResponse> {
        let crs = match request.crs.as_deref() {
            None => CrsCode::Epsg4326,
            Some(s) => {
                CrsCode::parse(s).map_err(|e| ExportError::InvalidRequest(e.to_string()))?
            }
        };
        if !crs.is_geographic() {
            return Err(ExportError::InvalidRequest(format!(
                "Unsupported CRS {}, exports are only supported in EPSG:4326",
                crs
            )));
        }

        let layer = self
            .catalog
            .find_layer_by_internal_id(&request.db_id)
            .await?;

        let roi = match request.roi.clone() {
            Some(roi) => roi,
            None => {
                info!(
                    catalog_id = %request.db_id,
                    product_id = %layer.product_id,
                    product_version = %layer.product_version,
                    "ROI not provided, using the layer's own footprint"
                );
                FeatureCollection::of(Feature::new(
                    layer.footprint.clone(),
                    Some(FeatureProperties::with_max_resolution(
                        layer.max_resolution_deg,
                    )),
                ))
            }
        };

        let max_zoom = degrees_per_pixel_to_zoom_level(layer.max_resolution_deg).map_err(|e| {
            ExportError::Collaborator(format!(
                "Layer {} has an invalid native resolution: {}",
                request.db_id, e
            ))
        })?;

        let mut records = parse_feature_collection(&roi)?;
        if records.is_empty() {
            return Err(ExportError::InvalidRequest(
                "ROI contains no exportable features".to_string(),
            ));
        }
        validate_features(
            &mut records,
            &layer.footprint,
            max_zoom,
            layer.max_resolution_deg,
        )?;

        let callbacks: Option<Vec<CallbackTarget>> = request.callback_urls.as_ref().map(|urls| {
            urls.iter()
                .map(|url| CallbackTarget {
                    url: url.clone(),
                    roi: Some(roi.clone()),
                })
                .collect()
        });

        let key = DuplicationKey {
            resource_id: layer.product_id.clone(),
            version: layer.product_version.clone(),
            db_id: request.db_id.clone(),
            crs,
            roi: roi.clone(),
        };
        match self.detector.check(&key, callbacks.as_deref()).await? {
            DuplicateOutcome::Completed(callback) => {
                info!(
                    job_id = callback.job_id.as_deref().unwrap_or_default(),
                    "Found relevant completed result for export request"
                );
                return Ok(ExportResponse::Completed(callback));
            }
            DuplicateOutcome::Processing(processing) => {
                info!(
                    job_id = %processing.job_id,
                    status = %processing.status,
                    "Found relevant in-flight job for export request"
                );
                return Ok(ExportResponse::Job(CreateExportJobResponse {
                    job_id: processing.job_id,
                    task_ids: processing.task_ids,
                    status: processing.status,
                    is_duplicated: Some(true),
                }));
            }
            DuplicateOutcome::Novel => {}
        }

        let estimated_size =
            estimate_gpkg_size(&records, layer.tile_output_format, &self.config.storage_estimation);
        self.storage
            .validate_free_space(estimated_size, &self.config.gpkgs_location)
            .await?;

        let prefix = generate_export_file_names(
            &layer.product_type,
            &layer.product_id,
            &layer.product_version,
            &records,
            Utc::now(),
        );
        let package_name = format!("{}.gpkg", prefix);
        let metadata_name = format!("{}.json", prefix);
        let directory_key = Uuid::new_v4().simple().to_string();
        let separator = self.config.tiles_provider.separator();
        let package_relative_path = format!("{}{}{}", directory_key, separator, package_name);

        let body = CreateJobRequest {
            resource_id: layer.product_id.clone(),
            version: layer.product_version.clone(),
            job_type: self.config.job_definitions.export_job_type.clone(),
            domain: self.config.domain.clone(),
            parameters: ExportJobParameters {
                export_input_params: ExportInputParams {
                    crs,
                    roi,
                    callback_urls: callbacks,
                },
                additional_params: AdditionalParams {
                    file_names_templates: LinksDefinition {
                        data_uri: package_name,
                        metadata_uri: metadata_name,
                    },
                    relative_directory_path: directory_key.clone(),
                    package_relative_path,
                    target_format: Some(layer.tile_output_format),
                    output_format_strategy: Some(TileFormatStrategy::Mixed),
                    gpkg_estimated_size: estimated_size,
                },
                cleanup_data_params: None,
                callback_params: None,
            },
            internal_id: request.db_id.clone(),
            product_type: layer.product_type.clone(),
            product_name: layer.product_id.clone(),
            priority: request.priority.unwrap_or(self.config.default_priority),
            description: request.description.clone(),
            status: OperationStatus::Pending,
            percentage: 0,
            additional_identifiers: directory_key,
            tasks: vec![CreateJobTask {
                task_type: self.config.job_definitions.init_task_type.clone(),
                parameters: TaskParameters {
                    block_duplication: true,
                },
            }],
        };

        let created = self.job_store.create_job(&body).await?;
        info!(job_id = %created.id, "Created export job");
        Ok(ExportResponse::Job(CreateExportJobResponse {
            job_id: created.id,
            task_ids: created.task_ids,
            status: OperationStatus::Pending,
            is_duplicated: None,
        }))
    }
}

/// Build the deterministic output file name prefix:
/// product type, id, version, the finest requested zoom, and a timestamp
/// with `-`, `.` and `:` folded to underscores.
pub fn generate_export_file_names(
    product_type: &str,
    product_id: &str,
    product_version: &str,
    records: &[GeometryRecord],
    now: DateTime<Utc>,
) -> String {
    let max_zoom = records.iter().map(|r| r.zoom_level).max().unwrap_or(0);
    let timestamp = now
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace(['-', '.', ':'], "_");
    format!(
        "{}_{}_{}_{}_{}",
        product_type,
        product_id,
        product_version.replace('.', "_"),
        max_zoom,
        timestamp
    )
}
