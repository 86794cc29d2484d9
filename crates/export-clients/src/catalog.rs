//! Raster catalog client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use export_common::{ExportError, ExportResult, LayerMetadata};

use crate::http::HttpCaller;

/// A catalog record wrapping layer metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerRecord {
    pub metadata: LayerMetadata,
}

#[derive(Debug, Serialize)]
struct FindLayerBody<'a> {
    id: &'a str,
}

/// The Catalog collaborator interface.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Resolve a layer's metadata by its catalog record id.
    async fn find_layer_by_internal_id(&self, id: &str) -> ExportResult<LayerMetadata>;
}

/// HTTP implementation of [`Catalog`].
#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: HttpCaller,
}

impl CatalogClient {
    pub fn new(http: HttpCaller) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Catalog for CatalogClient {
    async fn find_layer_by_internal_id(&self, id: &str) -> ExportResult<LayerMetadata> {
        info!(layer_id = %id, "Retrieving catalog record");

        let records: Vec<LayerRecord> = self
            .http
            .post_json("/records/find", &FindLayerBody { id })
            .await?;

        let record = records
            .into_iter()
            .next()
            .ok_or_else(|| ExportError::LayerNotFound(id.to_string()))?;

        debug!(layer_id = %id, product_id = %record.metadata.product_id, "Retrieved layer");
        Ok(record.metadata)
    }
}
