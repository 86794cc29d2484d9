//! Error types for the raster export service.

use thiserror::Error;

/// Result type alias using ExportError.
pub type ExportResult<T> = Result<T, ExportError>;

/// Primary error type for export admission operations.
#[derive(Debug, Error)]
pub enum ExportError {
    // === Request validation errors ===
    #[error("Layer not found: {0}")]
    LayerNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid zoom: {0}")]
    InvalidZoom(String),

    #[error("Requested geometry has no intersection with requested layer: {0}")]
    NoIntersection(String),

    // === Admission errors ===
    #[error("Insufficient storage: {0}")]
    InsufficientStorage(String),

    // === Collaborator errors ===
    #[error("Collaborator error: {0}")]
    Collaborator(String),
}

impl ExportError {
    /// Get the HTTP status code the boundary layer should surface for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            ExportError::InvalidRequest(_)
            | ExportError::InvalidZoom(_)
            | ExportError::NoIntersection(_) => 400,

            ExportError::LayerNotFound(_) => 404,

            ExportError::InsufficientStorage(_) => 507,

            ExportError::Collaborator(_) => 500,
        }
    }
}

// Conversion from common error types
impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        ExportError::Collaborator(err.to_string())
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        ExportError::Collaborator(format!("JSON error: {}", err))
    }
}
