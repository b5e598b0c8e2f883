//! Error types for Agrindex

use std::fmt;
use thiserror::Error;

/// Why a workflow start call was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowStartErrorKind {
    /// Another execution already holds the identity
    Collision,
    /// The workflow service refused because of an execution quota
    LimitExceeded,
    /// Any other rejection
    Other(String),
}

impl fmt::Display for WorkflowStartErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowStartErrorKind::Collision => write!(f, "execution identity already in use"),
            WorkflowStartErrorKind::LimitExceeded => write!(f, "execution limit exceeded"),
            WorkflowStartErrorKind::Other(reason) => write!(f, "{}", reason),
        }
    }
}

#[derive(Debug, Error)]
pub enum AgrindexError {
    // Trigger and geometry errors
    #[error("Malformed trigger event: {reason}")]
    MalformedTrigger { reason: String },

    #[error("Malformed field geometry: {reason}")]
    MalformedGeometry { reason: String },

    #[error("Projection to {target} failed: {reason}")]
    ProjectionError { target: String, reason: String },

    // Catalog errors
    #[error("Catalog query failed: {reason}")]
    CatalogError { reason: String },

    // Band and raster errors
    #[error("Failed to fetch band '{band}' from {location}: {reason}")]
    BandFetchError {
        band: String,
        location: String,
        reason: String,
    },

    #[error("Field does not intersect band '{band}'")]
    EmptyClipError { band: String },

    #[error("Raster decode failed: {reason}")]
    RasterDecode { reason: String },

    #[error("Shape mismatch for {index}: band A is {a:?}, band B is {b:?}")]
    ShapeMismatch {
        index: String,
        a: (usize, usize),
        b: (usize, usize),
    },

    #[error("Grid mismatch for {index}: band A is {a}, band B is {b}")]
    GridMismatch { index: String, a: String, b: String },

    // Materialization errors
    #[error("Failed to write raster for {key}: {reason}")]
    WriteError { key: String, reason: String },

    #[error("Failed to upload {key}: {reason}")]
    UploadError { key: String, reason: String },

    #[error("Failed to read s3://{bucket}/{key}: {reason}")]
    StorageReadError {
        bucket: String,
        key: String,
        reason: String,
    },

    /// Wraps a failure of one configured index with enough context to diagnose it
    #[error("Index {index} failed{}: {source} (already uploaded: {uploaded:?})", band_suffix(.band))]
    IndexFailed {
        index: String,
        band: Option<String>,
        uploaded: Vec<String>,
        #[source]
        source: Box<AgrindexError>,
    },

    #[error("Notification failed: {reason}")]
    NotificationError { reason: String },

    // Orchestration errors
    #[error("Probing workflow identity {execution_id} failed: {reason}")]
    WorkflowProbeError { execution_id: String, reason: String },

    #[error("No free execution identity for {base} after {attempts} probes")]
    ExecutionIdentityExhausted { base: String, attempts: u32 },

    #[error("Starting workflow {execution_id} failed: {kind}")]
    WorkflowStartError {
        execution_id: String,
        kind: WorkflowStartErrorKind,
    },

    // Configuration errors
    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

fn band_suffix(band: &Option<String>) -> String {
    band.as_ref().map(|b| format!(" on band {}", b)).unwrap_or_default()
}

impl AgrindexError {
    /// Whether a caller may retry the whole run after this error
    pub fn is_retryable(&self) -> bool {
        match self {
            AgrindexError::BandFetchError { .. }
            | AgrindexError::CatalogError { .. }
            | AgrindexError::StorageReadError { .. }
            | AgrindexError::UploadError { .. } => true,
            AgrindexError::IndexFailed { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Band named by this error, if any
    pub fn band(&self) -> Option<&str> {
        match self {
            AgrindexError::BandFetchError { band, .. } | AgrindexError::EmptyClipError { band } => {
                Some(band)
            }
            AgrindexError::IndexFailed { band, source, .. } => {
                band.as_deref().or_else(|| source.band())
            }
            _ => None,
        }
    }
}

impl From<serde_json::Error> for AgrindexError {
    fn from(err: serde_json::Error) -> Self {
        AgrindexError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AgrindexError>;
