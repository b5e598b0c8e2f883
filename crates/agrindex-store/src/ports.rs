use agrindex_core::error::Result;
use agrindex_core::models::{BandAsset, CatalogQuery, SceneMatch, WorkflowPayload};
use async_trait::async_trait;
use bytes::Bytes;

/// Port for the scene catalog search service
#[async_trait]
pub trait SceneCatalog: Send + Sync {
    /// Return the best-matching scene, or `None` when the window has no match
    async fn search(&self, query: &CatalogQuery) -> Result<Option<SceneMatch>>;
}

/// Port for blob storage of trigger documents and index rasters
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Read a whole object. Failures surface as `StorageReadError`.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes>;

    /// Write a whole object. Failures surface as `UploadError`.
    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<()>;
}

/// Port for retrieving full-scene band rasters
#[async_trait]
pub trait BandSource: Send + Sync {
    /// Fetch the encoded band. Failures surface as `BandFetchError`.
    async fn fetch(&self, band: &str, asset: &BandAsset) -> Result<Bytes>;
}

/// Port for fire-and-forget human notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subject: &str, message: &str) -> Result<()>;
}

/// Result of probing the workflow service for an execution identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    Exists,
    NotFound,
}

/// Port for the durable workflow service
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    /// Probe an identity. Any failure other than "does not exist" is a
    /// `WorkflowProbeError`.
    async fn describe(&self, execution_id: &str) -> Result<ExecutionStatus>;

    /// Start an execution. Rejections surface as `WorkflowStartError` with
    /// the kind classified as collision, limit or other.
    async fn start(&self, execution_id: &str, payload: &WorkflowPayload) -> Result<()>;
}
