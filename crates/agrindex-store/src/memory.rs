//! In-memory collaborators for development and testing.
//!
//! Every double records the calls it receives so callers can assert on call
//! counts and payloads. Failures are scripted per key or per call. A poisoned
//! lock is recovered rather than propagated; the recorded state is append-only.

use agrindex_core::error::{AgrindexError, Result, WorkflowStartErrorKind};
use agrindex_core::models::{BandAsset, CatalogQuery, SceneMatch, WorkflowPayload};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::ports::{BandSource, ExecutionStatus, Notifier, ObjectStorage, SceneCatalog, WorkflowEngine};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

/// Catalog that answers every query with the same scene (or none)
#[derive(Debug, Clone, Default)]
pub struct MemorySceneCatalog {
    scene: Arc<RwLock<Option<SceneMatch>>>,
    queries: Arc<RwLock<Vec<CatalogQuery>>>,
    failing: bool,
}

impl MemorySceneCatalog {
    /// A catalog with no matching scene
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_scene(scene: SceneMatch) -> Self {
        let catalog = Self::default();
        *write(&catalog.scene) = Some(scene);
        catalog
    }

    /// A catalog whose every search fails after being recorded
    pub fn failing() -> Self {
        Self { failing: true, ..Self::default() }
    }

    pub fn queries(&self) -> Vec<CatalogQuery> {
        read(&self.queries).clone()
    }
}

#[async_trait]
impl SceneCatalog for MemorySceneCatalog {
    async fn search(&self, query: &CatalogQuery) -> Result<Option<SceneMatch>> {
        write(&self.queries).push(query.clone());
        if self.failing {
            return Err(AgrindexError::CatalogError {
                reason: "scripted catalog failure".to_string(),
            });
        }
        Ok(read(&self.scene).clone())
    }
}

/// Object store keyed by `(bucket, key)`
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStorage {
    objects: Arc<RwLock<HashMap<(String, String), Bytes>>>,
    uploads: Arc<RwLock<Vec<(String, String)>>>,
    failing_keys: Arc<RwLock<HashSet<String>>>,
}

impl MemoryObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without recording an upload
    pub fn insert(&self, bucket: &str, key: &str, body: impl Into<Bytes>) {
        write(&self.objects).insert((bucket.to_string(), key.to_string()), body.into());
    }

    /// Make every `put_object` for `key` fail
    pub fn fail_uploads_for(&self, key: &str) {
        write(&self.failing_keys).insert(key.to_string());
    }

    /// `(bucket, key)` of every successful upload, in call order
    pub fn uploads(&self) -> Vec<(String, String)> {
        read(&self.uploads).clone()
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        read(&self.objects).get(&(bucket.to_string(), key.to_string())).cloned()
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes> {
        self.object(bucket, key).ok_or_else(|| AgrindexError::StorageReadError {
            bucket: bucket.to_string(),
            key: key.to_string(),
            reason: "no such key".to_string(),
        })
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<()> {
        if read(&self.failing_keys).contains(key) {
            return Err(AgrindexError::UploadError {
                key: key.to_string(),
                reason: "scripted upload failure".to_string(),
            });
        }
        self.insert(bucket, key, body);
        write(&self.uploads).push((bucket.to_string(), key.to_string()));
        Ok(())
    }
}

/// Band source serving pre-encoded rasters by href
#[derive(Debug, Clone, Default)]
pub struct MemoryBandSource {
    rasters: Arc<RwLock<HashMap<String, Bytes>>>,
    fetches: Arc<RwLock<Vec<String>>>,
}

impl MemoryBandSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, href: &str, raster: impl Into<Bytes>) {
        write(&self.rasters).insert(href.to_string(), raster.into());
    }

    /// Bands fetched, in call order
    pub fn fetches(&self) -> Vec<String> {
        read(&self.fetches).clone()
    }
}

#[async_trait]
impl BandSource for MemoryBandSource {
    async fn fetch(&self, band: &str, asset: &BandAsset) -> Result<Bytes> {
        write(&self.fetches).push(band.to_string());
        read(&self.rasters).get(&asset.href).cloned().ok_or_else(|| {
            AgrindexError::BandFetchError {
                band: band.to_string(),
                location: asset.href.clone(),
                reason: "404 Not Found".to_string(),
            }
        })
    }
}

/// Notifier that records `(subject, message)` pairs
#[derive(Debug, Clone, Default)]
pub struct MemoryNotifier {
    sent: Arc<RwLock<Vec<(String, String)>>>,
    failing: bool,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose every call fails after being recorded
    pub fn failing() -> Self {
        Self { failing: true, ..Self::default() }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        read(&self.sent).clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn notify(&self, subject: &str, message: &str) -> Result<()> {
        write(&self.sent).push((subject.to_string(), message.to_string()));
        if self.failing {
            return Err(AgrindexError::NotificationError {
                reason: "scripted notification failure".to_string(),
            });
        }
        Ok(())
    }
}

/// Workflow engine with a set of existing identities and scripted start outcomes
#[derive(Debug, Clone, Default)]
pub struct MemoryWorkflowEngine {
    existing: Arc<RwLock<HashSet<String>>>,
    always_exists: bool,
    probes: Arc<RwLock<Vec<String>>>,
    started: Arc<RwLock<Vec<(String, WorkflowPayload)>>>,
    start_failures: Arc<RwLock<VecDeque<WorkflowStartErrorKind>>>,
    describe_failures: Arc<RwLock<HashSet<String>>>,
}

impl MemoryWorkflowEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine that reports every identity as taken
    pub fn always_exists() -> Self {
        Self { always_exists: true, ..Self::default() }
    }

    pub fn with_existing<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let engine = Self::default();
        write(&engine.existing).extend(ids.into_iter().map(Into::into));
        engine
    }

    /// Fail the next `start` call with `kind`; queued failures apply in order
    pub fn fail_next_start(&self, kind: WorkflowStartErrorKind) {
        write(&self.start_failures).push_back(kind);
    }

    /// Make every `describe` of `execution_id` fail
    pub fn fail_describe_for(&self, execution_id: &str) {
        write(&self.describe_failures).insert(execution_id.to_string());
    }

    /// Identities probed, in call order
    pub fn probes(&self) -> Vec<String> {
        read(&self.probes).clone()
    }

    /// Successful starts, in call order
    pub fn started(&self) -> Vec<(String, WorkflowPayload)> {
        read(&self.started).clone()
    }
}

#[async_trait]
impl WorkflowEngine for MemoryWorkflowEngine {
    async fn describe(&self, execution_id: &str) -> Result<ExecutionStatus> {
        write(&self.probes).push(execution_id.to_string());
        if read(&self.describe_failures).contains(execution_id) {
            return Err(AgrindexError::WorkflowProbeError {
                execution_id: execution_id.to_string(),
                reason: "scripted describe failure".to_string(),
            });
        }
        if self.always_exists || read(&self.existing).contains(execution_id) {
            Ok(ExecutionStatus::Exists)
        } else {
            Ok(ExecutionStatus::NotFound)
        }
    }

    async fn start(&self, execution_id: &str, payload: &WorkflowPayload) -> Result<()> {
        if let Some(kind) = write(&self.start_failures).pop_front() {
            // A collision means someone else took the identity meanwhile
            if kind == WorkflowStartErrorKind::Collision {
                write(&self.existing).insert(execution_id.to_string());
            }
            return Err(AgrindexError::WorkflowStartError {
                execution_id: execution_id.to_string(),
                kind,
            });
        }

        write(&self.existing).insert(execution_id.to_string());
        write(&self.started).push((execution_id.to_string(), payload.clone()));
        Ok(())
    }
}
