//! Full runs against in-memory collaborators and synthetic band rasters

use agrindex_core::config::WorkingSetStrategy;
use agrindex_core::models::{BandAsset, IndexDefinition, SceneMatch, TriggerRef};
use agrindex_core::{AgrindexError, WorkflowStartErrorKind};
use agrindex_geo::transform::reproject_ring;
use agrindex_pipeline::{FieldIndexPipeline, PipelineSettings, RunOutcome};
use agrindex_raster::{decode_geotiff, encode_geotiff, BandTile, Compression, GeoTransform};
use agrindex_store::memory::{
    MemoryBandSource, MemoryNotifier, MemoryObjectStorage, MemorySceneCatalog, MemoryWorkflowEngine,
};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;

const SOURCE_BUCKET: &str = "farm-boundaries";
const KEY: &str = "235_Hari Singh bighar.geojson";
const STEM: &str = "235_Hari Singh bighar";
const OUTPUT_BUCKET: &str = "sentinel-2-cogs-rnil";
const EPSG: u32 = 32643;
const PIXEL: f64 = 10.0;

const TRIANGLE: [[f64; 2]; 4] = [[75.0, 29.0], [75.002, 29.0], [75.001, 29.0015], [75.0, 29.0]];

fn field_document(ring: &[[f64; 2]]) -> String {
    serde_json::json!({
        "type": "Feature",
        "properties": {"name": "Hari Singh"},
        "geometry": {"type": "Polygon", "coordinates": [ring]}
    })
    .to_string()
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 10, 0, 0, 0).unwrap()
}

/// Band covering the projected triangle with a margin, every sample `value`
fn band_over_field(value: u16) -> Vec<u8> {
    band_over_field_at(value, PIXEL)
}

fn band_over_field_at(value: u16, pixel: f64) -> Vec<u8> {
    let ring = reproject_ring(&TRIANGLE, EPSG).unwrap();
    let bbox = ring.bbox().unwrap();

    let origin_x = (bbox.min_x / pixel).floor() * pixel - 5.0 * pixel;
    let origin_y = (bbox.max_y / pixel).ceil() * pixel + 5.0 * pixel;
    let cols = (bbox.width() / pixel).ceil() as usize + 11;
    let rows = (bbox.height() / pixel).ceil() as usize + 11;

    let tile = BandTile::from_vec(
        vec![value; rows * cols],
        rows,
        cols,
        GeoTransform::new(origin_x, origin_y, pixel, -pixel),
        EPSG,
        Some(0),
    )
    .unwrap();
    encode_geotiff(&tile, Compression::Lzw).unwrap()
}

fn scene() -> SceneMatch {
    let assets: BTreeMap<String, BandAsset> = ["red", "nir", "nir08", "swir16"]
        .iter()
        .map(|band| (band.to_string(), BandAsset::new(format!("https://cogs.example/{}.tif", band))))
        .collect();

    SceneMatch {
        scene_id: "S2B_43RDP_20240605_0_L2A".to_string(),
        epsg: EPSG,
        utm_zone: Some("43".to_string()),
        sensed_at: Utc.with_ymd_and_hms(2024, 6, 5, 5, 46, 12).unwrap(),
        assets,
    }
}

fn band_source() -> MemoryBandSource {
    let source = MemoryBandSource::new();
    for (band, value) in [("red", 2), ("nir", 4), ("nir08", 3), ("swir16", 5)] {
        source.insert(&format!("https://cogs.example/{}.tif", band), band_over_field(value));
    }
    source
}

struct Harness {
    catalog: MemorySceneCatalog,
    storage: MemoryObjectStorage,
    bands: MemoryBandSource,
    notifier: MemoryNotifier,
    workflow: MemoryWorkflowEngine,
}

impl Harness {
    fn new(catalog: MemorySceneCatalog) -> Self {
        let storage = MemoryObjectStorage::new();
        storage.insert(SOURCE_BUCKET, KEY, field_document(&TRIANGLE));
        Self {
            catalog,
            storage,
            bands: band_source(),
            notifier: MemoryNotifier::new(),
            workflow: MemoryWorkflowEngine::new(),
        }
    }

    fn pipeline(
        &self,
        settings: PipelineSettings,
    ) -> FieldIndexPipeline<
        MemorySceneCatalog,
        MemoryObjectStorage,
        MemoryBandSource,
        MemoryNotifier,
        MemoryWorkflowEngine,
    > {
        FieldIndexPipeline::new(
            self.catalog.clone(),
            self.storage.clone(),
            self.bands.clone(),
            Some(self.notifier.clone()),
            self.workflow.clone(),
            settings,
        )
    }

    fn sorted_upload_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.storage.uploads().into_iter().map(|(_, key)| key).collect();
        keys.sort();
        keys
    }
}

fn trigger() -> TriggerRef {
    TriggerRef::new(SOURCE_BUCKET, KEY)
}

#[tokio::test]
async fn test_end_to_end_uploads_both_indices_and_schedules_once() {
    let harness = Harness::new(MemorySceneCatalog::with_scene(scene()));
    let outcome = harness.pipeline(PipelineSettings::default()).run_at(&trigger(), now()).await.unwrap();

    assert_eq!(
        harness.sorted_upload_keys(),
        vec![format!("{}/2024-06-05_NDMI.tif", STEM), format!("{}/2024-06-05_NDVI.tif", STEM)]
    );
    assert!(harness.storage.uploads().iter().all(|(bucket, _)| bucket == OUTPUT_BUCKET));

    let started = harness.workflow.started();
    assert_eq!(started.len(), 1);
    let (execution_id, payload) = &started[0];
    assert_eq!(execution_id, "235_Hari_Singh_bighar");
    assert_eq!(payload.wait_duration_seconds, 432000);
    assert_eq!(payload.input.source_key, KEY);
    assert_eq!(payload.input.ring.len(), TRIANGLE.len());
    for (got, want) in payload.input.ring.iter().zip(TRIANGLE.iter()) {
        assert!((got[0] - want[0]).abs() < 1e-12 && (got[1] - want[1]).abs() < 1e-12);
    }
    assert_eq!(payload.input.catalog_query, harness.catalog.queries()[0]);
    assert_eq!(payload.input.catalog_query.datetime, "2024-06-04T00:00:00Z/2024-06-10T00:00:00Z");

    match outcome {
        RunOutcome::Scheduled { uploaded, execution_id, wait_duration_seconds } => {
            assert_eq!(uploaded[0], format!("{}/2024-06-05_NDVI.tif", STEM));
            assert_eq!(execution_id, "235_Hari_Singh_bighar");
            assert_eq!(wait_duration_seconds, 432000);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(harness.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_uploaded_rasters_carry_index_values() {
    let harness = Harness::new(MemorySceneCatalog::with_scene(scene()));
    harness.pipeline(PipelineSettings::default()).run_at(&trigger(), now()).await.unwrap();

    let ndvi = harness
        .storage
        .object(OUTPUT_BUCKET, &format!("{}/2024-06-05_NDVI.tif", STEM))
        .unwrap();
    let ndvi = decode_geotiff::<f32>(&ndvi).unwrap();
    assert_eq!(ndvi.epsg(), EPSG);
    assert_eq!(ndvi.nodata(), Some(-9999.0));

    let valid: Vec<f32> = ndvi.data().iter().copied().filter(|v| *v != -9999.0).collect();
    assert!(!valid.is_empty());
    assert!(valid.iter().all(|v| (v - 1.0 / 3.0).abs() < 1e-6));

    let ndmi = harness
        .storage
        .object(OUTPUT_BUCKET, &format!("{}/2024-06-05_NDMI.tif", STEM))
        .unwrap();
    let ndmi = decode_geotiff::<f32>(&ndmi).unwrap();
    assert_eq!(ndmi.shape(), ndvi.shape());
    assert!(ndmi.data().iter().all(|v| *v == -9999.0 || (v - 0.25).abs() < 1e-6));
}

#[tokio::test]
async fn test_disk_working_set_produces_same_uploads() {
    let harness = Harness::new(MemorySceneCatalog::with_scene(scene()));
    let settings = PipelineSettings { working_set: WorkingSetStrategy::Disk, ..PipelineSettings::default() };

    let outcome = harness.pipeline(settings).run_at(&trigger(), now()).await.unwrap();

    assert_eq!(outcome.uploaded().len(), 2);
    assert_eq!(harness.workflow.started().len(), 1);
}

#[tokio::test]
async fn test_no_scene_notifies_without_uploads_or_starts() {
    let harness = Harness::new(MemorySceneCatalog::empty());
    let outcome = harness.pipeline(PipelineSettings::default()).run_at(&trigger(), now()).await.unwrap();

    let window = "2024-06-04T00:00:00Z/2024-06-10T00:00:00Z".to_string();
    assert_eq!(outcome, RunOutcome::NoSceneFound { window: window.clone() });

    let sent = harness.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "NoData from Sentinel-2");
    assert_eq!(
        sent[0].1,
        format!("No data from Sentinel satellite on {} for farm name : {}", window, KEY)
    );
    assert!(harness.storage.uploads().is_empty());
    assert!(harness.workflow.started().is_empty());
    assert!(harness.workflow.probes().is_empty());
    assert!(harness.bands.fetches().is_empty());
}

#[tokio::test]
async fn test_failed_notification_does_not_fail_run() {
    let mut harness = Harness::new(MemorySceneCatalog::empty());
    harness.notifier = MemoryNotifier::failing();

    let outcome = harness.pipeline(PipelineSettings::default()).run_at(&trigger(), now()).await.unwrap();

    assert!(matches!(outcome, RunOutcome::NoSceneFound { .. }));
    assert_eq!(harness.notifier.sent().len(), 1);
}

#[tokio::test]
async fn test_missing_band_names_index_and_band() {
    let mut partial = scene();
    partial.assets.remove("swir16");
    let harness = Harness::new(MemorySceneCatalog::with_scene(partial));

    let err = harness.pipeline(PipelineSettings::default()).run_at(&trigger(), now()).await.unwrap_err();

    match &err {
        AgrindexError::IndexFailed { index, band, uploaded, .. } => {
            assert_eq!(index, "NDMI");
            assert_eq!(band.as_deref(), Some("swir16"));
            assert_eq!(uploaded, &vec![format!("{}/2024-06-05_NDVI.tif", STEM)]);
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(err.to_string().contains("NDVI.tif"));
    assert!(harness.workflow.started().is_empty());
}

#[tokio::test]
async fn test_coarser_band_is_not_resampled() {
    let harness = Harness::new(MemorySceneCatalog::with_scene(scene()));
    harness.bands.insert("https://cogs.example/swir16.tif", band_over_field_at(5, 2.0 * PIXEL));

    let err = harness.pipeline(PipelineSettings::default()).run_at(&trigger(), now()).await.unwrap_err();

    match &err {
        AgrindexError::IndexFailed { index, uploaded, source, .. } => {
            assert_eq!(index, "NDMI");
            assert!(matches!(
                **source,
                AgrindexError::GridMismatch { .. } | AgrindexError::ShapeMismatch { .. }
            ));
            assert_eq!(uploaded, &vec![format!("{}/2024-06-05_NDVI.tif", STEM)]);
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(harness.sorted_upload_keys(), vec![format!("{}/2024-06-05_NDVI.tif", STEM)]);
    assert!(harness.workflow.started().is_empty());
}

#[tokio::test]
async fn test_field_outside_scene_is_empty_clip() {
    let harness = Harness::new(MemorySceneCatalog::with_scene(scene()));
    let far_field = [[75.2, 29.2], [75.202, 29.2], [75.201, 29.2015], [75.2, 29.2]];
    harness.storage.insert(SOURCE_BUCKET, KEY, field_document(&far_field));

    let err = harness.pipeline(PipelineSettings::default()).run_at(&trigger(), now()).await.unwrap_err();

    assert!(matches!(
        err,
        AgrindexError::IndexFailed { ref source, .. }
            if matches!(**source, AgrindexError::EmptyClipError { .. })
    ));
    assert!(!err.is_retryable());
    assert!(harness.storage.uploads().is_empty());
}

#[tokio::test]
async fn test_workflow_limit_leaves_indices_uploaded() {
    let harness = Harness::new(MemorySceneCatalog::with_scene(scene()));
    harness.workflow.fail_next_start(WorkflowStartErrorKind::LimitExceeded);

    let outcome = harness.pipeline(PipelineSettings::default()).run_at(&trigger(), now()).await.unwrap();

    assert!(matches!(outcome, RunOutcome::FollowUpNotScheduled { ref uploaded, .. } if uploaded.len() == 2));
    assert!(harness.workflow.started().is_empty());
}

#[tokio::test]
async fn test_describe_failure_fails_run_without_start() {
    let mut harness = Harness::new(MemorySceneCatalog::with_scene(scene()));
    harness.workflow = MemoryWorkflowEngine::with_existing(["235_Hari_Singh_bighar"]);
    harness.workflow.fail_describe_for("235_Hari_Singh_bighar_1");

    let err = harness.pipeline(PipelineSettings::default()).run_at(&trigger(), now()).await.unwrap_err();

    assert!(matches!(
        err,
        AgrindexError::WorkflowProbeError { ref execution_id, .. }
            if execution_id == "235_Hari_Singh_bighar_1"
    ));
    assert_eq!(harness.workflow.probes(), vec!["235_Hari_Singh_bighar", "235_Hari_Singh_bighar_1"]);
    assert!(harness.workflow.started().is_empty());
    assert_eq!(harness.storage.uploads().len(), 2);
}

#[tokio::test]
async fn test_catalog_failure_is_not_a_missing_scene() {
    let harness = Harness::new(MemorySceneCatalog::failing());

    let err = harness.pipeline(PipelineSettings::default()).run_at(&trigger(), now()).await.unwrap_err();

    assert!(matches!(err, AgrindexError::CatalogError { .. }));
    assert!(err.is_retryable());
    assert!(harness.notifier.sent().is_empty());
    assert!(harness.bands.fetches().is_empty());
    assert!(harness.workflow.probes().is_empty());
}

#[tokio::test]
async fn test_existing_execution_gets_suffix() {
    let mut harness = Harness::new(MemorySceneCatalog::with_scene(scene()));
    harness.workflow = MemoryWorkflowEngine::with_existing(["235_Hari_Singh_bighar"]);

    let outcome = harness.pipeline(PipelineSettings::default()).run_at(&trigger(), now()).await.unwrap();

    assert!(matches!(
        outcome,
        RunOutcome::Scheduled { ref execution_id, .. } if execution_id == "235_Hari_Singh_bighar_1"
    ));
}

#[tokio::test]
async fn test_custom_index_set() {
    let harness = Harness::new(MemorySceneCatalog::with_scene(scene()));
    let settings = PipelineSettings {
        indices: vec![IndexDefinition::new("NDWI", "nir", "nir08")],
        ..PipelineSettings::default()
    };

    let outcome = harness.pipeline(settings).run_at(&trigger(), now()).await.unwrap();

    assert_eq!(outcome.uploaded(), &[format!("{}/2024-06-05_NDWI.tif", STEM)]);
}

#[tokio::test]
async fn test_malformed_document_fails_before_search() {
    let harness = Harness::new(MemorySceneCatalog::with_scene(scene()));
    harness.storage.insert(SOURCE_BUCKET, KEY, r#"{"geometry": {"type": "Polygon", "coordinates": []}}"#);

    let err = harness.pipeline(PipelineSettings::default()).run_at(&trigger(), now()).await.unwrap_err();

    assert!(matches!(err, AgrindexError::MalformedGeometry { .. }));
    assert!(harness.catalog.queries().is_empty());
}
