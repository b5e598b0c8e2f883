use agrindex_core::error::{AgrindexError, Result};
use agrindex_core::models::{
    CatalogQuery, FieldGeometry, IndexComputationRequest, ProjectedRing, SceneMatch, TriggerRef,
    WorkflowInput,
};
use agrindex_geo::extract_field;
use agrindex_geo::transform::reproject_ring;
use agrindex_raster::normalized_difference;
use agrindex_store::{BandSource, Notifier, ObjectStorage, SceneCatalog, WorkflowEngine};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;

use crate::clipper::BandClipper;
use crate::materializer::RasterMaterializer;
use crate::models::{PipelineSettings, RunOutcome, ScheduleOutcome};
use crate::planner::OrchestrationPlanner;
use crate::working_set::WorkingSet;

const NO_DATA_SUBJECT: &str = "NoData from Sentinel-2";

/// Field index pipeline orchestrating catalog search, clipping, index
/// computation, upload and follow-up scheduling
pub struct FieldIndexPipeline<C, S, B, N, W>
where
    C: SceneCatalog,
    S: ObjectStorage,
    B: BandSource,
    N: Notifier,
    W: WorkflowEngine,
{
    catalog: C,
    storage: S,
    bands: B,
    notifier: Option<N>,
    workflow: W,
    settings: PipelineSettings,
}

impl<C, S, B, N, W> FieldIndexPipeline<C, S, B, N, W>
where
    C: SceneCatalog,
    S: ObjectStorage,
    B: BandSource,
    N: Notifier,
    W: WorkflowEngine,
{
    /// Create a new pipeline. Without a notifier, no-scene runs only log.
    pub fn new(
        catalog: C,
        storage: S,
        bands: B,
        notifier: Option<N>,
        workflow: W,
        settings: PipelineSettings,
    ) -> Self {
        Self { catalog, storage, bands, notifier, workflow, settings }
    }

    /// Process one trigger
    pub async fn run(&self, trigger: &TriggerRef) -> Result<RunOutcome> {
        self.run_at(trigger, Utc::now()).await
    }

    /// Process one trigger as if invoked at `now`
    #[tracing::instrument(skip(self), fields(bucket = %trigger.bucket, key = %trigger.key))]
    pub async fn run_at(&self, trigger: &TriggerRef, now: DateTime<Utc>) -> Result<RunOutcome> {
        // Phase 1: Field geometry
        let field = self.load_field(trigger).await?;

        // Phase 2: Scene search
        let query = CatalogQuery::for_window(
            &field.bbox(),
            &self.settings.collections,
            now,
            self.settings.lookback_days,
            self.settings.result_limit,
        );

        let Some(scene) = self.catalog.search(&query).await? else {
            self.notify_no_scene(&query.datetime, &trigger.key).await;
            return Ok(RunOutcome::NoSceneFound { window: query.datetime });
        };

        tracing::info!(
            scene = %scene.scene_id,
            crs = %scene.crs_code(),
            utm_zone = ?scene.utm_zone,
            sensed_at = %scene.sensed_at,
            "Resolved scene"
        );

        // Phase 3: Reprojection, once per run
        let ring = Arc::new(reproject_ring(field.boundary(), scene.epsg)?);

        // Phase 4: Indices, concurrently
        let uploaded = self.compute_indices(trigger, &scene, ring).await?;

        // Phase 5: Follow-up workflow
        let planner = OrchestrationPlanner::new(
            &self.workflow,
            self.settings.max_probe_attempts,
            self.settings.max_start_attempts,
        );
        let input = WorkflowInput {
            ring: field.boundary().to_vec(),
            catalog_query: query,
            source_key: trigger.key.clone(),
        };
        let plan = planner
            .plan(&trigger.base_execution_identity(), now, scene.sensing_date(), input)
            .await?;
        let wait_duration_seconds = plan.wait_duration_seconds;

        match planner.schedule(plan).await? {
            ScheduleOutcome::Started { execution_id } => {
                Ok(RunOutcome::Scheduled { uploaded, execution_id, wait_duration_seconds })
            }
            ScheduleOutcome::LimitExceeded { execution_id, reason } => {
                Ok(RunOutcome::FollowUpNotScheduled { uploaded, execution_id, reason })
            }
        }
    }

    async fn load_field(&self, trigger: &TriggerRef) -> Result<FieldGeometry> {
        let body = self.storage.get_object(&trigger.bucket, &trigger.key).await?;
        let text = std::str::from_utf8(&body).map_err(|e| AgrindexError::MalformedGeometry {
            reason: format!("document is not UTF-8: {}", e),
        })?;

        extract_field(text)
    }

    /// Fire-and-forget; a failed or unconfigured notification never fails the run
    async fn notify_no_scene(&self, window: &str, key: &str) {
        let message = format!("No data from Sentinel satellite on {} for farm name : {}", window, key);
        tracing::info!(window, "No scene found for field");

        let Some(notifier) = &self.notifier else {
            tracing::warn!(%message, "No notification topic configured; skipping notification");
            return;
        };

        if let Err(err) = notifier.notify(NO_DATA_SUBJECT, &message).await {
            tracing::warn!(error = %err, "Failed to send no-scene notification");
        }
    }

    /// Run every configured index and return the uploaded keys in index order.
    ///
    /// Indices share no raster state and run concurrently. The first failure
    /// in index order is reported with the keys its siblings uploaded.
    async fn compute_indices(
        &self,
        trigger: &TriggerRef,
        scene: &SceneMatch,
        ring: Arc<ProjectedRing>,
    ) -> Result<Vec<String>> {
        let working_set = Arc::new(WorkingSet::new(self.settings.working_set)?);
        let scene = Arc::new(scene.clone());

        let requests: Vec<IndexComputationRequest> = self
            .settings
            .indices
            .iter()
            .map(|index| IndexComputationRequest {
                index: index.clone(),
                file_stem: trigger.file_stem().to_string(),
                sensing_date: scene.sensing_date(),
                ring: Arc::clone(&ring),
                scene: Arc::clone(&scene),
            })
            .collect();

        let results =
            join_all(requests.iter().map(|request| self.compute_index(request, &working_set)))
                .await;

        let uploaded: Vec<String> =
            results.iter().filter_map(|r| r.as_ref().ok().cloned()).collect();

        for (request, result) in requests.iter().zip(results) {
            if let Err((band, source)) = result {
                tracing::error!(
                    index = %request.index.name,
                    band = band.as_deref().unwrap_or("-"),
                    error = %source,
                    uploaded = ?uploaded,
                    "Index failed"
                );
                return Err(AgrindexError::IndexFailed {
                    index: request.index.name.clone(),
                    band,
                    uploaded,
                    source: Box::new(source),
                });
            }
        }

        Ok(uploaded)
    }

    /// Clip both bands, compute and upload one index. Errors carry the band
    /// they concern when there is one.
    async fn compute_index(
        &self,
        request: &IndexComputationRequest,
        working_set: &Arc<WorkingSet>,
    ) -> std::result::Result<String, (Option<String>, AgrindexError)> {
        let index = &request.index;
        let [band_a, band_b] = index.bands();
        let with_band = |band: &str| {
            let band = band.to_string();
            move |e: AgrindexError| (Some(band), e)
        };

        let asset_a = request.scene.asset(band_a).map_err(with_band(band_a))?;
        let asset_b = request.scene.asset(band_b).map_err(with_band(band_b))?;

        let clipper =
            BandClipper::new(&self.bands, Arc::clone(working_set), self.settings.band_nodata);

        // Join point: the index needs both bands
        let (tile_a, tile_b) = tokio::join!(
            clipper.clip(&index.name, band_a, asset_a, Arc::clone(&request.ring)),
            clipper.clip(&index.name, band_b, asset_b, Arc::clone(&request.ring)),
        );
        let tile_a = tile_a.map_err(with_band(band_a))?;
        let tile_b = tile_b.map_err(with_band(band_b))?;

        let name = index.name.clone();
        let nodata = self.settings.index_nodata;
        let computed = tokio::task::spawn_blocking(move || {
            normalized_difference(&name, &tile_a, &tile_b, nodata)
        })
        .await
        .map_err(|e| {
            (None, AgrindexError::RasterDecode { reason: format!("index task aborted: {}", e) })
        })?
        .map_err(|e| (None, e))?;

        tracing::info!(
            index = %index.name,
            rows = computed.profile.height,
            cols = computed.profile.width,
            "Computed index"
        );

        let materializer =
            RasterMaterializer::new(&self.storage, &self.settings.output_bucket, Arc::clone(working_set));
        materializer
            .materialize(computed, &request.destination_key())
            .await
            .map_err(|e| (None, e))
    }
}
