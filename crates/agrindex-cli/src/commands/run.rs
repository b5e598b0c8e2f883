use agrindex_core::config::LayeredConfig;
use agrindex_core::models::TriggerRef;
use agrindex_pipeline::{FieldIndexPipeline, PipelineSettings, RunOutcome};
use agrindex_store::aws::{load_sdk_config, S3ObjectStorage, SnsNotifier, StepFunctionsEngine};
use agrindex_store::http::HttpBandSource;
use agrindex_store::stac::StacSceneCatalog;
use anyhow::Result;
use std::path::Path;
use std::time::Duration;
use tabled::Tabled;

use crate::cli::RunArgs;
use crate::config_loader::load_config_with_overrides;
use crate::errors;
use crate::output::OutputWriter;

pub async fn execute(args: RunArgs, config_file: Option<&Path>, output: &OutputWriter) -> Result<()> {
    let config = load_config_with_overrides(config_file, args.overrides.into())?;
    process(TriggerRef::new(args.bucket, args.key), &config, output).await
}

/// Run the pipeline for one trigger against the AWS and STAC collaborators
pub async fn process(trigger: TriggerRef, config: &LayeredConfig, output: &OutputWriter) -> Result<()> {
    let state_machine_arn =
        config.state_machine_arn.value.clone().ok_or_else(errors::missing_state_machine)?;
    let timeout = Duration::from_secs(config.request_timeout_secs.value);

    let sdk_config = load_sdk_config().await;
    let catalog = StacSceneCatalog::new(config.catalog_url.value.clone(), timeout)?;
    let bands = HttpBandSource::new(timeout)?;
    let storage = S3ObjectStorage::new(&sdk_config);
    let notifier = config
        .notification_topic_arn
        .value
        .as_ref()
        .map(|topic| SnsNotifier::new(&sdk_config, topic.clone()));
    let workflow = StepFunctionsEngine::new(&sdk_config, state_machine_arn);

    let settings = PipelineSettings::from_config(config);
    let bucket = settings.output_bucket.clone();
    let pipeline = FieldIndexPipeline::new(catalog, storage, bands, notifier, workflow, settings);

    tracing::info!(bucket = %trigger.bucket, key = %trigger.key, "Starting field index run");
    let outcome = pipeline
        .run(&trigger)
        .await
        .map_err(|e| errors::run_failed(&trigger, &e))?;

    report(&outcome, &bucket, output)
}

#[derive(Tabled)]
struct UploadRow {
    #[tabled(rename = "Bucket")]
    bucket: String,
    #[tabled(rename = "Key")]
    key: String,
}

fn report(outcome: &RunOutcome, bucket: &str, output: &OutputWriter) -> Result<()> {
    if output.is_json() {
        return output.result(outcome);
    }

    match outcome {
        RunOutcome::Scheduled { uploaded, execution_id, wait_duration_seconds } => {
            output.success(format!(
                "Computed {} indices; follow-up {} scheduled with a {}s wait",
                uploaded.len(),
                execution_id,
                wait_duration_seconds
            ));
        }
        RunOutcome::FollowUpNotScheduled { uploaded, execution_id, reason } => {
            output.success(format!("Computed {} indices", uploaded.len()));
            output.warning(format!("Follow-up {} not scheduled: {}", execution_id, reason));
        }
        RunOutcome::NoSceneFound { window } => {
            output.info(format!("No scene found for {}; nothing computed", window));
            return Ok(());
        }
    }

    output.section("Uploaded");
    output.table(
        outcome
            .uploaded()
            .iter()
            .map(|key| UploadRow { bucket: bucket.to_string(), key: key.clone() })
            .collect(),
    );
    Ok(())
}
