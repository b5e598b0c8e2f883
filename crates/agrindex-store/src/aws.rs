//! AWS adapters: S3 object storage, SNS notifications, Step Functions workflows

use agrindex_core::error::{AgrindexError, Result, WorkflowStartErrorKind};
use agrindex_core::models::WorkflowPayload;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;

use crate::ports::{ExecutionStatus, Notifier, ObjectStorage, WorkflowEngine};

/// Load shared SDK configuration from the environment (region, credentials)
pub async fn load_sdk_config() -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest()).load().await
}

/// S3-backed object storage
#[derive(Debug, Clone)]
pub struct S3ObjectStorage {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStorage {
    pub fn new(config: &SdkConfig) -> Self {
        Self { client: aws_sdk_s3::Client::new(config) }
    }
}

#[async_trait]
impl ObjectStorage for S3ObjectStorage {
    #[tracing::instrument(skip(self))]
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let read_error = |reason: String| AgrindexError::StorageReadError {
            bucket: bucket.to_string(),
            key: key.to_string(),
            reason,
        };

        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| read_error(aws_sdk_s3::error::DisplayErrorContext(&e).to_string()))?;

        let body = output.body.collect().await.map_err(|e| read_error(e.to_string()))?;
        Ok(body.into_bytes())
    }

    #[tracing::instrument(skip(self, body), fields(bytes = body.len()))]
    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type("image/tiff")
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| AgrindexError::UploadError {
                key: format!("s3://{}/{}", bucket, key),
                reason: aws_sdk_s3::error::DisplayErrorContext(&e).to_string(),
            })?;

        tracing::info!("Uploaded object");
        Ok(())
    }
}

/// SNS topic notifier
#[derive(Debug, Clone)]
pub struct SnsNotifier {
    client: aws_sdk_sns::Client,
    topic_arn: String,
}

impl SnsNotifier {
    pub fn new(config: &SdkConfig, topic_arn: impl Into<String>) -> Self {
        Self { client: aws_sdk_sns::Client::new(config), topic_arn: topic_arn.into() }
    }
}

#[async_trait]
impl Notifier for SnsNotifier {
    #[tracing::instrument(skip(self, message), fields(topic = %self.topic_arn))]
    async fn notify(&self, subject: &str, message: &str) -> Result<()> {
        let output = self
            .client
            .publish()
            .topic_arn(&self.topic_arn)
            .subject(subject)
            .message(message)
            .send()
            .await
            .map_err(|e| AgrindexError::NotificationError {
                reason: format!(
                    "publish to {} failed: {}",
                    self.topic_arn,
                    aws_sdk_sns::error::DisplayErrorContext(&e)
                ),
            })?;

        tracing::info!(message_id = ?output.message_id(), "Published notification");
        Ok(())
    }
}

/// Step Functions state machine as the workflow engine
#[derive(Debug, Clone)]
pub struct StepFunctionsEngine {
    client: aws_sdk_sfn::Client,
    state_machine_arn: String,
}

impl StepFunctionsEngine {
    pub fn new(config: &SdkConfig, state_machine_arn: impl Into<String>) -> Self {
        Self {
            client: aws_sdk_sfn::Client::new(config),
            state_machine_arn: state_machine_arn.into(),
        }
    }

    fn execution_arn(&self, execution_id: &str) -> String {
        execution_arn(&self.state_machine_arn, execution_id)
    }
}

/// ARN of a named execution of a state machine
pub fn execution_arn(state_machine_arn: &str, execution_id: &str) -> String {
    format!("{}:{}", state_machine_arn.replacen(":stateMachine:", ":execution:", 1), execution_id)
}

#[async_trait]
impl WorkflowEngine for StepFunctionsEngine {
    #[tracing::instrument(skip(self))]
    async fn describe(&self, execution_id: &str) -> Result<ExecutionStatus> {
        match self
            .client
            .describe_execution()
            .execution_arn(self.execution_arn(execution_id))
            .send()
            .await
        {
            Ok(_) => Ok(ExecutionStatus::Exists),
            Err(err) => {
                let service_error = err.into_service_error();
                if service_error.is_execution_does_not_exist() {
                    Ok(ExecutionStatus::NotFound)
                } else {
                    Err(AgrindexError::WorkflowProbeError {
                        execution_id: execution_id.to_string(),
                        reason: aws_sdk_sfn::error::DisplayErrorContext(&service_error).to_string(),
                    })
                }
            }
        }
    }

    #[tracing::instrument(skip(self, payload), fields(wait = payload.wait_duration_seconds))]
    async fn start(&self, execution_id: &str, payload: &WorkflowPayload) -> Result<()> {
        let input = serde_json::to_string(payload)?;

        match self
            .client
            .start_execution()
            .state_machine_arn(&self.state_machine_arn)
            .name(execution_id)
            .input(input)
            .send()
            .await
        {
            Ok(output) => {
                tracing::info!(execution_arn = %output.execution_arn(), "Started workflow");
                Ok(())
            }
            Err(err) => {
                let service_error = err.into_service_error();
                let kind = if service_error.is_execution_already_exists() {
                    WorkflowStartErrorKind::Collision
                } else if service_error.is_execution_limit_exceeded() {
                    WorkflowStartErrorKind::LimitExceeded
                } else {
                    WorkflowStartErrorKind::Other(
                        aws_sdk_sfn::error::DisplayErrorContext(&service_error).to_string(),
                    )
                };
                Err(AgrindexError::WorkflowStartError { execution_id: execution_id.to_string(), kind })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_arn() {
        assert_eq!(
            execution_arn(
                "arn:aws:states:us-west-2:123456789012:stateMachine:sentinel-2-data-calculate",
                "235_Hari_Singh_1"
            ),
            "arn:aws:states:us-west-2:123456789012:execution:sentinel-2-data-calculate:235_Hari_Singh_1"
        );
    }
}
