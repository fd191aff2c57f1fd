use super::{
    CdnBackend, InvalidationBatch, InvalidationReceipt, MetricStatistic, MetricsQuery,
    PresignedGetRequest, PutObjectOutput, PutObjectRequest,
};
use crate::models::{Config, MetricDatapoint, StreamingMetrics};
use crate::{Error, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_cloudfront::types::{InvalidationBatch as CfInvalidationBatch, Paths};
use aws_sdk_cloudwatch::primitives::DateTime as CwDateTime;
use aws_sdk_cloudwatch::types::{Dimension, Statistic};
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use chrono::DateTime;
use tracing::debug;

pub struct AwsCdnClient {
    s3: aws_sdk_s3::Client,
    cloudfront: aws_sdk_cloudfront::Client,
    cloudwatch: aws_sdk_cloudwatch::Client,
    bucket: String,
    distribution_id: String,
}

impl AwsCdnClient {
    /// Build clients from config. Static credentials are used when both
    /// keys are configured, otherwise the default provider chain.
    pub async fn new(config: &Config) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let (Some(access_key_id), Some(secret_access_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            let credentials = Credentials::new(
                access_key_id.clone(),
                secret_access_key.clone(),
                None,
                None,
                "music-cdn-gateway",
            );
            loader = loader.credentials_provider(credentials);
        }

        let sdk_config = loader.load().await;
        Self::from_sdk_config(
            &sdk_config,
            config.bucket.clone(),
            config.distribution_id.clone(),
        )
    }

    pub fn from_sdk_config(sdk_config: &SdkConfig, bucket: String, distribution_id: String) -> Self {
        Self {
            s3: aws_sdk_s3::Client::new(sdk_config),
            cloudfront: aws_sdk_cloudfront::Client::new(sdk_config),
            cloudwatch: aws_sdk_cloudwatch::Client::new(sdk_config),
            bucket,
            distribution_id,
        }
    }

    /// Swap the S3 client, e.g. for a path-style endpoint.
    pub fn with_s3_client(mut self, s3: aws_sdk_s3::Client) -> Self {
        self.s3 = s3;
        self
    }
}

fn to_cloudwatch_time(time: chrono::DateTime<chrono::Utc>) -> CwDateTime {
    CwDateTime::from_millis(time.timestamp_millis())
}

fn to_statistic(statistic: MetricStatistic) -> Statistic {
    match statistic {
        MetricStatistic::Sum => Statistic::Sum,
        MetricStatistic::Average => Statistic::Average,
    }
}

#[async_trait]
impl CdnBackend for AwsCdnClient {
    async fn put_object(&self, request: PutObjectRequest) -> Result<PutObjectOutput> {
        debug!(
            "PutObject {} ({} bytes, {})",
            request.key,
            request.body.len(),
            request.content_type
        );

        let mut builder = self
            .s3
            .put_object()
            .bucket(&self.bucket)
            .key(&request.key)
            .body(ByteStream::from(request.body))
            .content_type(&request.content_type)
            .cache_control(&request.cache_control);

        for (name, value) in request.metadata {
            builder = builder.metadata(name, value);
        }

        let output = builder
            .send()
            .await
            .map_err(|e| {
                Error::Storage(format!("Failed to upload object: {}", DisplayErrorContext(&e)))
            })?;

        Ok(PutObjectOutput {
            etag: output.e_tag().map(|s| s.to_string()),
        })
    }

    async fn presign_get_object(&self, request: PresignedGetRequest) -> Result<String> {
        let presigning_config = PresigningConfig::expires_in(request.expires_in)
            .map_err(|e| Error::Storage(format!("Invalid presigning config: {}", e)))?;

        let presigned = self
            .s3
            .get_object()
            .bucket(&self.bucket)
            .key(&request.key)
            .response_content_type(&request.response_content_type)
            .response_cache_control(&request.response_cache_control)
            .presigned(presigning_config)
            .await
            .map_err(|e| {
                Error::Storage(format!("Failed to presign request: {}", DisplayErrorContext(&e)))
            })?;

        Ok(presigned.uri().to_string())
    }

    async fn create_invalidation(&self, batch: InvalidationBatch) -> Result<InvalidationReceipt> {
        let quantity = i32::try_from(batch.quantity())
            .map_err(|_| Error::Cdn(format!("Too many paths: {}", batch.quantity())))?;

        let paths = Paths::builder()
            .quantity(quantity)
            .set_items(Some(batch.paths))
            .build()
            .map_err(|e| Error::Cdn(format!("Invalid invalidation paths: {}", e)))?;

        let invalidation_batch = CfInvalidationBatch::builder()
            .paths(paths)
            .caller_reference(batch.caller_reference)
            .build()
            .map_err(|e| Error::Cdn(format!("Invalid invalidation batch: {}", e)))?;

        let output = self
            .cloudfront
            .create_invalidation()
            .distribution_id(&self.distribution_id)
            .invalidation_batch(invalidation_batch)
            .send()
            .await
            .map_err(|e| Error::Cdn(format!(
                    "Failed to create invalidation: {}",
                    aws_sdk_cloudfront::error::DisplayErrorContext(&e)
                )))?;

        let invalidation = output
            .invalidation()
            .ok_or_else(|| Error::Cdn("Invalidation missing from response".to_string()))?;

        Ok(InvalidationReceipt {
            id: invalidation.id().to_string(),
            status: invalidation.status().to_string(),
            location: output.location().map(|s| s.to_string()),
        })
    }

    async fn get_metric_statistics(&self, query: MetricsQuery) -> Result<StreamingMetrics> {
        let dimension = Dimension::builder()
            .name(&query.dimension_name)
            .value(&query.dimension_value)
            .build();

        let mut builder = self
            .cloudwatch
            .get_metric_statistics()
            .namespace(&query.namespace)
            .metric_name(&query.metric_name)
            .dimensions(dimension)
            .start_time(to_cloudwatch_time(query.start_time))
            .end_time(to_cloudwatch_time(query.end_time))
            .period(query.period_secs);

        for statistic in &query.statistics {
            builder = builder.statistics(to_statistic(*statistic));
        }

        let output = builder
            .send()
            .await
            .map_err(|e| Error::Metrics(format!(
                    "Failed to get metric statistics: {}",
                    aws_sdk_cloudwatch::error::DisplayErrorContext(&e)
                )))?;

        let datapoints = output
            .datapoints()
            .iter()
            .map(|point| MetricDatapoint {
                timestamp: point
                    .timestamp()
                    .and_then(|t| t.to_millis().ok())
                    .and_then(DateTime::from_timestamp_millis),
                sum: point.sum(),
                average: point.average(),
                unit: point.unit().map(|u| u.as_str().to_string()),
            })
            .collect();

        Ok(StreamingMetrics {
            label: output.label().map(|s| s.to_string()),
            datapoints,
        })
    }
}
