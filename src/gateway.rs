//! Domain-level CDN operations for audio tracks.
//!
//! The gateway shapes uploads, signed URLs, invalidations and metrics
//! queries and passes them to a [`CdnBackend`]. Backend errors are logged
//! with the key or track they concern and returned as-is, except for
//! metrics, which are best effort.

use crate::cdn::{
    CdnBackend, InvalidationBatch, InvalidationReceipt, MetricStatistic, MetricsQuery,
    PresignedGetRequest, PutObjectRequest,
};
use crate::keys;
use crate::models::{CdnUploadResult, Config, StreamingMetrics, StreamingOptions};
use crate::{Error, Result};
use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const DEFAULT_CONTENT_TYPE: &str = "audio/mpeg";
pub const UPLOAD_CACHE_CONTROL: &str = "max-age=31536000";
pub const UPLOADED_AT_METADATA: &str = "uploaded-at";
pub const SIGNED_URL_EXPIRY_SECS: u64 = 3600;
pub const SIGNED_URL_CACHE_CONTROL: &str = "max-age=3600";

pub const METRICS_NAMESPACE: &str = "AWS/CloudFront";
pub const METRICS_NAME: &str = "BytesDownloaded";
pub const METRICS_DIMENSION: &str = "DistributionId";
pub const METRICS_WINDOW_HOURS: i64 = 24;
pub const METRICS_PERIOD_SECS: i32 = 3600;

pub struct CdnGateway {
    backend: Box<dyn CdnBackend>,
    config: Config,
}

impl CdnGateway {
    pub fn new(backend: Box<dyn CdnBackend>, config: Config) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Store `data` under `key` with a one-year cache lifetime.
    ///
    /// `content_type` defaults to [`DEFAULT_CONTENT_TYPE`].
    pub async fn upload_audio_file(
        &self,
        data: &[u8],
        key: &str,
        content_type: Option<&str>,
    ) -> Result<CdnUploadResult> {
        let content_type = content_type.unwrap_or(DEFAULT_CONTENT_TYPE);
        let uploaded_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

        let mut metadata = HashMap::new();
        metadata.insert(UPLOADED_AT_METADATA.to_string(), uploaded_at);

        let request = PutObjectRequest {
            key: key.to_string(),
            body: data.to_vec(),
            content_type: content_type.to_string(),
            cache_control: UPLOAD_CACHE_CONTROL.to_string(),
            metadata,
        };

        let output = self.backend.put_object(request).await.map_err(|e| {
            error!("Failed to upload audio file {}: {}", key, e);
            e
        })?;

        info!("Uploaded {} ({} bytes) to {}", key, data.len(), self.config.bucket);

        Ok(CdnUploadResult {
            url: keys::origin_url(&self.config.bucket, &self.config.region, key),
            cdn_url: keys::cdn_url(&self.config.cdn_domain, key),
            key: key.to_string(),
            etag: output.etag.unwrap_or_default(),
        })
    }

    /// Upload the variant of `track_id` described by `options`, deriving the
    /// storage key and content type from it.
    pub async fn upload_track_variant(
        &self,
        track_id: &str,
        options: &StreamingOptions,
        data: &[u8],
    ) -> Result<CdnUploadResult> {
        let key = keys::track_key(track_id, options);
        self.upload_audio_file(data, &key, Some(options.format().mime_type()))
            .await
    }

    /// Time-limited signed read URL for a track variant.
    pub async fn generate_streaming_url(
        &self,
        track_id: &str,
        options: &StreamingOptions,
    ) -> Result<String> {
        let format = options.format();
        let key = keys::track_key(track_id, options);
        debug!("Signing streaming URL for track {} at {}", track_id, key);

        let request = PresignedGetRequest {
            key,
            expires_in: Duration::from_secs(SIGNED_URL_EXPIRY_SECS),
            response_content_type: format!("audio/{}", format),
            response_cache_control: SIGNED_URL_CACHE_CONTROL.to_string(),
        };

        self.backend.presign_get_object(request).await.map_err(|e| {
            error!("Failed to generate streaming URL for track {}: {}", track_id, e);
            e
        })
    }

    /// Public CDN URL for a track variant. No signing, no I/O.
    pub fn generate_cdn_streaming_url(&self, track_id: &str, options: &StreamingOptions) -> String {
        keys::cdn_url(&self.config.cdn_domain, &keys::track_key(track_id, options))
    }

    /// Submit an invalidation for `paths`. Returns once CloudFront has
    /// accepted the job, not once it has propagated.
    ///
    /// CloudFront rejects batches without paths, so an empty `paths` fails
    /// with [`Error::Cdn`] before anything is sent.
    pub async fn invalidate_cdn_cache<S: AsRef<str>>(
        &self,
        paths: &[S],
    ) -> Result<InvalidationReceipt> {
        if paths.is_empty() {
            error!(
                "Refusing empty invalidation on {}",
                self.config.distribution_id
            );
            return Err(Error::Cdn("No paths to invalidate".to_string()));
        }

        let batch = InvalidationBatch {
            caller_reference: keys::caller_reference(Utc::now().timestamp_millis()),
            paths: paths
                .iter()
                .map(|path| keys::invalidation_path(path.as_ref()))
                .collect(),
        };
        let caller_reference = batch.caller_reference.clone();
        let quantity = batch.quantity();

        let receipt = self.backend.create_invalidation(batch).await.map_err(|e| {
            error!(
                "Failed to invalidate {} paths ({}) on {}: {}",
                quantity, caller_reference, self.config.distribution_id, e
            );
            e
        })?;

        info!(
            "Invalidation {} accepted for {} paths ({}), status {}",
            receipt.id, quantity, caller_reference, receipt.status
        );
        Ok(receipt)
    }

    /// Bytes downloaded from the distribution over the last day, hourly.
    ///
    /// The figures cover the whole distribution; `track_id` is only used
    /// for logging. Failures yield `None`.
    pub async fn get_streaming_metrics(&self, track_id: &str) -> Option<StreamingMetrics> {
        let end_time = Utc::now();
        let query = MetricsQuery {
            namespace: METRICS_NAMESPACE.to_string(),
            metric_name: METRICS_NAME.to_string(),
            dimension_name: METRICS_DIMENSION.to_string(),
            dimension_value: self.config.distribution_id.clone(),
            start_time: end_time - ChronoDuration::hours(METRICS_WINDOW_HOURS),
            end_time,
            period_secs: METRICS_PERIOD_SECS,
            statistics: vec![MetricStatistic::Sum, MetricStatistic::Average],
        };

        match self.backend.get_metric_statistics(query).await {
            Ok(metrics) => {
                debug!(
                    "Fetched {} metric datapoints for track {}",
                    metrics.datapoints.len(),
                    track_id
                );
                Some(metrics)
            }
            Err(e) => {
                warn!("Failed to get streaming metrics for track {}: {}", track_id, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdn::MockCdnBackend;
    use crate::models::{AudioFormat, MetricDatapoint, Quality};
    use chrono::DateTime;
    use pretty_assertions::assert_eq;

    fn test_config() -> Config {
        Config {
            access_key_id: None,
            secret_access_key: None,
            region: "us-east-1".to_string(),
            bucket: "media-bucket".to_string(),
            cdn_domain: "cdn.example.com".to_string(),
            distribution_id: "E2EXAMPLE".to_string(),
            dry_run: true,
        }
    }

    fn gateway_with(backend: &MockCdnBackend) -> CdnGateway {
        CdnGateway::new(Box::new(backend.clone()), test_config())
    }

    #[tokio::test]
    async fn test_upload_sets_cache_control_and_timestamp() {
        let backend = MockCdnBackend::new();
        let gateway = gateway_with(&backend);

        let result = gateway
            .upload_audio_file(b"ID3audio", "tracks/t1/high.mp3", None)
            .await
            .unwrap();

        let puts = backend.get_puts();
        assert_eq!(puts.len(), 1);
        let put = &puts[0];
        assert_eq!(put.cache_control, "max-age=31536000");
        assert_eq!(put.content_type, "audio/mpeg");
        let uploaded_at = put.metadata.get("uploaded-at").unwrap();
        assert!(DateTime::parse_from_rfc3339(uploaded_at).is_ok());

        assert_eq!(result.key, "tracks/t1/high.mp3");
        assert_eq!(result.cdn_url, "https://cdn.example.com/tracks/t1/high.mp3");
        assert_eq!(
            result.url,
            "https://media-bucket.s3.us-east-1.amazonaws.com/tracks/t1/high.mp3"
        );
        assert!(!result.etag.is_empty());
    }

    #[tokio::test]
    async fn test_upload_uses_given_content_type() {
        let backend = MockCdnBackend::new();
        let gateway = gateway_with(&backend);

        gateway
            .upload_audio_file(b"fLaC", "tracks/t1/lossless.flac", Some("audio/flac"))
            .await
            .unwrap();

        assert_eq!(backend.get_puts()[0].content_type, "audio/flac");
    }

    #[tokio::test]
    async fn test_upload_propagates_backend_error() {
        let backend = MockCdnBackend::new().with_failure(true);
        let gateway = gateway_with(&backend);

        let result = gateway.upload_audio_file(b"x", "k", None).await;
        assert!(matches!(result, Err(Error::Storage(ref msg)) if msg.contains("k")));
    }

    #[tokio::test]
    async fn test_track_variant_upload_matches_cdn_url() {
        let backend = MockCdnBackend::new();
        let gateway = gateway_with(&backend);
        let options = StreamingOptions::new(Quality::Lossless, AudioFormat::Flac);

        let result = gateway
            .upload_track_variant("t7", &options, b"fLaC")
            .await
            .unwrap();

        assert_eq!(result.key, "tracks/t7/lossless.flac");
        assert_eq!(result.cdn_url, gateway.generate_cdn_streaming_url("t7", &options));
        assert_eq!(backend.get_puts()[0].content_type, "audio/flac");
    }

    #[tokio::test]
    async fn test_streaming_url_request_shape() {
        let backend = MockCdnBackend::new();
        let gateway = gateway_with(&backend);

        let url = gateway
            .generate_streaming_url(
                "track123",
                &StreamingOptions::new(Quality::High, AudioFormat::Flac),
            )
            .await
            .unwrap();

        assert!(url.contains("tracks/track123/high.flac"));
        let presigns = backend.get_presigns();
        assert_eq!(presigns[0].key, "tracks/track123/high.flac");
        assert_eq!(presigns[0].expires_in, Duration::from_secs(3600));
        assert_eq!(presigns[0].response_content_type, "audio/flac");
        assert_eq!(presigns[0].response_cache_control, "max-age=3600");
    }

    #[tokio::test]
    async fn test_streaming_url_defaults() {
        let backend = MockCdnBackend::new();
        let gateway = gateway_with(&backend);

        gateway
            .generate_streaming_url("t1", &StreamingOptions::default())
            .await
            .unwrap();
        gateway
            .generate_streaming_url(
                "t1",
                &StreamingOptions {
                    quality: Some(Quality::Low),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let presigns = backend.get_presigns();
        assert_eq!(presigns[0].key, "tracks/t1/medium.mp3");
        assert_eq!(presigns[0].response_content_type, "audio/mp3");
        assert_eq!(presigns[1].key, "tracks/t1/low.mp3");
    }

    #[tokio::test]
    async fn test_streaming_url_propagates_error() {
        let backend = MockCdnBackend::new().with_failure(true);
        let gateway = gateway_with(&backend);

        let result = gateway
            .generate_streaming_url("t1", &StreamingOptions::default())
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_cdn_streaming_url() {
        let gateway = CdnGateway::new(Box::new(MockCdnBackend::new()), test_config());

        assert_eq!(
            gateway.generate_cdn_streaming_url("abc", &StreamingOptions::default()),
            "https://cdn.example.com/tracks/abc/medium.mp3"
        );
    }

    #[tokio::test]
    async fn test_invalidation_batch_shape() {
        let backend = MockCdnBackend::new();
        let gateway = gateway_with(&backend);

        let before = Utc::now().timestamp_millis();
        let receipt = gateway.invalidate_cdn_cache(&["a/b", "c"]).await.unwrap();
        let after = Utc::now().timestamp_millis();

        assert_eq!(receipt.status, "InProgress");
        let batches = backend.get_invalidations();
        assert_eq!(batches[0].paths, vec!["/a/b".to_string(), "/c".to_string()]);
        assert_eq!(batches[0].quantity(), 2);

        let millis: i64 = batches[0]
            .caller_reference
            .strip_prefix("invalidation-")
            .unwrap()
            .parse()
            .unwrap();
        assert!(millis >= before && millis <= after);
    }

    #[tokio::test]
    async fn test_invalidation_does_not_double_prefix() {
        let backend = MockCdnBackend::new();
        let gateway = gateway_with(&backend);

        gateway
            .invalidate_cdn_cache(&vec!["/tracks/t1/*".to_string()])
            .await
            .unwrap();

        assert_eq!(backend.get_invalidations()[0].paths, vec!["/tracks/t1/*"]);
    }

    #[tokio::test]
    async fn test_empty_invalidation_is_rejected() {
        let backend = MockCdnBackend::new();
        let gateway = gateway_with(&backend);
        let paths: Vec<String> = Vec::new();

        let result = gateway.invalidate_cdn_cache(&paths).await;

        assert!(matches!(result, Err(Error::Cdn(ref msg)) if msg.contains("No paths")));
        assert!(backend.get_invalidations().is_empty());
    }

    #[tokio::test]
    async fn test_invalidation_propagates_error() {
        let backend = MockCdnBackend::new().with_failure(true);
        let gateway = gateway_with(&backend);

        let result = gateway.invalidate_cdn_cache(&["a"]).await;
        assert!(matches!(result, Err(Error::Cdn(_))));
    }

    #[tokio::test]
    async fn test_metrics_query_shape() {
        let metrics = StreamingMetrics {
            label: Some("BytesDownloaded".to_string()),
            datapoints: vec![MetricDatapoint {
                timestamp: None,
                sum: Some(1024.0),
                average: Some(512.0),
                unit: Some("None".to_string()),
            }],
        };
        let backend = MockCdnBackend::new().with_metrics(metrics.clone());
        let gateway = gateway_with(&backend);

        let result = gateway.get_streaming_metrics("t1").await;
        assert_eq!(result, Some(metrics));

        let query = &backend.get_metric_queries()[0];
        assert_eq!(query.namespace, "AWS/CloudFront");
        assert_eq!(query.metric_name, "BytesDownloaded");
        assert_eq!(query.dimension_name, "DistributionId");
        assert_eq!(query.dimension_value, "E2EXAMPLE");
        assert_eq!(query.period_secs, 3600);
        assert_eq!(
            query.statistics,
            vec![MetricStatistic::Sum, MetricStatistic::Average]
        );
        assert_eq!(query.end_time - query.start_time, ChronoDuration::hours(24));
    }

    #[tokio::test]
    async fn test_metrics_failure_returns_none() {
        let backend = MockCdnBackend::new().with_failure(true);
        let gateway = gateway_with(&backend);

        assert!(gateway.get_streaming_metrics("t1").await.is_none());
        assert_eq!(backend.get_metric_queries().len(), 1);
    }
}
