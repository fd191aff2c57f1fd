//! Backends for object storage, CDN control and CDN metrics
//!
//! The gateway shapes every request into one of the plain structs below and
//! hands it to a [`CdnBackend`]. `AwsCdnClient` sends them to S3, CloudFront
//! and CloudWatch; `MockCdnBackend` records them in memory.

pub mod client;
pub mod mock;

pub use client::AwsCdnClient;
pub use mock::MockCdnBackend;

use crate::models::StreamingMetrics;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct PutObjectRequest {
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: String,
    pub cache_control: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutObjectOutput {
    pub etag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignedGetRequest {
    pub key: String,
    pub expires_in: Duration,
    pub response_content_type: String,
    pub response_cache_control: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationBatch {
    pub caller_reference: String,
    pub paths: Vec<String>,
}

impl InvalidationBatch {
    pub fn quantity(&self) -> usize {
        self.paths.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationReceipt {
    pub id: String,
    pub status: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricStatistic {
    Sum,
    Average,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsQuery {
    pub namespace: String,
    pub metric_name: String,
    pub dimension_name: String,
    pub dimension_value: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub period_secs: i32,
    pub statistics: Vec<MetricStatistic>,
}

#[async_trait]
pub trait CdnBackend: Send + Sync {
    async fn put_object(&self, request: PutObjectRequest) -> Result<PutObjectOutput>;
    async fn presign_get_object(&self, request: PresignedGetRequest) -> Result<String>;
    async fn create_invalidation(&self, batch: InvalidationBatch) -> Result<InvalidationReceipt>;
    async fn get_metric_statistics(&self, query: MetricsQuery) -> Result<StreamingMetrics>;
}
