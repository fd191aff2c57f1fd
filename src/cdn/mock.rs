use super::{
    CdnBackend, InvalidationBatch, InvalidationReceipt, MetricsQuery, PresignedGetRequest,
    PutObjectOutput, PutObjectRequest,
};
use crate::models::StreamingMetrics;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory backend that records every request it receives.
#[derive(Clone)]
pub struct MockCdnBackend {
    objects: Arc<Mutex<HashMap<String, PutObjectRequest>>>,
    puts: Arc<Mutex<Vec<PutObjectRequest>>>,
    presigns: Arc<Mutex<Vec<PresignedGetRequest>>>,
    invalidations: Arc<Mutex<Vec<InvalidationBatch>>>,
    metric_queries: Arc<Mutex<Vec<MetricsQuery>>>,
    metrics: StreamingMetrics,
    origin: String,
    should_fail: Arc<Mutex<bool>>,
}

impl MockCdnBackend {
    pub fn new() -> Self {
        Self {
            objects: Arc::new(Mutex::new(HashMap::new())),
            puts: Arc::new(Mutex::new(Vec::new())),
            presigns: Arc::new(Mutex::new(Vec::new())),
            invalidations: Arc::new(Mutex::new(Vec::new())),
            metric_queries: Arc::new(Mutex::new(Vec::new())),
            metrics: StreamingMetrics::default(),
            origin: "https://mock-storage.example.com".to_string(),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_origin(mut self, origin: String) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_metrics(mut self, metrics: StreamingMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    pub fn get_puts(&self) -> Vec<PutObjectRequest> {
        self.puts.lock().unwrap().clone()
    }

    pub fn get_presigns(&self) -> Vec<PresignedGetRequest> {
        self.presigns.lock().unwrap().clone()
    }

    pub fn get_invalidations(&self) -> Vec<InvalidationBatch> {
        self.invalidations.lock().unwrap().clone()
    }

    pub fn get_metric_queries(&self) -> Vec<MetricsQuery> {
        self.metric_queries.lock().unwrap().clone()
    }

    pub fn get_object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|object| object.body.clone())
    }

    fn failing(&self) -> bool {
        *self.should_fail.lock().unwrap()
    }
}

impl Default for MockCdnBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Stable stand-in for a content hash so repeated uploads of the same bytes
/// produce the same tag.
fn mock_etag(body: &[u8]) -> String {
    let sum = body
        .iter()
        .fold(0xcbf29ce484222325u64, |hash, byte| {
            (hash ^ u64::from(*byte)).wrapping_mul(0x100000001b3)
        });
    format!("\"{:016x}\"", sum)
}

#[async_trait]
impl CdnBackend for MockCdnBackend {
    async fn put_object(&self, request: PutObjectRequest) -> Result<PutObjectOutput> {
        self.puts.lock().unwrap().push(request.clone());
        if self.failing() {
            return Err(Error::Storage(format!("Mock upload failure: {}", request.key)));
        }

        let etag = mock_etag(&request.body);
        self.objects
            .lock()
            .unwrap()
            .insert(request.key.clone(), request);
        Ok(PutObjectOutput { etag: Some(etag) })
    }

    async fn presign_get_object(&self, request: PresignedGetRequest) -> Result<String> {
        self.presigns.lock().unwrap().push(request.clone());
        if self.failing() {
            return Err(Error::Storage(format!("Mock presign failure: {}", request.key)));
        }

        Ok(format!(
            "{}/{}?X-Amz-Expires={}&response-content-type={}&response-cache-control={}",
            self.origin,
            request.key,
            request.expires_in.as_secs(),
            request.response_content_type,
            request.response_cache_control
        ))
    }

    async fn create_invalidation(&self, batch: InvalidationBatch) -> Result<InvalidationReceipt> {
        let mut invalidations = self.invalidations.lock().unwrap();
        invalidations.push(batch);
        if self.failing() {
            return Err(Error::Cdn("Mock invalidation failure".to_string()));
        }

        Ok(InvalidationReceipt {
            id: format!("I{}", invalidations.len()),
            status: "InProgress".to_string(),
            location: None,
        })
    }

    async fn get_metric_statistics(&self, query: MetricsQuery) -> Result<StreamingMetrics> {
        self.metric_queries.lock().unwrap().push(query);
        if self.failing() {
            return Err(Error::Metrics("Mock metrics failure".to_string()));
        }

        Ok(self.metrics.clone())
    }
}
