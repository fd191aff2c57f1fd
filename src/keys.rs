//! Storage key layout and URL construction.
//!
//! Everything here is pure so that uploads, signed URLs and CDN URLs agree
//! on an object's location without any lookup.

use crate::models::{AudioFormat, Quality, StreamingOptions};

/// `tracks/{track_id}/{quality}.{format}`
pub fn storage_key(track_id: &str, quality: Quality, format: AudioFormat) -> String {
    format!("tracks/{}/{}.{}", track_id, quality, format)
}

/// Storage key for the variant described by `options`, defaults applied.
pub fn track_key(track_id: &str, options: &StreamingOptions) -> String {
    storage_key(track_id, options.quality(), options.format())
}

pub fn cdn_url(cdn_domain: &str, key: &str) -> String {
    format!("https://{}/{}", cdn_domain, key)
}

/// Virtual-hosted S3 URL of an object in its origin bucket.
pub fn origin_url(bucket: &str, region: &str, key: &str) -> String {
    format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key)
}

/// Makes an invalidation path absolute. Paths that already start with `/`
/// are returned unchanged.
pub fn invalidation_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

pub fn caller_reference(epoch_millis: i64) -> String {
    format!("invalidation-{}", epoch_millis)
}
