//! Data models and structures
//!
//! Streaming options, upload results, metrics and configuration shared by
//! the gateway and its backends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    #[default]
    Medium,
    High,
    Lossless,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Low => "low",
            Quality::Medium => "medium",
            Quality::High => "high",
            Quality::Lossless => "lossless",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Quality::Low),
            "medium" => Ok(Quality::Medium),
            "high" => Ok(Quality::High),
            "lossless" => Ok(Quality::Lossless),
            other => Err(format!(
                "Invalid quality '{}'. Expected one of: low, medium, high, lossless",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    Aac,
    Flac,
}

impl AudioFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Aac => "aac",
            AudioFormat::Flac => "flac",
        }
    }

    /// MIME type used when storing an object of this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Aac => "audio/aac",
            AudioFormat::Flac => "audio/flac",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mp3" => Ok(AudioFormat::Mp3),
            "aac" => Ok(AudioFormat::Aac),
            "flac" => Ok(AudioFormat::Flac),
            other => Err(format!(
                "Invalid format '{}'. Expected one of: mp3, aac, flac",
                other
            )),
        }
    }
}

/// Requested playback variant. Unset fields fall back to medium / mp3.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamingOptions {
    #[serde(default)]
    pub quality: Option<Quality>,
    #[serde(default)]
    pub format: Option<AudioFormat>,
    #[serde(default)]
    pub bitrate: Option<u32>,
}

impl StreamingOptions {
    pub fn new(quality: Quality, format: AudioFormat) -> Self {
        Self {
            quality: Some(quality),
            format: Some(format),
            bitrate: None,
        }
    }

    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = Some(bitrate);
        self
    }

    pub fn quality(&self) -> Quality {
        self.quality.unwrap_or_default()
    }

    pub fn format(&self) -> AudioFormat {
        self.format.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CdnUploadResult {
    /// Origin (bucket) URL of the stored object.
    pub url: String,
    pub cdn_url: String,
    pub key: String,
    pub etag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricDatapoint {
    pub timestamp: Option<DateTime<Utc>>,
    pub sum: Option<f64>,
    pub average: Option<f64>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StreamingMetrics {
    pub label: Option<String>,
    pub datapoints: Vec<MetricDatapoint>,
}

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: String,
    pub bucket: String,
    pub cdn_domain: String,
    pub distribution_id: String,
    pub dry_run: bool,
}

pub const DEFAULT_REGION: &str = "us-east-1";

impl Config {
    pub fn from_env() -> crate::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| crate::Error::Config(format!("{} not set", name)))
        };

        let config = Self {
            access_key_id: lookup("AWS_ACCESS_KEY_ID").filter(|v| !v.is_empty()),
            secret_access_key: lookup("AWS_SECRET_ACCESS_KEY").filter(|v| !v.is_empty()),
            region: lookup("AWS_REGION")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            bucket: required("AWS_S3_BUCKET")?,
            cdn_domain: required("CLOUDFRONT_DOMAIN")?,
            distribution_id: required("CLOUDFRONT_DISTRIBUTION_ID")?,
            dry_run: lookup("DRY_RUN")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        };

        if config.access_key_id.is_some() != config.secret_access_key.is_some() {
            return Err(crate::Error::Config(
                "AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY must be set together".to_string(),
            ));
        }

        Ok(config)
    }
}
