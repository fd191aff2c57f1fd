//! Error handling and custom error types
//!
//! One variant per external collaborator; the gateway passes these through
//! untouched so callers see exactly what the backend reported.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Object storage error: {0}")]
    Storage(String),

    #[error("CDN control error: {0}")]
    Cdn(String),

    #[error("Metrics error: {0}")]
    Metrics(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
