//! CDN gateway for a music streaming service
//!
//! Uploads audio variants to object storage, mints signed and public
//! streaming URLs, invalidates the CDN distribution's cache and reads its
//! download metrics.

pub mod cdn;
pub mod error;
pub mod gateway;
pub mod keys;
pub mod models;

pub use error::{Error, Result};
pub use gateway::CdnGateway;
