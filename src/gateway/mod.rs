//! Boundary to the remote inference/price service.

use async_trait::async_trait;
use thiserror::Error;

use crate::insight::{Insight, InsightListing};

pub mod http;

pub use http::HttpGateway;

pub const INSIGHTS_PATH: &str = "news-insights";
pub const ANALYZE_PATH: &str = "analyze-headline";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    /// Transport failure: unreachable host, timeout, non-2xx status.
    #[error("network error: {0}")]
    Network(String),

    /// Body did not match the expected insight shape.
    #[error("decode error: {0}")]
    Decode(String),
}

impl GatewayError {
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Network(_) => "network",
            GatewayError::Decode(_) => "decode",
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else {
            GatewayError::Network(err.to_string())
        }
    }
}

/// The two remote operations. Implementations do no caching: identical calls
/// always reach the service.
#[async_trait]
pub trait AnalysisGateway: Send + Sync {
    /// Bulk listing of pre-computed insights, returned verbatim.
    async fn fetch_insights(&self) -> Result<Vec<Insight>, GatewayError>;

    /// Analyze one headline. Empty headlines are forwarded unchanged.
    async fn analyze(&self, headline: &str) -> Result<Insight, GatewayError>;
}

/// Decode a `{ "insights": [...] }` listing body.
pub fn decode_listing(body: &[u8]) -> Result<Vec<Insight>, GatewayError> {
    serde_json::from_slice::<InsightListing>(body)
        .map(|listing| listing.insights)
        .map_err(|e| GatewayError::Decode(e.to_string()))
}

/// Decode a bare insight object.
pub fn decode_insight(body: &[u8]) -> Result<Insight, GatewayError> {
    serde_json::from_slice(body).map_err(|e| GatewayError::Decode(e.to_string()))
}
