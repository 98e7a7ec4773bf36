use anyhow::{anyhow, Result};
use url::Url;

pub const DEFAULT_API_BASE: &str = "https://sharkfin-2mrg.onrender.com";

/// How analysis responses that land out of submission order are recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseOrdering {
    /// Prepend on arrival, whatever order the requests were submitted in.
    #[default]
    Arrival,
    /// Keep ad-hoc results in submission order; a stale response never
    /// replaces a newer current result.
    Submission,
}

impl ResponseOrdering {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "arrival" => Some(ResponseOrdering::Arrival),
            "submission" => Some(ResponseOrdering::Submission),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base: String,
    pub request_timeout_secs: u64,
    pub ordering: ResponseOrdering,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout_secs: 30,
            ordering: ResponseOrdering::default(),
        }
    }
}

impl Config {
    pub fn with_base(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            ..Self::default()
        }
    }

    pub fn from_env() -> Self {
        Self {
            api_base: std::env::var("INSIGHT_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            request_timeout_secs: std::env::var("INSIGHT_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(30),
            ordering: std::env::var("INSIGHT_ORDERING").ok().and_then(|v| ResponseOrdering::parse(&v)).unwrap_or_default(),
        }
    }

    /// Reject bases that are not absolute http(s) URLs, and a zero timeout.
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            return Err(anyhow!("request timeout must be at least one second"));
        }
        let url = Url::parse(&self.api_base)
            .map_err(|e| anyhow!("invalid api base {:?}: {}", self.api_base, e))?;
        match url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(anyhow!("unsupported scheme {:?} in api base", other)),
        }
    }

    /// `{base}/{path}` with exactly one slash between them.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
