use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

use crate::config::Config;
use crate::gateway::{decode_insight, decode_listing, AnalysisGateway, GatewayError, ANALYZE_PATH, INSIGHTS_PATH};
use crate::insight::{AnalyzeRequest, Insight};
use crate::logging::{log, log_gateway_failure, log_request, obj, v_str, Domain, Level};

/// reqwest-backed gateway. No retries beyond what the client does by itself.
pub struct HttpGateway {
    client: Client,
    insights_url: String,
    analyze_url: String,
}

impl HttpGateway {
    pub fn new(cfg: &Config) -> Self {
        let mut builder = Client::builder().timeout(Duration::from_secs(cfg.request_timeout_secs));
        // a local dev service is never reached through a system proxy
        if is_loopback(&cfg.api_base) {
            builder = builder.no_proxy();
        }
        Self {
            client: client_or_default(builder.build()),
            insights_url: cfg.endpoint(INSIGHTS_PATH),
            analyze_url: cfg.endpoint(ANALYZE_PATH),
        }
    }

    /// Non-2xx and body read failures are transport errors; decoding is left to the caller.
    async fn read_body(resp: reqwest::Response) -> Result<Vec<u8>, GatewayError> {
        let resp = resp
            .error_for_status()
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Fall back to a stock client, which loses the timeout and proxy settings.
fn client_or_default<E: std::fmt::Display>(built: Result<Client, E>) -> Client {
    built.unwrap_or_else(|err| {
        log(
            Level::Warn,
            Domain::Gateway,
            "client_fallback",
            obj(&[("msg", v_str(&format!("client build failed, using defaults: {}", err)))]),
        );
        Client::new()
    })
}

fn is_loopback(base: &str) -> bool {
    match Url::parse(base).ok().and_then(|u| u.host_str().map(str::to_owned)) {
        Some(host) => host == "localhost" || host == "127.0.0.1" || host == "[::1]",
        None => false,
    }
}

fn report<T>(op: &str, res: Result<T, GatewayError>) -> Result<T, GatewayError> {
    if let Err(err) = &res {
        log_gateway_failure(op, err.kind(), &err.to_string());
    }
    res
}

#[async_trait]
impl AnalysisGateway for HttpGateway {
    async fn fetch_insights(&self) -> Result<Vec<Insight>, GatewayError> {
        log_request("GET", &self.insights_url);
        let res = async {
            let resp = self.client.get(&self.insights_url).send().await?;
            let body = Self::read_body(resp).await?;
            decode_listing(&body)
        }
        .await;
        report("fetch_insights", res)
    }

    async fn analyze(&self, headline: &str) -> Result<Insight, GatewayError> {
        log_request("POST", &self.analyze_url);
        let req = AnalyzeRequest {
            headline: headline.to_string(),
        };
        let res = async {
            let resp = self.client.post(&self.analyze_url).json(&req).send().await?;
            let body = Self::read_body(resp).await?;
            decode_insight(&body)
        }
        .await;
        report("analyze", res)
    }
}
