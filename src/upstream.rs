//! Strawberry Creek API client
//!
//! Wraps the single outbound call made by the creek-data proxy. Failures come
//! back as [`ProxyError`] values instead of being raised, so the handler can
//! map every outcome to a response.

use hyper::body::Bytes;
use reqwest::StatusCode;
use std::time::Duration;
use url::Url;

use crate::config::UpstreamConfig;
use crate::error::{ProxyError, StartupError};
use crate::handler::proxy::ProxyRequest;

/// UTF-8 byte order mark some upstreams prepend to JSON bodies
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Outcome of one upstream call: the validated JSON body, or why it failed
pub type UpstreamResult = Result<Bytes, ProxyError>;

/// Client for the creek-data endpoint
///
/// Cheap to share: `reqwest::Client` pools connections internally and keeps
/// no per-request state.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig, user_agent: &str) -> Result<Self, StartupError> {
        let base_url =
            Url::parse(&config.base_url).map_err(|source| StartupError::InvalidUpstreamUrl {
                url: config.base_url.clone(),
                source,
            })?;
        let timeout = config.timeout();

        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    /// Replace the request timeout (tests use sub-second values)
    #[cfg(test)]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build `<base>?site=..&start=..&end=..&vars=..` with query encoding
    pub fn build_url(&self, request: &ProxyRequest) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("site", &request.site)
            .append_pair("start", &request.start)
            .append_pair("end", &request.end)
            .append_pair("vars", &request.vars);
        url
    }

    /// Perform exactly one GET against the upstream
    ///
    /// A 200 whose body parses as JSON is returned byte-for-byte, minus a
    /// leading UTF-8 byte order mark.
    pub async fn fetch(&self, request: &ProxyRequest) -> UpstreamResult {
        let url = self.build_url(request);

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(ProxyError::Transport)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ProxyError::UpstreamStatus(status.as_u16()));
        }

        let mut body = response.bytes().await.map_err(ProxyError::Transport)?;
        if body.starts_with(UTF8_BOM) {
            body = body.slice(UTF8_BOM.len()..);
        }
        serde_json::from_slice::<serde::de::IgnoredAny>(&body)?;

        Ok(body)
    }
}
