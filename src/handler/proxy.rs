//! Creek data proxy
//!
//! `GET /api/creek-data/?site=..&start=..&end=..&vars=..` is relayed to the
//! Strawberry Creek API server-side so the browser never makes a
//! cross-origin call. Every outcome, including failures, is answered with a
//! JSON body.

use crate::config::AppState;
use crate::error::ProxyError;
use crate::http;
use crate::logger;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use url::form_urlencoded;

/// Validated query parameters of one creek-data request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRequest {
    pub site: String,
    pub start: String,
    pub end: String,
    pub vars: String,
}

impl ProxyRequest {
    /// Extract the four required parameters from a raw query string
    ///
    /// Values are percent-decoded. A repeated key keeps its last value. An
    /// absent or empty value is a validation failure.
    pub fn from_query(query: Option<&str>) -> Result<Self, ProxyError> {
        let (mut site, mut start, mut end, mut vars) = (None, None, None, None);

        for (key, value) in form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
            let slot = match key.as_ref() {
                "site" => &mut site,
                "start" => &mut start,
                "end" => &mut end,
                "vars" => &mut vars,
                _ => continue,
            };
            *slot = Some(value.into_owned());
        }

        Ok(Self {
            site: required(site)?,
            start: required(start)?,
            end: required(end)?,
            vars: required(vars)?,
        })
    }
}

fn required(value: Option<String>) -> Result<String, ProxyError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(ProxyError::Validation)
}

/// Handle one creek-data request
pub async fn creek_data_proxy(query: Option<&str>, state: &AppState) -> Response<Full<Bytes>> {
    let outcome = match ProxyRequest::from_query(query) {
        Ok(request) => state.upstream.fetch(&request).await,
        Err(err) => Err(err),
    };

    match outcome {
        Ok(payload) => http::build_raw_json_response(StatusCode::OK, payload),
        Err(err) => {
            logger::log_proxy_failure(&err);
            // A reflected 204 or 304 cannot carry a body, so hyper drops the JSON
            // on the wire; the status alone reaches the client
            http::build_json_response(err.status(), &err.to_json_body())
        }
    }
}
