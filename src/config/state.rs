// Application state module
// Shared by every connection; holds no per-request mutable data

use super::types::Config;
use crate::error::StartupError;
use crate::upstream::UpstreamClient;

/// Application state
pub struct AppState {
    pub config: Config,
    /// Pooled client for the Strawberry Creek API
    pub upstream: UpstreamClient,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self, StartupError> {
        let upstream = UpstreamClient::new(&config.upstream, &config.http.server_name)?;

        Ok(Self {
            config: config.clone(),
            upstream,
        })
    }
}
