// Configuration module entry point
// Loads layered configuration and holds the shared application state

mod state;
mod types;

use config::builder::{ConfigBuilder, DefaultState};
use std::net::SocketAddr;
use std::time::Duration;

// Re-export public types
pub use state::AppState;
pub use types::{Config, UpstreamConfig};

/// Default config file name (without extension)
pub const DEFAULT_CONFIG_PATH: &str = "config";

/// Environment variable prefix, e.g. `SKYSENSE_SERVER__PORT=9000`
const ENV_PREFIX: &str = "SKYSENSE";

pub const DEFAULT_UPSTREAM_URL: &str = "https://www.strawberrycreek.org/api/creek-data/";

impl Config {
    /// Load configuration from specified file path (without extension)
    /// A missing file is not an error; defaults and environment still apply
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        with_defaults(builder)?.build()?.try_deserialize()
    }

    /// Built-in defaults only, ignoring files and environment
    #[cfg(test)]
    pub fn defaults() -> Result<Self, config::ConfigError> {
        with_defaults(config::Config::builder())?
            .build()?
            .try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }

    /// Mount prefix normalised to "" or "/prefix" (no trailing slash)
    pub fn base_path(&self) -> &str {
        self.server.base_path.trim_end_matches('/')
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(std::cmp::max(
            self.performance.read_timeout,
            self.performance.write_timeout,
        ))
    }
}

impl UpstreamConfig {
    /// Per-request deadline for the creek-data call
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn with_defaults(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
    builder
        .set_default("server.host", "127.0.0.1")?
        .set_default("server.port", 8080)?
        .set_default("server.base_path", "")?
        .set_default("logging.level", "info")?
        .set_default("logging.access_log", true)?
        .set_default("logging.access_log_format", "combined")?
        .set_default("performance.keep_alive_timeout", 5)?
        .set_default("performance.read_timeout", 30)?
        .set_default("performance.write_timeout", 30)?
        .set_default("performance.max_connections", 1000)?
        .set_default(
            "http.server_name",
            concat!("SkySense/", env!("CARGO_PKG_VERSION")),
        )?
        .set_default("http.enable_cors", false)?
        .set_default("http.max_body_size", 1_048_576)? // 1MB
        .set_default("site.template_dir", "templates")?
        .set_default("site.static_dir", "static")?
        .set_default("upstream.base_url", DEFAULT_UPSTREAM_URL)?
        .set_default("upstream.timeout_secs", 10)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::defaults().unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.unix_socket, None);
        assert_eq!(cfg.server.workers, None);
        assert_eq!(cfg.logging.access_log_format, "combined");
        assert_eq!(cfg.performance.max_connections, Some(1000));
        assert_eq!(cfg.upstream.base_url, DEFAULT_UPSTREAM_URL);
        assert_eq!(cfg.upstream.timeout(), Duration::from_secs(10));
        assert!(cfg.http.server_name.starts_with("SkySense/"));
    }

    #[test]
    fn test_socket_addr() {
        let cfg = Config::defaults().unwrap();
        assert_eq!(cfg.get_socket_addr().unwrap().to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn test_base_path_normalised() {
        let mut cfg = Config::defaults().unwrap();
        assert_eq!(cfg.base_path(), "");
        cfg.server.base_path = "/sky-sense/".to_string();
        assert_eq!(cfg.base_path(), "/sky-sense");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skysense.toml");
        std::fs::write(
            &path,
            "[server]\nport = 9000\nbase_path = \"/sky-sense\"\n\n[upstream]\ntimeout_secs = 3\n",
        )
        .unwrap();

        let stem = dir.path().join("skysense");
        let cfg = Config::load_from(stem.to_str().unwrap()).unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.base_path(), "/sky-sense");
        assert_eq!(cfg.upstream.timeout_secs, 3);
        assert_eq!(cfg.server.host, "127.0.0.1");
    }

    #[test]
    fn test_connection_timeout_takes_larger() {
        let mut cfg = Config::defaults().unwrap();
        cfg.performance.read_timeout = 5;
        cfg.performance.write_timeout = 12;
        assert_eq!(cfg.connection_timeout(), Duration::from_secs(12));
    }
}
