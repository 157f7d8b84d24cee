//! Server configuration
//!
//! Values are layered with the `config` crate:
//! 1. Built-in defaults
//! 2. Optional TOML file (`mathrpc.toml` or `--config <path>`)
//! 3. Environment variables prefixed `MATHRPC_` (e.g. `MATHRPC_PORT=5001`)
//!
//! Every key is read on its own. A value that cannot be converted or fails
//! validation logs a warning and keeps the default, so loading never fails.
//!
//! The remote-service credential is read from `remote_api_key`, then
//! `GEMINI_API_KEY`, then `GOOGLE_API_KEY`.

use crate::services::solver::{SolverConfig, MIN_CREDENTIAL_LEN};
use config::{Config, ConfigError, Environment, File};
use serde::de::DeserializeOwned;
use std::env;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "mathrpc.toml";

/// Above this the cache limit still applies but rewrites get slow.
const MAX_RECOMMENDED_CACHE_BYTES: u64 = 50_000_000;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                                  (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36";

/// Complete server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// Bind port
    pub port: u16,

    /// Idle timeout for outbound calls and the client stub
    pub connection_timeout_secs: u64,

    /// Cache file location
    pub cache_file: PathBuf,

    /// Maximum size of the cache file
    pub cache_limit_bytes: u64,

    /// Headline count when `ultimas_noticias` gets no argument
    pub default_headline_count: usize,

    /// Front page scraped for headlines
    pub news_url: String,

    /// User agent for the headline fetch
    pub user_agent: String,

    /// Remote solver credential (empty = not configured)
    pub remote_api_key: String,

    /// Primary remote model
    pub remote_model: String,

    /// Models tried, in order, when a model is unknown to the service
    pub remote_fallback_models: Vec<String>,

    /// Verbose logging
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            connection_timeout_secs: 10,
            cache_file: PathBuf::from("cache_servidor.json"),
            cache_limit_bytes: 30_720,
            default_headline_count: 5,
            news_url: "https://www.uol.com.br/".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            remote_api_key: String::new(),
            remote_model: "gemini-2.0-flash".to_string(),
            remote_fallback_models: vec!["gemini-1.5-flash".to_string(), "gemini-pro".to_string()],
            debug: false,
        }
    }
}

impl ServerConfig {
    /// Load from defaults, the optional file and the environment
    pub fn load(path: Option<&Path>) -> Self {
        let file = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let required = path.is_some();

        let source = Config::builder()
            .add_source(File::from(file.clone()).required(required))
            .add_source(Environment::with_prefix("MATHRPC"))
            .build();

        let mut config = match source {
            Ok(source) => Self::from_source(&source),
            Err(e) => {
                warn!(
                    "Could not read configuration from {}, using defaults: {}",
                    file.display(),
                    e
                );
                Self::default()
            }
        };

        if config.remote_api_key.is_empty() {
            config.remote_api_key = env::var("GEMINI_API_KEY")
                .or_else(|_| env::var("GOOGLE_API_KEY"))
                .unwrap_or_default();
        }

        config.warn_on_suspicious_values();
        config
    }

    /// Build from an already-assembled source, falling back per key
    pub fn from_source(source: &Config) -> Self {
        let defaults = Self::default();

        let remote_fallback_models = match source.get::<Vec<String>>("remote_fallback_models") {
            Ok(models) => models,
            Err(ConfigError::NotFound(_)) => defaults.remote_fallback_models.clone(),
            Err(_) => match source.get_string("remote_fallback_models") {
                Ok(list) => list
                    .split(',')
                    .map(|m| m.trim().to_string())
                    .filter(|m| !m.is_empty())
                    .collect(),
                Err(e) => {
                    warn!("Invalid remote_fallback_models, using default: {}", e);
                    defaults.remote_fallback_models.clone()
                }
            },
        };

        Self {
            host: read_key(source, "host", defaults.host, |h: &String| !h.trim().is_empty()),
            port: read_key(source, "port", defaults.port, |p: &u16| *p != 0),
            connection_timeout_secs: read_key(
                source,
                "connection_timeout_secs",
                defaults.connection_timeout_secs,
                |t: &u64| *t > 0,
            ),
            cache_file: read_key(source, "cache_file", defaults.cache_file, |p: &PathBuf| {
                !p.as_os_str().is_empty()
            }),
            cache_limit_bytes: read_key(
                source,
                "cache_limit_bytes",
                defaults.cache_limit_bytes,
                |l: &u64| *l > 0,
            ),
            default_headline_count: read_key(
                source,
                "default_headline_count",
                defaults.default_headline_count,
                |c: &usize| *c > 0,
            ),
            news_url: read_key(source, "news_url", defaults.news_url, |u: &String| {
                u.starts_with("http://") || u.starts_with("https://")
            }),
            user_agent: read_key(source, "user_agent", defaults.user_agent, |_: &String| true),
            remote_api_key: read_key(
                source,
                "remote_api_key",
                defaults.remote_api_key,
                |_: &String| true,
            ),
            remote_model: read_key(source, "remote_model", defaults.remote_model, |m: &String| {
                !m.trim().is_empty()
            }),
            remote_fallback_models,
            debug: read_key(source, "debug", defaults.debug, |_: &bool| true),
        }
    }

    fn warn_on_suspicious_values(&self) {
        if self.cache_limit_bytes > MAX_RECOMMENDED_CACHE_BYTES {
            warn!(
                "cache_limit_bytes is very large ({} bytes); every request rewrites the whole file",
                self.cache_limit_bytes
            );
        }
        if !self.remote_api_key.is_empty() && self.remote_api_key.len() < MIN_CREDENTIAL_LEN {
            warn!("Remote API key looks too short; the remote solver tier will be skipped");
        }
    }

    /// `host:port` string for binding and connecting
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    pub fn solver_config(&self) -> SolverConfig {
        SolverConfig {
            api_key: self.remote_api_key.clone(),
            primary_model: self.remote_model.clone(),
            fallback_models: self.remote_fallback_models.clone(),
        }
    }
}

fn read_key<T, F>(source: &Config, key: &str, default: T, valid: F) -> T
where
    T: DeserializeOwned + Debug,
    F: Fn(&T) -> bool,
{
    match source.get::<T>(key) {
        Ok(value) if valid(&value) => {
            debug!("config {} loaded", key);
            value
        }
        Ok(value) => {
            warn!("Invalid value for {}: {:?}, using default {:?}", key, value, default);
            default
        }
        Err(ConfigError::NotFound(_)) => default,
        Err(e) => {
            warn!("Invalid value for {} ({}), using default {:?}", key, e, default);
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;
    use serial_test::serial;

    fn from_toml(toml: &str) -> ServerConfig {
        let source = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap();
        ServerConfig::from_source(&source)
    }

    #[test]
    fn test_defaults_when_empty() {
        let config = from_toml("");
        assert_eq!(config.port, 5000);
        assert_eq!(config.cache_limit_bytes, 30_720);
        assert_eq!(config.default_headline_count, 5);
        assert_eq!(config.addr(), "127.0.0.1:5000");
    }

    #[test]
    fn test_values_from_file() {
        let config = from_toml(
            r#"
            host = "0.0.0.0"
            port = 6000
            cache_limit_bytes = 4096
            remote_fallback_models = ["a", "b"]
            debug = true
            "#,
        );
        assert_eq!(config.addr(), "0.0.0.0:6000");
        assert_eq!(config.cache_limit_bytes, 4096);
        assert_eq!(config.remote_fallback_models, vec!["a", "b"]);
        assert!(config.debug);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = from_toml(
            r#"
            port = "not-a-port"
            cache_limit_bytes = 0
            connection_timeout_secs = 0
            default_headline_count = 0
            news_url = "ftp://example.com"
            "#,
        );
        let defaults = ServerConfig::default();
        assert_eq!(config.port, defaults.port);
        assert_eq!(config.cache_limit_bytes, defaults.cache_limit_bytes);
        assert_eq!(config.connection_timeout_secs, defaults.connection_timeout_secs);
        assert_eq!(config.default_headline_count, defaults.default_headline_count);
        assert_eq!(config.news_url, defaults.news_url);
    }

    #[test]
    fn test_comma_separated_models() {
        let config = from_toml(r#"remote_fallback_models = "m1, m2,,m3""#);
        assert_eq!(config.remote_fallback_models, vec!["m1", "m2", "m3"]);
    }

    #[test]
    #[serial]
    fn test_environment_overrides() {
        env::set_var("MATHRPC_PORT", "5055");
        env::set_var("MATHRPC_CACHE_LIMIT_BYTES", "oops");

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("mathrpc.toml");
        std::fs::write(&path, "port = 6000\ncache_limit_bytes = 2048\n").unwrap();

        let config = ServerConfig::load(Some(&path));

        env::remove_var("MATHRPC_PORT");
        env::remove_var("MATHRPC_CACHE_LIMIT_BYTES");

        assert_eq!(config.port, 5055);
        assert_eq!(config.cache_limit_bytes, ServerConfig::default().cache_limit_bytes);
    }

    #[test]
    #[serial]
    fn test_missing_required_file_uses_defaults() {
        let config = ServerConfig::load(Some(Path::new("/nonexistent/mathrpc.toml")));
        assert_eq!(config.port, 5000);
    }

    #[test]
    fn test_solver_config() {
        let config = ServerConfig {
            remote_api_key: "abc".into(),
            ..ServerConfig::default()
        };
        let solver = config.solver_config();
        assert_eq!(solver.api_key, "abc");
        assert_eq!(solver.primary_model, "gemini-2.0-flash");
        assert_eq!(solver.fallback_models.len(), 2);
    }
}
