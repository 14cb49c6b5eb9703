use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

use crate::cors::CorsConfig;
use crate::error::{FitgateError, Result};

/// Main configuration for the fitgate service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub cors: CorsConfig,
    pub platform: PlatformConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

/// Credentials for the hosted identity/profile platform.
///
/// Two tiers: `anon_key` is the caller-scoped credential used only to
/// resolve the caller's bearer token, `service_key` is the elevated
/// credential used for the privileged reconciliation writes. The
/// authorization gate must never be driven by the service key.
#[derive(Clone, Deserialize, Serialize)]
pub struct PlatformConfig {
    pub url: String,
    pub anon_key: String,
    pub service_key: String,
}

impl fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformConfig")
            .field("url", &self.url)
            .field("anon_key", &"[redacted]")
            .field("service_key", &"[redacted]")
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            cors: CorsConfig::default(),
            platform: PlatformConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            service_key: String::new(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ServerConfig {
    pub fn addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

impl PlatformConfig {
    /// Validate that all platform credentials are present.
    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(FitgateError::internal("platform url is not configured"));
        }
        if self.anon_key.is_empty() {
            return Err(FitgateError::internal("platform anon key is not configured"));
        }
        if self.service_key.is_empty() {
            return Err(FitgateError::internal(
                "platform service key is not configured",
            ));
        }
        Ok(())
    }
}

/// Builder for [`Config`] with environment variable support.
#[must_use = "builder does nothing until you call build()"]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.config.server.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn with_cors(mut self, cors: CorsConfig) -> Self {
        self.config.cors = cors;
        self
    }

    pub fn with_platform(
        mut self,
        url: impl Into<String>,
        anon_key: impl Into<String>,
        service_key: impl Into<String>,
    ) -> Self {
        self.config.platform = PlatformConfig {
            url: url.into(),
            anon_key: anon_key.into(),
            service_key: service_key.into(),
        };
        self
    }

    /// Load settings from `FITGATE_*` environment variables.
    ///
    /// Recognized: `FITGATE_HOST`, `FITGATE_PORT`, `FITGATE_LOG_LEVEL`,
    /// `FITGATE_LOG_JSON`, `FITGATE_PLATFORM_URL`, `FITGATE_ANON_KEY`,
    /// `FITGATE_SERVICE_KEY`.
    pub fn from_env(mut self) -> Self {
        if let Ok(host) = std::env::var("FITGATE_HOST") {
            self.config.server.host = host;
        }
        if let Ok(port) = std::env::var("FITGATE_PORT") {
            if let Ok(port) = port.parse() {
                self.config.server.port = port;
            }
        }
        if let Ok(level) = std::env::var("FITGATE_LOG_LEVEL") {
            self.config.logging.level = level;
        }
        if let Ok(json) = std::env::var("FITGATE_LOG_JSON") {
            self.config.logging.json = json.parse().unwrap_or(false);
        }
        if let Ok(url) = std::env::var("FITGATE_PLATFORM_URL") {
            self.config.platform.url = url;
        }
        if let Ok(key) = std::env::var("FITGATE_ANON_KEY") {
            self.config.platform.anon_key = key;
        }
        if let Ok(key) = std::env::var("FITGATE_SERVICE_KEY") {
            self.config.platform.service_key = key;
        }
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
