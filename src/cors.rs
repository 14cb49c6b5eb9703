//! Cross-Origin Resource Sharing (CORS) configuration.
//!
//! The admin dashboard calls the lifecycle endpoints from the browser, so
//! every endpoint must answer `OPTIONS` preflight requests. The defaults
//! here are deliberately permissive to match what the dashboard sends:
//! any origin, `POST`/`OPTIONS`, and the platform client headers.

use axum::http::{HeaderName, HeaderValue, Method};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_origins")]
    pub allowed_origins: Vec<String>,
    #[serde(default = "default_methods")]
    pub allowed_methods: Vec<String>,
    #[serde(default = "default_headers")]
    pub allowed_headers: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            allowed_origins: default_origins(),
            allowed_methods: default_methods(),
            allowed_headers: default_headers(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_methods() -> Vec<String> {
    vec!["POST".to_string(), "OPTIONS".to_string()]
}

fn default_headers() -> Vec<String> {
    vec![
        "authorization".to_string(),
        "x-client-info".to_string(),
        "apikey".to_string(),
        "content-type".to_string(),
    ]
}

/// Build a tower-http [`CorsLayer`] from a [`CorsConfig`].
///
/// Returns `None` when CORS is disabled.
pub fn build_cors_layer(config: &CorsConfig) -> Option<CorsLayer> {
    if !config.enabled {
        return None;
    }

    let mut layer = CorsLayer::new();

    if config.allowed_origins.len() == 1 && config.allowed_origins[0] == "*" {
        layer = layer.allow_origin(Any);
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        layer = layer.allow_origin(origins);
    }

    let methods: Vec<Method> = config
        .allowed_methods
        .iter()
        .filter_map(|m| m.parse().ok())
        .collect();
    if !methods.is_empty() {
        layer = layer.allow_methods(methods);
    }

    if config.allowed_headers.len() == 1 && config.allowed_headers[0] == "*" {
        layer = layer.allow_headers(Any);
    } else {
        let headers: Vec<HeaderName> = config
            .allowed_headers
            .iter()
            .filter_map(|h| h.parse().ok())
            .collect();
        if !headers.is_empty() {
            layer = layer.allow_headers(headers);
        }
    }

    Some(layer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_builds_layer() {
        let config = CorsConfig::default();
        assert!(config.enabled);
        assert!(build_cors_layer(&config).is_some());
    }

    #[test]
    fn disabled_config_builds_nothing() {
        let config = CorsConfig {
            enabled: false,
            ..CorsConfig::default()
        };
        assert!(build_cors_layer(&config).is_none());
    }

    #[test]
    fn specific_origins_are_accepted() {
        let config = CorsConfig {
            allowed_origins: vec!["https://admin.example.test".to_string()],
            ..CorsConfig::default()
        };
        assert!(build_cors_layer(&config).is_some());
    }
}
