//! Application configuration from file and environment variables
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Environment variables (prefixed with VALIDATEME_)
//! 2. Config file (config.toml)
//! 3. Default values
//!
//! Secrets like the database password and the cookie signing key should be
//! kept in environment variables, not in the config file.

use config::{Config, ConfigError, Environment, File};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Global application configuration
pub static APP_CONFIG: Lazy<RwLock<AppConfig>> = Lazy::new(|| {
    RwLock::new(AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config file, using defaults: {}", e);
        AppConfig::default()
    }))
});

/// Site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub name: String,
    /// Public origin used to build share links, without a trailing slash.
    pub base_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: "ValidateMe".to_string(),
            base_url: "http://localhost:8080".to_string(),
        }
    }
}

impl SiteConfig {
    /// Public link respondents follow to answer a poll.
    pub fn share_url(&self, question_id: uuid::Uuid) -> String {
        format!("{}/polls/{}", self.base_url.trim_end_matches('/'), question_id)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Postgres URL (should be in env var VALIDATEME_DATABASE__URL).
    /// Empty selects the in-memory store.
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
        }
    }
}

/// Security configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Session lifetime in minutes (default: 24 hours)
    pub session_ttl_minutes: u32,
    /// Only send the session cookie over HTTPS
    pub cookie_secure: bool,
    /// Cookie signing key, at least 64 bytes
    /// (should be in env var VALIDATEME_SECURITY__SECRET_KEY)
    #[serde(default)]
    pub secret_key: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            session_ttl_minutes: 1440,
            cookie_secure: false,
            secret_key: String::new(),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub site: SiteConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
}

impl AppConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &str) -> Result<Self, ConfigError> {
        use config::FileFormat;

        let config = Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(File::new(path, FileFormat::Toml).required(false))
            // e.g., VALIDATEME_DATABASE__URL, VALIDATEME_SITE__BASE_URL
            .add_source(
                Environment::with_prefix("VALIDATEME")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

/// Initialize application configuration
///
/// This triggers the lazy loading of the config file and logs the result.
/// Should be called early in application startup.
pub fn init() {
    let config = get_config();
    log::info!(
        "Configuration loaded: site.name = {}, server.bind = {}",
        config.site.name,
        config.server.bind
    );
}

/// Replace the global configuration. Used by tests and reload paths.
pub fn set_config(new_config: AppConfig) {
    if let Ok(mut config) = APP_CONFIG.write() {
        *config = new_config;
    }
}

/// Get the current application configuration
pub fn get_config() -> AppConfig {
    APP_CONFIG.read().map(|c| c.clone()).unwrap_or_default()
}

pub fn site() -> SiteConfig {
    get_config().site
}

pub fn server() -> ServerConfig {
    get_config().server
}

pub fn database() -> DatabaseConfig {
    get_config().database
}

pub fn security() -> SecurityConfig {
    get_config().security
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.site.name, "ValidateMe");
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert!(config.database.url.is_empty());
        assert_eq!(config.security.session_ttl_minutes, 1440);
        assert!(!config.security.cookie_secure);
    }

    #[test]
    fn test_share_url_trims_trailing_slash() {
        let site = SiteConfig {
            base_url: "https://validate.me/".to_string(),
            ..Default::default()
        };
        let id = uuid::Uuid::nil();
        assert_eq!(
            site.share_url(id),
            "https://validate.me/polls/00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut temp_file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[site]
name = "Test Polls"
base_url = "https://polls.example.com"

[database]
max_connections = 3

[security]
session_ttl_minutes = 60
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(temp_file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.site.name, "Test Polls");
        assert_eq!(config.site.base_url, "https://polls.example.com");
        assert_eq!(config.database.max_connections, 3);
        assert_eq!(config.security.session_ttl_minutes, 60);
        // Defaults should still apply for unspecified values
        assert_eq!(config.server.bind, "0.0.0.0:8080");
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let config = AppConfig::load_from_path("/nonexistent/config.toml").unwrap();
        assert_eq!(config.site.name, "ValidateMe");
        assert_eq!(config.database.max_connections, 10);
    }
}
