//! Bridge configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BRIDGE_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`)
//! - `SHOPIFY_APP_URL` - Public URL of this app, used to build the billing
//!   confirmation return URL
//!
//! ## Optional
//! - `BRIDGE_HOST` - Bind address (default: 127.0.0.1)
//! - `BRIDGE_PORT` - Listen port (default: 3000)
//! - `BRIDGE_ENV` - Runtime environment (default: development); anything
//!   other than `production` creates test-mode subscriptions
//! - `SHOPIFY_API_VERSION` - Admin API version (default: 2026-01)
//! - `FACTURIO_URL` - Base URL of the Facturio platform API
//!   (default: <https://app.facturio.io>)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_TRACES_SAMPLE_RATE` - Sentry tracing sample rate (default: 0.0)

use std::net::{IpAddr, SocketAddr};

use secrecy::SecretString;
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Bridge application configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of this app
    pub app_url: String,
    /// Runtime environment (development, staging, production)
    pub environment: String,
    /// Shopify Admin API version
    pub shopify_api_version: String,
    /// Facturio platform API configuration
    pub facturio: FacturioConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry tracing sample rate
    pub sentry_traces_sample_rate: f32,
}

/// Facturio platform API configuration.
#[derive(Debug, Clone)]
pub struct FacturioConfig {
    /// Base URL of the platform API (no trailing slash)
    pub base_url: String,
}

impl BridgeConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("BRIDGE_DATABASE_URL")?;
        let host = get_env_or_default("BRIDGE_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("BRIDGE_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("BRIDGE_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("BRIDGE_PORT".to_string(), e.to_string()))?;
        let app_url = validate_base_url("SHOPIFY_APP_URL", get_required_env("SHOPIFY_APP_URL")?)?;
        let environment = get_env_or_default("BRIDGE_ENV", "development");
        let shopify_api_version = get_env_or_default("SHOPIFY_API_VERSION", "2026-01");
        let facturio = FacturioConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_traces_sample_rate = get_env_or_default("SENTRY_TRACES_SAMPLE_RATE", "0.0")
            .parse::<f32>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("SENTRY_TRACES_SAMPLE_RATE".to_string(), e.to_string())
            })?;

        Ok(Self {
            database_url,
            host,
            port,
            app_url,
            environment,
            shopify_api_version,
            facturio,
            sentry_dsn,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether subscriptions should be created in test mode.
    ///
    /// Only real production installs create real charges.
    #[must_use]
    pub fn billing_test_mode(&self) -> bool {
        self.environment != "production"
    }

    /// The URL Shopify redirects the merchant to after the billing
    /// confirmation page.
    #[must_use]
    pub fn billing_return_url(&self) -> String {
        format!("{}/app/billing/callback", self.app_url)
    }
}

impl FacturioConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_url = validate_base_url(
            "FACTURIO_URL",
            get_env_or_default("FACTURIO_URL", "https://app.facturio.io"),
        )?;
        Ok(Self { base_url })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a base URL, rejecting non-http schemes, and strip any trailing
/// slash so joined paths stay canonical.
fn validate_base_url(var_name: &str, value: String) -> Result<String, ConfigError> {
    let parsed = url::Url::parse(&value)
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            format!("unsupported scheme: {}", parsed.scheme()),
        ));
    }

    Ok(value.trim_end_matches('/').to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_config() -> BridgeConfig {
        BridgeConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            app_url: "https://bridge.facturio.io".to_string(),
            environment: "development".to_string(),
            shopify_api_version: "2026-01".to_string(),
            facturio: FacturioConfig {
                base_url: "https://app.facturio.io".to_string(),
            },
            sentry_dsn: None,
            sentry_traces_sample_rate: 0.0,
        }
    }

    #[test]
    fn socket_addr_combines_host_and_port() {
        let config = test_config();
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn billing_test_mode_outside_production() {
        let mut config = test_config();
        assert!(config.billing_test_mode());

        config.environment = "production".to_string();
        assert!(!config.billing_test_mode());
    }

    #[test]
    fn billing_return_url_appends_callback_path() {
        let config = test_config();
        assert_eq!(
            config.billing_return_url(),
            "https://bridge.facturio.io/app/billing/callback"
        );
    }

    #[test]
    fn validate_base_url_strips_trailing_slash() {
        let url = validate_base_url("TEST", "https://example.com/".to_string()).unwrap();
        assert_eq!(url, "https://example.com");
    }

    #[test]
    fn validate_base_url_rejects_non_http_schemes() {
        assert!(validate_base_url("TEST", "ftp://example.com".to_string()).is_err());
        assert!(validate_base_url("TEST", "not a url".to_string()).is_err());
    }
}
