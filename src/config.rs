// SPDX-License-Identifier: MIT

//! Application configuration loaded from environment variables.
//!
//! Secrets are read once at startup and kept in memory; in production the
//! deployment platform injects them as environment variables.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL for OAuth redirects and CORS
    pub frontend_url: String,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// OAuth client ID (public)
    pub oauth_client_id: String,
    /// Bucket name for avatar uploads
    pub avatar_bucket: String,
    /// Public base URL for objects in the avatar bucket
    pub avatar_public_base: String,
    /// Seconds between realtime health probes
    pub realtime_health_interval_secs: u64,

    // --- Secrets ---
    /// OAuth client secret
    pub oauth_client_secret: String,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key for signing the OAuth state parameter
    pub oauth_state_key: Vec<u8>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            oauth_client_id: env::var("OAUTH_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("OAUTH_CLIENT_ID"))?,
            avatar_bucket: env::var("AVATAR_BUCKET").unwrap_or_else(|_| "avatars".to_string()),
            avatar_public_base: env::var("AVATAR_PUBLIC_BASE")
                .unwrap_or_else(|_| "https://storage.googleapis.com/avatars".to_string()),
            realtime_health_interval_secs: env::var("REALTIME_HEALTH_INTERVAL")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),

            oauth_client_secret: env::var("OAUTH_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("OAUTH_CLIENT_SECRET"))?,
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            oauth_state_key: env::var("OAUTH_STATE_KEY")
                .map_err(|_| ConfigError::Missing("OAUTH_STATE_KEY"))?
                .into_bytes(),
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            oauth_client_id: "test_client_id".to_string(),
            avatar_bucket: "avatars".to_string(),
            avatar_public_base: "http://localhost:9000/avatars".to_string(),
            realtime_health_interval_secs: 30,
            oauth_client_secret: "test_secret".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!!".to_vec(),
            oauth_state_key: b"test_state_key_32_bytes_minimum!".to_vec(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        // Set required env vars for test
        env::set_var("OAUTH_CLIENT_ID", "test_id");
        env::set_var("OAUTH_CLIENT_SECRET", "test_secret");
        env::set_var("JWT_SIGNING_KEY", "test_jwt_key_32_bytes_minimum!!");
        env::set_var("OAUTH_STATE_KEY", "test_state_key_32_bytes_minimum");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.oauth_client_id, "test_id");
        assert_eq!(config.oauth_client_secret, "test_secret");
        assert_eq!(config.port, 8080);
        assert_eq!(config.avatar_bucket, "avatars");
    }

    #[test]
    fn test_default_is_self_consistent() {
        let config = Config::test_default();
        assert!(config.jwt_signing_key.len() >= 32);
        assert!(config.oauth_state_key.len() >= 32);
    }
}
