//! OAuth client configuration sourced from the environment.
//!
//! Values are read from process environment variables; a `.env` file in the
//! working directory is loaded first by the binary, if present.

use serde::{Deserialize, Serialize};

pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const DEFAULT_TOKEN_URI: &str = crate::auth::credential::DEFAULT_TOKEN_URI;
pub const DEFAULT_CERT_URL: &str = "https://www.googleapis.com/oauth2/v1/certs";

pub const ENV_CLIENT_ID: &str = "GOOGLE_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "GOOGLE_CLIENT_SECRET";
pub const ENV_PROJECT_ID: &str = "GOOGLE_PROJECT_ID";
pub const ENV_AUTH_URI: &str = "GOOGLE_AUTH_URI";
pub const ENV_TOKEN_URI: &str = "GOOGLE_TOKEN_URI";
pub const ENV_CERT_URL: &str = "GOOGLE_AUTH_PROVIDER_X509_CERT_URL";
pub const ENV_REDIRECT_URIS: &str = "GOOGLE_REDIRECT_URIS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
}

/// OAuth client parameters. Read once per run and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub auth_uri: String,
    pub token_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_provider_x509_cert_url: Option<String>,
    pub redirect_uris: Vec<String>,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source. Blank values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let redirect_uris = get(ENV_REDIRECT_URIS)
            .map(|v| {
                v.split(',')
                    .map(|uri| uri.trim().to_string())
                    .filter(|uri| !uri.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            client_id: require(ENV_CLIENT_ID)?,
            client_secret: require(ENV_CLIENT_SECRET)?,
            project_id: get(ENV_PROJECT_ID),
            auth_uri: get(ENV_AUTH_URI).unwrap_or_else(|| DEFAULT_AUTH_URI.to_string()),
            token_uri: get(ENV_TOKEN_URI).unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            auth_provider_x509_cert_url: get(ENV_CERT_URL)
                .or_else(|| Some(DEFAULT_CERT_URL.to_string())),
            redirect_uris,
        })
    }
}
