use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;

use super::credential::Credential;

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("credential has no refresh token")]
    MissingRefreshToken,
    #[error("token endpoint unreachable: {0}")]
    Http(#[from] reqwest::Error),
    #[error("token endpoint rejected the refresh token ({status}): {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, credential: &Credential) -> Result<Credential, RefreshError>;
}

/// Exchanges a refresh token at the credential's token endpoint.
pub struct OAuthRefresher {
    client: reqwest::Client,
}

impl OAuthRefresher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TokenRefresher for OAuthRefresher {
    async fn refresh(&self, credential: &Credential) -> Result<Credential, RefreshError> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(RefreshError::MissingRefreshToken)?;

        let params = [
            ("client_id", credential.client_id.as_str()),
            ("client_secret", credential.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .client
            .post(&credential.token_uri)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RefreshError::Rejected { status, body });
        }

        let refreshed: RefreshResponse = response.json().await?;
        Ok(apply_refresh(credential, refreshed))
    }
}

fn apply_refresh(previous: &Credential, response: RefreshResponse) -> Credential {
    let scopes = response
        .scope
        .map(|s| s.split_whitespace().map(str::to_string).collect())
        .unwrap_or_else(|| previous.scopes.clone());

    Credential {
        access_token: response.access_token,
        refresh_token: response
            .refresh_token
            .or_else(|| previous.refresh_token.clone()),
        token_uri: previous.token_uri.clone(),
        client_id: previous.client_id.clone(),
        client_secret: previous.client_secret.clone(),
        scopes,
        expiry: response
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs)),
    }
}
