use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use yup_oauth2::storage::{TokenInfo, TokenStorage};
use yup_oauth2::{InstalledFlowAuthenticator, InstalledFlowReturnMethod};

use super::credential::Credential;
use crate::config::ClientConfig;

pub const DEFAULT_CALLBACK_PORT: u16 = 3000;
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("failed to prepare client descriptor: {0}")]
    Descriptor(#[source] std::io::Error),
    #[error("authorization flow failed: {0}")]
    Flow(String),
    #[error("no authorization was completed within {0:?}")]
    TimedOut(Duration),
    #[error("provider did not issue an access token")]
    NoTokenIssued,
    #[error(transparent)]
    Store(#[from] super::store::StoreError),
}

// Interactive authorization seam, mocked so credential acquisition can be
// tested without a browser round trip.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthCodeExchanger: Send + Sync {
    async fn exchange(
        &self,
        config: &ClientConfig,
        scopes: &[String],
    ) -> Result<Credential, AuthError>;
}

/// Runs the installed-app authorization code flow with a local callback
/// listener on a fixed port.
pub struct InstalledAppExchanger {
    port: u16,
    timeout: Duration,
    descriptor_path: PathBuf,
}

impl InstalledAppExchanger {
    pub fn new(port: u16, timeout: Duration) -> Self {
        let descriptor_path = std::env::temp_dir().join(format!(
            "inbox-export-client-{}.json",
            std::process::id()
        ));
        Self {
            port,
            timeout,
            descriptor_path,
        }
    }
}

#[async_trait]
impl AuthCodeExchanger for InstalledAppExchanger {
    async fn exchange(
        &self,
        config: &ClientConfig,
        scopes: &[String],
    ) -> Result<Credential, AuthError> {
        // Removed when this guard drops, on success and on every error path.
        let descriptor = ClientDescriptor::materialize(config, &self.descriptor_path)?;
        let secret = yup_oauth2::read_application_secret(descriptor.path())
            .await
            .map_err(AuthError::Descriptor)?;

        let captured = CapturedToken::default();
        let auth = InstalledFlowAuthenticator::builder(
            secret,
            InstalledFlowReturnMethod::HTTPPortRedirect(self.port),
        )
        .with_storage(Box::new(captured.clone()))
        .build()
        .await
        .map_err(|e| AuthError::Flow(e.to_string()))?;

        tracing::info!(port = self.port, "waiting for authorization in the browser");
        let scope_refs: Vec<&str> = scopes.iter().map(|s| s.as_str()).collect();
        tokio::time::timeout(self.timeout, auth.token(&scope_refs))
            .await
            .map_err(|_| AuthError::TimedOut(self.timeout))?
            .map_err(|e| AuthError::Flow(e.to_string()))?;

        let info = captured.take().ok_or(AuthError::NoTokenIssued)?;
        credential_from_token_info(info, config, scopes)
    }
}

fn credential_from_token_info(
    info: TokenInfo,
    config: &ClientConfig,
    scopes: &[String],
) -> Result<Credential, AuthError> {
    let access_token = info
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::NoTokenIssued)?;
    let expiry = info
        .expires_at
        .and_then(|at| DateTime::<Utc>::from_timestamp(at.unix_timestamp(), 0));

    Ok(Credential {
        access_token,
        refresh_token: info.refresh_token,
        token_uri: config.token_uri.clone(),
        client_id: config.client_id.clone(),
        client_secret: config.client_secret.clone(),
        scopes: scopes.to_vec(),
        expiry,
    })
}

/// Captures the token issued by the flow instead of persisting it, so the
/// credential store stays the only owner of persisted state.
#[derive(Clone, Default)]
struct CapturedToken {
    slot: Arc<Mutex<Option<TokenInfo>>>,
}

impl CapturedToken {
    fn take(&self) -> Option<TokenInfo> {
        self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}

#[async_trait]
impl TokenStorage for CapturedToken {
    async fn set(&self, _scopes: &[&str], token: TokenInfo) -> anyhow::Result<()> {
        *self
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(token);
        Ok(())
    }

    async fn get(&self, _target_scopes: &[&str]) -> Option<TokenInfo> {
        None
    }
}

#[derive(Serialize)]
struct InstalledDescriptor<'a> {
    installed: &'a ClientConfig,
}

/// Client-secret file in the layout the authorization library reads.
/// Deleted on drop.
struct ClientDescriptor {
    path: PathBuf,
}

impl ClientDescriptor {
    fn materialize(config: &ClientConfig, path: &Path) -> Result<Self, AuthError> {
        let json = serde_json::to_vec(&InstalledDescriptor { installed: config })
            .map_err(|e| AuthError::Descriptor(e.into()))?;
        std::fs::write(path, json).map_err(AuthError::Descriptor)?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ClientDescriptor {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove client descriptor");
            }
        }
    }
}
