//! Credential lifecycle: load the stored token, refresh it when expired, and
//! fall back to the interactive authorization flow.
//!
//! - credential: the persisted token record and its validity rules
//! - store: token persistence (file or memory)
//! - refresh: refresh-token exchange
//! - flow: interactive authorization code flow

pub mod credential;
pub mod flow;
pub mod refresh;
pub mod store;

use chrono::Utc;

pub use credential::Credential;
pub use flow::{AuthCodeExchanger, AuthError, InstalledAppExchanger};
pub use refresh::{OAuthRefresher, RefreshError, TokenRefresher};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore, StoreError};

use crate::config::ClientConfig;

pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

pub fn default_scopes() -> Vec<String> {
    vec![GMAIL_READONLY_SCOPE.to_string()]
}

enum AcquireState {
    NoToken,
    Loaded(Credential),
    Expired(Credential),
    Refreshed(Credential),
    Authenticated(Credential),
}

impl AcquireState {
    fn name(&self) -> &'static str {
        match self {
            AcquireState::NoToken => "no_token",
            AcquireState::Loaded(_) => "loaded",
            AcquireState::Expired(_) => "expired",
            AcquireState::Refreshed(_) => "refreshed",
            AcquireState::Authenticated(_) => "authenticated",
        }
    }
}

/// Produces a usable credential for `scopes`.
///
/// A stored valid credential is returned untouched. An expired one is
/// refreshed; a refresh failure is logged and falls through to the
/// interactive flow. Any credential obtained by refresh or authorization is
/// saved before returning. Only authorization and store failures are errors.
pub async fn acquire_credential<S, R, X>(
    store: &S,
    refresher: &R,
    exchanger: &X,
    config: &ClientConfig,
    scopes: &[String],
) -> Result<Credential, AuthError>
where
    S: CredentialStore + ?Sized,
    R: TokenRefresher + ?Sized,
    X: AuthCodeExchanger + ?Sized,
{
    let mut state = match store.load()? {
        Some(credential) if credential.covers(scopes) => AcquireState::Loaded(credential),
        Some(_) => {
            tracing::warn!("stored token lacks the requested scopes, re-authenticating");
            AcquireState::NoToken
        }
        None => AcquireState::NoToken,
    };

    loop {
        tracing::debug!(state = state.name(), "credential state");
        state = match state {
            AcquireState::Loaded(credential) => {
                if credential.is_valid(Utc::now()) {
                    AcquireState::Authenticated(credential)
                } else {
                    AcquireState::Expired(credential)
                }
            }
            AcquireState::Expired(credential) => {
                if !credential.has_refresh_token() {
                    tracing::info!("token expired and cannot be refreshed");
                    AcquireState::NoToken
                } else {
                    match refresher.refresh(&credential).await {
                        Ok(refreshed) => AcquireState::Refreshed(refreshed),
                        Err(e) => {
                            tracing::warn!(error = %e, "failed to refresh token, starting a new authorization flow");
                            AcquireState::NoToken
                        }
                    }
                }
            }
            AcquireState::Refreshed(credential) => {
                store.save(&credential)?;
                tracing::info!("access token refreshed");
                return Ok(credential);
            }
            AcquireState::NoToken => {
                let credential = exchanger.exchange(config, scopes).await?;
                store.save(&credential)?;
                tracing::info!("authorization complete");
                return Ok(credential);
            }
            AcquireState::Authenticated(credential) => return Ok(credential),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::flow::MockAuthCodeExchanger;
    use crate::auth::refresh::MockTokenRefresher;
    use crate::auth::store::MockCredentialStore;
    use crate::config::{DEFAULT_AUTH_URI, DEFAULT_TOKEN_URI};
    use chrono::{Duration, Utc};

    fn config() -> ClientConfig {
        ClientConfig {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            project_id: None,
            auth_uri: DEFAULT_AUTH_URI.to_string(),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            auth_provider_x509_cert_url: None,
            redirect_uris: vec![],
        }
    }

    fn credential(token: &str, expires_in: Duration) -> Credential {
        Credential {
            access_token: token.to_string(),
            refresh_token: Some("1//refresh".to_string()),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            scopes: default_scopes(),
            expiry: Some(Utc::now() + expires_in),
        }
    }

    #[tokio::test]
    async fn test_valid_token_skips_refresh_and_authorization() {
        let mut store = MockCredentialStore::new();
        store
            .expect_load()
            .returning(|| Ok(Some(credential("valid", Duration::hours(1)))));
        store.expect_save().never();
        let mut refresher = MockTokenRefresher::new();
        refresher.expect_refresh().never();
        let mut exchanger = MockAuthCodeExchanger::new();
        exchanger.expect_exchange().never();

        let cred = acquire_credential(&store, &refresher, &exchanger, &config(), &default_scopes())
            .await
            .unwrap();

        assert_eq!(cred.access_token, "valid");
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_and_saved() {
        let mut store = MockCredentialStore::new();
        store
            .expect_load()
            .returning(|| Ok(Some(credential("stale", -Duration::hours(1)))));
        store
            .expect_save()
            .withf(|c| c.access_token == "fresh")
            .times(1)
            .returning(|_| Ok(()));
        let mut refresher = MockTokenRefresher::new();
        refresher
            .expect_refresh()
            .times(1)
            .returning(|_| Ok(credential("fresh", Duration::hours(1))));
        let mut exchanger = MockAuthCodeExchanger::new();
        exchanger.expect_exchange().never();

        let cred = acquire_credential(&store, &refresher, &exchanger, &config(), &default_scopes())
            .await
            .unwrap();

        assert_eq!(cred.access_token, "fresh");
    }

    #[tokio::test]
    async fn test_rejected_refresh_falls_through_to_authorization() {
        let mut store = MockCredentialStore::new();
        store
            .expect_load()
            .returning(|| Ok(Some(credential("stale", -Duration::hours(1)))));
        store
            .expect_save()
            .withf(|c| c.access_token == "reauthorized")
            .times(1)
            .returning(|_| Ok(()));
        let mut refresher = MockTokenRefresher::new();
        refresher.expect_refresh().times(1).returning(|_| {
            Err(RefreshError::Rejected {
                status: reqwest::StatusCode::BAD_REQUEST,
                body: r#"{"error": "invalid_grant"}"#.to_string(),
            })
        });
        let mut exchanger = MockAuthCodeExchanger::new();
        exchanger
            .expect_exchange()
            .times(1)
            .returning(|_, _| Ok(credential("reauthorized", Duration::hours(1))));

        let cred = acquire_credential(&store, &refresher, &exchanger, &config(), &default_scopes())
            .await
            .unwrap();

        assert_eq!(cred.access_token, "reauthorized");
    }

    #[tokio::test]
    async fn test_expired_token_without_refresh_token_reauthorizes() {
        let mut store = MockCredentialStore::new();
        store.expect_load().returning(|| {
            let mut cred = credential("stale", -Duration::hours(1));
            cred.refresh_token = None;
            Ok(Some(cred))
        });
        store.expect_save().times(1).returning(|_| Ok(()));
        let mut refresher = MockTokenRefresher::new();
        refresher.expect_refresh().never();
        let mut exchanger = MockAuthCodeExchanger::new();
        exchanger
            .expect_exchange()
            .times(1)
            .returning(|_, _| Ok(credential("new", Duration::hours(1))));

        let cred = acquire_credential(&store, &refresher, &exchanger, &config(), &default_scopes())
            .await
            .unwrap();

        assert_eq!(cred.access_token, "new");
    }

    #[tokio::test]
    async fn test_token_with_narrower_scopes_reauthorizes() {
        let mut store = MockCredentialStore::new();
        store.expect_load().returning(|| {
            let mut cred = credential("valid", Duration::hours(1));
            cred.scopes = vec!["https://www.googleapis.com/auth/userinfo.email".to_string()];
            Ok(Some(cred))
        });
        store.expect_save().times(1).returning(|_| Ok(()));
        let refresher = MockTokenRefresher::new();
        let mut exchanger = MockAuthCodeExchanger::new();
        exchanger
            .expect_exchange()
            .times(1)
            .returning(|_, _| Ok(credential("wider", Duration::hours(1))));

        let cred = acquire_credential(&store, &refresher, &exchanger, &config(), &default_scopes())
            .await
            .unwrap();

        assert_eq!(cred.access_token, "wider");
    }

    #[tokio::test]
    async fn test_authorization_failure_is_fatal_and_nothing_saved() {
        let mut store = MockCredentialStore::new();
        store.expect_load().returning(|| Ok(None));
        store.expect_save().never();
        let refresher = MockTokenRefresher::new();
        let mut exchanger = MockAuthCodeExchanger::new();
        exchanger
            .expect_exchange()
            .times(1)
            .returning(|_, _| Err(AuthError::Flow("access_denied".to_string())));

        let result =
            acquire_credential(&store, &refresher, &exchanger, &config(), &default_scopes()).await;

        assert!(matches!(result, Err(AuthError::Flow(_))));
    }

    #[tokio::test]
    async fn test_corrupt_stored_token_triggers_authorization() {
        let store = MemoryCredentialStore::with_raw("{\"token\": ");
        let refresher = MockTokenRefresher::new();
        let mut exchanger = MockAuthCodeExchanger::new();
        exchanger
            .expect_exchange()
            .times(1)
            .returning(|_, _| Ok(credential("new", Duration::hours(1))));

        let cred = acquire_credential(&store, &refresher, &exchanger, &config(), &default_scopes())
            .await
            .unwrap();

        assert_eq!(cred.access_token, "new");
        assert_eq!(store.load().unwrap(), Some(cred));
    }
}
