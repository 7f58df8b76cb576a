//! Gmail API access split into logical submodules
//!
//! - messages: inbox search and raw message download
//! - profile: authenticated account lookup

pub mod messages;
pub mod profile;

use async_trait::async_trait;

use crate::types::MessageRef;

pub use messages::{decode_raw, MAX_RESULTS};

pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{context} failed ({status}): {body}")]
    Status {
        context: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("raw message is not valid base64url: {0}")]
    Decode(#[from] base64::DecodeError),
}

// Read-only mailbox operations, mocked in pipeline tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailClient: Send + Sync {
    async fn search_messages(&self, query: &str) -> Result<Vec<MessageRef>, MailError>;
    async fn get_raw_message(&self, id: &str) -> Result<Vec<u8>, MailError>;
    async fn get_profile_email(&self) -> Result<String, MailError>;
}

/// Gmail REST client bound to one access token.
pub struct GmailClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl GmailClient {
    pub fn new(client: reqwest::Client, token: String) -> Self {
        Self {
            client,
            token,
            base_url: GMAIL_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/users/me/{}", self.base_url, path)
    }

    async fn get(
        &self,
        context: &'static str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<reqwest::Response, MailError> {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(MailError::Status {
                context,
                status,
                body,
            })
        }
    }
}

#[async_trait]
impl MailClient for GmailClient {
    async fn search_messages(&self, query: &str) -> Result<Vec<MessageRef>, MailError> {
        self.search(query).await
    }

    async fn get_raw_message(&self, id: &str) -> Result<Vec<u8>, MailError> {
        self.fetch_raw(id).await
    }

    async fn get_profile_email(&self) -> Result<String, MailError> {
        Ok(self.profile().await?.email_address)
    }
}
