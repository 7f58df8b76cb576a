use super::{GmailClient, MailError};
use crate::types::Profile;

impl GmailClient {
    pub(super) async fn profile(&self) -> Result<Profile, MailError> {
        let response = self.get("profile lookup", "profile", &[]).await?;
        Ok(response.json().await?)
    }
}
