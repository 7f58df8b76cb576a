use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

use super::{GmailClient, MailError};
use crate::types::{MessageRef, MessagesResponse, RawMessage};

/// Page size for inbox searches. Only the first page is ever requested.
pub const MAX_RESULTS: usize = 10;

// Gmail emits base64url both with and without padding.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decodes the `raw` field of a message fetched with `format=raw`.
pub fn decode_raw(raw: &str) -> Result<Vec<u8>, MailError> {
    Ok(URL_SAFE_LENIENT.decode(raw.trim())?)
}

fn cap_results(response: MessagesResponse) -> Vec<MessageRef> {
    let mut refs = response.messages.unwrap_or_default();
    let estimate = response.result_size_estimate.unwrap_or(0) as usize;
    if refs.len() > MAX_RESULTS || estimate > MAX_RESULTS || response.next_page_token.is_some() {
        tracing::warn!(
            estimate,
            limit = MAX_RESULTS,
            "more messages match than a single page holds; only the first page is exported"
        );
    }
    refs.truncate(MAX_RESULTS);
    refs
}

impl GmailClient {
    // Inbox only, spam and trash excluded, first page only.
    pub(super) async fn search(&self, query: &str) -> Result<Vec<MessageRef>, MailError> {
        let max_results = MAX_RESULTS.to_string();
        let response = self
            .get(
                "message search",
                "messages",
                &[
                    ("q", query),
                    ("labelIds", "INBOX"),
                    ("includeSpamTrash", "false"),
                    ("maxResults", max_results.as_str()),
                ],
            )
            .await?;

        let page: MessagesResponse = response.json().await?;
        Ok(cap_results(page))
    }

    pub(super) async fn fetch_raw(&self, id: &str) -> Result<Vec<u8>, MailError> {
        let response = self
            .get("raw message fetch", &format!("messages/{}", id), &[("format", "raw")])
            .await?;

        let message: RawMessage = response.json().await?;
        tracing::debug!(id = %message.id, "raw message fetched");
        decode_raw(&message.raw)
    }
}
