use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    pub messages: Option<Vec<MessageRef>>,
    #[serde(rename = "resultSizeEstimate")]
    pub result_size_estimate: Option<u32>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

/// Handle to a provider-side message, resolved later into its raw form.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageRef {
    pub id: String,
    #[serde(rename = "threadId")]
    pub thread_id: Option<String>,
}

impl MessageRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            thread_id: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RawMessage {
    pub id: String,
    pub raw: String,
}

#[derive(Debug, Deserialize)]
pub struct Profile {
    #[serde(rename = "emailAddress")]
    pub email_address: String,
    #[serde(rename = "messagesTotal")]
    pub messages_total: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStatus {
    Saved,
    Error,
}

/// One row of the run summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRecord {
    pub id: String,
    pub eml_file: String,
    pub status: ExportStatus,
}

impl ExportRecord {
    pub fn saved(id: impl Into<String>, eml_file: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            eml_file: eml_file.into(),
            status: ExportStatus::Saved,
        }
    }

    pub fn error(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            eml_file: String::new(),
            status: ExportStatus::Error,
        }
    }
}
