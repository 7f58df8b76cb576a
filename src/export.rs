//! Sequential export of matching messages to `.eml` files plus a CSV summary.

use std::path::{Path, PathBuf};

use crate::gmail_api::{MailClient, MailError};
use crate::types::{ExportRecord, ExportStatus, MessageRef};

pub const DEFAULT_QUERY: &str = "subject:(receipt OR order OR invoice OR purchase)";
pub const DEFAULT_OUTPUT_DIR: &str = "emails_raw";
pub const DEFAULT_SUMMARY_FILE: &str = "emails_summary.csv";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("message search failed: {0}")]
    Search(#[source] MailError),
    #[error("failed to fetch message: {0}")]
    Fetch(#[from] MailError),
    #[error("refusing to use message id {0:?} as a file name")]
    InvalidMessageId(String),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write summary {path}: {source}")]
    Summary {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub query: String,
    pub output_dir: PathBuf,
    pub summary_path: PathBuf,
}

/// Searches, downloads every match in search order and writes the summary.
///
/// A failing message is recorded with status `error` and never stops the
/// run. Search and summary failures are returned. With no matches nothing is
/// written and an empty list is returned.
pub async fn run<C>(client: &C, options: &ExportOptions) -> Result<Vec<ExportRecord>, ExportError>
where
    C: MailClient + ?Sized,
{
    tracing::info!(query = %options.query, "searching inbox");
    let refs = client
        .search_messages(&options.query)
        .await
        .map_err(ExportError::Search)?;
    tracing::info!(count = refs.len(), "found messages matching the query");

    if refs.is_empty() {
        tracing::info!("no messages found");
        return Ok(Vec::new());
    }

    create_output_dir(&options.output_dir).await?;

    let mut records = Vec::with_capacity(refs.len());
    for message in &refs {
        let record = match export_message(client, message, &options.output_dir).await {
            Ok(path) => {
                tracing::info!(id = %message.id, path = %path.display(), "saved message");
                ExportRecord::saved(&message.id, path.display().to_string())
            }
            Err(e) => {
                tracing::warn!(id = %message.id, error = %e, "failed to export message");
                ExportRecord::error(&message.id)
            }
        };
        records.push(record);
    }

    write_summary(&options.summary_path, &records)?;

    tracing::info!(
        saved = saved_count(&records),
        total = refs.len(),
        summary = %options.summary_path.display(),
        "export finished"
    );
    Ok(records)
}

async fn create_output_dir(dir: &Path) -> Result<(), ExportError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| ExportError::Write {
            path: dir.to_path_buf(),
            source,
        })
}

/// Fetches one message and writes it to `<dir>/<id>.eml`, replacing any
/// earlier copy.
pub async fn export_message<C>(
    client: &C,
    message: &MessageRef,
    dir: &Path,
) -> Result<PathBuf, ExportError>
where
    C: MailClient + ?Sized,
{
    let path = eml_path(dir, &message.id)?;
    let bytes = client.get_raw_message(&message.id).await?;
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|source| ExportError::Write {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}

/// Message ids become file names, so only plain id characters are accepted.
pub fn eml_path(dir: &Path, id: &str) -> Result<PathBuf, ExportError> {
    let plain = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !plain {
        return Err(ExportError::InvalidMessageId(id.to_string()));
    }
    Ok(dir.join(format!("{}.eml", id)))
}

/// Writes the header and one row per record, overwriting any earlier summary.
pub fn write_summary(path: &Path, records: &[ExportRecord]) -> Result<(), ExportError> {
    let summary_error = |source: csv::Error| ExportError::Summary {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(summary_error)?;
    writer
        .write_record(["id", "eml_file", "status"])
        .map_err(summary_error)?;
    for record in records {
        writer.serialize(record).map_err(summary_error)?;
    }
    writer
        .flush()
        .map_err(|e| summary_error(csv::Error::from(e)))?;
    Ok(())
}

/// Deletes previously exported `.eml` files from `dir` and returns how many
/// were removed. Other files and subdirectories are left alone; a missing
/// directory counts as already empty.
pub fn clear_exported(dir: &Path) -> Result<usize, ExportError> {
    let write_error = |path: &Path, source: std::io::Error| ExportError::Write {
        path: path.to_path_buf(),
        source,
    };

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(write_error(dir, e)),
    };

    let mut removed = 0;
    for entry in entries {
        let path = entry.map_err(|e| write_error(dir, e))?.path();
        let is_eml = path.extension().map_or(false, |ext| ext == "eml");
        if is_eml && path.is_file() {
            std::fs::remove_file(&path).map_err(|e| write_error(&path, e))?;
            removed += 1;
        }
    }
    tracing::debug!(dir = %dir.display(), removed, "cleared exported messages");
    Ok(removed)
}

pub fn saved_count(records: &[ExportRecord]) -> usize {
    records
        .iter()
        .filter(|r| r.status == ExportStatus::Saved)
        .count()
}
