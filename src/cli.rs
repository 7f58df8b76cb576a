use std::path::{Path, PathBuf};

use clap::Parser;

use crate::auth::flow::{DEFAULT_AUTH_TIMEOUT, DEFAULT_CALLBACK_PORT};
use crate::auth::store::DEFAULT_TOKEN_FILE;
use crate::auth::{CredentialStore, FileCredentialStore};
use crate::export::{
    self, ExportOptions, DEFAULT_OUTPUT_DIR, DEFAULT_QUERY, DEFAULT_SUMMARY_FILE,
};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    /// Gmail search query selecting the messages to export.
    #[clap(long, default_value = DEFAULT_QUERY)]
    pub query: String,

    /// Directory receiving one `<id>.eml` file per message.
    #[clap(long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// CSV file summarizing the run.
    #[clap(long, default_value = DEFAULT_SUMMARY_FILE)]
    pub summary: PathBuf,

    /// File holding the stored OAuth token.
    #[clap(long, default_value = DEFAULT_TOKEN_FILE)]
    pub token_file: PathBuf,

    /// Local port for the OAuth callback listener.
    #[clap(long, default_value_t = DEFAULT_CALLBACK_PORT)]
    pub port: u16,

    /// Seconds to wait for the browser authorization to complete.
    #[clap(long, default_value_t = DEFAULT_AUTH_TIMEOUT.as_secs())]
    pub auth_timeout: u64,

    /// Delete the stored token and exit.
    #[clap(long)]
    pub clear_token: bool,

    /// Delete previously exported `.eml` files from the output directory and exit.
    #[clap(long)]
    pub clear_emails: bool,
}

impl Cli {
    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            query: self.query.clone(),
            output_dir: self.output_dir.clone(),
            summary_path: self.summary.clone(),
        }
    }
}

pub fn handle_token_clear(store: &FileCredentialStore) -> anyhow::Result<()> {
    store.clear()?;
    println!("Token removed from {}. Exiting.", store.path().display());
    Ok(())
}

pub fn handle_emails_clear(output_dir: &Path) -> anyhow::Result<usize> {
    let removed = export::clear_exported(output_dir)?;
    println!(
        "Cleared {} files from {}. Exiting.",
        removed,
        output_dir.display()
    );
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_receipt_export() {
        let cli = Cli::parse_from(["inbox-export"]);
        assert_eq!(cli.query, DEFAULT_QUERY);
        assert_eq!(cli.port, 3000);
        assert_eq!(cli.token_file, PathBuf::from("token.json"));
        assert_eq!(cli.auth_timeout, 300);
        assert!(!cli.clear_token);
        assert!(!cli.clear_emails);

        let options = cli.export_options();
        assert_eq!(options.output_dir, PathBuf::from("emails_raw"));
        assert_eq!(options.summary_path, PathBuf::from("emails_summary.csv"));
    }

    #[test]
    fn test_overrides_are_parsed() {
        let cli = Cli::parse_from([
            "inbox-export",
            "--query",
            "from:billing@example.com",
            "--port",
            "8085",
            "--auth-timeout",
            "30",
            "--clear-token",
        ]);
        assert_eq!(cli.query, "from:billing@example.com");
        assert_eq!(cli.port, 8085);
        assert_eq!(cli.auth_timeout, 30);
        assert!(cli.clear_token);
    }

    #[test]
    fn test_clear_token_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "{}").unwrap();

        handle_token_clear(&FileCredentialStore::new(&path)).unwrap();

        assert!(!path.exists());
    }

    #[test]
    fn test_clear_token_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::create_dir(&path).unwrap();

        let result = handle_token_clear(&FileCredentialStore::new(&path));

        assert!(result.is_err());
        assert!(path.exists());
    }

    #[test]
    fn test_clear_emails_flag_removes_exported_files() {
        let dir = tempfile::tempdir().unwrap();
        let output_dir = dir.path().join("emails_raw");
        std::fs::create_dir(&output_dir).unwrap();
        std::fs::write(output_dir.join("18c2f3a9.eml"), "Subject: hi\r\n").unwrap();
        let dir_arg = output_dir.display().to_string();
        let cli = Cli::parse_from([
            "inbox-export",
            "--clear-emails",
            "--output-dir",
            dir_arg.as_str(),
        ]);
        assert!(cli.clear_emails);

        let removed = handle_emails_clear(&cli.output_dir).unwrap();

        assert_eq!(removed, 1);
        assert!(!output_dir.join("18c2f3a9.eml").exists());
        assert!(output_dir.exists());
    }
}
