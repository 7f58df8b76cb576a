use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use inbox_export::auth::{
    self, acquire_credential, FileCredentialStore, InstalledAppExchanger, OAuthRefresher,
};
use inbox_export::cli::{handle_emails_clear, handle_token_clear, Cli};
use inbox_export::config::ClientConfig;
use inbox_export::export;
use inbox_export::gmail_api::{GmailClient, MailClient};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "inbox_export=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = FileCredentialStore::new(&cli.token_file);

    if cli.clear_token {
        handle_token_clear(&store)?;
        return Ok(());
    }

    if cli.clear_emails {
        handle_emails_clear(&cli.output_dir)?;
        return Ok(());
    }

    let config = ClientConfig::from_env()?;
    let http = reqwest::Client::new();
    let refresher = OAuthRefresher::new(http.clone());
    let exchanger = InstalledAppExchanger::new(cli.port, Duration::from_secs(cli.auth_timeout));

    let credential = acquire_credential(
        &store,
        &refresher,
        &exchanger,
        &config,
        &auth::default_scopes(),
    )
    .await
    .context("authentication failed")?;

    let client = GmailClient::new(http, credential.access_token);
    let email = client
        .get_profile_email()
        .await
        .context("failed to fetch account profile")?;
    println!("Authenticated as: {}", email);

    let records = export::run(&client, &cli.export_options()).await?;
    if records.is_empty() {
        println!("No messages found.");
        return Ok(());
    }

    println!("Successfully processed: {}", export::saved_count(&records));
    println!("Total emails: {}", records.len());
    println!("{} saved", cli.summary.display());
    Ok(())
}
