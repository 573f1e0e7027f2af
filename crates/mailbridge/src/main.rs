//! `mailbridge` - unread mail notifications in Telegram.
//!
//! Polls the bot's updates and answers `/check` with a summary of unread
//! messages from an IMAP folder; each summary can be deleted from the chat.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod dispatch;
mod settings;
mod telegram;

use std::sync::Arc;

use anyhow::Context;
use mailbridge_core::{Bridge, ImapConnector};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use settings::Settings;
use telegram::TelegramClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailbridge=info,mailbridge_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting mailbridge");

    let settings = Settings::from_env().context("invalid configuration")?;
    let mail = &settings.bridge.mail;
    info!(
        host = %mail.host,
        port = mail.port,
        security = ?mail.security,
        user = %mail.username,
        folder = %mail.folder,
        "mailbox configured"
    );

    let telegram = TelegramClient::new(&settings.bot_token).context("creating Bot API client")?;
    let me = telegram
        .get_me()
        .await
        .context("Telegram rejected the bot token")?;
    info!(bot = me.display_name(), "connected to Telegram");

    let connector = ImapConnector::new(mail);
    let bridge = Arc::new(Bridge::new(connector, telegram, settings.bridge));

    tokio::select! {
        () = dispatch::run(Arc::clone(&bridge)) => {}
        signal = tokio::signal::ctrl_c() => {
            signal.context("waiting for shutdown signal")?;
            info!("shutting down");
        }
    }
    Ok(())
}
