//! Connection management: configuration, transports, framing and the
//! type-state client.

mod client;
mod config;
mod framed;
mod stream;

pub use client::{Authenticated, Authorized, Client, Completion, NotAuthenticated, Selected};
pub use config::{Config, ConfigBuilder, Security};
pub use framed::FramedStream;
pub use stream::{ImapStream, connect_plain, connect_tls, tls_connector};

use tracing::{debug, info};

use crate::{Error, Result};

/// Connects according to `config` and reads the greeting, performing the
/// TLS handshake or STARTTLS upgrade as configured.
///
/// The whole sequence is bounded by `config.connect_timeout`.
pub async fn connect(config: &Config) -> Result<Client<ImapStream, NotAuthenticated>> {
    let limit = config.connect_timeout;
    tokio::time::timeout(limit, establish(config))
        .await
        .map_err(|_| Error::Timeout(limit))?
}

async fn establish(config: &Config) -> Result<Client<ImapStream, NotAuthenticated>> {
    let read_timeout = Some(config.io_timeout);
    debug!(host = %config.host, port = config.port, security = ?config.security, "connecting");

    let client = match config.security {
        Security::Implicit => {
            let connector = tls_connector(config.ca_file.as_deref())?;
            let stream = connect_tls(&config.host, config.port, &connector).await?;
            Client::from_stream(stream, read_timeout).await?
        }
        Security::StartTls => {
            let connector = tls_connector(config.ca_file.as_deref())?;
            let stream = connect_plain(&config.host, config.port).await?;
            Client::from_stream(stream, read_timeout)
                .await?
                .starttls(&config.host, &connector)
                .await?
        }
        Security::None => {
            let stream = connect_plain(&config.host, config.port).await?;
            Client::from_stream(stream, read_timeout).await?
        }
    };

    info!(host = %config.host, port = config.port, "connected");
    Ok(client)
}
