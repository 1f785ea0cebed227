//! SFTP client for establishing connections

use std::sync::Arc;
use std::time::Duration;

use russh::client::{self, Config};
use russh_sftp::client::SftpSession as RusshSftpSession;
use secrecy::ExposeSecret;
use tokio::net::TcpStream;

use crate::config::ConnectionSettings;
use crate::error::IllDataError;
use crate::remote::Connector;
use crate::security_log;
use crate::ssh::{ClientHandler, KnownHostsFile};

use super::session::SftpFs;

/// Opens password-authenticated SFTP sessions
pub struct SftpConnector {
    config: Arc<Config>,
}

impl Default for SftpConnector {
    fn default() -> Self {
        Self::new(60)
    }
}

impl SftpConnector {
    /// `keepalive_interval` of 0 disables SSH keepalives
    pub fn new(keepalive_interval: u64) -> Self {
        let keepalive = if keepalive_interval == 0 {
            None
        } else {
            Some(Duration::from_secs(keepalive_interval))
        };

        let config = Config {
            inactivity_timeout: Some(Duration::from_secs(3600)),
            keepalive_interval: keepalive,
            keepalive_max: 3,
            ..Default::default()
        };

        Self {
            config: Arc::new(config),
        }
    }

    async fn authenticate(
        handle: &mut client::Handle<ClientHandler>,
        settings: &ConnectionSettings,
    ) -> Result<(), IllDataError> {
        let host = settings.hostname.as_str();
        let username = settings.username.as_str();
        security_log::log_auth_attempt(host, settings.port, username);

        let auth_result = match handle
            .authenticate_password(username, settings.password.expose_secret())
            .await
        {
            Ok(result) => result,
            Err(e) => {
                let reason = format!("Password auth failed: {}", e);
                security_log::log_auth_failure(host, settings.port, username, &reason);
                return Err(IllDataError::Connection(reason));
            }
        };

        if !auth_result.success() {
            let reason = "Authentication rejected by server";
            security_log::log_auth_failure(host, settings.port, username, reason);
            return Err(IllDataError::connection(reason));
        }

        security_log::log_auth_success(host, settings.port, username);
        Ok(())
    }
}

impl Connector for SftpConnector {
    type Fs = SftpFs;

    async fn connect(&self, settings: &ConnectionSettings) -> Result<SftpFs, IllDataError> {
        let host = settings.hostname.as_str();
        let port = settings.port;

        let stream = TcpStream::connect((host, port)).await.map_err(|e| {
            IllDataError::Connection(format!("Failed to connect to {}:{}: {}", host, port, e))
        })?;

        let known_hosts = settings.known_hosts_path.clone().map(KnownHostsFile::new);
        let handler = ClientHandler::new(host.to_string(), port, known_hosts);

        let mut handle = client::connect_stream(self.config.clone(), stream, handler)
            .await
            .map_err(|e| {
                IllDataError::Connection(format!(
                    "SSH handshake failed for {}:{}: {}",
                    host, port, e
                ))
            })?;

        Self::authenticate(&mut handle, settings).await?;

        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| IllDataError::Connection(format!("Failed to open channel: {}", e)))?;

        channel
            .request_subsystem(false, "sftp")
            .await
            .map_err(|e| {
                IllDataError::Connection(format!("Failed to request SFTP subsystem: {}", e))
            })?;

        let sftp = RusshSftpSession::new(channel.into_stream())
            .await
            .map_err(|e| {
                IllDataError::Connection(format!("Failed to initialize SFTP session: {}", e))
            })?;

        security_log::log_sftp_connect(host, port, &settings.username);

        Ok(SftpFs::new(handle, sftp))
    }
}
