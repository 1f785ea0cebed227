use std::future::Future;

use russh::client::Handler;
use russh::keys::PublicKey;

use crate::error::SshError;
use crate::security_log;

use super::known_hosts::{HostKeyStatus, KnownHostsFile};

/// SSH client handler implementation
///
/// Server keys are checked against `known_hosts` when one is configured and
/// accepted unconditionally otherwise.
pub struct ClientHandler {
    host: String,
    port: u16,
    known_hosts: Option<KnownHostsFile>,
}

impl ClientHandler {
    pub fn new(host: String, port: u16, known_hosts: Option<KnownHostsFile>) -> Self {
        Self {
            host,
            port,
            known_hosts,
        }
    }
}

impl Handler for ClientHandler {
    type Error = SshError;

    fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send {
        let host = self.host.clone();
        let port = self.port;
        let known_hosts = self.known_hosts.clone();
        let key = server_public_key.clone();

        async move {
            let Some(known_hosts) = known_hosts else {
                security_log::log_host_key_unverified(
                    &host,
                    port,
                    &KnownHostsFile::fingerprint(&key),
                );
                return Ok(true);
            };

            let status = tokio::task::spawn_blocking({
                let host = host.clone();
                move || known_hosts.check_host_key(&host, port, &key)
            })
            .await
            .map_err(|e| SshError::HostKeyVerification(format!("Host key check failed: {}", e)))??;

            let reason = match status {
                HostKeyStatus::Known => {
                    tracing::debug!("Host key verified for {}:{}", host, port);
                    return Ok(true);
                }
                HostKeyStatus::Unknown {
                    fingerprint,
                    key_type,
                } => format!("No known_hosts entry for {} key {}", key_type, fingerprint),
                HostKeyStatus::Changed {
                    old_fingerprint,
                    new_fingerprint,
                    key_type,
                } => format!(
                    "HOST KEY CHANGED ({}): expected {}, got {}",
                    key_type, old_fingerprint, new_fingerprint
                ),
                HostKeyStatus::Revoked { fingerprint } => {
                    format!("Host key {} has been revoked", fingerprint)
                }
            };

            security_log::log_host_key_rejected(&host, port, &reason);
            Err(SshError::HostKeyVerification(reason))
        }
    }
}
