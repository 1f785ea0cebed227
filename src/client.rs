//! Proposal-scoped access to the ILL data service.
//!
//! The remote layout is fixed:
//!
//! - `MyData` in the login directory links to the user's home,
//! - `<home>/byProposal/exp_<id>` links to the backing directory of each
//!   proposal.
//!
//! A [`ProposalDataClient`] moves from disconnected, to connected (home
//! resolved), to proposal open. Listing, download and upload are scoped to
//! the open proposal.
//!
//! ```no_run
//! use illdata::{ConnectionSettings, ProposalDataClient};
//!
//! # async fn run() -> Result<(), illdata::IllDataError> {
//! let settings = ConnectionSettings::new("sftp.ill.fr", "jdoe", "secret");
//! let mut client = ProposalDataClient::new(settings);
//! client
//!     .with_session(async |client| {
//!         for id in client.list_proposals().await? {
//!             println!("{id}");
//!         }
//!         client.open_proposal("12345").await?;
//!         client.download("rawdata/000001.nxs", "local/000001.nxs").await?;
//!         Ok(())
//!     })
//!     .await
//! # }
//! ```

use std::path::Path;

use crate::config::ConnectionSettings;
use crate::error::IllDataError;
use crate::remote::{Connector, RemoteFs};
use crate::remote_path;
use crate::sftp::SftpConnector;
use crate::types::FileEntry;

/// Link in the login directory pointing at the user's home
pub const HOME_LINK: &str = "MyData";
/// Directory under home holding one link per proposal
pub const PROPOSALS_DIR: &str = "byProposal";
/// Prefix of the per-proposal links
pub const PROPOSAL_LINK_PREFIX: &str = "exp_";

/// Proposal id for a `byProposal` entry.
///
/// Entries without the `exp_` prefix are returned unchanged.
pub fn proposal_id(entry: &str) -> &str {
    entry.strip_prefix(PROPOSAL_LINK_PREFIX).unwrap_or(entry)
}

/// The currently opened proposal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    id: String,
    dir: String,
}

impl Proposal {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Resolved backing directory on the server
    pub fn dir(&self) -> &str {
        &self.dir
    }

    /// Remote path of `path` relative to the proposal directory
    pub fn resolve(&self, path: &str) -> String {
        remote_path::join(&self.dir, path)
    }
}

/// Proposal ids from one `byProposal` listing.
///
/// Each call to [`ProposalDataClient::list_proposals`] issues a fresh listing.
#[derive(Debug)]
pub struct Proposals {
    entries: std::vec::IntoIter<String>,
}

impl Iterator for Proposals {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.entries
            .next()
            .map(|entry| proposal_id(&entry).to_string())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

struct Session<F> {
    fs: F,
    home: String,
    proposal: Option<Proposal>,
}

/// Client for one user's proposal data.
///
/// One session at a time; operations on one client never overlap. Dropping a
/// connected client releases the session without waiting for the server,
/// prefer [`disconnect`](Self::disconnect) or [`with_session`](Self::with_session).
pub struct ProposalDataClient<C: Connector = SftpConnector> {
    settings: ConnectionSettings,
    connector: C,
    session: Option<Session<C::Fs>>,
}

impl ProposalDataClient<SftpConnector> {
    pub fn new(settings: ConnectionSettings) -> Self {
        Self::with_connector(settings, SftpConnector::default())
    }
}

impl<C: Connector> ProposalDataClient<C> {
    pub fn with_connector(settings: ConnectionSettings, connector: C) -> Self {
        Self {
            settings,
            connector,
            session: None,
        }
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Home directory resolved at connect time
    pub fn home_dir(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.home.as_str())
    }

    pub fn proposal(&self) -> Option<&Proposal> {
        self.session.as_ref().and_then(|s| s.proposal.as_ref())
    }

    /// Id of the open proposal, or an empty string
    pub fn current_proposal(&self) -> &str {
        self.proposal().map(Proposal::id).unwrap_or("")
    }

    /// Open the session and resolve the home directory.
    ///
    /// Does nothing when already connected.
    pub async fn connect(&mut self) -> Result<(), IllDataError> {
        if self.session.is_some() {
            tracing::debug!("Already connected to {}", self.settings.hostname);
            return Ok(());
        }

        let fs = self.connector.connect(&self.settings).await?;

        let home = match Self::resolve_home(&fs).await {
            Ok(home) => home,
            Err(e) => {
                if let Err(close_err) = fs.close().await {
                    tracing::warn!("Error while closing failed session: {}", close_err);
                }
                return Err(IllDataError::Connection(format!(
                    "Failed to resolve {}: {}",
                    HOME_LINK, e
                )));
            }
        };

        tracing::info!(
            "Connected to {} as {}, home={}",
            self.settings.hostname,
            self.settings.username,
            home
        );
        self.session = Some(Session {
            fs,
            home,
            proposal: None,
        });
        Ok(())
    }

    async fn resolve_home(fs: &C::Fs) -> Result<String, IllDataError> {
        let target = fs.read_link(HOME_LINK).await?;
        fs.canonicalize(&target).await
    }

    /// Close the session. Never fails; close errors are logged.
    pub async fn disconnect(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        if let Err(e) = session.fs.close().await {
            tracing::warn!("Error while disconnecting from {}: {}", self.settings.hostname, e);
        }
        tracing::info!("Disconnected from {}", self.settings.hostname);
    }

    /// Connect, run `f`, then disconnect whatever `f` returned.
    pub async fn with_session<T, F>(&mut self, f: F) -> Result<T, IllDataError>
    where
        F: AsyncFnOnce(&mut Self) -> Result<T, IllDataError>,
    {
        self.connect().await?;
        let result = f(self).await;
        self.disconnect().await;
        result
    }

    /// List proposal ids available under `<home>/byProposal`
    pub async fn list_proposals(&self) -> Result<Proposals, IllDataError> {
        let session = self.require_connection()?;
        let dir = remote_path::join(&session.home, PROPOSALS_DIR);
        let mut entries = session.fs.list_names(&dir).await?;
        entries.sort();
        Ok(Proposals {
            entries: entries.into_iter(),
        })
    }

    /// Select the proposal `id`, replacing any open one.
    ///
    /// On failure the previous selection stays in place.
    pub async fn open_proposal(&mut self, id: &str) -> Result<(), IllDataError> {
        let session = self.require_connection_mut()?;

        if id.is_empty() || id.contains('/') {
            return Err(IllDataError::RemoteOperation(format!(
                "Invalid proposal id '{}'",
                id
            )));
        }

        let proposals_dir = session
            .fs
            .canonicalize(&remote_path::join(&session.home, PROPOSALS_DIR))
            .await?;
        let link = remote_path::join(&proposals_dir, &format!("{PROPOSAL_LINK_PREFIX}{id}"));
        let target = session.fs.read_link(&link).await?;
        let dir = session
            .fs
            .canonicalize(&remote_path::resolve_link_target(&proposals_dir, &target))
            .await?;

        tracing::info!("Opened proposal {} at {}", id, dir);
        session.proposal = Some(Proposal {
            id: id.to_string(),
            dir,
        });
        Ok(())
    }

    /// Entry names under `path`, relative to the proposal directory, sorted
    pub async fn list_dir(&self, path: &str) -> Result<Vec<String>, IllDataError> {
        let (session, proposal) = self.require_proposal()?;
        let mut names = session.fs.list_names(&proposal.resolve(path)).await?;
        names.sort();
        Ok(names)
    }

    /// Entries with metadata under `path`, relative to the proposal directory,
    /// sorted by name
    pub async fn list_dir_attr(&self, path: &str) -> Result<Vec<FileEntry>, IllDataError> {
        let (session, proposal) = self.require_proposal()?;
        let mut entries = session.fs.list_entries(&proposal.resolve(path)).await?;
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Download a proposal file, creating missing local directories first.
    pub async fn download(
        &self,
        remote_path: &str,
        local_path: impl AsRef<Path>,
    ) -> Result<u64, IllDataError> {
        let (session, proposal) = self.require_proposal()?;
        let local_path = local_path.as_ref();

        if let Some(parent) = local_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                IllDataError::LocalIo(format!(
                    "Failed to create local directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let bytes = session
            .fs
            .download(&proposal.resolve(remote_path), local_path)
            .await?;
        tracing::info!(
            "Downloaded {} -> {} ({} bytes)",
            remote_path,
            local_path.display(),
            bytes
        );
        Ok(bytes)
    }

    /// Upload a local file into the proposal directory, replacing the remote file.
    pub async fn upload(
        &self,
        local_path: impl AsRef<Path>,
        remote_path: &str,
    ) -> Result<u64, IllDataError> {
        let (session, proposal) = self.require_proposal()?;
        let local_path = local_path.as_ref();

        let bytes = session
            .fs
            .upload(local_path, &proposal.resolve(remote_path))
            .await?;
        tracing::info!(
            "Uploaded {} -> {} ({} bytes)",
            local_path.display(),
            remote_path,
            bytes
        );
        Ok(bytes)
    }

    fn require_connection(&self) -> Result<&Session<C::Fs>, IllDataError> {
        self.session.as_ref().ok_or(IllDataError::NotConnected)
    }

    fn require_connection_mut(&mut self) -> Result<&mut Session<C::Fs>, IllDataError> {
        self.session.as_mut().ok_or(IllDataError::NotConnected)
    }

    fn require_proposal(&self) -> Result<(&Session<C::Fs>, &Proposal), IllDataError> {
        let session = self.require_connection()?;
        let proposal = session
            .proposal
            .as_ref()
            .ok_or(IllDataError::NoProposalSelected)?;
        Ok((session, proposal))
    }
}

impl<C: Connector> Drop for ProposalDataClient<C> {
    fn drop(&mut self) {
        if self.session.take().is_some() {
            tracing::debug!("Releasing session to {} on drop", self.settings.hostname);
        }
    }
}
