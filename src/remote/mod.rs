//! Remote filesystem seam between the proposal client and its transport.
//!
//! [`ProposalDataClient`](crate::client::ProposalDataClient) only needs a
//! handful of remote calls. They are expressed as traits so the SFTP
//! transport can be swapped for an in-memory tree in tests.

use std::future::Future;
use std::path::Path;

use crate::config::ConnectionSettings;
use crate::error::IllDataError;
use crate::types::FileEntry;

#[cfg(test)]
pub(crate) mod memory;

/// Remote filesystem operations on one open session.
///
/// Paths are POSIX strings. Relative paths resolve against the directory the
/// server placed the session in at login.
pub trait RemoteFs: Send + Sync {
    /// Target of the symbolic link at `path`, exactly as stored
    fn read_link(&self, path: &str) -> impl Future<Output = Result<String, IllDataError>> + Send;

    /// Absolute, symlink-free form of `path`; fails when it does not exist
    fn canonicalize(&self, path: &str)
    -> impl Future<Output = Result<String, IllDataError>> + Send;

    /// Entry names of the directory at `path`, without `.` and `..`
    fn list_names(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<Vec<String>, IllDataError>> + Send;

    /// Entries of the directory at `path` with their metadata
    fn list_entries(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<Vec<FileEntry>, IllDataError>> + Send;

    /// Copy the remote file to `local_path`, replacing it. Returns bytes copied.
    fn download(
        &self,
        remote_path: &str,
        local_path: &Path,
    ) -> impl Future<Output = Result<u64, IllDataError>> + Send;

    /// Copy `local_path` to the remote file, replacing it. Returns bytes copied.
    fn upload(
        &self,
        local_path: &Path,
        remote_path: &str,
    ) -> impl Future<Output = Result<u64, IllDataError>> + Send;

    /// End the session
    fn close(self) -> impl Future<Output = Result<(), IllDataError>> + Send;
}

/// Opens [`RemoteFs`] sessions.
pub trait Connector: Send + Sync {
    type Fs: RemoteFs;

    fn connect(
        &self,
        settings: &ConnectionSettings,
    ) -> impl Future<Output = Result<Self::Fs, IllDataError>> + Send;
}
