//! SFTP session for file operations

use std::path::Path;

use russh::Disconnect;
use russh::client;
use russh_sftp::client::SftpSession as RusshSftpSession;
use russh_sftp::protocol::OpenFlags;
use tokio::fs::{File, OpenOptions};
use tokio::io::{self, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

use crate::error::IllDataError;
use crate::remote::RemoteFs;
use crate::ssh::ClientHandler;
use crate::types::FileEntry;

/// Transfer buffer size (32KB)
const CHUNK_SIZE: usize = 32 * 1024;

/// An authenticated SSH connection carrying one SFTP subsystem channel
pub struct SftpFs {
    handle: client::Handle<ClientHandler>,
    sftp: Mutex<RusshSftpSession>,
}

impl std::fmt::Debug for SftpFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SftpFs").finish_non_exhaustive()
    }
}

impl SftpFs {
    pub fn new(handle: client::Handle<ClientHandler>, sftp: RusshSftpSession) -> Self {
        Self {
            handle,
            sftp: Mutex::new(sftp),
        }
    }

    fn is_dot_entry(name: &str) -> bool {
        name == "." || name == ".."
    }
}

impl RemoteFs for SftpFs {
    async fn read_link(&self, path: &str) -> Result<String, IllDataError> {
        tracing::debug!("readlink {}", path);
        self.sftp.lock().await.read_link(path).await.map_err(|e| {
            IllDataError::RemoteOperation(format!("Failed to read link {}: {}", path, e))
        })
    }

    async fn canonicalize(&self, path: &str) -> Result<String, IllDataError> {
        tracing::debug!("realpath {}", path);
        self.sftp.lock().await.canonicalize(path).await.map_err(|e| {
            IllDataError::RemoteOperation(format!("Failed to resolve {}: {}", path, e))
        })
    }

    async fn list_names(&self, path: &str) -> Result<Vec<String>, IllDataError> {
        tracing::debug!("readdir {}", path);
        let sftp = self.sftp.lock().await;
        let read_dir = sftp.read_dir(path).await.map_err(|e| {
            IllDataError::RemoteOperation(format!("Failed to read directory {}: {}", path, e))
        })?;

        Ok(read_dir
            .map(|entry| entry.file_name())
            .filter(|name| !Self::is_dot_entry(name))
            .collect())
    }

    async fn list_entries(&self, path: &str) -> Result<Vec<FileEntry>, IllDataError> {
        tracing::debug!("readdir {} (with attributes)", path);
        let sftp = self.sftp.lock().await;
        let read_dir = sftp.read_dir(path).await.map_err(|e| {
            IllDataError::RemoteOperation(format!("Failed to read directory {}: {}", path, e))
        })?;

        Ok(read_dir
            .filter(|entry| !Self::is_dot_entry(&entry.file_name()))
            .map(|entry| {
                let metadata = entry.metadata();
                FileEntry::from_stat(
                    entry.file_name(),
                    metadata.size.unwrap_or(0),
                    metadata.mtime,
                    metadata.permissions.unwrap_or(0),
                )
            })
            .collect())
    }

    async fn download(&self, remote_path: &str, local_path: &Path) -> Result<u64, IllDataError> {
        let sftp = self.sftp.lock().await;
        let mut remote = sftp.open(remote_path).await.map_err(|e| {
            IllDataError::RemoteOperation(format!(
                "Failed to open remote file {}: {}",
                remote_path, e
            ))
        })?;

        let mut local = {
            let mut options = OpenOptions::new();
            options.create(true).write(true).truncate(true);
            #[cfg(unix)]
            {
                options.mode(0o600);
            }
            options.open(local_path).await.map_err(|e| {
                IllDataError::LocalIo(format!(
                    "Failed to write local file {}: {}",
                    local_path.display(),
                    e
                ))
            })?
        };

        copy_chunks(
            &mut remote,
            &mut local,
            |e| {
                IllDataError::RemoteOperation(format!(
                    "Failed to read remote file {}: {}",
                    remote_path, e
                ))
            },
            |e| {
                IllDataError::LocalIo(format!(
                    "Failed to write local file {}: {}",
                    local_path.display(),
                    e
                ))
            },
        )
        .await
    }

    async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<u64, IllDataError> {
        // Refuse unreadable sources before the remote file gets truncated
        let mut local = open_local_source(local_path).await?;

        let sftp = self.sftp.lock().await;
        let mut remote = sftp
            .open_with_flags(
                remote_path,
                OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
            )
            .await
            .map_err(|e| {
                IllDataError::RemoteOperation(format!(
                    "Failed to open remote file {}: {}",
                    remote_path, e
                ))
            })?;

        let bytes = copy_chunks(
            &mut local,
            &mut remote,
            |e| {
                IllDataError::LocalIo(format!(
                    "Failed to read local file {}: {}",
                    local_path.display(),
                    e
                ))
            },
            |e| {
                IllDataError::RemoteOperation(format!(
                    "Failed to write remote file {}: {}",
                    remote_path, e
                ))
            },
        )
        .await?;

        // Flush buffered writes and release the remote handle
        remote.shutdown().await.map_err(|e| {
            IllDataError::RemoteOperation(format!(
                "Failed to close remote file {}: {}",
                remote_path, e
            ))
        })?;

        Ok(bytes)
    }

    async fn close(self) -> Result<(), IllDataError> {
        let sftp_result = self.sftp.into_inner().close().await;

        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(|e| IllDataError::RemoteOperation(format!("Failed to disconnect: {}", e)))?;

        sftp_result.map_err(|e| {
            IllDataError::RemoteOperation(format!("Failed to close SFTP session: {}", e))
        })
    }
}

/// Open `path` for reading; only regular files qualify.
async fn open_local_source(path: &Path) -> Result<File, IllDataError> {
    let local_err = |e: io::Error| {
        IllDataError::LocalIo(format!("Failed to read local file {}: {}", path.display(), e))
    };

    let file = File::open(path).await.map_err(local_err)?;
    let metadata = file.metadata().await.map_err(local_err)?;
    if !metadata.is_file() {
        return Err(IllDataError::LocalIo(format!(
            "Failed to read local file {}: not a regular file",
            path.display()
        )));
    }
    Ok(file)
}

/// Copy `reader` into `writer`, blaming the side that failed.
async fn copy_chunks<R, W>(
    reader: &mut R,
    writer: &mut W,
    read_err: impl Fn(io::Error) -> IllDataError,
    write_err: impl Fn(io::Error) -> IllDataError,
) -> Result<u64, IllDataError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;

    loop {
        let n = reader.read(&mut buf).await.map_err(&read_err)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n]).await.map_err(&write_err)?;
        total += n as u64;
    }

    writer.flush().await.map_err(&write_err)?;
    Ok(total)
}
