//! SFTP transport for the proposal client
//!
//! Provides the russh-sftp backed [`RemoteFs`](crate::remote::RemoteFs).

pub mod client;
pub mod session;

pub use client::SftpConnector;
pub use session::SftpFs;
