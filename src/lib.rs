//! Client for the ILL proposal data service
//!
//! Connects to the data service over SFTP, resolves the user's home from the
//! `MyData` link and gives proposal-scoped access to listing and transfers.

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod remote;
pub mod remote_path;
pub mod sftp;
pub mod ssh;
pub mod types;

pub(crate) mod security_log;

pub use client::{Proposal, ProposalDataClient, Proposals};
pub use config::ConnectionSettings;
pub use error::IllDataError;
pub use types::FileEntry;
