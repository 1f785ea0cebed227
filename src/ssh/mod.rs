//! SSH transport support: the russh handler and server key verification

pub mod handler;
pub mod known_hosts;

pub use handler::ClientHandler;
pub use known_hosts::{HostKeyStatus, KnownHostsFile};
