pub mod paths;
pub mod settings;

pub use settings::{ClientConfig, ConnectionSettings, ServerConfig, DEFAULT_PORT};
