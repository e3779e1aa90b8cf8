// Process plumbing
pub mod archive;
pub mod bridge;
pub mod decompress;
pub mod error;
pub mod pipeline;
pub mod process;

// Host environment
pub mod config;
pub mod db;
pub mod deploy;
pub mod files;
pub mod host;
pub mod port;
pub mod slugify;

// Workflows
pub mod dump;
pub mod import;
pub mod prepare;
pub mod remove;
pub mod vhost;

// Re-export common types for convenience
pub use config::Config;
pub use error::{Error, ErrorCode, Result};
pub use host::HostProfile;
