use std::io;
use std::path::PathBuf;

use crate::certs::CertError;
use crate::config::ConfigError;
use crate::http::ServerError;

/// Fatal startup and runtime errors of the launcher.
///
/// Everything here aborts before or instead of serving; address detection
/// and QR rendering degrade silently and never show up as errors.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("Export directory not found: {}", path.display())]
    MissingExportDir { path: PathBuf },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Certificate error: {0}")]
    Cert(#[from] CertError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("Failed to write to console: {0}")]
    Console(#[from] io::Error),
}
