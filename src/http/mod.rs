//! HTTPS static file server.
//!
//! Serves the exported web build from a single root directory over TLS using
//! the certificate produced by the certificate store. The server includes:
//! - Cross-origin isolation and no-cache headers on every response
//! - Request ID tracing for each request
//! - Graceful shutdown on SIGTERM/SIGINT or via an [`axum_server::Handle`]

mod server;
mod shutdown;
mod static_files;

pub use server::{bind, install_crypto_provider, load_tls, serve, ServerError};
pub use shutdown::setup_shutdown_handler;
pub use static_files::create_router;
