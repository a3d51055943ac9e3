//! HTTPS server startup logic.
//!
//! The listener is bound and the TLS configuration loaded before anything is
//! served, so a bad port or unreadable key fails startup without leaving a
//! half-configured server behind.

use std::net::{SocketAddr, TcpListener};
use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;

use super::static_files::create_router;

/// Server startup error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load TLS configuration: {0}")]
    TlsConfig(String),

    #[error("Server error: {0}")]
    Server(String),
}

/// Install aws-lc-rs as the process-wide rustls provider.
///
/// Safe to call more than once; later calls are ignored.
pub fn install_crypto_provider() {
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        tracing::trace!("rustls crypto provider already installed");
    }
}

/// Bind the TCP listener on `addr`.
pub fn bind(addr: SocketAddr) -> Result<TcpListener, ServerError> {
    let bind_err = |source| ServerError::Bind { addr, source };

    let listener = TcpListener::bind(addr).map_err(bind_err)?;
    listener.set_nonblocking(true).map_err(bind_err)?;
    Ok(listener)
}

/// Load the certificate chain and private key written by the certificate store.
pub async fn load_tls(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, ServerError> {
    install_crypto_provider();

    RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(|e| ServerError::TlsConfig(format!("Failed to load certificates: {}", e)))
}

/// Serve `root` over TLS on an already bound listener.
///
/// Runs until `handle` is shut down, then returns once the port is released.
pub async fn serve(
    listener: TcpListener,
    tls: RustlsConfig,
    root: &Path,
    handle: Handle,
) -> Result<(), ServerError> {
    let addr = listener
        .local_addr()
        .map_err(|e| ServerError::Server(e.to_string()))?;
    tracing::info!(%addr, root = %root.display(), "Starting HTTPS server");

    let app = create_router(root);

    axum_server::from_tcp_rustls(listener, tls)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .map_err(|e| ServerError::Server(e.to_string()))?;

    tracing::info!(%addr, "HTTPS server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_bind_reports_port_in_use() {
        let first = bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0))).unwrap();
        let taken = first.local_addr().unwrap();

        let err = bind(taken).unwrap_err();

        match err {
            ServerError::Bind { addr, source } => {
                assert_eq!(addr, taken);
                assert_eq!(source.kind(), std::io::ErrorKind::AddrInUse);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_load_tls_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_tls(&dir.path().join("server.pem"), &dir.path().join("key.pem"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::TlsConfig(_)));
    }
}
