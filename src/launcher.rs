//! Startup orchestration.
//!
//! Checks the export directory, works out the advertised address, makes sure a
//! certificate exists for it, binds the listener, prints the URL and QR code,
//! then serves until the [`Handle`] is shut down. Every fatal error happens
//! before serving starts.

use std::io::Write;

use axum_server::Handle;
use time::OffsetDateTime;

use crate::certs::{parse_ip_literal, CertificateOrigin, CertificateRecord, CertificateStore};
use crate::config::AppConfig;
use crate::error::LaunchError;
use crate::http;
use crate::net::detect_lan_ipv4;
use crate::qr::render_qr;

pub struct Launcher {
    config: AppConfig,
    regenerate_cert: bool,
}

impl Launcher {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            regenerate_cert: false,
        }
    }

    /// Replace any stored certificate instead of reusing it.
    pub fn regenerate_cert(mut self, regenerate: bool) -> Self {
        self.regenerate_cert = regenerate;
        self
    }

    /// Run until `handle` is shut down. Operator-facing text goes to `console`.
    pub async fn run<W: Write + Send>(
        &self,
        console: &mut W,
        handle: Handle,
    ) -> Result<(), LaunchError> {
        let root = &self.config.site.root;
        if !root.is_dir() {
            let absolute = std::path::absolute(root).unwrap_or_else(|_| root.clone());
            writeln!(
                console,
                "Error: Directory '{}' not found. Please export your web build to this folder.",
                root.display()
            )?;
            writeln!(
                console,
                "  Export Path: {}",
                absolute.join("index.html").display()
            )?;
            return Err(LaunchError::MissingExportDir { path: absolute });
        }

        let index = self.config.site.index_path();
        if !index.is_file() {
            tracing::warn!(path = %index.display(), "Export directory has no index.html");
            writeln!(
                console,
                "Warning: {} not found, '/' will return 404.",
                index.display()
            )?;
        }

        let bind_addr = self.config.http.bind_addr()?;

        let host = match &self.config.http.advertise_host {
            Some(host) => host.trim().to_string(),
            None => detect_lan_ipv4().to_string(),
        };

        let record = self.ensure_certificate(console, &host)?;
        self.check_reused(console, &record, &host)?;

        let tls = http::load_tls(&self.config.tls.cert_path, &self.config.tls.key_path).await?;
        let listener = http::bind(bind_addr)?;
        let port = listener
            .local_addr()
            .map_err(|source| http::ServerError::Bind {
                addr: bind_addr,
                source,
            })?
            .port();

        let url = https_url(&host, port);
        tracing::info!(url = %url, "Serving exported build");

        writeln!(console, "Serving at: {}", url)?;
        writeln!(console, "Scan the QR code below with your mobile device to open it:")?;
        if let Some(qr) = render_qr(&url) {
            writeln!(console, "{}", qr)?;
        }
        writeln!(
            console,
            "NOTE: The certificate is self-signed. Your browser will show a security warning; accept it to continue."
        )?;
        console.flush()?;

        http::serve(listener, tls, root, handle).await?;

        writeln!(console)?;
        writeln!(console, "Server stopped.")?;
        Ok(())
    }

    fn ensure_certificate<W: Write>(
        &self,
        console: &mut W,
        host: &str,
    ) -> Result<CertificateRecord, LaunchError> {
        let store = CertificateStore::new(&self.config.tls.cert_path, &self.config.tls.key_path);

        if self.regenerate_cert || !store.exists() {
            writeln!(console, "Generating self-signed certificate for {}...", host)?;
        }

        let record = if self.regenerate_cert {
            store.regenerate(host)?
        } else {
            store.ensure(host)?
        };

        if record.origin == CertificateOrigin::Generated {
            writeln!(console, "Certificate generated.")?;
        }
        Ok(record)
    }

    /// Reused certificates are not replaced; mismatches are only reported.
    fn check_reused<W: Write>(
        &self,
        console: &mut W,
        record: &CertificateRecord,
        host: &str,
    ) -> Result<(), LaunchError> {
        if record.origin != CertificateOrigin::Reused {
            return Ok(());
        }

        let sans: Vec<String> = record
            .subject_alt_names
            .iter()
            .map(ToString::to_string)
            .collect();
        tracing::debug!(
            not_before = %record.not_before,
            not_after = %record.not_after,
            subject_alt_names = ?sans,
            "Loaded existing certificate"
        );

        if !record.is_valid_at(OffsetDateTime::now_utc()) {
            tracing::warn!(not_after = %record.not_after, "Existing certificate is not currently valid");
            writeln!(
                console,
                "Warning: the existing certificate is expired or not yet valid. Rerun with --regenerate-cert."
            )?;
        }

        if !record.covers(host) {
            tracing::warn!(host = %host, subject_alt_names = ?sans, "Existing certificate does not cover host");
            writeln!(
                console,
                "Warning: the existing certificate does not list {}. Rerun with --regenerate-cert.",
                host
            )?;
        }
        Ok(())
    }
}

/// `https://host:port`, bracketing IPv6 literals.
pub fn https_url(host: &str, port: u16) -> String {
    match parse_ip_literal(host) {
        Some(std::net::IpAddr::V6(ip)) => format!("https://[{}]:{}", ip, port),
        _ => format!("https://{}:{}", host, port),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_https_url() {
        assert_eq!(https_url("192.168.1.20", 8000), "https://192.168.1.20:8000");
        assert_eq!(https_url("devbox.local", 8443), "https://devbox.local:8443");
        assert_eq!(https_url("fe80::1", 8000), "https://[fe80::1]:8000");
    }

    #[tokio::test]
    async fn test_missing_export_dir_has_no_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.resolve_paths(dir.path());
        let launcher = Launcher::new(config);

        let mut console = Vec::new();
        let err = launcher.run(&mut console, Handle::new()).await.unwrap_err();

        let expected = dir.path().join("build/web");
        match err {
            LaunchError::MissingExportDir { path } => assert_eq!(path, expected),
            other => panic!("unexpected error: {other:?}"),
        }

        let output = String::from_utf8(console).unwrap();
        assert!(output.contains(&expected.join("index.html").display().to_string()));
        assert!(!dir.path().join("server.pem").exists());
        assert!(!dir.path().join("key.pem").exists());
    }
}
