//! Configuration loading and constants.
//!
//! Loads the server configuration from an optional TOML file and defines the
//! response header policy, default paths, and logging defaults. `AppConfig` is
//! the root configuration struct; it is built once at startup and shared
//! read-only by the certificate store and the static server.

use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

// =============================================================================
// Response Header Policy
// =============================================================================
// Set on every response regardless of status. The Cross-Origin pair turns on
// cross-origin isolation (required for SharedArrayBuffer).

pub const CROSS_ORIGIN_OPENER_POLICY: &str = "same-origin";
pub const CROSS_ORIGIN_EMBEDDER_POLICY: &str = "require-corp";
pub const CACHE_CONTROL_NO_CACHE: &str = "no-cache, no-store, must-revalidate";

/// Header name/value pairs set on every outgoing response.
pub const HEADER_POLICY: [(&str, &str); 3] = [
    ("cross-origin-opener-policy", CROSS_ORIGIN_OPENER_POLICY),
    ("cross-origin-embedder-policy", CROSS_ORIGIN_EMBEDDER_POLICY),
    ("cache-control", CACHE_CONTROL_NO_CACHE),
];

// =============================================================================
// Certificate Constants
// =============================================================================

/// Validity window of a generated certificate, in days
pub const CERT_VALIDITY_DAYS: i64 = 365;

/// Common name and DNS SAN always present in a generated certificate
pub const CERT_COMMON_NAME: &str = "localhost";

// =============================================================================
// Default Paths and Strings
// =============================================================================

/// Configuration file picked up from the working directory when present
pub const DEFAULT_CONFIG_PATH: &str = "pocketserve.toml";

/// Default export directory of the web build
pub const DEFAULT_ROOT_DIR: &str = "build/web";

/// Default certificate and key file names
pub const DEFAULT_CERT_PATH: &str = "server.pem";
pub const DEFAULT_KEY_PATH: &str = "key.pem";

/// Default bind address and port
pub const DEFAULT_HTTP_HOST: &str = "0.0.0.0";
pub const DEFAULT_HTTP_PORT: u16 = 8000;

/// Seconds to wait for in-flight responses after an interrupt
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;

/// Default log filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "pocketserve=info,tower_http=info";

/// Default log format (text or json)
pub const DEFAULT_LOG_FORMAT: &str = "text";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// HTTPS listener configuration
    #[serde(default)]
    pub http: HttpServerConfig,
    /// Exported web build
    #[serde(default)]
    pub site: SiteConfig,
    /// Certificate and key locations
    #[serde(default)]
    pub tls: TlsConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTPS listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "HttpServerConfig::default_host")]
    pub host: String,
    #[serde(default = "HttpServerConfig::default_port")]
    pub port: u16,
    /// Host shown in the URL and bound into the certificate.
    /// Defaults to the detected LAN address.
    pub advertise_host: Option<String>,
    #[serde(default = "HttpServerConfig::default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            advertise_host: None,
            shutdown_grace_seconds: Self::default_shutdown_grace(),
        }
    }
}

impl HttpServerConfig {
    fn default_host() -> String {
        DEFAULT_HTTP_HOST.to_string()
    }

    fn default_port() -> u16 {
        DEFAULT_HTTP_PORT
    }

    fn default_shutdown_grace() -> u64 {
        DEFAULT_SHUTDOWN_GRACE_SECS
    }

    /// Socket address to listen on. Only IP literals are accepted for `host`.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.host.parse().map_err(|_| {
            ConfigError::Validation(format!(
                "http.host must be an IP address, got \"{}\"",
                self.host
            ))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Directory the build was exported to
    #[serde(default = "SiteConfig::default_root")]
    pub root: PathBuf,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            root: Self::default_root(),
        }
    }
}

impl SiteConfig {
    fn default_root() -> PathBuf {
        PathBuf::from(DEFAULT_ROOT_DIR)
    }

    /// Path of the entry page the export step is expected to produce.
    pub fn index_path(&self) -> PathBuf {
        self.root.join("index.html")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TlsConfig {
    #[serde(default = "TlsConfig::default_cert_path")]
    pub cert_path: PathBuf,
    #[serde(default = "TlsConfig::default_key_path")]
    pub key_path: PathBuf,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            cert_path: Self::default_cert_path(),
            key_path: Self::default_key_path(),
        }
    }
}

impl TlsConfig {
    fn default_cert_path() -> PathBuf {
        PathBuf::from(DEFAULT_CERT_PATH)
    }

    fn default_key_path() -> PathBuf {
        PathBuf::from(DEFAULT_KEY_PATH)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "text" (human-readable, default) or "json" (structured)
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_LOG_FORMAT.to_string(),
        }
    }
}

impl LoggingConfig {
    fn default_format() -> String {
        DEFAULT_LOG_FORMAT.to_string()
    }

    pub fn is_json(&self) -> bool {
        self.format == "json"
    }
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.http.bind_addr()?;

        match self.logging.format.as_str() {
            "text" | "json" => {}
            other => {
                return Err(ConfigError::Validation(format!(
                    "logging.format must be \"text\" or \"json\", got \"{}\"",
                    other
                )))
            }
        }

        if let Some(host) = &self.http.advertise_host {
            if host.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "http.advertise_host must not be empty".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Make the site root and certificate paths absolute against `base`.
    ///
    /// Paths that are already absolute are left untouched.
    pub fn resolve_paths(&mut self, base: &Path) {
        for path in [
            &mut self.site.root,
            &mut self.tls.cert_path,
            &mut self.tls.key_path,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
}
