//! Self-signed certificate lifecycle.
//!
//! The certificate and its private key live in two PEM files. When both files
//! exist they are reused as-is; otherwise a fresh RSA-2048 key and a
//! self-signed certificate valid for `localhost` (and the advertised IP, when
//! it is an IP literal) are generated and written out.
//!
//! Reuse is decided by file existence alone. A certificate issued for an
//! older LAN address or past its expiry is still returned; callers can check
//! [`CertificateRecord::covers`] and [`CertificateRecord::is_valid_at`] and
//! ask for [`CertificateStore::regenerate`].

use std::fmt;
use std::fs;
use std::io::Write;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};

use rcgen::{
    CertificateParams, DistinguishedName, DnType, KeyPair, RsaKeySize, SanType, SerialNumber,
    PKCS_RSA_SHA256,
};
use time::{Duration, OffsetDateTime};
use x509_parser::extensions::GeneralName;
use x509_parser::pem::parse_x509_pem;

use crate::config::{CERT_COMMON_NAME, CERT_VALIDITY_DAYS};

/// Certificate store error
#[derive(Debug, thiserror::Error)]
pub enum CertError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Certificate generation failed: {0}")]
    Generate(#[from] rcgen::Error),

    #[error("Failed to parse certificate {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

/// One identity listed in the Subject Alternative Name extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectAltName {
    Dns(String),
    Ip(IpAddr),
}

impl fmt::Display for SubjectAltName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectAltName::Dns(name) => write!(f, "DNS:{}", name),
            SubjectAltName::Ip(ip) => write!(f, "IP:{}", ip),
        }
    }
}

/// Whether `ensure` produced a new certificate or found one on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateOrigin {
    Generated,
    Reused,
}

/// Public view of the certificate currently on disk.
///
/// The private key is never loaded into the record; the TLS layer reads it
/// straight from the key file.
#[derive(Debug, Clone)]
pub struct CertificateRecord {
    pub cert_pem: String,
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
    pub subject_alt_names: Vec<SubjectAltName>,
    pub origin: CertificateOrigin,
}

impl CertificateRecord {
    fn from_pem(pem: &str, origin: CertificateOrigin) -> Result<Self, String> {
        let (_, pem_block) = parse_x509_pem(pem.as_bytes()).map_err(|e| e.to_string())?;
        let cert = pem_block.parse_x509().map_err(|e| e.to_string())?;

        let validity = cert.validity();
        let mut subject_alt_names = Vec::new();
        if let Some(san) = cert.subject_alternative_name().map_err(|e| e.to_string())? {
            for name in &san.value.general_names {
                match name {
                    GeneralName::DNSName(dns) => {
                        subject_alt_names.push(SubjectAltName::Dns(dns.to_string()))
                    }
                    GeneralName::IPAddress(bytes) => {
                        if let Some(ip) = ip_from_octets(bytes) {
                            subject_alt_names.push(SubjectAltName::Ip(ip));
                        }
                    }
                    _ => {}
                }
            }
        }

        Ok(Self {
            cert_pem: pem.to_string(),
            not_before: validity.not_before.to_datetime(),
            not_after: validity.not_after.to_datetime(),
            subject_alt_names,
            origin,
        })
    }

    /// `not_before <= at < not_after`
    pub fn is_valid_at(&self, at: OffsetDateTime) -> bool {
        self.not_before <= at && at < self.not_after
    }

    /// Whether a client connecting via `host` would find it in the SAN list.
    pub fn covers(&self, host: &str) -> bool {
        match parse_ip_literal(host) {
            Some(ip) => self.subject_alt_names.contains(&SubjectAltName::Ip(ip)),
            None => self.subject_alt_names.iter().any(|san| {
                matches!(san, SubjectAltName::Dns(name) if name.eq_ignore_ascii_case(host))
            }),
        }
    }
}

fn ip_from_octets(bytes: &[u8]) -> Option<IpAddr> {
    if let Ok(octets) = <[u8; 4]>::try_from(bytes) {
        return Some(IpAddr::V4(Ipv4Addr::from(octets)));
    }
    <[u8; 16]>::try_from(bytes)
        .ok()
        .map(|octets| IpAddr::V6(Ipv6Addr::from(octets)))
}

/// Parse `host` as an IPv4 or IPv6 literal. Hostnames yield `None`.
pub fn parse_ip_literal(host: &str) -> Option<IpAddr> {
    host.trim().parse().ok()
}

/// Loads or creates the certificate/key pair at fixed paths.
#[derive(Debug, Clone)]
pub struct CertificateStore {
    cert_path: PathBuf,
    key_path: PathBuf,
}

impl CertificateStore {
    pub fn new(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        }
    }

    pub fn cert_path(&self) -> &Path {
        &self.cert_path
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    /// Both files present; the sole reuse signal.
    pub fn exists(&self) -> bool {
        self.cert_path.exists() && self.key_path.exists()
    }

    /// Return the stored certificate, generating one for `host` if either
    /// file is missing. Existing files are never written.
    pub fn ensure(&self, host: &str) -> Result<CertificateRecord, CertError> {
        if self.exists() {
            tracing::debug!(
                cert = %self.cert_path.display(),
                key = %self.key_path.display(),
                "Reusing existing certificate"
            );
            let pem = fs::read_to_string(&self.cert_path).map_err(|source| CertError::Io {
                path: self.cert_path.clone(),
                source,
            })?;
            return CertificateRecord::from_pem(&pem, CertificateOrigin::Reused).map_err(
                |reason| CertError::Parse {
                    path: self.cert_path.clone(),
                    reason,
                },
            );
        }

        self.regenerate(host)
    }

    /// Generate a new key and certificate for `host`, overwriting any files.
    pub fn regenerate(&self, host: &str) -> Result<CertificateRecord, CertError> {
        tracing::info!(host = %host, "Generating self-signed certificate");

        let key_pair = KeyPair::generate_rsa_for(&PKCS_RSA_SHA256, RsaKeySize::_2048)?;
        let params = certificate_params(host, OffsetDateTime::now_utc())?;
        let cert = params.self_signed(&key_pair)?;
        let cert_pem = cert.pem();

        write_pem(&self.key_path, key_pair.serialize_pem().as_bytes(), true)?;
        write_pem(&self.cert_path, cert_pem.as_bytes(), false)?;

        tracing::info!(
            cert = %self.cert_path.display(),
            key = %self.key_path.display(),
            "Certificate written"
        );

        CertificateRecord::from_pem(&cert_pem, CertificateOrigin::Generated).map_err(|reason| {
            CertError::Parse {
                path: self.cert_path.clone(),
                reason,
            }
        })
    }
}

/// Certificate parameters for `host`, valid from `now` (truncated to whole
/// seconds) for exactly [`CERT_VALIDITY_DAYS`] days.
fn certificate_params(host: &str, now: OffsetDateTime) -> Result<CertificateParams, rcgen::Error> {
    let mut distinguished_name = DistinguishedName::new();
    distinguished_name.push(DnType::CountryName, "JP");
    distinguished_name.push(DnType::StateOrProvinceName, "Tokyo");
    distinguished_name.push(DnType::LocalityName, "Local");
    distinguished_name.push(DnType::OrganizationName, "Dev Server");
    distinguished_name.push(DnType::CommonName, CERT_COMMON_NAME);

    let mut subject_alt_names = vec![SanType::DnsName(CERT_COMMON_NAME.try_into()?)];
    match parse_ip_literal(host) {
        Some(ip) => subject_alt_names.push(SanType::IpAddress(ip)),
        None => tracing::warn!(
            host = %host,
            "Host is not an IP literal, certificate will only cover localhost"
        ),
    }

    let not_before = now - Duration::nanoseconds(i64::from(now.nanosecond()));

    let mut params = CertificateParams::default();
    params.distinguished_name = distinguished_name;
    params.subject_alt_names = subject_alt_names;
    params.serial_number = Some(random_serial());
    params.not_before = not_before;
    params.not_after = not_before + Duration::days(CERT_VALIDITY_DAYS);
    Ok(params)
}

/// 128 random bits with the sign bit cleared so the DER integer stays positive.
fn random_serial() -> SerialNumber {
    let mut bytes: [u8; 16] = rand::random();
    bytes[0] &= 0x7f;
    SerialNumber::from_slice(&bytes)
}

fn write_pem(path: &Path, contents: &[u8], private: bool) -> Result<(), CertError> {
    let io_err = |source| CertError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        if private {
            options.mode(0o600);
        }
    }
    #[cfg(not(unix))]
    let _ = private;

    let mut file = options.open(path).map_err(io_err)?;
    file.write_all(contents).map_err(io_err)?;
    file.sync_all().map_err(io_err)
}
