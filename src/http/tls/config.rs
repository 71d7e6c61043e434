//! Handshake settings and TLS errors
//!
//! `HandshakeSettings` is the bundle of protocol preferences that travels
//! unmodified from the caller to the secure session, which applies it to the
//! OpenSSL context it builds for each handshake.

use openssl::ssl::{SslContextBuilder, SslVerifyMode, SslVersion};
use std::fmt;
use std::path::{Path, PathBuf};

/// TLS version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsVersion {
    Tls10,
    Tls11,
    Tls12,
    Tls13,
}

impl TlsVersion {
    /// Parse TLS version from string (case-insensitive)
    pub fn from_str(s: &str) -> Result<Self, TlsError> {
        match s.to_uppercase().as_str() {
            "TLSV1.0" | "TLS1.0" | "TLSV1" | "TLS1" => Ok(TlsVersion::Tls10),
            "TLSV1.1" | "TLS1.1" => Ok(TlsVersion::Tls11),
            "TLSV1.2" | "TLS1.2" => Ok(TlsVersion::Tls12),
            "TLSV1.3" | "TLS1.3" => Ok(TlsVersion::Tls13),
            _ => Err(TlsError::InvalidVersion(s.to_string())),
        }
    }

    pub fn to_openssl_version(&self) -> SslVersion {
        match self {
            TlsVersion::Tls10 => SslVersion::TLS1,
            TlsVersion::Tls11 => SslVersion::TLS1_1,
            TlsVersion::Tls12 => SslVersion::TLS1_2,
            TlsVersion::Tls13 => SslVersion::TLS1_3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TlsVersion::Tls10 => "TLSv1.0",
            TlsVersion::Tls11 => "TLSv1.1",
            TlsVersion::Tls12 => "TLSv1.2",
            TlsVersion::Tls13 => "TLSv1.3",
        }
    }
}

impl fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// TLS errors
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TLS version: {0}")]
    InvalidVersion(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("Server certificate fingerprint mismatch: expected {expected}, got {actual}")]
    FingerprintMismatch { expected: String, actual: String },

    #[error("Server presented no certificate")]
    NoPeerCertificate,

    #[error("TLS session not established")]
    NotEstablished,
}

/// Handshake preferences applied by the secure session
///
/// Every field is optional; unset fields keep OpenSSL's defaults.
#[derive(Debug, Clone, Default)]
pub struct HandshakeSettings {
    pub(crate) min_version: Option<TlsVersion>,
    pub(crate) max_version: Option<TlsVersion>,
    pub(crate) cipher_list: Option<String>,
    pub(crate) ciphersuites: Option<String>,
    pub(crate) alpn: Vec<String>,
    pub(crate) servername: Option<String>,
    pub(crate) ca_file: Option<PathBuf>,
}

impl HandshakeSettings {
    pub fn builder() -> HandshakeSettingsBuilder {
        HandshakeSettingsBuilder::default()
    }

    pub fn min_version(&self) -> Option<TlsVersion> {
        self.min_version
    }

    pub fn max_version(&self) -> Option<TlsVersion> {
        self.max_version
    }

    pub fn cipher_list(&self) -> Option<&str> {
        self.cipher_list.as_deref()
    }

    pub fn alpn(&self) -> &[String] {
        &self.alpn
    }

    /// SNI name override
    pub fn servername(&self) -> Option<&str> {
        self.servername.as_deref()
    }

    /// Whether the server chain is validated against a CA file
    pub fn verifies_chain(&self) -> bool {
        self.ca_file.is_some()
    }

    /// Apply the settings to a client context builder
    pub(crate) fn apply(&self, builder: &mut SslContextBuilder) -> Result<(), TlsError> {
        if let Some(min) = self.min_version {
            builder.set_min_proto_version(Some(min.to_openssl_version()))?;
        }
        if let Some(max) = self.max_version {
            builder.set_max_proto_version(Some(max.to_openssl_version()))?;
        }
        if let Some(ref ciphers) = self.cipher_list {
            builder.set_cipher_list(ciphers)?;
        }
        if let Some(ref suites) = self.ciphersuites {
            builder.set_ciphersuites(suites)?;
        }
        if !self.alpn.is_empty() {
            // Wire format: length-prefixed protocol names
            let mut wire = Vec::new();
            for proto in &self.alpn {
                wire.push(proto.len() as u8);
                wire.extend_from_slice(proto.as_bytes());
            }
            builder.set_alpn_protos(&wire)?;
        }
        if let Some(ref ca_file) = self.ca_file {
            builder.set_ca_file(ca_file)?;
            builder.set_verify(SslVerifyMode::PEER);
        }
        Ok(())
    }
}

/// Builder for `HandshakeSettings`
#[derive(Debug, Default)]
pub struct HandshakeSettingsBuilder {
    settings: HandshakeSettings,
}

impl HandshakeSettingsBuilder {
    /// Pin both the minimum and maximum version
    pub fn version(self, version: TlsVersion) -> Self {
        self.version_range(version, version)
    }

    pub fn version_range(mut self, min: TlsVersion, max: TlsVersion) -> Self {
        self.settings.min_version = Some(min);
        self.settings.max_version = Some(max);
        self
    }

    pub fn min_version(mut self, version: TlsVersion) -> Self {
        self.settings.min_version = Some(version);
        self
    }

    pub fn max_version(mut self, version: TlsVersion) -> Self {
        self.settings.max_version = Some(version);
        self
    }

    /// Cipher list for TLS <= 1.2 (OpenSSL cipher string syntax)
    pub fn cipher_list(mut self, ciphers: impl Into<String>) -> Self {
        self.settings.cipher_list = Some(ciphers.into());
        self
    }

    /// Cipher suites for TLS 1.3
    pub fn ciphersuites(mut self, suites: impl Into<String>) -> Self {
        self.settings.ciphersuites = Some(suites.into());
        self
    }

    pub fn alpn(mut self, protocols: &[&str]) -> Self {
        self.settings.alpn = protocols.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Override the SNI name (defaults to the target host)
    pub fn servername(mut self, name: impl Into<String>) -> Self {
        self.settings.servername = Some(name.into());
        self
    }

    /// Validate the server chain and host name against this CA bundle
    pub fn ca_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.settings.ca_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn build(self) -> Result<HandshakeSettings, TlsError> {
        let s = &self.settings;

        if let (Some(min), Some(max)) = (s.min_version, s.max_version) {
            if min > max {
                return Err(TlsError::InvalidConfig(format!(
                    "minimum version {} is above maximum {}",
                    min, max
                )));
            }
        }

        if let Some(bad) = s.alpn.iter().find(|p| p.is_empty() || p.len() > 255) {
            return Err(TlsError::InvalidConfig(format!(
                "ALPN protocol name must be 1..=255 bytes: {:?}",
                bad
            )));
        }

        if let Some(ref ca_file) = s.ca_file {
            if !ca_file.is_file() {
                return Err(TlsError::InvalidConfig(format!(
                    "CA file not found: {}",
                    ca_file.display()
                )));
            }
        }

        Ok(self.settings)
    }
}
