//! Client credentials and server pins
//!
//! Credential values are passed through to the secure session untouched.
//! `CredentialSet::new` is where the pairing rules are enforced: a username
//! needs a password, a certificate chain needs a private key, and the reverse.
//! A client authenticates with a password or with a certificate, never both:
//! PSK suites give the server no way to request a client certificate.
//! Violations are configuration errors raised before any socket exists.

use super::config::TlsError;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::x509::{X509, X509Ref};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Iteration count for deriving the pre-shared key from a password
pub const PSK_ITERATIONS: usize = 4096;

/// Length in bytes of the derived pre-shared key
pub const PSK_LEN: usize = 32;

const PSK_SALT_PREFIX: &str = "tlshttp-psk:";

/// Derive the TLS pre-shared key for a username/password pair
///
/// PBKDF2-HMAC-SHA256 over the password, salted with the username. Servers
/// provision the same key to authenticate the client, and the client in turn
/// only completes a handshake with a server holding it.
pub fn derive_psk(username: &str, password: &str) -> Result<[u8; PSK_LEN], TlsError> {
    let salt = format!("{}{}", PSK_SALT_PREFIX, username);
    let mut key = [0u8; PSK_LEN];
    openssl::pkcs5::pbkdf2_hmac(
        password.as_bytes(),
        salt.as_bytes(),
        PSK_ITERATIONS,
        MessageDigest::sha256(),
        &mut key,
    )?;
    Ok(key)
}

/// Username and password for password-based mutual authentication
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordCredential {
    username: String,
    password: String,
}

impl PasswordCredential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Result<Self, TlsError> {
        let username = username.into();
        if username.is_empty() {
            return Err(TlsError::InvalidConfig("username must not be empty".to_string()));
        }
        // OpenSSL caps PSK identities at 128 bytes
        if username.len() > 128 {
            return Err(TlsError::InvalidConfig(
                "username must be at most 128 bytes".to_string(),
            ));
        }
        Ok(PasswordCredential {
            username,
            password: password.into(),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn psk(&self) -> Result<[u8; PSK_LEN], TlsError> {
        derive_psk(&self.username, &self.password)
    }
}

impl fmt::Debug for PasswordCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordCredential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// X.509 certificate chain, leaf first
#[derive(Clone)]
pub struct CertificateChain {
    certs: Vec<X509>,
}

impl CertificateChain {
    pub fn new(certs: Vec<X509>) -> Result<Self, TlsError> {
        if certs.is_empty() {
            return Err(TlsError::Certificate("certificate chain is empty".to_string()));
        }
        Ok(CertificateChain { certs })
    }

    /// Load every certificate in a PEM bundle
    pub fn from_pem(pem: &[u8]) -> Result<Self, TlsError> {
        let certs = X509::stack_from_pem(pem).map_err(|e| {
            TlsError::Certificate(format!("Failed to load certificate chain: {}", e))
        })?;
        Self::new(certs)
    }

    pub fn from_pem_file<P: AsRef<Path>>(path: P) -> Result<Self, TlsError> {
        Self::from_pem(&std::fs::read(path)?)
    }

    pub fn leaf(&self) -> &X509Ref {
        &self.certs[0]
    }

    /// Certificates after the leaf
    pub fn intermediates(&self) -> &[X509] {
        &self.certs[1..]
    }

    pub fn len(&self) -> usize {
        self.certs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }
}

impl fmt::Debug for CertificateChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateChain")
            .field("len", &self.certs.len())
            .finish()
    }
}

/// Private key matching a certificate chain's leaf
#[derive(Clone)]
pub struct PrivateKey {
    key: PKey<Private>,
}

impl PrivateKey {
    pub fn new(key: PKey<Private>) -> Self {
        PrivateKey { key }
    }

    pub fn from_pem(pem: &[u8]) -> Result<Self, TlsError> {
        let key = PKey::private_key_from_pem(pem)
            .map_err(|e| TlsError::Certificate(format!("Failed to load private key: {}", e)))?;
        Ok(PrivateKey { key })
    }

    pub fn from_pem_file<P: AsRef<Path>>(path: P) -> Result<Self, TlsError> {
        Self::from_pem(&std::fs::read(path)?)
    }

    pub fn as_pkey(&self) -> &PKey<Private> {
        &self.key
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

/// Certificate chain and key for certificate-based client authentication
#[derive(Debug, Clone)]
pub struct CertificateCredential {
    chain: CertificateChain,
    key: PrivateKey,
}

impl CertificateCredential {
    /// Pair a chain with its key, checking the key belongs to the leaf
    pub fn new(chain: CertificateChain, key: PrivateKey) -> Result<Self, TlsError> {
        let leaf_key = chain.leaf().public_key()?;
        if !leaf_key.public_eq(&**key.as_pkey()) {
            return Err(TlsError::InvalidConfig(
                "private key does not match the leaf certificate".to_string(),
            ));
        }
        Ok(CertificateCredential { chain, key })
    }

    pub fn chain(&self) -> &CertificateChain {
        &self.chain
    }

    pub fn key(&self) -> &PrivateKey {
        &self.key
    }
}

/// Digest used for a certificate fingerprint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerprintAlgorithm {
    Sha1,
    Sha256,
}

impl FingerprintAlgorithm {
    fn digest(&self) -> MessageDigest {
        match self {
            FingerprintAlgorithm::Sha1 => MessageDigest::sha1(),
            FingerprintAlgorithm::Sha256 => MessageDigest::sha256(),
        }
    }

    fn from_len(len: usize) -> Option<Self> {
        match len {
            20 => Some(FingerprintAlgorithm::Sha1),
            32 => Some(FingerprintAlgorithm::Sha256),
            _ => None,
        }
    }
}

/// Expected digest of the server's leaf certificate (DER encoding)
#[derive(Clone, PartialEq, Eq)]
pub struct Fingerprint {
    algorithm: FingerprintAlgorithm,
    bytes: Vec<u8>,
}

impl Fingerprint {
    /// Parse a hex fingerprint
    ///
    /// 40 hex digits select SHA-1, 64 select SHA-256. Case, `:` separators
    /// and whitespace are ignored.
    pub fn from_hex(s: &str) -> Result<Self, TlsError> {
        let cleaned: String = s
            .chars()
            .filter(|c| *c != ':' && !c.is_whitespace())
            .collect();

        let bytes = hex::decode(&cleaned)
            .map_err(|e| TlsError::InvalidConfig(format!("invalid fingerprint {:?}: {}", s, e)))?;

        let algorithm = FingerprintAlgorithm::from_len(bytes.len()).ok_or_else(|| {
            TlsError::InvalidConfig(format!(
                "fingerprint must be a SHA-1 or SHA-256 digest, got {} bytes",
                bytes.len()
            ))
        })?;

        Ok(Fingerprint { algorithm, bytes })
    }

    /// Fingerprint of a certificate
    pub fn of(cert: &X509Ref, algorithm: FingerprintAlgorithm) -> Result<Self, TlsError> {
        let digest = cert.digest(algorithm.digest())?;
        Ok(Fingerprint {
            algorithm,
            bytes: digest.to_vec(),
        })
    }

    pub fn algorithm(&self) -> FingerprintAlgorithm {
        self.algorithm
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Whether `cert` has this fingerprint
    pub fn matches(&self, cert: &X509Ref) -> Result<bool, TlsError> {
        let actual = cert.digest(self.algorithm.digest())?;
        Ok(actual.len() == self.bytes.len() && openssl::memcmp::eq(&actual, &self.bytes))
    }
}

impl FromStr for Fingerprint {
    type Err = TlsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Fingerprint::from_hex(s)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({:?}, {})", self.algorithm, self.to_hex())
    }
}

/// Validated set of credentials for one connection
///
/// At most one client credential (password or certificate), complete, plus an
/// optional server pin.
#[derive(Debug, Clone, Default)]
pub struct CredentialSet {
    password: Option<PasswordCredential>,
    certificate: Option<CertificateCredential>,
    fingerprint: Option<Fingerprint>,
}

impl CredentialSet {
    /// Validate raw, individually optional credential fields
    pub fn new(
        username: Option<String>,
        password: Option<String>,
        cert_chain: Option<CertificateChain>,
        private_key: Option<PrivateKey>,
        fingerprint: Option<&str>,
    ) -> Result<Self, TlsError> {
        let password = match (username, password) {
            (Some(u), Some(p)) => Some(PasswordCredential::new(u, p)?),
            (None, None) => None,
            (Some(_), None) => {
                return Err(TlsError::InvalidConfig(
                    "username requires a password".to_string(),
                ))
            }
            (None, Some(_)) => {
                return Err(TlsError::InvalidConfig(
                    "password requires a username".to_string(),
                ))
            }
        };

        let certificate = match (cert_chain, private_key) {
            (Some(chain), Some(key)) => Some(CertificateCredential::new(chain, key)?),
            (None, None) => None,
            (Some(_), None) => {
                return Err(TlsError::InvalidConfig(
                    "certificate chain requires a private key".to_string(),
                ))
            }
            (None, Some(_)) => {
                return Err(TlsError::InvalidConfig(
                    "private key requires a certificate chain".to_string(),
                ))
            }
        };

        if password.is_some() && certificate.is_some() {
            return Err(TlsError::InvalidConfig(
                "password and certificate authentication cannot be combined".to_string(),
            ));
        }

        let fingerprint = fingerprint.map(Fingerprint::from_hex).transpose()?;

        Ok(CredentialSet {
            password,
            certificate,
            fingerprint,
        })
    }

    /// No credentials and no pin
    pub fn none() -> Self {
        CredentialSet::default()
    }

    pub fn password(&self) -> Option<&PasswordCredential> {
        self.password.as_ref()
    }

    pub fn certificate(&self) -> Option<&CertificateCredential> {
        self.certificate.as_ref()
    }

    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        self.fingerprint.as_ref()
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        Option<PasswordCredential>,
        Option<CertificateCredential>,
        Option<Fingerprint>,
    ) {
        (self.password, self.certificate, self.fingerprint)
    }
}
