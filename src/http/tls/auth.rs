//! Authentication strategy resolution
//!
//! The credential set a connection was built with decides, once, which
//! strategy its handshakes use. `Authenticator` is the handshake hook that
//! turns that strategy into exactly one `handshake_client` call per session.
//!
//! Client authentication is either a password (TLS-PSK keyed from the
//! password, which also authenticates the server) or an X.509 client
//! certificate.
//!
//! Server authentication comes from a pinned fingerprint, from the password
//! scheme's mutual authentication, or both. The combined strategy is a
//! password plus a pin: the session then negotiates a PSK suite in which the
//! server still sends its certificate, and the two checks are applied
//! independently. With neither, the server is not authenticated at all.

use super::config::{HandshakeSettings, TlsError};
use super::credentials::{CertificateCredential, CredentialSet, Fingerprint, PasswordCredential};
use super::handshake::{Handshake, HandshakeRequest};
use super::session::SecureSession;

/// How the server's identity is established
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerAuth {
    /// Leaf certificate must match the pinned fingerprint
    Pinned,
    /// Implied by password-based mutual authentication
    Mutual,
    /// Pin and mutual authentication, each checked on its own
    PinnedAndMutual,
    /// Server identity is not verified
    None,
}

/// Handshake strategy selected from a credential set
#[derive(Debug, Clone)]
pub enum AuthStrategy {
    Password(PasswordCredential),
    Certificate {
        credential: CertificateCredential,
        pin: Option<Fingerprint>,
    },
    /// Password authentication plus a pinned server certificate
    Combined {
        password: PasswordCredential,
        pin: Fingerprint,
    },
    FingerprintOnly(Fingerprint),
    Unauthenticated,
}

impl AuthStrategy {
    /// Select the strategy for a validated credential set
    pub fn resolve(credentials: CredentialSet) -> Self {
        // `CredentialSet::new` never pairs a password with a certificate
        match credentials.into_parts() {
            (Some(password), _, Some(pin)) => AuthStrategy::Combined { password, pin },
            (Some(password), _, None) => AuthStrategy::Password(password),
            (None, Some(credential), pin) => AuthStrategy::Certificate { credential, pin },
            (None, None, Some(pin)) => AuthStrategy::FingerprintOnly(pin),
            (None, None, None) => AuthStrategy::Unauthenticated,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AuthStrategy::Password(_) => "password",
            AuthStrategy::Certificate { .. } => "certificate",
            AuthStrategy::Combined { .. } => "combined",
            AuthStrategy::FingerprintOnly(_) => "fingerprint",
            AuthStrategy::Unauthenticated => "unauthenticated",
        }
    }

    pub fn password(&self) -> Option<&PasswordCredential> {
        match self {
            AuthStrategy::Password(password) | AuthStrategy::Combined { password, .. } => {
                Some(password)
            }
            _ => None,
        }
    }

    pub fn certificate(&self) -> Option<&CertificateCredential> {
        match self {
            AuthStrategy::Certificate { credential, .. } => Some(credential),
            _ => None,
        }
    }

    pub fn pin(&self) -> Option<&Fingerprint> {
        match self {
            AuthStrategy::Certificate { pin, .. } => pin.as_ref(),
            AuthStrategy::Combined { pin, .. } | AuthStrategy::FingerprintOnly(pin) => Some(pin),
            AuthStrategy::Password(_) | AuthStrategy::Unauthenticated => None,
        }
    }

    pub fn server_auth(&self) -> ServerAuth {
        match (self.pin().is_some(), self.password().is_some()) {
            (true, true) => ServerAuth::PinnedAndMutual,
            (true, false) => ServerAuth::Pinned,
            (false, true) => ServerAuth::Mutual,
            (false, false) => ServerAuth::None,
        }
    }

    /// Whether handshakes under these settings verify the server at all
    ///
    /// CA chain validation from the settings counts even when the strategy
    /// itself has no server check.
    pub fn authenticates_server(&self, settings: &HandshakeSettings) -> bool {
        self.server_auth() != ServerAuth::None || settings.verifies_chain()
    }

    /// Parameters for one handshake under this strategy
    pub fn request<'a>(
        &'a self,
        settings: &'a HandshakeSettings,
        server_name: &'a str,
    ) -> HandshakeRequest<'a> {
        HandshakeRequest {
            password: self.password(),
            certificate: self.certificate(),
            fingerprint: self.pin(),
            settings,
            server_name,
        }
    }
}

/// Handshake hook driving the selected strategy
///
/// Stateless across handshakes: every call derives its request from the same
/// immutable strategy and settings.
#[derive(Debug, Clone)]
pub struct Authenticator {
    strategy: AuthStrategy,
    settings: HandshakeSettings,
    server_name: String,
}

impl Authenticator {
    pub fn new(
        credentials: CredentialSet,
        settings: HandshakeSettings,
        server_name: impl Into<String>,
    ) -> Self {
        let strategy = AuthStrategy::resolve(credentials);
        let server_name = server_name.into();

        if !strategy.authenticates_server(&settings) {
            tracing::warn!(
                server = %server_name,
                strategy = strategy.name(),
                "server identity will not be authenticated"
            );
        }

        Authenticator {
            strategy,
            settings,
            server_name,
        }
    }

    pub fn strategy(&self) -> &AuthStrategy {
        &self.strategy
    }

    pub fn settings(&self) -> &HandshakeSettings {
        &self.settings
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }
}

impl<S: SecureSession + ?Sized> Handshake<S> for Authenticator {
    fn handshake(&self, session: &mut S) -> Result<(), TlsError> {
        tracing::debug!(
            server = %self.server_name,
            strategy = self.strategy.name(),
            server_auth = ?self.strategy.server_auth(),
            "starting client handshake"
        );

        let request = self.strategy.request(&self.settings, &self.server_name);
        session.handshake_client(&request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::session::{PollEvents, SessionOps};
    use crate::http::tls::credentials::{CertificateChain, PrivateKey};
    use crate::http::tls::testutil::self_signed;
    use std::time::Duration;

    const PIN: &str = "00112233445566778899aabbccddeeff00112233";

    /// Records the request it was handshaken with
    #[derive(Default)]
    struct Recorder {
        calls: usize,
        password: Option<String>,
        has_certificate: bool,
        pin: Option<String>,
        server_name: String,
        fail_with: Option<&'static str>,
    }

    impl SessionOps for Recorder {
        fn poll(&self, _: PollEvents, _: Option<Duration>) -> crate::http::Result<bool> {
            Ok(true)
        }
        fn read(&mut self, _: &mut [u8]) -> crate::http::Result<usize> {
            Ok(0)
        }
        fn write(&mut self, buf: &[u8]) -> crate::http::Result<usize> {
            Ok(buf.len())
        }
        fn close(&mut self) -> crate::http::Result<()> {
            Ok(())
        }
    }

    impl SecureSession for Recorder {
        fn handshake_client(&mut self, request: &HandshakeRequest<'_>) -> Result<(), TlsError> {
            self.calls += 1;
            self.password = request
                .password
                .map(|p| format!("{}:{}", p.username(), p.password()));
            self.has_certificate = request.certificate.is_some();
            self.pin = request.fingerprint.map(|f| f.to_hex());
            self.server_name = request.server_name.to_string();
            match self.fail_with {
                Some(msg) => Err(TlsError::HandshakeFailed(msg.to_string())),
                None => Ok(()),
            }
        }
    }

    fn password(pin: bool) -> CredentialSet {
        CredentialSet::new(
            Some("alice".to_string()),
            Some("secret".to_string()),
            None,
            None,
            pin.then_some(PIN),
        )
        .unwrap()
    }

    fn certificate(pin: bool) -> CredentialSet {
        let (cert, key) = self_signed("client.test");
        let chain = CertificateChain::new(vec![cert]).unwrap();
        CredentialSet::new(None, None, Some(chain), Some(PrivateKey::new(key)), pin.then_some(PIN))
            .unwrap()
    }

    fn pin_only() -> CredentialSet {
        CredentialSet::new(None, None, None, None, Some(PIN)).unwrap()
    }

    fn authenticator(credentials: CredentialSet) -> Authenticator {
        Authenticator::new(credentials, HandshakeSettings::default(), "example.test")
    }

    #[test]
    fn test_strategy_selection() {
        assert!(matches!(
            AuthStrategy::resolve(password(false)),
            AuthStrategy::Password(_)
        ));
        assert!(matches!(
            AuthStrategy::resolve(password(true)),
            AuthStrategy::Combined { .. }
        ));
        assert!(matches!(
            AuthStrategy::resolve(certificate(true)),
            AuthStrategy::Certificate { pin: Some(_), .. }
        ));
        assert!(matches!(
            AuthStrategy::resolve(pin_only()),
            AuthStrategy::FingerprintOnly(_)
        ));
        assert!(matches!(
            AuthStrategy::resolve(CredentialSet::none()),
            AuthStrategy::Unauthenticated
        ));
    }

    #[test]
    fn test_server_auth_policy() {
        let policy = |credentials| AuthStrategy::resolve(credentials).server_auth();
        assert_eq!(policy(password(false)), ServerAuth::Mutual);
        assert_eq!(policy(pin_only()), ServerAuth::Pinned);
        assert_eq!(policy(password(true)), ServerAuth::PinnedAndMutual);
        assert_eq!(policy(certificate(true)), ServerAuth::Pinned);
        assert_eq!(policy(certificate(false)), ServerAuth::None);
        assert_eq!(policy(CredentialSet::none()), ServerAuth::None);
    }

    #[test]
    fn test_unauthenticated_server_detection() {
        let plain = HandshakeSettings::default();
        assert!(!AuthStrategy::resolve(CredentialSet::none()).authenticates_server(&plain));
        assert!(!AuthStrategy::resolve(certificate(false)).authenticates_server(&plain));
        assert!(AuthStrategy::resolve(password(false)).authenticates_server(&plain));
        assert!(AuthStrategy::resolve(pin_only()).authenticates_server(&plain));

        // A CA bundle authenticates the server through chain validation
        let ca = tempfile::NamedTempFile::new().unwrap();
        let verifying = HandshakeSettings::builder().ca_file(ca.path()).build().unwrap();
        assert!(AuthStrategy::resolve(CredentialSet::none()).authenticates_server(&verifying));
        assert!(AuthStrategy::resolve(certificate(false)).authenticates_server(&verifying));
    }

    #[test]
    fn test_combined_request_carries_password_and_pin() {
        let auth = authenticator(password(true));
        let mut session = Recorder::default();

        auth.handshake(&mut session).unwrap();

        assert_eq!(session.calls, 1);
        assert_eq!(session.password.as_deref(), Some("alice:secret"));
        assert!(!session.has_certificate);
        assert_eq!(session.pin.as_deref(), Some(PIN));
        assert_eq!(session.server_name, "example.test");
    }

    #[test]
    fn test_certificate_request_carries_pin() {
        let auth = authenticator(certificate(true));
        let mut session = Recorder::default();

        auth.handshake(&mut session).unwrap();

        assert_eq!(session.calls, 1);
        assert!(session.password.is_none());
        assert!(session.has_certificate);
        assert_eq!(session.pin.as_deref(), Some(PIN));
    }

    #[test]
    fn test_unauthenticated_request_is_empty() {
        let auth = authenticator(CredentialSet::none());
        let mut session = Recorder::default();

        auth.handshake(&mut session).unwrap();

        assert_eq!(session.calls, 1);
        assert!(session.password.is_none());
        assert!(!session.has_certificate);
        assert!(session.pin.is_none());
    }

    #[test]
    fn test_failure_propagates_unchanged() {
        let auth = authenticator(password(false));
        let mut session = Recorder {
            fail_with: Some("bad record mac"),
            ..Default::default()
        };

        let err = auth.handshake(&mut session).unwrap_err();
        assert!(matches!(err, TlsError::HandshakeFailed(ref m) if m == "bad record mac"));
        assert_eq!(session.calls, 1);
    }

    #[test]
    fn test_each_session_gets_its_own_call() {
        let auth = authenticator(password(false));
        let mut first = Recorder::default();
        let mut second = Recorder::default();

        auth.handshake(&mut first).unwrap();
        auth.handshake(&mut second).unwrap();

        assert_eq!(first.calls, 1);
        assert_eq!(second.calls, 1);
        assert_eq!(first.password, second.password);
    }
}
