//! End-to-end tests against loopback OpenSSL servers

mod common;

use common::{self_signed, ServerConfig, TlsServer};
use std::time::Duration;
use tlshttp::http::tls::{
    derive_psk, CertificateChain, Fingerprint, FingerprintAlgorithm, HttpsConnection, PrivateKey,
    TlsError,
};
use tlshttp::http::{Error, Method};

fn psk_server(connections: usize) -> TlsServer {
    TlsServer::start(
        ServerConfig {
            psk: Some(("alice".to_string(), derive_psk("alice", "secret").unwrap())),
            ..Default::default()
        },
        connections,
    )
}

fn sha256(server: &TlsServer) -> String {
    Fingerprint::of(&server.cert, FingerprintAlgorithm::Sha256)
        .unwrap()
        .to_hex()
}

#[test]
fn test_password_get() {
    let server = psk_server(1);
    let port = server.port;

    let mut conn = HttpsConnection::builder("127.0.0.1")
        .port(port)
        .username("alice")
        .password("secret")
        .connect_timeout(Some(Duration::from_secs(5)))
        .build()
        .unwrap();

    let response = conn.get("/hello").unwrap();
    assert_eq!(response.status().code(), 200);
    assert_eq!(response.text(), "/hello");

    let info = conn.session().unwrap().info().unwrap().clone();
    assert_eq!(info.version, "TLSv1.2");
    assert!(info.cipher.unwrap().contains("PSK"));

    conn.close().unwrap();
    let served = server.join();
    let first = served[0].as_ref().unwrap();
    assert_eq!(first.request_lines, vec!["GET /hello HTTP/1.1".to_string()]);
    assert_eq!(first.hosts, vec![format!("127.0.0.1:{}", port)]);
}

#[test]
fn test_wrong_password_fails_connect() {
    let server = psk_server(1);

    let mut conn = HttpsConnection::builder("127.0.0.1")
        .port(server.port)
        .username("alice")
        .password("not-the-password")
        .build()
        .unwrap();

    let err = conn.get("/").unwrap_err();
    assert!(matches!(err, Error::Tls(TlsError::HandshakeFailed(_))), "{}", err);
    assert!(!conn.is_connected());
    assert!(matches!(conn.get_response(), Err(Error::NotConnected)));

    assert!(server.join()[0].is_err());
}

#[test]
fn test_pinned_server_accepted() {
    let server = TlsServer::start(ServerConfig::default(), 1);

    let mut conn = HttpsConnection::builder("localhost")
        .port(server.port)
        .fingerprint(sha256(&server))
        .build()
        .unwrap();

    assert_eq!(conn.get("/pinned").unwrap().text(), "/pinned");
    let info = conn.session().unwrap().info().unwrap();
    assert_eq!(info.peer().unwrap().sha256, sha256(&server));
    assert_eq!(info.servername.as_deref(), Some("localhost"));

    conn.close().unwrap();
    server.join();
}

#[test]
fn test_pin_mismatch_blocks_traffic() {
    let server = TlsServer::start(ServerConfig::default(), 1);
    let (other, _) = self_signed("impostor");
    let wrong = Fingerprint::of(&other, FingerprintAlgorithm::Sha1).unwrap();

    let mut conn = HttpsConnection::builder("127.0.0.1")
        .port(server.port)
        .fingerprint(wrong.to_hex())
        .build()
        .unwrap();

    match conn.connect().unwrap_err() {
        Error::Tls(TlsError::FingerprintMismatch { expected, .. }) => {
            assert_eq!(expected, wrong.to_hex())
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(!conn.is_connected());
    assert!(conn.session().is_none());

    let served = server.join();
    assert!(served[0].as_ref().map(|s| s.request_lines.is_empty()).unwrap_or(true));
}

#[test]
fn test_client_certificate_from_pem_files() {
    let server = TlsServer::start(
        ServerConfig {
            require_client_cert: true,
            ..Default::default()
        },
        1,
    );

    let (cert, key) = self_signed("client-one");
    let dir = tempfile::tempdir().unwrap();
    let cert_path = dir.path().join("client.pem");
    let key_path = dir.path().join("client.key");
    std::fs::write(&cert_path, cert.to_pem().unwrap()).unwrap();
    std::fs::write(&key_path, key.private_key_to_pem_pkcs8().unwrap()).unwrap();

    let mut conn = HttpsConnection::builder("127.0.0.1")
        .port(server.port)
        .certificate_chain(CertificateChain::from_pem_file(&cert_path).unwrap())
        .private_key(PrivateKey::from_pem_file(&key_path).unwrap())
        .fingerprint(sha256(&server))
        .build()
        .unwrap();

    let response = conn.post("/upload", b"payload".to_vec()).unwrap();
    assert_eq!(response.text(), "/upload");

    conn.close().unwrap();
    let served = server.join();
    let first = served[0].as_ref().unwrap();
    assert_eq!(first.client_cn.as_deref(), Some("client-one"));
    assert_eq!(first.request_lines, vec!["POST /upload HTTP/1.1".to_string()]);
}

#[test]
fn test_keep_alive_single_handshake() {
    let server = psk_server(1);

    let mut conn = HttpsConnection::builder("127.0.0.1")
        .port(server.port)
        .username("alice")
        .password("secret")
        .build()
        .unwrap();

    assert_eq!(conn.get("/one").unwrap().text(), "/one");
    assert_eq!(conn.get("/two").unwrap().text(), "/two");
    let head = conn
        .send(tlshttp::http::HttpRequest::new(Method::Head, "/three"))
        .unwrap();
    assert!(head.body().is_empty());

    conn.close().unwrap();
    let served = server.join();
    assert_eq!(served.len(), 1);
    assert_eq!(served[0].as_ref().unwrap().request_lines.len(), 3);
}

#[test]
fn test_reconnect_performs_fresh_handshake() {
    let server = TlsServer::start(
        ServerConfig {
            psk: Some(("alice".to_string(), derive_psk("alice", "secret").unwrap())),
            close_each: true,
            ..Default::default()
        },
        2,
    );

    let mut conn = HttpsConnection::builder("127.0.0.1")
        .port(server.port)
        .username("alice")
        .password("secret")
        .build()
        .unwrap();

    assert_eq!(conn.get("/first").unwrap().text(), "/first");
    assert!(!conn.is_connected());
    assert_eq!(conn.get("/second").unwrap().text(), "/second");
    assert!(!conn.is_connected());

    let served = server.join();
    assert_eq!(served.len(), 2);
    assert!(served.iter().all(|s| s.as_ref().unwrap().request_lines.len() == 1));
}

#[test]
fn test_unreachable_port_is_network_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let mut conn = HttpsConnection::builder("127.0.0.1")
        .port(port)
        .username("alice")
        .password("secret")
        .connect_timeout(Some(Duration::from_secs(1)))
        .build()
        .unwrap();

    assert!(matches!(conn.get("/"), Err(Error::Network(_))));
    assert!(!conn.is_connected());
}

fn rsa_psk_server(connections: usize) -> TlsServer {
    TlsServer::start(
        ServerConfig {
            psk: Some(("alice".to_string(), derive_psk("alice", "secret").unwrap())),
            rsa: true,
            ..Default::default()
        },
        connections,
    )
}

#[test]
fn test_password_with_matching_pin() {
    let server = rsa_psk_server(1);

    let mut conn = HttpsConnection::builder("127.0.0.1")
        .port(server.port)
        .username("alice")
        .password("secret")
        .fingerprint(sha256(&server))
        .build()
        .unwrap();
    assert_eq!(conn.transport().hook().strategy().name(), "combined");

    assert_eq!(conn.get("/both").unwrap().text(), "/both");
    let info = conn.session().unwrap().info().unwrap();
    assert!(info.cipher.as_deref().unwrap().starts_with("RSA-PSK"));
    assert_eq!(info.peer().unwrap().sha256, sha256(&server));

    conn.close().unwrap();
    let served = server.join();
    assert_eq!(served[0].as_ref().unwrap().request_lines.len(), 1);
}

#[test]
fn test_password_with_wrong_pin_fails() {
    let server = rsa_psk_server(1);
    let (other, _) = self_signed("impostor");
    let wrong = Fingerprint::of(&other, FingerprintAlgorithm::Sha256).unwrap();

    let mut conn = HttpsConnection::builder("127.0.0.1")
        .port(server.port)
        .username("alice")
        .password("secret")
        .fingerprint(wrong.to_hex())
        .build()
        .unwrap();

    assert!(matches!(
        conn.connect(),
        Err(Error::Tls(TlsError::FingerprintMismatch { .. }))
    ));
    assert!(!conn.is_connected());
    server.join();
}

#[test]
fn test_password_with_certificate_rejected() {
    let (cert, key) = self_signed("client-one");

    let result = HttpsConnection::builder("127.0.0.1")
        .username("alice")
        .password("secret")
        .certificate_chain(CertificateChain::new(vec![cert]).unwrap())
        .private_key(PrivateKey::new(key))
        .build();

    assert!(matches!(result, Err(TlsError::InvalidConfig(_))));
}
