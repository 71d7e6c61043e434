//! Loopback TLS servers and throwaway certificates for integration tests

#![allow(dead_code)]

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::ssl::{Ssl, SslContext, SslMethod, SslStream, SslVerifyMode, SslVersion};
use openssl::x509::{X509NameBuilder, X509};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};

/// Self-signed P-256 certificate for `cn`
pub fn self_signed(cn: &str) -> (X509, PKey<Private>) {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    let key = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();
    (sign(cn, &key), key)
}

/// Self-signed RSA-2048 certificate; RSA-PSK suites need an RSA server key
pub fn self_signed_rsa(cn: &str) -> (X509, PKey<Private>) {
    let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
    (sign(cn, &key), key)
}

fn sign(cn: &str, key: &PKey<Private>) -> X509 {
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_nid(Nid::COMMONNAME, cn).unwrap();
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(7).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(key).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(30).unwrap()).unwrap();
    builder.sign(key, MessageDigest::sha256()).unwrap();
    builder.build()
}

#[derive(Default)]
pub struct ServerConfig {
    /// Accept this PSK identity/key over TLS 1.2
    pub psk: Option<(String, [u8; 32])>,
    pub require_client_cert: bool,
    /// Serve an RSA certificate instead of P-256
    pub rsa: bool,
    /// Answer every request with `Connection: close`
    pub close_each: bool,
}

/// What the server saw on one accepted connection
#[derive(Debug, Default)]
pub struct Served {
    pub client_cn: Option<String>,
    pub request_lines: Vec<String>,
    pub hosts: Vec<String>,
}

pub struct TlsServer {
    pub port: u16,
    pub cert: X509,
    handle: JoinHandle<Vec<Result<Served, String>>>,
}

impl TlsServer {
    /// Serve `connections` TLS connections, answering each request with its path
    pub fn start(config: ServerConfig, connections: usize) -> TlsServer {
        let (cert, key) = if config.rsa {
            self_signed_rsa("localhost")
        } else {
            self_signed("localhost")
        };
        let ctx = context(&cert, &key, &config);

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let close_each = config.close_each;

        let handle = thread::spawn(move || {
            let mut results = Vec::new();
            for _ in 0..connections {
                let (tcp, _) = listener.accept().unwrap();
                results.push(serve(&ctx, tcp, close_each));
            }
            results
        });

        TlsServer { port, cert, handle }
    }

    pub fn join(self) -> Vec<Result<Served, String>> {
        self.handle.join().unwrap()
    }
}

fn context(cert: &X509, key: &PKey<Private>, config: &ServerConfig) -> SslContext {
    let mut ctx = SslContext::builder(SslMethod::tls_server()).unwrap();
    ctx.set_certificate(cert).unwrap();
    ctx.set_private_key(key).unwrap();

    if let Some((identity, psk)) = config.psk.clone() {
        ctx.set_max_proto_version(Some(SslVersion::TLS1_2)).unwrap();
        ctx.set_cipher_list("PSK").unwrap();
        ctx.set_psk_server_callback(move |_ssl, client_identity, out| {
            if client_identity != Some(identity.as_bytes()) {
                return Ok(0);
            }
            out[..psk.len()].copy_from_slice(&psk);
            Ok(psk.len())
        });
    }
    if config.require_client_cert {
        ctx.set_verify_callback(
            SslVerifyMode::PEER | SslVerifyMode::FAIL_IF_NO_PEER_CERT,
            |_, _| true,
        );
    }
    ctx.build()
}

fn serve(ctx: &SslContext, tcp: TcpStream, close_each: bool) -> Result<Served, String> {
    let ssl = Ssl::new(ctx).map_err(|e| e.to_string())?;
    let mut stream = ssl.accept(tcp).map_err(|e| e.to_string())?;

    let mut served = Served {
        client_cn: stream.ssl().peer_certificate().and_then(|c| {
            c.subject_name()
                .entries_by_nid(Nid::COMMONNAME)
                .next()
                .and_then(|e| e.data().as_utf8().ok())
                .map(|s| s.to_string())
        }),
        ..Default::default()
    };

    while let Some(head) = read_head(&mut stream) {
        let mut lines = head.split("\r\n");
        let request_line = lines.next().unwrap_or("").to_string();
        let mut body_len = 0;
        for line in lines {
            if let Some((name, value)) = line.split_once(':') {
                if name.eq_ignore_ascii_case("host") {
                    served.hosts.push(value.trim().to_string());
                }
                if name.eq_ignore_ascii_case("content-length") {
                    body_len = value.trim().parse().unwrap_or(0);
                }
            }
        }
        let mut body = vec![0u8; body_len];
        if stream.read_exact(&mut body).is_err() {
            break;
        }

        let path = request_line.split(' ').nth(1).unwrap_or("/").to_string();

        let connection = if close_each { "Connection: close\r\n" } else { "" };
        let body = if request_line.starts_with("HEAD ") { "" } else { path.as_str() };
        let response = format!(
            "HTTP/1.1 200 OK\r\n{}Content-Length: {}\r\n\r\n{}",
            connection,
            path.len(),
            body
        );
        served.request_lines.push(request_line);
        if stream.write_all(response.as_bytes()).is_err() || close_each {
            break;
        }
    }

    let _ = stream.shutdown();
    Ok(served)
}

fn read_head(stream: &mut SslStream<TcpStream>) -> Option<String> {
    let mut data = Vec::new();
    let mut byte = [0u8; 1];
    while !data.ends_with(b"\r\n\r\n") {
        match stream.read(&mut byte) {
            Ok(1) => data.push(byte[0]),
            _ => return None,
        }
    }
    Some(String::from_utf8_lossy(&data).into_owned())
}
