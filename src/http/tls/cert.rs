//! Peer certificate summaries

use super::credentials::{Fingerprint, FingerprintAlgorithm};
use openssl::nid::Nid;
use openssl::ssl::SslRef;
use openssl::x509::{X509NameRef, X509Ref};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// What the client saw of one certificate in the server's chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertInfo {
    /// Subject common name
    pub subject: Option<String>,
    /// Issuer common name
    pub issuer: Option<String>,
    /// DNS and IP subject alternative names, as `DNS:name` / `IP:addr`
    pub subject_alt_names: Vec<String>,
    /// SHA-256 fingerprint, lowercase hex
    pub sha256: String,
}

impl CertInfo {
    pub fn from_x509(cert: &X509Ref) -> Self {
        CertInfo {
            subject: common_name(cert.subject_name()),
            issuer: common_name(cert.issuer_name()),
            subject_alt_names: subject_alt_names(cert),
            sha256: Fingerprint::of(cert, FingerprintAlgorithm::Sha256)
                .map(|f| f.to_hex())
                .unwrap_or_default(),
        }
    }

    pub fn is_self_signed(&self) -> bool {
        self.subject.is_some() && self.subject == self.issuer
    }
}

fn common_name(name: &X509NameRef) -> Option<String> {
    name.entries_by_nid(Nid::COMMONNAME)
        .next()
        .and_then(|entry| entry.data().as_utf8().ok())
        .map(|s| s.to_string())
}

fn subject_alt_names(cert: &X509Ref) -> Vec<String> {
    let Some(names) = cert.subject_alt_names() else {
        return Vec::new();
    };

    names
        .iter()
        .filter_map(|name| {
            if let Some(dns) = name.dnsname() {
                return Some(format!("DNS:{}", dns));
            }
            let ip = match name.ipaddress()? {
                [a, b, c, d] => IpAddr::V4(Ipv4Addr::new(*a, *b, *c, *d)),
                bytes => {
                    let octets: [u8; 16] = bytes.try_into().ok()?;
                    IpAddr::V6(Ipv6Addr::from(octets))
                }
            };
            Some(format!("IP:{}", ip))
        })
        .collect()
}

/// Summaries of the server's chain, leaf first
///
/// Client side, `peer_cert_chain` already starts with the leaf.
pub fn peer_chain(ssl: &SslRef) -> Vec<CertInfo> {
    match ssl.peer_cert_chain() {
        Some(chain) => chain.iter().map(CertInfo::from_x509).collect(),
        None => ssl
            .peer_certificate()
            .map(|leaf| vec![CertInfo::from_x509(&leaf)])
            .unwrap_or_default(),
    }
}
