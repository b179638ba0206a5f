//! TLS policy and rustls server configuration.
//!
//! The handshake itself is rustls'; this module only turns a [`TlsPolicy`] and
//! a PEM certificate/key pair into a `rustls::ServerConfig`.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    sync::Arc,
};

use rustls::{
    crypto::{ring, CryptoProvider},
    pki_types::{CertificateDer, PrivateKeyDer},
    version, CipherSuite, NamedGroup, ServerConfig, SupportedCipherSuite, SupportedProtocolVersion,
};

use crate::error::ServerError;

/// Default certificate file, relative to the working directory.
pub const DEFAULT_CERT_FILE: &str = "server.crt";

/// Default private key file, relative to the working directory.
pub const DEFAULT_KEY_FILE: &str = "server.key";

/// Only HTTP/1.1 is offered through ALPN.
const ALPN_HTTP11: &[u8] = b"http/1.1";

/// Lowest protocol version accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum TlsVersion {
    #[default]
    Tls12,
    Tls13,
}

/// Protocol version, key exchange and cipher suite policy.
///
/// `cipher_suites` governs TLS 1.2 only; TLS 1.3 suites are always enabled.
/// Empty lists fall back to everything the provider offers. Entries the
/// provider does not implement are skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct TlsPolicy {
    pub min_version: TlsVersion,
    /// Key exchange groups in preference order.
    pub curves: Vec<NamedGroup>,
    /// TLS 1.2 suites in preference order.
    pub cipher_suites: Vec<CipherSuite>,
    /// Choose the cipher suite by server order instead of the client's.
    pub prefer_server_ciphers: bool,
}

impl Default for TlsPolicy {
    fn default() -> Self {
        Self {
            min_version: TlsVersion::Tls12,
            curves: vec![NamedGroup::secp384r1, NamedGroup::secp256r1],
            cipher_suites: vec![
                CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
                CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
            ],
            prefer_server_ciphers: true,
        }
    }
}

/// Certificate chain and key locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertFiles {
    pub cert: PathBuf,
    pub key: PathBuf,
}

impl Default for CertFiles {
    fn default() -> Self {
        Self {
            cert: PathBuf::from(DEFAULT_CERT_FILE),
            key: PathBuf::from(DEFAULT_KEY_FILE),
        }
    }
}

/// Restrict the ring provider to what the policy allows, in policy order.
///
/// # Errors
/// Returns [`ServerError::TlsPolicy`] when no listed curve, or (with TLS 1.2
/// enabled) no listed cipher suite, is available.
pub fn crypto_provider(policy: &TlsPolicy) -> Result<CryptoProvider, ServerError> {
    let mut provider = ring::default_provider();

    if !policy.curves.is_empty() {
        let available = std::mem::take(&mut provider.kx_groups);
        for curve in &policy.curves {
            match available.iter().find(|g| g.name() == *curve) {
                Some(group) => provider.kx_groups.push(*group),
                None => tracing::warn!(?curve, "key exchange group not offered, skipping"),
            }
        }
        if provider.kx_groups.is_empty() {
            return Err(ServerError::TlsPolicy("none of the configured curves are available".to_owned()));
        }
    }

    if !policy.cipher_suites.is_empty() {
        let available = std::mem::take(&mut provider.cipher_suites);
        provider.cipher_suites = available
            .iter()
            .copied()
            .filter(|s| matches!(s, SupportedCipherSuite::Tls13(_)))
            .collect();
        let mut tls12 = 0;
        for wanted in &policy.cipher_suites {
            match available.iter().find(|s| s.suite() == *wanted) {
                Some(suite) if matches!(suite, SupportedCipherSuite::Tls12(_)) => {
                    provider.cipher_suites.push(*suite);
                    tls12 += 1;
                }
                _ => tracing::warn!(suite = ?wanted, "TLS 1.2 cipher suite not offered, skipping"),
            }
        }
        if tls12 == 0 && policy.min_version == TlsVersion::Tls12 {
            return Err(ServerError::TlsPolicy(
                "none of the configured TLS 1.2 cipher suites are available".to_owned(),
            ));
        }
    }

    Ok(provider)
}

/// Build the rustls configuration for the given policy and PEM files.
///
/// ALPN is pinned to `http/1.1`, so clients never negotiate HTTP/2.
///
/// # Errors
/// Returns [`ServerError::Tls`] if either file is missing or unusable, and
/// [`ServerError::TlsPolicy`] if the policy cannot be satisfied.
pub fn server_config(policy: &TlsPolicy, files: &CertFiles) -> Result<Arc<ServerConfig>, ServerError> {
    let certs = load_certs(&files.cert)?;
    let key = load_private_key(&files.key)?;

    let versions: &[&'static SupportedProtocolVersion] = match policy.min_version {
        TlsVersion::Tls12 => &[&version::TLS13, &version::TLS12],
        TlsVersion::Tls13 => &[&version::TLS13],
    };

    let mut config = ServerConfig::builder_with_provider(Arc::new(crypto_provider(policy)?))
        .with_protocol_versions(versions)
        .map_err(|e| ServerError::TlsPolicy(e.to_string()))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| ServerError::Tls { path: files.key.clone(), reason: e.to_string() })?;

    config.ignore_client_order = policy.prefer_server_ciphers;
    config.alpn_protocols = vec![ALPN_HTTP11.to_vec()];

    Ok(Arc::new(config))
}

fn open(path: &Path) -> Result<BufReader<File>, ServerError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| ServerError::Tls { path: path.to_path_buf(), reason: e.to_string() })
}

/// Load a certificate chain from a PEM file.
fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, ServerError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ServerError::Tls { path: path.to_path_buf(), reason: e.to_string() })?;

    if certs.is_empty() {
        return Err(ServerError::Tls {
            path: path.to_path_buf(),
            reason: "no certificates found".to_owned(),
        });
    }
    Ok(certs)
}

/// Load the first private key (PKCS#1, PKCS#8 or SEC1) from a PEM file.
fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, ServerError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| ServerError::Tls { path: path.to_path_buf(), reason: e.to_string() })?
        .ok_or_else(|| ServerError::Tls {
            path: path.to_path_buf(),
            reason: "no private key found".to_owned(),
        })
}
