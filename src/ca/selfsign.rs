//! The built-in self-signed certificate authority (`"selfsign"`).
//!
//! Loads the operator-supplied CA certificate and signing key once at
//! startup; per connection it mints a fresh key pair, signs an impostor
//! certificate copying the peer's subject identity and validity window, and
//! wraps the result in an [`ImpersonationCredential`] protected by a one-time
//! secret.
//!
//! # Example YAML
//!
//! ```yaml
//! authority:
//!   type: selfsign
//!   config:
//!     ca_cert: /etc/broker-gateway/tls/ca.crt
//!     ca_key:  /etc/broker-gateway/tls/ca.key
//!     key_algorithm: ecdsa-p256
//! ```

use std::sync::Arc;

use rcgen::{Issuer, KeyPair};
use rustls::pki_types::{CertificateDer, PrivatePkcs8KeyDer};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::ca::signing::{self, KeyAlgorithm, PeerIdentity};
use crate::ca::{AuthorityFactory, CertificateAuthority, ImpersonationCredential};
use crate::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the self-signed authority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelfSignConfig {
    /// Path to the PEM-encoded CA certificate.
    pub ca_cert: String,

    /// Path to the PEM-encoded CA private key.
    pub ca_key: String,

    /// Expected issuer DN. When set, startup fails unless it matches the CA
    /// certificate's subject DN — catches an operator pointing at the wrong
    /// certificate file.
    #[serde(default)]
    pub issuer_dn: Option<String>,

    /// Key algorithm for freshly generated impostor key pairs.
    #[serde(default)]
    pub key_algorithm: KeyAlgorithm,
}

// ─────────────────────────────────────────────────────────────────────────────
// Authority
// ─────────────────────────────────────────────────────────────────────────────

/// Certificate authority backed by an operator-supplied self-signed CA.
///
/// Holds only immutable signing material after construction; [`issue`] is
/// lock-free and safe to call from any number of connections at once.
///
/// [`issue`]: CertificateAuthority::issue
#[derive(Debug)]
pub struct SelfSignAuthority {
    issuer: Issuer<'static, KeyPair>,
    ca_cert: CertificateDer<'static>,
    key_algorithm: KeyAlgorithm,
    issuer_dn: String,
}

impl SelfSignAuthority {
    /// Load CA material and build the authority. All failure modes are fatal
    /// at startup: unreadable files, unparseable key material, or an
    /// `issuer_dn` that does not match the CA certificate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the failing step.
    pub fn from_config(config: &SelfSignConfig) -> Result<Self> {
        let ca_cert = signing::load_certs(&config.ca_cert)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                Error::Config(format!("No certificates found in '{}'", config.ca_cert))
            })?;
        let ca_key = signing::load_key_pair(&config.ca_key)?;

        let issuer_dn = PeerIdentity::from_der(&ca_cert)
            .map_err(|e| {
                Error::Config(format!(
                    "Failed to parse CA certificate '{}': {e}",
                    config.ca_cert
                ))
            })?
            .subject
            .distinguished_name;

        if let Some(expected) = &config.issuer_dn {
            if *expected != issuer_dn {
                return Err(Error::Config(format!(
                    "Issuer DN mismatch: configured \"{expected}\" but CA certificate has \"{issuer_dn}\""
                )));
            }
        }

        let issuer = Issuer::from_ca_cert_der(&ca_cert, ca_key).map_err(|e| {
            Error::Config(format!(
                "CA certificate/key unusable for signing ('{}', '{}'): {e}",
                config.ca_cert, config.ca_key
            ))
        })?;

        Ok(Self {
            issuer,
            ca_cert,
            key_algorithm: config.key_algorithm,
            issuer_dn,
        })
    }

    /// The DN this authority signs as.
    #[must_use]
    pub fn issuer_dn(&self) -> &str {
        &self.issuer_dn
    }

    fn mint(&self, peer: &PeerIdentity) -> Result<ImpersonationCredential> {
        debug!(peer = %peer.subject.distinguished_name, "Creating impostor certificate");

        let key_pair = signing::generate_key_pair(self.key_algorithm)?;
        let leaf = signing::sign(peer, &key_pair, &self.issuer)?;
        let access_secret = Uuid::new_v4().to_string();

        Ok(ImpersonationCredential::new(
            vec![leaf.der().clone(), self.ca_cert.clone()],
            PrivatePkcs8KeyDer::from(key_pair.serialize_der()).into(),
            access_secret,
        ))
    }
}

impl CertificateAuthority for SelfSignAuthority {
    fn issue(&self, peer_certificate: &CertificateDer<'_>) -> Result<ImpersonationCredential> {
        let peer = PeerIdentity::from_der(peer_certificate)
            .map_err(|e| Error::impersonation("<unparseable peer certificate>", e))?;
        let subject = peer.subject.distinguished_name.clone();
        self.mint(&peer).map_err(|e| {
            warn!(peer = %subject, "Impersonation failed: {e}");
            Error::impersonation(subject, e)
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Factory
// ─────────────────────────────────────────────────────────────────────────────

/// Factory for [`SelfSignAuthority`], registered as `"selfsign"`.
pub struct SelfSignFactory;

impl AuthorityFactory for SelfSignFactory {
    fn name(&self) -> &'static str {
        "selfsign"
    }

    fn create(&self, config: &serde_json::Value) -> Result<Arc<dyn CertificateAuthority>> {
        let config: SelfSignConfig = serde_json::from_value(config.clone())
            .map_err(|e| Error::Config(format!("Invalid selfsign authority config: {e}")))?;
        Ok(Arc::new(SelfSignAuthority::from_config(&config)?))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
