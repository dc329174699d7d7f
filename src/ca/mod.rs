//! Certificate authority plugin subsystem.
//!
//! Inbound TLS is terminated with a certificate forged on the fly to look
//! like the real broker's: same subject identity, same validity window, a
//! fresh key pair, signed by an operator-controlled authority whose root is
//! provisioned into client trust stores out-of-band.
//!
//! # Architecture
//!
//! ```text
//! startup:          AuthorityRegistry::with_builtin()
//!                     → resolve(name, config) → Arc<dyn CertificateAuthority>
//! per connection:   authority.issue(peer_cert)
//!                     → ImpersonationCredential (key + chain + one-time secret)
//!                     → into_server_config() → inbound TLS handshake
//! ```
//!
//! # Modules
//!
//! - [`signing`] — key-pair generation and impostor signing helpers
//! - [`selfsign`] — the built-in self-signed authority (`"selfsign"`)
//! - [`registry`] — name → factory resolution
//!
//! Authorities must be safe to share across all connection tasks: [`issue`]
//! is called concurrently and unboundedly, so implementations hold only
//! immutable signing material after construction.
//!
//! [`issue`]: CertificateAuthority::issue

pub mod registry;
pub mod selfsign;
pub mod signing;

use std::sync::Arc;

use rustls::ServerConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};

use crate::{Error, Result};

pub use registry::AuthorityRegistry;
pub use selfsign::{SelfSignAuthority, SelfSignConfig, SelfSignFactory};
pub use signing::{KeyAlgorithm, PeerIdentity, SubjectIdentity};

// ─────────────────────────────────────────────────────────────────────────────
// Credential
// ─────────────────────────────────────────────────────────────────────────────

/// An ephemeral forged identity: private key, certificate chain (leaf first),
/// and a one-time access secret.
///
/// Created per inbound connection attempt and held only for the duration of
/// that handshake — never persisted, never reused across connections. The
/// private key is reachable only through consuming methods, so a credential
/// cannot back more than one handshake.
#[derive(Debug)]
pub struct ImpersonationCredential {
    chain: Vec<CertificateDer<'static>>,
    private_key: PrivateKeyDer<'static>,
    access_secret: String,
}

impl ImpersonationCredential {
    /// Assemble a credential. `chain` is leaf first; `access_secret` is a
    /// freshly generated one-time secret.
    pub fn new(
        chain: Vec<CertificateDer<'static>>,
        private_key: PrivateKeyDer<'static>,
        access_secret: String,
    ) -> Self {
        Self {
            chain,
            private_key,
            access_secret,
        }
    }

    /// The impostor (leaf) certificate.
    #[must_use]
    pub fn leaf(&self) -> &CertificateDer<'static> {
        &self.chain[0]
    }

    /// The full certificate chain, leaf first.
    #[must_use]
    pub fn chain(&self) -> &[CertificateDer<'static>] {
        &self.chain
    }

    /// The one-time secret protecting the private key in whatever container
    /// the caller serializes the credential into. Discarded with the
    /// credential.
    #[must_use]
    pub fn access_secret(&self) -> &str {
        &self.access_secret
    }

    /// Consume the credential into a `rustls::ServerConfig` for the one
    /// handshake it was minted for.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Signing`] if rustls rejects the chain/key pair.
    pub fn into_server_config(self) -> Result<ServerConfig> {
        ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(self.chain, self.private_key)
            .map_err(|e| Error::Signing(format!("Credential rejected by TLS stack: {e}")))
    }

    /// Consume the credential into its raw parts (chain, key, secret), for
    /// callers that hand the material to a TLS stack other than rustls.
    #[must_use]
    pub fn into_parts(self) -> (Vec<CertificateDer<'static>>, PrivateKeyDer<'static>, String) {
        (self.chain, self.private_key, self.access_secret)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Plugin contracts
// ─────────────────────────────────────────────────────────────────────────────

/// A long-lived signer issuing impostor credentials.
///
/// Implementations load their signing material once at construction and hold
/// it immutably; `issue` allocates only connection-local state and is safe to
/// call from any number of connection tasks at once.
pub trait CertificateAuthority: Send + Sync {
    /// Issue a fresh impersonation credential for the given peer
    /// certificate (DER).
    ///
    /// Each call returns a new key pair and a new access secret; results are
    /// never cached. A failed issuance rejects only the requesting
    /// connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Impersonation`] carrying the peer's subject identity.
    fn issue(&self, peer_certificate: &CertificateDer<'_>) -> Result<ImpersonationCredential>;
}

/// A named, stateless constructor for a [`CertificateAuthority`].
///
/// Factories receive their configuration as a raw value and deserialize
/// their own typed config, so new authority types plug in without touching
/// the registry's core logic.
pub trait AuthorityFactory: Send + Sync {
    /// The name this factory is registered and configured under.
    fn name(&self) -> &'static str;

    /// Construct the authority from its configuration block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for unusable configuration or key material;
    /// fatal at startup, never retried.
    fn create(&self, config: &serde_json::Value) -> Result<Arc<dyn CertificateAuthority>>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
