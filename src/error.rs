//! Error types for the broker gateway

use std::io;

use thiserror::Error;

/// Result type alias for the broker gateway
pub type Result<T> = std::result::Result<T, Error>;

/// Broker gateway errors
///
/// The set is deliberately closed: configuration problems abort startup,
/// signing problems surface per cryptographic operation, and impersonation
/// failures are scoped to the one connection that requested the credential.
/// A miss in the broker map is *not* an error — lookups return `Option`.
#[derive(Error, Debug)]
pub enum Error {
    /// Unrecoverable configuration problem. Surfaced at startup, never
    /// retried.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cryptographic operation failure (key generation, certificate
    /// signing, malformed key material).
    #[error("Signing error: {0}")]
    Signing(String),

    /// Issuing an impostor credential failed for one connection. Carries the
    /// peer's subject identity so the refusal can be logged against the
    /// affected client.
    #[error("Impersonation failed for \"{subject}\"")]
    Impersonation {
        /// Subject DN of the peer certificate being impersonated.
        subject: String,
        /// The underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wrap a failure that occurred while impersonating `subject`.
    pub fn impersonation(subject: impl Into<String>, source: Error) -> Self {
        Self::Impersonation {
            subject: subject.into(),
            source: Box::new(source),
        }
    }

    /// True for errors that must abort startup rather than a single
    /// connection.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Io(_) | Self::Json(_))
    }
}
