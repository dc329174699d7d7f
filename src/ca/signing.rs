//! Certificate signing helpers — key-pair generation, impostor signing, and
//! authority bootstrap.
//!
//! Pure functions over `rcgen`: no state is held here. The self-signed
//! authority (and any future authority implementation) composes these per
//! issuance; the CLI uses [`generate_authority`] to bootstrap CA material.
//!
//! # File format
//!
//! All certificate and key files are expected in **PEM format**. DER files
//! are not supported to keep operator tooling simple (openssl, cfssl,
//! cert-manager all default to PEM).

use std::fs;
use std::path::Path;
use std::str::FromStr;

use rcgen::string::Ia5String;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose,
    IsCa, Issuer, KeyPair, KeyUsagePurpose, SanType, SignatureAlgorithm, date_time_ymd,
};
use rustls::pki_types::CertificateDer;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::GeneralName;
use x509_parser::prelude::FromDer;

use crate::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Key algorithms
// ─────────────────────────────────────────────────────────────────────────────

/// Key algorithm used for freshly generated impostor key pairs.
///
/// The set is closed to what `rcgen` can generate in-process. RSA is absent:
/// the underlying provider cannot generate RSA keys, and an impostor key pair
/// only lives for one handshake anyway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyAlgorithm {
    /// ECDSA over P-256 with SHA-256 (default).
    #[default]
    EcdsaP256,
    /// ECDSA over P-384 with SHA-384.
    EcdsaP384,
    /// Ed25519.
    Ed25519,
}

impl KeyAlgorithm {
    fn signature_algorithm(self) -> &'static SignatureAlgorithm {
        match self {
            Self::EcdsaP256 => &rcgen::PKCS_ECDSA_P256_SHA256,
            Self::EcdsaP384 => &rcgen::PKCS_ECDSA_P384_SHA384,
            Self::Ed25519 => &rcgen::PKCS_ED25519,
        }
    }
}

impl FromStr for KeyAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ecdsa-p256" => Ok(Self::EcdsaP256),
            "ecdsa-p384" => Ok(Self::EcdsaP384),
            "ed25519" => Ok(Self::Ed25519),
            other => Err(Error::Signing(format!(
                "Unsupported key algorithm \"{other}\" (expected ecdsa-p256, ecdsa-p384 or ed25519)"
            ))),
        }
    }
}

impl std::fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::EcdsaP256 => "ecdsa-p256",
            Self::EcdsaP384 => "ecdsa-p384",
            Self::Ed25519 => "ed25519",
        };
        f.write_str(name)
    }
}

/// Generate a fresh key pair for the given algorithm.
///
/// # Errors
///
/// Returns [`Error::Signing`] if the underlying provider fails.
pub fn generate_key_pair(algorithm: KeyAlgorithm) -> Result<KeyPair> {
    KeyPair::generate_for(algorithm.signature_algorithm())
        .map_err(|e| Error::Signing(format!("Failed to generate {algorithm} key pair: {e}")))
}

// ─────────────────────────────────────────────────────────────────────────────
// Peer identity extraction
// ─────────────────────────────────────────────────────────────────────────────

/// Subject DN attributes and SANs extracted from a certificate.
///
/// All DN fields are optional because not every certificate uses every
/// attribute. `distinguished_name` is the rendered DN, used for logs and for
/// the subject carried in impersonation errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectIdentity {
    /// Common Name (CN).
    pub common_name: Option<String>,
    /// Organisation (O).
    pub organization: Option<String>,
    /// First Organisational Unit (OU).
    pub organizational_unit: Option<String>,
    /// Country (C).
    pub country: Option<String>,
    /// State or province (ST).
    pub state_or_province: Option<String>,
    /// Locality (L).
    pub locality: Option<String>,
    /// Subject Alternative Name — DNS entries.
    pub dns_sans: Vec<String>,
    /// The full rendered subject DN.
    pub distinguished_name: String,
}

/// Identity and validity window of a peer certificate, as needed to mint an
/// indistinguishable impostor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerIdentity {
    /// Subject identity copied onto the impostor.
    pub subject: SubjectIdentity,
    /// Validity window start, copied verbatim.
    pub not_before: OffsetDateTime,
    /// Validity window end, copied verbatim.
    pub not_after: OffsetDateTime,
}

impl PeerIdentity {
    /// Parse a DER-encoded certificate and extract subject + validity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Signing`] if the certificate cannot be parsed.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| Error::Signing(format!("Malformed peer certificate: {e}")))?;

        Ok(Self {
            subject: extract_subject(&cert),
            not_before: cert.validity().not_before.to_datetime(),
            not_after: cert.validity().not_after.to_datetime(),
        })
    }
}

fn extract_subject(cert: &X509Certificate<'_>) -> SubjectIdentity {
    let subject = cert.subject();

    let mut dns_sans = Vec::new();
    if let Ok(Some(san)) = cert.subject_alternative_name() {
        for name in &san.value.general_names {
            if let GeneralName::DNSName(dns) = name {
                dns_sans.push((*dns).to_owned());
            }
        }
    }

    SubjectIdentity {
        common_name: subject
            .iter_common_name()
            .next()
            .and_then(|a| a.as_str().ok())
            .map(str::to_owned),
        organization: subject
            .iter_organization()
            .next()
            .and_then(|a| a.as_str().ok())
            .map(str::to_owned),
        organizational_unit: subject
            .iter_organizational_unit()
            .next()
            .and_then(|a| a.as_str().ok())
            .map(str::to_owned),
        country: subject
            .iter_country()
            .next()
            .and_then(|a| a.as_str().ok())
            .map(str::to_owned),
        state_or_province: subject
            .iter_state_or_province()
            .next()
            .and_then(|a| a.as_str().ok())
            .map(str::to_owned),
        locality: subject
            .iter_locality()
            .next()
            .and_then(|a| a.as_str().ok())
            .map(str::to_owned),
        dns_sans,
        distinguished_name: subject.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Impostor signing
// ─────────────────────────────────────────────────────────────────────────────

/// Sign an impostor certificate binding `subject_key`'s public half to the
/// peer's subject identity.
///
/// Subject DN, DNS SANs, and the validity window are copied verbatim from the
/// peer: a client inspecting subject or validity (but not the public key or
/// the trust anchor) cannot tell the impostor from the original. The issuer
/// DN and signature algorithm come from `issuer`, which carries the
/// authority's certificate and signing key.
///
/// # Errors
///
/// Returns [`Error::Signing`] on any underlying cryptographic failure.
pub fn sign(
    peer: &PeerIdentity,
    subject_key: &KeyPair,
    issuer: &Issuer<'static, KeyPair>,
) -> Result<rcgen::Certificate> {
    let mut params = CertificateParams::default();
    params.distinguished_name = subject_dn(&peer.subject);
    params.not_before = peer.not_before;
    params.not_after = peer.not_after;
    params.is_ca = IsCa::NoCa;
    params.use_authority_key_identifier_extension = true;
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
    ];
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];

    for dns in &peer.subject.dns_sans {
        let ia5 = Ia5String::try_from(dns.as_str())
            .map_err(|e| Error::Signing(format!("Invalid DNS SAN \"{dns}\": {e}")))?;
        params.subject_alt_names.push(SanType::DnsName(ia5));
    }

    params
        .signed_by(subject_key, issuer)
        .map_err(|e| Error::Signing(format!("Failed to sign impostor certificate: {e}")))
}

fn subject_dn(subject: &SubjectIdentity) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    // DN attribute order follows the conventional C, ST, L, O, OU, CN nesting.
    if let Some(c) = &subject.country {
        dn.push(DnType::CountryName, c.as_str());
    }
    if let Some(st) = &subject.state_or_province {
        dn.push(DnType::StateOrProvinceName, st.as_str());
    }
    if let Some(l) = &subject.locality {
        dn.push(DnType::LocalityName, l.as_str());
    }
    if let Some(o) = &subject.organization {
        dn.push(DnType::OrganizationName, o.as_str());
    }
    if let Some(ou) = &subject.organizational_unit {
        dn.push(DnType::OrganizationalUnitName, ou.as_str());
    }
    if let Some(cn) = &subject.common_name {
        dn.push(DnType::CommonName, cn.as_str());
    }
    dn
}

// ─────────────────────────────────────────────────────────────────────────────
// Authority bootstrap + PEM loading
// ─────────────────────────────────────────────────────────────────────────────

/// Generated CA certificate and key pair in PEM format.
#[derive(Debug)]
pub struct GeneratedAuthority {
    /// PEM-encoded CA certificate.
    pub cert_pem: String,
    /// PEM-encoded CA private key.
    pub key_pem: String,
}

impl GeneratedAuthority {
    /// Write the material as `<stem>.crt` and `<stem>.key` under `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the files
    /// cannot be written.
    pub fn write_to_dir(&self, dir: &Path, stem: &str) -> Result<()> {
        fs::create_dir_all(dir)
            .map_err(|e| Error::Config(format!("Cannot create dir '{}': {e}", dir.display())))?;
        fs::write(dir.join(format!("{stem}.crt")), &self.cert_pem)
            .map_err(|e| Error::Config(format!("Cannot write CA cert: {e}")))?;
        fs::write(dir.join(format!("{stem}.key")), &self.key_pem)
            .map_err(|e| Error::Config(format!("Cannot write CA key: {e}")))?;
        Ok(())
    }
}

/// Generate a self-signed CA suitable for signing impostor certificates.
///
/// # Errors
///
/// Returns [`Error::Signing`] if key generation or certificate serialisation
/// fails.
pub fn generate_authority(
    cn: &str,
    validity_days: u32,
    algorithm: KeyAlgorithm,
) -> Result<GeneratedAuthority> {
    let key_pair = generate_key_pair(algorithm)?;

    let mut params = CertificateParams::default();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, cn);
    params.distinguished_name = dn;
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
    ];
    params.not_after = validity_to_date(validity_days)?;

    let cert = params
        .self_signed(&key_pair)
        .map_err(|e| Error::Signing(format!("CA certificate generation failed: {e}")))?;

    Ok(GeneratedAuthority {
        cert_pem: cert.pem(),
        key_pem: key_pair.serialize_pem(),
    })
}

/// Load all certificates from a PEM file.
///
/// # Errors
///
/// Returns [`Error::Config`] if the file cannot be read or contains no valid
/// PEM certificate blocks.
pub fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>> {
    let pem_data =
        fs::read(path).map_err(|e| Error::Config(format!("Cannot read '{path}': {e}")))?;
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut pem_data.as_slice())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Config(format!("Failed to parse certs from '{path}': {e}")))?;

    if certs.is_empty() {
        return Err(Error::Config(format!("No certificates found in '{path}'")));
    }

    Ok(certs)
}

/// Load a signing key pair from a PEM file.
///
/// # Errors
///
/// Returns [`Error::Config`] if the file cannot be read or contains no
/// parseable private key.
pub fn load_key_pair(path: &str) -> Result<KeyPair> {
    let pem = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Cannot read '{path}': {e}")))?;
    KeyPair::from_pem(&pem)
        .map_err(|e| Error::Config(format!("Failed to parse private key from '{path}': {e}")))
}

/// Convert a validity period (days) into a future date for `rcgen`.
fn validity_to_date(days: u32) -> Result<OffsetDateTime> {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now_secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| Error::Config(format!("System time error: {e}")))?
        .as_secs();
    let future_secs = now_secs.saturating_add(u64::from(days) * 86_400);

    let dt = OffsetDateTime::from_unix_timestamp(i64::try_from(future_secs).unwrap_or(i64::MAX))
        .map_err(|e| Error::Config(format!("Date calculation error: {e}")))?;

    Ok(date_time_ymd(dt.year(), dt.month() as u8, dt.day()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// Mint a self-signed peer certificate with the given CN, SANs, and a
    /// fixed validity window.
    fn make_peer_der(cn: &str, sans: &[&str]) -> Vec<u8> {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, cn);
        dn.push(DnType::OrganizationName, "Example Corp");
        params.distinguished_name = dn;
        params.not_before = date_time_ymd(2024, 1, 1);
        params.not_after = date_time_ymd(2030, 1, 1);
        for san in sans {
            params
                .subject_alt_names
                .push(SanType::DnsName(Ia5String::try_from(*san).unwrap()));
        }
        params.self_signed(&key).unwrap().der().to_vec()
    }

    fn test_issuer() -> Issuer<'static, KeyPair> {
        let ca = generate_authority("Test Proxy CA", 365, KeyAlgorithm::EcdsaP256).unwrap();
        let ca_key = KeyPair::from_pem(&ca.key_pem).unwrap();
        let ca_der = load_first_der(&ca.cert_pem);
        Issuer::from_ca_cert_der(&CertificateDer::from(ca_der), ca_key).unwrap()
    }

    fn load_first_der(pem: &str) -> Vec<u8> {
        rustls_pemfile::certs(&mut pem.as_bytes())
            .next()
            .unwrap()
            .unwrap()
            .to_vec()
    }

    // ── key algorithms ───────────────────────────────────────────────────────

    #[test]
    fn key_algorithm_parses_known_names() {
        assert_eq!("ecdsa-p256".parse::<KeyAlgorithm>().unwrap(), KeyAlgorithm::EcdsaP256);
        assert_eq!("ecdsa-p384".parse::<KeyAlgorithm>().unwrap(), KeyAlgorithm::EcdsaP384);
        assert_eq!("ed25519".parse::<KeyAlgorithm>().unwrap(), KeyAlgorithm::Ed25519);
    }

    #[test]
    fn key_algorithm_rejects_unknown_names() {
        let err = "rsa-4096".parse::<KeyAlgorithm>().unwrap_err();
        assert!(matches!(err, Error::Signing(_)), "got {err:?}");
    }

    #[test]
    fn generated_key_pairs_are_distinct() {
        let a = generate_key_pair(KeyAlgorithm::EcdsaP256).unwrap();
        let b = generate_key_pair(KeyAlgorithm::EcdsaP256).unwrap();
        assert_ne!(a.serialize_der(), b.serialize_der());
    }

    // ── peer identity ────────────────────────────────────────────────────────

    #[test]
    fn peer_identity_extracts_subject_and_validity() {
        let der = make_peer_der("broker1.kafka.local", &["broker1.kafka.local"]);
        let peer = PeerIdentity::from_der(&der).unwrap();

        assert_eq!(peer.subject.common_name.as_deref(), Some("broker1.kafka.local"));
        assert_eq!(peer.subject.organization.as_deref(), Some("Example Corp"));
        assert_eq!(peer.subject.dns_sans, ["broker1.kafka.local"]);
        assert_eq!(peer.not_before, date_time_ymd(2024, 1, 1));
        assert_eq!(peer.not_after, date_time_ymd(2030, 1, 1));
    }

    #[test]
    fn peer_identity_rejects_garbage() {
        let err = PeerIdentity::from_der(b"not a certificate").unwrap_err();
        assert!(matches!(err, Error::Signing(_)), "got {err:?}");
    }

    // ── impostor signing ─────────────────────────────────────────────────────

    #[test]
    fn impostor_copies_subject_and_validity_window() {
        let der = make_peer_der("broker1.kafka.local", &["broker1.kafka.local"]);
        let peer = PeerIdentity::from_der(&der).unwrap();
        let issuer = test_issuer();
        let key = generate_key_pair(KeyAlgorithm::EcdsaP256).unwrap();

        let impostor = sign(&peer, &key, &issuer).unwrap();
        let reparsed = PeerIdentity::from_der(impostor.der()).unwrap();

        assert_eq!(reparsed.subject.common_name, peer.subject.common_name);
        assert_eq!(reparsed.subject.dns_sans, peer.subject.dns_sans);
        assert_eq!(reparsed.not_before, peer.not_before);
        assert_eq!(reparsed.not_after, peer.not_after);
    }

    #[test]
    fn impostor_carries_a_different_public_key() {
        let der = make_peer_der("broker1.kafka.local", &[]);
        let peer = PeerIdentity::from_der(&der).unwrap();
        let issuer = test_issuer();
        let key = generate_key_pair(KeyAlgorithm::EcdsaP256).unwrap();

        let impostor = sign(&peer, &key, &issuer).unwrap();

        let (_, original) = X509Certificate::from_der(&der).unwrap();
        let (_, forged) = X509Certificate::from_der(impostor.der()).unwrap();
        assert_ne!(original.public_key().raw, forged.public_key().raw);
    }

    // ── authority bootstrap ──────────────────────────────────────────────────

    #[test]
    fn generate_authority_produces_pem_material() {
        let ca = generate_authority("Proxy Root CA", 365, KeyAlgorithm::default()).unwrap();
        assert!(ca.cert_pem.contains("BEGIN CERTIFICATE"));
        assert!(ca.key_pem.contains("PRIVATE KEY"));
    }

    #[test]
    fn generate_authority_keys_are_unique_per_call() {
        let a = generate_authority("CA", 365, KeyAlgorithm::default()).unwrap();
        let b = generate_authority("CA", 365, KeyAlgorithm::default()).unwrap();
        assert_ne!(a.key_pem, b.key_pem);
    }

    #[test]
    fn write_to_dir_creates_crt_and_key_files() {
        let dir = tempfile::tempdir().unwrap();
        let ca = generate_authority("CA", 365, KeyAlgorithm::default()).unwrap();

        ca.write_to_dir(dir.path(), "ca").unwrap();

        assert!(dir.path().join("ca.crt").exists());
        assert!(dir.path().join("ca.key").exists());
    }

    // ── PEM loading ──────────────────────────────────────────────────────────

    #[test]
    fn load_certs_and_key_pair_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let ca = generate_authority("CA", 365, KeyAlgorithm::default()).unwrap();
        ca.write_to_dir(dir.path(), "ca").unwrap();

        let certs = load_certs(dir.path().join("ca.crt").to_str().unwrap()).unwrap();
        assert_eq!(certs.len(), 1);

        load_key_pair(dir.path().join("ca.key").to_str().unwrap()).unwrap();
    }

    #[test]
    fn load_certs_fails_for_missing_file() {
        let err = load_certs("/nonexistent/ca.crt").unwrap_err();
        assert!(matches!(err, Error::Config(_)), "got {err:?}");
    }

    #[test]
    fn load_certs_fails_for_empty_pem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.crt");
        std::fs::write(&path, b"").unwrap();

        assert!(load_certs(path.to_str().unwrap()).is_err());
    }

    #[test]
    fn load_key_pair_fails_when_file_holds_a_certificate() {
        let dir = tempfile::tempdir().unwrap();
        let ca = generate_authority("CA", 365, KeyAlgorithm::default()).unwrap();
        let path = dir.path().join("cert_only.pem");
        std::fs::write(&path, &ca.cert_pem).unwrap();

        assert!(load_key_pair(path.to_str().unwrap()).is_err());
    }
}
