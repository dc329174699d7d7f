//! Integration tests for the broker gateway core

use std::collections::HashSet;
use std::io::Write as _;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use rcgen::string::Ia5String;
use rcgen::{
    CertificateParams, DistinguishedName, DnType, KeyPair, SanType, date_time_ymd,
};
use rustls::pki_types::CertificateDer;
use tempfile::TempDir;
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;

use broker_gateway::brokermap::{BrokerMap, BrokerMapping, Endpoint, Selector};
use broker_gateway::ca::{
    AuthorityRegistry, CertificateAuthority, KeyAlgorithm, PeerIdentity, SelfSignAuthority,
    SelfSignConfig, signing,
};
use broker_gateway::config::ProxyConfig;

// ─────────────────────────────────────────────────────────────────────────────
// Fixtures
// ─────────────────────────────────────────────────────────────────────────────

fn ca_config(dir: &TempDir) -> SelfSignConfig {
    let ca = signing::generate_authority("Gateway Test CA", 365, KeyAlgorithm::default()).unwrap();
    ca.write_to_dir(dir.path(), "ca").unwrap();
    SelfSignConfig {
        ca_cert: dir.path().join("ca.crt").to_str().unwrap().to_owned(),
        ca_key: dir.path().join("ca.key").to_str().unwrap().to_owned(),
        issuer_dn: None,
        key_algorithm: KeyAlgorithm::default(),
    }
}

fn peer_cert(cn: &str, san: &str) -> CertificateDer<'static> {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::default();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, cn);
    dn.push(DnType::OrganizationName, "Kafka Cluster");
    params.distinguished_name = dn;
    params.not_before = date_time_ymd(2025, 1, 1);
    params.not_after = date_time_ymd(2027, 1, 1);
    params
        .subject_alt_names
        .push(SanType::DnsName(Ia5String::try_from(san).unwrap()));
    params.self_signed(&key).unwrap().der().clone()
}

// ─────────────────────────────────────────────────────────────────────────────
// Broker map — the end-to-end example
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn end_to_end_broker_map_example() {
    let mappings = vec![
        BrokerMapping::new(
            "b1",
            Endpoint::new("b1-real", 9092),
            Endpoint::new("proxy.example.com", 39092),
        ),
        BrokerMapping::new(
            "b2",
            Endpoint::new("b2-real", 9092),
            Endpoint::new("proxy.example.com", 39093),
        ),
    ];
    let map = BrokerMap::build(mappings, &Selector::parse("*")).unwrap();

    let b1 = map.get_by_proxy_name("b1").unwrap();
    assert_eq!(b1.broker, Endpoint::new("b1-real", 9092));
    assert_eq!(map.get_by_broker_endpoint("b1-real", 9092).unwrap(), b1);
    assert_eq!(map.get_all().len(), 2);
    assert_eq!(map.brokers_to_proxy().len(), 2);
}

// ─────────────────────────────────────────────────────────────────────────────
// Config file → map → authority
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn full_startup_flow_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let ca = ca_config(&dir);

    let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
    write!(
        file,
        "brokers:
  - name: b1
    broker: {{ host: b1-real, port: 9092 }}
    proxy:  {{ host: proxy.example.com, port: 39092 }}
  - name: b2
    broker: {{ host: b2-real, port: 9092 }}
    proxy:  {{ host: proxy.example.com, port: 39093 }}
proxied: \"*\"
authority:
  type: selfsign
  config:
    ca_cert: {}
    ca_key: {}
",
        ca.ca_cert, ca.ca_key
    )
    .unwrap();

    let config = ProxyConfig::load(Some(file.path())).unwrap();
    let map = config.broker_map().unwrap();
    assert_eq!(map.get_all().len(), 2);

    let registry = AuthorityRegistry::with_builtin().unwrap();
    let authority = config.resolve_authority(&registry).unwrap();

    // The startup products drive a connection: lookup, then issuance.
    let mapping = map.get_by_broker_endpoint("b1-real", 9092).unwrap();
    assert_eq!(mapping.proxy.port, 39092);

    let credential = authority
        .issue(&peer_cert("b1-real", "b1-real.kafka.local"))
        .unwrap();
    credential.into_server_config().unwrap();
}

// ─────────────────────────────────────────────────────────────────────────────
// Impersonation properties
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn impostor_matches_peer_identity_with_a_fresh_key() {
    let dir = tempfile::tempdir().unwrap();
    let authority = SelfSignAuthority::from_config(&ca_config(&dir)).unwrap();
    let peer = peer_cert("broker1.kafka.local", "broker1.kafka.local");

    let credential = authority.issue(&peer).unwrap();

    let forged = PeerIdentity::from_der(credential.leaf()).unwrap();
    let original = PeerIdentity::from_der(&peer).unwrap();
    assert_eq!(forged.subject.common_name, original.subject.common_name);
    assert_eq!(forged.subject.dns_sans, original.subject.dns_sans);
    assert_eq!(forged.not_before, original.not_before);
    assert_eq!(forged.not_after, original.not_after);

    let (_, peer_parsed) = X509Certificate::from_der(&peer).unwrap();
    let (_, forged_parsed) = X509Certificate::from_der(credential.leaf()).unwrap();
    assert_ne!(
        peer_parsed.public_key().raw,
        forged_parsed.public_key().raw,
        "impostor must not reuse the peer's key pair"
    );
}

#[test]
fn issuing_twice_for_the_same_peer_never_shares_material() {
    let dir = tempfile::tempdir().unwrap();
    let authority = SelfSignAuthority::from_config(&ca_config(&dir)).unwrap();
    let peer = peer_cert("broker1.kafka.local", "broker1.kafka.local");

    let first = authority.issue(&peer).unwrap();
    let second = authority.issue(&peer).unwrap();

    assert_ne!(first.access_secret(), second.access_secret());
    assert_ne!(first.leaf(), second.leaf());
    let (_, key_a, _) = first.into_parts();
    let (_, key_b, _) = second.into_parts();
    assert_ne!(key_a.secret_der(), key_b.secret_der());
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_issuance_yields_distinct_valid_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let authority: Arc<dyn CertificateAuthority> =
        Arc::new(SelfSignAuthority::from_config(&ca_config(&dir)).unwrap());
    let peer = peer_cert("broker1.kafka.local", "broker1.kafka.local");

    let mut handles = Vec::new();
    for _ in 0..100 {
        let authority = Arc::clone(&authority);
        let peer = peer.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            let credential = authority.issue(&peer).unwrap();
            let leaf = PeerIdentity::from_der(credential.leaf()).unwrap();
            assert_eq!(
                leaf.subject.common_name.as_deref(),
                Some("broker1.kafka.local")
            );
            (
                credential.access_secret().to_owned(),
                credential.leaf().to_vec(),
            )
        }));
    }

    let mut secrets = HashSet::new();
    let mut leaves = HashSet::new();
    for handle in handles {
        let (secret, leaf) = handle.await.unwrap();
        secrets.insert(secret);
        leaves.insert(leaf);
    }
    assert_eq!(secrets.len(), 100, "every credential gets a fresh secret");
    assert_eq!(leaves.len(), 100, "every credential gets a fresh certificate");
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn registry_resolves_selfsign_and_rejects_unknown_names() {
    let dir = tempfile::tempdir().unwrap();
    let ca = ca_config(&dir);
    let registry = AuthorityRegistry::with_builtin().unwrap();

    let config = serde_json::json!({ "ca_cert": ca.ca_cert, "ca_key": ca.ca_key });
    let authority = registry.resolve("selfsign", &config).unwrap();
    authority
        .issue(&peer_cert("b1-real", "b1-real.kafka.local"))
        .unwrap();

    let err = registry.resolve("vault", &config).err().unwrap();
    assert!(err.to_string().contains("No such certificate authority"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Failure isolation
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn one_bad_peer_does_not_poison_the_authority() {
    let dir = tempfile::tempdir().unwrap();
    let authority = SelfSignAuthority::from_config(&ca_config(&dir)).unwrap();

    let err = authority
        .issue(&CertificateDer::from(b"not a certificate".to_vec()))
        .unwrap_err();
    assert!(!err.is_fatal());

    // The next connection issues normally.
    authority
        .issue(&peer_cert("broker2.kafka.local", "broker2.kafka.local"))
        .unwrap();
}
