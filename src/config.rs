//! Configuration management.
//!
//! A YAML file merged with `BROKER_GATEWAY_`-prefixed environment variables
//! (nested keys separated by `__`, e.g. `BROKER_GATEWAY_AUTHORITY__TYPE`).
//! Environment wins over file, so deployments can override the proxied-broker
//! selector without editing the broker map:
//!
//! ```text
//! BROKER_GATEWAY_PROXIED="broker1,broker2"
//! ```
//!
//! # Example YAML
//!
//! ```yaml
//! brokers:
//!   - name: broker1
//!     broker: { host: broker1.kafka.local, port: 9092 }
//!     proxy:  { host: kafka.example.com,   port: 39092 }
//!   - name: broker2
//!     broker: { host: broker2.kafka.local, port: 9092 }
//!     proxy:  { host: kafka.example.com,   port: 39093 }
//! proxied: "*"
//! authority:
//!   type: selfsign
//!   config:
//!     ca_cert: /etc/broker-gateway/tls/ca.crt
//!     ca_key:  /etc/broker-gateway/tls/ca.key
//! ```

use std::path::Path;
use std::sync::Arc;

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::brokermap::{BrokerMap, BrokerMapping, Endpoint, Selector};
use crate::ca::{AuthorityRegistry, CertificateAuthority};
use crate::{Error, Result};

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "BROKER_GATEWAY_";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration types
// ─────────────────────────────────────────────────────────────────────────────

/// Top-level proxy configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// The broker map: one entry per logical broker.
    pub brokers: Vec<BrokerEntry>,

    /// Which brokers to actively proxy. Absent means all.
    pub proxied: Option<ProxiedBrokers>,

    /// Certificate authority selection and its own configuration block.
    pub authority: AuthorityConfig,
}

/// One configured broker route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerEntry {
    /// Logical broker name, unique across the map.
    pub name: String,
    /// The real broker endpoint.
    pub broker: Endpoint,
    /// The externally exposed proxy endpoint, unique across the map.
    pub proxy: Endpoint,
}

/// The proxied-broker selector as it appears in configuration: either a
/// string (`"*"` or a comma-separated name list — the environment variable
/// form) or a YAML list of names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProxiedBrokers {
    /// `"*"` or `"broker1,broker2"`.
    Pattern(String),
    /// `[broker1, broker2]`.
    Names(Vec<String>),
}

/// Certificate authority section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorityConfig {
    /// Authority type name, resolved against the factory registry.
    #[serde(rename = "type")]
    pub kind: String,

    /// Authority-specific configuration, passed through to the factory
    /// untouched.
    pub config: serde_json::Value,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            kind: "selfsign".to_owned(),
            config: serde_json::Value::Null,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Loading + derived values
// ─────────────────────────────────────────────────────────────────────────────

impl ProxyConfig {
    /// Load configuration from an optional YAML file plus environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file is missing or any value fails to
    /// deserialize.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        figment.extract().map_err(|e| Error::Config(e.to_string()))
    }

    /// The selection policy derived from the `proxied` setting.
    #[must_use]
    pub fn selector(&self) -> Selector {
        match &self.proxied {
            None => Selector::All,
            Some(ProxiedBrokers::Pattern(s)) => Selector::parse(s),
            Some(ProxiedBrokers::Names(names)) => Selector::named(names.iter().cloned()),
        }
    }

    /// Build the broker map from the configured entries and selector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on duplicate names/endpoints or a selector
    /// naming an unknown broker.
    pub fn broker_map(&self) -> Result<BrokerMap> {
        let mappings = self
            .brokers
            .iter()
            .map(|entry| {
                BrokerMapping::new(entry.name.clone(), entry.broker.clone(), entry.proxy.clone())
            })
            .collect();
        BrokerMap::build(mappings, &self.selector())
    }

    /// Resolve and construct the configured certificate authority.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an unknown authority type or unusable
    /// authority configuration.
    pub fn resolve_authority(
        &self,
        registry: &AuthorityRegistry,
    ) -> Result<Arc<dyn CertificateAuthority>> {
        registry.resolve(&self.authority.kind, &self.authority.config)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
