//! Broker map — bidirectional routing table between real broker endpoints
//! and externally exposed proxy endpoints.
//!
//! The map is built once from configuration and is immutable afterwards: the
//! owned mapping list and both lookup indices are constructed together, so
//! readers can never observe a partially built table. Reconfiguration means
//! building a fresh [`BrokerMap`] and swapping the shared handle (e.g. an
//! `Arc`), never mutating in place.
//!
//! Both lookups sit on the per-connection hot path (protocol rewriting asks
//! "which proxy endpoint advertises this broker?" for every relevant frame),
//! so they are O(1) hash lookups regardless of cluster size.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Endpoint
// ─────────────────────────────────────────────────────────────────────────────

/// A host+port pair. Immutable value; equality and hash by field value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Hostname or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Endpoint {
    /// Create an endpoint from host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BrokerMapping
// ─────────────────────────────────────────────────────────────────────────────

/// One logical route: a named broker, its real endpoint, and the proxy
/// endpoint advertised in its place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerMapping {
    /// Stable logical broker name, unique within a map.
    pub name: String,
    /// The real backend endpoint.
    pub broker: Endpoint,
    /// The externally exposed proxy endpoint, unique within a map.
    pub proxy: Endpoint,
}

impl BrokerMapping {
    /// Create a mapping from a name and both endpoints.
    pub fn new(name: impl Into<String>, broker: Endpoint, proxy: Endpoint) -> Self {
        Self {
            name: name.into(),
            broker,
            proxy,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Selector
// ─────────────────────────────────────────────────────────────────────────────

/// Policy choosing which brokers are actively proxied.
///
/// `All` is spelled `"*"` in configuration and is the default when the
/// setting is absent. `Named` must reference existing broker names; an
/// unknown name fails [`BrokerMap::build`]. Matching is literal — there is no
/// prefix or partial wildcard form.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selector {
    /// Proxy every configured broker.
    #[default]
    All,
    /// Proxy only the named subset.
    Named(BTreeSet<String>),
}

impl Selector {
    /// Parse a selector from its configuration string form: `"*"` for all,
    /// otherwise a comma-separated list of broker names (the environment
    /// variable form). Blank input behaves as `"*"`.
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Self::All;
        }
        Self::Named(
            trimmed
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect(),
        )
    }

    /// Build a selector from an explicit name list.
    pub fn named<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Named(names.into_iter().map(Into::into).collect())
    }

    /// Whether this selector includes the given broker name.
    #[must_use]
    pub fn selects(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Named(names) => names.contains(name),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BrokerMap
// ─────────────────────────────────────────────────────────────────────────────

/// Bidirectional, high-lookup-rate registry of broker routes.
///
/// Owns the ordered mapping list plus two derived indices; all three are
/// built together in [`BrokerMap::build`] and never mutated afterwards.
#[derive(Debug)]
pub struct BrokerMap {
    mappings: Vec<BrokerMapping>,
    by_broker: HashMap<Endpoint, usize>,
    by_name: HashMap<String, usize>,
    proxied: BTreeSet<String>,
}

impl BrokerMap {
    /// Build a map from configured mappings and a selection policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on a duplicate broker name, duplicate proxy
    /// endpoint, duplicate broker endpoint (either duplicate would make one
    /// of the indices ambiguous), or a selector naming an unknown broker.
    pub fn build(mappings: Vec<BrokerMapping>, selector: &Selector) -> Result<Self> {
        let mut by_broker = HashMap::with_capacity(mappings.len());
        let mut by_name = HashMap::with_capacity(mappings.len());
        let mut proxy_endpoints: HashMap<&Endpoint, &str> = HashMap::with_capacity(mappings.len());

        for (idx, mapping) in mappings.iter().enumerate() {
            if by_name.insert(mapping.name.clone(), idx).is_some() {
                return Err(Error::Config(format!(
                    "Duplicate broker name \"{}\" in broker map",
                    mapping.name
                )));
            }
            if by_broker.insert(mapping.broker.clone(), idx).is_some() {
                return Err(Error::Config(format!(
                    "Duplicate broker endpoint {} in broker map",
                    mapping.broker
                )));
            }
            if let Some(other) = proxy_endpoints.insert(&mapping.proxy, &mapping.name) {
                return Err(Error::Config(format!(
                    "Proxy endpoint {} is shared by brokers \"{}\" and \"{}\"",
                    mapping.proxy, other, mapping.name
                )));
            }
        }

        let proxied = match selector {
            Selector::All => mappings.iter().map(|m| m.name.clone()).collect(),
            Selector::Named(names) => {
                for name in names {
                    if !by_name.contains_key(name) {
                        return Err(Error::Config(format!(
                            "Unknown broker name \"{name}\" in proxied-broker selector"
                        )));
                    }
                }
                names.clone()
            }
        };

        Ok(Self {
            mappings,
            by_broker,
            by_name,
            proxied,
        })
    }

    /// Look up the mapping whose *real* broker endpoint is `host:port`.
    ///
    /// `None` means "not a known broker" — a normal outcome the caller
    /// branches on, not an error.
    #[must_use]
    pub fn get_by_broker_endpoint(&self, host: &str, port: u16) -> Option<&BrokerMapping> {
        let key = Endpoint::new(host, port);
        self.by_broker.get(&key).map(|&idx| &self.mappings[idx])
    }

    /// Look up a mapping by its logical broker name.
    #[must_use]
    pub fn get_by_proxy_name(&self, name: &str) -> Option<&BrokerMapping> {
        self.by_name.get(name).map(|&idx| &self.mappings[idx])
    }

    /// The full mapping list in configured order. Used for diagnostics and
    /// listener initialization.
    #[must_use]
    pub fn get_all(&self) -> &[BrokerMapping] {
        &self.mappings
    }

    /// The proxied subset in configured order.
    #[must_use]
    pub fn brokers_to_proxy(&self) -> Vec<&BrokerMapping> {
        self.mappings
            .iter()
            .filter(|m| self.proxied.contains(&m.name))
            .collect()
    }

    /// Whether the named broker is selected for active interception.
    #[must_use]
    pub fn is_proxied(&self, name: &str) -> bool {
        self.proxied.contains(name)
    }

    /// Number of configured mappings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// True when no mappings are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
