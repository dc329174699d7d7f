//! Authority factory registry — name → factory resolution.
//!
//! The registry is an explicitly constructed, build-once value: it is built
//! at startup from a static registration list and threaded into whatever
//! constructs the proxy listeners. Tests build their own independent
//! registries. There is no ambient global and no runtime plugin discovery;
//! adding an authority type means adding its factory to
//! [`AuthorityRegistry::with_builtin`] (or registering it explicitly).

use std::collections::HashMap;
use std::sync::Arc;

use crate::ca::selfsign::SelfSignFactory;
use crate::ca::{AuthorityFactory, CertificateAuthority};
use crate::{Error, Result};

/// Immutable-after-build lookup from authority-type name to factory.
pub struct AuthorityRegistry {
    factories: HashMap<&'static str, Box<dyn AuthorityFactory>>,
}

impl AuthorityRegistry {
    /// An empty registry. Mostly useful in tests; production callers want
    /// [`AuthorityRegistry::with_builtin`].
    #[must_use]
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// The registry with every built-in factory registered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if two factories report the same name —
    /// a silently shadowed authority would be an operator trap.
    pub fn with_builtin() -> Result<Self> {
        let mut registry = Self::empty();
        registry.register(Box::new(SelfSignFactory))?;
        Ok(registry)
    }

    /// Register an additional factory under the name it self-reports.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on a duplicate name.
    pub fn register(&mut self, factory: Box<dyn AuthorityFactory>) -> Result<()> {
        let name = factory.name();
        if self.factories.contains_key(name) {
            return Err(Error::Config(format!(
                "Duplicate certificate authority factory \"{name}\""
            )));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Names of all registered factories, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Resolve a factory by name and construct its authority from the given
    /// configuration block. Called once per proxy process per configured
    /// authority, at startup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an unknown name, or whatever the
    /// factory's construction reports.
    pub fn resolve(
        &self,
        name: &str,
        config: &serde_json::Value,
    ) -> Result<Arc<dyn CertificateAuthority>> {
        let factory = self.factories.get(name).ok_or_else(|| {
            Error::Config(format!("No such certificate authority: {name}"))
        })?;
        factory.create(config)
    }
}
