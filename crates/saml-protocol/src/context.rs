//! Explicit processing context.
//!
//! Everything ambient a parse, build, sign or verify step consults lives in a
//! [`SamlContext`]: the clock, the algorithm blacklist, the allowed clock skew
//! and the [`ExtensionRegistry`] that maps `xsi:type` names to constructors
//! for extension identifiers, conditions and statements.
//!
//! A [`ContextHolder`] is available for callers that want a shared current
//! context with scoped substitution; [`ContextGuard`] restores the previous
//! context when dropped.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use saml_core::{AlgorithmPolicy, Clock, SamlConfig, SystemClock};

use crate::error::SamlResult;
use crate::types::{BaseId, CustomCondition, CustomStatement};
use crate::xml::XmlElement;

/// Builds a typed extension value from its element.
pub type ExtensionConstructor<T> =
    Arc<dyn Fn(&XmlElement, &SamlContext) -> SamlResult<T> + Send + Sync>;

/// Registry for extension constructors, keyed by `xsi:type` local name.
#[derive(Default)]
pub struct ExtensionRegistry {
    identifiers: RwLock<HashMap<String, ExtensionConstructor<BaseId>>>,
    conditions: RwLock<HashMap<String, ExtensionConstructor<CustomCondition>>>,
    statements: RwLock<HashMap<String, ExtensionConstructor<CustomStatement>>>,
}

impl ExtensionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a `BaseID` constructor.
    pub fn register_identifier<F>(&self, type_name: impl Into<String>, constructor: F)
    where
        F: Fn(&XmlElement, &SamlContext) -> SamlResult<BaseId> + Send + Sync + 'static,
    {
        self.identifiers
            .write()
            .insert(type_name.into(), Arc::new(constructor));
    }

    /// Registers a `Condition` constructor.
    pub fn register_condition<F>(&self, type_name: impl Into<String>, constructor: F)
    where
        F: Fn(&XmlElement, &SamlContext) -> SamlResult<CustomCondition> + Send + Sync + 'static,
    {
        self.conditions
            .write()
            .insert(type_name.into(), Arc::new(constructor));
    }

    /// Registers a `Statement` constructor.
    pub fn register_statement<F>(&self, type_name: impl Into<String>, constructor: F)
    where
        F: Fn(&XmlElement, &SamlContext) -> SamlResult<CustomStatement> + Send + Sync + 'static,
    {
        self.statements
            .write()
            .insert(type_name.into(), Arc::new(constructor));
    }

    /// Looks up a `BaseID` constructor.
    #[must_use]
    pub fn identifier(&self, type_name: &str) -> Option<ExtensionConstructor<BaseId>> {
        self.identifiers.read().get(type_name).cloned()
    }

    /// Looks up a `Condition` constructor.
    #[must_use]
    pub fn condition(&self, type_name: &str) -> Option<ExtensionConstructor<CustomCondition>> {
        self.conditions.read().get(type_name).cloned()
    }

    /// Looks up a `Statement` constructor.
    #[must_use]
    pub fn statement(&self, type_name: &str) -> Option<ExtensionConstructor<CustomStatement>> {
        self.statements.read().get(type_name).cloned()
    }
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut identifiers: Vec<_> = self.identifiers.read().keys().cloned().collect();
        let mut conditions: Vec<_> = self.conditions.read().keys().cloned().collect();
        let mut statements: Vec<_> = self.statements.read().keys().cloned().collect();
        identifiers.sort();
        conditions.sort();
        statements.sort();
        f.debug_struct("ExtensionRegistry")
            .field("identifiers", &identifiers)
            .field("conditions", &conditions)
            .field("statements", &statements)
            .finish()
    }
}

/// Processing context passed to every operation that needs ambient state.
#[derive(Debug, Clone)]
pub struct SamlContext {
    clock: Arc<dyn Clock>,
    policy: AlgorithmPolicy,
    registry: Arc<ExtensionRegistry>,
    clock_skew: chrono::Duration,
}

impl Default for SamlContext {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            policy: AlgorithmPolicy::default(),
            registry: Arc::new(ExtensionRegistry::new()),
            clock_skew: chrono::Duration::seconds(180),
        }
    }
}

impl SamlContext {
    /// Context with the system clock, default blacklist and an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Context derived from a validated configuration.
    pub fn from_config(config: &SamlConfig) -> SamlResult<Self> {
        config.validate()?;
        Ok(Self {
            policy: config.policy(),
            clock_skew: config.clock_skew(),
            ..Self::default()
        })
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Replaces the algorithm policy.
    #[must_use]
    pub fn with_policy(mut self, policy: AlgorithmPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replaces the extension registry.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<ExtensionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Replaces the allowed clock skew.
    #[must_use]
    pub fn with_clock_skew(mut self, skew: chrono::Duration) -> Self {
        self.clock_skew = skew;
        self
    }

    /// Current time according to the context clock.
    #[must_use]
    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    /// The algorithm blacklist.
    #[must_use]
    pub fn policy(&self) -> &AlgorithmPolicy {
        &self.policy
    }

    /// The extension registry.
    #[must_use]
    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    /// Allowed clock skew for validity windows.
    #[must_use]
    pub fn clock_skew(&self) -> chrono::Duration {
        self.clock_skew
    }
}

/// Shared current context with scoped substitution.
#[derive(Debug, Default)]
pub struct ContextHolder {
    current: RwLock<Arc<SamlContext>>,
}

impl ContextHolder {
    /// Creates a holder with an initial context.
    #[must_use]
    pub fn new(context: SamlContext) -> Self {
        Self {
            current: RwLock::new(Arc::new(context)),
        }
    }

    /// Snapshot of the current context.
    #[must_use]
    pub fn current(&self) -> Arc<SamlContext> {
        Arc::clone(&self.current.read())
    }

    /// Installs `context` until the returned guard is dropped.
    #[must_use = "the previous context is restored as soon as the guard is dropped"]
    pub fn scoped(&self, context: SamlContext) -> ContextGuard<'_> {
        let previous = std::mem::replace(&mut *self.current.write(), Arc::new(context));
        ContextGuard {
            holder: self,
            previous: Some(previous),
        }
    }
}

/// Restores the previous context of a [`ContextHolder`] on drop.
#[derive(Debug)]
pub struct ContextGuard<'a> {
    holder: &'a ContextHolder,
    previous: Option<Arc<SamlContext>>,
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            *self.holder.current.write() = previous;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone};
    use saml_core::FixedClock;

    fn fixed(year: i32) -> SamlContext {
        let instant = chrono::Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap();
        SamlContext::new().with_clock(FixedClock::new(instant))
    }

    #[test]
    fn guard_restores_previous_context() {
        let holder = ContextHolder::new(fixed(2020));
        {
            let _outer = holder.scoped(fixed(2021));
            assert_eq!(holder.current().now().year(), 2021);
            {
                let _inner = holder.scoped(fixed(2022));
                assert_eq!(holder.current().now().year(), 2022);
            }
            assert_eq!(holder.current().now().year(), 2021);
        }
        assert_eq!(holder.current().now().year(), 2020);
    }

    #[test]
    fn guard_restores_on_panic() {
        let holder = ContextHolder::new(fixed(2020));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = holder.scoped(fixed(2030));
            panic!("boom");
        }));
        assert!(result.is_err());
        assert_eq!(holder.current().now().year(), 2020);
    }

    #[test]
    fn registry_lookup() {
        let registry = ExtensionRegistry::new();
        registry.register_identifier("CustomID", |el, _| BaseId::from_element(el));
        assert!(registry.identifier("CustomID").is_some());
        assert!(registry.identifier("Other").is_none());
        assert!(format!("{registry:?}").contains("CustomID"));
    }

    #[test]
    fn from_config_applies_policy_and_skew() {
        let config = SamlConfig {
            clock_skew_seconds: 5,
            algorithm_blacklist: vec![],
            ..SamlConfig::default()
        };
        let ctx = SamlContext::from_config(&config).unwrap();
        assert_eq!(ctx.clock_skew(), chrono::Duration::seconds(5));
        assert!(!ctx
            .policy()
            .is_blacklisted(saml_core::algorithm::signature_uris::RSA_SHA1));
    }
}
