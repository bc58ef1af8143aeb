//! Policy dispatch: subject -> policy class -> policy instance.
//!
//! ```text
//!   policy_for(user, subject, cache)
//!     └─ cache hit?  ── yes ──> cached instance
//!         └─ no: class_for(subject)
//!              ├─ Global  -> catalog global policy
//!              ├─ Absent  -> catalog nil policy
//!              └─ Object  -> find_delegate -> registry (memoized ancestry walk)
//!            instantiate(user, original subject) -> store in cache
//! ```

pub mod cache;
pub mod delegate;
pub mod registry;

use std::sync::Arc;

use crate::catalog::PolicyCatalog;
use crate::config::DispatchConfig;
use crate::error::Result;
use crate::policy::{Policy, PolicyClass, PolicyParams};
use crate::types::{Subject, UserRef};

use self::cache::PolicyCache;
use self::delegate::find_delegate;
use self::registry::PolicyClassRegistry;

/// Per-call options for [`Dispatcher::policy_for`].
#[derive(Debug, Default)]
pub struct PolicyOptions<'c> {
    /// Scope cache. Without one, every call builds a fresh instance.
    pub cache: Option<&'c mut PolicyCache>,
    /// Handed to the constructor on a cache miss. A cache hit returns the
    /// existing instance with whatever params it was built with.
    pub params: PolicyParams,
}

impl<'c> PolicyOptions<'c> {
    pub fn with_cache(cache: &'c mut PolicyCache) -> Self {
        Self {
            cache: Some(cache),
            params: PolicyParams::new(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Entry point. Clones share one registry, so a single dispatcher built at
/// startup serves every worker thread.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<PolicyClassRegistry>,
    max_delegation_depth: Option<usize>,
}

impl Dispatcher {
    pub fn new(catalog: PolicyCatalog) -> Self {
        let config = DispatchConfig::default();
        Self {
            registry: Arc::new(PolicyClassRegistry::new(catalog, &config)),
            max_delegation_depth: config.max_delegation_depth,
        }
    }

    pub fn with_config(catalog: PolicyCatalog, config: DispatchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            registry: Arc::new(PolicyClassRegistry::new(catalog, &config)),
            max_delegation_depth: config.max_delegation_depth,
        })
    }

    pub fn registry(&self) -> &PolicyClassRegistry {
        &self.registry
    }

    /// The policy class governing `subject`.
    ///
    /// Sentinels bypass the registry. Objects are first resolved through
    /// their delegation chain; a missing policy reports the resolved type.
    pub fn class_for(&self, subject: &Subject) -> Result<&'static PolicyClass> {
        match subject {
            Subject::Global => Ok(self.registry.catalog().global_policy()),
            Subject::Absent => Ok(self.registry.catalog().nil_policy()),
            Subject::Object(object) => {
                let resolved = find_delegate(object, self.max_delegation_depth)?;
                self.registry.resolve(resolved.subject_type())
            }
        }
    }

    /// The policy instance for (user, subject), reused from `options.cache`
    /// when that cache has already seen the pair.
    ///
    /// The instance is built with the subject as passed, not its delegate,
    /// and receives `options.params`.
    pub fn policy_for(
        &self,
        user: Option<&UserRef>,
        subject: &Subject,
        options: PolicyOptions<'_>,
    ) -> Result<Arc<dyn Policy>> {
        let PolicyOptions { cache, params } = options;
        let mut transient = PolicyCache::new();
        let cache = match cache {
            Some(cache) => cache,
            None => &mut transient,
        };

        cache.get_or_try_insert_with(user, subject, move || {
            let class = self.class_for(subject)?;
            Ok(class.instantiate_with(user.cloned(), subject.clone(), params))
        })
    }
}
