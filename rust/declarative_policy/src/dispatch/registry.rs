//! Process-wide subject type -> policy class memo.
//!
//! Resolving a type walks its ancestry and probes the catalog for every named
//! ancestor, so each type is resolved once and the answer (including "no
//! policy") is kept for the life of the registry. Types are static, so
//! entries are never invalidated.
//!
//! Reads go through the `DashMap` without touching the compute lock. A miss
//! takes the single compute lock and re-checks before walking, so racing
//! first lookups of one type compute it exactly once.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::catalog::PolicyCatalog;
use crate::config::DispatchConfig;
use crate::error::{PolicyError, Result};
use crate::policy::PolicyClass;
use crate::types::{SubjectType, TypeKey};

/// Snapshot of registry counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Memoized types, resolved or not.
    pub entries: usize,
    /// Ancestry walks performed.
    pub computations: u64,
    /// Cold-path lookups that found the entry already filled by another thread.
    pub contended: u64,
}

pub struct PolicyClassRegistry {
    catalog: PolicyCatalog,
    policy_suffix: String,
    /// `None` memoizes "no policy anywhere in the ancestry".
    entries: DashMap<TypeKey, Option<&'static PolicyClass>, ahash::RandomState>,
    compute_lock: Mutex<()>,
    computations: AtomicU64,
    contended: AtomicU64,
}

impl PolicyClassRegistry {
    pub fn new(catalog: PolicyCatalog, config: &DispatchConfig) -> Self {
        Self {
            catalog,
            policy_suffix: config.policy_suffix.clone(),
            entries: DashMap::with_hasher(ahash::RandomState::new()),
            compute_lock: Mutex::new(()),
            computations: AtomicU64::new(0),
            contended: AtomicU64::new(0),
        }
    }

    pub fn catalog(&self) -> &PolicyCatalog {
        &self.catalog
    }

    /// Memoized policy class for `subject_type`, `None` if no ancestor has one.
    pub fn class_for_type(
        &self,
        subject_type: &'static SubjectType,
    ) -> Option<&'static PolicyClass> {
        let key = subject_type.key();
        if let Some(entry) = self.entries.get(&key) {
            return *entry;
        }

        let _guard = self.compute_lock.lock();
        // Re-check: another thread may have filled it while we waited.
        if let Some(entry) = self.entries.get(&key) {
            self.contended.fetch_add(1, Ordering::Relaxed);
            return *entry;
        }

        let policy_class = self.compute(subject_type);
        self.entries.insert(key, policy_class);
        policy_class
    }

    /// Like [`class_for_type`](Self::class_for_type), but a missing policy is an error.
    pub fn resolve(&self, subject_type: &'static SubjectType) -> Result<&'static PolicyClass> {
        self.class_for_type(subject_type)
            .ok_or_else(|| PolicyError::NoPolicyFound {
                type_name: subject_type.display_name().to_string(),
            })
    }

    /// Resolve a set of types up front, failing on the first one without a policy.
    pub fn preload(&self, subject_types: &[&'static SubjectType]) -> Result<()> {
        for &subject_type in subject_types {
            self.resolve(subject_type)?;
        }
        Ok(())
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            entries: self.entries.len(),
            computations: self.computations.load(Ordering::Relaxed),
            contended: self.contended.load(Ordering::Relaxed),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First named ancestor whose `<Name><suffix>` is a proper policy class.
    fn compute(&self, subject_type: &'static SubjectType) -> Option<&'static PolicyClass> {
        self.computations.fetch_add(1, Ordering::Relaxed);

        for ancestor in subject_type.ancestors() {
            let Some(name) = ancestor.name() else {
                continue;
            };
            let candidate = format!("{}{}", name, self.policy_suffix);
            match self.catalog.lookup(&candidate) {
                Some(policy_class) if policy_class.is_policy() => {
                    tracing::debug!(
                        subject_type = subject_type.display_name(),
                        policy = policy_class.name(),
                        via = name,
                        "policy class resolved"
                    );
                    return Some(policy_class);
                }
                Some(_) => {
                    tracing::trace!(candidate = %candidate, "candidate is not a policy class");
                }
                None => {
                    tracing::trace!(candidate = %candidate, "no such policy class");
                }
            }
        }

        tracing::warn!(
            subject_type = subject_type.display_name(),
            "no policy class in ancestry"
        );
        None
    }
}

impl std::fmt::Debug for PolicyClassRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyClassRegistry")
            .field("policy_suffix", &self.policy_suffix)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::BASE_POLICY;

    static OWNABLE: SubjectType = SubjectType::new("Ownable", &[]);
    static WIDGET: SubjectType = SubjectType::new("Widget", &[&OWNABLE]);
    static GADGET: SubjectType = SubjectType::new("Gadget", &[&WIDGET]);
    static SPROCKET: SubjectType = SubjectType::new("Sprocket", &[&OWNABLE]);
    static STRAY: SubjectType = SubjectType::new("Stray", &[]);
    static ORPHAN: SubjectType = SubjectType::new("Orphan", &[]);
    static ANON_WIDGET: SubjectType = SubjectType::anonymous(&[&WIDGET]);

    static WIDGET_POLICY: PolicyClass = PolicyClass::new("WidgetPolicy", &BASE_POLICY);
    static OWNABLE_POLICY: PolicyClass = PolicyClass::new("OwnablePolicy", &BASE_POLICY);
    static WIDGET_RULES: PolicyClass = PolicyClass::new("WidgetRules", &BASE_POLICY);

    static UNROOTED: PolicyClass = PolicyClass::root("Unrooted");
    static STRAY_POLICY: PolicyClass = PolicyClass::new("StrayPolicy", &UNROOTED);

    fn registry() -> PolicyClassRegistry {
        let catalog = PolicyCatalog::builder()
            .register_all(&[&WIDGET_POLICY, &OWNABLE_POLICY, &STRAY_POLICY, &WIDGET_RULES])
            .build()
            .unwrap();
        PolicyClassRegistry::new(catalog, &DispatchConfig::default())
    }

    #[test]
    fn own_policy_wins() {
        let registry = registry();
        assert_eq!(registry.class_for_type(&WIDGET), Some(&WIDGET_POLICY));
    }

    #[test]
    fn falls_back_to_closest_ancestor() {
        let registry = registry();
        assert_eq!(registry.class_for_type(&GADGET), Some(&WIDGET_POLICY));
        assert_eq!(registry.class_for_type(&SPROCKET), Some(&OWNABLE_POLICY));
    }

    #[test]
    fn anonymous_type_skipped_in_walk() {
        let registry = registry();
        assert_eq!(registry.class_for_type(&ANON_WIDGET), Some(&WIDGET_POLICY));
    }

    #[test]
    fn non_policy_candidate_rejected() {
        let registry = registry();
        assert_eq!(registry.class_for_type(&STRAY), None);
        let err = registry.resolve(&STRAY).unwrap_err();
        assert!(matches!(
            err,
            PolicyError::NoPolicyFound { ref type_name } if type_name == "Stray"
        ));
    }

    #[test]
    fn missing_policy_names_type() {
        let registry = registry();
        let err = registry.resolve(&ORPHAN).unwrap_err();
        assert_eq!(err.to_string(), "no policy for Orphan");
    }

    #[test]
    fn success_computed_once() {
        let registry = registry();
        for _ in 0..5 {
            registry.class_for_type(&GADGET);
        }
        let stats = registry.stats();
        assert_eq!(stats.computations, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.contended, 0);
    }

    #[test]
    fn failure_memoized() {
        let registry = registry();
        for _ in 0..5 {
            assert!(registry.resolve(&ORPHAN).is_err());
        }
        assert_eq!(registry.stats().computations, 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn types_memoized_independently() {
        let registry = registry();
        registry.class_for_type(&WIDGET);
        registry.class_for_type(&GADGET);
        assert_eq!(registry.stats().computations, 2);
    }

    #[test]
    fn custom_suffix() {
        let catalog = PolicyCatalog::builder()
            .register_all(&[&WIDGET_POLICY, &WIDGET_RULES])
            .build()
            .unwrap();
        let config = DispatchConfig {
            policy_suffix: "Rules".to_string(),
            ..DispatchConfig::default()
        };
        let registry = PolicyClassRegistry::new(catalog, &config);
        assert_eq!(registry.class_for_type(&GADGET), Some(&WIDGET_RULES));
    }

    #[test]
    fn preload_fails_on_first_ungoverned_type() {
        let registry = registry();
        registry.preload(&[&WIDGET, &GADGET]).unwrap();
        let err = registry.preload(&[&SPROCKET, &ORPHAN, &STRAY]).unwrap_err();
        assert!(matches!(
            err,
            PolicyError::NoPolicyFound { ref type_name } if type_name == "Orphan"
        ));
        assert_eq!(registry.stats().entries, 4);
    }
}
