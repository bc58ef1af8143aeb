//! Name-to-class namespace for policy classes.
//!
//! Built once at startup and immutable afterwards. The registry derives
//! candidate names (`Widget` -> `WidgetPolicy`) and asks the catalog for them.

use ahash::AHashMap;

use crate::error::{PolicyError, Result};
use crate::policy::{PolicyClass, GLOBAL_POLICY, NIL_POLICY};

#[derive(Debug, Clone)]
pub struct PolicyCatalog {
    classes: AHashMap<&'static str, &'static PolicyClass>,
    global: &'static PolicyClass,
    nil: &'static PolicyClass,
}

impl PolicyCatalog {
    pub fn builder() -> PolicyCatalogBuilder {
        PolicyCatalogBuilder::default()
    }

    /// Look up a class by name. `None` means no such class.
    pub fn lookup(&self, name: &str) -> Option<&'static PolicyClass> {
        self.classes.get(name).copied()
    }

    pub fn global_policy(&self) -> &'static PolicyClass {
        self.global
    }

    pub fn nil_policy(&self) -> &'static PolicyClass {
        self.nil
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl Default for PolicyCatalog {
    /// Catalog holding only the built-in global and nil policies.
    fn default() -> Self {
        let mut classes = AHashMap::new();
        classes.insert(GLOBAL_POLICY.name(), &GLOBAL_POLICY);
        classes.insert(NIL_POLICY.name(), &NIL_POLICY);
        Self {
            classes,
            global: &GLOBAL_POLICY,
            nil: &NIL_POLICY,
        }
    }
}

#[derive(Debug, Default)]
pub struct PolicyCatalogBuilder {
    classes: Vec<&'static PolicyClass>,
    global: Option<&'static PolicyClass>,
    nil: Option<&'static PolicyClass>,
}

impl PolicyCatalogBuilder {
    pub fn register(mut self, class: &'static PolicyClass) -> Self {
        self.classes.push(class);
        self
    }

    pub fn register_all(mut self, classes: &[&'static PolicyClass]) -> Self {
        self.classes.extend_from_slice(classes);
        self
    }

    /// Replace the class governing [`crate::Subject::Global`].
    pub fn global_policy(mut self, class: &'static PolicyClass) -> Self {
        self.global = Some(class);
        self
    }

    /// Replace the class governing [`crate::Subject::Absent`].
    pub fn nil_policy(mut self, class: &'static PolicyClass) -> Self {
        self.nil = Some(class);
        self
    }

    pub fn build(self) -> Result<PolicyCatalog> {
        let global = self.global.unwrap_or(&GLOBAL_POLICY);
        let nil = self.nil.unwrap_or(&NIL_POLICY);
        for sentinel in [global, nil] {
            if !sentinel.is_policy() {
                return Err(PolicyError::InvalidPolicyClass {
                    name: sentinel.name().to_string(),
                });
            }
        }

        let mut classes: AHashMap<&'static str, &'static PolicyClass> = AHashMap::new();
        for class in [global, nil].into_iter().chain(self.classes) {
            match classes.get(class.name()) {
                Some(existing) if *existing != class => {
                    return Err(PolicyError::DuplicatePolicyClass {
                        name: class.name().to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    classes.insert(class.name(), class);
                }
            }
        }

        Ok(PolicyCatalog {
            classes,
            global,
            nil,
        })
    }
}
