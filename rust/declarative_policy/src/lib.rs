//! `declarative_policy`: policy dispatch core.
//!
//! Given an acting user and a subject, locates the single policy class that
//! governs the subject and instantiates at most one policy object per
//! (user, subject) pair within a caller-owned scope.
//!
//! Modules:
//! - `types`    : subject / user model (SubjectType, PolicySubject, Subject)
//! - `policy`   : policy classes, instances, and the built-in base/global/nil classes
//! - `catalog`  : name-to-class namespace built once at startup
//! - `dispatch` : delegate resolution, class registry, scoped instance cache, entry point
//! - `config`   : dispatch configuration parsing
//! - `error`    : error taxonomy

pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod policy;
pub mod types;

pub use catalog::{PolicyCatalog, PolicyCatalogBuilder};
pub use config::{parse_dispatch_config, DispatchConfig};
pub use dispatch::cache::{PolicyCache, PolicyKey, SubjectKey};
pub use dispatch::delegate::find_delegate;
pub use dispatch::registry::{PolicyClassRegistry, RegistryStats};
pub use dispatch::{Dispatcher, PolicyOptions};
pub use error::{PolicyError, Result};
pub use policy::{
    BasicPolicy, Policy, PolicyClass, PolicyConstructor, PolicyContext, PolicyParams,
    BASE_POLICY, GLOBAL_POLICY, NIL_POLICY,
};
pub use types::{Principal, PolicySubject, Subject, SubjectRef, SubjectType, TypeKey, UserRef};
