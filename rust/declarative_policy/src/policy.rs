//! Policy classes and policy instances.
//!
//! A [`PolicyClass`] is a `static` descriptor: a name, a parent class, and a
//! constructor. Classes form a single-inheritance tree rooted at
//! [`BASE_POLICY`]; only proper descendants of the base may govern a subject.
//! What an instance permits is decided by the rule layer built on top of
//! [`Policy`], not here.

use ahash::AHashSet;
use serde_json::{Map, Value};
use std::fmt;
use std::ptr;
use std::sync::Arc;

use crate::types::{Subject, UserRef};

/// Builds a policy instance from its construction context.
pub type PolicyConstructor = fn(PolicyContext) -> Arc<dyn Policy>;

/// Caller-supplied options forwarded untouched to the policy constructor.
pub type PolicyParams = Map<String, Value>;

/// Root of the policy class tree.
pub static BASE_POLICY: PolicyClass = PolicyClass::root("Base");

/// Governs [`Subject::Global`].
pub static GLOBAL_POLICY: PolicyClass = PolicyClass::new("GlobalPolicy", &BASE_POLICY);

/// Governs [`Subject::Absent`].
pub static NIL_POLICY: PolicyClass = PolicyClass::new("NilPolicy", &BASE_POLICY);

/// Everything a policy instance is constructed from.
#[derive(Clone)]
pub struct PolicyContext {
    pub class: &'static PolicyClass,
    /// Acting user; `None` is anonymous.
    pub user: Option<UserRef>,
    /// The subject exactly as the caller passed it, before delegate resolution.
    pub subject: Subject,
    pub params: PolicyParams,
}

impl fmt::Debug for PolicyContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyContext")
            .field("class", &self.class.name())
            .field("anonymous", &self.user.is_none())
            .field("subject", &self.subject)
            .field("params", &self.params)
            .finish()
    }
}

/// An instantiated policy for one (user, subject) pair.
pub trait Policy: Send + Sync {
    fn context(&self) -> &PolicyContext;

    fn class(&self) -> &'static PolicyClass {
        self.context().class
    }

    fn user(&self) -> Option<&UserRef> {
        self.context().user.as_ref()
    }

    fn subject(&self) -> &Subject {
        &self.context().subject
    }

    fn params(&self) -> &PolicyParams {
        &self.context().params
    }
}

impl fmt::Debug for dyn Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Policy").field(self.context()).finish()
    }
}

/// Default instance type for classes declared with [`PolicyClass::new`].
#[derive(Debug)]
pub struct BasicPolicy {
    context: PolicyContext,
}

impl BasicPolicy {
    pub fn construct(context: PolicyContext) -> Arc<dyn Policy> {
        Arc::new(BasicPolicy { context })
    }
}

impl Policy for BasicPolicy {
    fn context(&self) -> &PolicyContext {
        &self.context
    }
}

/// Static descriptor of a policy class. Equality is identity.
pub struct PolicyClass {
    name: &'static str,
    parent: Option<&'static PolicyClass>,
    construct: PolicyConstructor,
}

impl PolicyClass {
    /// A class whose instances are [`BasicPolicy`].
    pub const fn new(name: &'static str, parent: &'static PolicyClass) -> Self {
        Self {
            name,
            parent: Some(parent),
            construct: BasicPolicy::construct,
        }
    }

    /// A class with no parent. Roots never govern subjects.
    pub const fn root(name: &'static str) -> Self {
        Self {
            name,
            parent: None,
            construct: BasicPolicy::construct,
        }
    }

    pub const fn with_constructor(
        name: &'static str,
        parent: &'static PolicyClass,
        construct: PolicyConstructor,
    ) -> Self {
        Self {
            name,
            parent: Some(parent),
            construct,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn parent(&self) -> Option<&'static PolicyClass> {
        self.parent
    }

    /// True if `ancestor` appears strictly above this class in its parent chain.
    pub fn is_subclass_of(&self, ancestor: &PolicyClass) -> bool {
        let mut seen: AHashSet<*const PolicyClass> = AHashSet::new();
        let mut current = self.parent;
        while let Some(class) = current {
            if ptr::eq(class, ancestor) {
                return true;
            }
            // A looping parent chain never reaches the ancestor.
            if !seen.insert(class as *const PolicyClass) {
                return false;
            }
            current = class.parent;
        }
        false
    }

    /// Proper subclass of [`BASE_POLICY`]; the only classes allowed to govern subjects.
    pub fn is_policy(&self) -> bool {
        self.is_subclass_of(&BASE_POLICY)
    }

    pub fn instantiate(&'static self, user: Option<UserRef>, subject: Subject) -> Arc<dyn Policy> {
        self.instantiate_with(user, subject, PolicyParams::new())
    }

    pub fn instantiate_with(
        &'static self,
        user: Option<UserRef>,
        subject: Subject,
        params: PolicyParams,
    ) -> Arc<dyn Policy> {
        (self.construct)(PolicyContext {
            class: self,
            user,
            subject,
            params,
        })
    }
}

impl PartialEq for PolicyClass {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self, other)
    }
}

impl Eq for PolicyClass {}

impl fmt::Debug for PolicyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyClass")
            .field("name", &self.name)
            .field("parent", &self.parent.map(|p| p.name))
            .finish()
    }
}
