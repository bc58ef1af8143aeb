//! Subject and user model shared across declarative_policy modules.

use ahash::AHashSet;
use std::fmt;
use std::ptr;
use std::sync::Arc;

// ============================================================================
// Subject types
// ============================================================================

/// Registry key for a subject type: the address of its `static` descriptor.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct TypeKey(usize);

/// Static descriptor of a concrete runtime type and its ancestry.
///
/// Must be declared as a `static` item: the descriptor's address is its
/// identity. A `const` may be duplicated at every use site.
///
/// ```
/// use declarative_policy::SubjectType;
///
/// static OWNABLE: SubjectType = SubjectType::new("Ownable", &[]);
/// static WIDGET: SubjectType = SubjectType::new("Widget", &[&OWNABLE]);
/// static GADGET: SubjectType = SubjectType::new("Gadget", &[&WIDGET]);
///
/// let names: Vec<_> = GADGET.ancestors().iter().map(|t| t.display_name()).collect();
/// assert_eq!(names, ["Gadget", "Widget", "Ownable"]);
/// ```
pub struct SubjectType {
    name: Option<&'static str>,
    /// Direct supertypes and mixed-in capability sets, most specific first.
    supertypes: &'static [&'static SubjectType],
}

impl SubjectType {
    pub const fn new(name: &'static str, supertypes: &'static [&'static SubjectType]) -> Self {
        Self {
            name: Some(name),
            supertypes,
        }
    }

    /// A type without a stable name. Skipped when deriving policy names.
    pub const fn anonymous(supertypes: &'static [&'static SubjectType]) -> Self {
        Self {
            name: None,
            supertypes,
        }
    }

    pub fn name(&self) -> Option<&'static str> {
        self.name
    }

    pub fn display_name(&self) -> &'static str {
        self.name.unwrap_or("<anonymous>")
    }

    pub fn supertypes(&self) -> &'static [&'static SubjectType] {
        self.supertypes
    }

    pub fn key(&'static self) -> TypeKey {
        TypeKey(self as *const SubjectType as usize)
    }

    /// Ancestry in resolution order: the type itself, then a depth-first walk
    /// over its supertypes in declared order. Each ancestor appears once,
    /// at its first position.
    pub fn ancestors(&'static self) -> Vec<&'static SubjectType> {
        let mut order = Vec::new();
        let mut seen: AHashSet<TypeKey> = AHashSet::new();
        let mut stack: Vec<&'static SubjectType> = vec![self];

        while let Some(ty) = stack.pop() {
            if !seen.insert(ty.key()) {
                continue;
            }
            order.push(ty);
            stack.extend(ty.supertypes.iter().rev().copied());
        }

        order
    }
}

impl PartialEq for SubjectType {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self, other)
    }
}

impl Eq for SubjectType {}

impl fmt::Debug for SubjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let supertypes: Vec<&str> = self.supertypes.iter().map(|t| t.display_name()).collect();
        f.debug_struct("SubjectType")
            .field("name", &self.display_name())
            .field("supertypes", &supertypes)
            .finish()
    }
}

// ============================================================================
// Subjects
// ============================================================================

/// A domain object that can be the subject of an authorization check.
pub trait PolicySubject: Send + Sync + 'static {
    /// The concrete runtime type of this subject.
    fn subject_type(&self) -> &'static SubjectType;

    /// The subject this one stands in for, if any.
    fn policy_delegate(&self) -> Option<SubjectRef> {
        None
    }
}

/// Shared handle to a concrete subject. Identity is the allocation address.
pub type SubjectRef = Arc<dyn PolicySubject>;

impl fmt::Debug for dyn PolicySubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addr = (self as *const dyn PolicySubject).cast::<()>() as usize;
        write!(f, "{}@{:#x}", self.subject_type().display_name(), addr)
    }
}

/// The thing being checked.
#[derive(Clone)]
pub enum Subject {
    /// "The whole system". Always governed by the global policy.
    Global,
    /// No particular subject. Always governed by the nil policy.
    Absent,
    Object(SubjectRef),
}

impl Subject {
    pub fn object<T: PolicySubject>(value: T) -> Self {
        Subject::Object(Arc::new(value))
    }

    pub fn as_object(&self) -> Option<&SubjectRef> {
        match self {
            Subject::Object(subject) => Some(subject),
            _ => None,
        }
    }

    /// Two subjects are the same if they are the same sentinel or the same allocation.
    pub fn same_as(&self, other: &Subject) -> bool {
        match (self, other) {
            (Subject::Global, Subject::Global) | (Subject::Absent, Subject::Absent) => true,
            (Subject::Object(a), Subject::Object(b)) => address_of(a) == address_of(b),
            _ => false,
        }
    }
}

impl From<SubjectRef> for Subject {
    fn from(subject: SubjectRef) -> Self {
        Subject::Object(subject)
    }
}

impl From<Option<SubjectRef>> for Subject {
    fn from(subject: Option<SubjectRef>) -> Self {
        subject.map_or(Subject::Absent, Subject::Object)
    }
}

impl fmt::Debug for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Global => f.write_str("Global"),
            Subject::Absent => f.write_str("Absent"),
            Subject::Object(subject) => write!(f, "Object({subject:?})"),
        }
    }
}

// ============================================================================
// Users
// ============================================================================

/// The acting identity. Opaque to dispatch beyond its identity.
pub trait Principal: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Principal for T {}

/// Shared handle to a user. `None` in an API position means anonymous.
pub type UserRef = Arc<dyn Principal>;

/// Allocation address of a shared handle, used as its identity.
pub(crate) fn address_of<T: ?Sized>(handle: &Arc<T>) -> usize {
    Arc::as_ptr(handle).cast::<()>() as usize
}
