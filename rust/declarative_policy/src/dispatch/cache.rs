//! Per-scope policy instance cache.
//!
//! One `PolicyCache` per unit of work (typically one request). Keys are the
//! identities of the user and subject handles, so equal-but-distinct objects
//! get distinct policies. Entries are never evicted; drop the cache to drop
//! the scope.

use ahash::AHashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::policy::Policy;
use crate::types::{address_of, Subject, UserRef};

/// Subject half of a [`PolicyKey`].
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum SubjectKey {
    Global,
    Absent,
    /// Allocation address of the subject handle.
    Object(usize),
}

impl SubjectKey {
    pub fn of(subject: &Subject) -> Self {
        match subject {
            Subject::Global => SubjectKey::Global,
            Subject::Absent => SubjectKey::Absent,
            Subject::Object(object) => SubjectKey::Object(address_of(object)),
        }
    }
}

/// Identity of a (user, subject) pair.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct PolicyKey {
    /// `None` is the anonymous user.
    user: Option<usize>,
    subject: SubjectKey,
}

impl PolicyKey {
    pub fn new(user: Option<&UserRef>, subject: &Subject) -> Self {
        Self {
            user: user.map(address_of),
            subject: SubjectKey::of(subject),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.user.is_none()
    }

    pub fn subject(&self) -> SubjectKey {
        self.subject
    }
}

impl fmt::Display for PolicyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("/dp/policy/")?;
        match self.user {
            Some(addr) => write!(f, "{addr:#x}/")?,
            None => f.write_str("<anonymous>/")?,
        }
        match self.subject {
            SubjectKey::Global => f.write_str("global"),
            SubjectKey::Absent => f.write_str("nil"),
            SubjectKey::Object(addr) => write!(f, "{addr:#x}"),
        }
    }
}

/// Holding the user and subject handles keeps their addresses (the key)
/// from being reused by other objects while the entry lives.
struct CachedPolicy {
    policy: Arc<dyn Policy>,
    _user: Option<UserRef>,
    _subject: Subject,
}

/// Insertion-only map from [`PolicyKey`] to a policy instance.
///
/// Not internally synchronized: mutation needs `&mut`, so sharing one cache
/// across threads requires the caller to wrap it in a lock.
#[derive(Default)]
pub struct PolicyCache {
    entries: AHashMap<PolicyKey, CachedPolicy>,
}

impl PolicyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &PolicyKey) -> Option<&Arc<dyn Policy>> {
        self.entries.get(key).map(|entry| &entry.policy)
    }

    pub fn contains(&self, key: &PolicyKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the cached policy for (user, subject), or build and store one.
    /// A failed build stores nothing.
    pub(crate) fn get_or_try_insert_with<F>(
        &mut self,
        user: Option<&UserRef>,
        subject: &Subject,
        build: F,
    ) -> Result<Arc<dyn Policy>>
    where
        F: FnOnce() -> Result<Arc<dyn Policy>>,
    {
        let key = PolicyKey::new(user, subject);
        match self.entries.entry(key) {
            Entry::Occupied(entry) => {
                tracing::trace!(key = %key, "policy cache hit");
                Ok(entry.get().policy.clone())
            }
            Entry::Vacant(entry) => {
                tracing::trace!(key = %key, "policy cache miss");
                let policy = build()?;
                entry.insert(CachedPolicy {
                    policy: policy.clone(),
                    _user: user.cloned(),
                    _subject: subject.clone(),
                });
                Ok(policy)
            }
        }
    }
}

impl fmt::Debug for PolicyCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyCache")
            .field("entries", &self.entries.len())
            .finish()
    }
}
