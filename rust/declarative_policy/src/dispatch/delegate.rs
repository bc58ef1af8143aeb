//! Delegation chain traversal.

use ahash::AHashSet;

use crate::error::{PolicyError, Result};
use crate::types::{address_of, SubjectRef};

/// Follow `policy_delegate` links from `subject` to the terminal subject.
///
/// Identity (allocation address), not equality, detects cycles. Every
/// subject seen is held until the walk ends so an address cannot be freed
/// and reused by a freshly minted delegate mid-walk.
///
/// `max_depth` bounds the number of hops. Without it the walk only stops at
/// a terminal subject or a revisit, so a delegate that mints a fresh object
/// on every call never returns.
pub fn find_delegate(subject: &SubjectRef, max_depth: Option<usize>) -> Result<SubjectRef> {
    let mut seen: AHashSet<usize> = AHashSet::new();
    let mut chain: Vec<SubjectRef> = Vec::new();
    let mut current = subject.clone();

    while let Some(delegate) = current.policy_delegate() {
        if !seen.insert(address_of(&current)) {
            tracing::warn!(
                subject_type = subject.subject_type().display_name(),
                hops = chain.len(),
                "circular policy delegation"
            );
            return Err(PolicyError::CircularDelegation {
                subject_type: subject.subject_type().display_name().to_string(),
            });
        }
        if let Some(limit) = max_depth {
            if chain.len() >= limit {
                tracing::warn!(
                    subject_type = subject.subject_type().display_name(),
                    limit,
                    "policy delegation too deep"
                );
                return Err(PolicyError::DelegationTooDeep { limit });
            }
        }
        chain.push(std::mem::replace(&mut current, delegate));
    }

    Ok(current)
}
