//! Error types for policy dispatch.

use thiserror::Error;

/// Policy dispatch errors.
///
/// Every variant means "authorization cannot be determined". Callers must
/// treat them as a denial, never as an implicit grant.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// A subject's delegation chain revisits an already-seen subject.
    #[error("circular delegations starting from {subject_type}")]
    CircularDelegation { subject_type: String },

    /// A delegation chain did not terminate within the configured depth.
    #[error("delegation chain exceeds {limit} hops")]
    DelegationTooDeep { limit: usize },

    /// No ancestor of the subject type has a policy class.
    #[error("no policy for {type_name}")]
    NoPolicyFound { type_name: String },

    /// A class used where a policy is required does not descend from the base policy.
    #[error("{name} is not a subclass of the base policy")]
    InvalidPolicyClass { name: String },

    /// Two distinct classes were registered under the same name.
    #[error("policy class {name} registered twice")]
    DuplicatePolicyClass { name: String },

    /// Configuration values out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Configuration could not be parsed.
    #[error("config parse error: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PolicyError>;
