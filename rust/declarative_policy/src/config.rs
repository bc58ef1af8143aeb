//! Dispatch configuration.
//!
//! All fields have defaults, so an empty JSON object is a valid config.

use serde::Deserialize;

use crate::error::{PolicyError, Result};

/// Suffix appended to an ancestor's name to form its conventional policy class name.
pub const DEFAULT_POLICY_SUFFIX: &str = "Policy";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchConfig {
    /// `Widget` + `policy_suffix` is the policy class name looked up for `Widget`.
    pub policy_suffix: String,
    /// Delegation hops allowed before resolution fails with `DelegationTooDeep`.
    /// Unset means unbounded; only a revisited subject stops the walk.
    pub max_delegation_depth: Option<usize>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            policy_suffix: DEFAULT_POLICY_SUFFIX.to_string(),
            max_delegation_depth: None,
        }
    }
}

impl DispatchConfig {
    /// Reject values the dispatcher cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.policy_suffix.is_empty() {
            return Err(PolicyError::InvalidConfig(
                "policy_suffix must not be empty".to_string(),
            ));
        }
        if self.max_delegation_depth == Some(0) {
            return Err(PolicyError::InvalidConfig(
                "max_delegation_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse and validate a dispatch config from a JSON string.
pub fn parse_dispatch_config(json: &str) -> Result<DispatchConfig> {
    let config: DispatchConfig = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
}
