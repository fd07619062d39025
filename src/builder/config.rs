//! Machine configuration.

use super::error::BuildError;
use crate::core::DEFAULT_MAX_DELEGATION_DEPTH;
use crate::scope::ScopeToken;
use serde::{Deserialize, Serialize};

/// Settings a machine is started with.
///
/// The plain fields serialize, so they can live in a host's config file; the
/// lifecycle signal is attached at runtime.
///
/// # Example
///
/// ```rust
/// use yieldmachine::builder::MachineConfig;
///
/// let config: MachineConfig =
///     serde_json::from_str(r#"{ "label": "drag", "record_history": false }"#).unwrap();
///
/// assert_eq!(config.label, "drag");
/// assert_eq!(config.max_delegation_depth, 32);
/// assert!(!config.record_history);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Name used in logs.
    pub label: String,

    /// Bound on nested `continue_as` calls while collecting a state.
    pub max_delegation_depth: usize,

    /// Keep a [`crate::core::StateHistory`] of completed transitions.
    pub record_history: bool,

    /// External lifecycle handle: cancelling it stops the machine.
    #[serde(skip)]
    pub signal: Option<ScopeToken>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            label: "machine".to_string(),
            max_delegation_depth: DEFAULT_MAX_DELEGATION_DEPTH,
            record_history: true,
            signal: None,
        }
    }
}

impl MachineConfig {
    pub fn with_signal(mut self, signal: &ScopeToken) -> Self {
        self.signal = Some(signal.clone());
        self
    }

    pub fn validate(&self) -> Result<(), BuildError> {
        if self.max_delegation_depth == 0 {
            return Err(BuildError::InvalidDelegationDepth);
        }
        Ok(())
    }
}
