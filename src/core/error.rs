//! Errors raised while producing or entering a state's directives.

use super::BoxError;
use thiserror::Error;

/// Failure of a state definition to yield or enter its directives.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// The body raised while yielding directives.
    #[error("state '{state}' failed while yielding directives: {source}")]
    DefinitionFailure {
        state: String,
        #[source]
        source: BoxError,
    },

    /// An entry action raised while the state was being entered.
    #[error("entry action of state '{state}' failed: {source}")]
    EntryFailure {
        state: String,
        #[source]
        source: BoxError,
    },

    #[error("delegation cycle: {}", chain.join(" -> "))]
    DelegationCycle { chain: Vec<String> },

    #[error("delegating into '{state}' exceeds the depth limit of {limit}")]
    DelegationTooDeep { state: String, limit: usize },
}

impl DefinitionError {
    /// Tag an error raised by the body of `state`.
    ///
    /// Errors that already carry a state (raised further down a delegation
    /// chain) keep their original tag.
    pub(crate) fn from_body(state: &str, source: BoxError) -> Self {
        match source.downcast::<DefinitionError>() {
            Ok(inner) => *inner,
            Err(source) => Self::DefinitionFailure {
                state: state.to_string(),
                source,
            },
        }
    }

    /// Name of the state the failure is attributed to, when there is one.
    pub fn state(&self) -> Option<&str> {
        match self {
            Self::DefinitionFailure { state, .. }
            | Self::EntryFailure { state, .. }
            | Self::DelegationTooDeep { state, .. } => Some(state),
            Self::DelegationCycle { .. } => None,
        }
    }
}
