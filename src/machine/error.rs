//! Errors surfaced by a running machine.

use crate::builder::BuildError;
use crate::core::DefinitionError;
use thiserror::Error;

/// Errors returned from `start` and from event-driven transitions.
#[derive(Debug, Error)]
pub enum MachineError {
    #[error(transparent)]
    Build(#[from] BuildError),

    /// The target state failed to yield or enter its directives. The
    /// machine is still in its previous state.
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    /// Entering the target failed, and entering the previous state again
    /// failed too. The machine has stopped.
    #[error("entering '{state}' failed ({cause}) and restoring '{previous}' failed: {source}")]
    RestoreFailed {
        state: String,
        previous: String,
        cause: DefinitionError,
        #[source]
        source: DefinitionError,
    },
}

impl MachineError {
    /// The definition error behind this failure, if any.
    pub fn definition(&self) -> Option<&DefinitionError> {
        match self {
            Self::Definition(error) => Some(error),
            Self::RestoreFailed { cause, .. } => Some(cause),
            Self::Build(_) => None,
        }
    }
}
