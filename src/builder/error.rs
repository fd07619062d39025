//! Build errors for machine configuration.

use thiserror::Error;

/// Errors that can occur when configuring or starting a machine.
#[derive(Debug, Error, PartialEq)]
pub enum BuildError {
    #[error("Initial state not specified. Call .initial(state) before .start()")]
    MissingInitialState,

    #[error("Delegation depth must be at least 1")]
    InvalidDelegationDepth,
}
