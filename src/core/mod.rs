//! The declarative vocabulary of a state machine.
//!
//! This module contains everything an application author touches to define
//! states:
//! - `StateDefinition`: a named body that yields directives
//! - `Directive` and the `Steps` collector bodies write into
//! - The `StepRunner` that turns a definition into its directive list
//! - Immutable transition history
//!
//! Nothing here subscribes to sources or owns a running machine; that is the
//! job of [`crate::machine`].

mod definition;
mod error;
mod history;
mod runner;

pub use definition::{Directive, EntryAction, StateDefinition, Steps};
pub use error::DefinitionError;
pub use history::{StateHistory, StateTransition};
pub use runner::{Collected, StepRunner, DEFAULT_MAX_DELEGATION_DEPTH};

/// Error type returned by user-supplied callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
