//! Problems a state definition can have.

use thiserror::Error;

/// A recoverable problem in a state's directives.
///
/// None of these stop a machine; they describe definitions whose behavior
/// is well defined but probably not what the author meant.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DefinitionIssue {
    /// Several `On` directives name the same event; the first declared wins.
    #[error(
        "state '{state}' declares {} transitions on '{event_type}' ({}); the first declared wins",
        candidates.len(),
        candidates.join(", ")
    )]
    AmbiguousTransition {
        state: String,
        event_type: String,
        candidates: Vec<String>,
    },

    /// An `On` directive names an event no `ListenTo` covers, so it can
    /// never fire.
    #[error("state '{state}' transitions on '{event_type}' but never listens for it")]
    UnlistenedTransition { state: String, event_type: String },

    /// A state marked `Exit` also declares transitions, which are ignored.
    #[error("terminal state '{state}' declares transitions on {}", event_types.join(", "))]
    TerminalWithTransitions {
        state: String,
        event_types: Vec<String>,
    },

    #[error("state '{state}' could not be collected: {reason}")]
    Uncollectable { state: String, reason: String },
}
