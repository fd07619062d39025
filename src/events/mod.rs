//! Event sources a state can listen to.
//!
//! The engine only needs one capability from the outside world: something
//! that accepts `subscribe(event_type, handler, token)` and stops delivering
//! once the token is cancelled. [`EventSource`] captures that contract;
//! [`Emitter`] and [`Timer`] are in-memory implementations used by hosts and
//! tests alike.

mod emitter;
mod registry;
mod timer;

pub use emitter::Emitter;
pub use registry::{listener, DispatchReport, Listener};
pub use timer::Timer;

pub(crate) use registry::Registry;

use crate::scope::ScopeToken;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable identity of an event source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(Uuid);

impl SourceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named event with an optional structured payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub kind: String,
    #[serde(default)]
    pub detail: serde_json::Value,
}

impl Event {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            detail: serde_json::Value::Null,
        }
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = detail;
        self
    }
}

/// Handler invoked for each delivered event.
pub type Handler = Listener<Event>;

/// Anything a state can `listen_to`.
///
/// Implementations must honor the token: once it is cancelled no new
/// delivery to `handler` may start. A delivery already in progress may
/// finish.
pub trait EventSource: Send + Sync {
    fn source_id(&self) -> SourceId;

    /// Human-readable name used in logs.
    fn label(&self) -> &str {
        "source"
    }

    fn subscribe(&self, event_type: &str, handler: Handler, token: &ScopeToken);
}
