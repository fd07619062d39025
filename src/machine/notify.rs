//! What observers of a machine get to see.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Topic under which change notifications are published.
pub const STATE_CHANGED: &str = "StateChanged";

/// Lifecycle of the machine itself, independent of user-defined states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Idle,
    Running,
    Stopped,
}

/// Published once per completed transition, after the new state's entry
/// actions have run and its listeners are registered.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateChanged<A> {
    pub machine: Uuid,
    /// 1 for the first transition after start, increasing by one.
    pub sequence: u64,
    pub previous: String,
    pub state: String,
    /// Alias definitions the transition passed through, outermost first.
    pub aliases: Vec<String>,
    /// Event type that triggered the transition.
    pub event: Option<String>,
    /// The new state's accumulated value, if it yielded one.
    pub accumulator: Option<A>,
}

/// Point-in-time view of a machine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<A> {
    pub machine: Uuid,
    pub state: String,
    pub aliases: Vec<String>,
    pub status: Status,
    pub terminal: bool,
    pub accumulator: Option<A>,
    pub transitions: u64,
}
