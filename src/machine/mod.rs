//! The running machine.
//!
//! This module is the imperative shell around [`crate::core`]: it owns the
//! current activation, subscribes the activation's listeners, routes inbound
//! events to transitions and publishes change notifications.
//!
//! A transition runs in a fixed order:
//! 1. collect the target's directives (no side effects yet)
//! 2. release the current activation's scope
//! 3. acquire a new scope and run the target's entry actions
//! 4. subscribe the target's listeners
//! 5. install the new activation and notify observers

mod activation;
mod controller;
mod error;
mod notify;
mod router;

pub use controller::{Delivery, Machine};
pub use error::MachineError;
pub use notify::{Snapshot, StateChanged, Status, STATE_CHANGED};
pub use router::{Resolution, Route, RouteTable};
