//! In-memory event target.

use super::registry::{DispatchReport, Registry};
use super::{Event, EventSource, Handler, SourceId};
use crate::core::BoxError;
use crate::scope::ScopeToken;
use std::sync::Arc;
use tracing::trace;

/// A synchronous, in-process event target.
///
/// `Emitter` plays the role an element or window plays in a UI: application
/// code adds listeners to it, the environment dispatches named events on it,
/// and states `listen_to` it. Clones share listeners and identity.
///
/// # Example
///
/// ```rust
/// use yieldmachine::events::{Emitter, Event};
/// use yieldmachine::scope::Scope;
///
/// let button = Emitter::new("button");
/// let mut scope = Scope::new();
///
/// button.add_listener("click", |_event| Ok(()), scope.token());
/// assert_eq!(button.listener_count(), 1);
///
/// scope.release();
/// assert_eq!(button.listener_count(), 0);
/// assert_eq!(button.dispatch(&Event::new("click")).delivered, 0);
/// ```
#[derive(Clone)]
pub struct Emitter {
    id: SourceId,
    label: Arc<str>,
    registry: Registry<Event>,
}

impl Emitter {
    pub fn new(label: impl Into<String>) -> Self {
        let label: String = label.into();
        Self {
            id: SourceId::new(),
            label: Arc::from(label),
            registry: Registry::new(),
        }
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    /// Listen for `event_type` until `token` is cancelled.
    pub fn add_listener<F>(&self, event_type: &str, f: F, token: &ScopeToken)
    where
        F: Fn(&Event) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.registry.register(event_type, Arc::new(f), token);
    }

    /// Deliver `event` to every live listener for its kind, in registration
    /// order.
    pub fn dispatch(&self, event: &Event) -> DispatchReport {
        trace!(source = %self.label, kind = %event.kind, "dispatching event");
        self.registry.dispatch(&event.kind, event)
    }

    /// Shorthand for dispatching a payload-free event.
    pub fn emit(&self, kind: &str) -> DispatchReport {
        self.dispatch(&Event::new(kind))
    }

    /// Live listeners across all event types.
    pub fn listener_count(&self) -> usize {
        self.registry.len()
    }

    pub fn listener_count_for(&self, event_type: &str) -> usize {
        self.registry.len_for(event_type)
    }
}

impl std::fmt::Debug for Emitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl EventSource for Emitter {
    fn source_id(&self) -> SourceId {
        self.id
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn subscribe(&self, event_type: &str, handler: Handler, token: &ScopeToken) {
        self.registry.register(event_type, handler, token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Scope;
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn dispatch_reaches_matching_listeners_only() {
        let emitter = Emitter::new("el");
        let scope = Scope::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&seen);
        emitter.add_listener(
            "pointerdown",
            move |event| {
                log.lock().unwrap().push(event.detail.clone());
                Ok(())
            },
            scope.token(),
        );

        emitter.dispatch(&Event::new("pointerdown").with_detail(json!({ "x": 3 })));
        emitter.emit("pointerup");

        assert_eq!(*seen.lock().unwrap(), vec![json!({ "x": 3 })]);
        assert_eq!(emitter.listener_count_for("pointerdown"), 1);
    }

    #[test]
    fn clones_share_listeners_and_identity() {
        let emitter = Emitter::new("el");
        let clone = emitter.clone();
        let scope = Scope::new();

        clone.add_listener("x", |_| Ok(()), scope.token());

        assert_eq!(emitter.id(), clone.id());
        assert_eq!(emitter.listener_count(), 1);
        assert_eq!(EventSource::label(&emitter), "el");
    }

    #[test]
    fn listener_added_during_dispatch_waits_for_next_event() {
        let emitter = Emitter::new("el");
        let scope = Scope::new();
        let late_calls = Arc::new(Mutex::new(0));

        let target = emitter.clone();
        let token = scope.token().clone();
        let calls = Arc::clone(&late_calls);
        emitter.add_listener(
            "go",
            move |_| {
                let calls = Arc::clone(&calls);
                target.add_listener(
                    "go",
                    move |_| {
                        *calls.lock().unwrap() += 1;
                        Ok(())
                    },
                    &token,
                );
                Ok(())
            },
            scope.token(),
        );

        emitter.emit("go");
        assert_eq!(*late_calls.lock().unwrap(), 0);

        emitter.emit("go");
        assert_eq!(*late_calls.lock().unwrap(), 1);
    }
}
