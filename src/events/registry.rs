//! Token-scoped listener registry shared by emitters and machine observers.

use crate::core::BoxError;
use crate::scope::{lock, ScopeToken};
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Callback registered for a topic.
pub type Listener<T> = Arc<dyn Fn(&T) -> Result<(), BoxError> + Send + Sync>;

/// Box a closure as a [`Listener`].
pub fn listener<T, F>(f: F) -> Listener<T>
where
    F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
{
    Arc::new(f)
}

struct Registration<T> {
    id: u64,
    topic: String,
    token: ScopeToken,
    listener: Listener<T>,
}

struct Inner<T> {
    next_id: u64,
    entries: Vec<Registration<T>>,
}

/// Outcome of delivering one value to every matching listener.
///
/// Listener failures are isolated: one failing listener does not keep the
/// others from running.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failures: Vec<BoxError>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub(crate) fn absorb(&mut self, other: DispatchReport) {
        self.delivered += other.delivered;
        self.failures.extend(other.failures);
    }
}

pub(crate) struct Registry<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for Registry<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Registry<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Register `listener` under `topic` until `token` is cancelled.
    ///
    /// Returns `false` without registering when the token is already
    /// cancelled.
    pub(crate) fn register(&self, topic: &str, listener: Listener<T>, token: &ScopeToken) -> bool {
        if token.is_cancelled() {
            return false;
        }

        let id = {
            let mut inner = lock(&self.inner);
            let id = inner.next_id;
            inner.next_id += 1;
            inner.entries.push(Registration {
                id,
                topic: topic.to_string(),
                token: token.clone(),
                listener,
            });
            id
        };

        let weak = Arc::downgrade(&self.inner);
        token.on_cancel(move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner).entries.retain(|entry| entry.id != id);
            }
        });
        true
    }

    /// Deliver `value` to every listener registered under `topic`, in
    /// registration order.
    ///
    /// The listener list is snapshotted first, so listeners added during the
    /// dispatch only see later values. A listener whose token is cancelled
    /// mid-dispatch is skipped.
    pub(crate) fn dispatch(&self, topic: &str, value: &T) -> DispatchReport {
        let snapshot: Vec<(ScopeToken, Listener<T>)> = lock(&self.inner)
            .entries
            .iter()
            .filter(|entry| entry.topic == topic)
            .map(|entry| (entry.token.clone(), Arc::clone(&entry.listener)))
            .collect();

        let mut report = DispatchReport::default();
        for (token, listener) in snapshot {
            if token.is_cancelled() {
                continue;
            }
            report.delivered += 1;
            if let Err(error) = listener(value) {
                warn!(topic, %error, "listener failed; continuing with remaining listeners");
                report.failures.push(error);
            }
        }
        report
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.inner).entries.len()
    }

    pub(crate) fn len_for(&self, topic: &str) -> usize {
        lock(&self.inner)
            .entries
            .iter()
            .filter(|entry| entry.topic == topic)
            .count()
    }
}
