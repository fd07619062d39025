//! Scoped cancellation for state activations.
//!
//! Every activation owns exactly one [`Scope`]. Resources acquired while the
//! activation is current (event subscriptions, timers, anything an entry
//! action sets up) hang their teardown off the scope's [`ScopeToken`]. When
//! the controller releases the scope, every registered teardown runs once, in
//! registration order, and the token reports cancelled from then on.
//!
//! The split between [`Scope`] and [`ScopeToken`] mirrors ownership: only the
//! holder of the `Scope` can release it, while entry actions and event
//! sources only ever see the token.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type Teardown = Box<dyn FnOnce() + Send>;

struct TokenInner {
    cancelled: AtomicBool,
    teardowns: Mutex<Vec<Teardown>>,
}

/// Observer side of a [`Scope`].
///
/// Cloning a token is cheap and every clone observes the same cancellation.
#[derive(Clone)]
pub struct ScopeToken {
    inner: Arc<TokenInner>,
}

impl ScopeToken {
    fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                teardowns: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Whether the owning scope has been released.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Register a teardown to run when the scope is released.
    ///
    /// If the scope is already released the teardown runs immediately, so a
    /// resource registered late is never leaked.
    pub fn on_cancel<F>(&self, teardown: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut teardowns = lock(&self.inner.teardowns);
            if !self.is_cancelled() {
                teardowns.push(Box::new(teardown));
                return;
            }
        }
        teardown();
    }

    /// Whether two tokens belong to the same scope.
    pub fn same_scope(&self, other: &ScopeToken) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn cancel(&self) -> bool {
        let teardowns = {
            let mut teardowns = lock(&self.inner.teardowns);
            if self.inner.cancelled.swap(true, Ordering::AcqRel) {
                return false;
            }
            std::mem::take(&mut *teardowns)
        };
        // Teardowns may touch other locks (registries, the machine), so they
        // run with the token lock released.
        for teardown in teardowns {
            teardown();
        }
        true
    }

    #[cfg(test)]
    pub(crate) fn pending_teardowns(&self) -> usize {
        lock(&self.inner.teardowns).len()
    }
}

impl fmt::Debug for ScopeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Owning side of a cancellation scope.
///
/// Dropping an unreleased scope releases it.
#[derive(Debug)]
pub struct Scope {
    token: ScopeToken,
    released: bool,
    stats: Option<Arc<ScopeStats>>,
}

impl Scope {
    /// Create a standalone scope, e.g. as the external lifecycle handle of a
    /// machine.
    pub fn new() -> Self {
        Self {
            token: ScopeToken::new(),
            released: false,
            stats: None,
        }
    }

    /// The token handed to resources bound to this scope.
    pub fn token(&self) -> &ScopeToken {
        &self.token
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Fire the cancellation signal. Idempotent: only the first call runs
    /// teardowns.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if self.token.cancel() {
            if let Some(stats) = &self.stats {
                stats.released.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        self.release();
    }
}

#[derive(Debug, Default)]
struct ScopeStats {
    acquired: AtomicUsize,
    released: AtomicUsize,
}

/// Hands out activation scopes and counts their lifecycle.
#[derive(Debug, Clone, Default)]
pub struct ScopeManager {
    stats: Arc<ScopeStats>,
}

impl ScopeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a fresh scope with an uncancelled token.
    pub fn acquire(&self) -> Scope {
        self.stats.acquired.fetch_add(1, Ordering::Relaxed);
        Scope {
            token: ScopeToken::new(),
            released: false,
            stats: Some(Arc::clone(&self.stats)),
        }
    }

    /// Release a scope. Releasing twice is a no-op.
    pub fn release(&self, scope: &mut Scope) {
        scope.release();
    }

    /// Number of scopes acquired so far.
    pub fn acquired(&self) -> usize {
        self.stats.acquired.load(Ordering::Relaxed)
    }

    /// Number of scopes released so far.
    pub fn released(&self) -> usize {
        self.stats.released.load(Ordering::Relaxed)
    }

    /// Scopes acquired but not yet released.
    pub fn live(&self) -> usize {
        self.acquired().saturating_sub(self.released())
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    // A panicking user callback must not wedge the engine.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
