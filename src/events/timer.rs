//! Virtual-clock timer source.
//!
//! There is no dedicated timeout concept in the engine. A state that needs
//! one arms a timer from its entry action with the activation's token and
//! listens to the timer like any other source; leaving the state disarms it.

use super::registry::DispatchReport;
use super::{Emitter, Event, EventSource, Handler, SourceId};
use crate::scope::{lock, ScopeToken};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

struct Pending {
    seq: u64,
    /// `None` when the due time lies past the end of the clock; such a
    /// timer never fires.
    due: Option<Duration>,
    kind: String,
    token: ScopeToken,
}

struct Fired {
    kind: String,
    token: ScopeToken,
    due: Duration,
}

#[derive(Default)]
struct Clock {
    now: Duration,
    next_seq: u64,
    pending: Vec<Pending>,
}

/// Event source whose events fire when its clock is advanced.
#[derive(Clone)]
pub struct Timer {
    emitter: Emitter,
    clock: Arc<Mutex<Clock>>,
}

impl Timer {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            emitter: Emitter::new(label),
            clock: Arc::new(Mutex::new(Clock::default())),
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        lock(&self.clock).now
    }

    /// Fire `kind` once `after` has elapsed, unless `token` is cancelled
    /// first. A delay that overflows the clock never fires.
    pub fn arm(&self, kind: &str, after: Duration, token: &ScopeToken) {
        if token.is_cancelled() {
            return;
        }
        let seq = {
            let mut clock = lock(&self.clock);
            let seq = clock.next_seq;
            clock.next_seq += 1;
            let due = clock.now.checked_add(after);
            clock.pending.push(Pending {
                seq,
                due,
                kind: kind.to_string(),
                token: token.clone(),
            });
            seq
        };

        let weak = Arc::downgrade(&self.clock);
        token.on_cancel(move || {
            if let Some(clock) = weak.upgrade() {
                lock(&clock).pending.retain(|pending| pending.seq != seq);
            }
        });
    }

    /// Move the clock forward, firing due timers in (due, arming) order.
    ///
    /// The clock saturates at `Duration::MAX`.
    pub fn advance(&self, by: Duration) -> DispatchReport {
        let target = self.now().saturating_add(by);
        let mut report = DispatchReport::default();

        while let Some(next) = self.take_due(target) {
            if next.token.is_cancelled() {
                continue;
            }
            debug!(timer = %EventSource::label(&self.emitter), kind = %next.kind, "timer fired");
            let elapsed_ms = u64::try_from(next.due.as_millis()).unwrap_or(u64::MAX);
            let event = Event::new(next.kind).with_detail(json!({ "elapsed_ms": elapsed_ms }));
            report.absorb(self.emitter.dispatch(&event));
        }

        lock(&self.clock).now = target;
        report
    }

    /// Timers armed and not yet fired or disarmed.
    pub fn pending_count(&self) -> usize {
        lock(&self.clock).pending.len()
    }

    pub fn listener_count(&self) -> usize {
        self.emitter.listener_count()
    }

    fn take_due(&self, target: Duration) -> Option<Fired> {
        let mut clock = lock(&self.clock);
        let index = clock
            .pending
            .iter()
            .enumerate()
            .filter_map(|(index, pending)| Some((index, pending.due?, pending.seq)))
            .filter(|(_, due, _)| *due <= target)
            .min_by_key(|(_, due, seq)| (*due, *seq))
            .map(|(index, _, _)| index)?;
        let pending = clock.pending.remove(index);
        let due = pending.due?;
        clock.now = due;
        Some(Fired {
            kind: pending.kind,
            token: pending.token,
            due,
        })
    }
}

impl EventSource for Timer {
    fn source_id(&self) -> SourceId {
        self.emitter.id()
    }

    fn label(&self) -> &str {
        EventSource::label(&self.emitter)
    }

    fn subscribe(&self, event_type: &str, handler: Handler, token: &ScopeToken) {
        self.emitter.subscribe(event_type, handler, token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::listener;
    use crate::scope::Scope;

    fn record(timer: &Timer, kind: &str, token: &ScopeToken) -> Arc<Mutex<Vec<u64>>> {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&fired);
        timer.subscribe(
            kind,
            listener(move |event: &Event| {
                log.lock().unwrap().push(event.detail["elapsed_ms"].as_u64().unwrap_or(0));
                Ok(())
            }),
            token,
        );
        fired
    }

    #[test]
    fn fires_once_when_due() {
        let timer = Timer::new("timer");
        let scope = Scope::new();
        let fired = record(&timer, "timeout", scope.token());

        timer.arm("timeout", Duration::from_millis(100), scope.token());
        timer.advance(Duration::from_millis(50));
        assert!(fired.lock().unwrap().is_empty());

        timer.advance(Duration::from_millis(50));
        timer.advance(Duration::from_millis(500));
        assert_eq!(*fired.lock().unwrap(), vec![100]);
        assert_eq!(timer.pending_count(), 0);
        assert_eq!(timer.now(), Duration::from_millis(600));
    }

    #[test]
    fn cancelled_scope_disarms_timer() {
        let timer = Timer::new("timer");
        let listening = Scope::new();
        let fired = record(&timer, "timeout", listening.token());

        let mut armed = Scope::new();
        timer.arm("timeout", Duration::from_millis(10), armed.token());
        armed.release();

        assert_eq!(timer.pending_count(), 0);
        timer.advance(Duration::from_secs(1));
        assert!(fired.lock().unwrap().is_empty());
    }

    #[test]
    fn fires_in_due_order() {
        let timer = Timer::new("timer");
        let scope = Scope::new();
        let fired = record(&timer, "tick", scope.token());

        timer.arm("tick", Duration::from_millis(30), scope.token());
        timer.arm("tick", Duration::from_millis(10), scope.token());
        timer.arm("tick", Duration::from_millis(20), scope.token());
        timer.advance(Duration::from_millis(30));

        assert_eq!(*fired.lock().unwrap(), vec![10, 20, 30]);
    }

    #[test]
    fn overflowing_delay_is_never_due() {
        let timer = Timer::new("timer");
        let scope = Scope::new();
        let fired = record(&timer, "never", scope.token());

        timer.advance(Duration::from_millis(1));
        timer.arm("never", Duration::MAX, scope.token());
        timer.advance(Duration::MAX);

        assert!(fired.lock().unwrap().is_empty());
        assert_eq!(timer.pending_count(), 1);
        assert_eq!(timer.now(), Duration::MAX);
    }

    #[test]
    fn advance_saturates_at_end_of_clock() {
        let timer = Timer::new("timer");
        let scope = Scope::new();
        let fired = record(&timer, "tick", scope.token());

        timer.arm("tick", Duration::from_millis(10), scope.token());
        timer.advance(Duration::from_secs(1));
        timer.advance(Duration::MAX);
        timer.advance(Duration::from_secs(1));

        assert_eq!(*fired.lock().unwrap(), vec![10]);
        assert_eq!(timer.now(), Duration::MAX);
    }

    #[test]
    fn elapsed_millis_clamp_instead_of_wrapping() {
        let timer = Timer::new("timer");
        let scope = Scope::new();
        let fired = record(&timer, "late", scope.token());

        timer.arm("late", Duration::from_secs(u64::MAX), scope.token());
        timer.advance(Duration::MAX);

        assert_eq!(*fired.lock().unwrap(), vec![u64::MAX]);
    }
}
