//! The machine controller: owns the current activation and drives
//! transitions.

use super::activation::Activation;
use super::error::MachineError;
use super::notify::{Snapshot, StateChanged, Status, STATE_CHANGED};
use super::router::{Resolution, RouteTable};
use crate::builder::{MachineBuilder, MachineConfig};
use crate::core::{
    BoxError, Collected, DefinitionError, StateDefinition, StateHistory, StateTransition, StepRunner,
};
use crate::diagnostics::DefinitionIssue;
use crate::events::{listener, Event, Handler, Registry, SourceId};
use crate::scope::{lock, ScopeManager, ScopeToken};
use chrono::Utc;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// What happened to one inbound event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// No transition applies, or the machine is not running.
    Ignored,
    /// A transition was in flight; the event will be routed after it.
    Queued,
    Transitioned { from: String, to: String },
}

struct Core<A> {
    status: Status,
    state: Arc<str>,
    aliases: Vec<String>,
    terminal: bool,
    accumulator: Option<A>,
    current: Option<Activation<A>>,
    history: StateHistory,
    sequence: u64,
}

impl<A: Clone> Core<A> {
    fn install(&mut self, activation: Activation<A>) {
        let collected = activation.collected();
        self.state = collected.shared_name();
        self.aliases = collected.aliases().map(str::to_string).collect();
        self.terminal = collected.is_terminal();
        self.accumulator = collected.accumulator().cloned();
        self.current = Some(activation);
    }
}

struct Inbox {
    pending: VecDeque<(SourceId, Event)>,
    draining: bool,
}

/// Hands out queued events while the current caller owns the inbox.
///
/// If routing panics the inbox is reset instead of staying claimed forever.
struct Drain<'a> {
    inbox: &'a Mutex<Inbox>,
    finished: bool,
}

impl Drain<'_> {
    fn next(&mut self) -> Option<(SourceId, Event)> {
        let mut inbox = lock(self.inbox);
        let next = inbox.pending.pop_front();
        if next.is_none() {
            inbox.draining = false;
            self.finished = true;
        }
        next
    }
}

impl Drop for Drain<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let mut inbox = lock(self.inbox);
            inbox.draining = false;
            inbox.pending.clear();
        }
    }
}

struct Shared<A> {
    id: Uuid,
    label: String,
    record_history: bool,
    runner: StepRunner,
    scopes: ScopeManager,
    core: Mutex<Core<A>>,
    inbox: Mutex<Inbox>,
    observers: Registry<StateChanged<A>>,
}

/// A running state machine.
///
/// `Machine` is a cheap handle; clones drive the same instance. Event
/// sources hold only weak references to it, so dropping every handle tears
/// the machine down and unsubscribes its listeners.
///
/// # Example
///
/// ```rust
/// use yieldmachine::builder::MachineConfig;
/// use yieldmachine::core::StateDefinition;
/// use yieldmachine::events::Emitter;
/// use yieldmachine::machine::Machine;
///
/// fn off(switch: Emitter) -> StateDefinition<bool> {
///     StateDefinition::new("Off", move |steps| {
///         steps
///             .accumulate(false)
///             .listen_to(&switch, ["toggle"])
///             .on("toggle", on(switch.clone()));
///         Ok(())
///     })
/// }
///
/// fn on(switch: Emitter) -> StateDefinition<bool> {
///     StateDefinition::new("On", move |steps| {
///         steps
///             .accumulate(true)
///             .listen_to(&switch, ["toggle"])
///             .on("toggle", off(switch.clone()));
///         Ok(())
///     })
/// }
///
/// let switch = Emitter::new("switch");
/// let machine = Machine::start(off(switch.clone()), MachineConfig::default()).unwrap();
/// assert_eq!(machine.state(), "Off");
///
/// switch.emit("toggle");
/// assert_eq!(machine.state(), "On");
/// assert_eq!(machine.accumulator(), Some(true));
///
/// machine.stop();
/// assert_eq!(switch.listener_count(), 0);
/// ```
pub struct Machine<A> {
    shared: Arc<Shared<A>>,
}

impl<A> Clone for Machine<A> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<A> fmt::Debug for Machine<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = lock(&self.shared.core);
        f.debug_struct("Machine")
            .field("id", &self.shared.id)
            .field("label", &self.shared.label)
            .field("state", &core.state)
            .field("status", &core.status)
            .finish()
    }
}

impl<A: Clone + Send + Sync + 'static> Machine<A> {
    pub fn builder() -> MachineBuilder<A> {
        MachineBuilder::new()
    }

    /// Enter `initial` and start routing events.
    ///
    /// The initial state's entry actions have run and its listeners are
    /// registered by the time this returns. Cancelling `config.signal` stops
    /// the machine.
    pub fn start(initial: StateDefinition<A>, config: MachineConfig) -> Result<Self, MachineError> {
        config.validate()?;
        let machine = Self::idle(&config);
        machine.enter_initial(&initial)?;

        if let Some(signal) = &config.signal {
            let weak = Arc::downgrade(&machine.shared);
            signal.on_cancel(move || {
                if let Some(shared) = weak.upgrade() {
                    Machine { shared }.stop();
                }
            });
        }
        Ok(machine)
    }

    fn idle(config: &MachineConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                id: Uuid::new_v4(),
                label: config.label.clone(),
                record_history: config.record_history,
                runner: StepRunner::new(config.max_delegation_depth),
                scopes: ScopeManager::new(),
                core: Mutex::new(Core {
                    status: Status::Idle,
                    state: Arc::from(""),
                    aliases: Vec::new(),
                    terminal: false,
                    accumulator: None,
                    current: None,
                    history: StateHistory::new(),
                    sequence: 0,
                }),
                inbox: Mutex::new(Inbox {
                    pending: VecDeque::new(),
                    draining: false,
                }),
                observers: Registry::new(),
            }),
        }
    }

    fn enter_initial(&self, initial: &StateDefinition<A>) -> Result<(), MachineError> {
        let collected = self.shared.runner.collect(initial)?;
        let activation = self.activate(collected)?;

        let stopped = {
            let mut core = lock(&self.shared.core);
            core.install(activation);
            info!(
                machine = %self.shared.id,
                label = %self.shared.label,
                state = %core.state,
                "machine started"
            );
            if core.status == Status::Stopped {
                core.current.take()
            } else {
                core.status = Status::Running;
                None
            }
        };
        if let Some(mut activation) = stopped {
            activation.release();
        }
        Ok(())
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn label(&self) -> &str {
        &self.shared.label
    }

    /// Name of the current state.
    pub fn state(&self) -> String {
        lock(&self.shared.core).state.to_string()
    }

    pub fn status(&self) -> Status {
        lock(&self.shared.core).status
    }

    /// The value accumulated by the current state, if it yielded one.
    pub fn accumulator(&self) -> Option<A> {
        lock(&self.shared.core).accumulator.clone()
    }

    /// Whether the current state has exited; such a state never transitions.
    pub fn is_terminal(&self) -> bool {
        lock(&self.shared.core).terminal
    }

    pub fn snapshot(&self) -> Snapshot<A> {
        let core = lock(&self.shared.core);
        Snapshot {
            machine: self.shared.id,
            state: core.state.to_string(),
            aliases: core.aliases.clone(),
            status: core.status,
            terminal: core.terminal,
            accumulator: core.accumulator.clone(),
            transitions: core.sequence,
        }
    }

    pub fn history(&self) -> StateHistory {
        lock(&self.shared.core).history.clone()
    }

    /// Listener registrations held by the current activation.
    pub fn subscription_count(&self) -> usize {
        lock(&self.shared.core)
            .current
            .as_ref()
            .filter(|activation| activation.is_live())
            .map_or(0, |activation| activation.routes().len())
    }

    /// Lifecycle counters of the scopes this machine has handed out.
    pub fn scopes(&self) -> &ScopeManager {
        &self.shared.scopes
    }

    /// Call `f` after every completed transition until `token` is cancelled.
    pub fn on_change<F>(&self, f: F, token: &ScopeToken)
    where
        F: Fn(&StateChanged<A>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.shared.observers.register(STATE_CHANGED, Arc::new(f), token);
    }

    /// An ordered stream of change notifications.
    ///
    /// The stream ends once `token` is cancelled or the machine is dropped.
    pub fn notifications(&self, token: &ScopeToken) -> mpsc::UnboundedReceiver<StateChanged<A>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared.observers.register(
            STATE_CHANGED,
            listener(move |change: &StateChanged<A>| {
                // A dropped receiver just means nobody is listening anymore.
                let _ = tx.send(change.clone());
                Ok(())
            }),
            token,
        );
        rx
    }

    /// Route an event from `source` against the current state.
    ///
    /// Events are handled one at a time. An event sent while a transition is
    /// in flight is queued and routed, against whatever state is then
    /// current, once that transition has completed.
    pub fn send(&self, source: SourceId, event: &Event) -> Result<Delivery, MachineError> {
        {
            let mut inbox = lock(&self.shared.inbox);
            if inbox.draining {
                inbox.pending.push_back((source, event.clone()));
                debug!(machine = %self.shared.id, kind = %event.kind, "event queued behind transition");
                return Ok(Delivery::Queued);
            }
            inbox.draining = true;
        }

        let mut drain = Drain {
            inbox: &self.shared.inbox,
            finished: false,
        };
        let result = self.route(source, event);
        while let Some((source, event)) = drain.next() {
            if let Err(error) = self.route(source, &event) {
                warn!(
                    machine = %self.shared.id,
                    kind = %event.kind,
                    %error,
                    "queued event failed to transition"
                );
            }
        }
        result
    }

    /// Release the current state and stop routing events. Idempotent.
    pub fn stop(&self) {
        let current = {
            let mut core = lock(&self.shared.core);
            if core.status == Status::Stopped {
                return;
            }
            core.status = Status::Stopped;
            core.current.take()
        };
        if let Some(mut activation) = current {
            activation.release();
        }
        lock(&self.shared.inbox).pending.clear();
        info!(machine = %self.shared.id, label = %self.shared.label, "machine stopped");
    }

    fn route(&self, source: SourceId, event: &Event) -> Result<Delivery, MachineError> {
        let target = {
            let core = lock(&self.shared.core);
            if core.status != Status::Running {
                return Ok(Delivery::Ignored);
            }
            let Some(current) = core.current.as_ref() else {
                return Ok(Delivery::Ignored);
            };
            if core.terminal {
                debug!(machine = %self.shared.id, state = %core.state, kind = %event.kind, "terminal state; event ignored");
                return Ok(Delivery::Ignored);
            }
            let resolution = current.routes().resolve(source, &event.kind);
            let target = match resolution {
                Resolution::Unmatched => {
                    debug!(machine = %self.shared.id, state = %core.state, kind = %event.kind, "no transition for event");
                    return Ok(Delivery::Ignored);
                }
                Resolution::Matched(target) => target.clone(),
                Resolution::Ambiguous { chosen, candidates } => {
                    let issue = DefinitionIssue::AmbiguousTransition {
                        state: core.state.to_string(),
                        event_type: event.kind.clone(),
                        candidates: candidates.iter().map(|name| name.to_string()).collect(),
                    };
                    warn!(machine = %self.shared.id, %issue, "ambiguous transition");
                    chosen.clone()
                }
            };
            target
        };
        self.transition(&target, Some(&event.kind))
    }

    fn transition(&self, target: &StateDefinition<A>, event: Option<&str>) -> Result<Delivery, MachineError> {
        // Collecting has no side effects, so a failing definition leaves the
        // current activation exactly as it was.
        let collected = self.shared.runner.collect(target).map_err(|error| {
            warn!(machine = %self.shared.id, %error, "target state failed to yield directives");
            error
        })?;

        let previous = {
            let mut core = lock(&self.shared.core);
            if core.status != Status::Running {
                return Ok(Delivery::Ignored);
            }
            core.current.take()
        };
        let Some(mut previous) = previous else {
            return Ok(Delivery::Ignored);
        };

        previous.release();
        debug!(machine = %self.shared.id, state = %previous.collected().name(), "scope released");

        let state = collected.name().to_string();
        match self.activate(collected) {
            Ok(activation) => self.commit(activation, event),
            Err(cause) => self.restore(previous, state, cause),
        }
    }

    /// Acquire a scope, run entry actions, then register listeners.
    fn activate(&self, collected: Collected<A>) -> Result<Activation<A>, DefinitionError> {
        let mut scope = self.shared.scopes.acquire();
        if let Err(error) = self.shared.runner.enter(&collected, scope.token()) {
            scope.release();
            return Err(error);
        }

        let routes = RouteTable::build(collected.directives());
        for route in routes.routes() {
            route
                .source()
                .subscribe(route.event_type(), self.route_handler(route.source_id()), scope.token());
        }
        debug!(
            machine = %self.shared.id,
            state = %collected.name(),
            routes = routes.len(),
            "state entered"
        );
        Ok(Activation::new(collected, routes, scope))
    }

    fn route_handler(&self, source: SourceId) -> Handler {
        let weak = Arc::downgrade(&self.shared);
        listener(move |event: &Event| {
            let Some(shared) = weak.upgrade() else {
                return Ok(());
            };
            Machine { shared }
                .send(source, event)
                .map(|_| ())
                .map_err(|error| Box::new(error) as BoxError)
        })
    }

    fn commit(&self, activation: Activation<A>, event: Option<&str>) -> Result<Delivery, MachineError> {
        let mut core = lock(&self.shared.core);
        if core.status != Status::Running {
            drop(core);
            let mut orphan = activation;
            orphan.release();
            return Ok(Delivery::Ignored);
        }

        let previous = core.state.to_string();
        core.sequence += 1;
        core.install(activation);
        if self.shared.record_history {
            let history = core.history.record(StateTransition {
                from: previous.clone(),
                to: core.state.to_string(),
                event: event.map(str::to_string),
                timestamp: Utc::now(),
            });
            core.history = history;
        }
        let change = StateChanged {
            machine: self.shared.id,
            sequence: core.sequence,
            previous,
            state: core.state.to_string(),
            aliases: core.aliases.clone(),
            event: event.map(str::to_string),
            accumulator: core.accumulator.clone(),
        };
        drop(core);

        info!(
            machine = %self.shared.id,
            from = %change.previous,
            to = %change.state,
            event = ?change.event,
            "transitioned"
        );
        self.shared.observers.dispatch(STATE_CHANGED, &change);
        Ok(Delivery::Transitioned {
            from: change.previous,
            to: change.state,
        })
    }

    /// Enter the previous state again after its successor failed to enter.
    ///
    /// Observers are not notified: from the outside the machine never left.
    fn restore(&self, previous: Activation<A>, state: String, cause: DefinitionError) -> Result<Delivery, MachineError> {
        let previous_name = previous.collected().name().to_string();
        warn!(
            machine = %self.shared.id,
            state = %state,
            previous = %previous_name,
            error = %cause,
            "entering state failed; restoring previous state"
        );

        match self.activate(previous.into_collected()) {
            Ok(restored) => {
                let mut core = lock(&self.shared.core);
                if core.status == Status::Running {
                    core.current = Some(restored);
                } else {
                    drop(core);
                    let mut orphan = restored;
                    orphan.release();
                }
                Err(MachineError::Definition(cause))
            }
            Err(source) => {
                error!(
                    machine = %self.shared.id,
                    previous = %previous_name,
                    error = %source,
                    "restoring previous state failed; stopping machine"
                );
                self.stop();
                Err(MachineError::RestoreFailed {
                    state,
                    previous: previous_name,
                    cause,
                    source,
                })
            }
        }
    }
}
