//! State definitions and the directives they yield.

use super::error::DefinitionError;
use super::BoxError;
use crate::events::EventSource;
use crate::scope::ScopeToken;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Callback run once when its state is entered.
///
/// It receives the activation's token; anything it sets up should be tied to
/// that token so it is torn down when the state is left.
pub type EntryAction = Arc<dyn Fn(&ScopeToken) -> Result<(), BoxError> + Send + Sync>;

type Body<A> = Arc<dyn Fn(&mut Steps<A>) -> Result<(), BoxError> + Send + Sync>;

/// One instruction yielded by a state definition.
pub enum Directive<A> {
    /// Run a callback when the state is entered.
    Entry(EntryAction),
    /// Events of these types on `source` are relevant while the state is
    /// current.
    ListenTo {
        source: Arc<dyn EventSource>,
        event_types: BTreeSet<String>,
    },
    /// Receiving `event_type` moves the machine to `target`.
    On {
        event_type: String,
        target: StateDefinition<A>,
    },
    /// Replace the machine's accumulator.
    Accumulate(A),
    /// The state is terminal.
    Exit,
}

impl<A: fmt::Debug> fmt::Debug for Directive<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entry(_) => f.write_str("Entry(..)"),
            Self::ListenTo {
                source,
                event_types,
            } => f
                .debug_struct("ListenTo")
                .field("source", &source.label())
                .field("event_types", event_types)
                .finish(),
            Self::On { event_type, target } => f
                .debug_struct("On")
                .field("event_type", event_type)
                .field("target", &target.name())
                .finish(),
            Self::Accumulate(value) => f.debug_tuple("Accumulate").field(value).finish(),
            Self::Exit => f.write_str("Exit"),
        }
    }
}

/// A named procedure that yields directives when a state is entered.
///
/// Bodies run lazily, once per activation, so definitions may refer to each
/// other in cycles (`Up` targets `Down`, which eventually targets `Up`).
///
/// # Example
///
/// ```rust
/// use yieldmachine::core::StateDefinition;
/// use yieldmachine::events::Emitter;
///
/// fn idle(button: Emitter) -> StateDefinition<()> {
///     StateDefinition::new("Idle", move |steps| {
///         steps
///             .listen_to(&button, ["click"])
///             .on("click", busy(button.clone()));
///         Ok(())
///     })
/// }
///
/// fn busy(button: Emitter) -> StateDefinition<()> {
///     StateDefinition::new("Busy", move |steps| {
///         steps.listen_to(&button, ["done"]).on("done", idle(button.clone()));
///         Ok(())
///     })
/// }
///
/// let start = idle(Emitter::new("button"));
/// assert_eq!(start.name(), "Idle");
/// ```
pub struct StateDefinition<A> {
    name: Arc<str>,
    body: Body<A>,
}

impl<A> Clone for StateDefinition<A> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            body: Arc::clone(&self.body),
        }
    }
}

impl<A> fmt::Debug for StateDefinition<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateDefinition")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<A> StateDefinition<A> {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut Steps<A>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let name: String = name.into();
        Self {
            name: Arc::from(name),
            body: Arc::new(body),
        }
    }

    /// A definition whose whole body continues as `target`.
    ///
    /// Entering an alias is indistinguishable from entering `target`: the
    /// activation takes the target's name and no intermediate state is
    /// observable.
    pub fn alias(name: impl Into<String>, target: StateDefinition<A>) -> Self
    where
        A: 'static,
    {
        Self::new(name, move |steps| steps.continue_as(&target))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn shared_name(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    pub(crate) fn run(&self, steps: &mut Steps<A>) -> Result<(), BoxError> {
        (self.body)(steps)
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Resolved {
    pub(crate) name: Arc<str>,
    pub(crate) aliases: Vec<Arc<str>>,
}

struct Frame<A> {
    name: Arc<str>,
    body: Body<A>,
    own: usize,
    delegates: Vec<Resolved>,
}

impl<A> Frame<A> {
    fn new(definition: &StateDefinition<A>) -> Self {
        Self {
            name: definition.shared_name(),
            body: Arc::clone(&definition.body),
            own: 0,
            delegates: Vec::new(),
        }
    }

    /// A frame that yielded nothing itself and continued as exactly one
    /// definition is an alias for that definition.
    fn resolve(self) -> Resolved {
        if self.own == 0 && self.delegates.len() == 1 {
            if let Some(delegate) = self.delegates.into_iter().next() {
                let mut aliases = vec![self.name];
                aliases.extend(delegate.aliases);
                return Resolved {
                    name: delegate.name,
                    aliases,
                };
            }
        }
        Resolved {
            name: self.name,
            aliases: Vec::new(),
        }
    }
}

/// Collector handed to a definition body.
///
/// Each method records one directive in declaration order and returns the
/// collector so calls can be chained.
pub struct Steps<A> {
    directives: Vec<Directive<A>>,
    frames: Vec<Frame<A>>,
    max_depth: usize,
}

impl<A> Steps<A> {
    pub(crate) fn new(root: &StateDefinition<A>, max_depth: usize) -> Self {
        Self {
            directives: Vec::new(),
            frames: vec![Frame::new(root)],
            max_depth,
        }
    }

    fn push(&mut self, directive: Directive<A>) -> &mut Self {
        if let Some(frame) = self.frames.last_mut() {
            frame.own += 1;
        }
        self.directives.push(directive);
        self
    }

    /// Run `action` when the state is entered.
    pub fn entry<F>(&mut self, action: F) -> &mut Self
    where
        F: Fn(&ScopeToken) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.push(Directive::Entry(Arc::new(action)))
    }

    /// Listen to `event_types` on `source` while the state is current.
    pub fn listen_to<S, I, T>(&mut self, source: &S, event_types: I) -> &mut Self
    where
        S: EventSource + Clone + 'static,
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.listen_to_shared(Arc::new(source.clone()), event_types)
    }

    /// Like [`Steps::listen_to`] for sources already behind an `Arc`.
    pub fn listen_to_shared<I, T>(&mut self, source: Arc<dyn EventSource>, event_types: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let event_types = event_types.into_iter().map(Into::into).collect();
        self.push(Directive::ListenTo {
            source,
            event_types,
        })
    }

    /// Move to `target` when `event_type` arrives.
    pub fn on(&mut self, event_type: impl Into<String>, target: StateDefinition<A>) -> &mut Self {
        self.push(Directive::On {
            event_type: event_type.into(),
            target,
        })
    }

    pub fn accumulate(&mut self, value: A) -> &mut Self {
        self.push(Directive::Accumulate(value))
    }

    pub fn exit(&mut self) -> &mut Self {
        self.push(Directive::Exit)
    }

    /// Yield every directive of `target` here, in place.
    ///
    /// Delegation shares the activation (and its token) with the caller; it
    /// never creates a state of its own. Cycles and chains deeper than the
    /// configured limit fail the definition.
    pub fn continue_as(&mut self, target: &StateDefinition<A>) -> Result<(), BoxError> {
        // Only re-entering the same body is a cycle; definitions sharing a
        // name may still recurse finitely.
        if self.frames.iter().any(|frame| Arc::ptr_eq(&frame.body, &target.body)) {
            let mut chain: Vec<String> = self.frames.iter().map(|f| f.name.to_string()).collect();
            chain.push(target.name().to_string());
            return Err(Box::new(DefinitionError::DelegationCycle { chain }));
        }
        if self.frames.len() > self.max_depth {
            return Err(Box::new(DefinitionError::DelegationTooDeep {
                state: target.name().to_string(),
                limit: self.max_depth,
            }));
        }

        self.frames.push(Frame::new(target));
        let result = target.run(self);
        let frame = self.frames.pop();

        if let Err(source) = result {
            return Err(Box::new(DefinitionError::from_body(target.name(), source)));
        }
        if let (Some(frame), Some(parent)) = (frame, self.frames.last_mut()) {
            parent.delegates.push(frame.resolve());
        }
        Ok(())
    }

    pub(crate) fn finish(mut self) -> (Resolved, Vec<Directive<A>>) {
        let resolved = match self.frames.pop() {
            Some(root) => root.resolve(),
            None => Resolved {
                name: Arc::from("<unnamed>"),
                aliases: Vec::new(),
            },
        };
        (resolved, self.directives)
    }
}
