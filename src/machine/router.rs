//! Event-to-transition resolution for one activation.

use crate::core::{Directive, StateDefinition};
use crate::events::{EventSource, SourceId};
use std::sync::Arc;

/// One `(source, event type)` pair an activation listens to, with the `On`
/// targets that apply to it in declaration order.
pub struct Route<A> {
    source: Arc<dyn EventSource>,
    event_type: String,
    targets: Vec<StateDefinition<A>>,
}

impl<A> Route<A> {
    pub fn source(&self) -> &Arc<dyn EventSource> {
        &self.source
    }

    pub fn source_id(&self) -> SourceId {
        self.source.source_id()
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn targets(&self) -> &[StateDefinition<A>] {
        &self.targets
    }
}

/// How an inbound event resolves against a [`RouteTable`].
#[derive(Debug)]
pub enum Resolution<'a, A> {
    /// Nothing listens for this event, or nothing transitions on it.
    Unmatched,
    Matched(&'a StateDefinition<A>),
    /// Several `On` directives apply; the first declared wins.
    Ambiguous {
        chosen: &'a StateDefinition<A>,
        candidates: Vec<&'a str>,
    },
}

/// The routing table of the current activation.
pub struct RouteTable<A> {
    routes: Vec<Route<A>>,
}

impl<A> RouteTable<A> {
    /// Pair every `ListenTo` event type with the `On` directives naming it.
    ///
    /// A `(source, event type)` pair declared twice is routed once.
    pub fn build(directives: &[Directive<A>]) -> Self {
        let transitions: Vec<(&str, &StateDefinition<A>)> = directives
            .iter()
            .filter_map(|directive| match directive {
                Directive::On { event_type, target } => Some((event_type.as_str(), target)),
                _ => None,
            })
            .collect();

        let mut routes: Vec<Route<A>> = Vec::new();
        for directive in directives {
            let Directive::ListenTo {
                source,
                event_types,
            } = directive
            else {
                continue;
            };
            let source_id = source.source_id();
            for event_type in event_types {
                let seen = routes
                    .iter()
                    .any(|route| route.source_id() == source_id && &route.event_type == event_type);
                if seen {
                    continue;
                }
                let targets = transitions
                    .iter()
                    .filter(|(kind, _)| *kind == event_type.as_str())
                    .map(|(_, target)| (*target).clone())
                    .collect();
                routes.push(Route {
                    source: Arc::clone(source),
                    event_type: event_type.clone(),
                    targets,
                });
            }
        }
        Self { routes }
    }

    pub fn resolve(&self, source: SourceId, event_type: &str) -> Resolution<'_, A> {
        let Some(route) = self
            .routes
            .iter()
            .find(|route| route.source_id() == source && route.event_type == event_type)
        else {
            return Resolution::Unmatched;
        };

        match route.targets.as_slice() {
            [] => Resolution::Unmatched,
            [only] => Resolution::Matched(only),
            [first, ..] => Resolution::Ambiguous {
                chosen: first,
                candidates: route.targets.iter().map(StateDefinition::name).collect(),
            },
        }
    }

    pub fn routes(&self) -> &[Route<A>] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
