//! A live instantiation of a state definition.

use super::router::RouteTable;
use crate::core::Collected;
use crate::scope::Scope;

/// One activation: the directives it yielded, its routing table and the
/// scope every resource it acquired hangs off.
pub(crate) struct Activation<A> {
    collected: Collected<A>,
    routes: RouteTable<A>,
    scope: Scope,
}

impl<A> Activation<A> {
    pub(crate) fn new(collected: Collected<A>, routes: RouteTable<A>, scope: Scope) -> Self {
        Self {
            collected,
            routes,
            scope,
        }
    }

    pub(crate) fn collected(&self) -> &Collected<A> {
        &self.collected
    }

    pub(crate) fn routes(&self) -> &RouteTable<A> {
        &self.routes
    }

    pub(crate) fn is_live(&self) -> bool {
        !self.scope.is_released()
    }

    pub(crate) fn release(&mut self) {
        self.scope.release();
    }

    /// Recover the directives so the state can be entered again.
    pub(crate) fn into_collected(mut self) -> Collected<A> {
        self.scope.release();
        self.collected
    }
}
