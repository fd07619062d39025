//! Drives a state definition to its full directive list.

use super::definition::{Directive, StateDefinition, Steps};
use super::error::DefinitionError;
use crate::scope::ScopeToken;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::trace;

/// Default bound on nested `continue_as` calls.
pub const DEFAULT_MAX_DELEGATION_DEPTH: usize = 32;

/// Every directive one activation of a definition yielded.
#[derive(Debug)]
pub struct Collected<A> {
    name: Arc<str>,
    aliases: Vec<Arc<str>>,
    directives: Vec<Directive<A>>,
}

impl<A> Collected<A> {
    /// Name of the state after resolving pure aliases.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Alias definitions passed through on the way to [`Collected::name`],
    /// outermost first.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.aliases.iter().map(|alias| &**alias)
    }

    pub fn directives(&self) -> &[Directive<A>] {
        &self.directives
    }

    pub fn is_terminal(&self) -> bool {
        self.directives.iter().any(|d| matches!(d, Directive::Exit))
    }

    /// The last accumulated value, if any.
    pub fn accumulator(&self) -> Option<&A> {
        self.directives.iter().rev().find_map(|d| match d {
            Directive::Accumulate(value) => Some(value),
            _ => None,
        })
    }

    /// Every event type named by a `ListenTo`.
    pub fn listened_types(&self) -> BTreeSet<&str> {
        self.directives
            .iter()
            .filter_map(|d| match d {
                Directive::ListenTo { event_types, .. } => Some(event_types),
                _ => None,
            })
            .flatten()
            .map(String::as_str)
            .collect()
    }

    pub(crate) fn shared_name(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }
}

/// Runs definition bodies and entry actions.
///
/// Collection and entry are separate steps: collecting is free of side
/// effects, so a definition that fails to yield leaves the running machine
/// untouched.
#[derive(Clone, Copy, Debug)]
pub struct StepRunner {
    max_depth: usize,
}

impl Default for StepRunner {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DELEGATION_DEPTH)
    }
}

impl StepRunner {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Run `definition` to the end of its body, following delegation.
    pub fn collect<A>(&self, definition: &StateDefinition<A>) -> Result<Collected<A>, DefinitionError> {
        let mut steps = Steps::new(definition, self.max_depth);
        definition
            .run(&mut steps)
            .map_err(|source| DefinitionError::from_body(definition.name(), source))?;

        let (resolved, directives) = steps.finish();
        trace!(
            state = %resolved.name,
            directives = directives.len(),
            "collected directives"
        );
        Ok(Collected {
            name: resolved.name,
            aliases: resolved.aliases,
            directives,
        })
    }

    /// Run every entry action in declaration order with `token`.
    ///
    /// Stops at the first failure; actions after it do not run.
    pub fn enter<A>(&self, collected: &Collected<A>, token: &ScopeToken) -> Result<(), DefinitionError> {
        for directive in &collected.directives {
            if let Directive::Entry(action) = directive {
                action(token).map_err(|source| DefinitionError::EntryFailure {
                    state: collected.name().to_string(),
                    source,
                })?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Scope;
    use std::sync::Mutex;

    #[test]
    fn collect_follows_pure_alias() {
        let up = StateDefinition::new("Up", |steps: &mut Steps<&'static str>| {
            steps.accumulate("up").exit();
            Ok(())
        });
        let cancelled = StateDefinition::alias("Cancelled", up);

        let collected = StepRunner::default().collect(&cancelled).unwrap();

        assert_eq!(collected.name(), "Up");
        assert_eq!(collected.aliases().collect::<Vec<_>>(), vec!["Cancelled"]);
        assert_eq!(collected.accumulator(), Some(&"up"));
        assert!(collected.is_terminal());
    }

    #[test]
    fn collect_tags_failure_with_offending_state() {
        let broken = StateDefinition::new("Broken", |_: &mut Steps<()>| Err("bad body".into()));
        let alias = StateDefinition::alias("Alias", broken);

        let error = StepRunner::default().collect(&alias).unwrap_err();

        assert!(matches!(error, DefinitionError::DefinitionFailure { ref state, .. } if state == "Broken"));
    }

    #[test]
    fn depth_limit_stops_long_chains() {
        fn chain(n: usize) -> StateDefinition<()> {
            StateDefinition::new(format!("S{n}"), move |steps| steps.continue_as(&chain(n + 1)))
        }

        let error = StepRunner::new(4).collect(&chain(0)).unwrap_err();

        assert!(matches!(error, DefinitionError::DelegationTooDeep { limit: 4, .. }));
    }

    #[test]
    fn enter_runs_actions_in_order_and_stops_at_failure() {
        let calls = std::sync::Arc::new(Mutex::new(Vec::new()));
        let (a, b, c) = (calls.clone(), calls.clone(), calls.clone());
        let definition = StateDefinition::new("S", move |steps: &mut Steps<()>| {
            let (a, b, c) = (a.clone(), b.clone(), c.clone());
            steps
                .entry(move |_| {
                    a.lock().unwrap().push(1);
                    Ok(())
                })
                .entry(move |_| {
                    b.lock().unwrap().push(2);
                    Err("entry failed".into())
                })
                .entry(move |_| {
                    c.lock().unwrap().push(3);
                    Ok(())
                });
            Ok(())
        });

        let runner = StepRunner::default();
        let collected = runner.collect(&definition).unwrap();
        let scope = Scope::new();
        let error = runner.enter(&collected, scope.token()).unwrap_err();

        assert_eq!(*calls.lock().unwrap(), vec![1, 2]);
        assert!(matches!(error, DefinitionError::EntryFailure { .. }));
    }

    #[test]
    fn listened_types_span_all_listen_directives() {
        let a = crate::events::Emitter::new("a");
        let b = crate::events::Emitter::new("b");
        let definition = StateDefinition::new("S", move |steps: &mut Steps<()>| {
            steps.listen_to(&a, ["x", "y"]).listen_to(&b, ["y", "z"]);
            Ok(())
        });

        let collected = StepRunner::default().collect(&definition).unwrap();

        assert_eq!(collected.listened_types().into_iter().collect::<Vec<_>>(), vec!["x", "y", "z"]);
    }
}
