//! Checks over a definition's directives using Validation.

use super::issues::DefinitionIssue;
use crate::core::{Collected, Directive, StateDefinition, StepRunner};
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

/// Collect `definition` and check its directives, accumulating ALL issues.
pub fn check<A>(definition: &StateDefinition<A>) -> Validation<(), NonEmptyVec<DefinitionIssue>> {
    check_with(&StepRunner::default(), definition)
}

/// Like [`check`], collecting with a specific runner.
pub fn check_with<A>(
    runner: &StepRunner,
    definition: &StateDefinition<A>,
) -> Validation<(), NonEmptyVec<DefinitionIssue>> {
    match runner.collect(definition) {
        Ok(collected) => check_collected(&collected),
        Err(error) => Validation::fail(DefinitionIssue::Uncollectable {
            state: definition.name().to_string(),
            reason: error.to_string(),
        }),
    }
}

/// Check directives that were already collected.
/// Returns Validation::Success(()) if nothing is wrong.
pub fn check_collected<A>(collected: &Collected<A>) -> Validation<(), NonEmptyVec<DefinitionIssue>> {
    let state = collected.name();
    let listened = collected.listened_types();

    // Event types in first-declared order, with their targets.
    let mut transitions: Vec<(&str, Vec<&str>)> = Vec::new();
    for directive in collected.directives() {
        if let Directive::On { event_type, target } = directive {
            match transitions.iter_mut().find(|(kind, _)| *kind == event_type.as_str()) {
                Some((_, targets)) => targets.push(target.name()),
                None => transitions.push((event_type.as_str(), vec![target.name()])),
            }
        }
    }

    let mut checks: Vec<Validation<(), NonEmptyVec<DefinitionIssue>>> = Vec::new();

    for (event_type, targets) in &transitions {
        let check = if targets.len() > 1 {
            Validation::fail(DefinitionIssue::AmbiguousTransition {
                state: state.to_string(),
                event_type: event_type.to_string(),
                candidates: targets.iter().map(|t| t.to_string()).collect(),
            })
        } else {
            Validation::success(())
        };
        checks.push(check);

        let check = if listened.contains(event_type) {
            Validation::success(())
        } else {
            Validation::fail(DefinitionIssue::UnlistenedTransition {
                state: state.to_string(),
                event_type: event_type.to_string(),
            })
        };
        checks.push(check);
    }

    if collected.is_terminal() && !transitions.is_empty() {
        checks.push(Validation::fail(DefinitionIssue::TerminalWithTransitions {
            state: state.to_string(),
            event_types: transitions.iter().map(|(kind, _)| kind.to_string()).collect(),
        }));
    }

    Validation::all_vec(checks).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Emitter;

    fn leaf(name: &str) -> StateDefinition<()> {
        StateDefinition::new(name, |_| Ok(()))
    }

    #[test]
    fn well_formed_definition_passes() {
        let el = Emitter::new("el");
        let definition = StateDefinition::new("Down", move |steps| {
            steps
                .listen_to(&el, ["pointermove", "pointerup"])
                .on("pointermove", leaf("Dragging"))
                .on("pointerup", leaf("Clicked"));
            Ok(())
        });

        assert!(check(&definition).is_success());
    }

    #[test]
    fn check_accumulates_all_issues() {
        let el = Emitter::new("el");
        let definition = StateDefinition::new("Broken", move |steps| {
            steps
                .listen_to(&el, ["pointerup"])
                .on("pointerup", leaf("Dropped"))
                .on("pointerup", leaf("Clicked"))
                .on("CANCEL", leaf("Cancelled"))
                .exit();
            Ok(())
        });

        match check(&definition) {
            Validation::Failure(errors) => {
                assert_eq!(errors.len(), 3);
                assert!(errors
                    .iter()
                    .any(|e| matches!(e, DefinitionIssue::AmbiguousTransition { candidates, .. } if candidates == &["Dropped", "Clicked"])));
                assert!(errors
                    .iter()
                    .any(|e| matches!(e, DefinitionIssue::UnlistenedTransition { event_type, .. } if event_type == "CANCEL")));
                assert!(errors
                    .iter()
                    .any(|e| matches!(e, DefinitionIssue::TerminalWithTransitions { .. })));
            }
            Validation::Success(_) => panic!("Expected failures, got success"),
        }
    }

    #[test]
    fn failing_body_is_reported_not_raised() {
        let definition = StateDefinition::new("Boom", |_: &mut crate::core::Steps<()>| Err("no element".into()));

        let result = check(&definition);
        assert!(result.is_failure());
        if let Validation::Failure(errors) = result {
            assert!(errors
                .iter()
                .any(|e| matches!(e, DefinitionIssue::Uncollectable { state, .. } if state == "Boom")));
        }
    }

    #[test]
    fn terminal_state_without_transitions_is_fine() {
        let definition = StateDefinition::new("Done", |steps: &mut crate::core::Steps<()>| {
            steps.exit();
            Ok(())
        });

        assert!(check(&definition).is_success());
    }
}
