//! Static checks for state definitions.
//!
//! The engine resolves questionable definitions deterministically (the first
//! declared `On` wins, an exited state never transitions), so none of these
//! are runtime errors. `check` surfaces them up front, accumulating every
//! issue instead of stopping at the first.
//!
//! # Example
//!
//! ```rust
//! use yieldmachine::core::StateDefinition;
//! use yieldmachine::diagnostics::{check, DefinitionIssue};
//! use yieldmachine::events::Emitter;
//! use stillwater::validation::Validation;
//!
//! let el = Emitter::new("el");
//! let idle = StateDefinition::<()>::new("Idle", |_| Ok(()));
//! let definition = StateDefinition::new("Up", move |steps| {
//!     steps.listen_to(&el, ["pointerdown"]).on("pointerup", idle.clone());
//!     Ok(())
//! });
//!
//! match check(&definition) {
//!     Validation::Failure(issues) => assert!(issues
//!         .iter()
//!         .any(|issue| matches!(issue, DefinitionIssue::UnlistenedTransition { .. }))),
//!     Validation::Success(_) => unreachable!(),
//! }
//! ```

pub mod issues;
pub mod rules;

pub use issues::DefinitionIssue;
pub use rules::{check, check_collected, check_with};
