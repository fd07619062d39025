//! Yieldmachine: declarative state machines driven by directive-yielding
//! state definitions.
//!
//! A state is a named body that yields directives: run this when entered,
//! listen to these events on that source, move to another state on this
//! event, carry this value, stop here. The engine turns those declarations
//! into a live machine. It runs entry actions with scoped cleanup, keeps
//! exactly the current state's listeners subscribed, and tells observers when
//! the state changes.
//!
//! # Core Concepts
//!
//! - **StateDefinition**: a named body yielding `Directive`s into `Steps`
//! - **Scope**: per-activation cancellation; everything a state sets up is
//!   torn down when it is left
//! - **EventSource**: anything a state can listen to (`Emitter`, `Timer`)
//! - **Machine**: the controller routing events to transitions
//!
//! # Example
//!
//! ```rust
//! use yieldmachine::builder::MachineConfig;
//! use yieldmachine::core::StateDefinition;
//! use yieldmachine::events::Emitter;
//! use yieldmachine::machine::Machine;
//!
//! fn up(el: Emitter) -> StateDefinition<()> {
//!     StateDefinition::new("Up", move |steps| {
//!         steps.listen_to(&el, ["pointerdown"]).on("pointerdown", down(el.clone()));
//!         Ok(())
//!     })
//! }
//!
//! fn down(el: Emitter) -> StateDefinition<()> {
//!     StateDefinition::new("Down", move |steps| {
//!         steps
//!             .listen_to(&el, ["pointerup"])
//!             .on("pointerup", StateDefinition::alias("Clicked", up(el.clone())));
//!         Ok(())
//!     })
//! }
//!
//! let el = Emitter::new("el");
//! let machine = Machine::start(up(el.clone()), MachineConfig::default()).unwrap();
//!
//! el.emit("pointerdown");
//! assert_eq!(machine.state(), "Down");
//!
//! el.emit("pointerup");
//! assert_eq!(machine.state(), "Up");
//! assert_eq!(machine.snapshot().aliases, vec!["Clicked"]);
//! ```

pub mod builder;
pub mod core;
pub mod diagnostics;
pub mod events;
pub mod machine;
pub mod scope;

// Re-export commonly used types
pub use crate::builder::{MachineBuilder, MachineConfig};
pub use crate::core::{BoxError, Directive, StateDefinition, Steps};
pub use crate::events::{Emitter, Event, EventSource, Timer};
pub use crate::machine::{Delivery, Machine, MachineError, StateChanged, Status};
pub use crate::scope::{Scope, ScopeToken};
