//! Builder for starting machines.

use super::config::MachineConfig;
use super::error::BuildError;
use crate::core::StateDefinition;
use crate::machine::{Machine, MachineError};
use crate::scope::ScopeToken;

/// Builder for starting machines with a fluent API.
pub struct MachineBuilder<A> {
    initial: Option<StateDefinition<A>>,
    config: MachineConfig,
}

impl<A: Clone + Send + Sync + 'static> MachineBuilder<A> {
    pub fn new() -> Self {
        Self {
            initial: None,
            config: MachineConfig::default(),
        }
    }

    /// Set the initial state (required).
    pub fn initial(mut self, state: StateDefinition<A>) -> Self {
        self.initial = Some(state);
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: MachineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.config.label = label.into();
        self
    }

    /// Stop the machine when `signal` is cancelled.
    pub fn signal(mut self, signal: &ScopeToken) -> Self {
        self.config.signal = Some(signal.clone());
        self
    }

    pub fn max_delegation_depth(mut self, depth: usize) -> Self {
        self.config.max_delegation_depth = depth;
        self
    }

    pub fn record_history(mut self, record: bool) -> Self {
        self.config.record_history = record;
        self
    }

    /// Start the machine.
    /// Returns an error if required fields are missing or the initial state
    /// fails to enter.
    pub fn start(self) -> Result<Machine<A>, MachineError> {
        let initial = self.initial.ok_or(BuildError::MissingInitialState)?;
        Machine::start(initial, self.config)
    }
}

impl<A: Clone + Send + Sync + 'static> Default for MachineBuilder<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::Status;
    use crate::scope::Scope;

    fn idle() -> StateDefinition<u8> {
        StateDefinition::new("Idle", |steps| {
            steps.accumulate(1);
            Ok(())
        })
    }

    #[test]
    fn builder_validates_required_fields() {
        let result = MachineBuilder::<u8>::new().start();

        assert!(matches!(
            result,
            Err(MachineError::Build(BuildError::MissingInitialState))
        ));
    }

    #[test]
    fn builder_rejects_zero_depth() {
        let result = MachineBuilder::new()
            .initial(idle())
            .max_delegation_depth(0)
            .start();

        assert!(matches!(
            result,
            Err(MachineError::Build(BuildError::InvalidDelegationDepth))
        ));
    }

    #[test]
    fn fluent_api_starts_machine() {
        let mut host = Scope::new();
        let machine = MachineBuilder::new()
            .initial(idle())
            .label("fluent")
            .signal(host.token())
            .record_history(false)
            .start()
            .unwrap();

        assert_eq!(machine.label(), "fluent");
        assert_eq!(machine.state(), "Idle");
        assert_eq!(machine.accumulator(), Some(1));

        host.release();
        assert_eq!(machine.status(), Status::Stopped);
    }
}
