//! Configuration and the fluent API for starting machines.

pub mod config;
pub mod error;
pub mod machine;

pub use config::MachineConfig;
pub use error::BuildError;
pub use machine::MachineBuilder;
