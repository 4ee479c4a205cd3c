//! Deterministic stand-ins for hardware and operator.
//!
//! Used by unit tests, the integration tests and the simulated CLI backend,
//! so everything here stays compiled in normal builds.

pub mod operator;
pub mod scripted;

pub use operator::SimulatedOperator;
pub use scripted::ScriptedChannel;
