//! Integration tests for Sluice
//!
//! These tests drive the pump through its public API only: the scheduler
//! with hand-written sinks, the session actor with asynchronous source and
//! sink tasks, and property tests over arbitrary event interleavings.

#[path = "integration/pump_scenarios.rs"]
mod pump_scenarios;

#[path = "integration/pump_properties.rs"]
mod pump_properties;

#[path = "integration/session_flow.rs"]
mod session_flow;
