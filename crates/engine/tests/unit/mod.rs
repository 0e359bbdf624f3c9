//! # Unit Tests
//!
//! One module per public surface of the engine.

/// Engine configuration parsing and validation.
pub mod config;

/// Context table lifecycle and stale-handle rejection.
pub mod contexts;

/// Run loop semantics: termination, faults, redirection, cancellation.
pub mod engine;



/// Region table behaviour through the emulator surface.
pub mod memory;
