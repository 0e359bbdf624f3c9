//! Emulation core.
//!
//! This module contains the emulator aggregate and the machinery it drives:
//! the register bank, the hook registry, the decoded-instruction cache, the
//! guest view handed to backends, and the step loop.

/// Decoded-instruction cache.
pub mod cache;

/// The emulator aggregate and its control-plane API.
pub mod emulator;

/// Run requests, results, cancellation, and the step loop.
pub mod execution;

/// Guest view used by backends during execution.
mod guest;

/// Hook registry and hook definitions.
pub mod hooks;

/// Register identifiers, layouts, and the register bank.
pub mod regs;

pub use self::emulator::Emulator;
pub use self::execution::{RunRequest, RunResult, RunStatus, StopHandle};
pub use self::hooks::{Hook, HookId, HookKind, HookRange, MemHookMask};
pub use self::regs::{RegId, RegisterLayout, RegisterSnapshot};
