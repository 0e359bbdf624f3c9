//! Common utilities and types used throughout the emulation engine.
//!
//! This module provides fundamental building blocks that are shared across all components
//! of the control plane. It includes:
//! 1. **Constants:** Page granularity and execution limits.
//! 2. **Memory Access:** Definitions for categorizing memory operations (Fetch/Read/Write).
//! 3. **Error Handling:** The error taxonomy and run fault kinds.
//! 4. **Handles:** The generation-checked arena behind every opaque handle.

/// Generation-checked slot arena.
pub mod arena;

/// Common constants used throughout the engine.
pub mod constants;

/// Memory access type definitions.
pub mod data;

/// Error types and fault definitions.
pub mod error;

pub use arena::{Arena, Handle};
pub use constants::{PAGE_SHIFT, PAGE_SIZE};
pub use data::{AccessType, InvalidAccess, InvalidReason, MemAccess};
pub use error::{
    ConfigError, DecodeError, EmuError, FaultKind, HookError, MemoryError, RegisterError, Result,
};
