//! Memory Access Types.
//!
//! This module defines the classification of memory accesses used throughout the engine.
//! These types are used for the following:
//! 1. **Permission Validation:** Checking Read/Write/Execute (RWX) permissions per region.
//! 2. **Fault Generation:** Determining which invalid-memory hook class and fault kind apply.
//! 3. **Hook Payloads:** Describing an access to memory-access observers.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::FaultKind;

/// Type of memory access operation.
///
/// Used to distinguish between instruction fetches, data loads, and data stores
/// for permission enforcement and hook dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessType {
    /// Instruction fetch access.
    ///
    /// Occurs when the step loop reads instruction bytes at the program counter.
    /// Requires Execute (X) permission.
    Fetch,

    /// Data read access.
    ///
    /// Occurs during load instructions when reading data from memory into registers.
    /// Requires Read (R) permission.
    Read,

    /// Data write access.
    ///
    /// Occurs during store instructions when writing data from registers to memory.
    /// Requires Write (W) permission.
    Write,
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch => write!(f, "fetch"),
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
        }
    }
}

/// A single guest memory access as seen by memory-access hooks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemAccess {
    /// What kind of access this is.
    pub kind: AccessType,
    /// First guest address touched.
    pub address: u64,
    /// Width of the access in bytes.
    pub size: usize,
    /// For writes, the value being stored; for reads and fetches, the value
    /// currently held in memory (zero when the location is invalid).
    pub value: u64,
}

/// Why an access was rejected by the memory region table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvalidReason {
    /// No region covers the address.
    Unmapped,
    /// A region covers the address but lacks the permission for this access type.
    Protected,
}

impl InvalidReason {
    /// Fault a run reports when this rejection is not resolved by a hook.
    pub const fn fault(self, access: AccessType) -> FaultKind {
        match self {
            Self::Unmapped => FaultKind::Unmapped(access),
            Self::Protected => FaultKind::Protected(access),
        }
    }
}

/// An access that failed translation, handed to invalid-memory hooks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InvalidAccess {
    /// The attempted access.
    pub access: MemAccess,
    /// Why it was rejected.
    pub reason: InvalidReason,
}
