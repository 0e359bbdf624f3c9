//! Error and Fault definitions.
//!
//! This module defines the error handling taxonomy for the engine. It provides:
//! 1. **Operation Errors:** One enum per category (configuration, memory, register, hook,
//!    decode) plus the crate-wide [`EmuError`] that wraps them.
//! 2. **Run Faults:** [`FaultKind`], the terminal status of a run that hit an
//!    unrecoverable guest condition. Faults are reported inside a successful
//!    [`RunResult`](crate::core::RunResult), never as errors.

use thiserror::Error;

use super::data::AccessType;
use crate::core::hooks::HookId;
use crate::core::regs::RegId;
use crate::isa::{Arch, Mode};
use crate::sim::ContextId;

/// Crate-wide result alias.
pub type Result<T, E = EmuError> = std::result::Result<T, E>;

/// Errors raised while opening or configuring an emulator.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// No backend is bundled for this architecture.
    #[error("unsupported architecture: {0}")]
    UnsupportedArch(Arch),

    /// The backend exists but does not implement the requested mode.
    #[error("unsupported mode {mode} for architecture {arch}")]
    UnsupportedMode {
        /// Requested architecture.
        arch: Arch,
        /// Rejected mode.
        mode: Mode,
    },

    /// Page size must be a non-zero power of two.
    #[error("invalid page size {0:#x}: must be a non-zero power of two")]
    InvalidPageSize(u64),

    /// The block scan limit must be at least one instruction.
    #[error("max_block_instructions must be at least 1")]
    InvalidBlockLimit,

    /// A serialized configuration could not be parsed.
    #[error("failed to parse engine configuration: {0}")]
    Parse(String),
}

/// Errors raised by the memory region table.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// The requested range intersects an existing region.
    #[error("range {base:#x}+{len:#x} overlaps an existing region")]
    Overlap {
        /// Requested base.
        base: u64,
        /// Requested length.
        len: u64,
    },

    /// Length is zero or wraps the address space.
    #[error("invalid length {0:#x}")]
    InvalidLength(u64),

    /// Base or length is not a multiple of the page size.
    #[error("range {base:#x}+{len:#x} is not aligned to the {page_size:#x}-byte page size")]
    Misaligned {
        /// Requested base.
        base: u64,
        /// Requested length.
        len: u64,
        /// Page granularity in force.
        page_size: u64,
    },

    /// The mapping limit would be exceeded, or the host allocation failed.
    #[error("out of memory mapping {requested:#x} bytes")]
    OutOfMemory {
        /// Bytes requested by the failed mapping.
        requested: u64,
    },

    /// An access touched an address that no region covers.
    #[error("address {0:#x} is not mapped")]
    Unmapped(u64),

    /// Nothing at all is mapped in the range passed to unmap/protect.
    #[error("nothing mapped in range {base:#x}+{len:#x}")]
    NotMapped {
        /// Requested base.
        base: u64,
        /// Requested length.
        len: u64,
    },

    /// The range passed to unmap/protect is only partly mapped.
    #[error("range {base:#x}+{len:#x} is only partially mapped")]
    PartialOverlap {
        /// Requested base.
        base: u64,
        /// Requested length.
        len: u64,
    },

    /// A host write touched a region without write permission.
    #[error("address {0:#x} is write-protected")]
    WriteProtected(u64),
}

/// Errors raised by the register bank.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RegisterError {
    /// The identifier is not defined for the current architecture and mode.
    #[error("invalid register {0}")]
    InvalidRegister(RegId),

    /// The value does not fit the register width.
    #[error("value {value:#x} does not fit {bits}-bit register {reg}")]
    ValueOutOfRange {
        /// Target register.
        reg: RegId,
        /// Rejected value.
        value: u64,
        /// Register width in bits.
        bits: u32,
    },

    /// A register snapshot was taken from a different architecture or mode.
    #[error("register snapshot does not match this emulator's layout")]
    SnapshotMismatch,
}

/// Errors raised by the hook registry.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum HookError {
    /// No live hook has this handle (never issued, or already removed).
    #[error("hook {0} not found")]
    NotFound(HookId),

    /// The event mask is empty or names events this hook class cannot observe.
    #[error("invalid hook event mask {0:#x}")]
    InvalidMask(u32),
}

/// Errors raised by an architecture backend's decoder.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The encoding does not name an instruction the backend implements.
    #[error("unknown instruction encoding {0:#010x}")]
    UnknownOpcode(u64),

    /// Fewer bytes were supplied than the instruction needs.
    #[error("truncated instruction: need {needed} bytes, have {available}")]
    Truncated {
        /// Bytes the decoder requires.
        needed: usize,
        /// Bytes supplied.
        available: usize,
    },
}

/// Crate-wide error type.
///
/// Every fallible control-plane operation returns this (or one of the wrapped
/// category errors). Conditions that arise mid-run are reported through
/// [`FaultKind`] instead.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EmuError {
    /// Bad architecture, mode, or configuration at open.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Memory region table failure.
    #[error(transparent)]
    Memory(#[from] MemoryError),

    /// Register bank failure.
    #[error(transparent)]
    Register(#[from] RegisterError),

    /// Hook registry failure.
    #[error(transparent)]
    Hook(#[from] HookError),

    /// Decoder failure surfaced outside a run (for example by `decode_at`).
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// `run` was called while a run is already in progress on this emulator.
    #[error("emulator is already running; nested run() is not allowed")]
    Reentrant,

    /// A run start or end address does not fit the mode's address width.
    #[error("address {0:#x} is wider than the emulator's address space")]
    AddressOutOfRange(u64),

    /// The context handle is stale or was never issued.
    #[error("context {0} is closed or invalid")]
    InvalidContext(ContextId),
}

/// Terminal fault of a run.
///
/// The guest state remains inspectable after a fault: registers and memory
/// reflect the last completed instruction, and pc points at the instruction
/// that faulted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultKind {
    /// Access to an address no region covers.
    Unmapped(AccessType),
    /// Access lacking the region permission it needs.
    Protected(AccessType),
    /// Access the backend requires to be naturally aligned.
    Unaligned(AccessType),
    /// The bytes at pc do not decode to a known instruction.
    InvalidInstruction,
    /// The guest raised an interrupt or exception no hook handled.
    UnhandledInterrupt(u32),
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unmapped(access) => write!(f, "unmapped {access}"),
            Self::Protected(access) => write!(f, "protected {access}"),
            Self::Unaligned(access) => write!(f, "unaligned {access}"),
            Self::InvalidInstruction => write!(f, "invalid instruction"),
            Self::UnhandledInterrupt(number) => write!(f, "unhandled interrupt {number}"),
        }
    }
}
