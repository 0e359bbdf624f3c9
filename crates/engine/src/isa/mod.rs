//! Instruction Set Architecture (ISA) Backends.
//!
//! The control plane never embeds architecture semantics. Everything a concrete
//! instruction set needs is supplied by a [`Backend`]:
//! 1. **Identity:** The architecture and mode it implements.
//! 2. **Registers:** A static [`RegisterLayout`] naming every register, its width, and pc.
//! 3. **Decode:** Raw bytes at an address into a cacheable [`Instruction`].
//! 4. **Execute:** One instruction against a [`Guest`] view, returning an [`EngineEffect`].
//!
//! # Bundled Backends
//!
//! * `mips`: MIPS32 integer subset, big or little endian, with branch-delay slots.
//! * `riscv`: RV32I / RV64I base integer ISA, little endian.

/// MIPS32 backend.
pub mod mips;

/// RISC-V RV32I/RV64I backend.
pub mod riscv;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::common::{AccessType, ConfigError, DecodeError, FaultKind};
use crate::core::regs::{RegId, RegisterLayout};

/// Guest architecture family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    /// MIPS (bundled backend: MIPS32).
    Mips,
    /// RISC-V (bundled backend: RV32I / RV64I).
    #[serde(alias = "riscv", alias = "RISCV")]
    RiscV,
    /// AArch64. Recognised, but no backend is bundled.
    Arm64,
    /// x86. Recognised, but no backend is bundled.
    X86,
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mips => "mips",
            Self::RiscV => "riscv",
            Self::Arm64 => "arm64",
            Self::X86 => "x86",
        })
    }
}

/// Native register width of a mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Width {
    /// 32-bit registers and addresses.
    #[serde(rename = "32")]
    Bits32,
    /// 64-bit registers and addresses.
    #[serde(rename = "64")]
    Bits64,
}

impl Width {
    /// Number of bits.
    pub const fn bits(self) -> u32 {
        match self {
            Self::Bits32 => 32,
            Self::Bits64 => 64,
        }
    }
}

/// Byte order of guest memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endian {
    /// Least significant byte first.
    Little,
    /// Most significant byte first.
    Big,
}

impl Endian {
    /// Assembles an unsigned value from up to eight bytes.
    pub fn read(self, bytes: &[u8]) -> u64 {
        let fold = |acc: u64, b: &u8| (acc << 8) | u64::from(*b);
        match self {
            Self::Big => bytes.iter().fold(0, fold),
            Self::Little => bytes.iter().rev().fold(0, fold),
        }
    }

    /// Encodes the low `size` bytes of `value` into a buffer.
    pub fn write(self, value: u64, size: usize) -> Vec<u8> {
        let le = value.to_le_bytes();
        let mut out = le[..size.min(8)].to_vec();
        if self == Self::Big {
            out.reverse();
        }
        out
    }
}

/// Execution mode flags chosen at open.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mode {
    /// Register and address width.
    pub width: Width,
    /// Memory byte order.
    pub endian: Endian,
}

impl Mode {
    /// Creates a mode from its flags.
    pub const fn new(width: Width, endian: Endian) -> Self {
        Self { width, endian }
    }

    /// 32-bit big endian (MIPS32 EB).
    pub const MIPS32_BE: Self = Self::new(Width::Bits32, Endian::Big);
    /// 32-bit little endian (MIPS32 EL).
    pub const MIPS32_LE: Self = Self::new(Width::Bits32, Endian::Little);
    /// RV32, little endian.
    pub const RV32: Self = Self::new(Width::Bits32, Endian::Little);
    /// RV64, little endian.
    pub const RV64: Self = Self::new(Width::Bits64, Endian::Little);
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let endian = match self.endian {
            Endian::Little => "little",
            Endian::Big => "big",
        };
        write!(f, "{}-bit {endian}-endian", self.width.bits())
    }
}

/// A decoded instruction.
///
/// Backends produce this from raw bytes and receive it back in
/// [`Backend::execute`]. It is plain data so the engine can cache it per address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Instruction {
    /// Guest address the instruction was decoded from.
    pub address: u64,
    /// Encoded length in bytes.
    pub len: u8,
    /// Raw encoding, in logical (not memory) byte order.
    pub raw: u64,
    /// Control leaves the basic block after this instruction (and its delay slot).
    pub ends_block: bool,
    /// The instruction following this one executes before any branch takes effect.
    pub has_delay_slot: bool,
}

impl Instruction {
    /// Address of the next sequential instruction.
    pub const fn next(&self) -> u64 {
        self.address.wrapping_add(self.len as u64)
    }
}

/// What the engine should do with pc after an instruction completes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineEffect {
    /// Fall through to the next sequential instruction.
    Next,
    /// Transfer control immediately.
    Branch(u64),
    /// Execute the next sequential instruction, then transfer control.
    DelayedBranch(u64),
    /// Raise an interrupt or exception with a backend-defined number. pc has
    /// already moved past the instruction when interrupt hooks run.
    Interrupt(u32),
}

/// A guest-visible fault raised while executing one instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecFault {
    /// What went wrong.
    pub kind: FaultKind,
    /// Faulting data address for memory faults, instruction address otherwise.
    pub address: u64,
}

impl ExecFault {
    /// A naturally-aligned access requirement was violated.
    pub const fn unaligned(access: AccessType, address: u64) -> Self {
        Self {
            kind: FaultKind::Unaligned(access),
            address,
        }
    }

    /// The instruction at `address` cannot be executed.
    pub const fn invalid_instruction(address: u64) -> Self {
        Self {
            kind: FaultKind::InvalidInstruction,
            address,
        }
    }
}

/// Memory as seen by an executing instruction.
///
/// Values are assembled in the guest's byte order. Every access is permission
/// checked and observed by memory hooks before it completes.
pub trait MemoryAccessor {
    /// Loads a `size`-byte value (1, 2, 4 or 8), zero-extended.
    ///
    /// # Errors
    ///
    /// A fault when the access is unmapped or not readable and no
    /// invalid-memory hook resolved it.
    fn load(&mut self, addr: u64, size: usize) -> Result<u64, ExecFault>;

    /// Stores the low `size` bytes of `value`.
    ///
    /// # Errors
    ///
    /// A fault when the access is unmapped or not writable and no
    /// invalid-memory hook resolved it.
    fn store(&mut self, addr: u64, size: usize, value: u64) -> Result<(), ExecFault>;
}

/// Register and memory access for a backend executing one instruction.
pub trait Guest: MemoryAccessor {
    /// Reads a register by layout index. Unknown registers read as zero.
    fn reg(&self, id: RegId) -> u64;

    /// Writes a register by layout index, truncated to the register width.
    /// Writes to the hard-wired zero register are dropped.
    fn set_reg(&mut self, id: RegId, value: u64);
}

/// An architecture-specific decode/execute implementation.
///
/// Backends are stateless with respect to the guest: all architectural state
/// lives in the register bank and memory the engine owns, so one backend
/// instance may be shared by many emulators.
pub trait Backend: fmt::Debug + Send + Sync {
    /// Architecture implemented.
    fn arch(&self) -> Arch;

    /// Mode implemented.
    fn mode(&self) -> Mode;

    /// Register file description.
    fn layout(&self) -> &'static RegisterLayout;

    /// Smallest instruction size in bytes, used to skip an invalid instruction.
    fn min_insn_len(&self) -> usize;

    /// Largest instruction size in bytes; the engine fetches at most this many.
    fn max_insn_len(&self) -> usize;

    /// Decodes the instruction at `address` from `bytes`.
    ///
    /// `bytes` holds between [`Backend::min_insn_len`] and
    /// [`Backend::max_insn_len`] bytes, fewer only at the end of mapped memory.
    ///
    /// # Errors
    ///
    /// `UnknownOpcode` for encodings the backend does not implement,
    /// `Truncated` when more bytes are needed.
    fn decode(&self, address: u64, bytes: &[u8]) -> Result<Instruction, DecodeError>;

    /// Executes a previously decoded instruction.
    ///
    /// The backend must not write pc; control flow is returned as an effect.
    ///
    /// # Errors
    ///
    /// A fault that terminates the run. Architectural state written before the
    /// fault is kept, so backends perform every check before their first write.
    fn execute(&self, insn: &Instruction, guest: &mut dyn Guest)
    -> Result<EngineEffect, ExecFault>;
}

/// Returns the bundled backend for an architecture and mode.
///
/// # Errors
///
/// `UnsupportedArch` when no backend is bundled, `UnsupportedMode` when the
/// backend does not implement the mode.
pub fn backend_for(arch: Arch, mode: Mode) -> Result<Arc<dyn Backend>, ConfigError> {
    match arch {
        Arch::Mips => Ok(Arc::new(mips::MipsBackend::new(mode)?)),
        Arch::RiscV => Ok(Arc::new(riscv::RiscVBackend::new(mode)?)),
        Arch::Arm64 | Arch::X86 => Err(ConfigError::UnsupportedArch(arch)),
    }
}
