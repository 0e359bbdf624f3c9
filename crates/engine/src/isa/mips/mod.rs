//! MIPS32 Backend.
//!
//! Implements the integer subset of MIPS32 in either byte order. 64-bit modes
//! are rejected at construction.
//!
//! # Conventions
//!
//! * Branches and jumps have one delay slot and end the basic block after it.
//! * `SYSCALL`, `BREAK` and signed overflow from `ADD`/`ADDI`/`SUB` raise interrupts
//!   numbered by their Cause.ExcCode (8, 9 and 12).
//! * Halfword and word accesses must be naturally aligned.
//! * Registers are 32 bits; narrow host writes are sign-extended.

/// Field extraction and classification.
pub mod decode;

/// Instruction semantics.
pub mod execute;

/// Opcode, function, and exception constants.
pub mod opcodes;

use crate::common::{ConfigError, DecodeError};
use crate::common::constants::INSTRUCTION_SIZE_32;
use crate::core::regs::{RegId, RegisterLayout};
use crate::isa::{Arch, Backend, EngineEffect, ExecFault, Guest, Instruction, Mode, Width};
use decode::Class;

/// Register `$zero` (hard-wired zero).
pub const ZERO: RegId = RegId(0);
/// Register `$at` (assembler temporary).
pub const AT: RegId = RegId(1);
/// Register `$v0` (return value, syscall number).
pub const V0: RegId = RegId(2);
/// Register `$a0` (first argument).
pub const A0: RegId = RegId(4);
/// Register `$sp` (stack pointer).
pub const SP: RegId = RegId(29);
/// Register `$ra` (return address).
pub const RA: RegId = RegId(31);
/// Multiply/divide high result.
pub const HI: RegId = RegId(32);
/// Multiply/divide low result.
pub const LO: RegId = RegId(33);
/// Program counter.
pub const PC: RegId = RegId(34);

/// General-purpose register `n` (0-31).
pub const fn gpr(n: u16) -> RegId {
    RegId(n)
}

static NAMES: [&str; 35] = [
    "zero", "at", "v0", "v1", "a0", "a1", "a2", "a3", "t0", "t1", "t2", "t3", "t4", "t5", "t6",
    "t7", "s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7", "t8", "t9", "k0", "k1", "gp", "sp",
    "fp", "ra", "hi", "lo", "pc",
];

/// MIPS32 register file: `r0`-`r31`, `hi`, `lo`, `pc`.
pub static LAYOUT: RegisterLayout = RegisterLayout {
    name: "mips32",
    names: &NAMES,
    numeric_prefix: 'r',
    gpr_count: 32,
    bits: 32,
    pc: PC,
    zero: Some(ZERO),
};

/// The MIPS32 backend.
#[derive(Debug)]
pub struct MipsBackend {
    mode: Mode,
}

impl MipsBackend {
    /// Creates a backend for `mode`.
    ///
    /// # Errors
    ///
    /// `UnsupportedMode` for 64-bit modes.
    pub fn new(mode: Mode) -> Result<Self, ConfigError> {
        if mode.width != Width::Bits32 {
            return Err(ConfigError::UnsupportedMode {
                arch: Arch::Mips,
                mode,
            });
        }
        Ok(Self { mode })
    }
}

impl Backend for MipsBackend {
    fn arch(&self) -> Arch {
        Arch::Mips
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn layout(&self) -> &'static RegisterLayout {
        &LAYOUT
    }

    fn min_insn_len(&self) -> usize {
        INSTRUCTION_SIZE_32 as usize
    }

    fn max_insn_len(&self) -> usize {
        INSTRUCTION_SIZE_32 as usize
    }

    fn decode(&self, address: u64, bytes: &[u8]) -> Result<Instruction, DecodeError> {
        let Some(bytes) = bytes.get(..4) else {
            return Err(DecodeError::Truncated {
                needed: 4,
                available: bytes.len(),
            });
        };
        let word = self.mode.endian.read(bytes) as u32;
        let class = decode::classify(word).ok_or(DecodeError::UnknownOpcode(u64::from(word)))?;
        Ok(Instruction {
            address,
            len: 4,
            raw: u64::from(word),
            ends_block: class != Class::Plain,
            has_delay_slot: class == Class::Delayed,
        })
    }

    fn execute(
        &self,
        insn: &Instruction,
        guest: &mut dyn Guest,
    ) -> Result<EngineEffect, ExecFault> {
        execute::execute(insn, guest)
    }
}
