//! RISC-V Backend (RV32I / RV64I).
//!
//! Implements the base integer instruction set in little-endian mode. Compressed
//! encodings are not supported, so every instruction is four bytes.
//!
//! # Conventions
//!
//! * Jumps and taken or untaken conditional branches end the basic block. There
//!   are no delay slots.
//! * `ECALL` raises interrupt 11 and `EBREAK` raises interrupt 3.
//! * On RV32 registers are 32 bits wide; narrow host writes are sign-extended.

/// ABI register names and identifiers.
pub mod abi;

/// Field extraction, immediates, and validation.
pub mod decode;

/// Instruction semantics.
pub mod execute;

/// Encoded instruction fields.
pub mod instruction;

/// Base integer opcodes and function codes.
pub mod rv64i;

use crate::common::constants::INSTRUCTION_SIZE_32;
use crate::common::{ConfigError, DecodeError};
use crate::core::regs::RegisterLayout;
use crate::isa::{
    Arch, Backend, Endian, EngineEffect, ExecFault, Guest, Instruction, Mode, Width,
};
use decode::Class;
use execute::Xlen;

/// RV32I register file: `x0`-`x31` and `pc`, 32 bits wide.
pub static LAYOUT_RV32: RegisterLayout = RegisterLayout {
    name: "rv32",
    names: &abi::NAMES,
    numeric_prefix: 'x',
    gpr_count: 32,
    bits: 32,
    pc: abi::PC,
    zero: Some(abi::ZERO),
};

/// RV64I register file: `x0`-`x31` and `pc`, 64 bits wide.
pub static LAYOUT_RV64: RegisterLayout = RegisterLayout {
    name: "rv64",
    names: &abi::NAMES,
    numeric_prefix: 'x',
    gpr_count: 32,
    bits: 64,
    pc: abi::PC,
    zero: Some(abi::ZERO),
};

/// The RISC-V backend.
#[derive(Debug)]
pub struct RiscVBackend {
    mode: Mode,
}

impl RiscVBackend {
    /// Creates a backend for `mode`.
    ///
    /// # Errors
    ///
    /// `UnsupportedMode` for big-endian modes.
    pub fn new(mode: Mode) -> Result<Self, ConfigError> {
        if mode.endian != Endian::Little {
            return Err(ConfigError::UnsupportedMode {
                arch: Arch::RiscV,
                mode,
            });
        }
        Ok(Self { mode })
    }
}

impl Backend for RiscVBackend {
    fn arch(&self) -> Arch {
        Arch::RiscV
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn layout(&self) -> &'static RegisterLayout {
        match self.mode.width {
            Width::Bits32 => &LAYOUT_RV32,
            Width::Bits64 => &LAYOUT_RV64,
        }
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
        let word = Endian::Little.read(bytes) as u32;
        let class = decode::validate(&decode::decode(word), self.mode.width)
            .ok_or(DecodeError::UnknownOpcode(u64::from(word)))?;
        Ok(Instruction {
            address,
            len: 4,
            raw: u64::from(word),
            ends_block: class != Class::Plain,
            has_delay_slot: false,
        })
    }

    fn execute(
        &self,
        insn: &Instruction,
        guest: &mut dyn Guest,
    ) -> Result<EngineEffect, ExecFault> {
        execute::execute(insn, Xlen::new(self.mode.width), guest)
    }
}
