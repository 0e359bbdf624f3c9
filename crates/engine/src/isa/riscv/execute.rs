//! RISC-V Instruction Semantics.
//!
//! Executes RV32I/RV64I against the guest. Arithmetic is carried out in 64
//! bits; on RV32 the register bank truncates results to 32 bits and operands
//! are reinterpreted through [`Xlen::signed`] wherever signedness matters.
//! Misaligned loads and stores are permitted.

use super::decode::decode;
use super::instruction::Decoded;
use super::rv64i::{funct3, funct7, opcodes};
use crate::core::regs::RegId;
use crate::isa::{EngineEffect, ExecFault, Guest, Instruction, Width};

/// Interrupt number raised by ECALL (environment call from M-mode).
pub const CAUSE_ECALL: u32 = 11;

/// Interrupt number raised by EBREAK (breakpoint).
pub const CAUSE_BREAKPOINT: u32 = 3;

/// Register width helpers.
#[derive(Clone, Copy, Debug)]
pub struct Xlen(Width);

impl Xlen {
    /// Creates helpers for `width`.
    pub const fn new(width: Width) -> Self {
        Self(width)
    }

    const fn rv64(self) -> bool {
        matches!(self.0, Width::Bits64)
    }

    /// Interprets a register value as signed at this width.
    const fn signed(self, v: u64) -> i64 {
        if self.rv64() { v as i64 } else { v as u32 as i32 as i64 }
    }

    /// Truncates an address to this width.
    const fn addr(self, v: u64) -> u64 {
        if self.rv64() { v } else { v & 0xFFFF_FFFF }
    }

    const fn shamt_mask(self) -> u64 {
        if self.rv64() { 0x3F } else { 0x1F }
    }
}

/// Executes an RV32I/RV64I instruction.
///
/// # Errors
///
/// Memory faults from loads and stores, and `InvalidInstruction` for encodings
/// the decoder would have rejected.
pub fn execute(
    insn: &Instruction,
    xlen: Xlen,
    g: &mut dyn Guest,
) -> Result<EngineEffect, ExecFault> {
    let d = decode(insn.raw as u32);
    let pc = insn.address;
    let a = read(g, d.rs1);
    let b = read(g, d.rs2);
    let invalid = || ExecFault::invalid_instruction(pc);

    match d.opcode {
        opcodes::OP_LUI => write(g, d.rd, d.imm as u64),
        opcodes::OP_AUIPC => write(g, d.rd, pc.wrapping_add(d.imm as u64)),
        opcodes::OP_JAL => {
            write(g, d.rd, insn.next());
            return Ok(EngineEffect::Branch(xlen.addr(pc.wrapping_add(d.imm as u64))));
        }
        opcodes::OP_JALR => {
            let target = xlen.addr(a.wrapping_add(d.imm as u64)) & !1;
            write(g, d.rd, insn.next());
            return Ok(EngineEffect::Branch(target));
        }
        opcodes::OP_BRANCH => {
            let (sa, sb) = (xlen.signed(a), xlen.signed(b));
            let taken = match d.funct3 {
                funct3::BEQ => a == b,
                funct3::BNE => a != b,
                funct3::BLT => sa < sb,
                funct3::BGE => sa >= sb,
                funct3::BLTU => a < b,
                funct3::BGEU => a >= b,
                _ => return Err(invalid()),
            };
            if taken {
                return Ok(EngineEffect::Branch(xlen.addr(pc.wrapping_add(d.imm as u64))));
            }
        }
        opcodes::OP_LOAD => {
            let addr = xlen.addr(a.wrapping_add(d.imm as u64));
            let value = match d.funct3 {
                funct3::LB => g.load(addr, 1)? as u8 as i8 as u64,
                funct3::LH => g.load(addr, 2)? as u16 as i16 as u64,
                funct3::LW => g.load(addr, 4)? as u32 as i32 as u64,
                funct3::LD => g.load(addr, 8)?,
                funct3::LBU => g.load(addr, 1)?,
                funct3::LHU => g.load(addr, 2)?,
                funct3::LWU => g.load(addr, 4)?,
                _ => return Err(invalid()),
            };
            write(g, d.rd, value);
        }
        opcodes::OP_STORE => {
            let addr = xlen.addr(a.wrapping_add(d.imm as u64));
            let size = match d.funct3 {
                funct3::SB => 1,
                funct3::SH => 2,
                funct3::SW => 4,
                funct3::SD => 8,
                _ => return Err(invalid()),
            };
            g.store(addr, size, b)?;
        }
        opcodes::OP_IMM => {
            let value = alu(&d, a, d.imm as u64, xlen, true).ok_or_else(invalid)?;
            write(g, d.rd, value);
        }
        opcodes::OP_REG => {
            let value = alu(&d, a, b, xlen, false).ok_or_else(invalid)?;
            write(g, d.rd, value);
        }
        opcodes::OP_IMM_32 | opcodes::OP_REG_32 => {
            let rhs = if d.opcode == opcodes::OP_IMM_32 { d.imm as u64 } else { b };
            let value = alu_word(&d, a, rhs, d.opcode == opcodes::OP_IMM_32)
                .ok_or_else(invalid)?;
            write(g, d.rd, value);
        }
        // Single hart, no instruction cache to flush: FENCE and FENCE.I are no-ops.
        opcodes::OP_MISC_MEM => {}
        opcodes::OP_SYSTEM => {
            return match d.raw {
                opcodes::ECALL => Ok(EngineEffect::Interrupt(CAUSE_ECALL)),
                opcodes::EBREAK => Ok(EngineEffect::Interrupt(CAUSE_BREAKPOINT)),
                _ => Err(invalid()),
            };
        }
        _ => return Err(invalid()),
    }
    Ok(EngineEffect::Next)
}

/// XLEN-wide integer operation shared by OP and OP-IMM.
fn alu(d: &Decoded, a: u64, b: u64, xlen: Xlen, imm: bool) -> Option<u64> {
    let sh = b & xlen.shamt_mask();
    let alt = if imm {
        // Immediate shifts carry the SRA selector in imm[10].
        d.funct3 == funct3::SRL_SRA && (d.funct7 & funct7::ALT) != 0
    } else {
        d.funct7 == funct7::ALT
    };
    Some(match d.funct3 {
        funct3::ADD_SUB if alt && !imm => a.wrapping_sub(b),
        funct3::ADD_SUB => a.wrapping_add(b),
        funct3::SLL => a << sh,
        funct3::SLT => u64::from(xlen.signed(a) < xlen.signed(b)),
        funct3::SLTU => u64::from(xlen.addr(a) < xlen.addr(b)),
        funct3::XOR => a ^ b,
        funct3::SRL_SRA if alt => (xlen.signed(a) >> sh) as u64,
        funct3::SRL_SRA => xlen.addr(a) >> sh,
        funct3::OR => a | b,
        funct3::AND => a & b,
        _ => return None,
    })
}

/// RV64 `*W` operations: 32-bit result, sign-extended.
fn alu_word(d: &Decoded, a: u64, b: u64, imm: bool) -> Option<u64> {
    let (a32, b32) = (a as u32, b as u32);
    let sh = b32 & 0x1F;
    let alt = d.funct7 == funct7::ALT;
    let result = match d.funct3 {
        funct3::ADD_SUB if alt && !imm => a32.wrapping_sub(b32),
        funct3::ADD_SUB => a32.wrapping_add(b32),
        funct3::SLL => a32 << sh,
        funct3::SRL_SRA if alt => ((a32 as i32) >> sh) as u32,
        funct3::SRL_SRA => a32 >> sh,
        _ => return None,
    };
    Some(result as i32 as i64 as u64)
}

fn read(g: &dyn Guest, index: usize) -> u64 {
    g.reg(RegId(index as u16))
}

fn write(g: &mut dyn Guest, index: usize, value: u64) {
    g.set_reg(RegId(index as u16), value);
}
