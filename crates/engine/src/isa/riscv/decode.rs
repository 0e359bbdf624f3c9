//! RISC-V Instruction Decoder.
//!
//! Splits a 32-bit encoding into its fields and reassembles the immediate of
//! each format (I, S, B, U, J), sign-extended to 64 bits. Validation of the
//! opcode/funct combinations lives in [`validate`], which the backend runs
//! before an instruction is cached.

use super::instruction::{Decoded, InstructionBits};
use super::rv64i::{funct3, funct7, opcodes};
use crate::isa::Width;

/// Decodes the fields and immediate of an instruction word.
pub fn decode(inst: u32) -> Decoded {
    let opcode = inst.opcode();
    let imm = match opcode {
        opcodes::OP_IMM | opcodes::OP_IMM_32 | opcodes::OP_LOAD | opcodes::OP_JALR => imm_i(inst),
        opcodes::OP_STORE => imm_s(inst),
        opcodes::OP_BRANCH => imm_b(inst),
        opcodes::OP_LUI | opcodes::OP_AUIPC => imm_u(inst),
        opcodes::OP_JAL => imm_j(inst),
        _ => 0,
    };

    Decoded {
        raw: inst,
        opcode,
        rd: inst.rd(),
        rs1: inst.rs1(),
        rs2: inst.rs2(),
        funct3: inst.funct3(),
        funct7: inst.funct7(),
        imm,
    }
}

/// Control-flow class of a valid instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Class {
    /// Falls through.
    Plain,
    /// JAL, JALR, or a conditional branch.
    Jump,
    /// ECALL or EBREAK.
    Trap,
}

/// Checks that `d` is an RV32I/RV64I instruction valid at `width`.
pub fn validate(d: &Decoded, width: Width) -> Option<Class> {
    let rv64 = width == Width::Bits64;
    // Shift-immediate funct7 keeps bit 0 for shamt[5] on RV64.
    let shift_hi = if rv64 { d.funct7 & !1 } else { d.funct7 };
    let plain = |ok: bool| ok.then_some(Class::Plain);

    match d.opcode {
        opcodes::OP_LUI | opcodes::OP_AUIPC => Some(Class::Plain),
        opcodes::OP_JAL => Some(Class::Jump),
        opcodes::OP_JALR => (d.funct3 == funct3::JALR).then_some(Class::Jump),
        opcodes::OP_BRANCH => {
            (!matches!(d.funct3, 0b010 | 0b011)).then_some(Class::Jump)
        }
        opcodes::OP_LOAD => plain(match d.funct3 {
            funct3::LB | funct3::LH | funct3::LW | funct3::LBU | funct3::LHU => true,
            funct3::LD | funct3::LWU => rv64,
            _ => false,
        }),
        opcodes::OP_STORE => plain(match d.funct3 {
            funct3::SB | funct3::SH | funct3::SW => true,
            funct3::SD => rv64,
            _ => false,
        }),
        opcodes::OP_IMM => plain(match d.funct3 {
            funct3::SLL => shift_hi == funct7::DEFAULT,
            funct3::SRL_SRA => shift_hi == funct7::DEFAULT || shift_hi == funct7::ALT,
            _ => true,
        }),
        opcodes::OP_REG => plain(
            d.funct7 == funct7::DEFAULT
                || (d.funct7 == funct7::ALT
                    && matches!(d.funct3, funct3::ADD_SUB | funct3::SRL_SRA)),
        ),
        opcodes::OP_IMM_32 => plain(
            rv64
                && match d.funct3 {
                    funct3::ADD_SUB => true,
                    funct3::SLL => d.funct7 == funct7::DEFAULT,
                    funct3::SRL_SRA => d.funct7 == funct7::DEFAULT || d.funct7 == funct7::ALT,
                    _ => false,
                },
        ),
        opcodes::OP_REG_32 => plain(
            rv64
                && match d.funct3 {
                    funct3::ADD_SUB | funct3::SRL_SRA => {
                        d.funct7 == funct7::DEFAULT || d.funct7 == funct7::ALT
                    }
                    funct3::SLL => d.funct7 == funct7::DEFAULT,
                    _ => false,
                },
        ),
        opcodes::OP_MISC_MEM => plain(matches!(d.funct3, funct3::FENCE | funct3::FENCE_I)),
        opcodes::OP_SYSTEM => match d.raw {
            opcodes::ECALL | opcodes::EBREAK => Some(Class::Trap),
            _ => None,
        },
        _ => None,
    }
}

/// I-type: `imm[11:0] | rs1 | funct3 | rd | opcode`.
fn imm_i(inst: u32) -> i64 {
    i64::from((inst as i32) >> 20)
}

/// S-type: `imm[11:5] | rs2 | rs1 | funct3 | imm[4:0] | opcode`.
fn imm_s(inst: u32) -> i64 {
    let hi = (inst as i32) >> 25;
    let lo = ((inst >> 7) & 0x1F) as i32;
    i64::from((hi << 5) | lo)
}

/// B-type: `imm[12] | imm[10:5] | rs2 | rs1 | funct3 | imm[4:1] | imm[11] | opcode`.
fn imm_b(inst: u32) -> i64 {
    let bit_11 = (inst >> 7) & 1;
    let bits_4_1 = (inst >> 8) & 0xF;
    let bits_10_5 = (inst >> 25) & 0x3F;
    let bit_12 = inst >> 31;
    let combined = (bit_12 << 12) | (bit_11 << 11) | (bits_10_5 << 5) | (bits_4_1 << 1);
    sign_extend(combined, 13)
}

/// U-type: `imm[31:12] | rd | opcode`, already shifted into place.
fn imm_u(inst: u32) -> i64 {
    i64::from((inst & 0xFFFF_F000) as i32)
}

/// J-type: `imm[20] | imm[10:1] | imm[11] | imm[19:12] | rd | opcode`.
fn imm_j(inst: u32) -> i64 {
    let bits_19_12 = (inst >> 12) & 0xFF;
    let bit_11 = (inst >> 20) & 1;
    let bits_10_1 = (inst >> 21) & 0x3FF;
    let bit_20 = inst >> 31;
    let combined = (bit_20 << 20) | (bits_19_12 << 12) | (bit_11 << 11) | (bits_10_1 << 1);
    sign_extend(combined, 21)
}

/// Sign-extends the low `bits` of `val`.
fn sign_extend(val: u32, bits: u32) -> i64 {
    let shift = 32 - bits;
    i64::from(((val as i32) << shift) >> shift)
}
