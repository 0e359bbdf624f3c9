//! MIPS32 Instruction Semantics.
//!
//! Executes one decoded word against the guest. All arithmetic is 32-bit;
//! registers are read before any write so `rd == rs` forms behave as on hardware.
//! Branches compute their target relative to the delay slot and return
//! [`EngineEffect::DelayedBranch`] when taken.

use super::decode::MipsFields;
use super::opcodes::{self, exc, funct, regimm, special2};
use super::{HI, LO, RA};
use crate::common::AccessType;
use crate::core::regs::RegId;
use crate::isa::{EngineEffect, ExecFault, Guest, Instruction};

/// Executes a MIPS32 instruction.
///
/// # Errors
///
/// Memory faults from loads and stores, `Unaligned` for misaligned halfword or
/// word accesses, and `InvalidInstruction` for words the decoder would reject.
pub fn execute(insn: &Instruction, g: &mut dyn Guest) -> Result<EngineEffect, ExecFault> {
    let word = insn.raw as u32;
    let a = read(g, word.rs());
    let b = read(g, word.rt());

    let effect = match word.opcode() {
        opcodes::SPECIAL => return special(insn, word, a, b, g),
        opcodes::REGIMM => {
            let rt = word.rt();
            let taken = match rt {
                regimm::BLTZ | regimm::BLTZAL => (a as i32) < 0,
                regimm::BGEZ | regimm::BGEZAL => (a as i32) >= 0,
                _ => return Err(ExecFault::invalid_instruction(insn.address)),
            };
            if rt == regimm::BLTZAL || rt == regimm::BGEZAL {
                g.set_reg(RA, link(insn));
            }
            branch(taken, insn, word)
        }
        opcodes::J => EngineEffect::DelayedBranch(jump_target(insn, word)),
        opcodes::JAL => {
            g.set_reg(RA, link(insn));
            EngineEffect::DelayedBranch(jump_target(insn, word))
        }
        opcodes::BEQ => branch(a == b, insn, word),
        opcodes::BNE => branch(a != b, insn, word),
        opcodes::BLEZ => branch((a as i32) <= 0, insn, word),
        opcodes::BGTZ => branch((a as i32) > 0, insn, word),
        opcodes::ADDI => match (a as i32).checked_add(word.simm()) {
            Some(v) => {
                write(g, word.rt(), v as u32);
                EngineEffect::Next
            }
            None => EngineEffect::Interrupt(exc::OVERFLOW),
        },
        opcodes::ADDIU => {
            write(g, word.rt(), a.wrapping_add(word.simm() as u32));
            EngineEffect::Next
        }
        opcodes::SLTI => {
            write(g, word.rt(), u32::from((a as i32) < word.simm()));
            EngineEffect::Next
        }
        opcodes::SLTIU => {
            write(g, word.rt(), u32::from(a < word.simm() as u32));
            EngineEffect::Next
        }
        opcodes::ANDI => {
            write(g, word.rt(), a & word.imm());
            EngineEffect::Next
        }
        opcodes::ORI => {
            write(g, word.rt(), a | word.imm());
            EngineEffect::Next
        }
        opcodes::XORI => {
            write(g, word.rt(), a ^ word.imm());
            EngineEffect::Next
        }
        opcodes::LUI => {
            write(g, word.rt(), word.imm() << 16);
            EngineEffect::Next
        }
        opcodes::SPECIAL2 if word.funct() == special2::MUL => {
            write(g, word.rd(), (a as i32).wrapping_mul(b as i32) as u32);
            EngineEffect::Next
        }
        opcodes::LB | opcodes::LH | opcodes::LW | opcodes::LBU | opcodes::LHU => {
            let addr = u64::from(a.wrapping_add(word.simm() as u32));
            let value = match word.opcode() {
                opcodes::LB => g.load(addr, 1)? as u8 as i8 as u32,
                opcodes::LBU => g.load(addr, 1)? as u32,
                opcodes::LH => g.load(aligned(addr, 2, AccessType::Read)?, 2)? as u16 as i16 as u32,
                opcodes::LHU => g.load(aligned(addr, 2, AccessType::Read)?, 2)? as u32,
                _ => g.load(aligned(addr, 4, AccessType::Read)?, 4)? as u32,
            };
            write(g, word.rt(), value);
            EngineEffect::Next
        }
        opcodes::SB => {
            let addr = u64::from(a.wrapping_add(word.simm() as u32));
            g.store(addr, 1, u64::from(b & 0xFF))?;
            EngineEffect::Next
        }
        opcodes::SH => {
            let addr = u64::from(a.wrapping_add(word.simm() as u32));
            g.store(aligned(addr, 2, AccessType::Write)?, 2, u64::from(b & 0xFFFF))?;
            EngineEffect::Next
        }
        opcodes::SW => {
            let addr = u64::from(a.wrapping_add(word.simm() as u32));
            g.store(aligned(addr, 4, AccessType::Write)?, 4, u64::from(b))?;
            EngineEffect::Next
        }
        _ => return Err(ExecFault::invalid_instruction(insn.address)),
    };
    Ok(effect)
}

fn special(
    insn: &Instruction,
    word: u32,
    a: u32,
    b: u32,
    g: &mut dyn Guest,
) -> Result<EngineEffect, ExecFault> {
    let rd = word.rd();
    let shamt = word.shamt();
    let result = match word.funct() {
        funct::SLL => b << shamt,
        funct::SRL => b >> shamt,
        funct::SRA => ((b as i32) >> shamt) as u32,
        funct::SLLV => b << (a & 0x1F),
        funct::SRLV => b >> (a & 0x1F),
        funct::SRAV => ((b as i32) >> (a & 0x1F)) as u32,
        funct::JR => return Ok(EngineEffect::DelayedBranch(u64::from(a))),
        funct::JALR => {
            write(g, rd, link(insn) as u32);
            return Ok(EngineEffect::DelayedBranch(u64::from(a)));
        }
        funct::MOVZ => {
            if b == 0 {
                write(g, rd, a);
            }
            return Ok(EngineEffect::Next);
        }
        funct::MOVN => {
            if b != 0 {
                write(g, rd, a);
            }
            return Ok(EngineEffect::Next);
        }
        funct::SYSCALL => return Ok(EngineEffect::Interrupt(exc::SYSCALL)),
        funct::BREAK => return Ok(EngineEffect::Interrupt(exc::BREAKPOINT)),
        funct::MFHI => g.reg(HI) as u32,
        funct::MFLO => g.reg(LO) as u32,
        funct::MTHI => {
            g.set_reg(HI, u64::from(a));
            return Ok(EngineEffect::Next);
        }
        funct::MTLO => {
            g.set_reg(LO, u64::from(a));
            return Ok(EngineEffect::Next);
        }
        funct::MULT => {
            let product = i64::from(a as i32) * i64::from(b as i32);
            set_hilo(g, (product >> 32) as u32, product as u32);
            return Ok(EngineEffect::Next);
        }
        funct::MULTU => {
            let product = u64::from(a) * u64::from(b);
            set_hilo(g, (product >> 32) as u32, product as u32);
            return Ok(EngineEffect::Next);
        }
        funct::DIV => {
            // Division by zero leaves HI/LO unpredictable; we leave them untouched.
            if b != 0 {
                let (n, d) = (a as i32, b as i32);
                set_hilo(g, n.wrapping_rem(d) as u32, n.wrapping_div(d) as u32);
            }
            return Ok(EngineEffect::Next);
        }
        funct::DIVU => {
            if b != 0 {
                set_hilo(g, a % b, a / b);
            }
            return Ok(EngineEffect::Next);
        }
        funct::ADD => match (a as i32).checked_add(b as i32) {
            Some(v) => v as u32,
            None => return Ok(EngineEffect::Interrupt(exc::OVERFLOW)),
        },
        funct::ADDU => a.wrapping_add(b),
        funct::SUB => match (a as i32).checked_sub(b as i32) {
            Some(v) => v as u32,
            None => return Ok(EngineEffect::Interrupt(exc::OVERFLOW)),
        },
        funct::SUBU => a.wrapping_sub(b),
        funct::AND => a & b,
        funct::OR => a | b,
        funct::XOR => a ^ b,
        funct::NOR => !(a | b),
        funct::SLT => u32::from((a as i32) < (b as i32)),
        funct::SLTU => u32::from(a < b),
        _ => return Err(ExecFault::invalid_instruction(insn.address)),
    };
    write(g, rd, result);
    Ok(EngineEffect::Next)
}

fn read(g: &dyn Guest, index: u32) -> u32 {
    g.reg(RegId(index as u16)) as u32
}

fn write(g: &mut dyn Guest, index: u32, value: u32) {
    g.set_reg(RegId(index as u16), u64::from(value));
}

fn set_hilo(g: &mut dyn Guest, hi: u32, lo: u32) {
    g.set_reg(HI, u64::from(hi));
    g.set_reg(LO, u64::from(lo));
}

/// Return address: the instruction after the delay slot.
fn link(insn: &Instruction) -> u64 {
    insn.address.wrapping_add(8) & 0xFFFF_FFFF
}

fn branch(taken: bool, insn: &Instruction, word: u32) -> EngineEffect {
    if taken {
        let slot = insn.address.wrapping_add(4) as u32;
        let target = slot.wrapping_add((word.simm() << 2) as u32);
        EngineEffect::DelayedBranch(u64::from(target))
    } else {
        EngineEffect::Next
    }
}

/// J/JAL stay within the 256 MiB segment of the delay slot.
fn jump_target(insn: &Instruction, word: u32) -> u64 {
    let slot = insn.address.wrapping_add(4) as u32;
    u64::from((slot & 0xF000_0000) | (word.target() << 2))
}

fn aligned(addr: u64, size: u64, access: AccessType) -> Result<u64, ExecFault> {
    if addr % size == 0 {
        Ok(addr)
    } else {
        Err(ExecFault::unaligned(access, addr))
    }
}
