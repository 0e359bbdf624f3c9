//! MIPS32 Instruction Decoder.
//!
//! Extracts the fixed fields of the R, I and J formats and classifies a word
//! by its control-flow behaviour. Classification doubles as validation: a word
//! that does not classify is not an instruction this backend implements.

use super::opcodes::{self, funct, regimm, special2};

/// Field extraction for a 32-bit MIPS instruction word.
pub trait MipsFields {
    /// Primary opcode (bits 31-26).
    fn opcode(&self) -> u32;
    /// First source register (bits 25-21).
    fn rs(&self) -> u32;
    /// Second source / I-type destination register (bits 20-16).
    fn rt(&self) -> u32;
    /// R-type destination register (bits 15-11).
    fn rd(&self) -> u32;
    /// Shift amount (bits 10-6).
    fn shamt(&self) -> u32;
    /// R-type function code (bits 5-0).
    fn funct(&self) -> u32;
    /// Zero-extended 16-bit immediate.
    fn imm(&self) -> u32;
    /// Sign-extended 16-bit immediate.
    fn simm(&self) -> i32;
    /// 26-bit jump target index.
    fn target(&self) -> u32;
}

impl MipsFields for u32 {
    #[inline(always)]
    fn opcode(&self) -> u32 {
        self >> 26
    }

    #[inline(always)]
    fn rs(&self) -> u32 {
        (self >> 21) & 0x1F
    }

    #[inline(always)]
    fn rt(&self) -> u32 {
        (self >> 16) & 0x1F
    }

    #[inline(always)]
    fn rd(&self) -> u32 {
        (self >> 11) & 0x1F
    }

    #[inline(always)]
    fn shamt(&self) -> u32 {
        (self >> 6) & 0x1F
    }

    #[inline(always)]
    fn funct(&self) -> u32 {
        self & 0x3F
    }

    #[inline(always)]
    fn imm(&self) -> u32 {
        self & 0xFFFF
    }

    #[inline(always)]
    fn simm(&self) -> i32 {
        i32::from(*self as u16 as i16)
    }

    #[inline(always)]
    fn target(&self) -> u32 {
        self & 0x03FF_FFFF
    }
}

/// Control-flow class of a valid instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Class {
    /// Falls through.
    Plain,
    /// Branch or jump followed by a delay slot.
    Delayed,
    /// Raises an exception unconditionally (SYSCALL, BREAK).
    Trap,
}

/// Classifies an instruction word, or returns `None` if it is not implemented.
pub fn classify(word: u32) -> Option<Class> {
    match word.opcode() {
        opcodes::SPECIAL => match word.funct() {
            funct::JR | funct::JALR => Some(Class::Delayed),
            funct::SYSCALL | funct::BREAK => Some(Class::Trap),
            funct::SLL
            | funct::SRL
            | funct::SRA
            | funct::SLLV
            | funct::SRLV
            | funct::SRAV
            | funct::MOVZ
            | funct::MOVN
            | funct::MFHI
            | funct::MTHI
            | funct::MFLO
            | funct::MTLO
            | funct::MULT
            | funct::MULTU
            | funct::DIV
            | funct::DIVU
            | funct::ADD
            | funct::ADDU
            | funct::SUB
            | funct::SUBU
            | funct::AND
            | funct::OR
            | funct::XOR
            | funct::NOR
            | funct::SLT
            | funct::SLTU => Some(Class::Plain),
            _ => None,
        },
        opcodes::REGIMM => match word.rt() {
            regimm::BLTZ | regimm::BGEZ | regimm::BLTZAL | regimm::BGEZAL => Some(Class::Delayed),
            _ => None,
        },
        opcodes::SPECIAL2 => (word.funct() == special2::MUL).then_some(Class::Plain),
        opcodes::J | opcodes::JAL | opcodes::BEQ | opcodes::BNE | opcodes::BLEZ | opcodes::BGTZ => {
            Some(Class::Delayed)
        }
        opcodes::ADDI
        | opcodes::ADDIU
        | opcodes::SLTI
        | opcodes::SLTIU
        | opcodes::ANDI
        | opcodes::ORI
        | opcodes::XORI
        | opcodes::LUI
        | opcodes::LB
        | opcodes::LH
        | opcodes::LW
        | opcodes::LBU
        | opcodes::LHU
        | opcodes::SB
        | opcodes::SH
        | opcodes::SW => Some(Class::Plain),
        _ => None,
    }
}
