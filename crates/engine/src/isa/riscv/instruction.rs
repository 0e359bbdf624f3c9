//! RISC-V Instruction Fields.
//!
//! Bit extraction for the fixed fields shared by every 32-bit format, and the
//! [`Decoded`] structure the executor works from.

/// Bit mask for the opcode field (bits 0-6).
pub const OPCODE_MASK: u32 = 0x7F;
/// Bit mask for a 5-bit register field.
pub const REG_MASK: u32 = 0x1F;
/// Bit mask for the funct3 field (bits 12-14).
pub const FUNCT3_MASK: u32 = 0x7;
/// Bit mask for the funct7 field (bits 25-31).
pub const FUNCT7_MASK: u32 = 0x7F;

/// Field extraction for encoded instructions.
pub trait InstructionBits {
    /// Opcode field (bits 0-6).
    fn opcode(&self) -> u32;

    /// Destination register (bits 7-11). Writes to x0 are dropped by the register bank.
    fn rd(&self) -> usize;

    /// First source register (bits 15-19).
    fn rs1(&self) -> usize;

    /// Second source register (bits 20-24), also the shift amount of 32-bit shifts.
    fn rs2(&self) -> usize;

    /// Function code 3 (bits 12-14).
    fn funct3(&self) -> u32;

    /// Function code 7 (bits 25-31).
    fn funct7(&self) -> u32;
}

impl InstructionBits for u32 {
    #[inline(always)]
    fn opcode(&self) -> u32 {
        self & OPCODE_MASK
    }

    #[inline(always)]
    fn rd(&self) -> usize {
        ((self >> 7) & REG_MASK) as usize
    }

    #[inline(always)]
    fn rs1(&self) -> usize {
        ((self >> 15) & REG_MASK) as usize
    }

    #[inline(always)]
    fn rs2(&self) -> usize {
        ((self >> 20) & REG_MASK) as usize
    }

    #[inline(always)]
    fn funct3(&self) -> u32 {
        (self >> 12) & FUNCT3_MASK
    }

    #[inline(always)]
    fn funct7(&self) -> u32 {
        (self >> 25) & FUNCT7_MASK
    }
}

/// Decoded instruction fields.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Decoded {
    /// Raw 32-bit encoding.
    pub raw: u32,
    /// Opcode field.
    pub opcode: u32,
    /// Destination register index.
    pub rd: usize,
    /// First source register index.
    pub rs1: usize,
    /// Second source register index.
    pub rs2: usize,
    /// Function code 3.
    pub funct3: u32,
    /// Function code 7.
    pub funct7: u32,
    /// Sign-extended immediate for the instruction's format (0 for R-type).
    pub imm: i64,
}
