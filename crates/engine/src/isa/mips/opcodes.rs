//! MIPS32 Opcode, Function, and Exception Codes.
//!
//! The primary opcode lives in bits 31-26. `SPECIAL` instructions select their
//! operation with the `funct` field (bits 5-0), `REGIMM` branches with the `rt`
//! field (bits 20-16), and `SPECIAL2` with `funct` again.

/// R-type instructions selected by `funct`.
pub const SPECIAL: u32 = 0x00;
/// Register-immediate branches selected by `rt`.
pub const REGIMM: u32 = 0x01;
/// Jump.
pub const J: u32 = 0x02;
/// Jump And Link.
pub const JAL: u32 = 0x03;
/// Branch on Equal.
pub const BEQ: u32 = 0x04;
/// Branch on Not Equal.
pub const BNE: u32 = 0x05;
/// Branch on Less Than or Equal to Zero.
pub const BLEZ: u32 = 0x06;
/// Branch on Greater Than Zero.
pub const BGTZ: u32 = 0x07;
/// Add Immediate (traps on overflow).
pub const ADDI: u32 = 0x08;
/// Add Immediate Unsigned (no trap).
pub const ADDIU: u32 = 0x09;
/// Set on Less Than Immediate.
pub const SLTI: u32 = 0x0A;
/// Set on Less Than Immediate Unsigned.
pub const SLTIU: u32 = 0x0B;
/// And Immediate.
pub const ANDI: u32 = 0x0C;
/// Or Immediate.
pub const ORI: u32 = 0x0D;
/// Exclusive Or Immediate.
pub const XORI: u32 = 0x0E;
/// Load Upper Immediate.
pub const LUI: u32 = 0x0F;
/// MIPS32 additions selected by `funct`.
pub const SPECIAL2: u32 = 0x1C;
/// Load Byte.
pub const LB: u32 = 0x20;
/// Load Halfword.
pub const LH: u32 = 0x21;
/// Load Word.
pub const LW: u32 = 0x23;
/// Load Byte Unsigned.
pub const LBU: u32 = 0x24;
/// Load Halfword Unsigned.
pub const LHU: u32 = 0x25;
/// Store Byte.
pub const SB: u32 = 0x28;
/// Store Halfword.
pub const SH: u32 = 0x29;
/// Store Word.
pub const SW: u32 = 0x2B;

/// `SPECIAL` function codes.
pub mod funct {
    /// Shift Left Logical (also NOP).
    pub const SLL: u32 = 0x00;
    /// Shift Right Logical.
    pub const SRL: u32 = 0x02;
    /// Shift Right Arithmetic.
    pub const SRA: u32 = 0x03;
    /// Shift Left Logical Variable.
    pub const SLLV: u32 = 0x04;
    /// Shift Right Logical Variable.
    pub const SRLV: u32 = 0x06;
    /// Shift Right Arithmetic Variable.
    pub const SRAV: u32 = 0x07;
    /// Jump Register.
    pub const JR: u32 = 0x08;
    /// Jump And Link Register.
    pub const JALR: u32 = 0x09;
    /// Move Conditional on Zero.
    pub const MOVZ: u32 = 0x0A;
    /// Move Conditional on Not Zero.
    pub const MOVN: u32 = 0x0B;
    /// System Call.
    pub const SYSCALL: u32 = 0x0C;
    /// Breakpoint.
    pub const BREAK: u32 = 0x0D;
    /// Move From HI.
    pub const MFHI: u32 = 0x10;
    /// Move To HI.
    pub const MTHI: u32 = 0x11;
    /// Move From LO.
    pub const MFLO: u32 = 0x12;
    /// Move To LO.
    pub const MTLO: u32 = 0x13;
    /// Multiply Word.
    pub const MULT: u32 = 0x18;
    /// Multiply Unsigned Word.
    pub const MULTU: u32 = 0x19;
    /// Divide Word.
    pub const DIV: u32 = 0x1A;
    /// Divide Unsigned Word.
    pub const DIVU: u32 = 0x1B;
    /// Add Word (traps on overflow).
    pub const ADD: u32 = 0x20;
    /// Add Unsigned Word.
    pub const ADDU: u32 = 0x21;
    /// Subtract Word (traps on overflow).
    pub const SUB: u32 = 0x22;
    /// Subtract Unsigned Word.
    pub const SUBU: u32 = 0x23;
    /// And.
    pub const AND: u32 = 0x24;
    /// Or.
    pub const OR: u32 = 0x25;
    /// Exclusive Or.
    pub const XOR: u32 = 0x26;
    /// Not Or.
    pub const NOR: u32 = 0x27;
    /// Set on Less Than.
    pub const SLT: u32 = 0x2A;
    /// Set on Less Than Unsigned.
    pub const SLTU: u32 = 0x2B;
}

/// `REGIMM` selectors (the `rt` field).
pub mod regimm {
    /// Branch on Less Than Zero.
    pub const BLTZ: u32 = 0x00;
    /// Branch on Greater Than or Equal to Zero.
    pub const BGEZ: u32 = 0x01;
    /// Branch on Less Than Zero And Link.
    pub const BLTZAL: u32 = 0x10;
    /// Branch on Greater Than or Equal to Zero And Link.
    pub const BGEZAL: u32 = 0x11;
}

/// `SPECIAL2` function codes.
pub mod special2 {
    /// Multiply Word to GPR.
    pub const MUL: u32 = 0x02;
}

/// Exception codes (Cause.ExcCode) reported as interrupt numbers.
pub mod exc {
    /// System call.
    pub const SYSCALL: u32 = 8;
    /// Breakpoint.
    pub const BREAKPOINT: u32 = 9;
    /// Integer overflow from ADD, ADDI or SUB.
    pub const OVERFLOW: u32 = 12;
}
