//! RISC-V Base Integer Major Opcodes.
//!
//! The low two bits of every 32-bit encoding are `0b11`; the remaining five
//! select the instruction group.

/// Loads (LB, LH, LW, LD, LBU, LHU, LWU).
pub const OP_LOAD: u32 = 0b000_0011;

/// FENCE / FENCE.I.
pub const OP_MISC_MEM: u32 = 0b000_1111;

/// Register-immediate arithmetic (ADDI, SLTI, SLLI, ...).
pub const OP_IMM: u32 = 0b001_0011;

/// Add Upper Immediate to PC.
pub const OP_AUIPC: u32 = 0b001_0111;

/// 32-bit register-immediate arithmetic (ADDIW, SLLIW, ...). RV64 only.
pub const OP_IMM_32: u32 = 0b001_1011;

/// Stores (SB, SH, SW, SD).
pub const OP_STORE: u32 = 0b010_0011;

/// Register-register arithmetic (ADD, SUB, SLL, ...).
pub const OP_REG: u32 = 0b011_0011;

/// Load Upper Immediate.
pub const OP_LUI: u32 = 0b011_0111;

/// 32-bit register-register arithmetic (ADDW, SUBW, ...). RV64 only.
pub const OP_REG_32: u32 = 0b011_1011;

/// Conditional branches.
pub const OP_BRANCH: u32 = 0b110_0011;

/// Jump And Link Register.
pub const OP_JALR: u32 = 0b110_0111;

/// Jump And Link.
pub const OP_JAL: u32 = 0b110_1111;

/// ECALL / EBREAK.
pub const OP_SYSTEM: u32 = 0b111_0011;

/// Full encoding of ECALL.
pub const ECALL: u32 = 0x0000_0073;

/// Full encoding of EBREAK.
pub const EBREAK: u32 = 0x0010_0073;
