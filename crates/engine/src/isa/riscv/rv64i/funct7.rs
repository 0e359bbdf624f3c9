//! RISC-V Base Integer Function Codes (funct7).

/// Default operation (ADD, SRL, ...).
pub const DEFAULT: u32 = 0b000_0000;

/// Alternate operation (SUB, SRA).
pub const ALT: u32 = 0b010_0000;
