//! RISC-V Base Integer Encodings (RV32I / RV64I).
//!
//! # Structure
//!
//! - `opcodes`: Major opcodes (bits 6-0).
//! - `funct3`: Minor opcodes within a major opcode (bits 14-12).
//! - `funct7`: Alternate-encoding selector for R-type and shift instructions (bits 31-25).

/// Function code 3 definitions.
pub mod funct3;

/// Function code 7 definitions.
pub mod funct7;

/// Major opcodes.
pub mod opcodes;
