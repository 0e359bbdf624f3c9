//! RISC-V ABI Register Names.
//!
//! Index `n` of [`NAMES`] is register `xn`; index 32 is pc.

use crate::core::regs::RegId;

/// ABI names of `x0`-`x31` followed by `pc`.
pub static NAMES: [&str; 33] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6", "pc",
];

/// Register x0 (hard-wired zero).
pub const ZERO: RegId = RegId(0);
/// Register x1 (return address, ra).
pub const RA: RegId = RegId(1);
/// Register x2 (stack pointer, sp).
pub const SP: RegId = RegId(2);
/// Register x10 (first argument / return value, a0).
pub const A0: RegId = RegId(10);
/// Register x11 (second argument, a1).
pub const A1: RegId = RegId(11);
/// Register x17 (system call number, a7).
pub const A7: RegId = RegId(17);
/// Program counter.
pub const PC: RegId = RegId(32);

/// Integer register `xn` (0-31).
pub const fn x(n: u16) -> RegId {
    RegId(n)
}
