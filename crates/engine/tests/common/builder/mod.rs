/// MIPS32 encoders.
pub mod mips;
