//! MIPS32 instruction encoders (register numbers are raw GPR indices).

const fn r(rs: u32, rt: u32, rd: u32, shamt: u32, funct: u32) -> u32 {
    (rs << 21) | (rt << 16) | (rd << 11) | (shamt << 6) | funct
}

const fn i(op: u32, rs: u32, rt: u32, imm: u16) -> u32 {
    (op << 26) | (rs << 21) | (rt << 16) | imm as u32
}

pub const fn nop() -> u32 {
    0
}

pub const fn ori(rt: u32, rs: u32, imm: u16) -> u32 {
    i(0x0D, rs, rt, imm)
}

pub const fn addiu(rt: u32, rs: u32, imm: i16) -> u32 {
    i(0x09, rs, rt, imm as u16)
}

pub const fn addi(rt: u32, rs: u32, imm: i16) -> u32 {
    i(0x08, rs, rt, imm as u16)
}

pub const fn lui(rt: u32, imm: u16) -> u32 {
    i(0x0F, 0, rt, imm)
}

pub const fn lw(rt: u32, offset: i16, base: u32) -> u32 {
    i(0x23, base, rt, offset as u16)
}

pub const fn sw(rt: u32, offset: i16, base: u32) -> u32 {
    i(0x2B, base, rt, offset as u16)
}

pub const fn lb(rt: u32, offset: i16, base: u32) -> u32 {
    i(0x20, base, rt, offset as u16)
}

pub const fn sb(rt: u32, offset: i16, base: u32) -> u32 {
    i(0x28, base, rt, offset as u16)
}

/// `offset` counts instructions relative to the delay slot.
pub const fn beq(rs: u32, rt: u32, offset: i16) -> u32 {
    i(0x04, rs, rt, offset as u16)
}

pub const fn bne(rs: u32, rt: u32, offset: i16) -> u32 {
    i(0x05, rs, rt, offset as u16)
}

pub const fn j(target: u32) -> u32 {
    (0x02 << 26) | ((target >> 2) & 0x03FF_FFFF)
}

pub const fn jal(target: u32) -> u32 {
    (0x03 << 26) | ((target >> 2) & 0x03FF_FFFF)
}

pub const fn jr(rs: u32) -> u32 {
    r(rs, 0, 0, 0, 0x08)
}

pub const fn addu(rd: u32, rs: u32, rt: u32) -> u32 {
    r(rs, rt, rd, 0, 0x21)
}

pub const fn add(rd: u32, rs: u32, rt: u32) -> u32 {
    r(rs, rt, rd, 0, 0x20)
}

pub const fn mult(rs: u32, rt: u32) -> u32 {
    r(rs, rt, 0, 0, 0x18)
}

pub const fn mflo(rd: u32) -> u32 {
    r(0, 0, rd, 0, 0x12)
}

pub const fn mfhi(rd: u32) -> u32 {
    r(0, 0, rd, 0, 0x10)
}

pub const fn syscall() -> u32 {
    0x0000_000C
}

pub const fn brk() -> u32 {
    0x0000_000D
}
