//! Register Bank.
//!
//! This module implements per-architecture register storage. It performs the following:
//! 1. **Layout:** A static [`RegisterLayout`] supplied by the backend names every
//!    register, fixes the native width, and designates pc and the zero register.
//! 2. **Checked Access:** Host reads/writes validate the identifier and the value range.
//! 3. **Extension:** Narrow writes are sign-extended to the native width.
//! 4. **Snapshots:** Whole-bank save/restore, tagged with the layout that produced them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::common::RegisterError;

/// Architecture-defined register identifier (an index into the layout).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegId(pub u16);

impl RegId {
    /// Slot index in the register bank.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RegId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reg{}", self.0)
    }
}

/// Static description of a register file.
#[derive(Debug)]
pub struct RegisterLayout {
    /// Layout tag recorded in snapshots (for example `"mips32"`).
    pub name: &'static str,
    /// Canonical register names, indexed by [`RegId`].
    pub names: &'static [&'static str],
    /// Prefix accepted for numeric general-purpose names (`r5`, `x5`).
    pub numeric_prefix: char,
    /// Number of general-purpose registers addressable numerically.
    pub gpr_count: u16,
    /// Native register width in bits.
    pub bits: u32,
    /// Program counter.
    pub pc: RegId,
    /// Hard-wired zero register, if the architecture has one.
    pub zero: Option<RegId>,
}

impl RegisterLayout {
    /// Number of registers in the layout.
    pub const fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if the layout defines no registers.
    pub const fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Mask selecting the native width.
    pub const fn mask(&self) -> u64 {
        if self.bits >= 64 {
            u64::MAX
        } else {
            (1u64 << self.bits) - 1
        }
    }

    /// Canonical name of a register.
    pub fn name(&self, id: RegId) -> Option<&'static str> {
        self.names.get(id.index()).copied()
    }

    /// Resolves a register by name.
    ///
    /// Accepts canonical names, an optional leading `$`, and numeric
    /// general-purpose names such as `r1`, `x1` or `$1`.
    pub fn lookup(&self, name: &str) -> Option<RegId> {
        let bare = name.strip_prefix('$').unwrap_or(name);
        if let Some(i) = self.names.iter().position(|n| n.eq_ignore_ascii_case(bare)) {
            return u16::try_from(i).ok().map(RegId);
        }
        let digits = bare
            .strip_prefix(self.numeric_prefix)
            .or_else(|| name.strip_prefix('$'))?;
        let n: u16 = digits.parse().ok()?;
        (n < self.gpr_count).then_some(RegId(n))
    }
}

/// Saved register state, restorable into an emulator with the same layout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSnapshot {
    layout: String,
    values: Vec<u64>,
}

impl RegisterSnapshot {
    /// Layout tag of the bank the snapshot was taken from.
    pub fn layout(&self) -> &str {
        &self.layout
    }

    /// Saved values, indexed by [`RegId`].
    pub fn values(&self) -> &[u64] {
        &self.values
    }
}

/// Register storage at the architecture's native width.
pub struct RegisterBank {
    layout: &'static RegisterLayout,
    values: Vec<u64>,
}

impl RegisterBank {
    /// Creates a bank with every register zeroed.
    pub fn new(layout: &'static RegisterLayout) -> Self {
        Self {
            layout,
            values: vec![0; layout.len()],
        }
    }

    /// The layout this bank stores.
    pub const fn layout(&self) -> &'static RegisterLayout {
        self.layout
    }

    /// Reads a register.
    ///
    /// # Errors
    ///
    /// `InvalidRegister` if `id` is not in the layout.
    pub fn read(&self, id: RegId) -> Result<u64, RegisterError> {
        self.values
            .get(id.index())
            .copied()
            .ok_or(RegisterError::InvalidRegister(id))
    }

    /// Writes a register at full width.
    ///
    /// The value must fit the register width, either as an unsigned value or
    /// as the sign extension of one (so `-1i64 as u64` is accepted for a
    /// 32-bit register and stored as `0xffff_ffff`).
    ///
    /// # Errors
    ///
    /// `InvalidRegister` for an unknown id, `ValueOutOfRange` if the value does not fit.
    pub fn write(&mut self, id: RegId, value: u64) -> Result<(), RegisterError> {
        self.check(id)?;
        let bits = self.layout.bits;
        if !fits(value, bits) {
            return Err(RegisterError::ValueOutOfRange {
                reg: id,
                value,
                bits,
            });
        }
        self.set(id, value);
        Ok(())
    }

    /// Writes a `bits`-wide logical value, sign-extending it to the native width.
    ///
    /// # Errors
    ///
    /// `InvalidRegister` for an unknown id, `ValueOutOfRange` if `bits` is zero,
    /// wider than the register, or too narrow for `value`.
    pub fn write_narrow(&mut self, id: RegId, value: u64, bits: u32) -> Result<(), RegisterError> {
        self.check(id)?;
        let out_of_range = RegisterError::ValueOutOfRange {
            reg: id,
            value,
            bits,
        };
        if bits == 0 || bits > self.layout.bits || (bits < 64 && value >> bits != 0) {
            return Err(out_of_range);
        }
        self.set(id, sign_extend(value, bits));
        Ok(())
    }

    /// Reads several registers at once.
    ///
    /// # Errors
    ///
    /// `InvalidRegister` naming the first unknown id.
    pub fn read_batch(&self, ids: &[RegId]) -> Result<Vec<u64>, RegisterError> {
        ids.iter().map(|id| self.read(*id)).collect()
    }

    /// Writes several registers. Nothing is written unless every pair is valid.
    ///
    /// # Errors
    ///
    /// The first invalid id or out-of-range value.
    pub fn write_batch(&mut self, writes: &[(RegId, u64)]) -> Result<(), RegisterError> {
        for &(id, value) in writes {
            self.check(id)?;
            if !fits(value, self.layout.bits) {
                return Err(RegisterError::ValueOutOfRange {
                    reg: id,
                    value,
                    bits: self.layout.bits,
                });
            }
        }
        for &(id, value) in writes {
            self.set(id, value);
        }
        Ok(())
    }

    /// Captures every register.
    pub fn snapshot(&self) -> RegisterSnapshot {
        RegisterSnapshot {
            layout: self.layout.name.to_owned(),
            values: self.values.clone(),
        }
    }

    /// Restores a snapshot taken from a bank with the same layout.
    ///
    /// # Errors
    ///
    /// `SnapshotMismatch` if the snapshot came from a different layout.
    pub fn restore(&mut self, snapshot: &RegisterSnapshot) -> Result<(), RegisterError> {
        if snapshot.layout != self.layout.name || snapshot.values.len() != self.values.len() {
            return Err(RegisterError::SnapshotMismatch);
        }
        for (i, value) in snapshot.values.iter().enumerate() {
            self.values[i] = value & self.layout.mask();
        }
        if let Some(zero) = self.layout.zero {
            self.values[zero.index()] = 0;
        }
        Ok(())
    }

    /// Current program counter.
    pub fn pc(&self) -> u64 {
        self.values[self.layout.pc.index()]
    }

    /// Sets the program counter, truncated to the native width.
    pub fn set_pc(&mut self, pc: u64) {
        self.set(self.layout.pc, pc);
    }

    /// Unchecked read used by executing instructions; unknown ids read as zero.
    pub(crate) fn get(&self, id: RegId) -> u64 {
        self.values.get(id.index()).copied().unwrap_or(0)
    }

    /// Unchecked write used by executing instructions.
    ///
    /// Truncates to the native width and drops writes to the zero register.
    pub(crate) fn set(&mut self, id: RegId, value: u64) {
        if self.layout.zero == Some(id) {
            return;
        }
        let mask = self.layout.mask();
        if let Some(slot) = self.values.get_mut(id.index()) {
            *slot = value & mask;
        }
    }

    fn check(&self, id: RegId) -> Result<(), RegisterError> {
        if id.index() < self.values.len() {
            Ok(())
        } else {
            Err(RegisterError::InvalidRegister(id))
        }
    }
}

impl fmt::Debug for RegisterBank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, value) in self.layout.names.iter().zip(&self.values) {
            let _ = map.entry(name, &format_args!("{value:#x}"));
        }
        map.finish()
    }
}

/// `true` if `value` is representable in `bits`, unsigned or as a sign extension.
fn fits(value: u64, bits: u32) -> bool {
    bits >= 64 || value >> bits == 0 || (value as i64) >> (bits - 1) == -1
}

/// Sign-extends the low `bits` of `value` to 64 bits.
pub(crate) const fn sign_extend(value: u64, bits: u32) -> u64 {
    if bits >= 64 {
        return value;
    }
    let shift = 64 - bits;
    (((value << shift) as i64) >> shift) as u64
}
