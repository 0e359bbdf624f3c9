//! Hook Definitions.
//!
//! Hooks are capability objects: a boxed closure carrying whatever state it
//! captured, plus the event class it observes and an optional address filter.
//! [`Hook`] is built with one constructor per class and refined with
//! [`Hook::range`].

use bitflags::bitflags;
use std::fmt;

use crate::common::{Handle, InvalidAccess, MemAccess};
use crate::core::Emulator;

/// Handle of a registered hook.
///
/// Generation-checked: a handle whose hook was removed is rejected even if
/// its slot has since been reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookId(pub(crate) Handle);

impl fmt::Display for HookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hook{}", self.0)
    }
}

/// Event class a hook observes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// Entry to a basic block.
    Block,
    /// Entry to each instruction.
    Code,
    /// Valid guest memory accesses.
    Mem,
    /// Guest memory accesses rejected by the region table.
    InvalidMem,
    /// Interrupts and exceptions raised by instructions.
    Interrupt,
    /// Undecodable instructions.
    InvalidInstruction,
}

impl HookKind {
    pub(crate) const COUNT: usize = 6;

    pub(crate) const fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Block => "block",
            Self::Code => "code",
            Self::Mem => "mem",
            Self::InvalidMem => "invalid-mem",
            Self::Interrupt => "interrupt",
            Self::InvalidInstruction => "invalid-instruction",
        })
    }
}

bitflags! {
    /// Memory events selected by `Mem` and `InvalidMem` hooks.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct MemHookMask: u32 {
        /// Data loads.
        const READ = 1 << 0;
        /// Data stores.
        const WRITE = 1 << 1;
        /// Instruction fetches.
        const FETCH = 1 << 2;
        /// Loads from unmapped memory.
        const READ_UNMAPPED = 1 << 3;
        /// Stores to unmapped memory.
        const WRITE_UNMAPPED = 1 << 4;
        /// Fetches from unmapped memory.
        const FETCH_UNMAPPED = 1 << 5;
        /// Loads from memory without read permission.
        const READ_PROT = 1 << 6;
        /// Stores to memory without write permission.
        const WRITE_PROT = 1 << 7;
        /// Fetches from memory without execute permission.
        const FETCH_PROT = 1 << 8;

        /// Every valid access.
        const VALID = Self::READ.bits() | Self::WRITE.bits() | Self::FETCH.bits();
        /// Every unmapped access.
        const UNMAPPED = Self::READ_UNMAPPED.bits()
            | Self::WRITE_UNMAPPED.bits()
            | Self::FETCH_UNMAPPED.bits();
        /// Every protection violation.
        const PROT = Self::READ_PROT.bits() | Self::WRITE_PROT.bits() | Self::FETCH_PROT.bits();
        /// Every invalid access.
        const INVALID = Self::UNMAPPED.bits() | Self::PROT.bits();
    }
}

/// Inclusive address filter.
///
/// `begin > end` matches every address, so [`HookRange::ALL`] is `1..=0`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HookRange {
    /// First address matched.
    pub begin: u64,
    /// Last address matched.
    pub end: u64,
}

impl HookRange {
    /// Matches every address.
    pub const ALL: Self = Self { begin: 1, end: 0 };

    /// Matches `begin..=end`, or everything if `begin > end`.
    pub const fn new(begin: u64, end: u64) -> Self {
        Self { begin, end }
    }

    /// Matches a single address.
    pub const fn at(addr: u64) -> Self {
        Self {
            begin: addr,
            end: addr,
        }
    }

    /// Returns `true` if `addr` passes the filter.
    pub const fn contains(&self, addr: u64) -> bool {
        self.begin > self.end || (self.begin <= addr && addr <= self.end)
    }
}

impl Default for HookRange {
    fn default() -> Self {
        Self::ALL
    }
}

/// Block-entry callback: `(emulator, address, estimated block size in bytes)`.
pub type BlockFn = Box<dyn FnMut(&mut Emulator, u64, u32) + Send>;
/// Instruction-entry callback: `(emulator, address, instruction size in bytes)`.
pub type CodeFn = Box<dyn FnMut(&mut Emulator, u64, u32) + Send>;
/// Memory-access callback.
pub type MemFn = Box<dyn FnMut(&mut Emulator, &MemAccess) + Send>;
/// Invalid-memory callback. Return `true` once the access has been made
/// valid (for example by mapping the page) to retry it.
pub type InvalidMemFn = Box<dyn FnMut(&mut Emulator, &InvalidAccess) -> bool + Send>;
/// Interrupt callback: `(emulator, interrupt number)`.
pub type InterruptFn = Box<dyn FnMut(&mut Emulator, u32) + Send>;
/// Invalid-instruction callback: `(emulator, address)`. Return `true` to
/// continue the run instead of faulting.
pub type InvalidInsnFn = Box<dyn FnMut(&mut Emulator, u64) -> bool + Send>;

/// A stored callback, tagged by class.
pub enum Callback {
    /// Block entry.
    Block(BlockFn),
    /// Instruction entry.
    Code(CodeFn),
    /// Valid memory access.
    Mem(MemFn),
    /// Invalid memory access.
    InvalidMem(InvalidMemFn),
    /// Interrupt.
    Interrupt(InterruptFn),
    /// Invalid instruction.
    InvalidInstruction(InvalidInsnFn),
}

impl Callback {
    /// Class of the callback.
    pub const fn kind(&self) -> HookKind {
        match self {
            Self::Block(_) => HookKind::Block,
            Self::Code(_) => HookKind::Code,
            Self::Mem(_) => HookKind::Mem,
            Self::InvalidMem(_) => HookKind::InvalidMem,
            Self::Interrupt(_) => HookKind::Interrupt,
            Self::InvalidInstruction(_) => HookKind::InvalidInstruction,
        }
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback::{}", self.kind())
    }
}

/// A hook ready for registration.
///
/// # Examples
///
/// ```
/// use emuctl_core::core::hooks::{Hook, HookRange};
///
/// let hook = Hook::code(|_emu, addr, size| println!("{addr:#x} ({size} bytes)"))
///     .range(HookRange::at(0x10000));
/// assert_eq!(hook.filter(), HookRange::at(0x10000));
/// ```
#[derive(Debug)]
pub struct Hook {
    pub(crate) callback: Callback,
    pub(crate) mask: MemHookMask,
    pub(crate) range: HookRange,
}

impl Hook {
    fn with(callback: Callback, mask: MemHookMask) -> Self {
        Self {
            callback,
            mask,
            range: HookRange::ALL,
        }
    }

    /// Observes entry to every basic block.
    pub fn block(f: impl FnMut(&mut Emulator, u64, u32) + Send + 'static) -> Self {
        Self::with(Callback::Block(Box::new(f)), MemHookMask::empty())
    }

    /// Observes entry to every instruction.
    pub fn code(f: impl FnMut(&mut Emulator, u64, u32) + Send + 'static) -> Self {
        Self::with(Callback::Code(Box::new(f)), MemHookMask::empty())
    }

    /// Observes valid memory accesses selected by `mask` (a subset of
    /// [`MemHookMask::VALID`]).
    pub fn mem(mask: MemHookMask, f: impl FnMut(&mut Emulator, &MemAccess) + Send + 'static) -> Self {
        Self::with(Callback::Mem(Box::new(f)), mask)
    }

    /// Observes invalid memory accesses selected by `mask` (a subset of
    /// [`MemHookMask::INVALID`]).
    pub fn invalid_mem(
        mask: MemHookMask,
        f: impl FnMut(&mut Emulator, &InvalidAccess) -> bool + Send + 'static,
    ) -> Self {
        Self::with(Callback::InvalidMem(Box::new(f)), mask)
    }

    /// Observes interrupts and exceptions.
    pub fn interrupt(f: impl FnMut(&mut Emulator, u32) + Send + 'static) -> Self {
        Self::with(Callback::Interrupt(Box::new(f)), MemHookMask::empty())
    }

    /// Observes undecodable instructions.
    pub fn invalid_instruction(f: impl FnMut(&mut Emulator, u64) -> bool + Send + 'static) -> Self {
        Self::with(Callback::InvalidInstruction(Box::new(f)), MemHookMask::empty())
    }

    /// Restricts the hook to addresses in `range`.
    ///
    /// The filter applies to pc for block, code, interrupt and
    /// invalid-instruction hooks, and to the accessed address for memory hooks.
    #[must_use]
    pub fn range(mut self, range: HookRange) -> Self {
        self.range = range;
        self
    }

    /// Class of the hook.
    pub const fn kind(&self) -> HookKind {
        self.callback.kind()
    }

    /// Address filter.
    pub const fn filter(&self) -> HookRange {
        self.range
    }

    /// Memory event mask (empty for non-memory hooks).
    pub const fn mask(&self) -> MemHookMask {
        self.mask
    }
}
