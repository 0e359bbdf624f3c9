//! Mapped Region Definitions.
//!
//! A region is a contiguous, page-aligned span of guest memory with one
//! permission set and its own backing bytes. Regions never resize in place:
//! growing one means unmapping and remapping it.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::common::AccessType;

bitflags! {
    /// Region permissions.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Perms: u8 {
        /// Guest loads may read the region.
        const READ = 0b001;
        /// Guest stores (and checked host writes) may modify the region.
        const WRITE = 0b010;
        /// The step loop may fetch instructions from the region.
        const EXEC = 0b100;
        /// Read, write, and execute.
        const ALL = Self::READ.bits() | Self::WRITE.bits() | Self::EXEC.bits();
    }
}

impl Perms {
    /// Returns `true` if these permissions allow `access`.
    pub fn allows(self, access: AccessType) -> bool {
        match access {
            AccessType::Fetch => self.contains(Self::EXEC),
            AccessType::Read => self.contains(Self::READ),
            AccessType::Write => self.contains(Self::WRITE),
        }
    }
}

impl fmt::Display for Perms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |p: Self, c: char| if self.contains(p) { c } else { '-' };
        write!(
            f,
            "{}{}{}",
            flag(Self::READ, 'r'),
            flag(Self::WRITE, 'w'),
            flag(Self::EXEC, 'x')
        )
    }
}

/// Identity of a mapped region.
///
/// Stable for the lifetime of the region. Splitting a region keeps the id on
/// the lower half and issues a fresh id for the upper half.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(pub u64);

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "region{}", self.0)
    }
}

/// Public description of a mapped region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionInfo {
    /// Region identity.
    pub id: RegionId,
    /// First guest address.
    pub base: u64,
    /// Length in bytes.
    pub len: u64,
    /// Permissions.
    pub perms: Perms,
}

impl RegionInfo {
    /// Last guest address covered (inclusive).
    pub const fn last(&self) -> u64 {
        self.base + (self.len - 1)
    }
}

/// A mapped region with its backing storage.
#[derive(Clone)]
pub(crate) struct Region {
    pub(crate) id: RegionId,
    pub(crate) base: u64,
    pub(crate) perms: Perms,
    pub(crate) data: Vec<u8>,
}

impl Region {
    pub(crate) fn len(&self) -> u64 {
        self.data.len() as u64
    }

    /// Last covered address, inclusive, so a region ending at the top of the
    /// address space does not overflow.
    pub(crate) fn last(&self) -> u64 {
        self.base + (self.len() - 1)
    }

    pub(crate) fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr <= self.last()
    }

    pub(crate) fn info(&self) -> RegionInfo {
        RegionInfo {
            id: self.id,
            base: self.base,
            len: self.len(),
            perms: self.perms,
        }
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("id", &self.id)
            .field("base", &format_args!("{:#x}", self.base))
            .field("len", &format_args!("{:#x}", self.len()))
            .field("perms", &format_args!("{}", self.perms))
            .finish()
    }
}
