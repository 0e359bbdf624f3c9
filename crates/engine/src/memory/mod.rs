//! Memory Region Table.
//!
//! This module owns guest memory. It provides:
//! 1. **Mapping:** Page-aligned, non-overlapping regions with read/write/execute permissions.
//! 2. **Unmap and Protect:** Range operations that split regions at their boundaries.
//! 3. **Access:** Host reads/writes and guest permission checks over spans that may cross
//!    adjacent regions but never a mapped/unmapped boundary.
//! 4. **Translation:** Address to region/permission lookup for the step loop.
//!
//! Regions are keyed by base address in a `BTreeMap`, so the region covering an
//! address is always the last one starting at or below it.

/// Region, permission, and region-identity types.
pub mod region;

use std::collections::BTreeMap;

use tracing::debug;

use crate::common::{AccessType, InvalidReason, MemoryError};
pub use region::{Perms, RegionId, RegionInfo};
use region::Region;

/// How much of a range is covered by mapped regions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Coverage {
    None,
    Partial,
    Full,
}

/// The memory region table of one emulator.
#[derive(Debug)]
pub struct MemoryMap {
    regions: BTreeMap<u64, Region>,
    page_size: u64,
    limit: Option<u64>,
    mapped: u64,
    next_id: u64,
}

impl MemoryMap {
    /// Creates an empty table.
    ///
    /// # Arguments
    ///
    /// * `page_size` - Mapping granularity; callers validate it is a power of two.
    /// * `limit` - Optional cap on the total number of mapped bytes.
    pub fn new(page_size: u64, limit: Option<u64>) -> Self {
        Self {
            regions: BTreeMap::new(),
            page_size,
            limit,
            mapped: 0,
            next_id: 0,
        }
    }

    /// Mapping granularity in bytes.
    pub const fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Total bytes currently mapped.
    pub const fn mapped_bytes(&self) -> u64 {
        self.mapped
    }

    /// Lists mapped regions in ascending address order.
    pub fn regions(&self) -> impl Iterator<Item = RegionInfo> + '_ {
        self.regions.values().map(Region::info)
    }

    /// Maps a new zero-filled region.
    ///
    /// # Errors
    ///
    /// * `InvalidLength` - `len` is zero or the range wraps the address space.
    /// * `Misaligned` - `base` or `len` is not a multiple of the page size.
    /// * `Overlap` - the range intersects an existing region.
    /// * `OutOfMemory` - the mapping limit would be exceeded or allocation failed.
    pub fn map(&mut self, base: u64, len: u64, perms: Perms) -> Result<RegionId, MemoryError> {
        let last = self.check_range(base, len)?;

        if let Some((_, r)) = self.regions.range(..=last).next_back()
            && r.last() >= base
        {
            return Err(MemoryError::Overlap { base, len });
        }

        if let Some(limit) = self.limit
            && self.mapped.saturating_add(len) > limit
        {
            return Err(MemoryError::OutOfMemory { requested: len });
        }

        let size = usize::try_from(len).map_err(|_| MemoryError::OutOfMemory { requested: len })?;
        let mut data = Vec::new();
        data.try_reserve_exact(size)
            .map_err(|_| MemoryError::OutOfMemory { requested: len })?;
        data.resize(size, 0);

        let id = self.fresh_id();
        let _ = self.regions.insert(
            base,
            Region {
                id,
                base,
                perms,
                data,
            },
        );
        self.mapped += len;
        debug!(%id, "mapped {base:#x}+{len:#x} {perms}");
        Ok(id)
    }

    /// Unmaps `[base, base + len)`.
    ///
    /// The range may cover several whole regions or cut into one; any region
    /// straddling a boundary is split and its residual stays mapped with the
    /// same permissions.
    ///
    /// # Errors
    ///
    /// * `InvalidLength` / `Misaligned` - as for [`MemoryMap::map`].
    /// * `NotMapped` - nothing in the range is mapped.
    /// * `PartialOverlap` - the range contains unmapped holes.
    pub fn unmap(&mut self, base: u64, len: u64) -> Result<(), MemoryError> {
        let last = self.check_range(base, len)?;
        self.require_full_coverage(base, len, last)?;
        self.split_range(base, last);

        let doomed: Vec<u64> = self.regions.range(base..=last).map(|(k, _)| *k).collect();
        for key in doomed {
            if let Some(region) = self.regions.remove(&key) {
                self.mapped -= region.len();
            }
        }
        debug!("unmapped {base:#x}+{len:#x}");
        Ok(())
    }

    /// Changes the permissions of `[base, base + len)`, splitting regions as needed.
    ///
    /// # Errors
    ///
    /// Same as [`MemoryMap::unmap`].
    pub fn protect(&mut self, base: u64, len: u64, perms: Perms) -> Result<(), MemoryError> {
        let last = self.check_range(base, len)?;
        self.require_full_coverage(base, len, last)?;
        self.split_range(base, last);

        for region in self.regions.range_mut(base..=last).map(|(_, r)| r) {
            region.perms = perms;
        }
        debug!("protected {base:#x}+{len:#x} as {perms}");
        Ok(())
    }

    /// Looks up the region covering `addr`.
    ///
    /// # Errors
    ///
    /// `Unmapped` if no region covers `addr`.
    pub fn translate(&self, addr: u64) -> Result<(RegionId, Perms), MemoryError> {
        self.region_at(addr)
            .map(|r| (r.id, r.perms))
            .ok_or(MemoryError::Unmapped(addr))
    }

    /// Returns `true` if any byte of the span lies in an executable region.
    pub fn touches_executable(&self, addr: u64, len: usize) -> bool {
        let Some(last) = span_last(addr, len) else {
            return false;
        };
        let from = self.region_at(addr).map_or(addr, |r| r.base);
        self.regions
            .range(from..=last)
            .any(|(_, r)| r.perms.contains(Perms::EXEC))
    }

    /// Reads `len` bytes starting at `addr`, ignoring permissions.
    ///
    /// # Errors
    ///
    /// `Unmapped` naming the first byte of the span that no region covers.
    pub fn read(&self, addr: u64, len: usize) -> Result<Vec<u8>, MemoryError> {
        let mut buf = vec![0; len];
        self.read_into(addr, &mut buf)?;
        Ok(buf)
    }

    /// Fills `buf` from guest memory starting at `addr`, ignoring permissions.
    ///
    /// # Errors
    ///
    /// `Unmapped` naming the first byte of the span that no region covers.
    pub fn read_into(&self, addr: u64, buf: &mut [u8]) -> Result<(), MemoryError> {
        self.check_span(addr, buf.len(), None)
            .map_err(|(at, _)| MemoryError::Unmapped(at))?;
        let mut cur = addr;
        let mut done = 0;
        while done < buf.len() {
            let region = self.region_at(cur).ok_or(MemoryError::Unmapped(cur))?;
            let offset = (cur - region.base) as usize;
            let chunk = (region.data.len() - offset).min(buf.len() - done);
            buf[done..done + chunk].copy_from_slice(&region.data[offset..offset + chunk]);
            done += chunk;
            cur = cur.wrapping_add(chunk as u64);
        }
        Ok(())
    }

    /// Writes `bytes` at `addr`, honouring write permission.
    ///
    /// Nothing is modified unless the whole span is mapped and writable.
    ///
    /// # Errors
    ///
    /// `Unmapped` or `WriteProtected` naming the first offending byte.
    pub fn write(&mut self, addr: u64, bytes: &[u8]) -> Result<(), MemoryError> {
        self.check_span(addr, bytes.len(), Some(AccessType::Write))
            .map_err(|(at, reason)| match reason {
                InvalidReason::Unmapped => MemoryError::Unmapped(at),
                InvalidReason::Protected => MemoryError::WriteProtected(at),
            })?;
        self.copy_in(addr, bytes);
        Ok(())
    }

    /// Writes `bytes` at `addr` regardless of permissions (image loading).
    ///
    /// # Errors
    ///
    /// `Unmapped` naming the first byte of the span that no region covers.
    pub fn load(&mut self, addr: u64, bytes: &[u8]) -> Result<(), MemoryError> {
        self.check_span(addr, bytes.len(), None)
            .map_err(|(at, _)| MemoryError::Unmapped(at))?;
        self.copy_in(addr, bytes);
        Ok(())
    }

    /// Checks that a guest access of `len` bytes at `addr` is mapped and permitted.
    ///
    /// # Errors
    ///
    /// The first offending address and why it was rejected.
    pub fn check_access(
        &self,
        addr: u64,
        len: usize,
        access: AccessType,
    ) -> Result<(), (u64, InvalidReason)> {
        self.check_span(addr, len, Some(access))
    }

    fn check_span(
        &self,
        addr: u64,
        len: usize,
        access: Option<AccessType>,
    ) -> Result<(), (u64, InvalidReason)> {
        if len == 0 {
            return Ok(());
        }
        let Some(last) = span_last(addr, len) else {
            return Err((addr, InvalidReason::Unmapped));
        };
        let mut cur = addr;
        loop {
            let Some(region) = self.region_at(cur) else {
                return Err((cur, InvalidReason::Unmapped));
            };
            if let Some(access) = access
                && !region.perms.allows(access)
            {
                return Err((cur, InvalidReason::Protected));
            }
            if region.last() >= last {
                return Ok(());
            }
            cur = region.last() + 1;
        }
    }

    fn copy_in(&mut self, addr: u64, bytes: &[u8]) {
        let mut cur = addr;
        let mut done = 0;
        while done < bytes.len() {
            let Some((_, region)) = self.regions.range_mut(..=cur).next_back() else {
                return;
            };
            let offset = (cur - region.base) as usize;
            let chunk = (region.data.len() - offset).min(bytes.len() - done);
            region.data[offset..offset + chunk].copy_from_slice(&bytes[done..done + chunk]);
            done += chunk;
            cur = cur.wrapping_add(chunk as u64);
        }
    }

    fn region_at(&self, addr: u64) -> Option<&Region> {
        self.regions
            .range(..=addr)
            .next_back()
            .map(|(_, r)| r)
            .filter(|r| r.contains(addr))
    }

    /// Validates length and alignment, returning the inclusive last address.
    fn check_range(&self, base: u64, len: u64) -> Result<u64, MemoryError> {
        if len == 0 {
            return Err(MemoryError::InvalidLength(len));
        }
        let mask = self.page_size - 1;
        if base & mask != 0 || len & mask != 0 {
            return Err(MemoryError::Misaligned {
                base,
                len,
                page_size: self.page_size,
            });
        }
        base.checked_add(len - 1)
            .ok_or(MemoryError::InvalidLength(len))
    }

    fn coverage(&self, base: u64, last: u64) -> Coverage {
        let from = self.region_at(base).map_or(base, |r| r.base);
        let covered: u64 = self
            .regions
            .range(from..=last)
            .map(|(_, r)| r.last().min(last) - r.base.max(base) + 1)
            .sum();
        if covered == 0 {
            Coverage::None
        } else if covered == last - base + 1 {
            Coverage::Full
        } else {
            Coverage::Partial
        }
    }

    fn require_full_coverage(&self, base: u64, len: u64, last: u64) -> Result<(), MemoryError> {
        match self.coverage(base, last) {
            Coverage::Full => Ok(()),
            Coverage::None => Err(MemoryError::NotMapped { base, len }),
            Coverage::Partial => Err(MemoryError::PartialOverlap { base, len }),
        }
    }

    /// Splits regions so that `base` and `last + 1` fall on region boundaries.
    fn split_range(&mut self, base: u64, last: u64) {
        self.split_at(base);
        if let Some(end) = last.checked_add(1) {
            self.split_at(end);
        }
    }

    fn split_at(&mut self, addr: u64) {
        let Some(key) = self.region_at(addr).map(|r| r.base) else {
            return;
        };
        if key == addr {
            return;
        }
        let id = self.fresh_id();
        let Some(head) = self.regions.get_mut(&key) else {
            return;
        };
        let tail_data = head.data.split_off((addr - key) as usize);
        let perms = head.perms;
        let _ = self.regions.insert(
            addr,
            Region {
                id,
                base: addr,
                perms,
                data: tail_data,
            },
        );
    }

    fn fresh_id(&mut self) -> RegionId {
        let id = RegionId(self.next_id);
        self.next_id += 1;
        id
    }
}

/// Inclusive last address of a non-empty span, or `None` if it wraps.
fn span_last(addr: u64, len: usize) -> Option<u64> {
    if len == 0 {
        return None;
    }
    addr.checked_add(len as u64 - 1)
}
