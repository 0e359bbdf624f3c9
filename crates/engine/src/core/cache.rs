//! Decoded-Instruction Cache.
//!
//! Maps guest addresses to previously decoded [`Instruction`]s so repeated
//! execution skips fetch and decode. Entries are dropped page-wise whenever the
//! bytes underneath may have changed: writes into executable memory, unmap, and
//! protection changes. An instruction that straddles a page boundary is dropped
//! when either page is invalidated.

use std::collections::BTreeMap;

use crate::isa::Instruction;

/// Address-keyed cache of decoded instructions.
#[derive(Debug)]
pub struct DecodeCache {
    entries: BTreeMap<u64, Instruction>,
    page_mask: u64,
    /// Longest instruction the backend can produce, for straddle detection.
    max_len: u64,
}

impl DecodeCache {
    /// Creates an empty cache for `page_size`-byte pages.
    pub fn new(page_size: u64, max_len: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            page_mask: !(page_size - 1),
            max_len: max_len as u64,
        }
    }

    /// Looks up the instruction decoded at `addr`.
    pub fn get(&self, addr: u64) -> Option<Instruction> {
        self.entries.get(&addr).copied()
    }

    /// Records a decoded instruction.
    pub fn insert(&mut self, insn: Instruction) {
        let _ = self.entries.insert(insn.address, insn);
    }

    /// Drops every entry whose bytes overlap a page touched by `[addr, addr + len)`.
    ///
    /// Returns the number of entries dropped.
    pub fn invalidate(&mut self, addr: u64, len: u64) -> usize {
        if len == 0 || self.entries.is_empty() {
            return 0;
        }
        let first_page = addr & self.page_mask;
        let last_page = addr.saturating_add(len - 1) & self.page_mask;
        let last_byte = last_page | !self.page_mask;
        // Entries starting just below the first page may extend into it.
        let from = first_page.saturating_sub(self.max_len.saturating_sub(1));

        let doomed: Vec<u64> = self
            .entries
            .range(from..=last_byte)
            .filter(|(start, insn)| {
                **start >= first_page || start.saturating_add(u64::from(insn.len)) > first_page
            })
            .map(|(start, _)| *start)
            .collect();
        for key in &doomed {
            let _ = self.entries.remove(key);
        }
        doomed.len()
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of cached instructions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
