//! Global Engine Constants.
//!
//! This module defines engine-wide constants used across the control plane. It includes:
//! 1. **Memory Constants:** Default page granularity and derived masks.
//! 2. **Execution Constants:** Block-scan limits and fetch widths.

/// Default page size in bytes (4KB).
///
/// Every mapping must start on, and span a whole number of, pages.
pub const PAGE_SIZE: u64 = 4096;

/// Number of bits to shift to convert between bytes and pages at the default page size.
pub const PAGE_SHIFT: u64 = 12;

/// Mask for extracting the page offset from an address at the default page size.
pub const PAGE_OFFSET_MASK: u64 = PAGE_SIZE - 1;

/// Default upper bound on instructions scanned when estimating a basic block's length.
pub const MAX_BLOCK_INSTRUCTIONS: usize = 64;

/// Size of a fixed-width 32-bit instruction in bytes.
pub const INSTRUCTION_SIZE_32: u64 = 4;

/// Largest instruction any backend may ask the engine to fetch, in bytes.
pub const MAX_FETCH_BYTES: usize = 16;
