//! # Memory Region Table Tests
//!
//! Mapping, splitting, permissions, and host access through [`Emulator`].

use emuctl_core::common::MemoryError;
use emuctl_core::isa::{Arch, Mode};
use emuctl_core::memory::Perms;
use emuctl_core::{EmuError, Emulator, EngineConfig};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;

use crate::common::harness::init_tracing;

const PAGE: u64 = 0x1000;

fn emu() -> Emulator {
    init_tracing();
    Emulator::open(Arch::Mips, Mode::MIPS32_BE).unwrap()
}

fn mem_err(result: emuctl_core::Result<impl std::fmt::Debug>) -> MemoryError {
    match result {
        Err(EmuError::Memory(e)) => e,
        other => panic!("expected a memory error, got {other:?}"),
    }
}

fn layout(emu: &Emulator) -> Vec<(u64, u64, Perms)> {
    emu.mem_regions().iter().map(|r| (r.base, r.len, r.perms)).collect()
}

#[rstest]
#[case::zero_length(0x1000, 0, MemoryError::InvalidLength(0))]
#[case::misaligned_base(0x1001, PAGE, MemoryError::Misaligned { base: 0x1001, len: PAGE, page_size: PAGE })]
#[case::misaligned_len(0x1000, 0x800, MemoryError::Misaligned { base: 0x1000, len: 0x800, page_size: PAGE })]
#[case::wraps(u64::MAX - PAGE + 1, 2 * PAGE, MemoryError::InvalidLength(2 * PAGE))]
fn test_map_rejects_bad_ranges(#[case] base: u64, #[case] len: u64, #[case] expected: MemoryError) {
    let mut emu = emu();
    assert_eq!(mem_err(emu.mem_map(base, len, Perms::ALL)), expected);
    assert!(emu.mem_regions().is_empty());
}

#[test]
fn test_map_overlap_rejected() {
    let mut emu = emu();
    let _ = emu.mem_map(0x10000, 0x4000, Perms::ALL).unwrap();
    assert_eq!(
        mem_err(emu.mem_map(0x13000, 0x2000, Perms::READ)),
        MemoryError::Overlap { base: 0x13000, len: 0x2000 }
    );
    assert_eq!(
        mem_err(emu.mem_map(0xF000, 0x2000, Perms::READ)),
        MemoryError::Overlap { base: 0xF000, len: 0x2000 }
    );
    // Adjacent on both sides is fine.
    let _ = emu.mem_map(0xF000, PAGE, Perms::READ).unwrap();
    let _ = emu.mem_map(0x14000, PAGE, Perms::READ).unwrap();
    assert_eq!(emu.mem_regions().len(), 3);
}

#[test]
fn test_mapping_limit() {
    let config = EngineConfig {
        max_mapped_bytes: Some(2 * PAGE),
        ..EngineConfig::default()
    };
    let mut emu = Emulator::with_config(Arch::Mips, Mode::MIPS32_BE, config).unwrap();
    let _ = emu.mem_map(0, PAGE, Perms::ALL).unwrap();
    assert_eq!(
        mem_err(emu.mem_map(PAGE, 2 * PAGE, Perms::ALL)),
        MemoryError::OutOfMemory { requested: 2 * PAGE }
    );
    emu.mem_unmap(0, PAGE).unwrap();
    let _ = emu.mem_map(PAGE, 2 * PAGE, Perms::ALL).unwrap();
}

#[test]
fn test_custom_page_size() {
    let config = EngineConfig {
        page_size: 0x100,
        ..EngineConfig::default()
    };
    let mut emu = Emulator::with_config(Arch::Mips, Mode::MIPS32_BE, config).unwrap();
    assert_eq!(emu.page_size(), 0x100);
    let _ = emu.mem_map(0x100, 0x100, Perms::ALL).unwrap();
}

#[test]
fn test_map_is_zero_filled() {
    let mut emu = emu();
    let _ = emu.mem_map(0x2000, PAGE, Perms::READ).unwrap();
    assert_eq!(emu.mem_read(0x2000, 16).unwrap(), vec![0; 16]);
}

#[test]
fn test_unmap_middle_splits_region() {
    let mut emu = emu();
    let _ = emu.mem_map(0x10000, 0x3000, Perms::READ | Perms::WRITE).unwrap();
    emu.mem_write(0x10000, &[1, 2, 3, 4]).unwrap();
    emu.mem_write(0x12000, &[5, 6, 7, 8]).unwrap();

    emu.mem_unmap(0x11000, PAGE).unwrap();

    let rw = Perms::READ | Perms::WRITE;
    assert_eq!(layout(&emu), vec![(0x10000, PAGE, rw), (0x12000, PAGE, rw)]);
    assert_eq!(emu.mem_read(0x10000, 4).unwrap(), vec![1, 2, 3, 4]);
    assert_eq!(emu.mem_read(0x12000, 4).unwrap(), vec![5, 6, 7, 8]);
    assert_eq!(mem_err(emu.mem_read(0x11000, 1)), MemoryError::Unmapped(0x11000));
    assert_eq!(mem_err(emu.mem_write(0x11000, &[9])), MemoryError::Unmapped(0x11000));
}

#[test]
fn test_access_after_full_unmap_fails() {
    let mut emu = emu();
    let _ = emu.mem_map(0x10000, PAGE, Perms::READ | Perms::WRITE).unwrap();
    emu.mem_write(0x10000, &[1, 2, 3, 4]).unwrap();
    emu.mem_unmap(0x10000, PAGE).unwrap();

    assert_eq!(mem_err(emu.mem_read(0x10000, 4)), MemoryError::Unmapped(0x10000));
    assert_eq!(mem_err(emu.mem_write(0x10000, &[5])), MemoryError::Unmapped(0x10000));
    assert_eq!(mem_err(emu.mem_load(0x10000, &[5])), MemoryError::Unmapped(0x10000));
}

#[test]
fn test_unmap_across_adjacent_regions() {
    let mut emu = emu();
    let _ = emu.mem_map(0x0, 0x2000, Perms::ALL).unwrap();
    let _ = emu.mem_map(0x2000, 0x2000, Perms::READ).unwrap();
    emu.mem_unmap(0x1000, 0x2000).unwrap();
    assert_eq!(layout(&emu), vec![(0x0, PAGE, Perms::ALL), (0x3000, PAGE, Perms::READ)]);
}

#[test]
fn test_unmap_error_policy() {
    let mut emu = emu();
    let _ = emu.mem_map(0x10000, PAGE, Perms::ALL).unwrap();
    assert_eq!(
        mem_err(emu.mem_unmap(0x20000, PAGE)),
        MemoryError::NotMapped { base: 0x20000, len: PAGE }
    );
    assert_eq!(
        mem_err(emu.mem_unmap(0x10000, 2 * PAGE)),
        MemoryError::PartialOverlap { base: 0x10000, len: 2 * PAGE }
    );
    assert_eq!(
        mem_err(emu.mem_protect(0xF000, 2 * PAGE, Perms::READ)),
        MemoryError::PartialOverlap { base: 0xF000, len: 2 * PAGE }
    );
    // Nothing changed.
    assert_eq!(layout(&emu), vec![(0x10000, PAGE, Perms::ALL)]);
}

#[test]
fn test_protect_splits_and_enforces_host_writes() {
    let mut emu = emu();
    let _ = emu.mem_map(0x10000, 0x3000, Perms::ALL).unwrap();
    emu.mem_protect(0x11000, PAGE, Perms::READ | Perms::EXEC).unwrap();

    assert_eq!(
        layout(&emu),
        vec![
            (0x10000, PAGE, Perms::ALL),
            (0x11000, PAGE, Perms::READ | Perms::EXEC),
            (0x12000, PAGE, Perms::ALL),
        ]
    );
    assert_eq!(
        mem_err(emu.mem_write(0x10FFE, &[0; 4])),
        MemoryError::WriteProtected(0x11000)
    );
    // Nothing was written, not even the writable prefix.
    assert_eq!(emu.mem_read(0x10FFE, 2).unwrap(), vec![0, 0]);

    emu.mem_load(0x11000, &[0xAA]).unwrap();
    assert_eq!(emu.mem_read(0x11000, 1).unwrap(), vec![0xAA]);
}

#[test]
fn test_host_access_spans_adjacent_regions() {
    let mut emu = emu();
    let _ = emu.mem_map(0x1000, PAGE, Perms::READ | Perms::WRITE).unwrap();
    let _ = emu.mem_map(0x2000, PAGE, Perms::WRITE).unwrap();

    emu.mem_write(0x1FFE, &[1, 2, 3, 4]).unwrap();
    // Host reads ignore permissions.
    assert_eq!(emu.mem_read(0x1FFE, 4).unwrap(), vec![1, 2, 3, 4]);

    let mut buf = [0u8; 4];
    emu.mem_read_into(0x1FFF, &mut buf[..2]).unwrap();
    assert_eq!(buf[..2], [2, 3]);

    assert_eq!(mem_err(emu.mem_read(0x2FFE, 4)), MemoryError::Unmapped(0x3000));
    assert_eq!(mem_err(emu.mem_write(0xFFE, &[0; 4])), MemoryError::Unmapped(0xFFE));
}

#[test]
fn test_translate() {
    let mut emu = emu();
    let id = emu.mem_map(0x4000, PAGE, Perms::READ).unwrap();
    assert_eq!(emu.mem_translate(0x4FFF).unwrap(), (id, Perms::READ));
    assert_eq!(mem_err(emu.mem_translate(0x5000)), MemoryError::Unmapped(0x5000));
}

#[test]
fn test_top_of_address_space() {
    let mut emu = emu();
    let top = u64::MAX - PAGE + 1;
    let _ = emu.mem_map(top, PAGE, Perms::ALL).unwrap();
    emu.mem_write(u64::MAX - 1, &[9, 9]).unwrap();
    assert_eq!(emu.mem_read(u64::MAX - 1, 2).unwrap(), vec![9, 9]);
    assert!(emu.mem_read(u64::MAX, 2).is_err());
}

proptest! {
    #[test]
    fn prop_regions_stay_disjoint(ops in prop::collection::vec((0u64..32, 1u64..6, any::<bool>()), 1..40)) {
        let mut emu = emu();
        for (page, pages, map) in ops {
            let (base, len) = (page * PAGE, pages * PAGE);
            if map {
                let _ = emu.mem_map(base, len, Perms::ALL);
            } else {
                let _ = emu.mem_unmap(base, len);
            }
        }
        let regions = emu.mem_regions();
        for pair in regions.windows(2) {
            prop_assert!(pair[0].base + pair[0].len <= pair[1].base);
        }
    }

    #[test]
    fn prop_write_read_round_trip(offset in 0u64..0x1F00, bytes in prop::collection::vec(any::<u8>(), 1..256)) {
        let mut emu = emu();
        let _ = emu.mem_map(0x1000, 0x1000, Perms::ALL).unwrap();
        let _ = emu.mem_map(0x2000, 0x1000, Perms::READ | Perms::WRITE).unwrap();
        let addr = 0x1000 + offset;
        emu.mem_write(addr, &bytes).unwrap();
        prop_assert_eq!(emu.mem_read(addr, bytes.len()).unwrap(), bytes);
    }
}
