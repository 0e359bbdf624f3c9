use emuctl_core::common::{ConfigError, EmuError};
use emuctl_core::isa::{Arch, Mode, riscv};
use emuctl_core::memory::Perms;
use emuctl_core::sim::load_image;
use emuctl_core::{ContextTable, RunRequest};
use pretty_assertions::assert_eq;

#[test]
fn test_open_get_close() {
    let mut table = ContextTable::new();
    assert!(table.is_empty());
    let a = table.open(Arch::Mips, Mode::MIPS32_BE).unwrap();
    let b = table.open(Arch::RiscV, Mode::RV64).unwrap();
    assert_ne!(a, b);
    assert_eq!(table.len(), 2);
    assert_eq!(table.get(a).unwrap().arch(), Arch::Mips);
    assert_eq!(table.get(b).unwrap().mode(), Mode::RV64);

    table.close(a).unwrap();
    assert_eq!(table.ids(), vec![b]);
    assert_eq!(table.get(a).unwrap_err(), EmuError::InvalidContext(a));
    assert_eq!(table.close(a).unwrap_err(), EmuError::InvalidContext(a));
}

#[test]
fn test_stale_handle_does_not_alias_new_context() {
    let mut table = ContextTable::new();
    let old = table.open(Arch::RiscV, Mode::RV32).unwrap();
    table.close(old).unwrap();
    let new = table.open(Arch::RiscV, Mode::RV64).unwrap();
    assert_ne!(old, new);
    assert!(table.get_mut(old).is_err());
    assert_eq!(table.get(new).unwrap().mode(), Mode::RV64);
}

#[test]
fn test_open_unsupported_arch_leaves_table_empty() {
    let mut table = ContextTable::new();
    let err = table.open(Arch::Arm64, Mode::RV64).unwrap_err();
    assert_eq!(err, EmuError::Config(ConfigError::UnsupportedArch(Arch::Arm64)));
    assert!(table.is_empty());
}

#[test]
fn test_contexts_are_isolated() {
    let mut table = ContextTable::new();
    let a = table.open(Arch::RiscV, Mode::RV64).unwrap();
    let b = table.open(Arch::RiscV, Mode::RV64).unwrap();
    // addi a0, zero, 42
    let code = 0x02a0_0513_u32.to_le_bytes();
    let _ = load_image(table.get_mut(a).unwrap(), 0x1000, &code, Perms::READ | Perms::EXEC).unwrap();

    let emu = table.get_mut(a).unwrap();
    let result = emu.run(RunRequest::new(0x1000).until(0x1004)).unwrap();
    assert!(result.is_completed());
    assert_eq!(emu.reg_read(riscv::abi::A0).unwrap(), 42);

    let other = table.get(b).unwrap();
    assert_eq!(other.reg_read(riscv::abi::A0).unwrap(), 0);
    assert!(other.mem_regions().is_empty());
}

#[test]
fn test_take_hands_over_ownership() {
    let mut table = ContextTable::new();
    let id = table.open(Arch::Mips, Mode::MIPS32_LE).unwrap();
    let emu = table.take(id).unwrap();
    assert!(table.is_empty());
    let id = table.insert(emu);
    assert_eq!(table.get(id).unwrap().mode(), Mode::MIPS32_LE);
    assert!(id.to_string().starts_with("ctx"));
}
