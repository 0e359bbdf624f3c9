use emuctl_core::common::{ConfigError, EmuError, MemoryError};
use emuctl_core::config::EngineConfig;
use emuctl_core::isa::{Arch, Mode};
use emuctl_core::memory::Perms;
use emuctl_core::Emulator;
use pretty_assertions::assert_eq;
use rstest::rstest;

#[test]
fn test_defaults() {
    let config = EngineConfig::default();
    assert_eq!(config.page_size, 0x1000);
    assert!(config.decode_cache);
    assert!(!config.trace_instructions);
    assert_eq!(config.max_mapped_bytes, None);
    assert!(config.validate().is_ok());
}

#[test]
fn test_empty_json_is_default() {
    assert_eq!(EngineConfig::from_json("{}").unwrap(), EngineConfig::default());
}

#[test]
fn test_json_overrides() {
    let config = EngineConfig::from_json(
        r#"{ "decode_cache": false, "max_mapped_bytes": 8192, "max_block_instructions": 4 }"#,
    )
    .unwrap();
    assert!(!config.decode_cache);
    assert_eq!(config.max_mapped_bytes, Some(8192));
    assert_eq!(config.max_block_instructions, 4);
    assert_eq!(config.page_size, EngineConfig::default().page_size);
}

#[rstest]
#[case::not_power_of_two(r#"{ "page_size": 3000 }"#, ConfigError::InvalidPageSize(3000))]
#[case::zero_page(r#"{ "page_size": 0 }"#, ConfigError::InvalidPageSize(0))]
#[case::zero_block_limit(r#"{ "max_block_instructions": 0 }"#, ConfigError::InvalidBlockLimit)]
fn test_rejected_values(#[case] json: &str, #[case] expected: ConfigError) {
    assert_eq!(EngineConfig::from_json(json).unwrap_err(), expected);
}

#[test]
fn test_malformed_json() {
    let err = EngineConfig::from_json("{ page_size: ").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_open_rejects_invalid_config() {
    let config = EngineConfig {
        page_size: 0x1800,
        ..EngineConfig::default()
    };
    let err = Emulator::with_config(Arch::RiscV, Mode::RV64, config).unwrap_err();
    assert_eq!(err, EmuError::Config(ConfigError::InvalidPageSize(0x1800)));
}

#[test]
fn test_page_size_governs_mapping() {
    let config = EngineConfig {
        page_size: 0x10000,
        ..EngineConfig::default()
    };
    let mut emu = Emulator::with_config(Arch::Mips, Mode::MIPS32_BE, config).unwrap();
    assert_eq!(emu.page_size(), 0x10000);
    assert!(matches!(
        emu.mem_map(0x1000, 0x1000, Perms::ALL),
        Err(EmuError::Memory(MemoryError::Misaligned { .. }))
    ));
    assert!(emu.mem_map(0x10000, 0x10000, Perms::ALL).is_ok());
}

#[test]
fn test_mapping_limit() {
    let config = EngineConfig {
        max_mapped_bytes: Some(0x2000),
        ..EngineConfig::default()
    };
    let mut emu = Emulator::with_config(Arch::RiscV, Mode::RV32, config).unwrap();
    let _ = emu.mem_map(0x1000, 0x2000, Perms::ALL).unwrap();
    assert_eq!(
        emu.mem_map(0x8000, 0x1000, Perms::ALL).unwrap_err(),
        EmuError::Memory(MemoryError::OutOfMemory { requested: 0x1000 })
    );
}
