//! CPU emulation control plane.
//!
//! This crate is the host-side engine behind an emulator: it owns guest
//! memory, registers, and observers, and drives an architecture backend
//! through a cooperative run loop. It provides:
//! 1. **Core:** The [`Emulator`] aggregate, the step loop, hook dispatch, and the decode cache.
//! 2. **Memory:** A page-granular region table with read/write/execute permissions.
//! 3. **ISA:** The [`Backend`](isa::Backend) seam plus bundled MIPS32 and RV32I/RV64I backends.
//! 4. **Contexts:** Generation-checked handles over open emulators, and image loading.
//! 5. **Support:** Configuration, error taxonomy, and activity statistics.
//!
//! # Examples
//!
//! ```
//! use emuctl_core::{Emulator, Hook, HookRange, RunRequest, RunStatus};
//! use emuctl_core::isa::{Arch, Mode, riscv};
//! use emuctl_core::memory::Perms;
//!
//! let mut emu = Emulator::open(Arch::RiscV, Mode::RV64).unwrap();
//! emu.mem_map(0x1000, 0x1000, Perms::ALL).unwrap();
//! // addi a0, zero, 42
//! emu.mem_write(0x1000, &0x02a0_0513_u32.to_le_bytes()).unwrap();
//! emu.add_hook(Hook::code(|_, addr, _| println!("exec {addr:#x}")).range(HookRange::ALL)).unwrap();
//!
//! let result = emu.run(RunRequest::new(0x1000).until(0x1004)).unwrap();
//! assert_eq!(result.status, RunStatus::Completed);
//! assert_eq!(emu.reg_read(riscv::abi::A0).unwrap(), 42);
//! ```

/// Common types (errors, faults, access kinds, handles, constants).
pub mod common;
/// Engine configuration.
pub mod config;
/// Emulator, run loop, registers, hooks, and decode cache.
pub mod core;
/// Architecture backends and the backend interface.
pub mod isa;
/// Guest memory region table.
pub mod memory;
/// Context table and image loading.
pub mod sim;
/// Activity statistics.
pub mod stats;

pub use crate::common::{EmuError, FaultKind, Result};
pub use crate::config::EngineConfig;
/// The emulator; open with [`Emulator::open`].
pub use crate::core::Emulator;
pub use crate::core::{Hook, HookId, HookRange, MemHookMask, RunRequest, RunResult, RunStatus, StopHandle};
pub use crate::sim::{ContextId, ContextTable};
pub use crate::stats::EmuStats;
