//! Emulator (one emulation context).
//!
//! This module defines the aggregate that owns everything one emulated machine
//! needs. It performs the following:
//! 1. **Lifecycle:** Open for an architecture and mode (or a custom backend), and close.
//! 2. **Memory Control:** Map, unmap, protect, read, write, and load guest memory,
//!    keeping the decode cache coherent with every change to executable bytes.
//! 3. **Register Control:** Checked single, batch, and narrow register access,
//!    name lookup, and whole-bank save/restore.
//! 4. **Hook Control:** Registration and removal of observers.
//! 5. **Cancellation:** Stop requests from hooks or, through [`StopHandle`], other threads.
//!
//! The step loop itself lives in `execution`.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use super::cache::DecodeCache;
use super::execution::StopHandle;
use super::hooks::{Hook, HookId, HookRegistry};
use super::regs::{RegId, RegisterBank, RegisterSnapshot};
use crate::common::{AccessType, MemoryError, Result};
use crate::config::EngineConfig;
use crate::isa::{self, Arch, Backend, Endian, Instruction, Mode};
use crate::memory::{MemoryMap, Perms, RegionId, RegionInfo};
use crate::stats::EmuStats;

/// One independent emulated machine.
///
/// Owns exactly one memory region table, register bank, hook registry and
/// backend. All methods are synchronous; hooks run on the thread that called
/// [`Emulator::run`](Emulator::run) and receive `&mut Emulator`, so they may
/// use any method here (a nested `run` fails with [`EmuError::Reentrant`](crate::common::EmuError::Reentrant)).
///
/// # Examples
///
/// ```
/// use emuctl_core::core::{Emulator, RunRequest, RunStatus};
/// use emuctl_core::isa::{Arch, Mode, mips};
/// use emuctl_core::memory::Perms;
///
/// let mut emu = Emulator::open(Arch::Mips, Mode::MIPS32_BE).unwrap();
/// emu.mem_map(0x10000, 0x2000, Perms::ALL).unwrap();
/// emu.mem_write(0x10000, &[0x34, 0x21, 0x34, 0x56]).unwrap(); // ori $at, $at, 0x3456
/// emu.reg_write(mips::AT, 0x6789).unwrap();
///
/// let result = emu.run(RunRequest::new(0x10000).until(0x10004)).unwrap();
/// assert_eq!(result.status, RunStatus::Completed);
/// assert_eq!(result.steps_executed, 1);
/// assert_eq!(emu.reg_read(mips::AT).unwrap(), 0x77df);
/// ```
pub struct Emulator {
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) config: EngineConfig,
    pub(crate) endian: Endian,
    pub(crate) memory: MemoryMap,
    pub(crate) regs: RegisterBank,
    pub(crate) hooks: HookRegistry,
    pub(crate) cache: DecodeCache,
    pub(crate) stats: EmuStats,
    pub(crate) stop: Arc<AtomicBool>,
    pub(crate) running: bool,
    /// Bumped whenever executable bytes or permissions change.
    pub(crate) code_epoch: u64,
}

impl Emulator {
    /// Opens an emulator with the bundled backend and default configuration.
    ///
    /// # Errors
    ///
    /// `UnsupportedArch` or `UnsupportedMode`.
    pub fn open(arch: Arch, mode: Mode) -> Result<Self> {
        Self::with_config(arch, mode, EngineConfig::default())
    }

    /// Opens an emulator with the bundled backend.
    ///
    /// # Errors
    ///
    /// `UnsupportedArch`, `UnsupportedMode`, or a configuration validation error.
    pub fn with_config(arch: Arch, mode: Mode, config: EngineConfig) -> Result<Self> {
        let backend = isa::backend_for(arch, mode)?;
        Self::with_backend(backend, config)
    }

    /// Opens an emulator driving a caller-supplied backend.
    ///
    /// # Errors
    ///
    /// A configuration validation error.
    pub fn with_backend(backend: Arc<dyn Backend>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let mode = backend.mode();
        debug!(arch = %backend.arch(), %mode, page_size = config.page_size, "opened emulator");
        Ok(Self {
            endian: mode.endian,
            memory: MemoryMap::new(config.page_size, config.max_mapped_bytes),
            regs: RegisterBank::new(backend.layout()),
            hooks: HookRegistry::new(),
            cache: DecodeCache::new(config.page_size, backend.max_insn_len()),
            stats: EmuStats::default(),
            stop: Arc::new(AtomicBool::new(false)),
            running: false,
            code_epoch: 0,
            backend,
            config,
        })
    }

    /// Closes the emulator, releasing all regions and hooks.
    pub fn close(self) {
        debug!(
            arch = %self.arch(),
            regions = self.memory.regions().count(),
            hooks = self.hooks.len(),
            "closed emulator"
        );
    }

    /// Architecture of the backend.
    pub fn arch(&self) -> Arch {
        self.backend.arch()
    }

    /// Mode of the backend.
    pub fn mode(&self) -> Mode {
        self.backend.mode()
    }

    /// Mapping granularity in bytes.
    pub const fn page_size(&self) -> u64 {
        self.memory.page_size()
    }

    /// Configuration in force.
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The backend this emulator drives.
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Activity counters.
    pub const fn stats(&self) -> &EmuStats {
        &self.stats
    }

    /// Zeroes the activity counters.
    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    // --- memory ---

    /// Maps a zero-filled region.
    ///
    /// # Errors
    ///
    /// `Overlap`, `InvalidLength`, `Misaligned`, or `OutOfMemory`.
    pub fn mem_map(&mut self, base: u64, len: u64, perms: Perms) -> Result<RegionId> {
        Ok(self.memory.map(base, len, perms)?)
    }

    /// Unmaps a page-aligned range, splitting regions at its edges.
    ///
    /// # Errors
    ///
    /// `NotMapped`, `PartialOverlap`, `InvalidLength`, or `Misaligned`.
    pub fn mem_unmap(&mut self, base: u64, len: u64) -> Result<()> {
        self.memory.unmap(base, len)?;
        self.invalidate_code(base, len);
        Ok(())
    }

    /// Changes the permissions of a page-aligned range.
    ///
    /// # Errors
    ///
    /// `NotMapped`, `PartialOverlap`, `InvalidLength`, or `Misaligned`.
    pub fn mem_protect(&mut self, base: u64, len: u64, perms: Perms) -> Result<()> {
        self.memory.protect(base, len, perms)?;
        self.invalidate_code(base, len);
        Ok(())
    }

    /// Reads guest memory, ignoring permissions.
    ///
    /// # Errors
    ///
    /// `Unmapped` naming the first byte no region covers.
    pub fn mem_read(&self, addr: u64, len: usize) -> Result<Vec<u8>> {
        Ok(self.memory.read(addr, len)?)
    }

    /// Fills `buf` from guest memory, ignoring permissions.
    ///
    /// # Errors
    ///
    /// `Unmapped` naming the first byte no region covers.
    pub fn mem_read_into(&self, addr: u64, buf: &mut [u8]) -> Result<()> {
        Ok(self.memory.read_into(addr, buf)?)
    }

    /// Writes guest memory, honouring write permission.
    ///
    /// # Errors
    ///
    /// `Unmapped` or `WriteProtected`; nothing is written on error.
    pub fn mem_write(&mut self, addr: u64, bytes: &[u8]) -> Result<()> {
        self.memory.write(addr, bytes)?;
        self.code_written(addr, bytes.len());
        Ok(())
    }

    /// Writes guest memory regardless of permissions (loading code into R-X regions).
    ///
    /// # Errors
    ///
    /// `Unmapped`; nothing is written on error.
    pub fn mem_load(&mut self, addr: u64, bytes: &[u8]) -> Result<()> {
        self.memory.load(addr, bytes)?;
        self.code_written(addr, bytes.len());
        Ok(())
    }

    /// Mapped regions in ascending address order.
    pub fn mem_regions(&self) -> Vec<RegionInfo> {
        self.memory.regions().collect()
    }

    /// Region and permissions covering `addr`.
    ///
    /// # Errors
    ///
    /// `Unmapped` if no region covers `addr`.
    pub fn mem_translate(&self, addr: u64) -> Result<(RegionId, Perms)> {
        Ok(self.memory.translate(addr)?)
    }

    /// Decodes the instruction at `addr` without executing it or firing hooks.
    ///
    /// # Errors
    ///
    /// `Unmapped` if the bytes are not mapped, or a `DecodeError`.
    pub fn decode_at(&self, addr: u64) -> Result<Instruction> {
        let bytes = self.fetch_window(addr, false)?;
        Ok(self.backend.decode(addr, &bytes)?)
    }

    /// Reads up to the backend's longest instruction at `addr`.
    ///
    /// The first `min_insn_len` bytes must be mapped (and executable when
    /// `exec` is set); the window then extends while bytes remain available.
    pub(crate) fn fetch_window(&self, addr: u64, exec: bool) -> Result<Vec<u8>, MemoryError> {
        let min = self.backend.min_insn_len();
        let max = self.backend.max_insn_len().max(min);
        let usable = |a: u64, n: usize| {
            if exec {
                self.memory.check_access(a, n, AccessType::Fetch).is_ok()
            } else {
                self.memory.read(a, n).is_ok()
            }
        };
        if !usable(addr, min) {
            return Err(MemoryError::Unmapped(addr));
        }
        let mut len = min;
        while len < max && usable(addr.wrapping_add(len as u64), 1) {
            len += 1;
        }
        self.memory.read(addr, len)
    }

    fn code_written(&mut self, addr: u64, len: usize) {
        if self.memory.touches_executable(addr, len) {
            self.invalidate_code(addr, len as u64);
        }
    }

    pub(crate) fn invalidate_code(&mut self, addr: u64, len: u64) {
        let _ = self.cache.invalidate(addr, len);
        self.code_epoch = self.code_epoch.wrapping_add(1);
    }

    // --- registers ---

    /// Reads a register.
    ///
    /// # Errors
    ///
    /// `InvalidRegister` if `id` is not defined for this architecture and mode.
    pub fn reg_read(&self, id: RegId) -> Result<u64> {
        Ok(self.regs.read(id)?)
    }

    /// Writes a register at full width.
    ///
    /// # Errors
    ///
    /// `InvalidRegister` or `ValueOutOfRange`.
    pub fn reg_write(&mut self, id: RegId, value: u64) -> Result<()> {
        Ok(self.regs.write(id, value)?)
    }

    /// Writes a `bits`-wide value, sign-extended to the register width.
    ///
    /// # Errors
    ///
    /// `InvalidRegister` or `ValueOutOfRange`.
    pub fn reg_write_narrow(&mut self, id: RegId, value: u64, bits: u32) -> Result<()> {
        Ok(self.regs.write_narrow(id, value, bits)?)
    }

    /// Reads several registers.
    ///
    /// # Errors
    ///
    /// `InvalidRegister` naming the first unknown id.
    pub fn reg_read_batch(&self, ids: &[RegId]) -> Result<Vec<u64>> {
        Ok(self.regs.read_batch(ids)?)
    }

    /// Writes several registers, all or nothing.
    ///
    /// # Errors
    ///
    /// The first invalid id or out-of-range value.
    pub fn reg_write_batch(&mut self, writes: &[(RegId, u64)]) -> Result<()> {
        Ok(self.regs.write_batch(writes)?)
    }

    /// Resolves a register name (`"at"`, `"$1"`, `"r1"`, `"a0"`, `"x10"`, `"pc"`).
    pub fn reg_lookup(&self, name: &str) -> Option<RegId> {
        self.regs.layout().lookup(name)
    }

    /// Canonical name of a register.
    pub fn reg_name(&self, id: RegId) -> Option<&'static str> {
        self.regs.layout().name(id)
    }

    /// Current program counter.
    pub fn pc(&self) -> u64 {
        self.regs.pc()
    }

    /// Captures every register.
    pub fn save_registers(&self) -> RegisterSnapshot {
        self.regs.snapshot()
    }

    /// Restores registers captured from an emulator with the same layout.
    ///
    /// # Errors
    ///
    /// `SnapshotMismatch` for a snapshot of another architecture or width.
    pub fn restore_registers(&mut self, snapshot: &RegisterSnapshot) -> Result<()> {
        Ok(self.regs.restore(snapshot)?)
    }

    // --- hooks ---

    /// Registers a hook.
    ///
    /// May be called from inside a hook; the new hook first fires at the next
    /// dispatch point.
    ///
    /// # Errors
    ///
    /// `InvalidMask` for a memory hook whose mask does not suit its class.
    pub fn add_hook(&mut self, hook: Hook) -> Result<HookId> {
        Ok(self.hooks.add(hook)?)
    }

    /// Unregisters a hook. May be called from inside any hook, including its own.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown or already removed id.
    pub fn remove_hook(&mut self, id: HookId) -> Result<()> {
        Ok(self.hooks.remove(id)?)
    }

    /// Number of registered hooks.
    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    // --- cancellation ---

    /// Requests the current run to stop at the next dispatch point.
    ///
    /// Outside a run this has no effect: every run starts with the request cleared.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// A thread-safe handle that can stop runs of this emulator.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle::new(Arc::clone(&self.stop))
    }

    /// Returns `true` while a run is in progress (observable from hooks).
    pub const fn is_running(&self) -> bool {
        self.running
    }

    pub(crate) fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Emulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emulator")
            .field("arch", &self.arch())
            .field("mode", &self.mode())
            .field("memory", &self.memory)
            .field("regs", &self.regs)
            .field("hooks", &self.hooks)
            .field("running", &self.running)
            .finish_non_exhaustive()
    }
}
