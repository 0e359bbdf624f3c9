//! Run Loop and Hook Dispatch.
//!
//! This module drives guest execution for one [`Emulator`]. Each step performs:
//! 1. **Termination checks:** Stop request, end address, step budget, deadline (in that order).
//! 2. **Fetch:** Execute-permission check, decode-cache lookup, decode.
//! 3. **Observation:** Block-entry, instruction-entry, and fetch hooks.
//! 4. **Execute:** The backend runs the instruction against a [`GuestView`].
//! 5. **Control flow:** Branches, delay slots, and interrupts update pc and block state.
//!
//! A fault ends the run with pc at the faulting instruction and every earlier
//! instruction's effects committed. A stop request, whether from a hook or
//! another thread, is honoured at the next dispatch point.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use super::guest::GuestView;
use super::hooks::{Callback, HookKind, MemHookMask};
use crate::common::{AccessType, DecodeError, EmuError, FaultKind, InvalidAccess, MemAccess, Result};
use crate::core::Emulator;
use crate::isa::{EngineEffect, ExecFault, Instruction};

/// Parameters of one run.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use emuctl_core::core::RunRequest;
///
/// let req = RunRequest::new(0x1000)
///     .until(0x1040)
///     .timeout(Duration::from_millis(50))
///     .max_steps(1_000);
/// assert_eq!(req.end, Some(0x1040));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunRequest {
    /// Address of the first instruction.
    pub start: u64,
    /// Stop, without executing it, when pc reaches this address.
    pub end: Option<u64>,
    /// Wall-clock budget, checked between instructions.
    pub timeout: Option<Duration>,
    /// Instruction budget.
    pub max_steps: Option<u64>,
}

impl RunRequest {
    /// Runs from `start` with no end address or budget.
    pub const fn new(start: u64) -> Self {
        Self {
            start,
            end: None,
            timeout: None,
            max_steps: None,
        }
    }

    /// Sets the end address.
    #[must_use]
    pub const fn until(mut self, end: u64) -> Self {
        self.end = Some(end);
        self
    }

    /// Sets the wall-clock budget.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the instruction budget.
    #[must_use]
    pub const fn max_steps(mut self, steps: u64) -> Self {
        self.max_steps = Some(steps);
        self
    }
}

/// Why a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunStatus {
    /// pc reached the end address.
    Completed,
    /// The step budget or the deadline ran out.
    Timeout,
    /// A hook or a [`StopHandle`] requested a stop.
    Stopped,
    /// The guest hit an unrecoverable condition.
    Fault {
        /// What went wrong.
        kind: FaultKind,
        /// Data address for memory faults, instruction address otherwise.
        address: u64,
    },
}

/// Outcome of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunResult {
    /// Why the run ended.
    pub status: RunStatus,
    /// Instructions executed to completion.
    pub steps_executed: u64,
    /// pc when the run ended.
    pub pc: u64,
}

impl RunResult {
    /// Returns `true` if the run reached its end address.
    pub const fn is_completed(&self) -> bool {
        matches!(self.status, RunStatus::Completed)
    }

    /// The fault that ended the run, if any.
    pub const fn fault(&self) -> Option<(FaultKind, u64)> {
        match self.status {
            RunStatus::Fault { kind, address } => Some((kind, address)),
            _ => None,
        }
    }
}

/// Thread-safe stop request for one emulator.
///
/// Cloned handles share the same flag. A stop requested between runs is
/// discarded when the next run starts.
#[derive(Clone, Debug)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub(crate) const fn new(flag: Arc<AtomicBool>) -> Self {
        Self(flag)
    }

    /// Requests the current run to stop.
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Per-run control-flow state.
#[derive(Debug, Default)]
struct RunState {
    steps: u64,
    /// The next instruction starts a basic block.
    new_block: bool,
    /// Target of a taken delayed branch, applied after the slot executes.
    pending: Option<u64>,
    /// The instruction about to execute is a delay slot.
    in_slot: bool,
}

enum Step {
    Continue,
    Exit(RunStatus),
}

enum FetchError {
    Fault(ExecFault),
    Invalid,
}

fn fault(f: ExecFault) -> Step {
    Step::Exit(RunStatus::Fault {
        kind: f.kind,
        address: f.address,
    })
}

impl Emulator {
    /// Executes guest code until the end address, a budget, a stop, or a fault.
    ///
    /// Faults are reported in the result, not as errors.
    ///
    /// # Errors
    ///
    /// `Reentrant` if called while a run is in progress (from inside a hook),
    /// `AddressOutOfRange` if `start` or `end` does not fit the mode's width.
    pub fn run(&mut self, req: RunRequest) -> Result<RunResult> {
        if self.running {
            return Err(EmuError::Reentrant);
        }
        let mask = self.regs.layout().mask();
        if let Some(addr) = [Some(req.start), req.end].into_iter().flatten().find(|&a| (a & !mask) != 0) {
            return Err(EmuError::AddressOutOfRange(addr));
        }
        self.running = true;
        self.stop.store(false, Ordering::Release);
        self.regs.set_pc(req.start);
        debug!(
            "run from {:#x} end={:?} max_steps={:?} timeout={:?}",
            req.start, req.end, req.max_steps, req.timeout
        );

        let started = Instant::now();
        let deadline = req.timeout.and_then(|t| started.checked_add(t));
        let mut st = RunState {
            new_block: true,
            ..RunState::default()
        };
        let status = self.step_loop(&req, deadline, &mut st);

        self.running = false;
        self.stats.runs += 1;
        self.stats.run_time += started.elapsed();
        let pc = self.regs.pc();
        if let RunStatus::Fault { kind, address } = status {
            self.stats.faults += 1;
            warn!(%kind, "guest fault at {address:#x} (pc {pc:#x})");
        }
        debug!(?status, steps = st.steps, "run ended at {pc:#x}");

        Ok(RunResult {
            status,
            steps_executed: st.steps,
            pc,
        })
    }

    fn step_loop(&mut self, req: &RunRequest, deadline: Option<Instant>, st: &mut RunState) -> RunStatus {
        loop {
            if self.stop_requested() {
                return RunStatus::Stopped;
            }
            let pc = self.regs.pc();
            if st.pending.is_none() && req.end == Some(pc) {
                return RunStatus::Completed;
            }
            if req.max_steps.is_some_and(|max| st.steps >= max) {
                return RunStatus::Timeout;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return RunStatus::Timeout;
            }
            if let Step::Exit(status) = self.step(pc, st) {
                return status;
            }
        }
    }

    fn step(&mut self, pc: u64, st: &mut RunState) -> Step {
        let mut insn = match self.fetch(pc) {
            Ok(insn) => insn,
            Err(FetchError::Fault(f)) => return fault(f),
            Err(FetchError::Invalid) => return self.invalid_instruction(pc, st),
        };
        let epoch = self.code_epoch;

        if st.new_block {
            st.new_block = false;
            self.stats.blocks += 1;
            if self.hooks.has(HookKind::Block) {
                let size = self.block_size(pc);
                self.fire_block(pc, size);
                if let Some(step) = self.redirected(pc, st) {
                    return step;
                }
            }
        }
        if self.hooks.has(HookKind::Code) {
            self.fire_code(pc, u32::from(insn.len));
            if let Some(step) = self.redirected(pc, st) {
                return step;
            }
        }
        if self.code_epoch != epoch {
            // A hook rewrote code or permissions; execute what is there now.
            insn = match self.fetch(pc) {
                Ok(insn) => insn,
                Err(FetchError::Fault(f)) => return fault(f),
                Err(FetchError::Invalid) => return self.invalid_instruction(pc, st),
            };
        }
        if self.hooks.has(HookKind::Mem) {
            self.fire_mem(&MemAccess {
                kind: AccessType::Fetch,
                address: pc,
                size: usize::from(insn.len),
                value: insn.raw,
            });
            if let Some(step) = self.redirected(pc, st) {
                return step;
            }
        }

        if self.config.tracing() {
            trace!("{pc:#010x}: {:#010x}", insn.raw);
        }

        let backend = Arc::clone(&self.backend);
        let effect = match backend.execute(&insn, &mut GuestView::new(self)) {
            Ok(effect) => effect,
            Err(f) => {
                self.regs.set_pc(pc);
                return fault(f);
            }
        };
        self.complete(&insn, effect, st)
    }

    /// Applies an executed instruction's effect to pc and block state.
    fn complete(&mut self, insn: &Instruction, effect: EngineEffect, st: &mut RunState) -> Step {
        let was_slot = std::mem::take(&mut st.in_slot);
        let after = if was_slot {
            st.new_block = true;
            st.pending.take().unwrap_or(insn.next())
        } else {
            insn.next()
        };

        match effect {
            EngineEffect::Next => self.regs.set_pc(after),
            EngineEffect::Branch(target) => {
                st.pending = None;
                st.new_block = true;
                self.regs.set_pc(target);
            }
            EngineEffect::DelayedBranch(target) => {
                st.pending = Some(target);
                self.regs.set_pc(insn.next());
            }
            EngineEffect::Interrupt(number) => {
                self.regs.set_pc(after);
                if !self.fire_interrupt(insn.address, number) {
                    // Nothing observed it: no hook covers this address, or a
                    // stop arrived first.
                    self.regs.set_pc(insn.address);
                    if self.stop_requested() {
                        return Step::Exit(RunStatus::Stopped);
                    }
                    return Step::Exit(RunStatus::Fault {
                        kind: FaultKind::UnhandledInterrupt(number),
                        address: insn.address,
                    });
                }
                st.pending = None;
                st.new_block = true;
                self.count_step(st);
                return Step::Continue;
            }
        }

        if insn.has_delay_slot {
            st.in_slot = true;
        } else if insn.ends_block {
            st.new_block = true;
        }
        self.count_step(st);
        Step::Continue
    }

    fn count_step(&mut self, st: &mut RunState) {
        st.steps += 1;
        self.stats.instructions += 1;
    }

    /// Ends the current step early if a hook stopped the run or moved pc.
    fn redirected(&mut self, pc: u64, st: &mut RunState) -> Option<Step> {
        if self.stop_requested() {
            return Some(Step::Exit(RunStatus::Stopped));
        }
        if self.regs.pc() != pc {
            st.new_block = true;
            st.pending = None;
            st.in_slot = false;
            return Some(Step::Continue);
        }
        None
    }

    fn invalid_instruction(&mut self, pc: u64, st: &mut RunState) -> Step {
        if self.hooks.has(HookKind::InvalidInstruction) {
            let handled = self.fire_invalid_instruction(pc);
            if self.stop_requested() {
                return Step::Exit(RunStatus::Stopped);
            }
            if handled {
                if self.regs.pc() == pc {
                    let skip = self.backend.min_insn_len() as u64;
                    self.regs.set_pc(pc.wrapping_add(skip));
                }
                st.new_block = true;
                st.pending = None;
                st.in_slot = false;
                return Step::Continue;
            }
        }
        Step::Exit(RunStatus::Fault {
            kind: FaultKind::InvalidInstruction,
            address: pc,
        })
    }

    fn fetch(&mut self, pc: u64) -> Result<Instruction, FetchError> {
        let min = self.backend.min_insn_len();
        self.guest_access(pc, min, AccessType::Fetch, 0)
            .map_err(FetchError::Fault)?;

        if self.config.decode_cache {
            if let Some(insn) = self.cache.get(pc) {
                self.stats.cache_hits += 1;
                return Ok(insn);
            }
            self.stats.cache_misses += 1;
        }

        let bytes = self.fetch_window(pc, true).map_err(|_| {
            FetchError::Fault(ExecFault {
                kind: FaultKind::Unmapped(AccessType::Fetch),
                address: pc,
            })
        })?;
        match self.backend.decode(pc, &bytes) {
            Ok(insn) => {
                if self.config.decode_cache {
                    self.cache.insert(insn);
                }
                Ok(insn)
            }
            Err(DecodeError::Truncated { available, .. }) => Err(FetchError::Fault(ExecFault {
                kind: FaultKind::Unmapped(AccessType::Fetch),
                address: pc.wrapping_add(available as u64),
            })),
            Err(DecodeError::UnknownOpcode(_)) => Err(FetchError::Invalid),
        }
    }

    /// Decodes without side effects other than filling the cache.
    fn peek(&mut self, addr: u64) -> Option<Instruction> {
        if self.config.decode_cache
            && let Some(insn) = self.cache.get(addr)
        {
            return Some(insn);
        }
        let bytes = self.fetch_window(addr, true).ok()?;
        let insn = self.backend.decode(addr, &bytes).ok()?;
        if self.config.decode_cache {
            self.cache.insert(insn);
        }
        Some(insn)
    }

    /// Estimated size in bytes of the block starting at `pc`, including any
    /// trailing delay slot.
    fn block_size(&mut self, pc: u64) -> u32 {
        let mut addr = pc;
        let mut size: u64 = 0;
        let mut slot_next = false;
        for _ in 0..self.config.max_block_instructions {
            let Some(insn) = self.peek(addr) else {
                break;
            };
            size += u64::from(insn.len);
            addr = insn.next();
            if slot_next {
                break;
            }
            if insn.ends_block {
                if !insn.has_delay_slot {
                    break;
                }
                slot_next = true;
            }
        }
        u32::try_from(size).unwrap_or(u32::MAX)
    }

    /// Checks a guest access, giving invalid-memory hooks one chance to fix it.
    pub(crate) fn guest_access(
        &mut self,
        addr: u64,
        size: usize,
        access: AccessType,
        value: u64,
    ) -> Result<(), ExecFault> {
        let mut retried = false;
        loop {
            let Err((at, reason)) = self.memory.check_access(addr, size, access) else {
                return Ok(());
            };
            let f = ExecFault {
                kind: reason.fault(access),
                address: at,
            };
            if retried || !self.hooks.has(HookKind::InvalidMem) {
                return Err(f);
            }
            let info = InvalidAccess {
                access: MemAccess {
                    kind: access,
                    address: addr,
                    size,
                    value,
                },
                reason,
            };
            if !self.fire_invalid_mem(&info) || self.stop_requested() {
                return Err(f);
            }
            retried = true;
        }
    }

    // --- dispatch ---

    /// Calls every hook of `kind` matching `addr` and `events`, in
    /// registration order, until one requests a stop.
    fn dispatch(
        &mut self,
        kind: HookKind,
        addr: u64,
        events: MemHookMask,
        mut call: impl FnMut(&mut Self, &mut Callback),
    ) {
        for id in self.hooks.matching(kind, addr, events) {
            if self.stop_requested() {
                break;
            }
            let Some(mut callback) = self.hooks.checkout(id) else {
                continue;
            };
            self.stats.hook_calls += 1;
            call(self, &mut callback);
            self.hooks.checkin(id, callback);
        }
    }

    fn fire_block(&mut self, addr: u64, size: u32) {
        self.dispatch(HookKind::Block, addr, MemHookMask::empty(), |emu, cb| {
            if let Callback::Block(f) = cb {
                f(emu, addr, size);
            }
        });
    }

    fn fire_code(&mut self, addr: u64, size: u32) {
        self.dispatch(HookKind::Code, addr, MemHookMask::empty(), |emu, cb| {
            if let Callback::Code(f) = cb {
                f(emu, addr, size);
            }
        });
    }

    pub(crate) fn fire_mem(&mut self, access: &MemAccess) {
        if !self.hooks.has(HookKind::Mem) {
            return;
        }
        let events = match access.kind {
            AccessType::Read => MemHookMask::READ,
            AccessType::Write => MemHookMask::WRITE,
            AccessType::Fetch => MemHookMask::FETCH,
        };
        self.dispatch(HookKind::Mem, access.address, events, |emu, cb| {
            if let Callback::Mem(f) = cb {
                f(emu, access);
            }
        });
    }

    fn fire_invalid_mem(&mut self, info: &InvalidAccess) -> bool {
        let events = invalid_events(info);
        let mut handled = false;
        self.dispatch(HookKind::InvalidMem, info.access.address, events, |emu, cb| {
            if let Callback::InvalidMem(f) = cb {
                handled |= f(emu, info);
            }
        });
        handled
    }

    /// Returns `true` if at least one interrupt hook observed the interrupt.
    fn fire_interrupt(&mut self, addr: u64, number: u32) -> bool {
        debug!(number, "interrupt at {addr:#x}");
        let mut observed = false;
        self.dispatch(HookKind::Interrupt, addr, MemHookMask::empty(), |emu, cb| {
            if let Callback::Interrupt(f) = cb {
                observed = true;
                f(emu, number);
            }
        });
        observed
    }

    fn fire_invalid_instruction(&mut self, addr: u64) -> bool {
        let mut handled = false;
        self.dispatch(
            HookKind::InvalidInstruction,
            addr,
            MemHookMask::empty(),
            |emu, cb| {
                if let Callback::InvalidInstruction(f) = cb {
                    handled |= f(emu, addr);
                }
            },
        );
        handled
    }
}

fn invalid_events(info: &InvalidAccess) -> MemHookMask {
    use crate::common::InvalidReason::{Protected, Unmapped};
    match (info.access.kind, info.reason) {
        (AccessType::Read, Unmapped) => MemHookMask::READ_UNMAPPED,
        (AccessType::Write, Unmapped) => MemHookMask::WRITE_UNMAPPED,
        (AccessType::Fetch, Unmapped) => MemHookMask::FETCH_UNMAPPED,
        (AccessType::Read, Protected) => MemHookMask::READ_PROT,
        (AccessType::Write, Protected) => MemHookMask::WRITE_PROT,
        (AccessType::Fetch, Protected) => MemHookMask::FETCH_PROT,
    }
}
