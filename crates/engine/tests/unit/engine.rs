//! # Run Loop Tests
//!
//! Termination order, faults, control-flow redirection, cancellation,
//! reentrancy, self-modifying code, and variable-length fetch.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use emuctl_core::common::{AccessType, FaultKind};
use emuctl_core::isa::mips;
use emuctl_core::memory::Perms;
use emuctl_core::{EmuError, Emulator, EngineConfig, Hook, HookRange, RunRequest, RunStatus};
use pretty_assertions::assert_eq;

use crate::common::builder::mips as m;
use crate::common::harness::{TestContext, events, init_tracing, log};
use crate::common::mocks::backend::{self as toy, ToyBackend};

const CODE: u64 = 0x10000;
const DATA: u64 = 0x20000;
const INVALID: u32 = 0xFFFF_FFFF;

const T0: u32 = 8;
const T1: u32 = 9;
const V0: u32 = 2;
const A0: u32 = 4;

fn mips(words: &[u32]) -> TestContext {
    TestContext::mips_be()
        .with_memory(CODE, 0x10000, Perms::ALL)
        .with_memory(DATA, 0x1000, Perms::READ | Perms::WRITE)
        .load_program(CODE, words)
}

fn fault(kind: FaultKind, address: u64) -> RunStatus {
    RunStatus::Fault { kind, address }
}

fn counting(n: usize) -> Vec<u32> {
    vec![m::addiu(V0, V0, 1); n]
}

#[test]
fn test_end_equal_to_start_executes_nothing() {
    let mut ctx = mips(&[m::ori(1, 1, 0x3456)]).set(mips::AT, 0x6789);
    let calls = log::<u64>();
    let seen = Arc::clone(&calls);
    let _ = ctx.emu.add_hook(Hook::code(move |_, addr, _| seen.lock().unwrap().push(addr))).unwrap();

    let result = ctx.run_to(CODE, CODE);
    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.steps_executed, 0);
    assert_eq!(ctx.reg(mips::AT), 0x6789);
    assert!(events(&calls).is_empty());
}

#[test]
fn test_step_budget() {
    let mut ctx = mips(&counting(8));
    let result = ctx.run(RunRequest::new(CODE).until(CODE + 32).max_steps(3));
    assert_eq!(result.status, RunStatus::Timeout);
    assert_eq!(result.steps_executed, 3);
    assert_eq!(result.pc, CODE + 12);
    assert_eq!(ctx.reg(mips::V0), 3);

    let result = ctx.run(RunRequest::new(CODE).max_steps(0));
    assert_eq!(result.status, RunStatus::Timeout);
    assert_eq!(result.steps_executed, 0);
}

#[test]
fn test_end_checked_before_step_budget() {
    let mut ctx = mips(&counting(2));
    let result = ctx.run(RunRequest::new(CODE).until(CODE + 8).max_steps(2));
    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.steps_executed, 2);
}

#[test]
fn test_wall_clock_timeout() {
    // beq zero, zero, -1 spins on itself through its delay slot.
    let mut ctx = mips(&[m::beq(0, 0, -1), m::nop()]);
    let result = ctx.run(RunRequest::new(CODE).timeout(Duration::from_millis(20)));
    assert_eq!(result.status, RunStatus::Timeout);
    assert!(result.steps_executed > 0);
}

#[test]
fn test_fetch_faults() {
    let mut ctx = mips(&[]);
    let result = ctx.run_to(0x90000, 0x90004);
    assert_eq!(result.status, fault(FaultKind::Unmapped(AccessType::Fetch), 0x90000));
    assert_eq!(result.steps_executed, 0);
    assert_eq!(result.pc, 0x90000);

    let result = ctx.run_to(DATA, DATA + 4);
    assert_eq!(result.status, fault(FaultKind::Protected(AccessType::Fetch), DATA));
}

#[test]
fn test_data_faults_report_data_address() {
    let mut ctx = mips(&[m::lui(T0, 0x9), m::lw(V0, 0, T0)]);
    let result = ctx.run_to(CODE, CODE + 8);
    assert_eq!(result.status, fault(FaultKind::Unmapped(AccessType::Read), 0x90000));
    assert_eq!(result.steps_executed, 1);
    assert_eq!(result.pc, CODE + 4);
    assert_eq!(ctx.reg(mips::gpr(T0 as u16)), 0x90000);
}

#[test]
fn test_unaligned_and_protected_accesses() {
    let mut ctx = mips(&[m::lui(T0, 2), m::ori(T0, T0, 1), m::lw(V0, 0, T0)]);
    let result = ctx.run_to(CODE, CODE + 12);
    assert_eq!(result.status, fault(FaultKind::Unaligned(AccessType::Read), DATA + 1));
    assert_eq!(result.pc, CODE + 8);

    let mut ctx = TestContext::mips_be()
        .with_memory(CODE, 0x1000, Perms::ALL)
        .with_memory(DATA, 0x1000, Perms::READ)
        .load_program(CODE, &[m::lui(T0, 2), m::sw(V0, 0, T0)]);
    let result = ctx.run_to(CODE, CODE + 8);
    assert_eq!(result.status, fault(FaultKind::Protected(AccessType::Write), DATA));
    assert_eq!(result.steps_executed, 1);
}

#[test]
fn test_invalid_instruction_fault() {
    let mut ctx = mips(&[m::addiu(V0, V0, 1), INVALID]);
    let result = ctx.run_to(CODE, CODE + 8);
    assert_eq!(result.status, fault(FaultKind::InvalidInstruction, CODE + 4));
    assert_eq!(result.steps_executed, 1);
    assert_eq!(result.pc, CODE + 4);
}

#[test]
fn test_unhandled_interrupt_faults_at_instruction() {
    let mut ctx = mips(&[m::syscall()]);
    let result = ctx.run_to(CODE, CODE + 4);
    assert_eq!(result.status, fault(FaultKind::UnhandledInterrupt(mips::opcodes::exc::SYSCALL), CODE));
    assert_eq!(result.steps_executed, 0);
    assert_eq!(result.pc, CODE);
}

#[test]
fn test_run_addresses_wider_than_mode_rejected() {
    let mut ctx = mips(&[m::addiu(V0, V0, 1)]);
    let start = 0x1_0000_0000 | CODE;
    let err = ctx.emu.run(RunRequest::new(start).until(start + 4)).unwrap_err();
    assert_eq!(err, EmuError::AddressOutOfRange(start));

    let err = ctx.emu.run(RunRequest::new(CODE).until(0x1_0000_0000 | (CODE + 4))).unwrap_err();
    assert_eq!(err, EmuError::AddressOutOfRange(0x1_0000_0000 | (CODE + 4)));
    assert_eq!(ctx.emu.stats().runs, 0);
    assert_eq!(ctx.reg(mips::V0), 0);

    assert!(ctx.run_to(CODE, CODE + 4).is_completed());
}

#[test]
fn test_fault_leaves_emulator_reusable() {
    let mut ctx = mips(&[INVALID, m::addiu(V0, V0, 5)]);
    assert!(ctx.run_to(CODE, CODE + 8).fault().is_some());
    let result = ctx.run_to(CODE + 4, CODE + 8);
    assert!(result.is_completed());
    assert_eq!(ctx.reg(mips::V0), 5);
}

#[test]
fn test_nested_run_rejected() {
    let mut ctx = mips(&counting(2));
    let outcomes = log::<bool>();
    let seen = Arc::clone(&outcomes);
    let _ = ctx
        .emu
        .add_hook(
            Hook::code(move |emu, _, _| {
                let nested = emu.run(RunRequest::new(CODE).until(CODE + 4));
                seen.lock().unwrap().push(emu.is_running() && matches!(nested, Err(EmuError::Reentrant)));
            })
            .range(HookRange::at(CODE)),
        )
        .unwrap();

    let result = ctx.run_to(CODE, CODE + 8);
    assert!(result.is_completed());
    assert_eq!(events(&outcomes), vec![true]);
    assert!(!ctx.emu.is_running());
}

#[test]
fn test_stop_from_hook_skips_current_instruction() {
    let mut ctx = mips(&counting(4));
    let _ = ctx
        .emu
        .add_hook(Hook::code(|emu, _, _| emu.stop()).range(HookRange::at(CODE + 8)))
        .unwrap();
    let result = ctx.run_to(CODE, CODE + 16);
    assert_eq!(result.status, RunStatus::Stopped);
    assert_eq!(result.steps_executed, 2);
    assert_eq!(result.pc, CODE + 8);
    assert_eq!(ctx.reg(mips::V0), 2);
}

#[test]
fn test_stop_request_cleared_between_runs() {
    let mut ctx = mips(&counting(1));
    ctx.emu.stop();
    assert!(ctx.run_to(CODE, CODE + 4).is_completed());
}

#[test]
fn test_stop_handle_from_another_thread() {
    let mut ctx = mips(&[m::beq(0, 0, -1), m::nop()]);
    let handle = ctx.emu.stop_handle();
    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        handle.stop();
    });
    let result = ctx.run(RunRequest::new(CODE).timeout(Duration::from_secs(30)));
    stopper.join().unwrap();
    assert_eq!(result.status, RunStatus::Stopped);
}

#[test]
fn test_emulator_moves_across_threads() {
    let ctx = mips(&counting(3));
    let emu: Emulator = ctx.emu;
    let result = thread::spawn(move || {
        let mut emu = emu;
        emu.run(RunRequest::new(CODE).until(CODE + 12)).unwrap()
    })
    .join()
    .unwrap();
    assert!(result.is_completed());
}

#[test]
fn test_delay_slot_executes_before_branch() {
    let mut ctx = mips(&[
        m::beq(0, 0, 2),
        m::addiu(V0, V0, 1),
        m::addiu(V0, V0, 10),
        m::addiu(V0, V0, 100),
    ]);
    let trace = log::<u64>();
    let blocks = log::<(u64, u32)>();
    let (t, b) = (Arc::clone(&trace), Arc::clone(&blocks));
    let _ = ctx.emu.add_hook(Hook::code(move |_, addr, _| t.lock().unwrap().push(addr))).unwrap();
    let _ = ctx.emu.add_hook(Hook::block(move |_, addr, size| b.lock().unwrap().push((addr, size)))).unwrap();

    let result = ctx.run_to(CODE, CODE + 16);
    assert!(result.is_completed());
    assert_eq!(result.steps_executed, 3);
    assert_eq!(ctx.reg(mips::V0), 101);
    assert_eq!(events(&trace), vec![CODE, CODE + 4, CODE + 12]);
    let blocks = events(&blocks);
    assert_eq!(blocks.iter().map(|b| b.0).collect::<Vec<_>>(), vec![CODE, CODE + 12]);
    assert_eq!(blocks[0].1, 8);
}

#[test]
fn test_end_address_not_honoured_inside_delay_slot() {
    // The slot at CODE + 4 runs even though it is the end address.
    let mut ctx = mips(&[m::beq(0, 0, 2), m::addiu(V0, V0, 1), m::nop(), m::addiu(V0, V0, 100)]);
    let result = ctx.run(RunRequest::new(CODE).until(CODE + 4).max_steps(3));
    assert_eq!(result.status, RunStatus::Timeout);
    assert_eq!(result.pc, CODE + 16);
    assert_eq!(ctx.reg(mips::V0), 101);
}

#[test]
fn test_code_hook_redirects_pc() {
    let mut ctx = mips(&[
        m::addiu(V0, V0, 1),
        m::addiu(V0, V0, 10),
        m::addiu(V0, V0, 100),
        m::addiu(V0, V0, 1000),
    ]);
    let _ = ctx
        .emu
        .add_hook(
            Hook::code(|emu, _, _| emu.reg_write(mips::PC, CODE + 12).unwrap())
                .range(HookRange::at(CODE + 4)),
        )
        .unwrap();
    let result = ctx.run_to(CODE, CODE + 16);
    assert!(result.is_completed());
    assert_eq!(result.steps_executed, 2);
    assert_eq!(ctx.reg(mips::V0), 1001);
}

#[test]
fn test_guest_self_modifying_code() {
    let patch = m::addiu(V0, V0, 100);
    let mut ctx = mips(&[
        m::addiu(V0, V0, 1),
        m::sw(T1, 0, T0),
        m::j(CODE as u32),
        m::nop(),
    ])
    .set(mips::gpr(T0 as u16), CODE)
    .set(mips::gpr(T1 as u16), u64::from(patch));

    let result = ctx.run(RunRequest::new(CODE).max_steps(5));
    assert_eq!(result.status, RunStatus::Timeout);
    assert_eq!(ctx.reg(mips::V0), 101);
}

#[test]
fn test_host_write_invalidates_cached_code() {
    let mut ctx = mips(&[m::addiu(V0, V0, 1)]);
    assert!(ctx.run_to(CODE, CODE + 4).is_completed());
    let patch = m::addiu(V0, V0, 100).to_be_bytes();
    ctx.emu.mem_write(CODE, &patch).unwrap();
    assert!(ctx.run_to(CODE, CODE + 4).is_completed());
    assert_eq!(ctx.reg(mips::V0), 101);
}

#[test]
fn test_protect_revokes_execute_on_cached_code() {
    let mut ctx = mips(&[m::addiu(V0, V0, 1)]);
    assert!(ctx.run_to(CODE, CODE + 4).is_completed());
    ctx.emu.mem_protect(CODE, 0x1000, Perms::READ).unwrap();
    let result = ctx.run_to(CODE, CODE + 4);
    assert_eq!(result.status, fault(FaultKind::Protected(AccessType::Fetch), CODE));
}

#[test]
fn test_decode_cache_disabled_runs_identically() {
    init_tracing();
    let config = EngineConfig {
        decode_cache: false,
        trace_instructions: true,
        ..EngineConfig::default()
    };
    let mut ctx = TestContext::with_config(emuctl_core::isa::Arch::Mips, emuctl_core::isa::Mode::MIPS32_BE, config)
        .with_memory(CODE, 0x1000, Perms::ALL)
        .load_program(CODE, &[m::addiu(V0, V0, 1), m::sw(T1, 0, T0), m::j(CODE as u32), m::nop()])
        .set(mips::gpr(T0 as u16), CODE)
        .set(mips::gpr(T1 as u16), u64::from(m::addiu(V0, V0, 100)));
    let _ = ctx.run(RunRequest::new(CODE).max_steps(5));
    assert_eq!(ctx.reg(mips::V0), 101);
    assert_eq!(ctx.emu.stats().cache_hits + ctx.emu.stats().cache_misses, 0);
}

#[test]
fn test_decode_at() {
    let ctx = mips(&[m::beq(0, 0, 2), INVALID]);
    let insn = ctx.emu.decode_at(CODE).unwrap();
    assert!(insn.ends_block);
    assert!(insn.has_delay_slot);
    assert_eq!(insn.len, 4);
    assert!(matches!(ctx.emu.decode_at(CODE + 4), Err(EmuError::Decode(_))));
    assert!(matches!(ctx.emu.decode_at(0x90000), Err(EmuError::Memory(_))));
}

// --- custom backend ---

fn toy(program: &[u8]) -> Emulator {
    init_tracing();
    let mut emu = Emulator::with_backend(Arc::new(ToyBackend), EngineConfig::default()).unwrap();
    let _ = emu.mem_map(0x1000, 0x1000, Perms::ALL).unwrap();
    emu.mem_load(0x1000, program).unwrap();
    emu
}

#[test]
fn test_variable_length_instructions() {
    let mut emu = toy(&[toy::NOP, toy::INC, 1, toy::INC, 1, toy::NOP]);
    let sizes = log::<(u64, u32)>();
    let seen = Arc::clone(&sizes);
    let _ = emu.add_hook(Hook::code(move |_, addr, size| seen.lock().unwrap().push((addr, size)))).unwrap();

    let result = emu.run(RunRequest::new(0x1000).until(0x1006)).unwrap();
    assert!(result.is_completed());
    assert_eq!(result.steps_executed, 4);
    assert_eq!(emu.reg_read(toy::R1).unwrap(), 2);
    assert_eq!(
        events(&sizes),
        vec![(0x1000, 1), (0x1001, 2), (0x1003, 2), (0x1005, 1)]
    );
}

#[test]
fn test_instruction_truncated_by_region_end() {
    let mut emu = toy(&[]);
    emu.mem_load(0x1FFF, &[toy::INC]).unwrap();
    let result = emu.run(RunRequest::new(0x1FFF).until(0x2001)).unwrap();
    assert_eq!(result.status, fault(FaultKind::Unmapped(AccessType::Fetch), 0x2000));
    assert_eq!(result.pc, 0x1FFF);
}

#[test]
fn test_custom_backend_interrupt_and_jump() {
    // int 0x80; jmp +1 (over the nop); nop; inc r2
    let mut emu = toy(&[toy::INT, 0x80, toy::JMP, 1, toy::NOP, toy::INC, 2]);
    let numbers = log::<(u32, u64)>();
    let seen = Arc::clone(&numbers);
    let _ = emu
        .add_hook(Hook::interrupt(move |emu, n| seen.lock().unwrap().push((n, emu.pc()))))
        .unwrap();

    let result = emu.run(RunRequest::new(0x1000).until(0x1007)).unwrap();
    assert!(result.is_completed());
    assert_eq!(result.steps_executed, 3);
    assert_eq!(events(&numbers), vec![(0x80, 0x1002)]);
    assert_eq!(emu.reg_read(toy::R2).unwrap(), 1);
    assert_eq!(emu.arch(), emuctl_core::isa::Arch::X86);
}
