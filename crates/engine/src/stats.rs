//! Emulation statistics.
//!
//! This module tracks activity counters for one emulator. It provides:
//! 1. **Execution:** Runs, executed instructions, and entered blocks.
//! 2. **Observation:** Hook invocations.
//! 3. **Outcomes:** Faulted runs.
//! 4. **Decode cache:** Hits and misses.
//!
//! Counters accumulate over the emulator's lifetime until [`EmuStats::reset`].

use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Activity counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EmuStats {
    /// Completed calls to `run`, whatever their status.
    pub runs: u64,
    /// Instructions executed to completion.
    pub instructions: u64,
    /// Basic blocks entered.
    pub blocks: u64,
    /// Individual hook callback invocations.
    pub hook_calls: u64,
    /// Runs that ended in a fault.
    pub faults: u64,
    /// Decode-cache hits.
    pub cache_hits: u64,
    /// Decode-cache misses.
    pub cache_misses: u64,
    /// Wall-clock time spent inside `run`.
    pub run_time: Duration,
}

impl EmuStats {
    /// Zeroes every counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Instructions per second of run time, or 0 before anything has run.
    pub fn instructions_per_second(&self) -> f64 {
        let secs = self.run_time.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.instructions as f64 / secs
        }
    }

    /// Decode-cache hit rate in percent, or 0 with no lookups.
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            100.0 * self.cache_hits as f64 / total as f64
        }
    }
}

impl fmt::Display for EmuStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "runs                     {}", self.runs)?;
        writeln!(f, "instructions             {}", self.instructions)?;
        writeln!(f, "blocks                   {}", self.blocks)?;
        writeln!(f, "hook_calls               {}", self.hook_calls)?;
        writeln!(f, "faults                   {}", self.faults)?;
        writeln!(
            f,
            "decode_cache             {} hits / {} misses ({:.2}%)",
            self.cache_hits,
            self.cache_misses,
            self.cache_hit_rate()
        )?;
        write!(
            f,
            "run_time                 {:.4} s ({:.0} insn/s)",
            self.run_time.as_secs_f64(),
            self.instructions_per_second()
        )
    }
}
