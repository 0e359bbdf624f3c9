//! Context management and program loading.
//!
//! This module provides the handle-based surface over emulators. It includes:
//! 1. **Context Table:** Generation-checked [`ContextId`]s for open emulators,
//!    so a closed context is rejected instead of aliasing a newer one.
//! 2. **Loader:** Mapping and filling a region from a code or data image.

pub mod loader;

use std::fmt;

use tracing::debug;

use crate::common::{Arena, EmuError, Handle, Result};
use crate::config::EngineConfig;
use crate::core::Emulator;
use crate::isa::{Arch, Mode};

pub use loader::load_image;

/// Opaque handle of an open emulation context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(Handle);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx{}", self.0)
    }
}

/// Owner of every open emulation context.
///
/// # Examples
///
/// ```
/// use emuctl_core::sim::ContextTable;
/// use emuctl_core::isa::{Arch, Mode};
///
/// let mut table = ContextTable::new();
/// let ctx = table.open(Arch::RiscV, Mode::RV64).unwrap();
/// assert_eq!(table.get(ctx).unwrap().arch(), Arch::RiscV);
///
/// table.close(ctx).unwrap();
/// assert!(table.get(ctx).is_err());
/// ```
#[derive(Debug, Default)]
pub struct ContextTable {
    contexts: Arena<Emulator>,
}

impl ContextTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a context with the default configuration.
    ///
    /// # Errors
    ///
    /// `UnsupportedArch` or `UnsupportedMode`.
    pub fn open(&mut self, arch: Arch, mode: Mode) -> Result<ContextId> {
        self.open_with(arch, mode, EngineConfig::default())
    }

    /// Opens a context with an explicit configuration.
    ///
    /// # Errors
    ///
    /// `UnsupportedArch`, `UnsupportedMode`, or a configuration validation error.
    pub fn open_with(&mut self, arch: Arch, mode: Mode, config: EngineConfig) -> Result<ContextId> {
        let emu = Emulator::with_config(arch, mode, config)?;
        Ok(self.insert(emu))
    }

    /// Adopts an already constructed emulator.
    pub fn insert(&mut self, emu: Emulator) -> ContextId {
        let id = ContextId(self.contexts.insert(emu));
        debug!(%id, "context opened");
        id
    }

    /// Closes a context, releasing its memory and hooks.
    ///
    /// # Errors
    ///
    /// `InvalidContext` if `id` is already closed or was never issued.
    pub fn close(&mut self, id: ContextId) -> Result<()> {
        self.take(id)?.close();
        Ok(())
    }

    /// Removes a context from the table without closing it.
    ///
    /// # Errors
    ///
    /// `InvalidContext` if `id` is already closed or was never issued.
    pub fn take(&mut self, id: ContextId) -> Result<Emulator> {
        let emu = self.contexts.remove(id.0).ok_or(EmuError::InvalidContext(id))?;
        debug!(%id, "context released");
        Ok(emu)
    }

    /// Shared access to an open context.
    ///
    /// # Errors
    ///
    /// `InvalidContext` for a closed or unknown handle.
    pub fn get(&self, id: ContextId) -> Result<&Emulator> {
        self.contexts.get(id.0).ok_or(EmuError::InvalidContext(id))
    }

    /// Exclusive access to an open context.
    ///
    /// # Errors
    ///
    /// `InvalidContext` for a closed or unknown handle.
    pub fn get_mut(&mut self, id: ContextId) -> Result<&mut Emulator> {
        self.contexts.get_mut(id.0).ok_or(EmuError::InvalidContext(id))
    }

    /// Number of open contexts.
    pub const fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Returns `true` if no context is open.
    pub const fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Handles of every open context.
    pub fn ids(&self) -> Vec<ContextId> {
        self.contexts.iter().map(|(h, _)| ContextId(h)).collect()
    }
}
