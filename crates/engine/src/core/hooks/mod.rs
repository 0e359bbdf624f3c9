//! Hook Registry.
//!
//! This module stores the observers registered on an emulator. It provides:
//! 1. **Registration:** Validated insertion returning a generation-checked [`HookId`].
//! 2. **Matching:** Per-class, insertion-ordered selection by address filter and event mask.
//! 3. **Dispatch Safety:** Callbacks are checked out for the duration of a call and
//!    checked back in afterwards, so a callback may add or remove hooks (itself
//!    included) while it runs.
//!
//! A dispatch point first snapshots the ids of matching hooks, then calls each
//! one that is still registered when its turn comes. Hooks added during the
//! dispatch first fire at the next dispatch point; hooks removed during it are
//! skipped from then on.

/// Hook, filter, and callback definitions.
pub mod types;

use tracing::debug;

use crate::common::{Arena, HookError};
pub use types::{Callback, Hook, HookId, HookKind, HookRange, MemHookMask};

struct Entry {
    kind: HookKind,
    mask: MemHookMask,
    range: HookRange,
    /// `None` while the callback is checked out.
    callback: Option<Callback>,
}

/// Ordered collection of registered hooks.
#[derive(Default)]
pub struct HookRegistry {
    entries: Arena<Entry>,
    /// Live ids in insertion order.
    order: Vec<HookId>,
    counts: [usize; HookKind::COUNT],
}

impl HookRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered hooks.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if no hook is registered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns `true` if any hook of `kind` is registered.
    pub const fn has(&self, kind: HookKind) -> bool {
        self.counts[kind.slot()] != 0
    }

    /// Returns `true` if `id` names a registered hook.
    pub fn contains(&self, id: HookId) -> bool {
        self.entries.contains(id.0)
    }

    /// Registers a hook.
    ///
    /// # Errors
    ///
    /// `InvalidMask` if a memory hook's mask is empty or selects events its
    /// class cannot observe.
    pub fn add(&mut self, hook: Hook) -> Result<HookId, HookError> {
        let kind = hook.kind();
        let allowed = match kind {
            HookKind::Mem => MemHookMask::VALID,
            HookKind::InvalidMem => MemHookMask::INVALID,
            _ => MemHookMask::empty(),
        };
        if !allowed.is_empty() && (hook.mask.is_empty() || !allowed.contains(hook.mask)) {
            return Err(HookError::InvalidMask(hook.mask.bits()));
        }

        let id = HookId(self.entries.insert(Entry {
            kind,
            mask: hook.mask,
            range: hook.range,
            callback: Some(hook.callback),
        }));
        self.order.push(id);
        self.counts[kind.slot()] += 1;
        debug!(%id, %kind, begin = hook.range.begin, end = hook.range.end, "hook added");
        Ok(id)
    }

    /// Unregisters a hook.
    ///
    /// Safe to call from inside any callback, including the hook's own.
    ///
    /// # Errors
    ///
    /// `NotFound` if `id` was never issued or was already removed.
    pub fn remove(&mut self, id: HookId) -> Result<(), HookError> {
        let entry = self.entries.remove(id.0).ok_or(HookError::NotFound(id))?;
        self.order.retain(|h| *h != id);
        self.counts[entry.kind.slot()] -= 1;
        debug!(%id, kind = %entry.kind, "hook removed");
        Ok(())
    }

    /// Ids of hooks of `kind` whose filter contains `addr` and, for memory
    /// classes, whose mask intersects `events`, in insertion order.
    pub(crate) fn matching(&self, kind: HookKind, addr: u64, events: MemHookMask) -> Vec<HookId> {
        if !self.has(kind) {
            return Vec::new();
        }
        self.order
            .iter()
            .copied()
            .filter(|id| {
                self.entries.get(id.0).is_some_and(|e| {
                    e.kind == kind
                        && e.range.contains(addr)
                        && (events.is_empty() || e.mask.intersects(events))
                })
            })
            .collect()
    }

    /// Takes a callback out for invocation.
    ///
    /// Returns `None` if the hook was removed since the snapshot or is already
    /// checked out further up the stack.
    pub(crate) fn checkout(&mut self, id: HookId) -> Option<Callback> {
        self.entries.get_mut(id.0)?.callback.take()
    }

    /// Returns a checked-out callback. Dropped if the hook was removed meanwhile.
    pub(crate) fn checkin(&mut self, id: HookId, callback: Callback) {
        if let Some(entry) = self.entries.get_mut(id.0) {
            entry.callback = Some(callback);
        }
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hooks", &self.order.len())
            .field("counts", &self.counts)
            .finish()
    }
}
