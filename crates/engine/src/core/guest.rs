//! Guest view handed to backends during execution.
//!
//! Every data access a backend performs goes through here, so the region
//! table's permission checks, the invalid-memory retry protocol, memory-access
//! hooks, and decode-cache invalidation apply uniformly to all architectures.

use crate::common::{AccessType, FaultKind, MemAccess};
use crate::core::Emulator;
use crate::core::regs::RegId;
use crate::isa::{ExecFault, Guest, MemoryAccessor};

/// Widest access a backend may request.
const MAX_ACCESS: usize = 8;

/// Mutable borrow of an emulator presented as a [`Guest`].
pub(crate) struct GuestView<'a> {
    emu: &'a mut Emulator,
}

impl<'a> GuestView<'a> {
    pub(crate) fn new(emu: &'a mut Emulator) -> Self {
        Self { emu }
    }

    fn read_bytes(&self, addr: u64, size: usize, access: AccessType) -> Result<u64, ExecFault> {
        let mut buf = [0u8; MAX_ACCESS];
        let bytes = &mut buf[..size];
        self.emu.memory.read_into(addr, bytes).map_err(|_| ExecFault {
            kind: FaultKind::Unmapped(access),
            address: addr,
        })?;
        Ok(self.emu.endian.read(bytes))
    }
}

impl MemoryAccessor for GuestView<'_> {
    fn load(&mut self, addr: u64, size: usize) -> Result<u64, ExecFault> {
        let size = size.min(MAX_ACCESS);
        self.emu.guest_access(addr, size, AccessType::Read, 0)?;
        let value = self.read_bytes(addr, size, AccessType::Read)?;
        self.emu.fire_mem(&MemAccess {
            kind: AccessType::Read,
            address: addr,
            size,
            value,
        });
        Ok(value)
    }

    fn store(&mut self, addr: u64, size: usize, value: u64) -> Result<(), ExecFault> {
        let size = size.min(MAX_ACCESS);
        self.emu.guest_access(addr, size, AccessType::Write, value)?;
        self.emu.fire_mem(&MemAccess {
            kind: AccessType::Write,
            address: addr,
            size,
            value,
        });

        // A hook may have unmapped or protected the target in the meantime.
        self.emu
            .memory
            .check_access(addr, size, AccessType::Write)
            .map_err(|(at, reason)| ExecFault {
                kind: reason.fault(AccessType::Write),
                address: at,
            })?;
        let bytes = self.emu.endian.write(value, size);
        self.emu.memory.load(addr, &bytes).map_err(|_| ExecFault {
            kind: FaultKind::Unmapped(AccessType::Write),
            address: addr,
        })?;
        if self.emu.memory.touches_executable(addr, size) {
            self.emu.invalidate_code(addr, size as u64);
        }
        Ok(())
    }
}

impl Guest for GuestView<'_> {
    fn reg(&self, id: RegId) -> u64 {
        self.emu.regs.get(id)
    }

    fn set_reg(&mut self, id: RegId, value: u64) {
        self.emu.regs.set(id, value);
    }
}
