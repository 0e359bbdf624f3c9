//! Image loading.
//!
//! Places a flat code or data image into guest memory: the region is mapped
//! page-rounded at the load address and filled regardless of its permissions,
//! so read-execute code regions can be populated directly.

use tracing::debug;

use crate::common::{MemoryError, Result};
use crate::core::Emulator;
use crate::memory::{Perms, RegionId};

/// Maps a region at `base` large enough for `image` and copies the image in.
///
/// The region length is `image.len()` rounded up to the page size; bytes past
/// the image are zero.
///
/// # Errors
///
/// `InvalidLength` for an empty image, or any error of
/// [`Emulator::mem_map`].
pub fn load_image(emu: &mut Emulator, base: u64, image: &[u8], perms: Perms) -> Result<RegionId> {
    if image.is_empty() {
        return Err(MemoryError::InvalidLength(0).into());
    }
    let page = emu.page_size();
    let len = (image.len() as u64)
        .checked_next_multiple_of(page)
        .ok_or(MemoryError::InvalidLength(image.len() as u64))?;
    let id = emu.mem_map(base, len, perms)?;
    emu.mem_load(base, image)?;
    debug!(%id, "loaded {} bytes at {base:#x}", image.len());
    Ok(id)
}
