// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Named cross-process region provider built on the platform shared-memory
// primitives. One `ShmRegion` holds one ring window; the creating process
// calls `create`, the joining one `open`, mirroring the channel layer's
// upstream/downstream split. Fresh regions arrive zero-filled from the
// kernel.

use std::io;

use crate::platform::PlatformShm;
use crate::region::RingMem;

/// A named shared memory region sized for one ring.
pub struct ShmRegion {
    inner: PlatformShm,
    mem: RingMem,
}

impl ShmRegion {
    /// Create a fresh named region of `len` bytes.
    pub fn create(name: &str, len: usize) -> io::Result<ShmRegion> {
        Self::wrap(PlatformShm::create(name, len)?)
    }

    /// Map an existing named region of `len` bytes.
    pub fn open(name: &str, len: usize) -> io::Result<ShmRegion> {
        Self::wrap(PlatformShm::open(name, len)?)
    }

    fn wrap(inner: PlatformShm) -> io::Result<ShmRegion> {
        // Mappings are page-aligned, so this only rejects a broken platform
        // layer.
        let mem = unsafe { RingMem::from_raw(inner.as_mut_ptr(), inner.size()) }
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(ShmRegion { inner, mem })
    }

    /// Borrow the region as a ring window. The region must outlive every
    /// ring built on the returned window.
    pub fn ring_mem(&self) -> RingMem {
        self.mem
    }

    pub fn len(&self) -> usize {
        self.inner.size()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.size() == 0
    }

    /// Remove the backing object; existing mappings stay valid.
    pub fn unlink(&self) {
        self.inner.unlink();
    }

    /// Remove a named region without an open handle.
    pub fn unlink_by_name(name: &str) {
        PlatformShm::unlink_by_name(name);
    }
}
