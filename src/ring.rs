// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Ring mechanics: the shared wire layout and the doubled-range cursor
// arithmetic that tells a full ring from an empty one without a counter.
//
// Both cursors run modulo 2 * ring_size while slots are addressed modulo
// ring_size, so `write == read` can only mean empty and
// `write == read ^ ring_size` can only mean full (ring_size is a power of
// two). The top bit of each cursor word is not part of the cursor: it is
// the close-event flag of the channel layer, and either endpoint may set
// it while the cursor's owner is advancing the low bits. Every cursor
// update therefore goes through an atomic read-modify-write that preserves
// the flag, and publishes slot bytes with release ordering.

use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{LinkError, Result};
use crate::region::RingMem;

/// Zero-initialised padding words between the control words and the slots.
pub const RESERVED_WORDS: usize = 4;

/// Low 31 bits of a cursor word: the cursor itself.
pub(crate) const CURSOR_MASK: u32 = 0x7fff_ffff;
/// Top bit of a cursor word: the close-event flag.
pub(crate) const EVENT_BIT: u32 = 0x8000_0000;

/// Low 30 bits of the geometry word: slot count.
pub(crate) const SLOTS_MASK: u32 = 0x3fff_ffff;
/// Bit 30 of the geometry word: overwrite-on-full policy.
pub(crate) const NEVER_FULL_BIT: u32 = 0x4000_0000;

const TAG_TYPE_SHIFT: u32 = 8;
const TAG_ENTRY_SHIFT: u32 = 16;

/// Ring metadata as it appears at the start of the shared window.
///
/// Word packing (host byte order):
///   word0  write cursor (31 bits) + write-event flag (top bit)
///   word1  read cursor (31 bits) + read-event flag (top bit)
///   word2  slot count (30 bits) + never-full flag (bit 30)
///   word3  pid (bits 0..8) + entry type (8..16) + entry size (16..32)
/// followed by [`RESERVED_WORDS`] zeroed words, then `ring_size *
/// entry_size` slot bytes.
#[repr(C)]
struct RingHdr {
    wr: AtomicU32,
    rd: AtomicU32,
    geo: AtomicU32,
    tag: AtomicU32,
    reserved: [AtomicU32; RESERVED_WORDS],
}

/// Byte offset of the first slot inside a ring window.
pub const HDR_BYTES: usize = std::mem::size_of::<RingHdr>();

const _: () = assert!(HDR_BYTES == 32);

pub(crate) fn pack_geo(slots: u32, never_full: bool) -> u32 {
    (slots & SLOTS_MASK) | if never_full { NEVER_FULL_BIT } else { 0 }
}

pub(crate) fn pack_tag(pid: u8, entry_type: u8, entry_size: u16) -> u32 {
    pid as u32 | ((entry_type as u32) << TAG_TYPE_SHIFT) | ((entry_size as u32) << TAG_ENTRY_SHIFT)
}

/// Geometry of one ring: slot count and slot size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingSpec {
    /// Number of slots; must be a power of two representable in the 30-bit
    /// geometry field. Zero is accepted and yields a ring that stores
    /// nothing.
    pub ring_size: u32,
    /// Slot size in bytes; must be a positive multiple of 8.
    pub entry_size: u16,
}

impl RingSpec {
    pub const fn new(ring_size: u32, entry_size: u16) -> RingSpec {
        RingSpec {
            ring_size,
            entry_size,
        }
    }

    /// Bytes of shared memory one ring of this geometry occupies.
    pub const fn region_bytes(&self) -> usize {
        HDR_BYTES + self.ring_size as usize * self.entry_size as usize
    }

    /// Reject geometry the wire format cannot carry.
    pub(crate) fn validate(&self) -> Result<()> {
        // Zero also passes the power-of-two test, which is fine.
        if self.ring_size & self.ring_size.wrapping_sub(1) != 0 {
            return Err(LinkError::InvalidConfig("ring size not a power of two"));
        }
        if self.ring_size > SLOTS_MASK {
            return Err(LinkError::InvalidConfig("ring size exceeds the 30-bit field"));
        }
        if self.entry_size == 0 || self.entry_size % 8 != 0 {
            return Err(LinkError::InvalidConfig(
                "entry size not a positive multiple of 8",
            ));
        }
        Ok(())
    }
}

/// One endpoint's view of a ring living in shared memory.
///
/// The geometry is validated once at [`Ring::init`] / [`Ring::attach`] and
/// cached in the view, so the hot path never re-derives it from words the
/// peer could scribble on. The shared words stay authoritative for
/// attachment-time validation.
#[derive(Debug)]
pub struct Ring {
    hdr: NonNull<RingHdr>,
    slots: u32,
    entry: u16,
}

// SAFETY: all shared-word access goes through atomics; slot bytes are
// written only by the single producer before the cursor advance publishes
// them.
unsafe impl Send for Ring {}

impl Ring {
    /// Author the ring metadata in `mem`: zero cursors and reserved words,
    /// record geometry, identity, and policy. Upstream side only.
    pub fn init(
        mem: &RingMem,
        spec: RingSpec,
        entry_type: u8,
        pid: u8,
        never_full: bool,
    ) -> Result<Ring> {
        Self::precheck(mem, spec)?;
        let ring = Ring {
            hdr: hdr_ptr(mem),
            slots: spec.ring_size,
            entry: spec.entry_size,
        };
        let h = ring.hdr();
        h.wr.store(0, Ordering::Relaxed);
        h.rd.store(0, Ordering::Relaxed);
        h.geo.store(pack_geo(spec.ring_size, never_full), Ordering::Relaxed);
        h.tag
            .store(pack_tag(pid, entry_type, spec.entry_size), Ordering::Release);
        for w in &h.reserved {
            w.store(0, Ordering::Relaxed);
        }
        Ok(ring)
    }

    /// Validate geometry and window size without touching the window, so a
    /// multi-ring creation can fail before any metadata is written.
    pub(crate) fn precheck(mem: &RingMem, spec: RingSpec) -> Result<()> {
        spec.validate()?;
        if mem.len() < spec.region_bytes() {
            return Err(LinkError::InvalidConfig("region smaller than ring geometry"));
        }
        Ok(())
    }

    /// Adopt metadata the upstream side already wrote. Downstream side;
    /// writes nothing, and re-runs the geometry checks on the authored
    /// words since the region is not trusted to be well-formed.
    pub fn attach(mem: &RingMem) -> Result<Ring> {
        if mem.len() < HDR_BYTES {
            return Err(LinkError::ProtocolMismatch("region smaller than ring metadata"));
        }
        let hdr = hdr_ptr(mem);
        let (geo, tag) = {
            let h = unsafe { hdr.as_ref() };
            (h.geo.load(Ordering::Acquire), h.tag.load(Ordering::Acquire))
        };
        let spec = RingSpec {
            ring_size: geo & SLOTS_MASK,
            entry_size: (tag >> TAG_ENTRY_SHIFT) as u16,
        };
        if spec.validate().is_err() {
            return Err(LinkError::ProtocolMismatch("authored geometry is not valid"));
        }
        if mem.len() < spec.region_bytes() {
            return Err(LinkError::ProtocolMismatch(
                "region smaller than authored geometry",
            ));
        }
        Ok(Ring {
            hdr,
            slots: spec.ring_size,
            entry: spec.entry_size,
        })
    }

    fn hdr(&self) -> &RingHdr {
        unsafe { self.hdr.as_ref() }
    }

    // --- Geometry and identity ---

    pub fn slot_count(&self) -> u32 {
        self.slots
    }

    pub fn entry_size(&self) -> u16 {
        self.entry
    }

    pub fn never_full(&self) -> bool {
        self.hdr().geo.load(Ordering::Relaxed) & NEVER_FULL_BIT != 0
    }

    pub fn entry_type(&self) -> u8 {
        (self.hdr().tag.load(Ordering::Relaxed) >> TAG_TYPE_SHIFT) as u8
    }

    pub fn pid(&self) -> u8 {
        self.hdr().tag.load(Ordering::Relaxed) as u8
    }

    // --- Cursors and counts ---

    pub fn write_cursor(&self) -> u32 {
        self.hdr().wr.load(Ordering::Acquire) & CURSOR_MASK
    }

    pub fn read_cursor(&self) -> u32 {
        self.hdr().rd.load(Ordering::Acquire) & CURSOR_MASK
    }

    /// Successor of `cursor` in the doubled index space.
    pub fn next_index(&self, cursor: u32) -> u32 {
        if self.slots == 0 {
            return 0;
        }
        (cursor + 1) % (2 * self.slots)
    }

    /// Messages written but not yet consumed.
    pub fn unread_count(&self) -> u32 {
        let span = 2 * self.slots;
        if span == 0 {
            return 0;
        }
        span.wrapping_add(self.write_cursor())
            .wrapping_sub(self.read_cursor())
            % span
    }

    /// Consumed entries this endpoint produced but has not yet reported
    /// complete. `ack_index` is the producer-local completion cursor.
    pub fn unacked_count(&self, ack_index: u32) -> u32 {
        let span = 2 * self.slots;
        if span == 0 {
            return 0;
        }
        span.wrapping_add(self.read_cursor()).wrapping_sub(ack_index) % span
    }

    pub fn is_empty(&self) -> bool {
        self.write_cursor() == self.read_cursor()
    }

    pub fn is_full(&self) -> bool {
        (self.write_cursor() ^ self.slots) == self.read_cursor()
    }

    // --- Slot access ---

    fn slot_base(&self) -> *mut u8 {
        unsafe { (self.hdr.as_ptr() as *mut u8).add(HDR_BYTES) }
    }

    /// The full slot addressed by `cursor` (real index = cursor mod slot
    /// count). The slice is only stable until the producer laps the ring.
    pub(crate) fn slot_bytes(&self, cursor: u32) -> Result<&[u8]> {
        if self.slots == 0 {
            return Err(LinkError::NotFound);
        }
        let real = (cursor % self.slots) as usize;
        let ptr = unsafe { self.slot_base().add(real * self.entry as usize) };
        Ok(unsafe { std::slice::from_raw_parts(ptr, self.entry as usize) })
    }

    /// Copy `data` to the front of the slot addressed by `cursor`. The
    /// caller has already checked `data` against the slot size.
    pub(crate) fn fill_slot(&self, cursor: u32, data: &[u8]) -> Result<()> {
        if self.slots == 0 {
            return Err(LinkError::NotFound);
        }
        let real = (cursor % self.slots) as usize;
        let ptr = unsafe { self.slot_base().add(real * self.entry as usize) };
        unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), ptr, data.len()) };
        Ok(())
    }

    // --- Cursor advancement ---
    //
    // fetch_update instead of a plain store: the peer may be setting the
    // co-located event flag at the same moment, and a blind store of the
    // new cursor would erase it. Release ordering on success publishes the
    // slot bytes written before the advance.

    pub(crate) fn advance_write(&self) {
        let _ = self
            .hdr()
            .wr
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |w| {
                Some((w & EVENT_BIT) | self.next_index(w & CURSOR_MASK))
            });
    }

    pub(crate) fn advance_read(&self) {
        let _ = self
            .hdr()
            .rd
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |w| {
                Some((w & EVENT_BIT) | self.next_index(w & CURSOR_MASK))
            });
    }

    // --- Event flags ---

    pub fn write_event(&self) -> bool {
        self.hdr().wr.load(Ordering::Acquire) & EVENT_BIT != 0
    }

    pub fn read_event(&self) -> bool {
        self.hdr().rd.load(Ordering::Acquire) & EVENT_BIT != 0
    }

    pub(crate) fn set_write_event(&self) {
        self.hdr().wr.fetch_or(EVENT_BIT, Ordering::AcqRel);
    }

    pub(crate) fn set_read_event(&self) {
        self.hdr().rd.fetch_or(EVENT_BIT, Ordering::AcqRel);
    }

    pub(crate) fn clear_write_event(&self) {
        self.hdr().wr.fetch_and(!EVENT_BIT, Ordering::AcqRel);
    }

    pub(crate) fn clear_read_event(&self) {
        self.hdr().rd.fetch_and(!EVENT_BIT, Ordering::AcqRel);
    }
}

fn hdr_ptr(mem: &RingMem) -> NonNull<RingHdr> {
    // RingMem guarantees non-null and 32-bit alignment.
    unsafe { NonNull::new_unchecked(mem.as_ptr() as *mut RingHdr) }
}
