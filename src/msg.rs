// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The fixed 8-byte envelope applications lay over ring slots: a subtype
// tag for channels that carry several entry kinds, and an error word.

use crate::error::{LinkError, Result};

/// Bytes occupied by the envelope header at the front of a slot.
pub const HEADER_BYTES: usize = 8;

/// Message envelope header.
///
/// Wire form (host byte order): word0 = subtype (8 bits) + 24 reserved
/// bits; word1 = error code, zero meaning no error.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MsgHeader {
    pub subtype: u8,
    pub error_code: u32,
}

impl MsgHeader {
    pub const fn new(subtype: u8) -> MsgHeader {
        MsgHeader {
            subtype,
            error_code: 0,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error_code != 0
    }

    /// Encode into the first [`HEADER_BYTES`] of `buf`.
    pub fn encode_into(&self, buf: &mut [u8]) -> Result<()> {
        if buf.len() < HEADER_BYTES {
            return Err(LinkError::InvalidSize {
                size: buf.len(),
                max: HEADER_BYTES,
            });
        }
        buf[..4].copy_from_slice(&(self.subtype as u32).to_ne_bytes());
        buf[4..8].copy_from_slice(&self.error_code.to_ne_bytes());
        Ok(())
    }

    /// Decode from the first [`HEADER_BYTES`] of `buf`.
    pub fn decode(buf: &[u8]) -> Result<MsgHeader> {
        if buf.len() < HEADER_BYTES {
            return Err(LinkError::InvalidSize {
                size: buf.len(),
                max: HEADER_BYTES,
            });
        }
        let mut w0 = [0u8; 4];
        let mut w1 = [0u8; 4];
        w0.copy_from_slice(&buf[..4]);
        w1.copy_from_slice(&buf[4..8]);
        Ok(MsgHeader {
            subtype: u32::from_ne_bytes(w0) as u8,
            error_code: u32::from_ne_bytes(w1),
        })
    }

    /// Split a received slot into its header and payload bytes.
    pub fn split(slot: &[u8]) -> Result<(MsgHeader, &[u8])> {
        let hdr = Self::decode(slot)?;
        Ok((hdr, &slot[HEADER_BYTES..]))
    }
}

/// Build a full slot image: header, payload, zero padding up to
/// `entry_size`. Fails when header plus payload do not fit.
pub fn build_slot(hdr: &MsgHeader, payload: &[u8], entry_size: u16) -> Result<Vec<u8>> {
    let total = entry_size as usize;
    if HEADER_BYTES + payload.len() > total {
        return Err(LinkError::InvalidSize {
            size: HEADER_BYTES + payload.len(),
            max: total,
        });
    }
    let mut slot = vec![0u8; total];
    hdr.encode_into(&mut slot)?;
    slot[HEADER_BYTES..HEADER_BYTES + payload.len()].copy_from_slice(payload);
    Ok(slot)
}
