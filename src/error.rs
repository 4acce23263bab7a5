// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Error type shared by the ring and channel layers. The OS-facing shm
// provider keeps `std::io::Error`; everything protocol-level lands here.

use thiserror::Error;

/// Errors returned by ring and channel operations.
///
/// [`LinkError::WouldBlock`] is the only retryable kind: the transmit ring
/// is full and the caller should try again once the peer has consumed
/// entries. Callers should not log it as an error.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Ring geometry rejected at creation time.
    #[error("invalid ring configuration: {0}")]
    InvalidConfig(&'static str),

    /// Metadata authored by the upstream side does not match what this
    /// endpoint expected.
    #[error("ring metadata mismatch: {0}")]
    ProtocolMismatch(&'static str),

    /// The operation needs a transmit ring the channel does not have.
    #[error("channel has no transmit ring")]
    NoTransmitRing,

    /// The operation needs a receive ring the channel does not have.
    #[error("channel has no receive ring")]
    NoReceiveRing,

    /// The transmit ring is full and overwriting is not permitted.
    #[error("ring full, retry later")]
    WouldBlock,

    /// Message does not fit the slot or is not a multiple of 8 bytes.
    #[error("message size {size} invalid for slot size {max}")]
    InvalidSize { size: usize, max: usize },

    /// Internal addressing failure; not reachable through the public API.
    #[error("ring entry not addressable")]
    NotFound,
}

impl LinkError {
    /// Whether the caller should simply retry later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LinkError::WouldBlock)
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;
