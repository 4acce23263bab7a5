// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Lock-free shared-memory message rings between two endpoints that may sit
// on opposite sides of a hardware or privilege boundary. The upstream side
// of a link authors the ring metadata, the downstream side validates it;
// messages move with a single copy and no system calls, completion is
// tracked by watching the peer's cursor, and teardown is signalled through
// flag bits carried in the same words as the cursors.

mod error;
pub use error::{LinkError, Result};

mod region;
pub use region::{HeapRegion, RingMem};

mod ring;
pub use ring::{Ring, RingSpec, HDR_BYTES, RESERVED_WORDS};

mod msg;
pub use msg::{build_slot, MsgHeader, HEADER_BYTES};

mod channel;
pub use channel::{Channel, ChannelConfig, EventHandler, MsgHandler, Pending, Role};

mod platform;

mod shm;
pub use shm::ShmRegion;
