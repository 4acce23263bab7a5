// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// A channel pairs up to two rings with the endpoint-local state that never
// enters shared memory: role, overflow policy, completion cursor, close
// bookkeeping, and the registered handlers.
//
// Ring naming follows the direction of flow, not the local role: the
// downstream ring carries entries from the upstream endpoint to the
// downstream endpoint, the upstream ring the reverse. Which of the two an
// endpoint transmits on is fixed by its role, so each cursor keeps exactly
// one writer.
//
// Teardown rides on the event flags in the cursor words. The closing side
// sets the flag its peer watches; the peer's next poll runs its close
// handler, clears every flag it can still reach, and drops its ring views.
// The initiator sees its own flag come back cleared and finalises the same
// way. Both sides closing at once degenerates to each observing the
// other's flag, which tears down exactly once per endpoint.

use std::fmt;

use log::{debug, trace};

use crate::error::{LinkError, Result};
use crate::region::RingMem;
use crate::ring::{Ring, RingSpec};

/// Handler invoked with each received entry or completed transmission.
pub type MsgHandler = Box<dyn FnMut(&[u8]) + Send>;
/// Handler invoked when the peer closes the channel.
pub type EventHandler = Box<dyn FnMut() + Send>;

/// Which endpoint of the link this channel represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Authors the ring metadata at creation.
    Upstream,
    /// Attaches to metadata the upstream side already wrote.
    Downstream,
}

/// The two rings of a channel, named by flow direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Up,
    Down,
}

/// Identity and policy shared by both rings of a channel.
#[derive(Debug, Clone, Copy)]
pub struct ChannelConfig {
    /// Entry format tag; both ends must agree.
    pub entry_type: u8,
    /// Logical sub-channel id for links that multiplex several channels of
    /// the same type.
    pub pid: u8,
    /// Overwrite-on-full policy for the whole channel.
    pub never_full: bool,
}

/// Snapshot returned by the pending queries. Read-only; taking one never
/// advances a cursor or consumes an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pending {
    /// Entries waiting to be received, or transmissions waiting to be
    /// reported complete, depending on which end of the ring this endpoint
    /// holds.
    pub messages: u32,
    /// Whether the ring's event flag facing this endpoint is raised.
    pub event: bool,
}

/// One endpoint of a link: up to two rings plus local state.
pub struct Channel {
    upstream: Option<Ring>,
    downstream: Option<Ring>,
    role: Role,
    ignore_full: bool,
    send_ack_idx: u32,
    event_raised: bool,
    event_underway: bool,
    recv_cb: Option<MsgHandler>,
    send_compl_cb: Option<MsgHandler>,
    event_cb: Option<EventHandler>,
}

impl Channel {
    /// Create the channel and author each present ring's metadata.
    /// Upstream side only.
    ///
    /// Both geometries are checked before anything is written, so a failed
    /// creation leaves the regions untouched.
    pub fn create_upstream(
        ring_up: Option<RingMem>,
        up_spec: RingSpec,
        ring_down: Option<RingMem>,
        down_spec: RingSpec,
        cfg: ChannelConfig,
    ) -> Result<Channel> {
        if ring_up.is_none() && ring_down.is_none() {
            return Err(LinkError::InvalidConfig("channel needs at least one ring"));
        }
        if up_spec.ring_size == 0 && down_spec.ring_size == 0 {
            return Err(LinkError::InvalidConfig("both rings have zero slots"));
        }
        if let Some(mem) = &ring_up {
            Ring::precheck(mem, up_spec)?;
        }
        if let Some(mem) = &ring_down {
            Ring::precheck(mem, down_spec)?;
        }
        let upstream = match &ring_up {
            Some(mem) => Some(Ring::init(mem, up_spec, cfg.entry_type, cfg.pid, cfg.never_full)?),
            None => None,
        };
        let downstream = match &ring_down {
            Some(mem) => Some(Ring::init(
                mem,
                down_spec,
                cfg.entry_type,
                cfg.pid,
                cfg.never_full,
            )?),
            None => None,
        };
        debug!(
            "created upstream channel: type={} pid={} never_full={}",
            cfg.entry_type, cfg.pid, cfg.never_full
        );
        Ok(Channel {
            upstream,
            downstream,
            role: Role::Upstream,
            ignore_full: cfg.never_full,
            send_ack_idx: 0,
            event_raised: false,
            event_underway: false,
            recv_cb: None,
            send_compl_cb: None,
            event_cb: None,
        })
    }

    /// Attach to a link whose metadata the upstream side already wrote.
    /// Downstream side only; validates the authored words against the same
    /// parameters the creator was given and writes nothing.
    pub fn attach_downstream(
        ring_up: Option<RingMem>,
        up_spec: RingSpec,
        ring_down: Option<RingMem>,
        down_spec: RingSpec,
        cfg: ChannelConfig,
    ) -> Result<Channel> {
        if ring_up.is_none() && ring_down.is_none() {
            return Err(LinkError::InvalidConfig("channel needs at least one ring"));
        }
        let upstream = match &ring_up {
            Some(mem) => Some(Self::attach_ring(mem, up_spec, &cfg)?),
            None => None,
        };
        let downstream = match &ring_down {
            Some(mem) => Some(Self::attach_ring(mem, down_spec, &cfg)?),
            None => None,
        };
        // The overwrite policy is whatever the creator recorded on the
        // ring this endpoint transmits on.
        let ignore_full = upstream
            .as_ref()
            .or(downstream.as_ref())
            .map(Ring::never_full)
            .unwrap_or(false);
        debug!(
            "attached downstream channel: type={} pid={} never_full={}",
            cfg.entry_type, cfg.pid, ignore_full
        );
        Ok(Channel {
            upstream,
            downstream,
            role: Role::Downstream,
            ignore_full,
            send_ack_idx: 0,
            event_raised: false,
            event_underway: false,
            recv_cb: None,
            send_compl_cb: None,
            event_cb: None,
        })
    }

    fn attach_ring(mem: &RingMem, expect: RingSpec, cfg: &ChannelConfig) -> Result<Ring> {
        let ring = Ring::attach(mem)?;
        if ring.entry_type() != cfg.entry_type {
            return Err(LinkError::ProtocolMismatch("entry type differs"));
        }
        if ring.pid() != cfg.pid {
            return Err(LinkError::ProtocolMismatch("pid differs"));
        }
        if ring.slot_count() != expect.ring_size {
            return Err(LinkError::ProtocolMismatch("ring size differs"));
        }
        if ring.entry_size() != expect.entry_size {
            return Err(LinkError::ProtocolMismatch("entry size differs"));
        }
        Ok(ring)
    }

    // --- Accessors ---

    pub fn role(&self) -> Role {
        self.role
    }

    /// Whether the close handshake has run and detached both rings.
    pub fn is_closed(&self) -> bool {
        self.upstream.is_none() && self.downstream.is_none()
    }

    /// The channel's entry type tag, while any ring is still attached.
    pub fn entry_type(&self) -> Option<u8> {
        self.downstream
            .as_ref()
            .or(self.upstream.as_ref())
            .map(Ring::entry_type)
    }

    /// The channel's pid tag, while any ring is still attached.
    pub fn pid(&self) -> Option<u8> {
        self.downstream
            .as_ref()
            .or(self.upstream.as_ref())
            .map(Ring::pid)
    }

    pub fn upstream_ring_size(&self) -> u32 {
        self.upstream.as_ref().map(Ring::slot_count).unwrap_or(0)
    }

    pub fn downstream_ring_size(&self) -> u32 {
        self.downstream.as_ref().map(Ring::slot_count).unwrap_or(0)
    }

    pub fn upstream_entry_size(&self) -> u16 {
        self.upstream.as_ref().map(Ring::entry_size).unwrap_or(0)
    }

    pub fn downstream_entry_size(&self) -> u16 {
        self.downstream.as_ref().map(Ring::entry_size).unwrap_or(0)
    }

    fn ring(&self, side: Side) -> Option<&Ring> {
        match side {
            Side::Up => self.upstream.as_ref(),
            Side::Down => self.downstream.as_ref(),
        }
    }

    /// The ring this endpoint transmits on.
    fn transmit_ring(&self) -> Option<&Ring> {
        match self.role {
            Role::Upstream => self.downstream.as_ref(),
            Role::Downstream => self.upstream.as_ref(),
        }
    }

    /// The ring this endpoint consumes from.
    fn receive_ring(&self) -> Option<&Ring> {
        match self.role {
            Role::Upstream => self.upstream.as_ref(),
            Role::Downstream => self.downstream.as_ref(),
        }
    }

    fn consumes(&self, side: Side) -> bool {
        matches!(
            (side, self.role),
            (Side::Up, Role::Upstream) | (Side::Down, Role::Downstream)
        )
    }

    // --- Handler registration ---

    /// Register the handler for entries arriving on the receive ring. The
    /// slice covers the full slot.
    pub fn on_receive<F>(&mut self, f: F)
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        self.recv_cb = Some(Box::new(f));
    }

    /// Register the handler for transmissions the peer has consumed. The
    /// entry is still physically present when the handler runs; completion
    /// only moves a cursor.
    pub fn on_send_complete<F>(&mut self, f: F)
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        self.send_compl_cb = Some(Box::new(f));
    }

    /// Register the handler invoked when the peer closes the channel.
    pub fn on_close<F>(&mut self, f: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.event_cb = Some(Box::new(f));
    }

    // --- Send ---

    /// Copy `msg` into the next transmit slot and publish it.
    ///
    /// [`LinkError::WouldBlock`] is retryable: the peer has not consumed
    /// enough entries yet. Everything else is a caller error.
    pub fn send(&mut self, msg: &[u8]) -> Result<()> {
        let ring = self.transmit_ring().ok_or(LinkError::NoTransmitRing)?;
        if !self.ignore_full && ring.is_full() {
            trace!("send on full ring rejected (pid={})", ring.pid());
            return Err(LinkError::WouldBlock);
        }
        let max = ring.entry_size() as usize;
        if msg.len() > max || msg.len() % 8 != 0 {
            return Err(LinkError::InvalidSize {
                size: msg.len(),
                max,
            });
        }
        if ring.slot_count() == 0 {
            // A zero-slot ring stores nothing, never-full mode included.
            return Err(LinkError::WouldBlock);
        }
        ring.fill_slot(ring.write_cursor(), msg)?;
        ring.advance_write();
        Ok(())
    }

    // --- Poll entry points ---

    /// Service the upstream ring once: a pending close event takes
    /// priority; otherwise one received entry (upstream role) or one send
    /// completion (downstream role). At most one entry of work per call,
    /// so a scan loop stays fair across channels.
    pub fn poll_upstream(&mut self) -> Result<()> {
        self.poll_side(Side::Up)
    }

    /// Mirror of [`Channel::poll_upstream`] for the downstream ring.
    pub fn poll_downstream(&mut self) -> Result<()> {
        self.poll_side(Side::Down)
    }

    /// Service whatever the channel has: the close handshake first, then
    /// at most one entry per present ring. A fully closed channel is a
    /// no-op; the scan loop driving many channels belongs to the caller.
    pub fn poll(&mut self) -> Result<()> {
        if self.upstream.is_some() {
            self.poll_side(Side::Up)?;
        }
        if self.downstream.is_some() {
            self.poll_side(Side::Down)?;
        }
        Ok(())
    }

    fn poll_side(&mut self, side: Side) -> Result<()> {
        let consuming = self.consumes(side);
        if self.ring(side).is_none() {
            return Err(if consuming {
                LinkError::NoReceiveRing
            } else {
                LinkError::NoTransmitRing
            });
        }
        if self.event_pending() {
            return self.handle_close_event();
        }
        let ring = match side {
            Side::Up => self.upstream.as_ref(),
            Side::Down => self.downstream.as_ref(),
        };
        let Some(ring) = ring else {
            return Err(LinkError::NotFound);
        };
        if consuming {
            if ring.is_empty() {
                return Ok(());
            }
            let entry = ring.slot_bytes(ring.read_cursor())?;
            if let Some(cb) = self.recv_cb.as_mut() {
                cb(entry);
            }
            ring.advance_read();
        } else {
            // Completion follows the peer's read cursor: an entry is done
            // once consumed, not once written.
            if self.ignore_full || ring.unacked_count(self.send_ack_idx) == 0 {
                return Ok(());
            }
            let entry = ring.slot_bytes(self.send_ack_idx)?;
            if let Some(cb) = self.send_compl_cb.as_mut() {
                cb(entry);
            }
            self.send_ack_idx = ring.next_index(self.send_ack_idx);
        }
        Ok(())
    }

    // --- Pending queries ---

    /// Unread or unacknowledged entry count and event flag for the
    /// upstream ring.
    pub fn pending_upstream(&self) -> Pending {
        self.pending_side(Side::Up)
    }

    /// Mirror of [`Channel::pending_upstream`] for the downstream ring.
    pub fn pending_downstream(&self) -> Pending {
        self.pending_side(Side::Down)
    }

    fn pending_side(&self, side: Side) -> Pending {
        let Some(ring) = self.ring(side) else {
            return Pending::default();
        };
        if self.consumes(side) {
            Pending {
                messages: ring.unread_count(),
                event: ring.write_event(),
            }
        } else {
            Pending {
                messages: ring.unacked_count(self.send_ack_idx),
                event: ring.read_event(),
            }
        }
    }

    // --- Close handshake ---

    /// Ask the peer to tear the link down. Cooperative: the peer reacts on
    /// its next poll, and this endpoint finalises on a later poll of its
    /// own. Idempotent, and a no-op once the channel is closed.
    pub fn close(&mut self) {
        self.event_raised = true;
        self.set_event_bit();
        debug!("close requested (role={:?})", self.role);
    }

    /// Whether a close event is waiting for the next poll to handle it.
    pub fn event_pending(&self) -> bool {
        if self.event_underway {
            return false;
        }
        if self.event_raised && self.raised_event_acknowledged() {
            return true;
        }
        self.peer_event_raised()
    }

    /// Set the close flag the peer watches: the write-event flag of the
    /// transmit ring, or the read-event flag of the receive ring on a
    /// half-duplex link without one.
    fn set_event_bit(&self) {
        if let Some(ring) = self.transmit_ring() {
            ring.set_write_event();
        } else if let Some(ring) = self.receive_ring() {
            ring.set_read_event();
        }
    }

    /// Whether the flag set by [`Channel::close`] has come back cleared,
    /// meaning the peer observed it and tore down its end.
    fn raised_event_acknowledged(&self) -> bool {
        if let Some(ring) = self.transmit_ring() {
            !ring.write_event()
        } else if let Some(ring) = self.receive_ring() {
            !ring.read_event()
        } else {
            true
        }
    }

    /// Whether the peer has raised its close flag: the mirror image of
    /// [`Channel::set_event_bit`], seen from this side.
    fn peer_event_raised(&self) -> bool {
        if let Some(ring) = self.receive_ring() {
            ring.write_event()
        } else if let Some(ring) = self.transmit_ring() {
            ring.read_event()
        } else {
            false
        }
    }

    fn handle_close_event(&mut self) -> Result<()> {
        self.event_underway = true;
        // The initiator already knows; only a peer-initiated close is
        // surfaced through the handler.
        if !self.event_raised {
            if let Some(cb) = self.event_cb.as_mut() {
                cb();
            }
        }
        self.clear_event_bits();
        self.upstream = None;
        self.downstream = None;
        debug!("channel closed (role={:?})", self.role);
        Ok(())
    }

    /// Retire every close flag still reachable, so the initiator's next
    /// poll observes its own flag cleared.
    fn clear_event_bits(&self) {
        for ring in [self.upstream.as_ref(), self.downstream.as_ref()]
            .into_iter()
            .flatten()
        {
            ring.clear_write_event();
            ring.clear_read_event();
        }
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("role", &self.role)
            .field("upstream", &self.upstream.is_some())
            .field("downstream", &self.downstream.is_some())
            .field("ignore_full", &self.ignore_full)
            .field("send_ack_idx", &self.send_ack_idx)
            .field("event_raised", &self.event_raised)
            .field("event_underway", &self.event_underway)
            .finish()
    }
}
