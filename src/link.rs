//! # Connection table
//!
//! Fixed table of the logical sockets multiplexed over the physical link.
//! Ids are only unique while a link is active; releasing a link resets its
//! counters and callback so the id can serve an unrelated future connection.
use crate::dispatch::CommandError;
use core::net::Ipv4Addr;
use fugit::TimerInstantU32;
use heapless::Vec;

/// Max. simultaneous links the firmware multiplexes
pub const MAX_LINKS: usize = 5;

/// Per-link data delivery callback.
///
/// Fires on arrival, not on logical-transfer completion: one declared frame
/// may be delivered in several calls when it exceeds the receive area, and
/// one burst may deliver several frames back to back. The handler reference
/// is the driver's event handler, serving as opaque user data.
pub type DataCallback<H> = fn(handler: &mut H, link_id: usize, data: &[u8]);

/// One logical socket
#[derive(Debug)]
pub struct Link<H, const TIMER_HZ: u32, const RX_SIZE: usize> {
    pub(crate) active: bool,

    /// True if this side opened the connection
    pub(crate) client: bool,

    /// Peer address, reported by the frame header while remote-info is on
    pub(crate) remote: Option<(Ipv4Addr, u16)>,

    /// Receive area for the frame currently being extracted
    pub(crate) rx: Vec<u8, RX_SIZE>,

    /// Lifetime byte counter, survives until the link is released
    pub(crate) total_received: u32,

    pub(crate) last_activity: Option<TimerInstantU32<TIMER_HZ>>,

    /// True while the current frame is the first one this link received
    pub(crate) first_packet: bool,

    /// True while a declared frame has not been fully extracted yet
    pub(crate) more_pending: bool,

    /// True between a send request and its resolution
    pub(crate) awaiting_prompt: bool,

    /// Value of a `Content-Length` header sniffed from the first packet
    pub(crate) content_length: Option<u32>,

    pub(crate) callback: Option<DataCallback<H>>,
}

impl<H, const TIMER_HZ: u32, const RX_SIZE: usize> Link<H, TIMER_HZ, RX_SIZE> {
    pub(crate) fn new() -> Self {
        Self {
            active: false,
            client: false,
            remote: None,
            rx: Vec::new(),
            total_received: 0,
            last_activity: None,
            first_packet: false,
            more_pending: false,
            awaiting_prompt: false,
            content_length: None,
            callback: None,
        }
    }

    /// Returns the link to its pristine state
    pub(crate) fn reset(&mut self) {
        self.active = false;
        self.client = false;
        self.remote = None;
        self.rx.clear();
        self.total_received = 0;
        self.last_activity = None;
        self.first_packet = false;
        self.more_pending = false;
        self.awaiting_prompt = false;
        self.content_length = None;
        self.callback = None;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_client(&self) -> bool {
        self.client
    }

    pub fn remote(&self) -> Option<(Ipv4Addr, u16)> {
        self.remote
    }

    pub fn total_received(&self) -> u32 {
        self.total_received
    }

    pub fn last_activity(&self) -> Option<TimerInstantU32<TIMER_HZ>> {
        self.last_activity
    }

    pub fn is_first_packet(&self) -> bool {
        self.first_packet
    }

    /// True while more bytes of the current frame are still arriving
    pub fn more_pending(&self) -> bool {
        self.more_pending
    }

    pub fn content_length(&self) -> Option<u32> {
        self.content_length
    }
}

/// Fixed-size table, array index = link id
pub(crate) struct LinkTable<H, const TIMER_HZ: u32, const RX_SIZE: usize> {
    links: [Link<H, TIMER_HZ, RX_SIZE>; MAX_LINKS],
}

impl<H, const TIMER_HZ: u32, const RX_SIZE: usize> LinkTable<H, TIMER_HZ, RX_SIZE> {
    pub(crate) fn new() -> Self {
        Self {
            links: core::array::from_fn(|_| Link::new()),
        }
    }

    /// Claims the given id for a fresh connection. Fails if the id is out of
    /// range or the slot still serves an active link.
    pub(crate) fn claim(
        &mut self,
        link_id: usize,
    ) -> Result<&mut Link<H, TIMER_HZ, RX_SIZE>, CommandError> {
        let link = self.links.get_mut(link_id).ok_or(CommandError::LinkNotValid)?;
        if link.active {
            return Err(CommandError::LinkNotValid);
        }

        link.reset();
        link.active = true;
        Ok(link)
    }

    /// Lowest id not serving an active link
    pub(crate) fn next_free(&self) -> Option<usize> {
        self.links.iter().position(|link| !link.active)
    }

    /// Releases the id. Releasing an inactive or out of range id is a no-op.
    pub(crate) fn release(&mut self, link_id: usize) {
        if let Some(link) = self.links.get_mut(link_id) {
            if link.active {
                link.reset();
            }
        }
    }

    pub(crate) fn release_all(&mut self) {
        for link in &mut self.links {
            if link.active {
                link.reset();
            }
        }
    }

    /// Clears per-link transfer progress after an aborted command
    pub(crate) fn clear_transfer_flags(&mut self) {
        for link in &mut self.links {
            link.awaiting_prompt = false;
            link.more_pending = false;
        }
    }

    /// Marks an id active for a peer-opened connection. Already active ids
    /// keep their state, the firmware repeats the notification at times.
    pub(crate) fn activate_incoming(&mut self, link_id: usize) {
        if let Some(link) = self.links.get_mut(link_id) {
            if !link.active {
                link.reset();
                link.active = true;
            }
        }
    }

    pub(crate) fn get(&self, link_id: usize) -> Result<&Link<H, TIMER_HZ, RX_SIZE>, CommandError> {
        self.links.get(link_id).ok_or(CommandError::LinkNotValid)
    }

    pub(crate) fn get_mut(
        &mut self,
        link_id: usize,
    ) -> Result<&mut Link<H, TIMER_HZ, RX_SIZE>, CommandError> {
        self.links.get_mut(link_id).ok_or(CommandError::LinkNotValid)
    }

    /// Target of a frame extraction, None routes the bytes to the discard path
    pub(crate) fn get_active_mut(&mut self, link_id: usize) -> Option<&mut Link<H, TIMER_HZ, RX_SIZE>> {
        self.links.get_mut(link_id).filter(|link| link.active)
    }
}
