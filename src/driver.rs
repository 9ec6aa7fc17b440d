//! # Protocol engine
//!
//! [Driver] turns the interrupt-fed byte stream of an ESP8266 style WiFi
//! co-processor into commands, events and per-link data deliveries. One
//! instance is created per attached co-processor and owns the consumer half
//! of the [receive channel](crate::buffer::RxChannel).
//!
//! All logic runs on the single context calling [Driver::process] (directly
//! or through [Driver::poll]). There is no internal waiting: `poll` reports
//! `WouldBlock` until the active command resolves, so the caller decides
//! between busy-looping, yielding or blocking.
//!
//! ## Example
//!
//! ````
//! # use esp_at_driver::buffer::RxChannel;
//! # use esp_at_driver::driver::{Driver, EventHandler};
//! # use esp_at_driver::example::{ExampleSerial, ExampleTimer};
//! #
//! #[derive(Default)]
//! struct Events {
//!     got_ip: bool,
//! }
//!
//! impl EventHandler for Events {
//!     fn ip_assigned(&mut self) {
//!         self.got_ip = true;
//!     }
//! }
//!
//! let mut channel: RxChannel<256> = RxChannel::new();
//! // The producer half normally moves into the receive interrupt, the mock
//! // serial uses it for scripting the module replies instead.
//! let (from_isr, received) = channel.split();
//!
//! let mut driver: Driver<_, _, Events, 1_000_000, 256, 256, 64> = Driver::new(
//!     ExampleSerial::new(from_isr),
//!     ExampleTimer::default(),
//!     received,
//!     Events::default(),
//! );
//!
//! let state = driver.join("test_wifi", "secret").unwrap();
//! assert!(state.connected);
//! assert!(driver.handler().got_ip);
//! ````
use crate::buffer::RxConsumer;
use crate::commands::{Command, Verb, MAX_PAYLOAD_SIZE};
use crate::digest::{Digester, FrameCursor, Token};
use crate::dispatch::{classify, CommandError, CommandStatus, Reply, Slot};
use crate::link::{Link, LinkTable};
use crate::responses::{
    self, AccessPoint, AddressField, ConnectedStation, JoinedAccessPoint, SoftApConfig,
};
use crate::urc::{FrameHeader, Urc};
use crate::wifi::{FirmwareStep, JoinFailure, JoinState, WifiMode};
use embedded_io::Write;
use core::net::Ipv4Addr;
use fugit::{ExtU32, TimerDurationU32, TimerInstantU32};
use fugit_timer::Timer;
use heapless::{String, Vec};

/// Default command timeout in ms
pub const DEFAULT_TIMEOUT_MS: u32 = 30_000;

/// Baud rate the firmware ships with
pub const DEFAULT_BAUDRATE: u32 = 115_200;

/// Capacity of the scan result list, further access points are dropped
pub const MAX_ACCESS_POINTS: usize = 10;

/// Capacity of the connected station list
pub const MAX_STATIONS: usize = 10;

/// Device-level events. All methods default to no-ops, implementors pick the
/// ones they care about. `()` serves as the no-handler choice.
///
/// Handlers are called from inside [Driver::process] on the driver's own
/// context, never from interrupt context.
pub trait EventHandler {
    /// Boot banner observed, either after a reset command or unsolicited.
    /// Link and join state has been cleared by the time this fires, a
    /// rebooted module holds no connections.
    fn device_ready(&mut self) {}

    /// Module restarted itself after a watchdog reset
    fn watchdog_reset(&mut self) {}

    fn wifi_connected(&mut self) {}

    /// Connection to the access point lost. Every link has been released
    /// before this fires.
    fn wifi_disconnected(&mut self) {}

    fn ip_assigned(&mut self) {}

    /// Joining the access point failed with a categorized reason
    fn join_failed(&mut self, _failure: JoinFailure) {}

    /// Link opened, either by a connect command or by a peer of the server
    fn link_opened(&mut self, _link_id: usize) {}

    /// Link closed by the peer or by a close command
    fn link_closed(&mut self, _link_id: usize) {}

    /// Firmware download progress of an over-the-air update
    fn update_progress(&mut self, _step: FirmwareStep) {}
}

impl EventHandler for () {}

/// Addressing of one interface side, station or soft AP
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InterfaceAddresses {
    pub ip: Option<Ipv4Addr>,
    pub gateway: Option<Ipv4Addr>,
    pub netmask: Option<Ipv4Addr>,

    /// Hardware address in `aa:bb:cc:dd:ee:ff` notation
    pub mac: Option<String<17>>,
}

/// Protocol engine and device context of one co-processor
///
/// TIMER_HZ: Frequency of the timeout timer.
///
/// RX_CHANNEL: Capacity of the receive channel this driver consumes.
///
/// TX_SIZE: Chunk size in bytes when sending payload data. Higher values
/// mean fewer send handshakes. Values above 2046 are capped to the
/// firmware's per-cycle limit.
///
/// RX_SIZE: Per-link receive area. Frames larger than this are delivered
/// across multiple callback invocations.
pub struct Driver<
    'q,
    Tx: Write,
    T: Timer<TIMER_HZ>,
    H: EventHandler,
    const TIMER_HZ: u32,
    const RX_CHANNEL: usize,
    const TX_SIZE: usize,
    const RX_SIZE: usize,
> {
    /// Transmit half of the UART
    pub(crate) serial: Tx,

    /// Timer used for timeout measurement
    timer: T,

    /// Consumer half of the receive channel
    rx: RxConsumer<'q, RX_CHANNEL>,

    digester: Digester,

    /// In-progress binary frame extraction, None while tokenizing text
    frame: Option<FrameCursor>,

    slot: Slot,

    pub(crate) links: LinkTable<H, TIMER_HZ, RX_SIZE>,

    handler: H,

    /// Default timeout applied to commands without an override
    timeout: TimerDurationU32<TIMER_HZ>,

    /// Timeout of the active command
    active_timeout: TimerDurationU32<TIMER_HZ>,

    /// Refreshed by every tokenized line, prompt and finished frame
    last_received: Option<TimerInstantU32<TIMER_HZ>>,

    mode: Option<WifiMode>,

    /// Joined to an access point? Gets updated by unsolicited lines.
    joined: bool,

    /// True if the access point assigned an IP
    ip_assigned: bool,

    /// Categorized reason of the most recent join failure
    join_failure: Option<JoinFailure>,

    joined_ap: Option<JoinedAccessPoint>,

    station: InterfaceAddresses,

    soft_ap: InterfaceAddresses,

    soft_ap_config: Option<SoftApConfig>,

    access_points: Vec<AccessPoint, MAX_ACCESS_POINTS>,

    stations: Vec<ConnectedStation, MAX_STATIONS>,

    /// Round-trip time of the most recent ping in ms
    ping_time: Option<u32>,

    baudrate: u32,

    /// Payload bytes sent across all links
    total_sent: u32,

    /// Payload bytes received across all links
    total_received: u32,
}

impl<
        'q,
        Tx: Write,
        T: Timer<TIMER_HZ>,
        H: EventHandler,
        const TIMER_HZ: u32,
        const RX_CHANNEL: usize,
        const TX_SIZE: usize,
        const RX_SIZE: usize,
    > Driver<'q, Tx, T, H, TIMER_HZ, RX_CHANNEL, TX_SIZE, RX_SIZE>
{
    pub fn new(serial: Tx, timer: T, rx: RxConsumer<'q, RX_CHANNEL>, handler: H) -> Self {
        Self {
            serial,
            timer,
            rx,
            digester: Digester::new(),
            frame: None,
            slot: Slot::new(),
            links: LinkTable::new(),
            handler,
            timeout: DEFAULT_TIMEOUT_MS.millis(),
            active_timeout: DEFAULT_TIMEOUT_MS.millis(),
            last_received: None,
            mode: None,
            joined: false,
            ip_assigned: false,
            join_failure: None,
            joined_ap: None,
            station: InterfaceAddresses::default(),
            soft_ap: InterfaceAddresses::default(),
            soft_ap_config: None,
            access_points: Vec::new(),
            stations: Vec::new(),
            ping_time: None,
            baudrate: DEFAULT_BAUDRATE,
            total_sent: 0,
            total_received: 0,
        }
    }

    /// Drains the receive channel through the tokenizer, supervises the
    /// active command's deadline and fires callbacks. Must be called
    /// regularly; every other operation calls it internally.
    pub fn process(&mut self) {
        self.check_timeout();

        loop {
            if self.frame.is_some() {
                if self.pump_frame() {
                    continue;
                }
                break;
            }

            let Some(byte) = self.rx.pop() else {
                break;
            };

            // A baud change garbles the tail of its own reply, so the
            // confirmation is matched on the raw staging content instead
            // of a complete line.
            if byte == b'\r'
                && self.slot.verb() == Some(Verb::Uart)
                && self.digester.staged() == b"OK"
            {
                self.digester.clear();
                self.rx.drain();
                self.last_received = Some(self.timer.now());
                self.slot.resolve(Ok(()));
                continue;
            }

            let expect_prompt = matches!(self.slot.verb(), Some(Verb::SendRequest { .. }));
            match self.digester.push(byte, expect_prompt) {
                Some(Token::Line(line)) => {
                    self.last_received = Some(self.timer.now());
                    self.handle_line(&line);
                }
                Some(Token::Prompt) => {
                    self.last_received = Some(self.timer.now());
                    self.slot.wait_prompt();
                }
                Some(Token::Frame(header)) => {
                    self.last_received = Some(self.timer.now());
                    self.start_frame(&header);
                }
                None => {}
            }
        }
    }

    /// Processes pending input and reports the active command's state.
    ///
    /// Returns `Ok` once the command resolved successfully or when no
    /// command is in flight, the command's error on failure and
    /// `WouldBlock` while resolution is outstanding.
    pub fn poll(&mut self) -> nb::Result<(), CommandError> {
        self.process();

        if let Some(result) = self.slot.take_result() {
            return result.map_err(nb::Error::Other);
        }

        if self.slot.is_idle() {
            return Ok(());
        }

        Err(nb::Error::WouldBlock)
    }

    /// Transmits a command and claims the slot.
    ///
    /// Fails with [CommandError::Busy] if the previous command has not
    /// resolved yet; pending input is processed once in that case so a
    /// stalled caller still makes progress.
    pub(crate) fn issue(&mut self, command: Command) -> Result<(), CommandError> {
        // Consumes stray input first, e.g. a trailing reply of the
        // previous command that arrived after its resolution
        self.process();

        if !self.slot.is_idle() {
            return Err(CommandError::Busy);
        }

        if command.verb() == Verb::Uart {
            // Stale input would be matched against the garbled reply
            self.rx.drain();
            self.digester.clear();
        }

        match command.verb() {
            Verb::Scan => self.access_points.clear(),
            Verb::Stations => self.stations.clear(),
            Verb::Ping => self.ping_time = None,
            Verb::Join => self.join_failure = None,
            Verb::JoinQuery => self.joined_ap = None,
            Verb::ApConfigQuery => self.soft_ap_config = None,
            _ => {}
        }

        self.serial
            .write_all(command.text())
            .map_err(|_| CommandError::Failed)?;
        self.serial.flush().map_err(|_| CommandError::Failed)?;

        self.active_timeout = match command.timeout_ms() {
            Some(ms) => ms.millis(),
            None => self.timeout,
        };
        self.slot.issue(command.verb());
        self.last_received = Some(self.timer.now());
        Ok(())
    }

    /// Issues a command and busy-polls it to resolution
    pub(crate) fn run(&mut self, command: Command) -> Result<(), CommandError> {
        self.issue(command)?;
        nb::block!(self.poll())
    }

    /// Writes the payload bytes of the raw-send handshake.
    ///
    /// Only valid while [CommandStatus::PromptReady] is reported. The
    /// firmware's cycle terminator is appended and the command then awaits
    /// its `SEND OK`/`SEND FAIL` resolution.
    pub fn send_payload(&mut self, data: &[u8]) -> Result<(), CommandError> {
        let Some(Verb::SendRequest { link_id }) = self.slot.verb() else {
            return Err(CommandError::Failed);
        };
        if !self.slot.is_waiting_prompt() {
            return Err(CommandError::Failed);
        }
        if data.len() > TX_SIZE.min(MAX_PAYLOAD_SIZE) {
            return Err(CommandError::OutOfMemory);
        }

        self.serial.write_all(data).map_err(|_| CommandError::Failed)?;
        // Literal backslash zero ends the cycle early
        self.serial.write_all(b"\\0").map_err(|_| CommandError::Failed)?;
        self.serial.flush().map_err(|_| CommandError::Failed)?;

        self.total_sent = self.total_sent.wrapping_add(data.len() as u32);
        self.last_received = Some(self.timer.now());
        self.slot.payload_sent(Verb::SendPayload { link_id });
        Ok(())
    }

    /// Abandons the active command and all tokenizer state without waiting
    /// for the timeout.
    ///
    /// Escape hatch only: the co-processor may still deliver a stale reply
    /// afterwards, which would be matched against whatever command is issued
    /// next. Draining the receive channel after the co-processor went quiet,
    /// or following up with a reset, avoids the misattribution. A frame
    /// extraction in progress is dropped as well, so link byte counters may
    /// overstate until the link is released.
    pub fn abort(&mut self) {
        self.slot.reset();
        self.digester.clear();
        self.frame = None;
        self.links.clear_transfer_flags();
    }

    fn check_timeout(&mut self) {
        if !self.slot.is_active() {
            return;
        }
        let Some(last) = self.last_received else {
            return;
        };

        let stale = self
            .timer
            .now()
            .checked_duration_since(last)
            .map_or(false, |elapsed| elapsed > self.active_timeout);
        if !stale {
            return;
        }

        match self.slot.verb() {
            // A half-claimed link must not leak
            Some(Verb::Connect { link_id }) => self.links.release(link_id),
            Some(Verb::SendRequest { link_id }) | Some(Verb::SendPayload { link_id }) => {
                if let Ok(link) = self.links.get_mut(link_id) {
                    link.awaiting_prompt = false;
                }
            }
            _ => {}
        }

        self.slot.resolve(Err(CommandError::Timeout));
    }

    fn handle_line(&mut self, line: &[u8]) {
        if let Some(urc) = Urc::parse(line) {
            self.handle_urc(urc);
            return;
        }

        match classify(line) {
            Reply::Text => self.handle_payload(line),
            reply => self.handle_terminator(reply),
        }
    }

    fn handle_urc(&mut self, urc: Urc) {
        match urc {
            Urc::Ready => {
                // A rebooted module holds no links and no join
                self.links.release_all();
                self.joined = false;
                self.ip_assigned = false;
                self.joined_ap = None;
                self.mode = None;
                self.handler.device_ready();
                if matches!(
                    self.slot.verb(),
                    Some(Verb::Reset | Verb::Restore | Verb::FirmwareUpdate)
                ) {
                    self.slot.resolve(Ok(()));
                }
            }
            Urc::WatchdogReset => self.handler.watchdog_reset(),
            Urc::WifiConnected => {
                self.joined = true;
                self.handler.wifi_connected();
            }
            Urc::WifiDisconnected => {
                self.joined = false;
                self.ip_assigned = false;
                self.joined_ap = None;
                self.station.ip = None;
                self.station.gateway = None;
                self.station.netmask = None;
                self.links.release_all();
                self.handler.wifi_disconnected();
            }
            Urc::GotIp => {
                self.ip_assigned = true;
                self.handler.ip_assigned();
            }
            Urc::LinkConnected(link_id) => {
                self.links.activate_incoming(link_id);
                if self.slot.verb() == Some(Verb::Connect { link_id }) {
                    self.slot.resolve(Ok(()));
                }
                self.handler.link_opened(link_id);
            }
            Urc::LinkClosed(link_id) => {
                let was_active = self.links.get(link_id).map_or(false, Link::is_active);
                self.links.release(link_id);
                if was_active {
                    self.handler.link_closed(link_id);
                }
            }
            Urc::LinkConnectFailed(link_id) => {
                self.links.release(link_id);
                if self.slot.verb() == Some(Verb::Connect { link_id }) {
                    self.slot.resolve(Err(CommandError::Failed));
                }
            }
            // The firmware follows up with ERROR, which resolves the command
            Urc::AlreadyConnected => {}
        }
    }

    /// Routes a payload line to the active command's record
    fn handle_payload(&mut self, line: &[u8]) {
        let Some(verb) = self.slot.verb() else {
            // No command in flight, stray text is dropped
            return;
        };

        // Command echo while ATE1 is active
        if line.starts_with(b"AT") {
            return;
        }

        match verb {
            Verb::Join => {
                if let Some(code) = responses::parse_join_failure_code(line) {
                    self.join_failure = JoinFailure::from_code(code);
                    return;
                }
            }
            Verb::JoinQuery => {
                if let Some(ap) = responses::parse_joined_access_point(line) {
                    self.joined_ap = Some(ap);
                    return;
                }
            }
            Verb::Scan => {
                if let Some(ap) = responses::parse_access_point(line) {
                    let _ = self.access_points.push(ap);
                    return;
                }
            }
            Verb::Stations => {
                if let Some(station) = responses::parse_station(line) {
                    let _ = self.stations.push(station);
                    return;
                }
            }
            Verb::ApConfigQuery => {
                if let Some(config) = responses::parse_soft_ap_config(line) {
                    self.soft_ap_config = Some(config);
                    return;
                }
            }
            Verb::StationIpQuery => {
                if let Some((field, address)) = responses::parse_interface_address(line) {
                    assign_address(&mut self.station, field, address);
                    return;
                }
            }
            Verb::ApIpQuery => {
                if let Some((field, address)) = responses::parse_interface_address(line) {
                    assign_address(&mut self.soft_ap, field, address);
                    return;
                }
            }
            Verb::StationMacQuery => {
                if let Some(mac) = responses::parse_mac_line(line) {
                    self.station.mac = Some(mac);
                    return;
                }
            }
            Verb::ApMacQuery => {
                if let Some(mac) = responses::parse_mac_line(line) {
                    self.soft_ap.mac = Some(mac);
                    return;
                }
            }
            Verb::Ping => {
                if let Some(time) = responses::parse_ping_time(line) {
                    self.ping_time = Some(time);
                    return;
                }
            }
            Verb::FirmwareUpdate => {
                if let Some(code) = responses::parse_update_step(line) {
                    if code == 4 {
                        // The download is the long part
                        self.active_timeout = (10 * DEFAULT_TIMEOUT_MS).millis();
                    }
                    if let Some(step) = FirmwareStep::from_code(code) {
                        self.handler.update_progress(step);
                    }
                    return;
                }
            }
            _ => {}
        }

        self.slot.append_response(line);
    }

    fn handle_terminator(&mut self, reply: Reply) {
        let Some(verb) = self.slot.verb() else {
            // Stray terminator without a command in flight, e.g. a late
            // reply after a timeout. Ignored without error.
            return;
        };
        if !self.slot.is_active() {
            return;
        }

        match reply {
            Reply::Ok => match verb {
                // The prompt, not OK, advances a send request
                Verb::SendRequest { .. } => {}
                // The link notification, not OK, confirms a connect
                Verb::Connect { .. } => {}
                // Reset style commands resolve on the boot banner
                Verb::Reset | Verb::Restore => {}
                _ => self.slot.resolve(Ok(())),
            },
            Reply::Error | Reply::Busy => {
                if let Verb::Connect { link_id } = verb {
                    self.links.release(link_id);
                }
                self.slot.resolve(Err(CommandError::Failed));
            }
            Reply::Fail => {
                if verb == Verb::Join {
                    let failure = self.join_failure.unwrap_or(JoinFailure::Failed);
                    self.handler.join_failed(failure);
                }
                self.slot.resolve(Err(CommandError::Failed));
            }
            Reply::SendOk => {
                if let Verb::SendRequest { link_id } | Verb::SendPayload { link_id } = verb {
                    if let Ok(link) = self.links.get_mut(link_id) {
                        link.awaiting_prompt = false;
                    }
                    self.slot.resolve(Ok(()));
                }
            }
            Reply::SendFail => {
                if let Verb::SendRequest { link_id } | Verb::SendPayload { link_id } = verb {
                    if let Ok(link) = self.links.get_mut(link_id) {
                        link.awaiting_prompt = false;
                    }
                    self.slot.resolve(Err(CommandError::Failed));
                }
            }
            Reply::Text => {}
        }
    }

    /// Prepares the addressed link for the extraction and switches the pump
    /// into raw-copy mode
    fn start_frame(&mut self, header: &FrameHeader) {
        if let Some(link) = self.links.get_active_mut(header.link_id) {
            if let Some(remote) = header.remote {
                link.remote = Some(remote);
            }
            link.first_packet = link.total_received == 0;
            if link.first_packet {
                link.content_length = None;
            }
            link.more_pending = true;
            link.total_received = link.total_received.wrapping_add(header.length as u32);
            link.rx.clear();

            self.total_received = self.total_received.wrapping_add(header.length as u32);
        }

        self.frame = Some(FrameCursor::new(header));
    }

    /// Copies frame bytes to the addressed link, delivering full chunks on
    /// the way. Returns false once the channel runs dry mid-frame.
    fn pump_frame(&mut self) -> bool {
        let Some(mut cursor) = self.frame.take() else {
            return false;
        };

        while !cursor.is_complete() {
            let Some(byte) = self.rx.pop() else {
                self.frame = Some(cursor);
                return false;
            };
            cursor.offset += 1;

            let Self { links, handler, .. } = self;
            if let Some(link) = links.get_active_mut(cursor.link_id) {
                if link.rx.is_full() {
                    deliver(link, handler, cursor.link_id);
                }
                let _ = link.rx.push(byte);
            }
            // Bytes for an inactive link are consumed and dropped to keep
            // the stream in sync
        }

        self.last_received = Some(self.timer.now());
        self.finish_frame(cursor);
        true
    }

    fn finish_frame(&mut self, cursor: FrameCursor) {
        let now = self.timer.now();
        let Self { links, handler, .. } = self;

        if let Some(link) = links.get_active_mut(cursor.link_id) {
            link.more_pending = false;
            link.last_activity = Some(now);

            if link.first_packet {
                link.content_length = sniff_content_length(&link.rx);
            }

            if !link.rx.is_empty() {
                deliver(link, handler, cursor.link_id);
            }
        }
    }

    /// Current state of the command slot
    pub fn command_state(&self) -> CommandStatus {
        self.slot.status()
    }

    /// Response text accumulated by the most recent command
    pub fn response(&self) -> &str {
        self.slot.response()
    }

    /// Sets the default command timeout
    pub fn set_timeout(&mut self, timeout: TimerDurationU32<TIMER_HZ>) {
        self.timeout = timeout;
    }

    pub fn join_state(&self) -> JoinState {
        JoinState {
            connected: self.joined,
            ip_assigned: self.ip_assigned,
        }
    }

    /// Reason of the most recent join failure
    pub fn join_failure(&self) -> Option<JoinFailure> {
        self.join_failure
    }

    /// Access point joined according to the most recent query
    pub fn joined_access_point(&self) -> Option<&JoinedAccessPoint> {
        self.joined_ap.as_ref()
    }

    /// WiFi mode set by the most recent mode command
    pub fn wifi_mode(&self) -> Option<WifiMode> {
        self.mode
    }

    /// Results of the most recent scan
    pub fn access_points(&self) -> &[AccessPoint] {
        &self.access_points
    }

    /// Stations connected to the soft AP at the most recent query
    pub fn connected_stations(&self) -> &[ConnectedStation] {
        &self.stations
    }

    /// Soft AP parameters returned by the most recent configuration query
    pub fn soft_ap_configuration(&self) -> Option<&SoftApConfig> {
        self.soft_ap_config.as_ref()
    }

    pub fn station_addresses(&self) -> &InterfaceAddresses {
        &self.station
    }

    pub fn soft_ap_addresses(&self) -> &InterfaceAddresses {
        &self.soft_ap
    }

    /// Round-trip time of the most recent ping in ms
    pub fn ping_time(&self) -> Option<u32> {
        self.ping_time
    }

    /// Baud rate the driver believes the UART runs at
    pub fn baudrate(&self) -> u32 {
        self.baudrate
    }

    /// Payload bytes sent across all links
    pub fn total_sent(&self) -> u32 {
        self.total_sent
    }

    /// Payload bytes received across all links
    pub fn total_received(&self) -> u32 {
        self.total_received
    }

    /// Number of oversized lines the tokenizer dropped
    pub fn discarded_lines(&self) -> u32 {
        self.digester.discarded_lines()
    }

    /// Bounds-checked link lookup
    pub fn link(&self, link_id: usize) -> Result<&Link<H, TIMER_HZ, RX_SIZE>, CommandError> {
        self.links.get(link_id)
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub(crate) fn set_mode(&mut self, mode: WifiMode) {
        self.mode = Some(mode);
    }

    pub(crate) fn record_baudrate(&mut self, baudrate: u32) {
        self.baudrate = baudrate;
    }

    pub(crate) fn is_joined(&self) -> bool {
        self.joined
    }

    /// Discards buffered input and partial tokenizer state.
    ///
    /// Intended for use right after reconfiguring the UART clock following a
    /// baud rate change, when bytes captured at the old rate are garbage.
    pub fn drain_input(&mut self) {
        self.rx.drain();
        self.digester.clear();
    }
}

fn assign_address(interface: &mut InterfaceAddresses, field: AddressField, address: Ipv4Addr) {
    match field {
        AddressField::Ip => interface.ip = Some(address),
        AddressField::Gateway => interface.gateway = Some(address),
        AddressField::Netmask => interface.netmask = Some(address),
    }
}

/// Fires the link's callback for the buffered chunk and clears the buffer.
/// Without a callback the chunk is dropped, delivery is push-only.
fn deliver<H, const TIMER_HZ: u32, const RX_SIZE: usize>(
    link: &mut Link<H, TIMER_HZ, RX_SIZE>,
    handler: &mut H,
    link_id: usize,
) {
    if let Some(callback) = link.callback {
        callback(handler, link_id, &link.rx);
    }
    link.rx.clear();
}

/// Looks for a `Content-Length` header in the first packet of a link
fn sniff_content_length(data: &[u8]) -> Option<u32> {
    const NEEDLE: &[u8] = b"Content-Length: ";

    let start = data.windows(NEEDLE.len()).position(|window| window == NEEDLE)? + NEEDLE.len();
    let digits = &data[start..];
    let end = digits
        .iter()
        .position(|byte| !byte.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    core::str::from_utf8(&digits[..end]).ok()?.parse().ok()
}
