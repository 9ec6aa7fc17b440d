//! # Network links
//!
//! Client connections, raw payload transfer and the TCP server side of
//! [Driver](crate::driver::Driver).
//!
//! A connection claims one of the five multiplexed link ids. Outbound data
//! is pushed with [transfer](Driver::transfer), which chunks the buffer into
//! send cycles of at most TX_SIZE bytes. Inbound data is delivered through
//! the per-link [DataCallback] from inside [process](Driver::process), there
//! is no receive polling.
//!
//! ## Example
//!
//! ````
//! # use esp_at_driver::buffer::RxChannel;
//! # use esp_at_driver::driver::Driver;
//! # use esp_at_driver::example::{ExampleSerial, ExampleTimer};
//! # use esp_at_driver::stack::LinkKind;
//! #
//! let mut channel: RxChannel<256> = RxChannel::new();
//! let (from_isr, received) = channel.split();
//!
//! let mut driver: Driver<_, _, (), 1_000_000, 256, 256, 64> =
//!     Driver::new(ExampleSerial::new(from_isr), ExampleTimer::default(), received, ());
//!
//! driver.join("test_wifi", "secret").unwrap();
//!
//! // Opening a TCP connection
//! let link = driver.connect(LinkKind::Tcp, "10.0.0.1", 21).unwrap();
//! assert_eq!(0, link);
//!
//! // Sending some data
//! driver.transfer(link, b"hallo!").unwrap();
//!
//! // Closing the link
//! driver.close(link).unwrap();
//! ````
use crate::commands::{Command, MAX_PAYLOAD_SIZE};
use crate::dispatch::{CommandError, CommandStatus};
use crate::driver::{Driver, EventHandler};
use crate::link::DataCallback;
use embedded_io::Write;
use fugit_timer::Timer;

/// Transport protocol of a client connection
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkKind {
    Tcp,
    Udp,
    Ssl,
}

impl LinkKind {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            LinkKind::Tcp => "TCP",
            LinkKind::Udp => "UDP",
            LinkKind::Ssl => "SSL",
        }
    }
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
    /// Opens a client connection and returns the claimed link id.
    ///
    /// Blocks until the module confirms or rejects the connection. Fails
    /// with [CommandError::LinkNotValid] if all five links are taken and
    /// with [CommandError::WifiNotConnected] without a joined access point.
    pub fn connect(&mut self, kind: LinkKind, host: &str, port: u16) -> Result<usize, CommandError> {
        if !self.is_joined() {
            return Err(CommandError::WifiNotConnected);
        }

        let link_id = self.links.next_free().ok_or(CommandError::LinkNotValid)?;
        self.links.claim(link_id)?.client = true;

        let result = Command::connect(link_id, kind, host, port).and_then(|command| self.run(command));
        if let Err(error) = result {
            // The resolution paths release on their own, direct failures
            // must not leak the claimed id either
            self.links.release(link_id);
            return Err(error);
        }

        Ok(link_id)
    }

    /// Sends the whole buffer through the link.
    ///
    /// The buffer is divided into send cycles of at most TX_SIZE bytes, each
    /// cycle performing the full request/prompt/payload handshake. Returns
    /// once the last cycle is confirmed.
    pub fn transfer(&mut self, link_id: usize, data: &[u8]) -> Result<(), CommandError> {
        if !self.links.get(link_id)?.is_active() {
            return Err(CommandError::LinkNotValid);
        }

        self.links.get_mut(link_id)?.awaiting_prompt = true;
        let result = self.transfer_chunks(link_id, data);
        if let Ok(link) = self.links.get_mut(link_id) {
            link.awaiting_prompt = false;
        }
        result
    }

    fn transfer_chunks(&mut self, link_id: usize, data: &[u8]) -> Result<(), CommandError> {
        for chunk in data.chunks(TX_SIZE.min(MAX_PAYLOAD_SIZE)) {
            self.issue(Command::send_request(link_id)?)?;

            loop {
                match self.poll() {
                    Err(nb::Error::WouldBlock) => {
                        if self.command_state() == CommandStatus::PromptReady {
                            break;
                        }
                    }
                    Err(nb::Error::Other(error)) => return Err(error),
                    // Resolved without ever showing the prompt
                    Ok(()) => return Err(CommandError::Failed),
                }
            }

            self.send_payload(chunk)?;
            nb::block!(self.poll())?;
        }

        Ok(())
    }

    /// Closes the link.
    ///
    /// The id is released locally even if the command fails, a link the
    /// module no longer knows about must not stay claimed.
    pub fn close(&mut self, link_id: usize) -> Result<(), CommandError> {
        if !self.links.get(link_id)?.is_active() {
            return Err(CommandError::LinkNotValid);
        }

        let result = self.run(Command::close(link_id)?);
        self.links.release(link_id);
        result
    }

    /// Closes every open link with a single command
    pub fn close_all(&mut self) -> Result<(), CommandError> {
        let result = self.run(Command::close_all());
        self.links.release_all();
        result
    }

    /// Attaches the receive callback of an open link. Incoming payload is
    /// pushed into it from inside [process](Driver::process), together with
    /// the mutable event handler.
    ///
    /// Payload arriving while no callback is attached is discarded.
    pub fn set_data_callback(
        &mut self,
        link_id: usize,
        callback: DataCallback<H>,
    ) -> Result<(), CommandError> {
        let link = self.links.get_mut(link_id)?;
        if !link.is_active() {
            return Err(CommandError::LinkNotValid);
        }

        link.callback = Some(callback);
        Ok(())
    }

    pub fn clear_data_callback(&mut self, link_id: usize) -> Result<(), CommandError> {
        self.links.get_mut(link_id)?.callback = None;
        Ok(())
    }

    /// Starts the TCP server on the given port.
    ///
    /// Peer connections claim free link ids on their own and announce
    /// themselves through [link_opened](EventHandler::link_opened).
    pub fn start_server(&mut self, port: u16) -> Result<(), CommandError> {
        self.run(Command::server(Some(port))?)
    }

    /// Stops accepting peer connections, existing links stay open
    pub fn stop_server(&mut self) -> Result<(), CommandError> {
        self.run(Command::server(None)?)
    }

    /// Sets the inactivity timeout the server applies to its links, in
    /// seconds
    pub fn set_server_timeout(&mut self, seconds: u16) -> Result<(), CommandError> {
        self.run(Command::server_timeout(seconds)?)
    }
}
