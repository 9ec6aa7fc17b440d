//! # WiFi management
//!
//! Management operations of [Driver](crate::driver::Driver): bringing the
//! module up, joining and leaving access points, scanning, soft AP
//! configuration and module maintenance.
//!
//! All operations here issue one or more commands and poll the engine to
//! resolution, so they return with a final result.
//!
//! Note: If the joined network is lost, the firmware retries independently
//! from time to time. The status can be queried using `join_state()` and is
//! pushed through the [EventHandler] as it changes.
//!
//! ## Example
//!
//! ````
//! # use esp_at_driver::buffer::RxChannel;
//! # use esp_at_driver::driver::Driver;
//! # use esp_at_driver::example::{ExampleSerial, ExampleTimer};
//! #
//! let mut channel: RxChannel<256> = RxChannel::new();
//! let (from_isr, received) = channel.split();
//!
//! let mut driver: Driver<_, _, (), 1_000_000, 256, 256, 64> =
//!     Driver::new(ExampleSerial::new(from_isr), ExampleTimer::default(), received, ());
//!
//! let state = driver.join("test_wifi", "secret").unwrap();
//! assert!(state.connected);
//! assert!(state.ip_assigned);
//!
//! let time = driver.ping("10.0.0.1").unwrap();
//! assert_eq!(23, time);
//! ````
use crate::commands::Command;
use crate::dispatch::CommandError;
use crate::driver::{Driver, EventHandler, InterfaceAddresses, DEFAULT_BAUDRATE};
use crate::responses::{AccessPoint, ConnectedStation, JoinedAccessPoint, SoftApConfig};
use embedded_io::Write;
use fugit_timer::Timer;

/// Baud rates the firmware accepts
pub const SUPPORTED_BAUDRATES: [u32; 4] = [9_600, 57_600, DEFAULT_BAUDRATE, 921_600];

/// Operating mode of the radio
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WifiMode {
    /// Client of an access point
    Station = 1,

    /// Soft access point for other stations
    AccessPoint = 2,

    /// Station and soft access point at the same time
    Both = 3,
}

/// Power saving behavior of the radio
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SleepMode {
    Disabled = 0,

    Light = 1,

    Modem = 2,
}

/// Categorized reason of a failed join attempt
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum JoinFailure {
    /// The access point did not answer in time
    Timeout,

    WrongPassword,

    AccessPointNotFound,

    /// Failed without a reported reason
    Failed,
}

impl JoinFailure {
    pub(crate) fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(JoinFailure::Timeout),
            2 => Some(JoinFailure::WrongPassword),
            3 => Some(JoinFailure::AccessPointNotFound),
            4 => Some(JoinFailure::Failed),
            _ => None,
        }
    }
}

/// Progress step of an over-the-air firmware update
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FirmwareStep {
    /// Update server located
    ServerFound = 1,

    /// Connected to the update server
    Connected = 2,

    /// Firmware edition received
    GotEdition = 3,

    /// Download and flashing started
    StartUpdate = 4,
}

impl FirmwareStep {
    pub(crate) fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(FirmwareStep::ServerFound),
            2 => Some(FirmwareStep::Connected),
            3 => Some(FirmwareStep::GotEdition),
            4 => Some(FirmwareStep::StartUpdate),
            _ => None,
        }
    }
}

/// Snapshot of the join status
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct JoinState {
    /// True if connected to an access point
    pub connected: bool,

    /// True if the access point assigned an IP
    pub ip_assigned: bool,
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
    /// Brings the module into a defined state: reset, echo on, link
    /// multiplexing on, remote peer info on, then a refresh of the local MAC
    /// and IP addresses.
    ///
    /// Fails with [CommandError::DeviceNotConnected] if the module answers
    /// neither the reset nor the probe, distinguishing a missing module from
    /// a later protocol failure.
    pub fn initialize(&mut self) -> Result<(), CommandError> {
        self.run(Command::reset()).map_err(connection_failure)?;
        self.run(Command::probe()).map_err(connection_failure)?;
        self.run(Command::enable_echo())?;
        self.run(Command::multiplexing(true))?;
        self.run(Command::remote_info(true))?;

        self.run(Command::station_mac_query())?;
        self.run(Command::soft_ap_mac_query())?;
        self.run(Command::station_ip_query())?;
        self.run(Command::soft_ap_ip_query())?;
        Ok(())
    }

    /// Restarts the module. Resolves once the boot banner is observed, which
    /// also clears all link and join state.
    pub fn reset(&mut self) -> Result<(), CommandError> {
        self.run(Command::reset())
    }

    /// Sets the radio mode, volatile
    pub fn set_wifi_mode(&mut self, mode: WifiMode) -> Result<(), CommandError> {
        self.run(Command::wifi_mode(mode)?)?;
        self.set_mode(mode);
        Ok(())
    }

    /// Joins an access point, volatile.
    ///
    /// Blocks until the module reports success or failure. On failure the
    /// categorized reason is available through
    /// [join_failure](Driver::join_failure) and pushed through
    /// [join_failed](EventHandler::join_failed).
    pub fn join(&mut self, ssid: &str, password: &str) -> Result<JoinState, CommandError> {
        self.run(Command::join(ssid, password, false)?)?;
        Ok(self.join_state())
    }

    /// Joins an access point and persists the credentials in module flash,
    /// the module rejoins on its own after a reboot
    pub fn join_persistent(&mut self, ssid: &str, password: &str) -> Result<JoinState, CommandError> {
        self.run(Command::join(ssid, password, true)?)?;
        Ok(self.join_state())
    }

    /// Queries the currently joined access point, None if not joined
    pub fn query_joined_access_point(&mut self) -> Result<Option<&JoinedAccessPoint>, CommandError> {
        self.run(Command::join_query())?;
        Ok(self.joined_access_point())
    }

    /// Leaves the current access point. The disconnect notification follows
    /// and releases all links.
    pub fn quit_access_point(&mut self) -> Result<(), CommandError> {
        self.run(Command::quit_access_point())
    }

    /// Scans for visible access points, returned in the firmware's order
    pub fn scan(&mut self) -> Result<&[AccessPoint], CommandError> {
        self.run(Command::scan())?;
        Ok(self.access_points())
    }

    /// Configures the soft AP side, volatile
    pub fn set_soft_ap_config(&mut self, config: &SoftApConfig) -> Result<(), CommandError> {
        self.run(Command::soft_ap_config(config, false)?)
    }

    /// Configures the soft AP side and persists it in module flash
    pub fn set_soft_ap_config_persistent(&mut self, config: &SoftApConfig) -> Result<(), CommandError> {
        self.run(Command::soft_ap_config(config, true)?)
    }

    /// Queries the active soft AP configuration
    pub fn query_soft_ap_config(&mut self) -> Result<Option<&SoftApConfig>, CommandError> {
        self.run(Command::soft_ap_query())?;
        Ok(self.soft_ap_configuration())
    }

    /// Lists the stations currently connected to the soft AP
    pub fn list_stations(&mut self) -> Result<&[ConnectedStation], CommandError> {
        self.run(Command::list_stations())?;
        Ok(self.connected_stations())
    }

    /// Refreshes and returns the station side addressing
    pub fn query_station_addresses(&mut self) -> Result<&InterfaceAddresses, CommandError> {
        self.run(Command::station_ip_query())?;
        self.run(Command::station_mac_query())?;
        Ok(self.station_addresses())
    }

    /// Refreshes and returns the soft AP side addressing
    pub fn query_soft_ap_addresses(&mut self) -> Result<&InterfaceAddresses, CommandError> {
        self.run(Command::soft_ap_ip_query())?;
        self.run(Command::soft_ap_mac_query())?;
        Ok(self.soft_ap_addresses())
    }

    /// Pings a host through the joined access point and returns the round
    /// trip time in ms
    pub fn ping(&mut self, host: &str) -> Result<u32, CommandError> {
        if !self.is_joined() {
            return Err(CommandError::WifiNotConnected);
        }
        self.run(Command::ping(host)?)?;
        self.ping_time().ok_or(CommandError::Failed)
    }

    pub fn set_sleep_mode(&mut self, mode: SleepMode) -> Result<(), CommandError> {
        self.run(Command::sleep(mode)?)
    }

    /// Puts the module into deep sleep for the given duration. It reboots
    /// afterwards and announces itself with the boot banner.
    pub fn deep_sleep(&mut self, milliseconds: u32) -> Result<(), CommandError> {
        self.run(Command::deep_sleep(milliseconds)?)
    }

    /// Changes the UART baud rate, volatile.
    ///
    /// On success the caller must reconfigure its own UART clock and should
    /// then call [drain_input](Driver::drain_input), bytes captured at the
    /// old rate are garbage. Rates outside [SUPPORTED_BAUDRATES] are
    /// rejected without touching the module.
    pub fn set_baudrate(&mut self, baudrate: u32) -> Result<(), CommandError> {
        self.change_baudrate(baudrate, false)
    }

    /// Changes the UART baud rate and persists it in module flash
    pub fn set_baudrate_persistent(&mut self, baudrate: u32) -> Result<(), CommandError> {
        self.change_baudrate(baudrate, true)
    }

    fn change_baudrate(&mut self, baudrate: u32, persistent: bool) -> Result<(), CommandError> {
        if !SUPPORTED_BAUDRATES.contains(&baudrate) {
            return Err(CommandError::Failed);
        }
        self.run(Command::uart(baudrate, persistent)?)?;
        self.record_baudrate(baudrate);
        Ok(())
    }

    /// Wipes all persisted configuration and reboots the module.
    ///
    /// The module comes back with factory settings, including the factory
    /// baud rate.
    pub fn restore_defaults(&mut self) -> Result<(), CommandError> {
        self.run(Command::restore())
    }

    /// Runs an over-the-air firmware update. Progress is pushed through
    /// [update_progress](EventHandler::update_progress) and the operation
    /// resolves once the module rebooted into the new firmware.
    ///
    /// The download step extends the deadline on its own, flashing an image
    /// takes far longer than any other command.
    pub fn update_firmware(&mut self) -> Result<(), CommandError> {
        if !self.is_joined() {
            return Err(CommandError::WifiNotConnected);
        }
        self.run(Command::firmware_update())
    }
}

/// An unanswered probe means no device, not a failed command
fn connection_failure(error: CommandError) -> CommandError {
    match error {
        CommandError::Timeout => CommandError::DeviceNotConnected,
        other => other,
    }
}
