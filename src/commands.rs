use crate::dispatch::CommandError;
use crate::responses::SoftApConfig;
use crate::stack::LinkKind;
use crate::wifi::{SleepMode, WifiMode};
use heapless::String;
use numtoa::NumToA;

/// Command text capacity. Sized for the longest builder output, a soft AP
/// configuration with fully escaped SSID and password.
pub(crate) const COMMAND_CAPACITY: usize = 240;

/// Payload size the firmware is asked to reserve per send cycle
pub(crate) const SEND_BLOCK_SIZE: usize = 2048;

/// Max. payload bytes per send cycle. The firmware terminates a cycle early
/// once the block is full, so two bytes stay reserved for the terminator.
pub(crate) const MAX_PAYLOAD_SIZE: usize = SEND_BLOCK_SIZE - 2;

/// Identifies the active command for response routing and resolution rules
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Verb {
    Probe,
    Echo,
    Reset,
    Restore,
    Multiplexing,
    RemoteInfo,
    Mode,
    Join,
    JoinQuery,
    Quit,
    Scan,
    ApConfig,
    ApConfigQuery,
    Stations,
    StationIpQuery,
    StationMacQuery,
    ApIpQuery,
    ApMacQuery,
    Connect { link_id: usize },
    Close,
    SendRequest { link_id: usize },
    SendPayload { link_id: usize },
    Server,
    ServerTimeout,
    Ping,
    Sleep,
    DeepSleep,
    Uart,
    FirmwareUpdate,
}

/// One fully formatted command ready for transmission
#[derive(Debug)]
pub(crate) struct Command {
    text: String<COMMAND_CAPACITY>,
    verb: Verb,
    timeout_ms: Option<u32>,
}

impl Command {
    pub(crate) fn text(&self) -> &[u8] {
        self.text.as_bytes()
    }

    pub(crate) fn verb(&self) -> Verb {
        self.verb
    }

    /// Timeout override in ms, None applies the driver default
    pub(crate) fn timeout_ms(&self) -> Option<u32> {
        self.timeout_ms
    }

    fn simple(text: &str, verb: Verb) -> Self {
        let mut command = String::new();
        // Fixed texts are all well below the capacity
        let _ = command.push_str(text);
        Self {
            text: command,
            verb,
            timeout_ms: None,
        }
    }

    pub(crate) fn probe() -> Self {
        Self::simple("AT\r\n", Verb::Probe)
    }

    pub(crate) fn enable_echo() -> Self {
        Self::simple("ATE1\r\n", Verb::Echo)
    }

    /// Reset resolves on the boot banner. A live module reboots within a few
    /// hundred milliseconds, so an unresponsive one should fail fast.
    pub(crate) fn reset() -> Self {
        let mut command = Self::simple("AT+RST\r\n", Verb::Reset);
        command.timeout_ms = Some(1_000);
        command
    }

    pub(crate) fn restore() -> Self {
        Self::simple("AT+RESTORE\r\n", Verb::Restore)
    }

    pub(crate) fn multiplexing(enabled: bool) -> Self {
        if enabled {
            Self::simple("AT+CIPMUX=1\r\n", Verb::Multiplexing)
        } else {
            Self::simple("AT+CIPMUX=0\r\n", Verb::Multiplexing)
        }
    }

    pub(crate) fn remote_info(enabled: bool) -> Self {
        if enabled {
            Self::simple("AT+CIPDINFO=1\r\n", Verb::RemoteInfo)
        } else {
            Self::simple("AT+CIPDINFO=0\r\n", Verb::RemoteInfo)
        }
    }

    pub(crate) fn wifi_mode(mode: WifiMode) -> Result<Self, CommandError> {
        let mut text = String::new();
        append(&mut text, "AT+CWMODE_CUR=")?;
        append_num(&mut text, mode as u32)?;
        append(&mut text, "\r\n")?;
        Ok(Self {
            text,
            verb: Verb::Mode,
            timeout_ms: None,
        })
    }

    pub(crate) fn join(ssid: &str, password: &str, persistent: bool) -> Result<Self, CommandError> {
        let mut text = String::new();
        if persistent {
            append(&mut text, "AT+CWJAP_DEF=\"")?;
        } else {
            append(&mut text, "AT+CWJAP_CUR=\"")?;
        }
        append_escaped(&mut text, ssid)?;
        append(&mut text, "\",\"")?;
        append_escaped(&mut text, password)?;
        append(&mut text, "\"\r\n")?;
        Ok(Self {
            text,
            verb: Verb::Join,
            timeout_ms: None,
        })
    }

    pub(crate) fn join_query() -> Self {
        Self::simple("AT+CWJAP_CUR?\r\n", Verb::JoinQuery)
    }

    pub(crate) fn quit_access_point() -> Self {
        Self::simple("AT+CWQAP\r\n", Verb::Quit)
    }

    pub(crate) fn scan() -> Self {
        Self::simple("AT+CWLAP\r\n", Verb::Scan)
    }

    pub(crate) fn soft_ap_config(config: &SoftApConfig, persistent: bool) -> Result<Self, CommandError> {
        let mut text = String::new();
        if persistent {
            append(&mut text, "AT+CWSAP_DEF=\"")?;
        } else {
            append(&mut text, "AT+CWSAP_CUR=\"")?;
        }
        append_escaped(&mut text, &config.ssid)?;
        append(&mut text, "\",\"")?;
        append_escaped(&mut text, &config.password)?;
        append(&mut text, "\",")?;
        append_num(&mut text, config.channel as u32)?;
        append(&mut text, ",")?;
        append_num(&mut text, config.encryption as u32)?;
        append(&mut text, ",")?;
        append_num(&mut text, config.max_connections as u32)?;
        append(&mut text, ",")?;
        append_num(&mut text, config.hidden as u32)?;
        append(&mut text, "\r\n")?;
        Ok(Self {
            text,
            verb: Verb::ApConfig,
            timeout_ms: None,
        })
    }

    pub(crate) fn list_stations() -> Self {
        Self::simple("AT+CWLIF\r\n", Verb::Stations)
    }

    pub(crate) fn soft_ap_query() -> Self {
        Self::simple("AT+CWSAP?\r\n", Verb::ApConfigQuery)
    }

    pub(crate) fn station_ip_query() -> Self {
        Self::simple("AT+CIPSTA_CUR?\r\n", Verb::StationIpQuery)
    }

    pub(crate) fn station_mac_query() -> Self {
        Self::simple("AT+CIPSTAMAC?\r\n", Verb::StationMacQuery)
    }

    pub(crate) fn soft_ap_ip_query() -> Self {
        Self::simple("AT+CIPAP_CUR?\r\n", Verb::ApIpQuery)
    }

    pub(crate) fn soft_ap_mac_query() -> Self {
        Self::simple("AT+CIPAPMAC?\r\n", Verb::ApMacQuery)
    }

    pub(crate) fn connect(link_id: usize, kind: LinkKind, host: &str, port: u16) -> Result<Self, CommandError> {
        let mut text = String::new();
        append(&mut text, "AT+CIPSTART=")?;
        append_num(&mut text, link_id as u32)?;
        append(&mut text, ",\"")?;
        append(&mut text, kind.as_str())?;
        append(&mut text, "\",\"")?;
        append(&mut text, host)?;
        append(&mut text, "\",")?;
        append_num(&mut text, port as u32)?;
        append(&mut text, "\r\n")?;
        Ok(Self {
            text,
            verb: Verb::Connect { link_id },
            timeout_ms: None,
        })
    }

    pub(crate) fn close(link_id: usize) -> Result<Self, CommandError> {
        let mut text = String::new();
        append(&mut text, "AT+CIPCLOSE=")?;
        append_num(&mut text, link_id as u32)?;
        append(&mut text, "\r\n")?;
        Ok(Self {
            text,
            verb: Verb::Close,
            timeout_ms: None,
        })
    }

    /// Closes every link at once, id 5 is the firmware's broadcast value
    pub(crate) fn close_all() -> Self {
        Self::simple("AT+CIPCLOSE=5\r\n", Verb::Close)
    }

    pub(crate) fn send_request(link_id: usize) -> Result<Self, CommandError> {
        let mut text = String::new();
        append(&mut text, "AT+CIPSENDEX=")?;
        append_num(&mut text, link_id as u32)?;
        append(&mut text, ",")?;
        append_num(&mut text, SEND_BLOCK_SIZE as u32)?;
        append(&mut text, "\r\n")?;
        Ok(Self {
            text,
            verb: Verb::SendRequest { link_id },
            timeout_ms: None,
        })
    }

    pub(crate) fn server(port: Option<u16>) -> Result<Self, CommandError> {
        let mut text = String::new();
        match port {
            Some(port) => {
                append(&mut text, "AT+CIPSERVER=1,")?;
                append_num(&mut text, port as u32)?;
                append(&mut text, "\r\n")?;
            }
            None => append(&mut text, "AT+CIPSERVER=0\r\n")?,
        }
        Ok(Self {
            text,
            verb: Verb::Server,
            timeout_ms: None,
        })
    }

    pub(crate) fn server_timeout(seconds: u16) -> Result<Self, CommandError> {
        let mut text = String::new();
        append(&mut text, "AT+CIPSTO=")?;
        append_num(&mut text, seconds as u32)?;
        append(&mut text, "\r\n")?;
        Ok(Self {
            text,
            verb: Verb::ServerTimeout,
            timeout_ms: None,
        })
    }

    pub(crate) fn ping(host: &str) -> Result<Self, CommandError> {
        let mut text = String::new();
        append(&mut text, "AT+PING=\"")?;
        append(&mut text, host)?;
        append(&mut text, "\"\r\n")?;
        Ok(Self {
            text,
            verb: Verb::Ping,
            timeout_ms: None,
        })
    }

    pub(crate) fn sleep(mode: SleepMode) -> Result<Self, CommandError> {
        let mut text = String::new();
        append(&mut text, "AT+SLEEP=")?;
        append_num(&mut text, mode as u32)?;
        append(&mut text, "\r\n")?;
        Ok(Self {
            text,
            verb: Verb::Sleep,
            timeout_ms: None,
        })
    }

    pub(crate) fn deep_sleep(milliseconds: u32) -> Result<Self, CommandError> {
        let mut text = String::new();
        append(&mut text, "AT+GSLP=")?;
        append_num(&mut text, milliseconds)?;
        append(&mut text, "\r\n")?;
        Ok(Self {
            text,
            verb: Verb::DeepSleep,
            timeout_ms: None,
        })
    }

    pub(crate) fn uart(baudrate: u32, persistent: bool) -> Result<Self, CommandError> {
        let mut text = String::new();
        if persistent {
            append(&mut text, "AT+UART_DEF=")?;
        } else {
            append(&mut text, "AT+UART_CUR=")?;
        }
        append_num(&mut text, baudrate)?;
        append(&mut text, ",8,1,0,0\r\n")?;
        Ok(Self {
            text,
            verb: Verb::Uart,
            timeout_ms: None,
        })
    }

    pub(crate) fn firmware_update() -> Self {
        Self::simple("AT+CIUPDATE\r\n", Verb::FirmwareUpdate)
    }
}

fn append(text: &mut String<COMMAND_CAPACITY>, part: &str) -> Result<(), CommandError> {
    text.push_str(part).map_err(|_| CommandError::OutOfMemory)
}

fn append_num(text: &mut String<COMMAND_CAPACITY>, value: u32) -> Result<(), CommandError> {
    let mut digits = [0u8; 10];
    append(text, value.numtoa_str(10, &mut digits))
}

/// Escapes `,`, `"` and `\` with a leading `/`, the firmware's convention
/// for SSID and password parameters
fn append_escaped(text: &mut String<COMMAND_CAPACITY>, value: &str) -> Result<(), CommandError> {
    for character in value.chars() {
        if matches!(character, ',' | '"' | '\\') {
            text.push('/').map_err(|_| CommandError::OutOfMemory)?;
        }
        text.push(character).map_err(|_| CommandError::OutOfMemory)?;
    }
    Ok(())
}
