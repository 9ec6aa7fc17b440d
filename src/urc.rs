use core::str::FromStr;
use core::net::Ipv4Addr;

/// Unsolicited lines the co-processor emits without a command in flight.
///
/// Lines are matched after the trailing CRLF has been stripped.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Urc {
    /// Boot banner, module is ready for receiving AT commands
    Ready,
    /// Module restarted itself after a watchdog reset
    WatchdogReset,
    /// Wifi connection to the access point established
    WifiConnected,
    /// Wifi connection to the access point lost
    WifiDisconnected,
    /// Received an IP from the access point
    GotIp,
    /// Link with the given id opened
    LinkConnected(usize),
    /// Link with the given id closed
    LinkClosed(usize),
    /// Opening the link with the given id failed
    LinkConnectFailed(usize),
    /// The requested peer is already connected on this link
    AlreadyConnected,
}

impl Urc {
    pub(crate) fn parse(line: &[u8]) -> Option<Self> {
        if line.len() >= 2 {
            match &line[1..] {
                b",CONNECT" => return Some(Self::LinkConnected(parse_link_id(line[0])?)),
                b",CLOSED" => return Some(Self::LinkClosed(parse_link_id(line[0])?)),
                b",CONNECT FAIL" => return Some(Self::LinkConnectFailed(parse_link_id(line[0])?)),
                _ => {}
            }
        }

        match line {
            b"ready" => Some(Self::Ready),
            b"wdt reset" => Some(Self::WatchdogReset),
            b"WIFI CONNECTED" => Some(Self::WifiConnected),
            b"WIFI DISCONNECT" => Some(Self::WifiDisconnected),
            b"WIFI GOT IP" => Some(Self::GotIp),
            b"ALREADY CONNECTED" => Some(Self::AlreadyConnected),
            _ => None,
        }
    }
}

/// Parses the link id digit. Currently supports just link 0-4
pub(crate) fn parse_link_id(link_id: u8) -> Option<usize> {
    match link_id {
        0x30 => Some(0),
        0x31 => Some(1),
        0x32 => Some(2),
        0x33 => Some(3),
        0x34 => Some(4),
        _ => None,
    }
}

/// Parsed header of a binary inbound frame, e.g. `+IPD,0,5,192.168.2.1,8080`.
///
/// The remote fields are only present while remote-info reporting
/// (`AT+CIPDINFO=1`) is enabled.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct FrameHeader {
    pub(crate) link_id: usize,
    pub(crate) length: usize,
    pub(crate) remote: Option<(Ipv4Addr, u16)>,
}

impl FrameHeader {
    /// Parses the header text up to, but not including, the `:` separator.
    pub(crate) fn parse(line: &[u8]) -> Option<Self> {
        let fields = line.strip_prefix(b"+IPD,")?;
        let mut parts = fields.split(|&byte| byte == b',');

        let id_field = parts.next()?;
        if id_field.len() != 1 {
            return None;
        }
        let link_id = parse_link_id(id_field[0])?;
        let length = parse_decimal(parts.next()?)?;

        let remote = match (parts.next(), parts.next()) {
            (Some(ip), Some(port)) => {
                let address = Ipv4Addr::from_str(unquote(ip)?).ok()?;
                let port = u16::try_from(parse_decimal(port)?).ok()?;
                Some((address, port))
            }
            _ => None,
        };

        Some(Self {
            link_id,
            length,
            remote,
        })
    }
}

fn parse_decimal(field: &[u8]) -> Option<usize> {
    core::str::from_utf8(field).ok()?.parse().ok()
}

/// Strips an optional quote wrapper. Older firmware sends addresses bare,
/// newer firmware quotes them.
fn unquote(field: &[u8]) -> Option<&str> {
    let inner = match field {
        [b'"', inner @ .., b'"'] => inner,
        _ => field,
    };
    core::str::from_utf8(inner).ok()
}
