//! # Response records and payload-line parsers
//!
//! Value records produced as side effects of specific commands, plus the
//! parsers turning single payload lines into them. All parsers take one
//! tokenized line with the CRLF already stripped and return `None` on any
//! format mismatch, which the engine treats as ordinary response text.
use core::str::FromStr;
use core::net::Ipv4Addr;
use heapless::String;

/// Encryption kind of an access point
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Encryption {
    Open = 0,
    Wep = 1,
    WpaPsk = 2,
    Wpa2Psk = 3,
    WpaWpa2Psk = 4,
}

impl Encryption {
    pub(crate) fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Open),
            1 => Some(Self::Wep),
            2 => Some(Self::WpaPsk),
            3 => Some(Self::Wpa2Psk),
            4 => Some(Self::WpaWpa2Psk),
            _ => None,
        }
    }
}

/// One access point found by a network scan
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessPoint {
    pub ssid: String<32>,

    /// Hardware address in `aa:bb:cc:dd:ee:ff` notation
    pub mac: String<17>,

    /// Signal strength in dBm
    pub rssi: i16,

    pub channel: u8,

    pub encryption: Encryption,

    /// Frequency offset of the access point in kHz
    pub offset: i16,

    /// Frequency calibration value
    pub calibration: i16,
}

/// The access point the station is currently joined to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinedAccessPoint {
    pub ssid: String<32>,
    pub mac: String<17>,
    pub channel: u8,
    pub rssi: i16,
}

/// One station connected to the soft access point
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectedStation {
    pub ip: Ipv4Addr,
    pub mac: String<17>,
}

/// Soft access point parameters, used for configuration and returned by the
/// configuration query
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SoftApConfig {
    pub ssid: String<32>,
    pub password: String<64>,
    pub channel: u8,
    pub encryption: Encryption,
    /// Max. simultaneous stations, the firmware supports 1-4
    pub max_connections: u8,
    /// True hides the SSID from scans
    pub hidden: bool,
}

/// Interface addressing field of a `+CIPSTA`/`+CIPAP` reply line
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum AddressField {
    Ip,
    Gateway,
    Netmask,
}

/// Parses one `+CWLAP:(ecn,"ssid",rssi,"mac",channel,offset,calibration)` line
pub(crate) fn parse_access_point(line: &[u8]) -> Option<AccessPoint> {
    let mut rest = line.strip_prefix(b"+CWLAP:")?;
    if let Some(stripped) = rest.strip_prefix(b"(") {
        rest = stripped;
    }

    let encryption = Encryption::from_code(u8::try_from(take_number(&mut rest)?).ok()?)?;
    take_comma(&mut rest);
    let ssid = to_string::<32>(take_quoted(&mut rest)?)?;
    take_comma(&mut rest);
    let rssi = i16::try_from(take_number(&mut rest)?).ok()?;
    take_comma(&mut rest);
    let mac = to_mac(take_quoted(&mut rest)?)?;
    take_comma(&mut rest);
    let channel = u8::try_from(take_number(&mut rest)?).ok()?;
    take_comma(&mut rest);
    let offset = i16::try_from(take_number(&mut rest)?).ok()?;
    take_comma(&mut rest);
    let calibration = i16::try_from(take_number(&mut rest)?).ok()?;

    Some(AccessPoint {
        ssid,
        mac,
        rssi,
        channel,
        encryption,
        offset,
        calibration,
    })
}

/// Parses a `+CWJAP_CUR:"ssid","mac",channel,rssi` line
pub(crate) fn parse_joined_access_point(line: &[u8]) -> Option<JoinedAccessPoint> {
    let colon = line.iter().position(|&byte| byte == b':')?;
    if !line.starts_with(b"+CWJAP_") {
        return None;
    }

    let mut rest = &line[colon + 1..];
    let ssid = to_string::<32>(take_quoted(&mut rest)?)?;
    take_comma(&mut rest);
    let mac = to_mac(take_quoted(&mut rest)?)?;
    take_comma(&mut rest);
    let channel = u8::try_from(take_number(&mut rest)?).ok()?;
    take_comma(&mut rest);
    let rssi = i16::try_from(take_number(&mut rest)?).ok()?;

    Some(JoinedAccessPoint {
        ssid,
        mac,
        channel,
        rssi,
    })
}

/// Parses one `ip,mac` station line of a `AT+CWLIF` reply
pub(crate) fn parse_station(line: &[u8]) -> Option<ConnectedStation> {
    let comma = line.iter().position(|&byte| byte == b',')?;
    let ip = Ipv4Addr::from_str(core::str::from_utf8(&line[..comma]).ok()?).ok()?;
    let mac = to_mac(&line[comma + 1..])?;

    Some(ConnectedStation { ip, mac })
}

/// Parses a `+CWSAP_CUR:"ssid","password",channel,ecn,max,hidden` line
pub(crate) fn parse_soft_ap_config(line: &[u8]) -> Option<SoftApConfig> {
    if !line.starts_with(b"+CWSAP") {
        return None;
    }
    let colon = line.iter().position(|&byte| byte == b':')?;

    let mut rest = &line[colon + 1..];
    let ssid = to_string::<32>(take_quoted(&mut rest)?)?;
    take_comma(&mut rest);
    let password = to_string::<64>(take_quoted(&mut rest)?)?;
    take_comma(&mut rest);
    let channel = u8::try_from(take_number(&mut rest)?).ok()?;
    take_comma(&mut rest);
    let encryption = Encryption::from_code(u8::try_from(take_number(&mut rest)?).ok()?)?;
    take_comma(&mut rest);
    let max_connections = match take_number(&mut rest) {
        Some(value) => u8::try_from(value).ok()?,
        None => 4,
    };
    take_comma(&mut rest);
    let hidden = matches!(take_number(&mut rest), Some(1));

    Some(SoftApConfig {
        ssid,
        password,
        channel,
        encryption,
        max_connections,
        hidden,
    })
}

/// Parses one field line of a `+CIPSTA`/`+CIPAP` addressing reply,
/// e.g. `+CIPSTA_CUR:ip:"192.168.2.4"`
pub(crate) fn parse_interface_address(line: &[u8]) -> Option<(AddressField, Ipv4Addr)> {
    let rest = strip_any(
        line,
        &[b"+CIPSTA_CUR:", b"+CIPSTA:", b"+CIPAP_CUR:", b"+CIPAP:"],
    )?;

    let (field, mut rest) = if let Some(rest) = rest.strip_prefix(b"ip:") {
        (AddressField::Ip, rest)
    } else if let Some(rest) = rest.strip_prefix(b"gateway:") {
        (AddressField::Gateway, rest)
    } else if let Some(rest) = rest.strip_prefix(b"netmask:") {
        (AddressField::Netmask, rest)
    } else {
        return None;
    };

    let field_text = take_quoted(&mut rest).unwrap_or(rest);
    let address = Ipv4Addr::from_str(core::str::from_utf8(field_text).ok()?).ok()?;

    Some((field, address))
}

/// Parses a `+CIPSTAMAC_CUR:"aa:bb:cc:dd:ee:ff"` style line
pub(crate) fn parse_mac_line(line: &[u8]) -> Option<String<17>> {
    if !line.starts_with(b"+CIP") {
        return None;
    }

    let colon = line.iter().position(|&byte| byte == b':')?;
    let mut rest = &line[colon + 1..];
    let field = take_quoted(&mut rest).unwrap_or(rest);
    to_mac(field)
}

/// Parses the `+<millis>` payload line of a ping reply
pub(crate) fn parse_ping_time(line: &[u8]) -> Option<u32> {
    let mut rest = line.strip_prefix(b"+")?;
    let time = u32::try_from(take_number(&mut rest)?).ok()?;
    if rest.is_empty() {
        Some(time)
    } else {
        None
    }
}

/// Parses the step number of a `+CIPUPDATE:<step>` progress line
pub(crate) fn parse_update_step(line: &[u8]) -> Option<u8> {
    let mut rest = line.strip_prefix(b"+CIPUPDATE:")?;
    u8::try_from(take_number(&mut rest)?).ok()
}

/// Parses the failure code of a `+CWJAP:<code>` line
pub(crate) fn parse_join_failure_code(line: &[u8]) -> Option<u8> {
    let mut rest = line.strip_prefix(b"+CWJAP:")?;
    u8::try_from(take_number(&mut rest)?).ok()
}

fn strip_any<'a>(line: &'a [u8], prefixes: &[&[u8]]) -> Option<&'a [u8]> {
    prefixes.iter().find_map(|prefix| line.strip_prefix(*prefix))
}

/// Takes a quoted field. The closing quote must be followed by a separator
/// or the end of the line, so quote characters inside SSIDs survive.
fn take_quoted<'a>(rest: &mut &'a [u8]) -> Option<&'a [u8]> {
    let inner = rest.strip_prefix(b"\"")?;

    let mut end = None;
    for (index, &byte) in inner.iter().enumerate() {
        if byte != b'"' {
            continue;
        }
        match inner.get(index + 1) {
            None | Some(b',') | Some(b')') => {
                end = Some(index);
                break;
            }
            _ => {}
        }
    }

    let end = end?;
    *rest = &inner[end + 1..];
    Some(&inner[..end])
}

/// Takes a decimal number with optional sign
fn take_number(rest: &mut &[u8]) -> Option<i32> {
    let (negative, digits) = match rest.strip_prefix(b"-") {
        Some(stripped) => (true, stripped),
        None => (false, *rest),
    };

    let end = digits
        .iter()
        .position(|byte| !byte.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let mut value: i32 = 0;
    for &digit in &digits[..end] {
        value = value.checked_mul(10)?.checked_add((digit - b'0') as i32)?;
    }

    *rest = &digits[end..];
    Some(if negative { -value } else { value })
}

fn take_comma(rest: &mut &[u8]) {
    if let Some(stripped) = rest.strip_prefix(b",") {
        *rest = stripped;
    }
}

fn to_string<const N: usize>(field: &[u8]) -> Option<String<N>> {
    String::try_from(core::str::from_utf8(field).ok()?).ok()
}

/// Validates `aa:bb:cc:dd:ee:ff` notation
fn to_mac(field: &[u8]) -> Option<String<17>> {
    if field.len() != 17 {
        return None;
    }

    for (index, &byte) in field.iter().enumerate() {
        if index % 3 == 2 {
            if byte != b':' {
                return None;
            }
        } else if !byte.is_ascii_hexdigit() {
            return None;
        }
    }

    to_string::<17>(field)
}
