//! Parsing of VISA resource addresses.
//!
//! Addresses are strings of `::` separated parts, e.g. `TCPIP0::192.168.0.10::5025::SOCKET`. The
//! interface prefix (`TCPIP`, `ASRL`, `GPIB`, `USB`) is matched case-insensitively and may be
//! followed by a board number. The resource class (`INSTR`, `SOCKET`) is the last part. IPv6
//! hosts are enclosed in brackets, e.g. `TCPIP0::[fe80::1]::5025::SOCKET`.

use std::{fmt, str::FromStr};

use crate::ScpiError;

/// A parsed VISA resource address.
///
/// [`Display`](fmt::Display) writes the canonical form, which parses back to the same value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResourceAddress {
    /// A raw socket, `TCPIP[board]::host::port::SOCKET`.
    TcpIpSocket {
        /// Board number.
        board: u16,
        /// Host name or IP address, IPv6 addresses without brackets.
        host: String,
        /// TCP port.
        port: u16,
    },
    /// A VXI-11 or HiSLIP instrument, `TCPIP[board]::host[::device]::INSTR`.
    TcpIpInstr {
        /// Board number.
        board: u16,
        /// Host name or IP address, IPv6 addresses without brackets.
        host: String,
        /// LAN device name, e.g. `inst0` or `hislip0`.
        device: Option<String>,
    },
    /// A serial port, `ASRL<port>::INSTR`.
    Serial {
        /// Port number or port name.
        port: String,
    },
    /// A GPIB instrument, `GPIB[board]::primary[::secondary]::INSTR`.
    Gpib {
        /// Board number.
        board: u16,
        /// Primary address.
        primary: u8,
        /// Secondary address.
        secondary: Option<u8>,
    },
    /// A USB-TMC instrument, `USB[board]::vid::pid::serial[::interface]::INSTR`.
    Usb {
        /// Board number.
        board: u16,
        /// Manufacturer ID.
        vendor_id: u16,
        /// Model code.
        product_id: u16,
        /// Serial number.
        serial: String,
        /// USB interface number.
        interface: Option<u8>,
    },
}

impl FromStr for ResourceAddress {
    type Err = ScpiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ScpiError::InvalidAddress(s.to_string());

        let mut parts = split_parts(s.trim()).ok_or_else(invalid)?;
        let class = match parts.last().map(|p| p.to_uppercase()) {
            Some(c) if c == "INSTR" || c == "SOCKET" => {
                parts.pop();
                Some(c)
            }
            _ => None,
        };
        if parts.is_empty() {
            return Err(invalid());
        }
        let head = parts.remove(0);
        let upper = head.to_uppercase();

        if let Some(board) = upper.strip_prefix("TCPIP") {
            let board = parse_board(board).ok_or_else(invalid)?;
            match (class.as_deref(), parts.as_slice()) {
                (Some("SOCKET"), [host, port]) => {
                    Ok(ResourceAddress::TcpIpSocket {
                        board,
                        host: parse_host(host).ok_or_else(invalid)?,
                        port: port.parse().map_err(|_| invalid())?,
                    })
                }
                (Some("INSTR") | None, [host]) => {
                    Ok(ResourceAddress::TcpIpInstr {
                        board,
                        host: parse_host(host).ok_or_else(invalid)?,
                        device: None,
                    })
                }
                (Some("INSTR") | None, [host, device]) => {
                    Ok(ResourceAddress::TcpIpInstr {
                        board,
                        host: parse_host(host).ok_or_else(invalid)?,
                        device: Some(device.to_string()),
                    })
                }
                _ => Err(invalid()),
            }
        } else if upper.starts_with("ASRL") {
            let port = head.get(4..).ok_or_else(invalid)?;
            if port.is_empty() || !parts.is_empty() || class.as_deref() == Some("SOCKET") {
                return Err(invalid());
            }
            Ok(ResourceAddress::Serial {
                port: port.to_string(),
            })
        } else if let Some(board) = upper.strip_prefix("GPIB") {
            let board = parse_board(board).ok_or_else(invalid)?;
            if class.as_deref() == Some("SOCKET") {
                return Err(invalid());
            }
            let (primary, secondary) = match parts.as_slice() {
                [primary] => (primary.parse().map_err(|_| invalid())?, None),
                [primary, secondary] => (
                    primary.parse().map_err(|_| invalid())?,
                    Some(secondary.parse().map_err(|_| invalid())?),
                ),
                _ => return Err(invalid()),
            };
            Ok(ResourceAddress::Gpib {
                board,
                primary,
                secondary,
            })
        } else if let Some(board) = upper.strip_prefix("USB") {
            let board = parse_board(board).ok_or_else(invalid)?;
            if class.as_deref() == Some("SOCKET") {
                return Err(invalid());
            }
            let (vid, pid, serial, interface) = match parts.as_slice() {
                [vid, pid, serial] => (vid, pid, serial, None),
                [vid, pid, serial, interface] => (
                    vid,
                    pid,
                    serial,
                    Some(interface.parse().map_err(|_| invalid())?),
                ),
                _ => return Err(invalid()),
            };
            Ok(ResourceAddress::Usb {
                board,
                vendor_id: parse_id(vid).ok_or_else(invalid)?,
                product_id: parse_id(pid).ok_or_else(invalid)?,
                serial: serial.to_string(),
                interface,
            })
        } else {
            Err(invalid())
        }
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceAddress::TcpIpSocket { board, host, port } => {
                write!(f, "TCPIP{board}::{}::{port}::SOCKET", HostDisplay(host))
            }
            ResourceAddress::TcpIpInstr {
                board,
                host,
                device,
            } => {
                let host = HostDisplay(host);
                match device {
                    Some(device) => write!(f, "TCPIP{board}::{host}::{device}::INSTR"),
                    None => write!(f, "TCPIP{board}::{host}::INSTR"),
                }
            }
            ResourceAddress::Serial { port } => write!(f, "ASRL{port}::INSTR"),
            ResourceAddress::Gpib {
                board,
                primary,
                secondary,
            } => match secondary {
                Some(secondary) => write!(f, "GPIB{board}::{primary}::{secondary}::INSTR"),
                None => write!(f, "GPIB{board}::{primary}::INSTR"),
            },
            ResourceAddress::Usb {
                board,
                vendor_id,
                product_id,
                serial,
                interface,
            } => {
                write!(
                    f,
                    "USB{board}::0x{vendor_id:04X}::0x{product_id:04X}::{serial}"
                )?;
                if let Some(interface) = interface {
                    write!(f, "::{interface}")?;
                }
                write!(f, "::INSTR")
            }
        }
    }
}

/// Writes IPv6 hosts in brackets.
struct HostDisplay<'a>(&'a str);

impl fmt::Display for HostDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.contains(':') {
            write!(f, "[{}]", self.0)
        } else {
            f.write_str(self.0)
        }
    }
}

/// Split an address at `::`, keeping bracketed parts like `[::1]` in one piece.
///
/// Returns `None` for an unclosed bracket or a bracketed part that is not followed by `::`.
fn split_parts(s: &str) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut rest = s;
    loop {
        if rest.starts_with('[') {
            let end = rest.find(']')? + 1;
            parts.push(&rest[..end]);
            rest = &rest[end..];
            if rest.is_empty() {
                return Some(parts);
            }
            rest = rest.strip_prefix("::")?;
        } else {
            match rest.split_once("::") {
                Some((part, tail)) => {
                    parts.push(part);
                    rest = tail;
                }
                None => {
                    parts.push(rest);
                    return Some(parts);
                }
            }
        }
    }
}

/// Host names must not be empty. Brackets around IPv6 addresses are removed.
fn parse_host(host: &str) -> Option<String> {
    let host = match host.strip_prefix('[') {
        Some(inner) => inner.strip_suffix(']')?,
        None if host.contains(']') => return None,
        None => host,
    };
    if host.is_empty() || host.contains(['[', ']']) {
        None
    } else {
        Some(host.to_string())
    }
}

/// Board numbers are optional and default to zero.
fn parse_board(board: &str) -> Option<u16> {
    if board.is_empty() {
        Some(0)
    } else {
        board.parse().ok()
    }
}

/// USB IDs are given either in hex with `0x` prefix or in decimal.
fn parse_id(id: &str) -> Option<u16> {
    match id.strip_prefix("0x").or_else(|| id.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16).ok(),
        None => id.parse().ok(),
    }
}
