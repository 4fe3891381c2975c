//! This module provides the session for an instrument controlled via a serial port.
//!
//! It includes a blocking implementation using the `serialport` crate. In VISA terms, serial
//! ports are `ASRL<port>::INSTR` resources.

use std::time::Duration;

use serialport::SerialPort;

use crate::{Instrument, ScpiError, Session};

/// A blocking serial port implementation using the `serialport` crate.
#[derive(Debug)]
pub struct SerialInstrument {}

impl SerialInstrument {
    /// Try to open a serial port and create a session on it.
    ///
    /// The port is opened with 8 data bits, no parity, and one stop bit, which is what the vast
    /// majority of SCPI instruments use.
    ///
    /// # Arguments
    /// * `path` - The port name, e.g., `"/dev/ttyUSB0"` or `"COM3"`.
    /// * `baud_rate` - The baud rate to open the port with.
    /// * `timeout` - The read and write timeout.
    pub fn try_new(
        path: &str,
        baud_rate: u32,
        timeout: Duration,
    ) -> Result<Instrument<Box<dyn SerialPort>>, ScpiError> {
        let port = serialport::new(path, baud_rate).timeout(timeout).open()?;
        log::debug!("Opened serial port {path} at {baud_rate} baud");
        let mut instrument = Instrument::new(port, timeout);
        instrument.set_timeout(timeout)?;
        Ok(instrument)
    }

    /// List the available serial ports as VISA resource addresses.
    pub fn available_resources() -> Result<Vec<String>, ScpiError> {
        Ok(serialport::available_ports()?
            .into_iter()
            .map(|port| format!("ASRL{}::INSTR", port.port_name))
            .collect())
    }

    /// Translate the port part of an `ASRL` address into a port name.
    ///
    /// Numbered ports follow the VISA convention: `ASRL1` is `COM1` on Windows and `/dev/ttyS0`
    /// everywhere else. Anything that is not a number is taken as the port name itself.
    pub fn port_name(port: &str) -> String {
        match port.parse::<u32>() {
            Ok(num) if cfg!(windows) => format!("COM{num}"),
            Ok(num) => format!("/dev/ttyS{}", num.saturating_sub(1)),
            Err(_) => port.to_string(),
        }
    }
}
