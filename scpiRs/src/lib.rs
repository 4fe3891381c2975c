//! ScpiRs: Find and talk to your SCPI instruments from Rust
//!
//! The ScpiRs library is a small convenience layer for lab equipment that speaks SCPI, e.g.,
//! oscilloscopes, spectrum analyzers, or power supplies, and that is reachable by a VISA resource
//! address such as `TCPIP0::192.168.0.10::5025::SOCKET` or `GPIB0::12::INSTR`.
//!
//! The entry point is [`Scpi`], which offers three operations:
//!
//! - [`Scpi::search`]: enumerate all visible resources and ask each one for its identification.
//! - [`Scpi::execute`]: send a single command or query to a device.
//! - [`Scpi::query_full_response`]: send a query and keep reading response chunks until a
//!   [`Termination`] condition is met.
//!
//! Every operation opens a [`Session`] to the device, performs one interaction, and drops the
//! session again, no matter if the interaction succeeded or not. No connection is kept around
//! between calls.
//!
//! # Resource managers
//!
//! Resources are enumerated and opened by a [`ResourceManager`]. The following are provided:
//!
//! - [`NativeResourceManager`]: raw TCP/IP sockets and (with the `serial` feature) serial ports,
//!   without any vendor runtime.
//! - `VisaResourceManager` (with the `visa` feature): loads the system VISA library at run time
//!   and can therefore talk to everything VISA can talk to (GPIB, USB-TMC, VXI-11, ...).
//! - [`LoopbackResourceManager`]: a scripted in-memory manager to test code that uses [`Scpi`].
//!
//! # Errors
//!
//! Sessions and managers return [`ScpiError`]. The public operations of [`Scpi`] classify these
//! into an [`ErrorKind`], which maps to a VISA status code, and return it instead of the error.
//!
//! # License
//!
//!
//! Licensed under either of
//!
//! - Apache License, Version 2.0 ([LICENSE-APACHE](http://www.apache.org/licenses/LICENSE-2.0))
//! - MIT license ([LICENSE-MIT](http://opensource.org/licenses/MIT))
//!
//! at your option.
//!
//! # Contribution
//!
//! Unless you explicitly state otherwise, any contribution intentionally submitted
//! for inclusion in the work by you, as defined in the Apache-2.0 license, shall be
//! dual licensed as above, without any additional terms or conditions.

#![warn(missing_docs)]

mod address;
mod config;
mod error;
mod instrument;
mod loopback;
mod native;
mod scpi;
#[cfg(feature = "serial")]
mod serial;
mod tcp_ip;
#[cfg(feature = "visa")]
mod visa;

pub use address::ResourceAddress;
pub use config::ScpiConfig;
pub use error::*;
pub use instrument::{Instrument, Port};
pub use loopback::{LoopbackDevice, LoopbackResourceManager, LoopbackSession};
pub use native::{NativeResourceManager, NativeSession};
pub use scpi::{Execution, Scpi, SearchEntry, Termination};
#[cfg(feature = "serial")]
pub use serial::SerialInstrument;
pub use tcp_ip::TcpIpInstrument;
#[cfg(feature = "visa")]
pub use visa::{VisaResourceManager, VisaSession};

use std::time::{Duration, Instant};

/// The `Session` trait defines an open connection to one resource.
///
/// Implementors only need to provide the raw byte primitives [`Session::write_raw`] and
/// [`Session::read_exact`] as well as the terminator and timeout accessors. Messages, reading
/// until the terminator, and queries are built on top of these. Transports that natively read
/// whole messages (like VISA) can override [`Session::read`].
///
/// A session releases its connection when it is dropped.
pub trait Session {
    /// Write raw bytes to the resource and flush them.
    ///
    /// # Arguments:
    /// - `_data` - The bytes to write, including any terminator.
    fn write_raw(&mut self, _data: &[u8]) -> Result<(), ScpiError> {
        Err(ScpiError::InterfaceCommandNotSupported)
    }

    /// Read exactly as many bytes from the resource as fit into `_buf`.
    fn read_exact(&mut self, _buf: &mut [u8]) -> Result<(), ScpiError> {
        Err(ScpiError::InterfaceCommandNotSupported)
    }

    /// Get the current terminator.
    fn get_terminator(&self) -> &str {
        "\n"
    }

    /// Set the terminator of a session from a `&str`.
    ///
    /// # Arguments:
    /// - `_terminator` - A string slice that will be used as the terminator for messages.
    fn set_terminator(&mut self, _terminator: &str) {}

    /// Get the current I/O timeout of the session.
    fn get_timeout(&self) -> Duration {
        Duration::from_secs(3)
    }

    /// Set the I/O timeout of the session.
    fn set_timeout(&mut self, _timeout: Duration) -> Result<(), ScpiError> {
        Err(ScpiError::InterfaceCommandNotSupported)
    }

    /// Send a message to the resource.
    ///
    /// The terminator is appended to the message before it is written.
    fn write(&mut self, cmd: &str) -> Result<(), ScpiError> {
        log::debug!("write: {cmd:?}");
        let cmd = format!("{cmd}{}", self.get_terminator());
        self.write_raw(cmd.as_bytes())
    }

    /// Read byte by byte until the received data ends with the terminator.
    ///
    /// The terminator is stripped from the returned string. If the timeout passes before a
    /// terminator is seen, [`ScpiError::Timeout`] is returned. Invalid UTF-8 is replaced.
    fn read_until_terminator(&mut self) -> Result<String, ScpiError> {
        let terminator = self.get_terminator().as_bytes().to_vec();
        let timeout = self.get_timeout();
        let mut response = Vec::new();
        let mut single_buf = [0u8];

        let tic = Instant::now();
        while tic.elapsed() < timeout {
            self.read_exact(&mut single_buf)?;
            response.extend_from_slice(&single_buf);
            if response.ends_with(&terminator) {
                response.truncate(response.len() - terminator.len());
                return Ok(bytes_to_string(response));
            }
        }
        Err(ScpiError::Timeout(timeout))
    }

    /// Read one message from the resource, without its terminator.
    fn read(&mut self) -> Result<String, ScpiError> {
        let msg = self.read_until_terminator()?;
        log::debug!("read: {msg:?}");
        Ok(msg)
    }

    /// Send a query and return the response.
    ///
    /// A timeout while reading is reported as [`ScpiError::TimeoutQuery`], containing the query.
    fn query(&mut self, cmd: &str) -> Result<String, ScpiError> {
        self.write(cmd)?;
        match self.read() {
            Err(ScpiError::Timeout(timeout)) => Err(ScpiError::TimeoutQuery {
                query: cmd.to_string(),
                timeout,
            }),
            other => other,
        }
    }
}

/// The `ResourceManager` trait enumerates and opens resources by their address.
pub trait ResourceManager {
    /// The session type that is returned when opening a resource.
    type Session: Session;

    /// List the addresses of all resources this manager can see.
    fn list_resources(&self) -> Result<Vec<String>, ScpiError>;

    /// Open a session to the resource at `address`.
    ///
    /// The session is closed again when the returned value is dropped.
    fn open(&self, address: &str) -> Result<Self::Session, ScpiError>;
}

/// Convert received bytes into a string, replacing invalid UTF-8.
pub(crate) fn bytes_to_string(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(err) => {
            log::warn!("Received invalid UTF-8 data: {:?}", err.as_bytes());
            String::from_utf8_lossy(err.as_bytes()).into_owned()
        }
    }
}
