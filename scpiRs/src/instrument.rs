//! This module provides a general [`Session`] implementation for byte streams.
//!
//! It can be used with any type that implements [`Port`], i.e., [`std::io::Read`] and
//! [`std::io::Write`] plus a way to apply the session timeout, such as [`std::net::TcpStream`] or
//! a boxed [`serialport::SerialPort`].

use std::{collections::VecDeque, io, net::TcpStream, time::Duration};

use crate::{ScpiError, Session};

/// A byte stream that a [`Instrument`] session can be built on.
///
/// Next to reading and writing, the port gets a chance to apply the session timeout to the
/// underlying transport. The default implementation does nothing, which is fine for in-memory
/// ports.
pub trait Port: io::Read + io::Write {
    /// Apply the session timeout to the transport.
    fn set_port_timeout(&mut self, _timeout: Duration) -> io::Result<()> {
        Ok(())
    }
}

impl Port for TcpStream {
    fn set_port_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        // A zero duration is rejected by the socket, use the smallest possible timeout instead.
        let timeout = timeout.max(Duration::from_millis(1));
        self.set_read_timeout(Some(timeout))?;
        self.set_write_timeout(Some(timeout))
    }
}

impl Port for VecDeque<u8> {}

#[cfg(feature = "serial")]
impl Port for Box<dyn serialport::SerialPort> {
    fn set_port_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.set_timeout(timeout).map_err(io::Error::from)
    }
}

/// A general session that can be built on any [`Port`].
///
/// The [`crate::TcpIpInstrument`] and [`crate::SerialInstrument`] shortcuts return this type, but
/// it can just as well be used with your own transport.
///
/// # Example
///
/// ```no_run
/// use std::{net::TcpStream, time::Duration};
///
/// use scpirs::{Instrument, Session};
///
/// let stream = TcpStream::connect("192.168.0.10:5025").unwrap();
/// let mut session = Instrument::new(stream, Duration::from_secs(3));
/// println!("{}", session.query("*IDN?").unwrap());
/// ```
pub struct Instrument<P: Port> {
    port: P,
    terminator: String,
    timeout: Duration,
}

impl<P: Port> Instrument<P> {
    /// Create a new [`Instrument`] session on the given port.
    ///
    /// The terminator defaults to `"\n"`. The timeout is only stored here, call
    /// [`Session::set_timeout`] to also apply it to the port.
    pub fn new(port: P, timeout: Duration) -> Self {
        Self {
            port,
            terminator: "\n".to_string(),
            timeout,
        }
    }

    /// Timeouts and connections closed by the peer get their own error, all else is I/O.
    fn port_error(&self, err: io::Error) -> ScpiError {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ScpiError::Timeout(self.timeout),
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::NotConnected => {
                log::debug!("Connection closed: {err}");
                ScpiError::InvalidSession
            }
            _ => err.into(),
        }
    }
}

impl<P: Port> Session for Instrument<P> {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), ScpiError> {
        self.port
            .read_exact(buf)
            .map_err(|err| self.port_error(err))
    }

    fn get_terminator(&self) -> &str {
        self.terminator.as_str()
    }

    fn set_terminator(&mut self, terminator: &str) {
        self.terminator = terminator.to_string();
    }

    fn get_timeout(&self) -> Duration {
        self.timeout
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), ScpiError> {
        self.port.set_port_timeout(timeout)?;
        self.timeout = timeout;
        Ok(())
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), ScpiError> {
        let written = self.port.write_all(data);
        written
            .and_then(|()| self.port.flush())
            .map_err(|err| self.port_error(err))
    }
}
