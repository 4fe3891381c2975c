//! A resource manager that works without any vendor VISA runtime.
//!
//! Raw sockets (`TCPIP::<host>::<port>::SOCKET`) are always supported, serial ports
//! (`ASRL<port>::INSTR`) when the `serial` feature is enabled. All other resource types need a
//! VISA runtime and are reported as [`ScpiError::UnsupportedResource`].

use std::{net::TcpStream, time::Duration};

use crate::{
    Instrument, ResourceAddress, ResourceManager, ScpiConfig, ScpiError, Session, TcpIpInstrument,
};

/// Resource manager for TCP/IP sockets and serial ports.
///
/// Sockets cannot be discovered, so addresses that should show up in
/// [`ResourceManager::list_resources`] need to be registered with
/// [`NativeResourceManager::with_resources`]. Serial ports are enumerated automatically if the
/// `serial` feature is enabled.
#[derive(Clone, Debug)]
pub struct NativeResourceManager {
    resources: Vec<String>,
    connect_timeout: Duration,
    #[cfg_attr(not(feature = "serial"), allow(dead_code))]
    baud_rate: u32,
}

impl Default for NativeResourceManager {
    fn default() -> Self {
        Self::from_config(&ScpiConfig::default())
    }
}

impl NativeResourceManager {
    /// Create a new manager with default settings and no registered resources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new manager that uses the timeout and baud rate of the given configuration.
    pub fn from_config(config: &ScpiConfig) -> Self {
        Self {
            resources: Vec::new(),
            connect_timeout: config.timeout,
            baud_rate: config.serial_baud_rate,
        }
    }

    /// Register resource addresses that are listed by this manager.
    ///
    /// Addresses are not validated here. Invalid addresses show up as failures when they are
    /// opened.
    pub fn with_resources<I, S>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resources.extend(resources.into_iter().map(Into::into));
        self
    }

    /// Set the timeout for establishing connections.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl ResourceManager for NativeResourceManager {
    type Session = NativeSession;

    fn list_resources(&self) -> Result<Vec<String>, ScpiError> {
        #[allow(unused_mut)]
        let mut resources = self.resources.clone();
        #[cfg(feature = "serial")]
        {
            for port in crate::SerialInstrument::available_resources()? {
                if !resources.contains(&port) {
                    resources.push(port);
                }
            }
        }
        Ok(resources)
    }

    fn open(&self, address: &str) -> Result<Self::Session, ScpiError> {
        match address.parse::<ResourceAddress>()? {
            ResourceAddress::TcpIpSocket { host, port, .. } => {
                let instrument = TcpIpInstrument::try_new((host.as_str(), port), self.connect_timeout)
                    .map_err(|err| match err {
                        ScpiError::Connect { source, .. } => ScpiError::Connect {
                            address: address.to_string(),
                            source,
                        },
                        other => other,
                    })?;
                Ok(NativeSession::TcpIp(instrument))
            }
            #[cfg(feature = "serial")]
            ResourceAddress::Serial { port } => {
                let path = crate::SerialInstrument::port_name(&port);
                Ok(NativeSession::Serial(crate::SerialInstrument::try_new(
                    &path,
                    self.baud_rate,
                    self.connect_timeout,
                )?))
            }
            _ => Err(ScpiError::UnsupportedResource(address.to_string())),
        }
    }
}

/// A session opened by the [`NativeResourceManager`].
pub enum NativeSession {
    /// A raw TCP/IP socket.
    TcpIp(Instrument<TcpStream>),
    /// A serial port.
    #[cfg(feature = "serial")]
    Serial(Instrument<Box<dyn serialport::SerialPort>>),
}

impl NativeSession {
    fn inner(&self) -> &dyn Session {
        match self {
            NativeSession::TcpIp(inst) => inst,
            #[cfg(feature = "serial")]
            NativeSession::Serial(inst) => inst,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Session {
        match self {
            NativeSession::TcpIp(inst) => inst,
            #[cfg(feature = "serial")]
            NativeSession::Serial(inst) => inst,
        }
    }
}

impl Session for NativeSession {
    fn write_raw(&mut self, data: &[u8]) -> Result<(), ScpiError> {
        self.inner_mut().write_raw(data)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), ScpiError> {
        self.inner_mut().read_exact(buf)
    }

    fn get_terminator(&self) -> &str {
        self.inner().get_terminator()
    }

    fn set_terminator(&mut self, terminator: &str) {
        self.inner_mut().set_terminator(terminator);
    }

    fn get_timeout(&self) -> Duration {
        self.inner().get_timeout()
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), ScpiError> {
        self.inner_mut().set_timeout(timeout)
    }
}
