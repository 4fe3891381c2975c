//! This module provides the session for an instrument controlled via a raw TCP/IP socket.
//!
//! Most network-enabled SCPI instruments listen on a plain socket (often port 5025) and speak
//! newline terminated SCPI over it. In VISA terms these are `TCPIP::<host>::<port>::SOCKET`
//! resources.

use std::{
    net::{TcpStream, ToSocketAddrs},
    time::Duration,
};

use crate::{Instrument, ScpiError, Session};

/// A blocking TCP/IP implementation using the [`std::net::TcpStream`] struct.
#[derive(Debug)]
pub struct TcpIpInstrument {}

impl TcpIpInstrument {
    /// Try to create a new session to a raw socket.
    ///
    /// All resolved addresses are tried in order, each with the given timeout for connecting. The
    /// same timeout is then applied to reading and writing, as we never want to block
    /// indefinitely while talking to an instrument.
    ///
    /// # Arguments
    /// * `sock_addr` - Socket address.
    /// * `timeout` - Timeout for connecting, reading, and writing.
    pub fn try_new<A: ToSocketAddrs + std::fmt::Debug>(
        sock_addr: A,
        timeout: Duration,
    ) -> Result<Instrument<TcpStream>, ScpiError> {
        let address = format!("{sock_addr:?}");
        let addrs = sock_addr
            .to_socket_addrs()
            .map_err(|source| ScpiError::Connect {
                address: address.clone(),
                source,
            })?;

        let mut last_err = std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "address did not resolve to any socket address",
        );
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout.max(Duration::from_millis(1))) {
                Ok(stream) => {
                    log::debug!("Connected to {addr}");
                    stream.set_nodelay(true)?;
                    let mut instrument = Instrument::new(stream, timeout);
                    instrument.set_timeout(timeout)?;
                    return Ok(instrument);
                }
                Err(err) => {
                    log::debug!("Connecting to {addr} failed: {err}");
                    last_err = err;
                }
            }
        }
        Err(ScpiError::Connect {
            address,
            source: last_err,
        })
    }
}
