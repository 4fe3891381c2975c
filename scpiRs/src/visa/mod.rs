//! Resource manager backed by the system VISA library.
//!
//! The library is loaded at run time, so the crate builds without any VISA installation. Only
//! creating a [`VisaResourceManager`] fails if no VISA runtime can be found.

mod visa_sys;

use std::{sync::Arc, time::Duration};

use crate::{ResourceManager, ScpiError, Session, bytes_to_string};

use visa_sys::{
    VI_ATTR_TERMCHAR, VI_ATTR_TERMCHAR_EN, VI_ATTR_TMO_VALUE, VI_SUCCESS_MAX_CNT, Visa, ViSession,
};

const READ_CHUNK: usize = 4096;

/// Resource manager that talks to instruments through an installed VISA runtime.
///
/// This gives access to all transports the runtime supports, e.g., GPIB, USB-TMC, VXI-11, HiSLIP,
/// raw sockets, and serial ports.
pub struct VisaResourceManager {
    visa: Arc<Visa>,
    query: String,
}

impl VisaResourceManager {
    /// Load the platform's default VISA library and open the default resource manager.
    pub fn new() -> Result<Self, ScpiError> {
        Self::with_library(Visa::default_library())
    }

    /// Load the VISA library from the given path or name.
    pub fn with_library(library: &str) -> Result<Self, ScpiError> {
        Ok(Self {
            visa: Arc::new(Visa::load(library)?),
            query: "?*::INSTR".to_string(),
        })
    }

    /// Set the expression used to find resources, the default is `"?*::INSTR"`.
    pub fn with_query(mut self, query: &str) -> Self {
        self.query = query.to_string();
        self
    }
}

impl ResourceManager for VisaResourceManager {
    type Session = VisaSession;

    fn list_resources(&self) -> Result<Vec<String>, ScpiError> {
        self.visa.find_resources(&self.query)
    }

    fn open(&self, address: &str) -> Result<Self::Session, ScpiError> {
        let vi = self.visa.open(address)?;
        log::debug!("Opened VISA session {vi} to {address}");
        Ok(VisaSession {
            visa: Arc::clone(&self.visa),
            vi,
            terminator: "\n".to_string(),
            timeout: Duration::from_secs(2),
        })
    }
}

/// An open VISA session. The session is closed when dropped.
pub struct VisaSession {
    visa: Arc<Visa>,
    vi: ViSession,
    terminator: String,
    timeout: Duration,
}

impl Session for VisaSession {
    fn write_raw(&mut self, data: &[u8]) -> Result<(), ScpiError> {
        self.visa.write(self.vi, data)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), ScpiError> {
        let (visa, vi) = (&self.visa, self.vi);
        fill_buffer(buf, |chunk| visa.read(vi, chunk).map(|(count, _)| count))
    }

    fn get_terminator(&self) -> &str {
        self.terminator.as_str()
    }

    /// Sets the terminator and lets VISA end reads on its last character.
    fn set_terminator(&mut self, terminator: &str) {
        self.terminator = terminator.to_string();
        let result = match terminator.as_bytes().last() {
            Some(&termchar) => self
                .visa
                .set_attribute(self.vi, VI_ATTR_TERMCHAR, termchar.into())
                .and_then(|_| self.visa.set_attribute(self.vi, VI_ATTR_TERMCHAR_EN, 1)),
            None => self.visa.set_attribute(self.vi, VI_ATTR_TERMCHAR_EN, 0),
        };
        if let Err(err) = result {
            log::warn!("Could not set termination character: {err}");
        }
    }

    fn get_timeout(&self) -> Duration {
        self.timeout
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), ScpiError> {
        let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.visa.set_attribute(self.vi, VI_ATTR_TMO_VALUE, millis)?;
        self.timeout = timeout;
        Ok(())
    }

    /// Read one message, i.e., until VISA reports the end of the message.
    fn read(&mut self) -> Result<String, ScpiError> {
        let mut response = Vec::new();
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            let (count, status) = self.visa.read(self.vi, &mut buf)?;
            response.extend_from_slice(&buf[..count]);
            if status != VI_SUCCESS_MAX_CNT {
                break;
            }
        }
        if response.ends_with(self.terminator.as_bytes()) {
            response.truncate(response.len() - self.terminator.len());
        }
        let msg = bytes_to_string(response);
        log::debug!("read: {msg:?}");
        Ok(msg)
    }
}

/// Fill `buf` with repeated reads. A read that returns no data ends with an `UnexpectedEof` error.
fn fill_buffer<F>(buf: &mut [u8], mut read: F) -> Result<(), ScpiError>
where
    F: FnMut(&mut [u8]) -> Result<usize, ScpiError>,
{
    let mut offset = 0;
    while offset < buf.len() {
        let count = read(&mut buf[offset..])?;
        if count == 0 {
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }
        offset += count;
    }
    Ok(())
}

impl Drop for VisaSession {
    fn drop(&mut self) {
        log::debug!("Closing VISA session {}", self.vi);
        self.visa.close(self.vi);
    }
}
