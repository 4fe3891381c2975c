//! Errors returned by sessions and resource managers, and their classification into VISA status
//! codes.
//!
//! Sessions and managers return the rich [`ScpiError`], which keeps the underlying cause (an
//! [`std::io::Error`], a raw VISA status, ...) around. The public operations on [`crate::Scpi`]
//! never hand those out. Instead, every failure is run through [`classify_error`] and surfaces as
//! an [`ErrorKind`], which maps one-to-one onto a VISA status code.

use std::time::Duration;

use thiserror::Error;

/// Operation completed successfully.
pub const VI_SUCCESS: i32 = 0;
/// Timeout expired before operation completed.
pub const VI_ERROR_TMO: i32 = 0xBFFF_0015_u32 as i32;
/// The given session or object reference is invalid.
pub const VI_ERROR_INV_SESSION: i32 = 0xBFFF_000E_u32 as i32;
/// Insufficient location information or the requested device or resource is not present.
pub const VI_ERROR_RSRC_NFOUND: i32 = 0xBFFF_0011_u32 as i32;
/// Could not perform operation because of I/O error.
pub const VI_ERROR_IO: i32 = 0xBFFF_003E_u32 as i32;
/// Invalid resource reference specified. Parsing error.
pub const VI_ERROR_INV_RSRC_NAME: i32 = 0xBFFF_0012_u32 as i32;
/// Operation not supported by this resource.
pub const VI_ERROR_NSUP_OPER: i32 = 0xBFFF_0067_u32 as i32;
/// Could not find or load the VISA library.
pub const VI_ERROR_LIBRARY_NFOUND: i32 = 0xBFFF_009E_u32 as i32;

/// The error enum for everything that talks to a resource.
///
/// Session and manager implementations return this error such that all failures propagate with
/// the `?` operator. Use [`ScpiError::kind`] (or [`classify_error`], which also logs) to get the
/// VISA classification of an error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScpiError {
    /// Opening a connection to the resource failed. The error contains the address that was
    /// tried and the underlying I/O error.
    #[error("Could not connect to resource {address}: {source}")]
    Connect {
        /// The resource address that could not be reached.
        address: String,
        /// The I/O error returned while connecting.
        source: std::io::Error,
    },
    /// The called command is not supported by this session.
    #[error("This command is not supported by this session.")]
    InterfaceCommandNotSupported,
    /// The resource address could not be parsed.
    #[error("Invalid resource address: {0}")]
    InvalidAddress(String),
    /// The session is closed, e.g., the connection was closed by the instrument.
    #[error("The session is invalid.")]
    InvalidSession,
    /// Error when reading from/writing to an interface. See [`std::io::Error`] for more details.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The VISA runtime library could not be loaded.
    #[cfg(feature = "visa")]
    #[error("Could not load the VISA library: {0}")]
    Library(String),
    /// No resource with the given address is known to the resource manager.
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),
    #[cfg(feature = "serial")]
    /// Serial port errors can occur when opening or enumerating serial interfaces. See the
    /// [`serialport::Error`] documentation for more information.
    #[error(transparent)]
    Serialport(#[from] serialport::Error),
    /// A raw status code as reported by the transport, together with its description.
    #[error("VISA status {code:#010X}: {description}")]
    Status {
        /// The VISA status code.
        code: i32,
        /// Human readable description of the code.
        description: String,
    },
    /// Timeout occurred while waiting for a response from the instrument. The error contains the
    /// timeout that was exceeded.
    #[error(
        "Timeout occured while waiting for a response from the instrument. Timeout was set to {0:?}."
    )]
    Timeout(Duration),
    /// Timeout occurred while waiting for a response to a query. The error contains the query
    /// that was sent and the timeout that was exceeded.
    #[error(
        "Timeout occured while waiting for a response to query: {query}. Timeout was set to {timeout:?}."
    )]
    TimeoutQuery {
        /// The query that timed out.
        query: String,
        /// The timeout that was set.
        timeout: Duration,
    },
    /// The address is valid, but this resource manager cannot talk to this kind of resource.
    #[error("Resource type is not supported by this resource manager: {0}")]
    UnsupportedResource(String),
}

impl ScpiError {
    /// Classify the error into an [`ErrorKind`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScpiError::Connect { .. } | ScpiError::ResourceNotFound(_) => {
                ErrorKind::ResourceNotFound
            }
            ScpiError::InterfaceCommandNotSupported | ScpiError::UnsupportedResource(_) => {
                ErrorKind::Unknown(VI_ERROR_NSUP_OPER)
            }
            ScpiError::InvalidAddress(_) => ErrorKind::Unknown(VI_ERROR_INV_RSRC_NAME),
            ScpiError::InvalidSession => ErrorKind::InvalidSession,
            ScpiError::Io(err) => match err.kind() {
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                    ErrorKind::Timeout
                }
                _ => ErrorKind::Io,
            },
            #[cfg(feature = "visa")]
            ScpiError::Library(_) => ErrorKind::Unknown(VI_ERROR_LIBRARY_NFOUND),
            #[cfg(feature = "serial")]
            ScpiError::Serialport(err) => match err.kind() {
                serialport::ErrorKind::NoDevice => ErrorKind::ResourceNotFound,
                _ => ErrorKind::Io,
            },
            ScpiError::Status { code, .. } => ErrorKind::from_status(*code),
            ScpiError::Timeout(_) | ScpiError::TimeoutQuery { .. } => ErrorKind::Timeout,
        }
    }
}

impl From<ErrorKind> for ScpiError {
    fn from(kind: ErrorKind) -> Self {
        ScpiError::Status {
            code: kind.status_code(),
            description: kind.to_string(),
        }
    }
}

/// Classification of a failed resource interaction.
///
/// Every kind corresponds to exactly one VISA status code, see [`ErrorKind::status_code`]. Codes
/// that are not explicitly known are carried as [`ErrorKind::Unknown`].
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The operation did not complete within the session timeout.
    #[error("Timeout expired before operation completed.")]
    Timeout,
    /// The session reference is not valid (anymore).
    #[error("The given session reference is invalid.")]
    InvalidSession,
    /// The requested resource is not present or could not be reached.
    #[error("The requested resource is not present.")]
    ResourceNotFound,
    /// A generic I/O error occurred on the transport.
    #[error("Could not perform operation because of I/O error.")]
    Io,
    /// Any other status code.
    #[error("Operation failed with status {0:#010X}.")]
    Unknown(i32),
}

impl ErrorKind {
    /// Classify a raw (negative) VISA status code.
    pub fn from_status(code: i32) -> Self {
        match code {
            VI_ERROR_TMO => ErrorKind::Timeout,
            VI_ERROR_INV_SESSION => ErrorKind::InvalidSession,
            VI_ERROR_RSRC_NFOUND => ErrorKind::ResourceNotFound,
            VI_ERROR_IO => ErrorKind::Io,
            other => ErrorKind::Unknown(other),
        }
    }

    /// The VISA status code of this kind.
    pub fn status_code(&self) -> i32 {
        match self {
            ErrorKind::Timeout => VI_ERROR_TMO,
            ErrorKind::InvalidSession => VI_ERROR_INV_SESSION,
            ErrorKind::ResourceNotFound => VI_ERROR_RSRC_NFOUND,
            ErrorKind::Io => VI_ERROR_IO,
            ErrorKind::Unknown(code) => *code,
        }
    }
}

/// Map an error to its [`ErrorKind`] and log it.
///
/// Known kinds are passed through unchanged. Unknown codes are logged as errors and passed through
/// with their status code. An error never turns into a success here.
pub fn classify_error(error: &ScpiError) -> ErrorKind {
    let kind = error.kind();
    match kind {
        ErrorKind::Unknown(code) => log::error!("Operation error ({code:#010X}): {error}"),
        known => log::debug!("{known:?}: {error}"),
    }
    kind
}
