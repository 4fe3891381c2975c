//! The loopback module provides an instrument simulator for testing purposes.
//!
//! A [`LoopbackResourceManager`] holds a number of scripted [`LoopbackDevice`]s under their
//! resource addresses. Every time a device is opened, the next script registered for its address
//! becomes a [`LoopbackSession`]. The session checks that the host writes exactly what the script
//! expects and answers reads with the scripted replies. Failures can be scripted as well, so that
//! error handling of code using [`crate::Scpi`] can be tested without hardware.
//!
//! Check out the [`LoopbackResourceManager`] for an example.

mod manager;
mod session;

pub use manager::*;
pub use session::*;

use std::time::Duration;

use crate::ErrorKind;

/// A self-incrementing index structure that by default starts at 0 and increments whenever `next`
/// is called.
#[derive(Debug, Default)]
struct IncrIndex {
    index: usize,
}

impl IncrIndex {
    fn next(&mut self) -> usize {
        let current = self.index;
        self.index += 1;
        current
    }
}

/// One scripted step of a loopback conversation.
#[derive(Clone, Debug, PartialEq)]
enum Step {
    Message(String),
    Fail(ErrorKind),
}

/// Book keeping shared between a manager and the sessions it opened.
#[derive(Debug, Default)]
struct LoopbackState {
    open_sessions: usize,
    opened_total: usize,
    last_timeout: Option<Duration>,
}

/// The script of one loopback session.
///
/// The commands are consumed in order. When the session is dropped, it panics if not all
/// commands have been used.
#[derive(Clone, Debug)]
pub struct LoopbackDevice {
    from_host: Vec<Step>,
    from_inst: Vec<Step>,
    terminator_exp: String,
    open_error: Option<ErrorKind>,
}

impl LoopbackDevice {
    /// Create a new script with the given commands to and from the instrument.
    ///
    /// # Arguments:
    /// * `from_host` - Messages expected from host to instrument, without terminator.
    /// * `from_inst` - Messages from instrument to host, without terminator.
    pub fn new(from_host: Vec<&str>, from_inst: Vec<&str>) -> Self {
        LoopbackDevice {
            from_host: from_host
                .into_iter()
                .map(|m| Step::Message(m.to_string()))
                .collect(),
            from_inst: from_inst
                .into_iter()
                .map(|m| Step::Message(m.to_string()))
                .collect(),
            terminator_exp: "\n".to_string(),
            open_error: None,
        }
    }

    /// A device that cannot be opened and fails with the given error kind instead.
    pub fn unreachable(kind: ErrorKind) -> Self {
        let mut device = Self::new(vec![], vec![]);
        device.open_error = Some(kind);
        device
    }

    /// Set the terminator that is expected on written messages and appended to replies.
    ///
    /// The default is `"\n"`.
    pub fn with_terminator(mut self, terminator: &str) -> Self {
        self.terminator_exp = terminator.to_string();
        self
    }

    /// Append a failing read: once all previous replies are consumed, reading fails with `kind`.
    pub fn then_fail(mut self, kind: ErrorKind) -> Self {
        self.from_inst.push(Step::Fail(kind));
        self
    }

    /// Append a failing write: once all previous commands are consumed, writing fails with
    /// `kind`.
    pub fn then_fail_write(mut self, kind: ErrorKind) -> Self {
        self.from_host.push(Step::Fail(kind));
        self
    }
}

// Tests of internal functionality
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incrementing_index() {
        let mut idx = IncrIndex::default();
        assert_eq!(0, idx.next());
        assert_eq!(1, idx.next());
        assert_eq!(2, idx.next());
    }

    #[test]
    fn test_device_script() {
        let dev = LoopbackDevice::new(vec!["cmd"], vec!["resp"])
            .then_fail(ErrorKind::Timeout)
            .then_fail_write(ErrorKind::Io);
        assert_eq!(
            vec![Step::Message("cmd".to_string()), Step::Fail(ErrorKind::Io)],
            dev.from_host
        );
        assert_eq!(
            vec![
                Step::Message("resp".to_string()),
                Step::Fail(ErrorKind::Timeout)
            ],
            dev.from_inst
        );
        assert!(dev.open_error.is_none());
    }
}
