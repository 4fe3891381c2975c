//! Loopback session that plays back one [`LoopbackDevice`] script.
//!
//! End-of-message is always determined by a terminator string, usually `"\n"`.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use crate::{
    ScpiError, Session,
    loopback::{IncrIndex, LoopbackDevice, LoopbackState, Step},
};

/// A session that allows you to simply test code that talks to instruments.
///
/// Sessions are usually handed out by a [`crate::LoopbackResourceManager`], but can also be
/// created directly from a [`LoopbackDevice`] to test code that takes any [`Session`].
///
/// ```
/// use scpirs::{LoopbackDevice, LoopbackSession, Session};
///
/// let device = LoopbackDevice::new(vec!["*IDN?"], vec!["ACME,Scope,1234,1.0"]);
/// let mut session = LoopbackSession::new(device);
/// assert_eq!("ACME,Scope,1234,1.0", session.query("*IDN?").unwrap());
/// // Session dropped here -> panics if not all scripted commands were used.
/// ```
pub struct LoopbackSession {
    from_host: Vec<Step>,
    from_inst: Vec<Step>,
    terminator_exp: String,
    from_host_index: IncrIndex,
    from_inst_index: IncrIndex,
    curr_bytes: VecDeque<u8>,
    terminator: String,
    timeout: Duration,
    state: Arc<Mutex<LoopbackState>>,
}

impl LoopbackSession {
    /// Create a new session that plays back the given script.
    pub fn new(device: LoopbackDevice) -> Self {
        let state = LoopbackState {
            open_sessions: 1,
            opened_total: 1,
            last_timeout: None,
        };
        Self::with_state(device, Arc::new(Mutex::new(state)))
    }

    pub(super) fn with_state(device: LoopbackDevice, state: Arc<Mutex<LoopbackState>>) -> Self {
        LoopbackSession {
            from_host: device.from_host,
            from_inst: device.from_inst,
            terminator_exp: device.terminator_exp,
            from_host_index: IncrIndex::default(),
            from_inst_index: IncrIndex::default(),
            curr_bytes: VecDeque::new(),
            terminator: "\n".to_string(),
            timeout: Duration::from_secs(3),
            state,
        }
    }

    /// This command panics if not all commands in the [`LoopbackSession`] have been used.
    ///
    /// It is automatically called when the [`LoopbackSession`] is dropped, but you can also call
    /// it manually to ensure that all commands have been used.
    pub fn finalize(&mut self) {
        let from_host_leftover = self.from_host.get(self.from_host_index.next());
        let from_inst_leftover = self.from_inst.get(self.from_inst_index.next());
        if let Some(fil) = from_host_leftover {
            panic!("Leftover expected commands found from host to instrument: {fil:?}");
        }
        if let Some(fil) = from_inst_leftover {
            panic!("Leftover expected commands found from instrument to host: {fil:?}");
        }
    }

    /// Read exactly one byte from the next message of the instrument.
    ///
    /// Running out of scripted replies behaves like an instrument that does not answer, i.e., a
    /// timeout.
    fn read_one_byte(&mut self) -> Result<u8, ScpiError> {
        loop {
            if let Some(byte) = self.curr_bytes.pop_front() {
                return Ok(byte);
            }
            match self.from_inst.get(self.from_inst_index.next()) {
                Some(Step::Message(msg)) => {
                    self.curr_bytes = format!("{msg}{}", self.terminator_exp)
                        .into_bytes()
                        .into();
                }
                Some(Step::Fail(kind)) => return Err((*kind).into()),
                None => return Err(ScpiError::Timeout(self.timeout)),
            }
        }
    }
}

impl Session for LoopbackSession {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), ScpiError> {
        for byte in buf.iter_mut() {
            *byte = self.read_one_byte()?;
        }
        Ok(())
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
        self.timeout = timeout;
        let mut state = self.state.lock().expect("Mutex should not be poisoned");
        state.last_timeout = Some(timeout);
        Ok(())
    }

    fn write_raw(&mut self, cmd: &[u8]) -> Result<(), ScpiError> {
        let step = self
            .from_host
            .get(self.from_host_index.next())
            .expect("No more commands were expected from host to instrument.");
        match step {
            Step::Message(exp) => {
                let exp = format!("{exp}{}", self.terminator_exp);
                assert_eq!(
                    exp.as_bytes(),
                    cmd,
                    "Expected sendcmd '{0}', got '{1:?}'",
                    exp,
                    std::str::from_utf8(cmd)
                );
                Ok(())
            }
            Step::Fail(kind) => Err((*kind).into()),
        }
    }
}

impl Drop for LoopbackSession {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.open_sessions = state.open_sessions.saturating_sub(1);
        }
        if !std::thread::panicking() {
            self.finalize();
        }
    }
}
