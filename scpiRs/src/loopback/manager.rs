//! Resource manager that hands out scripted loopback sessions.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use crate::{
    ErrorKind, ResourceManager, ScpiError,
    loopback::{LoopbackDevice, LoopbackSession, LoopbackState},
};

/// A resource manager that allows you to test code using [`crate::Scpi`] without hardware.
///
/// Register one [`LoopbackDevice`] script per expected session. Registering several scripts
/// under the same address makes them available in order, one per `open` call. Opening an address
/// more often than scripts were registered panics. So does dropping the manager while registered
/// scripts were never opened.
///
/// The manager keeps track of how many sessions are currently open, how many were opened in
/// total, and which timeout was set last, such that tests can check that sessions are released
/// and configured properly.
///
/// # Example
///
/// ```
/// use scpirs::{Execution, LoopbackDevice, LoopbackResourceManager, Scpi, ScpiConfig};
///
/// let addr = "TCPIP0::192.168.0.10::5025::SOCKET";
/// let manager = LoopbackResourceManager::new().with_device(
///     addr,
///     LoopbackDevice::new(vec![":SENS:FREQ:STOP?"], vec!["3.0E9"]),
/// );
/// let scpi = Scpi::with_manager(manager, ScpiConfig::default());
///
/// let result = scpi.execute(addr, ":SENS:FREQ:STOP?", true);
/// assert_eq!(Ok(Execution::Response("3.0E9".to_string())), result);
/// assert_eq!(0, scpi.manager().open_sessions());
/// ```
pub struct LoopbackResourceManager {
    devices: Mutex<Vec<(String, VecDeque<LoopbackDevice>)>>,
    enumeration_error: Option<ErrorKind>,
    state: Arc<Mutex<LoopbackState>>,
}

impl Default for LoopbackResourceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackResourceManager {
    /// Create a new manager without any devices.
    pub fn new() -> Self {
        LoopbackResourceManager {
            devices: Mutex::new(Vec::new()),
            enumeration_error: None,
            state: Arc::new(Mutex::new(LoopbackState::default())),
        }
    }

    /// Register a scripted session for the given address.
    ///
    /// Addresses are listed in the order they were first registered.
    pub fn with_device(self, address: &str, device: LoopbackDevice) -> Self {
        {
            let mut devices = self.devices.lock().expect("Mutex should not be poisoned");
            match devices.iter_mut().find(|(addr, _)| addr.as_str() == address) {
                Some((_, scripts)) => scripts.push_back(device),
                None => devices.push((address.to_string(), VecDeque::from([device]))),
            }
        }
        self
    }

    /// Let the enumeration of resources fail with the given error kind.
    pub fn with_enumeration_error(mut self, kind: ErrorKind) -> Self {
        self.enumeration_error = Some(kind);
        self
    }

    /// Number of sessions that are currently open.
    pub fn open_sessions(&self) -> usize {
        self.state
            .lock()
            .expect("Mutex should not be poisoned")
            .open_sessions
    }

    /// Number of sessions that were opened successfully so far.
    pub fn opened_total(&self) -> usize {
        self.state
            .lock()
            .expect("Mutex should not be poisoned")
            .opened_total
    }

    /// The timeout that was set last on any session of this manager.
    pub fn last_timeout(&self) -> Option<Duration> {
        self.state
            .lock()
            .expect("Mutex should not be poisoned")
            .last_timeout
    }

    /// This command panics if registered scripts were never opened.
    ///
    /// It is automatically called when the manager is dropped.
    pub fn finalize(&self) {
        let devices = self.devices.lock().expect("Mutex should not be poisoned");
        for (address, scripts) in devices.iter() {
            if !scripts.is_empty() {
                panic!(
                    "Leftover sessions for resource {address}: {} were never opened.",
                    scripts.len()
                );
            }
        }
    }
}

impl ResourceManager for LoopbackResourceManager {
    type Session = LoopbackSession;

    fn list_resources(&self) -> Result<Vec<String>, ScpiError> {
        if let Some(kind) = self.enumeration_error {
            return Err(kind.into());
        }
        let devices = self.devices.lock().expect("Mutex should not be poisoned");
        Ok(devices.iter().map(|(addr, _)| addr.clone()).collect())
    }

    fn open(&self, address: &str) -> Result<Self::Session, ScpiError> {
        let device = {
            let mut devices = self.devices.lock().expect("Mutex should not be poisoned");
            let (_, scripts) = devices
                .iter_mut()
                .find(|(addr, _)| addr.as_str() == address)
                .ok_or_else(|| ScpiError::ResourceNotFound(address.to_string()))?;
            scripts.pop_front().unwrap_or_else(|| {
                panic!("No more sessions were expected for resource {address}.")
            })
        };

        if let Some(kind) = device.open_error {
            return Err(kind.into());
        }

        {
            let mut state = self.state.lock().expect("Mutex should not be poisoned");
            state.open_sessions += 1;
            state.opened_total += 1;
        }
        Ok(LoopbackSession::with_state(device, Arc::clone(&self.state)))
    }
}

impl Drop for LoopbackResourceManager {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            self.finalize();
        }
    }
}
