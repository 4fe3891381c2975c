//! The [`Scpi`] component: search resources, execute commands, and read multi-chunk responses.

use std::{fmt, thread, time::Duration};

use crate::{
    ErrorKind, NativeResourceManager, ResourceManager, ScpiConfig, ScpiError, Session,
    classify_error,
};

/// One resource found by [`Scpi::search`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchEntry {
    /// The resource address.
    pub address: String,
    /// The response to the identification query, or a description of why it failed, formatted
    /// as `"Error: <description>"`.
    pub identification: Result<String, String>,
}

/// Successful outcome of [`Scpi::execute`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Execution {
    /// The response of a query.
    Response(String),
    /// The command was written successfully. Corresponds to [`crate::VI_SUCCESS`].
    Success,
}

impl Execution {
    /// Get the response of a query, if there is one.
    pub fn response(&self) -> Option<&str> {
        match self {
            Execution::Response(resp) => Some(resp.as_str()),
            Execution::Success => None,
        }
    }
}

/// Condition that ends the read loop of [`Scpi::query_full_response`].
///
/// Note that `Termination::Suffix("")` is satisfied by any response and therefore always stops
/// after the first read.
pub enum Termination {
    /// The accumulated response ends with the given string.
    Suffix(String),
    /// The accumulated response has at least the given number of characters.
    Length(usize),
    /// The predicate returns `true` for the accumulated response.
    Predicate(Box<dyn Fn(&str) -> bool + Send + Sync>),
}

impl Termination {
    /// Create a termination from a predicate.
    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Termination::Predicate(Box::new(predicate))
    }

    /// Check if the accumulated response is complete.
    pub fn is_complete(&self, response: &str) -> bool {
        match self {
            Termination::Suffix(suffix) => response.ends_with(suffix.as_str()),
            Termination::Length(len) => response.chars().count() >= *len,
            Termination::Predicate(predicate) => predicate(response),
        }
    }
}

impl fmt::Debug for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Suffix(suffix) => f.debug_tuple("Suffix").field(suffix).finish(),
            Termination::Length(len) => f.debug_tuple("Length").field(len).finish(),
            Termination::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl From<&str> for Termination {
    fn from(suffix: &str) -> Self {
        Termination::Suffix(suffix.to_string())
    }
}

impl From<String> for Termination {
    fn from(suffix: String) -> Self {
        Termination::Suffix(suffix)
    }
}

/// Search, command, and query SCPI instruments through a [`ResourceManager`].
///
/// Every operation opens its own session, applies the configured terminator and timeout, performs
/// one interaction, and drops the session on every exit path. Failures are returned as
/// [`ErrorKind`], they never panic.
///
/// # Example
///
/// ```no_run
/// use scpirs::{NativeResourceManager, Scpi, ScpiConfig, Termination};
///
/// let device = "TCPIP0::192.168.0.10::5025::SOCKET";
/// let config = ScpiConfig::default();
/// let manager = NativeResourceManager::from_config(&config).with_resources([device]);
/// let scpi = Scpi::with_manager(manager, config);
///
/// for entry in scpi.search().unwrap() {
///     println!("{}: {:?}", entry.address, entry.identification);
/// }
/// let stop = scpi.execute(device, ":SENSe:FREQuency:STOP?", true).unwrap();
/// println!("{:?}", stop.response());
/// let full = scpi.query_full_response(device, ":TRACe:DATA?", &Termination::from("END"));
/// println!("{full:?}");
/// ```
pub struct Scpi<M: ResourceManager = NativeResourceManager> {
    manager: M,
    config: ScpiConfig,
}

impl Scpi<NativeResourceManager> {
    /// Create a new instance with the [`NativeResourceManager`] and default configuration.
    pub fn new() -> Self {
        Self::with_config(ScpiConfig::default())
    }

    /// Create a new instance with the [`NativeResourceManager`] and the given configuration.
    pub fn with_config(config: ScpiConfig) -> Self {
        let manager = NativeResourceManager::from_config(&config);
        Self { manager, config }
    }
}

impl Default for Scpi<NativeResourceManager> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: ResourceManager> Scpi<M> {
    /// Create a new instance on top of any resource manager.
    pub fn with_manager(manager: M, config: ScpiConfig) -> Self {
        Self { manager, config }
    }

    /// Get the resource manager.
    pub fn manager(&self) -> &M {
        &self.manager
    }

    /// Get the configuration.
    pub fn config(&self) -> &ScpiConfig {
        &self.config
    }

    /// Enumerate all resources and query each one for its identification.
    ///
    /// Failures of single resources are recorded in their [`SearchEntry`] and do not stop the
    /// search. Only if the enumeration itself fails, the whole search fails.
    pub fn search(&self) -> Result<Vec<SearchEntry>, ErrorKind> {
        let resources = self
            .manager
            .list_resources()
            .map_err(|err| classify_error(&err))?;
        log::debug!("Found {} resources", resources.len());

        Ok(resources
            .into_iter()
            .map(|address| {
                let identification = self.identify(&address).map_err(|err| {
                    log::warn!("Identification of {address} failed: {err}");
                    format!("Error: {err}")
                });
                SearchEntry {
                    address,
                    identification,
                }
            })
            .collect())
    }

    /// Send one instruction to a device.
    ///
    /// If `is_query` is set, the response is read and returned. Otherwise, the instruction is
    /// only written and [`Execution::Success`] is returned.
    ///
    /// # Arguments
    /// * `device` - Address of the resource.
    /// * `instruction` - The SCPI instruction, without terminator.
    /// * `is_query` - Whether a response is expected.
    pub fn execute(
        &self,
        device: &str,
        instruction: &str,
        is_query: bool,
    ) -> Result<Execution, ErrorKind> {
        self.try_execute(device, instruction, is_query)
            .map_err(|err| classify_error(&err))
    }

    /// Send a query and read response chunks until `termination` is satisfied.
    ///
    /// Between two reads, the configured [`ScpiConfig::read_delay`] is waited.
    pub fn query_full_response(
        &self,
        device: &str,
        instruction: &str,
        termination: &Termination,
    ) -> Result<String, ErrorKind> {
        self.query_full_response_with_delay(device, instruction, termination, self.config.read_delay)
    }

    /// Same as [`Scpi::query_full_response`], but with an explicit delay between reads.
    pub fn query_full_response_with_delay(
        &self,
        device: &str,
        instruction: &str,
        termination: &Termination,
        delay: Duration,
    ) -> Result<String, ErrorKind> {
        self.try_query_full_response(device, instruction, termination, delay)
            .map_err(|err| classify_error(&err))
    }

    /// Open a session and apply terminator and timeout.
    fn open(&self, device: &str) -> Result<M::Session, ScpiError> {
        log::debug!("Opening {device}");
        let mut session = self.manager.open(device)?;
        session.set_terminator(&self.config.terminator);
        session.set_timeout(self.config.timeout)?;
        Ok(session)
    }

    fn identify(&self, device: &str) -> Result<String, ScpiError> {
        let mut session = self.open(device)?;
        session.query(&self.config.idn_query)
    }

    fn try_execute(
        &self,
        device: &str,
        instruction: &str,
        is_query: bool,
    ) -> Result<Execution, ScpiError> {
        let mut session = self.open(device)?;
        if is_query {
            Ok(Execution::Response(session.query(instruction)?))
        } else {
            session.write(instruction)?;
            Ok(Execution::Success)
        }
    }

    fn try_query_full_response(
        &self,
        device: &str,
        instruction: &str,
        termination: &Termination,
        delay: Duration,
    ) -> Result<String, ScpiError> {
        let mut session = self.open(device)?;
        session.write(instruction)?;

        let mut full_response = String::new();
        let mut reads = 0usize;
        loop {
            full_response.push_str(&session.read()?);
            reads += 1;
            if termination.is_complete(&full_response) {
                break;
            }
            log::debug!("Response incomplete after {reads} reads, waiting {delay:?}");
            thread::sleep(delay);
        }
        log::debug!(
            "Full response of {} characters after {reads} reads",
            full_response.chars().count()
        );
        Ok(full_response)
    }
}
