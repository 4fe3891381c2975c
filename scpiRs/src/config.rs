//! Configuration of the [`crate::Scpi`] component.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings that are applied to every session opened by [`crate::Scpi`].
///
/// All fields have defaults, so a configuration file only needs to list what it changes.
/// Durations are (de)serialized as integer milliseconds.
///
/// ```
/// use std::time::Duration;
///
/// use scpirs::ScpiConfig;
///
/// let config = ScpiConfig::default().with_timeout(Duration::from_millis(5000));
/// assert_eq!(config.read_delay, Duration::from_secs(1));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScpiConfig {
    /// I/O timeout set on every session.
    #[serde(rename = "timeout_ms", with = "millis")]
    pub timeout: Duration,
    /// Pause between two reads in [`crate::Scpi::query_full_response`].
    #[serde(rename = "read_delay_ms", with = "millis")]
    pub read_delay: Duration,
    /// Terminator appended to written messages and expected at the end of read messages.
    pub terminator: String,
    /// Query sent to every resource during [`crate::Scpi::search`].
    pub idn_query: String,
    /// Baud rate used when opening serial ports.
    pub serial_baud_rate: u32,
}

impl Default for ScpiConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(3000),
            read_delay: Duration::from_secs(1),
            terminator: "\n".to_string(),
            idn_query: "*IDN?".to_string(),
            serial_baud_rate: 9600,
        }
    }
}

impl ScpiConfig {
    /// Set the session timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the pause between reads of a multi-chunk response.
    pub fn with_read_delay(mut self, read_delay: Duration) -> Self {
        self.read_delay = read_delay;
        self
    }

    /// Set the message terminator.
    pub fn with_terminator(mut self, terminator: &str) -> Self {
        self.terminator = terminator.to_string();
        self
    }

    /// Set the identification query used while searching.
    pub fn with_idn_query(mut self, idn_query: &str) -> Self {
        self.idn_query = idn_query.to_string();
        self
    }

    /// Set the baud rate for serial ports.
    pub fn with_serial_baud_rate(mut self, baud_rate: u32) -> Self {
        self.serial_baud_rate = baud_rate;
        self
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis().try_into().unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScpiConfig::default();
        assert_eq!(Duration::from_millis(3000), config.timeout);
        assert_eq!(Duration::from_secs(1), config.read_delay);
        assert_eq!("\n", config.terminator);
        assert_eq!("*IDN?", config.idn_query);
        assert_eq!(9600, config.serial_baud_rate);
    }

    #[test]
    fn test_builder() {
        let config = ScpiConfig::default()
            .with_timeout(Duration::from_millis(500))
            .with_read_delay(Duration::ZERO)
            .with_terminator("\r\n")
            .with_idn_query("ID?")
            .with_serial_baud_rate(115200);
        assert_eq!(Duration::from_millis(500), config.timeout);
        assert_eq!(Duration::ZERO, config.read_delay);
        assert_eq!("\r\n", config.terminator);
        assert_eq!("ID?", config.idn_query);
        assert_eq!(115200, config.serial_baud_rate);
    }

    #[test]
    fn test_partial_json() {
        let config: ScpiConfig =
            serde_json::from_str(r#"{"timeout_ms": 1500, "terminator": "\r\n"}"#).unwrap();
        assert_eq!(Duration::from_millis(1500), config.timeout);
        assert_eq!("\r\n", config.terminator);
        assert_eq!(Duration::from_secs(1), config.read_delay);
    }

    #[test]
    fn test_json_millis() {
        let json = serde_json::to_value(ScpiConfig::default()).unwrap();
        assert_eq!(3000, json["timeout_ms"]);
        assert_eq!(1000, json["read_delay_ms"]);
    }
}
