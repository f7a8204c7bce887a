use std::time::Duration;

use flexlink_frame::{opcode, port, FrameConfig, DEFAULT_MAX_FRAME_SIZE};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Connection settings for one receiver.
///
/// Durations are (de)serialized as whole milliseconds. Missing fields take
/// their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Receiver address, `host:port`.
    pub address: String,

    /// Port identifier used in outbound headers and `LOG` requests.
    pub port_address: u8,

    /// Bytes read from the socket per loop iteration.
    pub receive_buffer_size: usize,

    /// Largest frame accepted from the receiver.
    pub max_frame_size: usize,

    /// Drop inbound frames whose checksum does not match.
    pub verify_checksum: bool,

    /// Socket read timeout; bounds how long one idle loop iteration blocks.
    #[serde(with = "duration_serde")]
    pub poll_interval: Duration,

    /// How long the worker keeps flushing outbound requests after shutdown is requested.
    #[serde(with = "duration_serde")]
    pub shutdown_grace: Duration,

    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,

    #[serde(with = "duration_serde")]
    pub write_timeout: Duration,

    /// Log whose output is stopped by the shutdown request.
    pub stop_log: u16,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: String::from("192.168.0.2:3001"),
            port_address: port::ETH1_ALL,
            receive_buffer_size: 0x8000,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            verify_checksum: true,
            poll_interval: Duration::from_millis(1),
            shutdown_grace: Duration::from_millis(500),
            connect_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
            stop_log: opcode::BESTPOS,
        }
    }
}

impl ClientConfig {
    /// Defaults with the given receiver address.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    /// Parse from a JSON document.
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| ClientError::Config(format!("failed to parse config: {e}")))
    }

    /// Frame settings derived from this configuration.
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_frame_size: self.max_frame_size,
            verify_checksum: self.verify_checksum,
            read_timeout: Some(self.poll_interval),
            write_timeout: Some(self.write_timeout),
        }
    }

    /// Validate the configuration for common issues and misconfigurations.
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Receiver address cannot be empty".to_string());
        } else if !self.address.contains(':') {
            errors.push(format!(
                "Invalid receiver address: '{}' (expected format: 'host:port')",
                self.address
            ));
        }

        if self.receive_buffer_size == 0 {
            errors.push("Receive buffer size must be greater than 0".to_string());
        }

        if self.max_frame_size < 32 {
            errors.push(format!(
                "Max frame size too small: {} (a frame with an empty payload is 32 bytes)",
                self.max_frame_size
            ));
        }

        // A zero read timeout means "block forever" to the socket.
        if self.poll_interval.is_zero() {
            errors.push("Poll interval must be greater than 0".to_string());
        }

        // The stop request has to be written before the socket closes.
        if self.shutdown_grace.is_zero() {
            errors.push("Shutdown grace must be greater than 0".to_string());
        }

        if self.connect_timeout.is_zero() {
            errors.push("Connect timeout must be greater than 0".to_string());
        }

        if self.write_timeout.is_zero() {
            errors.push("Write timeout must be greater than 0".to_string());
        }

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ClientError::Config(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
