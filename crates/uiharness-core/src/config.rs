//! Harness configuration
//!
//! Defaults match the reference device setup. Environment variables override
//! them so a test rig can move the port or enlarge the queue without a rebuild.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use uiharness_protocol::{Command, DEFAULT_PORT};

/// Default number of commands that may wait for the UI thread
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// Default number of addressable widgets
pub const DEFAULT_REGISTRY_CAPACITY: usize = 64;

/// Default bound on waiting for one command to complete
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Ticks a screenshot may wait for the UI host to deliver a frame
pub const DEFAULT_FRAME_WAIT_TICKS: u32 = 120;

pub const ENV_BIND: &str = "UIHARNESS_BIND";
pub const ENV_PORT: &str = "UIHARNESS_PORT";
pub const ENV_QUEUE_CAPACITY: &str = "UIHARNESS_QUEUE_CAPACITY";
pub const ENV_COMMAND_TIMEOUT_MS: &str = "UIHARNESS_COMMAND_TIMEOUT_MS";
pub const ENV_PLACEHOLDER_SCREENSHOTS: &str = "UIHARNESS_PLACEHOLDER_SCREENSHOTS";

/// Runtime settings for the server, queue, registry and screenshot pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub queue_capacity: usize,
    pub registry_capacity: usize,
    pub command_timeout: Duration,
    /// Serve a synthetic image when the host cannot capture frames
    pub placeholder_screenshots: bool,
    pub frame_wait_ticks: u32,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            registry_capacity: DEFAULT_REGISTRY_CAPACITY,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            placeholder_screenshots: false,
            frame_wait_ticks: DEFAULT_FRAME_WAIT_TICKS,
        }
    }
}

impl HarnessConfig {
    /// Defaults overridden by `UIHARNESS_*` environment variables
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    ///
    /// Values that fail to parse are logged and ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(addr) = parse_var(&lookup, ENV_BIND) {
            self.bind_addr = addr;
        }
        if let Some(port) = parse_var(&lookup, ENV_PORT) {
            self.port = port;
        }
        if let Some(capacity) = parse_var::<usize>(&lookup, ENV_QUEUE_CAPACITY) {
            if capacity == 0 {
                tracing::warn!("Ignoring {}=0, the queue needs at least one slot", ENV_QUEUE_CAPACITY);
            } else {
                self.queue_capacity = capacity;
            }
        }
        if let Some(ms) = parse_var::<u64>(&lookup, ENV_COMMAND_TIMEOUT_MS) {
            self.command_timeout = Duration::from_millis(ms);
        }
        if let Some(value) = lookup(ENV_PLACEHOLDER_SCREENSHOTS) {
            match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.placeholder_screenshots = true,
                "0" | "false" | "no" | "off" => self.placeholder_screenshots = false,
                other => tracing::warn!(
                    "Ignoring {}={:?}, expected true or false",
                    ENV_PLACEHOLDER_SCREENSHOTS,
                    other
                ),
            }
        }
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_placeholder_screenshots(mut self, enabled: bool) -> Self {
        self.placeholder_screenshots = enabled;
        self
    }

    /// Socket address the server binds
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    /// How long the server waits for `command` to complete
    ///
    /// Commands that occupy the UI thread for a stated duration get that
    /// duration on top of the base timeout.
    pub fn completion_timeout(&self, command: &Command) -> Duration {
        self.command_timeout + Duration::from_millis(command.nominal_duration_ms())
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring {}={:?}, not a valid value", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.port, 12345);
        assert_eq!(config.queue_capacity, 32);
        assert_eq!(config.registry_capacity, 64);
        assert!(!config.placeholder_screenshots);
        assert_eq!(config.socket_addr().port(), 12345);
    }

    #[test]
    fn test_overrides() {
        let config = HarnessConfig::default().with_overrides(lookup(&[
            (ENV_BIND, "127.0.0.1"),
            (ENV_PORT, "4000"),
            (ENV_QUEUE_CAPACITY, "8"),
            (ENV_COMMAND_TIMEOUT_MS, "1500"),
            (ENV_PLACEHOLDER_SCREENSHOTS, "yes"),
        ]));
        assert_eq!(config.bind_addr, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.port, 4000);
        assert_eq!(config.queue_capacity, 8);
        assert_eq!(config.command_timeout, Duration::from_millis(1500));
        assert!(config.placeholder_screenshots);
    }

    #[test]
    fn test_bad_values_keep_defaults() {
        let config = HarnessConfig::default().with_overrides(lookup(&[
            (ENV_PORT, "not-a-port"),
            (ENV_QUEUE_CAPACITY, "0"),
            (ENV_PLACEHOLDER_SCREENSHOTS, "maybe"),
        ]));
        assert_eq!(config, HarnessConfig::default());
    }

    #[test]
    fn test_completion_timeout_includes_wait() {
        let config = HarnessConfig::default().with_command_timeout(Duration::from_secs(1));
        assert_eq!(
            config.completion_timeout(&Command::Wait { ms: 500 }),
            Duration::from_millis(1500)
        );
        assert_eq!(
            config.completion_timeout(&Command::Screenshot),
            Duration::from_secs(1)
        );
    }
}
