use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use ripplefs_fabric::transport::DEFAULT_MAX_FRAME_LEN;
use serde::Deserialize;

use crate::error::{ClientError, Result};

/// Where the coordinator listens
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    Tcp(SocketAddr),
    Unix(PathBuf),
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addr) => write!(f, "tcp://{addr}"),
            Endpoint::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

/// Client settings
///
/// ```toml
/// endpoint = { tcp = "127.0.0.1:10500" }
/// fs_name = "ripple"
/// log_dir = "/var/log/ripplefs"
/// request_timeout_ms = 30000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Coordinator address; left unset when it comes from discovery
    pub endpoint: Option<Endpoint>,
    /// Filesystem to attach to, `None` for the server default
    pub fs_name: Option<String>,
    /// Directory hint the server uses for client-side activity logs
    pub log_dir: Option<String>,
    pub connect_timeout_ms: u64,
    pub handshake_timeout_ms: u64,
    /// Per-command wait limit, 0 waits until the reply or connection loss
    pub request_timeout_ms: u64,
    pub max_frame_len: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            fs_name: None,
            log_dir: None,
            connect_timeout_ms: 5_000,
            handshake_timeout_ms: 10_000,
            request_timeout_ms: 0,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl ClientConfig {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint: Some(endpoint),
            ..Self::default()
        }
    }

    /// Parse from TOML; the result still has to pass [`validate`](Self::validate)
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| ClientError::Configuration(e.to_string()))
    }

    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    pub fn with_fs_name(mut self, name: impl Into<String>) -> Self {
        self.fs_name = Some(name.into());
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<String>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout_ms = timeout.map_or(0, duration_ms);
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout_ms = duration_ms(timeout);
        self
    }

    pub fn with_max_frame_len(mut self, len: usize) -> Self {
        self.max_frame_len = len;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }

    /// Check everything that can be checked without touching the network
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        match &self.endpoint {
            None => problems.push("endpoint is not set".to_string()),
            Some(Endpoint::Tcp(addr)) if addr.port() == 0 => {
                problems.push(format!("endpoint {addr} has no port"));
            }
            Some(Endpoint::Unix(path)) if path.as_os_str().is_empty() => {
                problems.push("unix endpoint path is empty".to_string());
            }
            Some(_) => {}
        }
        if self.fs_name.as_deref().is_some_and(str::is_empty) {
            problems.push("fs_name is empty".to_string());
        }
        if self.connect_timeout_ms == 0 {
            problems.push("connect_timeout_ms must be positive".to_string());
        }
        if self.handshake_timeout_ms == 0 {
            problems.push("handshake_timeout_ms must be positive".to_string());
        }
        if self.max_frame_len == 0 {
            problems.push("max_frame_len must be positive".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ClientError::Configuration(format!(
                "invalid client configuration: {}",
                problems.join("; ")
            )))
        }
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_toml() {
        let config = ClientConfig::from_toml_str(
            r#"
            endpoint = { tcp = "127.0.0.1:10500" }
            fs_name = "ripple"
            request_timeout_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(
            config.endpoint,
            Some(Endpoint::Tcp("127.0.0.1:10500".parse().unwrap()))
        );
        assert_eq!(config.fs_name.as_deref(), Some("ripple"));
        assert_eq!(config.request_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.handshake_timeout(), Duration::from_secs(10));
        config.validate().unwrap();
    }

    #[test]
    fn parses_unix_endpoint() {
        let config = ClientConfig::from_toml_str(r#"endpoint = { unix = "/run/ripple.sock" }"#)
            .unwrap();
        assert_eq!(
            config.endpoint,
            Some(Endpoint::Unix(PathBuf::from("/run/ripple.sock")))
        );
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = ClientConfig::from_toml_str("endpont = 1").unwrap_err();
        assert!(matches!(err, ClientError::Configuration(_)));
    }

    #[test]
    fn validation_collects_every_problem() {
        let config = ClientConfig {
            handshake_timeout_ms: 0,
            fs_name: Some(String::new()),
            ..ClientConfig::default()
        };
        let ClientError::Configuration(message) = config.validate().unwrap_err() else {
            panic!("expected a configuration error");
        };
        assert!(message.contains("endpoint is not set"));
        assert!(message.contains("fs_name is empty"));
        assert!(message.contains("handshake_timeout_ms"));
    }

    #[test]
    fn zero_port_is_invalid() {
        let config = ClientConfig::new(Endpoint::Tcp("127.0.0.1:0".parse().unwrap()));
        assert!(config.validate().is_err());
    }
}
