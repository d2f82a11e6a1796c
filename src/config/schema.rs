//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default ceiling for JSON and form bodies (50 MB).
pub const DEFAULT_BODY_LIMIT: usize = 50 * 1024 * 1024;

/// Root configuration for the application server.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (host, port, backpressure).
    pub listener: ListenerConfig,

    /// Static upload directory served under `/uploads`.
    pub uploads: UploadsConfig,

    /// Cross-origin policy.
    pub cors: CorsConfig,

    /// Body size ceilings.
    pub limits: LimitsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Security response headers.
    pub security: SecurityConfig,

    /// Real-time messaging hub.
    pub realtime: RealtimeConfig,

    /// Periodic task scheduler.
    pub scheduler: SchedulerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind host (e.g., "0.0.0.0").
    pub host: String,

    /// TCP port. `0` asks the OS for an ephemeral port.
    pub port: u16,

    /// Maximum requests processed concurrently (backpressure).
    pub max_in_flight: usize,
}

impl ListenerConfig {
    /// `host:port` string handed to the socket layer.
    pub fn bind_address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.bind_address().parse()
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_in_flight: 10_000,
        }
    }
}

/// Upload directory configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct UploadsConfig {
    /// Filesystem directory served verbatim under `/uploads`.
    pub dir: PathBuf,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("uploads"),
        }
    }
}

/// Cross-origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct CorsConfig {
    /// The single origin allowed to make (credentialed) cross-origin requests.
    pub frontend_url: Option<String>,
}

/// Request body limits.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum JSON body size in bytes.
    pub json_body_bytes: usize,

    /// Maximum form-encoded body size in bytes.
    pub form_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            json_body_bytes: DEFAULT_BODY_LIMIT,
            form_body_bytes: DEFAULT_BODY_LIMIT,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (route dispatch) in seconds.
    pub request_secs: u64,

    /// How long in-flight requests may drain after shutdown is triggered.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            shutdown_grace_secs: 10,
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security headers.
    pub enable_headers: bool,

    /// `Strict-Transport-Security` max-age in seconds.
    pub hsts_max_age_secs: u64,

    /// `X-Frame-Options` value.
    pub frame_options: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            hsts_max_age_secs: 15_552_000, // 180 days
            frame_options: "SAMEORIGIN".to_string(),
        }
    }
}

/// Real-time hub configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Enable the WebSocket hub.
    pub enabled: bool,

    /// Upgrade path.
    pub path: String,

    /// Outbound queue depth per session.
    pub session_buffer: usize,

    /// Largest inbound text frame accepted, in bytes.
    pub max_message_bytes: usize,

    /// Channels a single session may be subscribed to at once.
    pub max_subscriptions: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/ws".to_string(),
            session_buffer: 64,
            max_message_bytes: 64 * 1024,
            max_subscriptions: 100,
        }
    }
}

/// Periodic task configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Enable scheduled tasks.
    pub enabled: bool,

    /// Interval of the real-time heartbeat broadcast. `0` disables it.
    pub heartbeat_secs: u64,

    /// Uploads older than this are deleted. `0` disables sweeping.
    pub upload_retention_secs: u64,

    /// How often the upload sweeper runs.
    pub sweep_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            heartbeat_secs: 30,
            upload_retention_secs: 0,
            sweep_interval_secs: 3600,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
