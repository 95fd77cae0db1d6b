//! Configuration for the GPIO box agent.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use gpiobox_core::{BoxError, ClientConfig, Endpoint, IdPolicy, ReconnectPolicy};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Coordinator link settings.
    pub coordinator: CoordinatorConfig,
    /// Periodic state push.
    pub heartbeat: HeartbeatConfig,
    /// Run loop tuning.
    pub supervisor: SupervisorConfig,
    /// HTTP control surface.
    pub http: HttpConfig,
    /// The controlled output.
    pub output: OutputConfig,
    /// Reachability probe used by `GET /ping`.
    pub probe: ProbeConfig,
    /// What `GET /reboot` does after answering.
    pub restart: RestartConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Coordinator connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub host: String,
    pub port: u16,
    /// Handshake path, including the `EIO` query parameter.
    pub path: String,
    /// Namespace joined after the handshake.
    pub namespace: String,
    /// How an ack id of `0` is read: `"non_zero"` or `"any_parsed"`.
    pub id_policy: IdPolicy,
    pub connect_timeout_ms: u64,
    pub handshake_timeout_ms: u64,
    /// Delay between reconnect attempts.
    pub reconnect: ReconnectPolicy,
}

/// Heartbeat settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub interval_ms: u64,
    /// Event name of the state push.
    pub event: String,
}

/// Supervisor loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Longest time one loop iteration waits on the coordinator link.
    pub quantum_ms: u64,
}

/// HTTP control surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
    /// Page template with a `{{STATE}}` placeholder. Empty uses the
    /// built-in page.
    pub page: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinBackend {
    /// Keep the level in memory only.
    Memory,
    /// Drive `/sys/class/gpio/gpio<pin>/value`.
    Sysfs,
}

/// Output pin settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// GPIO number.
    pub pin: u32,
    pub backend: PinBackend,
    /// sysfs GPIO root, used by the `sysfs` backend.
    pub sysfs_root: String,
    /// Level applied at startup.
    pub initial: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeMethod {
    /// ICMP echo via the system `ping` tool.
    Icmp,
    /// TCP connect to the coordinator port.
    Tcp,
}

/// Reachability probe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub method: ProbeMethod,
    /// Echoes (ICMP) or connect attempts (TCP).
    pub count: u32,
    /// Per-attempt timeout.
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartMode {
    /// Replace the process image with a fresh copy of itself.
    Exec,
    /// Exit and let the service manager start us again.
    Exit,
}

/// Restart settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RestartConfig {
    pub mode: RestartMode,
    /// How long to wait for in-flight HTTP responses before restarting.
    pub grace_ms: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            host: "192.168.0.112".into(),
            port: 3000,
            path: "/socket.io/?EIO=4".into(),
            namespace: "/".into(),
            id_policy: IdPolicy::NonZero,
            connect_timeout_ms: 5_000,
            handshake_timeout_ms: 10_000,
            reconnect: ReconnectPolicy::Fixed { interval_ms: 5_000 },
        }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_ms: gpiobox_core::heartbeat::DEFAULT_INTERVAL_MS,
            event: gpiobox_core::heartbeat::STATE_EVENT.into(),
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self { quantum_ms: 50 }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 80,
            page: String::new(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            pin: 2,
            backend: PinBackend::Memory,
            sysfs_root: "/sys/class/gpio".into(),
            initial: false,
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            method: ProbeMethod::Icmp,
            count: 3,
            timeout_ms: 1_000,
        }
    }
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            mode: RestartMode::Exec,
            grace_ms: 2_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl AgentConfig {
    /// Read and parse a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, BoxError> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| BoxError::Config(format!("{}: {e}", path.display())))
    }

    /// Load configuration from a TOML file, falling back to defaults.
    ///
    /// Runs before logging is set up, so the reason for a fallback is
    /// returned for the caller to log.
    pub fn load(path: &Path) -> (Self, Option<BoxError>) {
        match Self::from_file(path) {
            Ok(cfg) => (cfg, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    /// The default configuration rendered as TOML.
    pub fn default_toml() -> Result<String, BoxError> {
        toml::to_string_pretty(&Self::default()).map_err(|e| BoxError::Config(e.to_string()))
    }

    /// Stream client parameters.
    pub fn to_client_config(&self) -> ClientConfig {
        let c = &self.coordinator;
        let mut cfg = ClientConfig::new(Endpoint::new(c.host.clone(), c.port, c.path.clone()));
        cfg.namespace = if c.namespace.is_empty() {
            "/".into()
        } else {
            c.namespace.clone()
        };
        cfg.id_policy = c.id_policy;
        cfg.reconnect = c.reconnect.clone();
        cfg.connect_timeout = Duration::from_millis(c.connect_timeout_ms.max(1));
        cfg.handshake_timeout = Duration::from_millis(c.handshake_timeout_ms.max(1));
        cfg
    }

    /// Address the HTTP control surface binds to.
    pub fn http_addr(&self) -> Result<SocketAddr, BoxError> {
        format!("{}:{}", self.http.bind, self.http.port)
            .parse()
            .map_err(|e| BoxError::Config(format!("bad http bind address: {e}")))
    }

    /// Configured page template path, if any.
    pub fn page_path(&self) -> Option<PathBuf> {
        (!self.http.page.is_empty()).then(|| PathBuf::from(&self.http.page))
    }

    pub fn quantum(&self) -> Duration {
        Duration::from_millis(self.supervisor.quantum_ms.clamp(1, 1_000))
    }
}

// ── Tests ────────────────────────────────────────────────────────
