use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MirrorConfig {
    pub server: ServerConfig,
    pub tools: ToolsConfig,
    pub control: ControlConfig,
    pub log: LogConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
    /// IP address the HTTP API binds to
    #[serde(default = "default_server_ip")]
    pub ip: String,

    /// Port the HTTP API listens on
    #[serde(default = "default_server_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ToolsConfig {
    /// Device listing tool
    #[serde(default = "default_adb_path")]
    pub adb_path: String,

    /// Init script of the relay service
    #[serde(default = "default_init_script")]
    pub init_script: String,

    /// Key-value store command line tool
    #[serde(default = "default_uci_path")]
    pub uci_path: String,

    /// Upper bound for any single external command
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ControlConfig {
    /// Period of the background status poll
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Delay before re-reading status after a successful action
    #[serde(default = "default_resync_delay_ms")]
    pub resync_delay_ms: u64,

    /// Number of notifications kept for polling clients
    #[serde(default = "default_notification_history")]
    pub notification_history: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LogConfig {
    /// Relay service log file
    #[serde(default = "default_log_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Uci,
    Memory,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StoreConfig {
    /// Where relay settings live
    #[serde(default = "default_store_backend")]
    pub backend: StoreBackend,

    /// Store namespace holding the relay settings
    #[serde(default = "default_store_namespace")]
    pub namespace: String,

    /// Section inside the namespace
    #[serde(default = "default_store_section")]
    pub section: String,
}

impl ToolsConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

impl ControlConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn resync_delay(&self) -> Duration {
        Duration::from_millis(self.resync_delay_ms)
    }
}

impl MirrorConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("mirrorctl.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("server.ip", default_server_ip())?
            .set_default("server.port", default_server_port())?
            .set_default("tools.adb_path", default_adb_path())?
            .set_default("tools.init_script", default_init_script())?
            .set_default("tools.uci_path", default_uci_path())?
            .set_default("tools.command_timeout_secs", default_command_timeout_secs())?
            .set_default("control.poll_interval_secs", default_poll_interval_secs())?
            .set_default("control.resync_delay_ms", default_resync_delay_ms())?
            .set_default(
                "control.notification_history",
                default_notification_history() as i64,
            )?
            .set_default("log.path", default_log_path())?
            .set_default("store.backend", "uci")?
            .set_default("store.namespace", default_store_namespace())?
            .set_default("store.section", default_store_section())?
            .add_source(File::with_name(&path_str).required(false))
            // MIRRORCTL_CONTROL__POLL_INTERVAL_SECS=10
            .add_source(
                Environment::with_prefix("MIRRORCTL")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: MirrorConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message(
                "Server port must be greater than 0".to_string(),
            ));
        }

        if self.tools.adb_path.trim().is_empty() {
            return Err(ConfigError::Message(
                "Device listing tool path must not be empty".to_string(),
            ));
        }

        if self.tools.init_script.trim().is_empty() {
            return Err(ConfigError::Message(
                "Init script path must not be empty".to_string(),
            ));
        }

        if self.tools.command_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "Command timeout must be greater than 0".to_string(),
            ));
        }

        if self.control.poll_interval_secs == 0 {
            return Err(ConfigError::Message(
                "Poll interval must be greater than 0".to_string(),
            ));
        }

        if self.control.notification_history == 0 {
            return Err(ConfigError::Message(
                "Notification history must be greater than 0".to_string(),
            ));
        }

        if self.store.namespace.is_empty() || self.store.section.is_empty() {
            return Err(ConfigError::Message(
                "Store namespace and section must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Render as TOML, used by `--print-config`
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                ip: default_server_ip(),
                port: default_server_port(),
            },
            tools: ToolsConfig {
                adb_path: default_adb_path(),
                init_script: default_init_script(),
                uci_path: default_uci_path(),
                command_timeout_secs: default_command_timeout_secs(),
            },
            control: ControlConfig {
                poll_interval_secs: default_poll_interval_secs(),
                resync_delay_ms: default_resync_delay_ms(),
                notification_history: default_notification_history(),
            },
            log: LogConfig {
                path: default_log_path(),
            },
            store: StoreConfig {
                backend: default_store_backend(),
                namespace: default_store_namespace(),
                section: default_store_section(),
            },
        }
    }
}

// Default value functions
fn default_server_ip() -> String {
    "0.0.0.0".to_string()
}
fn default_server_port() -> u16 {
    8088
}

fn default_adb_path() -> String {
    "adb".to_string()
}
fn default_init_script() -> String {
    "/etc/init.d/webdroidx".to_string()
}
fn default_uci_path() -> String {
    "uci".to_string()
}
fn default_command_timeout_secs() -> u64 {
    10
}

fn default_poll_interval_secs() -> u64 {
    5
}
fn default_resync_delay_ms() -> u64 {
    1000
}
fn default_notification_history() -> usize {
    50
}

fn default_log_path() -> String {
    "/var/log/webdroidx/webdroidx.log".to_string()
}

fn default_store_backend() -> StoreBackend {
    StoreBackend::Uci
}
fn default_store_namespace() -> String {
    "webdroidx".to_string()
}
fn default_store_section() -> String {
    "config".to_string()
}
