pub mod app;
pub mod config;
pub mod control;
pub mod device;
pub mod error;
pub mod logview;
pub mod notify;
pub mod process;
pub mod service;
pub mod settings;
pub mod store;

#[cfg(feature = "http")]
pub mod server;

pub use app::{MirrorApp, ShutdownReason};
pub use config::MirrorConfig;
pub use control::{
    ActionKind, ActionOutcome, ActionSet, ControlSurface, ControlSurfaceBuilder, DeviceOptions,
    StatusPoller, StatusSnapshot,
};
pub use device::{parse_device_list, Device, DeviceEnumerator};
pub use error::{ConfigError, EnumerationError, LogError, MirrorError, Result, ServiceError};
pub use logview::LogView;
pub use notify::{Notification, NotificationLevel, Notifier};
pub use process::{CommandOutput, CommandRunner, MockCommandRunner, TokioCommandRunner};
pub use service::{ServiceAction, ServiceController, ServiceState};
pub use settings::{RelaySettings, SettingsLocation};
pub use store::{ConfigStore, MemoryStore, UciStore};

#[cfg(feature = "http")]
pub use server::{ControlServer, ServerState};
