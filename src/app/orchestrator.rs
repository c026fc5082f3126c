use crate::config::{MirrorConfig, StoreBackend};
use crate::control::{ControlSurface, StatusPoller};
use crate::device::DeviceEnumerator;
use crate::error::Result;
use crate::logview::LogView;
use crate::notify::Notifier;
use crate::process::{CommandRunner, TokioCommandRunner};
use crate::service::ServiceController;
use crate::settings::SettingsLocation;
use crate::store::{ConfigStore, MemoryStore, UciStore};
use std::sync::Arc;
use tracing::{debug, info};

/// Wires the control core together from configuration
pub struct MirrorApp {
    pub(super) config: MirrorConfig,
    pub(super) surface: ControlSurface,
    pub(super) poller: StatusPoller,
    pub(super) log: LogView,
}

impl MirrorApp {
    /// Build the app with real child processes bounded by the configured timeout
    pub fn new(config: MirrorConfig) -> Result<Self> {
        let runner: Arc<dyn CommandRunner> =
            Arc::new(TokioCommandRunner::new(config.tools.command_timeout()));
        Self::with_runner(config, runner)
    }

    /// Build the app around any command runner
    pub fn with_runner(config: MirrorConfig, runner: Arc<dyn CommandRunner>) -> Result<Self> {
        let store: Arc<dyn ConfigStore> = match config.store.backend {
            StoreBackend::Uci => Arc::new(UciStore::new(
                Arc::clone(&runner),
                config.tools.uci_path.clone(),
            )),
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
        };
        debug!("Using {:?} settings store", config.store.backend);

        let surface = ControlSurface::builder()
            .enumerator(DeviceEnumerator::new(
                Arc::clone(&runner),
                config.tools.adb_path.clone(),
            ))
            .controller(ServiceController::new(
                Arc::clone(&runner),
                config.tools.init_script.clone(),
            ))
            .store(store)
            .location(SettingsLocation::new(
                config.store.namespace.clone(),
                config.store.section.clone(),
            ))
            .notifier(Notifier::new(config.control.notification_history))
            .resync_delay(config.control.resync_delay())
            .build()?;

        let poller = StatusPoller::new(surface.clone(), config.control.poll_interval());
        let log = LogView::new(config.log.path.clone());

        info!("Control core ready (init script {})", config.tools.init_script);

        Ok(Self {
            config,
            surface,
            poller,
            log,
        })
    }

    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    pub fn surface(&self) -> &ControlSurface {
        &self.surface
    }

    pub fn poller(&self) -> &StatusPoller {
        &self.poller
    }

    pub fn log(&self) -> &LogView {
        &self.log
    }
}
