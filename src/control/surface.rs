use super::types::{ActionOutcome, DeviceOptions, StatusSnapshot};
use crate::device::DeviceEnumerator;
use crate::error::{ConfigError, EnumerationError, MirrorError, Result};
use crate::notify::Notifier;
use crate::service::{ServiceAction, ServiceController, ServiceState};
use crate::settings::{RelaySettings, SettingsLocation, DEFAULT_SERVER_PORT, DEVICE_KEY};
use crate::store::ConfigStore;
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Orchestrates device discovery and service control for the UI.
///
/// Cheap to clone; every clone shares the same state. Overlapping calls are
/// allowed and the last probe to complete decides the displayed state.
#[derive(Clone)]
pub struct ControlSurface {
    pub(crate) enumerator: Arc<DeviceEnumerator>,
    pub(crate) controller: Arc<ServiceController>,
    pub(crate) store: Arc<dyn ConfigStore>,
    pub(crate) location: SettingsLocation,
    pub(crate) notifier: Notifier,
    pub(crate) status: Arc<watch::Sender<StatusSnapshot>>,
    pub(crate) devices: Arc<RwLock<DeviceOptions>>,
    pub(crate) busy: Arc<Mutex<HashSet<ServiceAction>>>,
    pub(crate) resync_delay: Duration,
}

/// Marks an action in flight until dropped
struct BusyGuard {
    busy: Arc<Mutex<HashSet<ServiceAction>>>,
    action: ServiceAction,
}

impl BusyGuard {
    fn acquire(busy: &Arc<Mutex<HashSet<ServiceAction>>>, action: ServiceAction) -> Option<Self> {
        if busy.lock().insert(action) {
            Some(Self {
                busy: Arc::clone(busy),
                action,
            })
        } else {
            None
        }
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.busy.lock().remove(&self.action);
    }
}

impl ControlSurface {
    pub fn builder() -> ControlSurfaceBuilder {
        ControlSurfaceBuilder::new()
    }

    /// Load the stored device selection, then run a first device scan and
    /// status probe
    pub async fn initialize(&self) {
        match RelaySettings::load(self.store.as_ref(), &self.location).await {
            Ok(settings) => self.devices.write().selected = settings.device_id,
            Err(e) => {
                self.notifier
                    .warning(format!("Could not read relay settings: {}", e));
            }
        }

        let _ = self.refresh_devices().await;
        self.refresh_status().await;
    }

    /// Watch every published status snapshot
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.status.subscribe()
    }

    pub fn current_status(&self) -> StatusSnapshot {
        self.status.borrow().clone()
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Probe the service and publish the result to every observer
    pub async fn refresh_status(&self) -> StatusSnapshot {
        let snapshot = match self.controller.probe().await {
            Ok(state) => StatusSnapshot::new(state, false),
            Err(e) => {
                debug!("{}", e);
                StatusSnapshot::new(ServiceState::Unknown, true)
            }
        };

        let previous = self.status.send_replace(snapshot.clone());

        if snapshot.probe_failed && !previous.probe_failed {
            self.notifier
                .warning("Could not determine relay service status");
        }
        if previous.state != snapshot.state {
            info!(
                "Relay service state changed: {:?} -> {:?}",
                previous.state, snapshot.state
            );
        }

        snapshot
    }

    pub fn device_options(&self) -> DeviceOptions {
        self.devices.read().clone()
    }

    /// Rescan devices. On failure the previous list is kept.
    pub async fn refresh_devices(&self) -> std::result::Result<DeviceOptions, EnumerationError> {
        match self.enumerator.enumerate().await {
            Ok(devices) => {
                let count = devices.len();
                let options = {
                    let mut options = self.devices.write();
                    options.replace(devices);
                    options.clone()
                };
                self.notifier.info(format!("Found {} device(s)", count));
                Ok(options)
            }
            Err(e) => {
                self.notifier
                    .warning(format!("Device scan failed: {}", e));
                Err(e)
            }
        }
    }

    /// Select a listed device (or auto-detect) and persist the choice.
    /// The displayed selection only changes once the store accepted it.
    pub async fn select_device(&self, id: Option<&str>) -> Result<DeviceOptions> {
        if let Some(id) = id {
            if !self.devices.read().contains(id) {
                return Err(ConfigError::invalid(DEVICE_KEY, id, "device is not attached").into());
            }
        }

        RelaySettings::save_device(self.store.as_ref(), &self.location, id).await?;

        let mut options = self.devices.write();
        if !options.select(id) {
            debug!("Device {:?} vanished while saving, using auto-detect", id);
            options.selected = None;
        }
        Ok(options.clone())
    }

    /// Actions currently in flight
    pub fn busy_actions(&self) -> Vec<ServiceAction> {
        let busy = self.busy.lock();
        ServiceAction::ALL
            .into_iter()
            .filter(|action| busy.contains(action))
            .collect()
    }

    /// Run a lifecycle transition on behalf of the operator.
    ///
    /// The action's control is marked busy for the duration; a second request
    /// for the same action is rejected until the first finishes. A successful
    /// action schedules a status re-read after the resync delay.
    pub async fn perform_action(&self, action: ServiceAction) -> ActionOutcome {
        let Some(_guard) = BusyGuard::acquire(&self.busy, action) else {
            debug!("Service {} already in progress", action);
            return ActionOutcome::Busy;
        };

        match self.controller.apply(action).await {
            Ok(()) => {
                self.notifier
                    .info(format!("Relay service {}", action.past_tense()));
                self.schedule_resync();
                ActionOutcome::Completed
            }
            Err(e) => {
                self.notifier
                    .error(format!("Failed to {} relay service: {}", action, e));
                ActionOutcome::Failed(e)
            }
        }
    }

    /// Re-read the status once the service manager has had time to settle
    pub(crate) fn schedule_resync(&self) -> JoinHandle<()> {
        let surface = self.clone();
        let delay = self.resync_delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            surface.refresh_status().await;
        })
    }

    pub async fn settings(&self) -> std::result::Result<RelaySettings, ConfigError> {
        RelaySettings::load(self.store.as_ref(), &self.location).await
    }

    /// Validate and persist new relay settings
    pub async fn update_settings(&self, settings: RelaySettings) -> Result<RelaySettings> {
        let settings = settings.normalized();
        settings.save(self.store.as_ref(), &self.location).await?;

        {
            let mut options = self.devices.write();
            let id = settings.device_id.as_deref();
            if !options.select(id) {
                debug!("Saved device {:?} is not attached, showing auto-detect", id);
                options.selected = None;
            }
        }

        self.notifier.info("Relay settings saved");
        Ok(settings)
    }

    /// Address of the relay's web page on `host`, only while it is running
    pub async fn open_url(&self, host: &str) -> Option<String> {
        if !self.current_status().actions.open {
            debug!("Open requested while relay is not running");
            return None;
        }

        let port = match self.settings().await {
            Ok(settings) => settings.server_port,
            Err(e) => {
                warn!("Using default relay port: {}", e);
                DEFAULT_SERVER_PORT
            }
        };

        let url = format!("http://{}:{}", host, port);
        self.notifier.info(format!("Opening relay at {}", url));
        Some(url)
    }
}

/// Builder for [`ControlSurface`]
pub struct ControlSurfaceBuilder {
    enumerator: Option<DeviceEnumerator>,
    controller: Option<ServiceController>,
    store: Option<Arc<dyn ConfigStore>>,
    location: Option<SettingsLocation>,
    notifier: Option<Notifier>,
    resync_delay: Duration,
}

impl ControlSurfaceBuilder {
    pub fn new() -> Self {
        Self {
            enumerator: None,
            controller: None,
            store: None,
            location: None,
            notifier: None,
            resync_delay: Duration::from_secs(1),
        }
    }

    pub fn enumerator(mut self, enumerator: DeviceEnumerator) -> Self {
        self.enumerator = Some(enumerator);
        self
    }

    pub fn controller(mut self, controller: ServiceController) -> Self {
        self.controller = Some(controller);
        self
    }

    pub fn store(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn location(mut self, location: SettingsLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn resync_delay(mut self, delay: Duration) -> Self {
        self.resync_delay = delay;
        self
    }

    pub fn build(self) -> Result<ControlSurface> {
        let enumerator = self
            .enumerator
            .ok_or_else(|| MirrorError::system("Device enumerator is required"))?;
        let controller = self
            .controller
            .ok_or_else(|| MirrorError::system("Service controller is required"))?;
        let store = self
            .store
            .ok_or_else(|| MirrorError::system("Configuration store is required"))?;
        let location = self
            .location
            .ok_or_else(|| MirrorError::system("Settings location is required"))?;

        let (status, _) = watch::channel(StatusSnapshot::default());

        Ok(ControlSurface {
            enumerator: Arc::new(enumerator),
            controller: Arc::new(controller),
            store,
            location,
            notifier: self.notifier.unwrap_or_else(|| Notifier::new(50)),
            status: Arc::new(status),
            devices: Arc::new(RwLock::new(DeviceOptions::default())),
            busy: Arc::new(Mutex::new(HashSet::new())),
            resync_delay: self.resync_delay,
        })
    }
}

impl Default for ControlSurfaceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
