use crate::device::Device;
use crate::error::ServiceError;
use crate::service::{ServiceAction, ServiceState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operator controls whose enablement follows the service state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Start,
    Stop,
    Restart,
    /// Open the relay's own web page
    Open,
}

impl From<ServiceAction> for ActionKind {
    fn from(action: ServiceAction) -> Self {
        match action {
            ServiceAction::Start => ActionKind::Start,
            ServiceAction::Stop => ActionKind::Stop,
            ServiceAction::Restart => ActionKind::Restart,
        }
    }
}

/// Which controls are enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSet {
    pub start: bool,
    pub stop: bool,
    pub restart: bool,
    pub open: bool,
}

impl ActionSet {
    /// Enablement is a pure function of the service state
    pub fn for_state(state: ServiceState) -> Self {
        let running = state.is_running();
        Self {
            start: !running,
            stop: running,
            restart: running,
            open: running,
        }
    }

    pub fn is_enabled(&self, kind: ActionKind) -> bool {
        match kind {
            ActionKind::Start => self.start,
            ActionKind::Stop => self.stop,
            ActionKind::Restart => self.restart,
            ActionKind::Open => self.open,
        }
    }
}

/// What observers see after each status probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub state: ServiceState,
    pub label: String,
    pub actions: ActionSet,
    /// The last probe could not run, so `state` is a guess
    pub probe_failed: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl StatusSnapshot {
    pub fn new(state: ServiceState, probe_failed: bool) -> Self {
        Self {
            state,
            label: state.label().to_string(),
            actions: ActionSet::for_state(state),
            probe_failed,
            updated_at: Some(Utc::now()),
        }
    }
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        let state = ServiceState::Unknown;
        Self {
            state,
            label: state.label().to_string(),
            actions: ActionSet::for_state(state),
            probe_failed: false,
            updated_at: None,
        }
    }
}

/// The single device list model the settings form renders from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceOptions {
    pub devices: Vec<Device>,
    /// Selected device id, `None` for auto-detect
    pub selected: Option<String>,
}

impl DeviceOptions {
    pub fn contains(&self, id: &str) -> bool {
        self.devices.iter().any(|d| d.id() == id)
    }

    /// Replace the whole list. The selection survives only if still listed.
    pub fn replace(&mut self, devices: Vec<Device>) {
        self.devices = devices;
        if let Some(selected) = &self.selected {
            if !self.contains(selected) {
                self.selected = None;
            }
        }
    }

    /// Select a listed device, or auto-detect with `None`
    pub fn select(&mut self, id: Option<&str>) -> bool {
        match id {
            None => {
                self.selected = None;
                true
            }
            Some(id) if self.contains(id) => {
                self.selected = Some(id.to_string());
                true
            }
            Some(_) => false,
        }
    }
}

/// Result of a requested lifecycle transition
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Completed,
    Failed(ServiceError),
    /// The same action is already in flight
    Busy,
}

impl ActionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ActionOutcome::Completed)
    }
}
