mod poller;
mod surface;
mod types;

#[cfg(test)]
mod tests;

pub use poller::StatusPoller;
pub use surface::{ControlSurface, ControlSurfaceBuilder};
pub use types::{ActionKind, ActionOutcome, ActionSet, DeviceOptions, StatusSnapshot};
