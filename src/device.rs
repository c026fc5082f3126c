use crate::error::EnumerationError;
use crate::process::CommandRunner;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// State marker the listing tool prints for a ready, authorized device
const READY_STATE: &str = "device";

/// An attached device, identified by the token the listing tool prints
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Device(String);

impl Device {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse the tabular output of `adb devices`.
///
/// The first non-blank line is a header. Every following line whose second
/// whitespace-separated token is exactly `device` contributes its first
/// token. Offline, unauthorized and malformed lines are skipped. Order and
/// duplicates are kept as printed.
pub fn parse_device_list(output: &str) -> Vec<Device> {
    output
        .trim_start()
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut tokens = line.split_whitespace();
            match (tokens.next(), tokens.next()) {
                (Some(id), Some(READY_STATE)) => Some(Device::new(id)),
                _ => None,
            }
        })
        .collect()
}

/// Lists attached devices by running the external listing tool
pub struct DeviceEnumerator {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl DeviceEnumerator {
    pub fn new<S: Into<String>>(runner: Arc<dyn CommandRunner>, program: S) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run `<program> devices` once and parse the result. No retries.
    pub async fn enumerate(&self) -> Result<Vec<Device>, EnumerationError> {
        let output = self
            .runner
            .run(&self.program, &["devices"])
            .await
            .map_err(|e| {
                warn!("Could not run {}: {}", self.program, e);
                EnumerationError::ExecutionFailed {
                    reason: format!("could not run {}: {}", self.program, e),
                }
            })?;

        if !output.success() {
            warn!("{} devices failed with {}", self.program, output.describe());
            return Err(EnumerationError::ExecutionFailed {
                reason: format!("{} devices: {}", self.program, output.describe()),
            });
        }

        let devices = parse_device_list(&output.stdout);
        debug!("Enumerated {} device(s)", devices.len());
        Ok(devices)
    }
}
