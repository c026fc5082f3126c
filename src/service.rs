use crate::error::ServiceError;
use crate::process::CommandRunner;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Running state of the relay service as last observed by a status probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Running,
    Stopped,
    /// No probe has completed yet, or the last probe could not run
    #[default]
    Unknown,
}

impl ServiceState {
    pub fn is_running(&self) -> bool {
        matches!(self, ServiceState::Running)
    }

    /// Label shown to the operator. Unknown is displayed as stopped.
    pub fn label(&self) -> &'static str {
        match self {
            ServiceState::Running => "RUNNING",
            ServiceState::Stopped | ServiceState::Unknown => "STOPPED",
        }
    }
}

/// Lifecycle transitions an operator can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
}

impl ServiceAction {
    pub const ALL: [ServiceAction; 3] =
        [ServiceAction::Start, ServiceAction::Stop, ServiceAction::Restart];

    /// Service manager verb that performs the transition
    pub fn verb(&self) -> &'static str {
        match self {
            ServiceAction::Start => "start",
            ServiceAction::Stop => "stop",
            ServiceAction::Restart => "restart",
        }
    }

    /// Boot persistence verb issued after the transition, if any
    pub fn follow_up(&self) -> Option<&'static str> {
        match self {
            ServiceAction::Start => Some("enable"),
            ServiceAction::Stop => Some("disable"),
            ServiceAction::Restart => None,
        }
    }

    pub fn past_tense(&self) -> &'static str {
        match self {
            ServiceAction::Start => "started",
            ServiceAction::Stop => "stopped",
            ServiceAction::Restart => "restarted",
        }
    }
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

impl FromStr for ServiceAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "start" => Ok(ServiceAction::Start),
            "stop" => Ok(ServiceAction::Stop),
            "restart" => Ok(ServiceAction::Restart),
            other => Err(format!("unknown service action '{}'", other)),
        }
    }
}

/// Drives the relay's init script
pub struct ServiceController {
    runner: Arc<dyn CommandRunner>,
    script: String,
}

impl ServiceController {
    pub fn new<S: Into<String>>(runner: Arc<dyn CommandRunner>, script: S) -> Self {
        Self {
            runner,
            script: script.into(),
        }
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    /// Run the `status` verb. Exit code 0 is running, anything else stopped.
    pub async fn probe(&self) -> Result<ServiceState, ServiceError> {
        let output = self
            .runner
            .run(&self.script, &["status"])
            .await
            .map_err(|e| ServiceError::ProbeFailed {
                reason: format!("could not run {} status: {}", self.script, e),
            })?;

        let state = if output.success() {
            ServiceState::Running
        } else {
            ServiceState::Stopped
        };

        debug!("Status probe: {} ({})", state.label(), output.describe());
        Ok(state)
    }

    /// Probe, collapsing an invocation failure to `Unknown`. Never reports
    /// running unless the probe exited 0.
    pub async fn status(&self) -> ServiceState {
        match self.probe().await {
            Ok(state) => state,
            Err(e) => {
                warn!("{}", e);
                ServiceState::Unknown
            }
        }
    }

    /// Issue a lifecycle transition.
    ///
    /// Success depends only on the transition verb. The boot persistence
    /// verb that follows start/stop is best effort and only logged.
    pub async fn apply(&self, action: ServiceAction) -> Result<(), ServiceError> {
        info!("Issuing service {}", action);

        let transition_args = [action.verb()];
        let transition = self.runner.run(&self.script, &transition_args);
        let outcome = match action.follow_up() {
            Some(verb) => {
                let follow_up_args = [verb];
                let (transition, follow_up) = tokio::join!(
                    transition,
                    self.runner.run(&self.script, &follow_up_args)
                );

                match follow_up {
                    Ok(output) if output.success() => {
                        debug!("{} {} succeeded", self.script, verb)
                    }
                    Ok(output) => warn!("{} {} failed: {}", self.script, verb, output.describe()),
                    Err(e) => warn!("Could not run {} {}: {}", self.script, verb, e),
                }

                transition
            }
            None => transition.await,
        };

        match outcome {
            Ok(output) if output.success() => {
                info!("Service {}", action.past_tense());
                Ok(())
            }
            Ok(output) => Err(ServiceError::ActionFailed {
                action,
                reason: output.describe(),
            }),
            Err(e) => Err(ServiceError::ActionFailed {
                action,
                reason: format!("could not run {}: {}", self.script, e),
            }),
        }
    }
}
