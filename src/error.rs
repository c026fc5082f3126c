use crate::service::ServiceAction;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("Device enumeration error: {0}")]
    Enumeration(#[from] EnumerationError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Log error: {0}")]
    Log(#[from] LogError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("System error: {message}")]
    System { message: String },
}

impl MirrorError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }
}

/// Failures of the external device listing tool
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnumerationError {
    #[error("Device listing failed: {reason}")]
    ExecutionFailed { reason: String },
}

/// Failures talking to the external service manager
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Status probe failed: {reason}")]
    ProbeFailed { reason: String },

    #[error("Service {action} failed: {reason}")]
    ActionFailed {
        action: ServiceAction,
        reason: String,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Configuration store error: {details}")]
    Store { details: String },
}

impl ConfigError {
    pub fn invalid<K: Into<String>, V: Into<String>, R: Into<String>>(
        key: K,
        value: V,
        reason: R,
    ) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum LogError {
    #[error("Failed to read log {path}: {source}")]
    ReadFailed {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to write log {path}: {source}")]
    WriteFailed {
        path: String,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, MirrorError>;
