use crate::error::ConfigError;
use crate::process::CommandRunner;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// External key-value store addressed by (namespace, section, key)
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Make sure a namespace is readable before values are requested from it
    async fn load(&self, namespace: &str) -> Result<(), ConfigError>;

    /// Read a value, `None` when the key is not set
    async fn get(
        &self,
        namespace: &str,
        section: &str,
        key: &str,
    ) -> Result<Option<String>, ConfigError>;

    /// Stage a value
    async fn set(
        &self,
        namespace: &str,
        section: &str,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError>;

    /// Persist staged values of a namespace
    async fn commit(&self, namespace: &str) -> Result<(), ConfigError>;
}

/// Store backed by the `uci` command line tool
pub struct UciStore {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl UciStore {
    pub fn new<S: Into<String>>(runner: Arc<dyn CommandRunner>, program: S) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    async fn invoke(&self, args: &[&str]) -> Result<crate::process::CommandOutput, ConfigError> {
        self.runner
            .run(&self.program, args)
            .await
            .map_err(|e| ConfigError::Store {
                details: format!("could not run {}: {}", self.program, e),
            })
    }
}

#[async_trait]
impl ConfigStore for UciStore {
    async fn load(&self, namespace: &str) -> Result<(), ConfigError> {
        let output = self.invoke(&["-q", "show", namespace]).await?;
        if output.success() {
            Ok(())
        } else {
            Err(ConfigError::Store {
                details: format!("namespace '{}' unavailable: {}", namespace, output.describe()),
            })
        }
    }

    async fn get(
        &self,
        namespace: &str,
        section: &str,
        key: &str,
    ) -> Result<Option<String>, ConfigError> {
        let path = format!("{}.{}.{}", namespace, section, key);
        let output = self.invoke(&["-q", "get", &path]).await?;

        // uci exits nonzero for an unset option
        if output.success() {
            Ok(Some(output.stdout.trim_end_matches('\n').to_string()))
        } else {
            debug!("{} is not set", path);
            Ok(None)
        }
    }

    async fn set(
        &self,
        namespace: &str,
        section: &str,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let assignment = format!("{}.{}.{}={}", namespace, section, key, value);
        let output = self.invoke(&["set", &assignment]).await?;

        if output.success() {
            Ok(())
        } else {
            Err(ConfigError::Store {
                details: format!("set {} failed: {}", assignment, output.describe()),
            })
        }
    }

    async fn commit(&self, namespace: &str) -> Result<(), ConfigError> {
        let output = self.invoke(&["commit", namespace]).await?;

        if output.success() {
            Ok(())
        } else {
            Err(ConfigError::Store {
                details: format!("commit {} failed: {}", namespace, output.describe()),
            })
        }
    }
}

/// In-process store for dry runs and tests
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: Arc<RwLock<HashMap<(String, String, String), String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn load(&self, _namespace: &str) -> Result<(), ConfigError> {
        Ok(())
    }

    async fn get(
        &self,
        namespace: &str,
        section: &str,
        key: &str,
    ) -> Result<Option<String>, ConfigError> {
        let key = (namespace.to_string(), section.to_string(), key.to_string());
        Ok(self.values.read().get(&key).cloned())
    }

    async fn set(
        &self,
        namespace: &str,
        section: &str,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let key = (namespace.to_string(), section.to_string(), key.to_string());
        self.values.write().insert(key, value.to_string());
        Ok(())
    }

    async fn commit(&self, _namespace: &str) -> Result<(), ConfigError> {
        Ok(())
    }
}
