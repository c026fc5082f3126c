use crate::error::ConfigError;
use crate::store::ConfigStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const SERVER_PORT_KEY: &str = "server_port";
pub const DEVICE_KEY: &str = "device";
pub const VIDEO_BIT_RATE_KEY: &str = "video_bit_rate";

pub const DEFAULT_SERVER_PORT: u16 = 8000;
pub const DEFAULT_VIDEO_BIT_RATE: u64 = 1_024_000;

/// Where relay settings live inside the key-value store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsLocation {
    pub namespace: String,
    pub section: String,
}

impl SettingsLocation {
    pub fn new<N: Into<String>, S: Into<String>>(namespace: N, section: S) -> Self {
        Self {
            namespace: namespace.into(),
            section: section.into(),
        }
    }
}

/// Connection parameters of the relay service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelaySettings {
    /// Port the relay's web server listens on
    pub server_port: u16,
    /// Device to mirror, `None` for auto-detect
    pub device_id: Option<String>,
    pub video_bit_rate: u64,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            server_port: DEFAULT_SERVER_PORT,
            device_id: None,
            video_bit_rate: DEFAULT_VIDEO_BIT_RATE,
        }
    }
}

/// Parse a TCP port in 1..=65535
pub fn parse_port(key: &str, value: &str) -> Result<u16, ConfigError> {
    match value.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(ConfigError::invalid(
            key,
            value,
            "expected a port between 1 and 65535",
        )),
        Ok(port) => Ok(port),
    }
}

/// Parse an unsigned integer
pub fn parse_uinteger(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::invalid(key, value, "expected an unsigned integer"))
}

fn normalize_device(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl RelaySettings {
    /// Read settings, falling back to defaults for unset or empty keys
    pub async fn load(
        store: &dyn ConfigStore,
        location: &SettingsLocation,
    ) -> Result<Self, ConfigError> {
        let SettingsLocation { namespace, section } = location;
        store.load(namespace).await?;

        let server_port = match store.get(namespace, section, SERVER_PORT_KEY).await? {
            Some(value) if !value.trim().is_empty() => parse_port(SERVER_PORT_KEY, &value)?,
            _ => DEFAULT_SERVER_PORT,
        };

        let video_bit_rate = match store.get(namespace, section, VIDEO_BIT_RATE_KEY).await? {
            Some(value) if !value.trim().is_empty() => {
                parse_uinteger(VIDEO_BIT_RATE_KEY, &value)?
            }
            _ => DEFAULT_VIDEO_BIT_RATE,
        };

        let device_id = normalize_device(store.get(namespace, section, DEVICE_KEY).await?);

        let settings = Self {
            server_port,
            device_id,
            video_bit_rate,
        };
        debug!("Loaded relay settings: {:?}", settings);
        Ok(settings)
    }

    /// Trim the device id; an empty id means auto-detect
    pub fn normalized(mut self) -> Self {
        self.device_id = normalize_device(self.device_id);
        self
    }

    /// Reject values the relay cannot use
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_port == 0 {
            return Err(ConfigError::invalid(
                SERVER_PORT_KEY,
                "0",
                "expected a port between 1 and 65535",
            ));
        }

        if let Some(device) = &self.device_id {
            if device.chars().any(char::is_whitespace) {
                return Err(ConfigError::invalid(
                    DEVICE_KEY,
                    device.as_str(),
                    "device id must not contain whitespace",
                ));
            }
        }

        Ok(())
    }

    /// Validate, write every key and commit the namespace
    pub async fn save(
        &self,
        store: &dyn ConfigStore,
        location: &SettingsLocation,
    ) -> Result<(), ConfigError> {
        self.validate()?;
        let SettingsLocation { namespace, section } = location;

        store
            .set(namespace, section, SERVER_PORT_KEY, &self.server_port.to_string())
            .await?;
        store
            .set(
                namespace,
                section,
                DEVICE_KEY,
                self.device_id.as_deref().unwrap_or(""),
            )
            .await?;
        store
            .set(
                namespace,
                section,
                VIDEO_BIT_RATE_KEY,
                &self.video_bit_rate.to_string(),
            )
            .await?;
        store.commit(namespace).await?;

        info!("Relay settings saved");
        Ok(())
    }

    /// Persist only the selected device
    pub async fn save_device(
        store: &dyn ConfigStore,
        location: &SettingsLocation,
        device_id: Option<&str>,
    ) -> Result<(), ConfigError> {
        let SettingsLocation { namespace, section } = location;
        store
            .set(namespace, section, DEVICE_KEY, device_id.unwrap_or(""))
            .await?;
        store.commit(namespace).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn location() -> SettingsLocation {
        SettingsLocation::new("relay", "config")
    }

    #[test]
    fn test_port_validation() {
        assert_eq!(parse_port("p", "8000").unwrap(), 8000);
        assert_eq!(parse_port("p", " 65535 ").unwrap(), 65535);
        assert!(parse_port("p", "0").is_err());
        assert!(parse_port("p", "65536").is_err());
        assert!(parse_port("p", "-1").is_err());
        assert!(parse_port("p", "http").is_err());
    }

    #[test]
    fn test_uinteger_validation() {
        assert_eq!(parse_uinteger("b", "1024000").unwrap(), 1_024_000);
        assert_eq!(parse_uinteger("b", "0").unwrap(), 0);
        assert!(parse_uinteger("b", "-5").is_err());
        assert!(parse_uinteger("b", "1.5").is_err());
    }

    #[tokio::test]
    async fn test_load_defaults_from_empty_store() {
        let store = MemoryStore::new();

        let settings = RelaySettings::load(&store, &location()).await.unwrap();
        assert_eq!(settings, RelaySettings::default());
    }

    #[tokio::test]
    async fn test_load_rejects_invalid_port() {
        let store = MemoryStore::new();
        store
            .set("relay", "config", SERVER_PORT_KEY, "99999")
            .await
            .unwrap();

        let err = RelaySettings::load(&store, &location()).await.unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == SERVER_PORT_KEY));
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let store = MemoryStore::new();
        let settings = RelaySettings {
            server_port: 9000,
            device_id: Some("ABC123".to_string()),
            video_bit_rate: 2_000_000,
        };

        settings.save(&store, &location()).await.unwrap();
        assert_eq!(RelaySettings::load(&store, &location()).await.unwrap(), settings);

        RelaySettings::save_device(&store, &location(), None)
            .await
            .unwrap();
        let reloaded = RelaySettings::load(&store, &location()).await.unwrap();
        assert_eq!(reloaded.device_id, None);
        assert_eq!(reloaded.server_port, 9000);
    }

    #[test]
    fn test_blank_device_normalizes_to_auto_detect() {
        let blank = RelaySettings {
            device_id: Some("  ".to_string()),
            ..RelaySettings::default()
        };
        assert_eq!(blank.normalized().device_id, None);

        let padded = RelaySettings {
            device_id: Some(" ABC123\n".to_string()),
            ..RelaySettings::default()
        };
        assert_eq!(padded.normalized().device_id.as_deref(), Some("ABC123"));
    }

    #[tokio::test]
    async fn test_save_rejects_zero_port() {
        let store = MemoryStore::new();
        let settings = RelaySettings {
            server_port: 0,
            ..RelaySettings::default()
        };

        assert!(settings.save(&store, &location()).await.is_err());
        assert_eq!(store.get("relay", "config", SERVER_PORT_KEY).await.unwrap(), None);
    }
}
