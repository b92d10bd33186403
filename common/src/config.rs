use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("you must define an entity (climate.xxx)")]
    MissingEntity,
}

fn default_true() -> bool {
    true
}

/// Card options as they appear in `runtime.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSettings {
    #[serde(default)]
    pub entity: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub show_hvac_toggle: bool,
    #[serde(default = "default_true")]
    pub show_accent_bar: bool,
    #[serde(default)]
    pub temp_pills: bool,
    #[serde(default)]
    pub compact: bool,
}

impl Default for CardSettings {
    fn default() -> Self {
        Self {
            entity: None,
            name: None,
            show_hvac_toggle: true,
            show_accent_bar: true,
            temp_pills: false,
            compact: false,
        }
    }
}

/// Validated card configuration. Only `entity` and `name` influence the
/// core; the remaining flags are passed through to the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardConfig {
    pub entity: String,
    pub name: Option<String>,
    pub show_hvac_toggle: bool,
    pub show_accent_bar: bool,
    pub temp_pills: bool,
    pub compact: bool,
}

impl CardConfig {
    pub fn new(entity: impl Into<String>) -> Result<Self, ConfigError> {
        Self::from_settings(&CardSettings {
            entity: Some(entity.into()),
            ..CardSettings::default()
        })
    }

    pub fn from_settings(settings: &CardSettings) -> Result<Self, ConfigError> {
        let entity = settings
            .entity
            .as_deref()
            .map(str::trim)
            .filter(|entity| !entity.is_empty())
            .ok_or(ConfigError::MissingEntity)?;

        Ok(Self {
            entity: entity.to_string(),
            name: settings
                .name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            show_hvac_toggle: settings.show_hvac_toggle,
            show_accent_bar: settings.show_accent_bar,
            temp_pills: settings.temp_pills,
            compact: settings.compact,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mqtt_host: "127.0.0.1".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub card: CardSettings,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

fn default_timezone() -> String {
    "Europe/London".to_string()
}

fn default_http_port() -> u16 {
    8080
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            card: CardSettings::default(),
            timezone: default_timezone(),
            network: NetworkConfig::default(),
            http_port: default_http_port(),
        }
    }
}
