use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    topics::{TOPIC_CMD_CLEAR_OVERRIDE, TOPIC_CMD_SET_HVAC_MODE, TOPIC_CMD_SET_OVERRIDE},
    types::HvacMode,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideDuration {
    pub hours: u16,
    pub minutes: u16,
}

impl OverrideDuration {
    pub fn from_minutes(total: u16) -> Self {
        Self {
            hours: total / 60,
            minutes: total % 60,
        }
    }

    pub fn total_minutes(self) -> u32 {
        u32::from(self.hours) * 60 + u32::from(self.minutes)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetOverride {
    pub entity_id: String,
    pub setpoint: f32,
    /// Omitted for a permanent override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<OverrideDuration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearOverride {
    pub entity_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetHvacMode {
    pub entity_id: String,
    pub hvac_mode: HvacMode,
}

/// The three command shapes accepted by the remote override service.
#[derive(Debug, Clone, PartialEq)]
pub enum ZoneCommand {
    SetOverride(SetOverride),
    ClearOverride(ClearOverride),
    SetHvacMode(SetHvacMode),
}

/// Failure signal from the command sink. Carries no structure beyond a
/// human readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("command rejected: {0}")]
pub struct CommandRejected(pub String);

#[derive(Debug, Error)]
pub enum CommandDecodeError {
    #[error("no command is published on topic {0}")]
    UnknownTopic(String),
    #[error("malformed command payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl ZoneCommand {
    pub fn entity_id(&self) -> &str {
        match self {
            Self::SetOverride(cmd) => &cmd.entity_id,
            Self::ClearOverride(cmd) => &cmd.entity_id,
            Self::SetHvacMode(cmd) => &cmd.entity_id,
        }
    }

    pub fn topic(&self) -> &'static str {
        match self {
            Self::SetOverride(_) => TOPIC_CMD_SET_OVERRIDE,
            Self::ClearOverride(_) => TOPIC_CMD_CLEAR_OVERRIDE,
            Self::SetHvacMode(_) => TOPIC_CMD_SET_HVAC_MODE,
        }
    }

    pub fn to_payload(&self) -> serde_json::Result<Vec<u8>> {
        match self {
            Self::SetOverride(cmd) => serde_json::to_vec(cmd),
            Self::ClearOverride(cmd) => serde_json::to_vec(cmd),
            Self::SetHvacMode(cmd) => serde_json::to_vec(cmd),
        }
    }

    pub fn decode(topic: &str, payload: &[u8]) -> Result<Self, CommandDecodeError> {
        match topic {
            TOPIC_CMD_SET_OVERRIDE => Ok(Self::SetOverride(serde_json::from_slice(payload)?)),
            TOPIC_CMD_CLEAR_OVERRIDE => Ok(Self::ClearOverride(serde_json::from_slice(payload)?)),
            TOPIC_CMD_SET_HVAC_MODE => Ok(Self::SetHvacMode(serde_json::from_slice(payload)?)),
            other => Err(CommandDecodeError::UnknownTopic(other.to_string())),
        }
    }
}
