//! Wire shape of a zone as pushed by the home-automation side.
//!
//! Every field is optional on the wire; defaults are applied later by
//! [`StatusProjection`](crate::projection::StatusProjection), never here.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneSnapshot {
    #[serde(default)]
    pub entity_id: String,
    /// HVAC run state string, normally `heat` or `off`.
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub attributes: ZoneAttributes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneAttributes {
    pub friendly_name: Option<String>,
    pub current_temperature: Option<f32>,
    /// Generic target temperature of the climate entity.
    pub temperature: Option<f32>,
    pub min_temp: Option<f32>,
    pub max_temp: Option<f32>,
    pub preset_mode: Option<String>,
    pub status: ZoneStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneStatus {
    pub setpoints: Setpoints,
    pub setpoint_status: SetpointStatus,
    pub temperature_status: TemperatureStatus,
    #[serde(rename = "activeFaults")]
    pub active_faults: Vec<ActiveFault>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Setpoints {
    pub this_sp_from: Option<String>,
    pub this_sp_temp: Option<f32>,
    pub next_sp_from: Option<String>,
    pub next_sp_temp: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetpointStatus {
    pub setpoint_mode: Option<String>,
    pub target_heat_temperature: Option<f32>,
    pub until: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemperatureStatus {
    pub temperature: Option<f32>,
    pub is_available: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActiveFault {
    #[serde(rename = "faultType")]
    pub fault_type: Option<String>,
    pub since: Option<String>,
}
