use serde::{Deserialize, Serialize};

/// HVAC run state of a zone as reported by the climate entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HvacMode {
    Heat,
    Off,
}

impl HvacMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Heat => "heat",
            Self::Off => "off",
        }
    }

    /// Maps an entity state string. Anything other than `heat`/`off`
    /// (e.g. `unavailable`) is not a run state.
    pub fn from_state(state: &str) -> Option<Self> {
        match state {
            "heat" => Some(Self::Heat),
            "off" => Some(Self::Off),
            _ => None,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Heat => Self::Off,
            Self::Off => Self::Heat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetpointMode {
    FollowSchedule,
    TemporaryOverride,
    PermanentOverride,
}

impl SetpointMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FollowSchedule => "FollowSchedule",
            Self::TemporaryOverride => "TemporaryOverride",
            Self::PermanentOverride => "PermanentOverride",
        }
    }

    /// Unknown or missing modes fall back to `FollowSchedule`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("TemporaryOverride") => Self::TemporaryOverride,
            Some("PermanentOverride") => Self::PermanentOverride,
            _ => Self::FollowSchedule,
        }
    }

    pub fn is_override(self) -> bool {
        matches!(self, Self::TemporaryOverride | Self::PermanentOverride)
    }
}
