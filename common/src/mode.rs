use serde::Serialize;

use crate::{projection::StatusProjection, types::SetpointMode};

/// Read model of the zone's override state. It never transitions by itself;
/// a new value only appears when a new projection arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ZoneMode {
    Off,
    Schedule,
    TemporaryOverride,
    PermanentOverride,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ZoneAction {
    /// Temporary override with the staged duration.
    Override,
    Permanent,
    BackToSchedule,
    UpdateOverride,
}

impl ZoneMode {
    pub fn derive(projection: &StatusProjection) -> Self {
        if projection.is_off() {
            return Self::Off;
        }
        Self::for_setpoint(projection.setpoint_mode)
    }

    /// Mode the override controls act on, ignoring the run state.
    pub fn for_setpoint(setpoint_mode: SetpointMode) -> Self {
        match setpoint_mode {
            SetpointMode::TemporaryOverride => Self::TemporaryOverride,
            SetpointMode::PermanentOverride => Self::PermanentOverride,
            SetpointMode::FollowSchedule => Self::Schedule,
        }
    }

    pub fn is_override(self) -> bool {
        matches!(self, Self::TemporaryOverride | Self::PermanentOverride)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::Schedule => "Schedule",
            Self::TemporaryOverride => "Override",
            Self::PermanentOverride => "Permanent",
        }
    }

    /// Actions offered for this mode given whether the draft is dirty.
    /// `Off` offers the same as `Schedule`.
    pub fn legal_actions(self, dirty: bool) -> Vec<ZoneAction> {
        match (self.is_override(), dirty) {
            (false, false) => Vec::new(),
            (false, true) => vec![ZoneAction::Override, ZoneAction::Permanent],
            (true, false) => vec![ZoneAction::BackToSchedule],
            (true, true) => vec![ZoneAction::BackToSchedule, ZoneAction::UpdateOverride],
        }
    }

    pub fn allows(self, dirty: bool, action: ZoneAction) -> bool {
        self.legal_actions(dirty).contains(&action)
    }
}
