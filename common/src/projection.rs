use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};

use crate::{
    draft::TEMP_STEP,
    snapshot::ZoneSnapshot,
    types::{HvacMode, SetpointMode},
};

pub const DEFAULT_MIN_TEMP: f32 = 5.0;
pub const DEFAULT_MAX_TEMP: f32 = 35.0;
pub const DEFAULT_ZONE_NAME: &str = "Zone";
pub const DEFAULT_FAULT_TEXT: &str = "Fault detected";

/// Normalised view of a [`ZoneSnapshot`].
///
/// Built by [`StatusProjection::project`], which is total and pure: the same
/// snapshot always yields an equal projection, so callers re-derive it on
/// every delivery instead of caching.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusProjection {
    pub friendly_name: String,
    pub current_temp: Option<f32>,
    pub target_temp: Option<f32>,
    pub preset_mode: Option<String>,
    /// `None` when the entity state is neither `heat` nor `off`.
    pub hvac_mode: Option<HvacMode>,
    pub min_temp: f32,
    pub max_temp: f32,
    pub this_sp_from: Option<DateTime<FixedOffset>>,
    pub this_sp_temp: Option<f32>,
    pub next_sp_from: Option<DateTime<FixedOffset>>,
    pub next_sp_temp: Option<f32>,
    pub setpoint_mode: SetpointMode,
    pub target_heat_temp: Option<f32>,
    pub override_until: Option<DateTime<FixedOffset>>,
    pub sensor_temp: Option<f32>,
    pub sensor_available: bool,
    pub active_faults: Vec<String>,
}

impl StatusProjection {
    pub fn project(snapshot: &ZoneSnapshot, name_override: Option<&str>) -> Self {
        let attrs = &snapshot.attributes;
        let status = &attrs.status;
        let (min_temp, max_temp) = temperature_bounds(attrs.min_temp, attrs.max_temp);

        let friendly_name = name_override
            .filter(|name| !name.trim().is_empty())
            .or(attrs.friendly_name.as_deref().filter(|name| !name.is_empty()))
            .unwrap_or(DEFAULT_ZONE_NAME)
            .to_string();

        Self {
            friendly_name,
            current_temp: finite(attrs.current_temperature),
            target_temp: finite(attrs.temperature),
            preset_mode: attrs.preset_mode.clone(),
            hvac_mode: HvacMode::from_state(&snapshot.state),
            min_temp,
            max_temp,
            this_sp_from: parse_timestamp(status.setpoints.this_sp_from.as_deref()),
            this_sp_temp: finite(status.setpoints.this_sp_temp),
            next_sp_from: parse_timestamp(status.setpoints.next_sp_from.as_deref()),
            next_sp_temp: finite(status.setpoints.next_sp_temp),
            setpoint_mode: SetpointMode::parse(status.setpoint_status.setpoint_mode.as_deref()),
            target_heat_temp: finite(status.setpoint_status.target_heat_temperature),
            override_until: parse_timestamp(status.setpoint_status.until.as_deref()),
            sensor_temp: finite(status.temperature_status.temperature),
            sensor_available: status.temperature_status.is_available != Some(false),
            active_faults: status
                .active_faults
                .iter()
                .map(|fault| {
                    fault
                        .fault_type
                        .clone()
                        .filter(|text| !text.is_empty())
                        .unwrap_or_else(|| DEFAULT_FAULT_TEXT.to_string())
                })
                .collect(),
        }
    }

    pub fn is_override(&self) -> bool {
        self.setpoint_mode.is_override()
    }

    pub fn is_off(&self) -> bool {
        self.hvac_mode == Some(HvacMode::Off)
    }

    /// The temperature the zone is actually aiming for. This is the only
    /// place that decides between override target, scheduled setpoint and
    /// the generic entity target.
    pub fn effective_target(&self) -> Option<f32> {
        if self.is_override() {
            self.target_heat_temp.or(self.target_temp)
        } else {
            self.this_sp_temp.or(self.target_temp)
        }
    }
}

fn finite(value: Option<f32>) -> Option<f32> {
    value.filter(|v| v.is_finite())
}

/// Sanitised setpoint bounds. Falls back to the defaults when the range is
/// inverted or holds no multiple of [`TEMP_STEP`].
pub fn temperature_bounds(min: Option<f32>, max: Option<f32>) -> (f32, f32) {
    let min = finite(min).unwrap_or(DEFAULT_MIN_TEMP);
    let max = finite(max).unwrap_or(DEFAULT_MAX_TEMP);
    if min < max && (min / TEMP_STEP).ceil() * TEMP_STEP <= max {
        (min, max)
    } else {
        (DEFAULT_MIN_TEMP, DEFAULT_MAX_TEMP)
    }
}

/// RFC 3339, or a naive `YYYY-MM-DDTHH:MM:SS` taken as UTC.
fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<FixedOffset>> {
    let raw = raw?.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed);
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc().fixed_offset())
        .or_else(|| raw.parse::<DateTime<Utc>>().ok().map(|dt| dt.fixed_offset()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{ActiveFault, SetpointStatus, Setpoints, ZoneAttributes, ZoneStatus};
    use pretty_assertions::assert_eq;

    fn schedule_snapshot() -> ZoneSnapshot {
        ZoneSnapshot {
            entity_id: "climate.living_room".to_string(),
            state: "heat".to_string(),
            attributes: ZoneAttributes {
                friendly_name: Some("Living Room".to_string()),
                current_temperature: Some(20.0),
                temperature: Some(21.0),
                min_temp: Some(5.0),
                max_temp: Some(35.0),
                preset_mode: None,
                status: ZoneStatus {
                    setpoints: Setpoints {
                        this_sp_from: Some("2026-02-27T10:00:00Z".to_string()),
                        this_sp_temp: Some(19.5),
                        next_sp_from: Some("2026-02-27T11:00:00Z".to_string()),
                        next_sp_temp: Some(19.0),
                    },
                    setpoint_status: SetpointStatus {
                        setpoint_mode: Some("FollowSchedule".to_string()),
                        target_heat_temperature: Some(21.0),
                        until: None,
                    },
                    ..ZoneStatus::default()
                },
            },
        }
    }

    #[test]
    fn projecting_twice_is_identical() {
        let snapshot = schedule_snapshot();
        let first = StatusProjection::project(&snapshot, None);
        let second = StatusProjection::project(&snapshot, None);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_snapshot_uses_fallbacks() {
        let projection = StatusProjection::project(&ZoneSnapshot::default(), None);

        assert_eq!(projection.friendly_name, "Zone");
        assert_eq!(projection.current_temp, None);
        assert_eq!(projection.min_temp, 5.0);
        assert_eq!(projection.max_temp, 35.0);
        assert_eq!(projection.setpoint_mode, SetpointMode::FollowSchedule);
        assert_eq!(projection.hvac_mode, None);
        assert!(projection.sensor_available);
        assert!(projection.active_faults.is_empty());
        assert_eq!(projection.effective_target(), None);
    }

    #[test]
    fn inverted_bounds_fall_back_to_defaults() {
        let mut snapshot = schedule_snapshot();
        snapshot.attributes.min_temp = Some(30.0);
        snapshot.attributes.max_temp = Some(10.0);

        let projection = StatusProjection::project(&snapshot, None);

        assert_eq!((projection.min_temp, projection.max_temp), (5.0, 35.0));
    }

    #[test]
    fn bounds_without_a_half_step_fall_back_to_defaults() {
        let mut snapshot = schedule_snapshot();
        snapshot.attributes.min_temp = Some(20.1);
        snapshot.attributes.max_temp = Some(20.3);
        let projection = StatusProjection::project(&snapshot, None);
        assert_eq!((projection.min_temp, projection.max_temp), (5.0, 35.0));

        snapshot.attributes.max_temp = Some(20.6);
        let projection = StatusProjection::project(&snapshot, None);
        assert_eq!((projection.min_temp, projection.max_temp), (20.1, 20.6));
    }

    #[test]
    fn name_override_wins() {
        let projection = StatusProjection::project(&schedule_snapshot(), Some("Lounge"));
        assert_eq!(projection.friendly_name, "Lounge");
    }

    #[test]
    fn schedule_target_prefers_current_setpoint() {
        let projection = StatusProjection::project(&schedule_snapshot(), None);
        assert_eq!(projection.effective_target(), Some(19.5));

        let mut snapshot = schedule_snapshot();
        snapshot.attributes.status.setpoints.this_sp_temp = None;
        let projection = StatusProjection::project(&snapshot, None);
        assert_eq!(projection.effective_target(), Some(21.0));
    }

    #[test]
    fn override_target_prefers_override_temperature() {
        let mut snapshot = schedule_snapshot();
        snapshot.attributes.status.setpoint_status = SetpointStatus {
            setpoint_mode: Some("TemporaryOverride".to_string()),
            target_heat_temperature: Some(23.0),
            until: Some("2026-02-27T12:00:00Z".to_string()),
        };

        let projection = StatusProjection::project(&snapshot, None);

        assert_eq!(projection.effective_target(), Some(23.0));
        assert!(projection.override_until.is_some());

        snapshot
            .attributes
            .status
            .setpoint_status
            .target_heat_temperature = None;
        let projection = StatusProjection::project(&snapshot, None);
        assert_eq!(projection.effective_target(), Some(21.0));
    }

    #[test]
    fn faults_without_type_get_default_text() {
        let mut snapshot = schedule_snapshot();
        snapshot.attributes.status.active_faults = vec![
            ActiveFault {
                fault_type: Some("TempZoneActuatorLowBattery".to_string()),
                since: None,
            },
            ActiveFault::default(),
        ];

        let projection = StatusProjection::project(&snapshot, None);

        assert_eq!(
            projection.active_faults,
            vec![
                "TempZoneActuatorLowBattery".to_string(),
                "Fault detected".to_string()
            ]
        );
    }

    #[test]
    fn parses_naive_and_offset_timestamps() {
        assert!(parse_timestamp(Some("2026-02-27T12:00:00+01:00")).is_some());
        assert!(parse_timestamp(Some("2026-02-27T12:00:00")).is_some());
        assert_eq!(parse_timestamp(Some("not a time")), None);
        assert_eq!(parse_timestamp(None), None);
    }
}
