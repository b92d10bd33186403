use chrono::{DateTime, Duration, SecondsFormat, Utc};

use zonecard_common::{
    snapshot::{SetpointStatus, Setpoints, TemperatureStatus, ZoneAttributes, ZoneStatus},
    HvacMode, SetpointMode, ZoneCommand, ZoneSnapshot,
};

const SCHEDULED_TEMP: f32 = 20.0;
const NEXT_SCHEDULED_TEMP: f32 = 17.5;

/// In-memory stand-in for one remote zone.
#[derive(Debug, Clone)]
pub struct SimulatedZone {
    snapshot: ZoneSnapshot,
}

impl SimulatedZone {
    pub fn new(entity_id: &str, friendly_name: &str, now: DateTime<Utc>) -> Self {
        let snapshot = ZoneSnapshot {
            entity_id: entity_id.to_string(),
            state: HvacMode::Heat.as_str().to_string(),
            attributes: ZoneAttributes {
                friendly_name: Some(friendly_name.to_string()),
                current_temperature: Some(19.0),
                temperature: Some(SCHEDULED_TEMP),
                min_temp: Some(5.0),
                max_temp: Some(35.0),
                preset_mode: None,
                status: ZoneStatus {
                    setpoints: Setpoints {
                        this_sp_from: Some(timestamp(now - Duration::hours(1))),
                        this_sp_temp: Some(SCHEDULED_TEMP),
                        next_sp_from: Some(timestamp(now + Duration::hours(3))),
                        next_sp_temp: Some(NEXT_SCHEDULED_TEMP),
                    },
                    setpoint_status: SetpointStatus {
                        setpoint_mode: Some(SetpointMode::FollowSchedule.as_str().to_string()),
                        target_heat_temperature: Some(SCHEDULED_TEMP),
                        until: None,
                    },
                    temperature_status: TemperatureStatus {
                        temperature: Some(19.0),
                        is_available: Some(true),
                    },
                    active_faults: Vec::new(),
                },
            },
        };
        Self { snapshot }
    }

    pub fn snapshot(&self) -> &ZoneSnapshot {
        &self.snapshot
    }

    /// Returns `false` for commands addressed to another entity.
    pub fn apply(&mut self, command: &ZoneCommand, now: DateTime<Utc>) -> bool {
        if command.entity_id() != self.snapshot.entity_id {
            return false;
        }

        match command {
            ZoneCommand::SetOverride(cmd) => {
                let (mode, until) = match cmd.duration {
                    Some(duration) => (
                        SetpointMode::TemporaryOverride,
                        Some(timestamp(
                            now + Duration::minutes(i64::from(duration.total_minutes())),
                        )),
                    ),
                    None => (SetpointMode::PermanentOverride, None),
                };
                self.set_setpoint(mode, cmd.setpoint, until);
            }
            ZoneCommand::ClearOverride(_) => self.follow_schedule(),
            ZoneCommand::SetHvacMode(cmd) => {
                self.snapshot.state = cmd.hvac_mode.as_str().to_string();
            }
        }
        true
    }

    /// Drops a temporary override whose end time has passed.
    pub fn expire_override(&mut self, now: DateTime<Utc>) -> bool {
        let status = &self.snapshot.attributes.status.setpoint_status;
        if SetpointMode::parse(status.setpoint_mode.as_deref()) != SetpointMode::TemporaryOverride {
            return false;
        }
        let expired = status
            .until
            .as_deref()
            .and_then(|until| DateTime::parse_from_rfc3339(until).ok())
            .is_some_and(|until| until.with_timezone(&Utc) <= now);
        if expired {
            self.follow_schedule();
        }
        expired
    }

    /// Moves the room temperature a tenth of a degree towards the target.
    pub fn drift(&mut self) {
        let attrs = &mut self.snapshot.attributes;
        let heating = self.snapshot.state == HvacMode::Heat.as_str();
        let (Some(current), Some(target)) = (attrs.current_temperature, attrs.temperature) else {
            return;
        };

        let goal = if heating { target } else { 5.0 };
        let step = (goal - current).clamp(-0.1, 0.1);
        let next = ((current + step) * 10.0).round() / 10.0;
        attrs.current_temperature = Some(next);
        attrs.status.temperature_status.temperature = Some(next);
    }

    fn follow_schedule(&mut self) {
        let scheduled = self
            .snapshot
            .attributes
            .status
            .setpoints
            .this_sp_temp
            .unwrap_or(SCHEDULED_TEMP);
        self.set_setpoint(SetpointMode::FollowSchedule, scheduled, None);
    }

    fn set_setpoint(&mut self, mode: SetpointMode, setpoint: f32, until: Option<String>) {
        let attrs = &mut self.snapshot.attributes;
        attrs.temperature = Some(setpoint);
        attrs.status.setpoint_status = SetpointStatus {
            setpoint_mode: Some(mode.as_str().to_string()),
            target_heat_temperature: Some(setpoint),
            until,
        };
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
