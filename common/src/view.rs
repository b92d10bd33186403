//! Presentation model handed to whatever draws the card.
//!
//! Every text field is already formatted; a missing value is rendered as
//! [`PLACEHOLDER`], never as an empty or sentinel number.

use chrono::{DateTime, Duration, FixedOffset};
use serde::Serialize;

use crate::{
    config::CardConfig,
    draft::Draft,
    mode::{ZoneAction, ZoneMode},
    projection::StatusProjection,
    types::HvacMode,
};

pub const PLACEHOLDER: &str = "\u{2014}";

pub const DURATION_PRESETS: [(&str, u16); 4] = [("30m", 30), ("1h", 60), ("2h", 120), ("3h", 180)];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CardView {
    NotFound { entity: String },
    Zone(Box<ZoneView>),
}

impl CardView {
    pub fn zone(&self) -> Option<&ZoneView> {
        match self {
            Self::Zone(zone) => Some(zone),
            Self::NotFound { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneView {
    pub friendly_name: String,
    pub mode: ZoneMode,
    pub badge: &'static str,
    pub compact: bool,
    pub card_size: u8,
    pub accent_bar: bool,
    pub temp_pills: bool,
    pub hvac_toggle: Option<HvacToggle>,
    pub faults: Vec<String>,
    pub sensor_available: bool,
    pub current_temp: String,
    pub current_band: TempBand,
    pub target_temp: String,
    pub target_band: TempBand,
    /// The target shows the user's staged value rather than the zone's.
    pub staged: bool,
    pub schedule: ScheduleLine,
    pub override_info: Option<OverrideInfo>,
    pub controls_visible: bool,
    pub duration: Option<DurationPicker>,
    pub actions: Vec<ZoneAction>,
    pub loading: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HvacToggle {
    pub label: &'static str,
    pub target: HvacMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleLine {
    pub scheduled_temp: String,
    pub next_label: String,
    pub next_temp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideInfo {
    pub permanent: bool,
    pub target: String,
    /// Time left for a temporary override, `"Permanent"` otherwise.
    pub countdown: Option<String>,
    pub until: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationPicker {
    pub presets: Vec<DurationPreset>,
    pub custom_active: bool,
    pub custom_visible: bool,
    pub hours: u16,
    pub minute_bucket: u16,
    pub summary: String,
    pub ends_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationPreset {
    pub label: &'static str,
    pub minutes: u16,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TempBand {
    Unknown,
    Cold,
    Cool,
    Comfortable,
    Mild,
    Warm,
    Hot,
}

impl TempBand {
    pub fn of(temp: Option<f32>) -> Self {
        match temp {
            None => Self::Unknown,
            Some(t) if t >= 25.0 => Self::Hot,
            Some(t) if t >= 22.0 => Self::Warm,
            Some(t) if t >= 19.0 => Self::Mild,
            Some(t) if t >= 16.0 => Self::Comfortable,
            Some(t) if t > 5.0 => Self::Cool,
            Some(_) => Self::Cold,
        }
    }
}

pub fn render(
    config: &CardConfig,
    projection: Option<&StatusProjection>,
    draft: &Draft,
    loading: bool,
    expanded: bool,
    now: DateTime<FixedOffset>,
) -> CardView {
    let Some(p) = projection else {
        return CardView::NotFound {
            entity: config.entity.clone(),
        };
    };

    let mode = ZoneMode::derive(p);
    let off = p.is_off();
    let dirty = draft.is_dirty();
    let compact = config.compact && !expanded && !dirty && !loading;
    let target = draft.staged_temp().or_else(|| p.effective_target());
    let band = |temp: Option<f32>| if off { TempBand::Unknown } else { TempBand::of(temp) };

    let hvac_toggle = config.show_hvac_toggle.then(|| HvacToggle {
        label: if off { "Turn on" } else { "Turn off" },
        target: p.hvac_mode.map_or(HvacMode::Heat, HvacMode::opposite),
    });

    CardView::Zone(Box::new(ZoneView {
        friendly_name: p.friendly_name.clone(),
        mode,
        badge: mode.label(),
        compact,
        card_size: if compact { 2 } else { 4 },
        accent_bar: config.show_accent_bar,
        temp_pills: config.temp_pills,
        hvac_toggle,
        faults: p.active_faults.clone(),
        sensor_available: p.sensor_available,
        current_temp: format_temp(p.current_temp),
        current_band: band(p.current_temp),
        target_temp: format_temp(target),
        target_band: band(target),
        staged: draft.staged_temp().is_some(),
        schedule: schedule_line(p, now),
        override_info: override_info(p, now),
        controls_visible: dirty || p.is_override(),
        duration: dirty.then(|| duration_picker(draft, now)),
        actions: ZoneMode::for_setpoint(p.setpoint_mode).legal_actions(dirty),
        loading,
    }))
}

fn schedule_line(p: &StatusProjection, now: DateTime<FixedOffset>) -> ScheduleLine {
    let next_label = match p.next_sp_from {
        Some(next) => match format_day(next, now) {
            Some(day) => format!("{day} {}", format_clock(next, now)),
            None => format_clock(next, now),
        },
        None => PLACEHOLDER.to_string(),
    };

    ScheduleLine {
        scheduled_temp: format_setpoint(p.this_sp_temp),
        next_label,
        next_temp: format_setpoint(p.next_sp_temp),
    }
}

fn override_info(p: &StatusProjection, now: DateTime<FixedOffset>) -> Option<OverrideInfo> {
    if !p.is_override() {
        return None;
    }
    let permanent = !matches!(ZoneMode::for_setpoint(p.setpoint_mode), ZoneMode::TemporaryOverride);

    let countdown = if permanent {
        Some("Permanent".to_string())
    } else {
        p.override_until.map(|until| time_remaining(until, now))
    };
    let until = p
        .override_until
        .filter(|_| !permanent)
        .map(|until| match format_day(until, now) {
            Some(day) => format!("Until {} {day}", format_clock(until, now)),
            None => format!("Until {}", format_clock(until, now)),
        });

    Some(OverrideInfo {
        permanent,
        target: p
            .target_heat_temp
            .map(|t| format!("{t}\u{b0}C"))
            .unwrap_or_default(),
        countdown,
        until,
    })
}

fn duration_picker(draft: &Draft, now: DateTime<FixedOffset>) -> DurationPicker {
    let minutes = draft.duration_minutes();
    let custom_visible = draft.is_custom_duration_visible();
    let presets: Vec<DurationPreset> = DURATION_PRESETS
        .iter()
        .map(|&(label, preset)| DurationPreset {
            label,
            minutes: preset,
            active: preset == minutes && !custom_visible,
        })
        .collect();
    // An open custom selector takes the highlight from a matching preset.
    let custom_active = custom_visible || !presets.iter().any(|preset| preset.active);

    DurationPicker {
        presets,
        custom_active,
        custom_visible,
        hours: minutes / 60,
        minute_bucket: minutes % 60 - minutes % 5,
        summary: format_duration(minutes),
        ends_at: format_clock(now + Duration::minutes(i64::from(minutes)), now),
    }
}

/// One decimal, or the placeholder.
pub fn format_temp(temp: Option<f32>) -> String {
    temp.map(|t| format!("{t:.1}"))
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

fn format_setpoint(temp: Option<f32>) -> String {
    temp.map(|t| format!("{t}\u{b0}"))
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

pub fn format_duration(minutes: u16) -> String {
    let (h, m) = (minutes / 60, minutes % 60);
    match (h, m) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}

/// `HH:MM` in the zone of `now`.
pub fn format_clock(at: DateTime<FixedOffset>, now: DateTime<FixedOffset>) -> String {
    at.with_timezone(now.offset()).format("%H:%M").to_string()
}

/// `None` for today, otherwise `tomorrow` or a short weekday date.
pub fn format_day(at: DateTime<FixedOffset>, now: DateTime<FixedOffset>) -> Option<String> {
    let day = at.with_timezone(now.offset()).date_naive();
    let today = now.date_naive();
    if day == today {
        None
    } else if today.succ_opt() == Some(day) {
        Some("tomorrow".to_string())
    } else {
        Some(day.format("%a %-d %b").to_string())
    }
}

pub fn time_remaining(until: DateTime<FixedOffset>, now: DateTime<FixedOffset>) -> String {
    let left = (until - now).num_minutes();
    if until <= now {
        return "expired".to_string();
    }
    let (h, m) = (left / 60, left % 60);
    if h > 0 {
        format!("{h}h {m}m remaining")
    } else {
        format!("{m}m remaining")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{SetpointStatus, ZoneSnapshot};
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2026-02-27T10:30:00Z").unwrap()
    }

    fn at(raw: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(raw).unwrap()
    }

    fn config() -> CardConfig {
        CardConfig::new("climate.living_room").unwrap()
    }

    fn snapshot() -> ZoneSnapshot {
        serde_json::from_str(
            r#"{
                "entity_id": "climate.living_room",
                "state": "heat",
                "attributes": {
                    "friendly_name": "Living Room",
                    "current_temperature": 20.0,
                    "temperature": 21.0,
                    "status": {
                        "setpoints": {
                            "this_sp_from": "2026-02-27T10:00:00Z",
                            "this_sp_temp": 21.0,
                            "next_sp_from": "2026-02-28T06:30:00Z",
                            "next_sp_temp": 19.5
                        },
                        "setpoint_status": {"setpoint_mode": "FollowSchedule"}
                    }
                }
            }"#,
        )
        .unwrap()
    }

    fn zone(view: &CardView) -> &ZoneView {
        view.zone().expect("zone view")
    }

    #[test]
    fn absent_entity_renders_not_found() {
        let view = render(&config(), None, &Draft::default(), false, false, now());
        assert_eq!(
            view,
            CardView::NotFound {
                entity: "climate.living_room".to_string()
            }
        );
        assert_eq!(
            serde_json::to_value(&view).unwrap(),
            serde_json::json!({"kind": "notFound", "entity": "climate.living_room"})
        );
    }

    #[test]
    fn schedule_zone_view() {
        let p = StatusProjection::project(&snapshot(), None);
        let view = render(&config(), Some(&p), &Draft::default(), false, false, now());
        let zone = zone(&view);

        assert_eq!(zone.friendly_name, "Living Room");
        assert_eq!(zone.badge, "Schedule");
        assert_eq!(zone.current_temp, "20.0");
        assert_eq!(zone.current_band, TempBand::Mild);
        assert_eq!(zone.target_temp, "21.0");
        assert!(!zone.staged);
        assert_eq!(
            zone.schedule,
            ScheduleLine {
                scheduled_temp: "21\u{b0}".to_string(),
                next_label: "tomorrow 06:30".to_string(),
                next_temp: "19.5\u{b0}".to_string(),
            }
        );
        assert_eq!(
            zone.hvac_toggle,
            Some(HvacToggle {
                label: "Turn off",
                target: HvacMode::Off
            })
        );
        assert!(!zone.controls_visible);
        assert!(zone.actions.is_empty());
        assert_eq!(zone.duration, None);
        assert_eq!(zone.override_info, None);
    }

    #[test]
    fn sparse_snapshot_uses_placeholders() {
        let sparse: ZoneSnapshot = serde_json::from_str(
            r#"{
                "entity_id": "climate.hall",
                "state": "heat",
                "attributes": {"current_temperature": null, "temperature": 21.0, "status": {}}
            }"#,
        )
        .unwrap();
        let p = StatusProjection::project(&sparse, None);
        let view = render(&config(), Some(&p), &Draft::default(), false, false, now());
        let zone = zone(&view);

        assert_eq!(zone.friendly_name, "Zone");
        assert_eq!(zone.current_temp, PLACEHOLDER);
        assert_eq!(zone.current_band, TempBand::Unknown);
        assert_eq!(zone.target_temp, "21.0");
        assert_eq!(
            zone.schedule,
            ScheduleLine {
                scheduled_temp: PLACEHOLDER.to_string(),
                next_label: PLACEHOLDER.to_string(),
                next_temp: PLACEHOLDER.to_string(),
            }
        );
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("NaN"));
    }

    #[test]
    fn temporary_override_shows_countdown_and_until() {
        let mut snap = snapshot();
        snap.attributes.status.setpoint_status = SetpointStatus {
            setpoint_mode: Some("TemporaryOverride".to_string()),
            target_heat_temperature: Some(22.5),
            until: Some("2026-02-27T12:45:00Z".to_string()),
        };
        let p = StatusProjection::project(&snap, None);
        let view = render(&config(), Some(&p), &Draft::default(), false, false, now());
        let zone = zone(&view);

        assert_eq!(zone.badge, "Override");
        assert!(zone.controls_visible);
        assert_eq!(zone.actions, vec![ZoneAction::BackToSchedule]);
        assert_eq!(
            zone.override_info,
            Some(OverrideInfo {
                permanent: false,
                target: "22.5\u{b0}C".to_string(),
                countdown: Some("2h 15m remaining".to_string()),
                until: Some("Until 12:45".to_string()),
            })
        );
    }

    #[test]
    fn permanent_override_is_marked() {
        let mut snap = snapshot();
        snap.attributes.status.setpoint_status = SetpointStatus {
            setpoint_mode: Some("PermanentOverride".to_string()),
            target_heat_temperature: Some(23.0),
            until: None,
        };
        let p = StatusProjection::project(&snap, None);
        let view = render(&config(), Some(&p), &Draft::default(), false, false, now());

        let info = zone(&view).override_info.clone().unwrap();
        assert!(info.permanent);
        assert_eq!(info.countdown.as_deref(), Some("Permanent"));
        assert_eq!(info.until, None);
    }

    #[test]
    fn permanent_override_ignores_stale_end_time() {
        let mut snap = snapshot();
        snap.attributes.status.setpoint_status = SetpointStatus {
            setpoint_mode: Some("PermanentOverride".to_string()),
            target_heat_temperature: Some(23.0),
            until: Some("2026-02-27T12:45:00Z".to_string()),
        };
        let p = StatusProjection::project(&snap, None);
        let view = render(&config(), Some(&p), &Draft::default(), false, false, now());

        let info = zone(&view).override_info.clone().unwrap();
        assert_eq!(info.countdown.as_deref(), Some("Permanent"));
        assert_eq!(info.until, None);
    }

    #[test]
    fn open_custom_selector_takes_preset_highlight() {
        let p = StatusProjection::project(&snapshot(), None);
        let mut draft = Draft::default();
        draft.adjust_temperature(p.effective_target(), 0.5, p.min_temp, p.max_temp);
        draft.set_duration_preset(60);

        let closed = render(&config(), Some(&p), &draft, false, false, now());
        let picker = zone(&closed).duration.clone().unwrap();
        assert!(picker.presets.iter().any(|preset| preset.minutes == 60 && preset.active));
        assert!(!picker.custom_active);

        draft.toggle_custom_duration();
        let open = render(&config(), Some(&p), &draft, false, false, now());
        let picker = zone(&open).duration.clone().unwrap();
        assert!(picker.custom_visible);
        assert!(picker.presets.iter().all(|preset| !preset.active));
        assert!(picker.custom_active);
    }

    #[test]
    fn dirty_draft_opens_duration_picker() {
        let p = StatusProjection::project(&snapshot(), None);
        let mut draft = Draft::default();
        draft.adjust_temperature(p.effective_target(), 1.0, p.min_temp, p.max_temp);
        draft.set_duration_preset(95);

        let view = render(&config(), Some(&p), &draft, false, false, now());
        let zone = zone(&view);
        let picker = zone.duration.clone().unwrap();

        assert_eq!(zone.target_temp, "22.0");
        assert_eq!(zone.target_band, TempBand::Warm);
        assert!(zone.staged);
        assert_eq!(zone.actions, vec![ZoneAction::Override, ZoneAction::Permanent]);
        assert!(picker.presets.iter().all(|preset| !preset.active));
        assert!(picker.custom_active);
        assert_eq!((picker.hours, picker.minute_bucket), (1, 35));
        assert_eq!(picker.summary, "1h 35m");
        assert_eq!(picker.ends_at, "12:05");
    }

    #[test]
    fn compact_only_when_idle_and_collapsed() {
        let mut cfg = config();
        cfg.compact = true;
        let p = StatusProjection::project(&snapshot(), None);

        let idle = render(&cfg, Some(&p), &Draft::default(), false, false, now());
        assert!(zone(&idle).compact);
        assert_eq!(zone(&idle).card_size, 2);

        let expanded = render(&cfg, Some(&p), &Draft::default(), false, true, now());
        assert!(!zone(&expanded).compact);

        let loading = render(&cfg, Some(&p), &Draft::default(), true, false, now());
        assert!(!zone(&loading).compact);
        assert_eq!(zone(&loading).card_size, 4);
    }

    #[test]
    fn switched_off_zone_greys_out_bands() {
        let mut snap = snapshot();
        snap.state = "off".to_string();
        let p = StatusProjection::project(&snap, None);
        let view = render(&config(), Some(&p), &Draft::default(), false, false, now());
        let zone = zone(&view);

        assert_eq!(zone.badge, "Off");
        assert_eq!(zone.current_band, TempBand::Unknown);
        assert_eq!(zone.hvac_toggle.as_ref().map(|t| t.label), Some("Turn on"));
    }

    #[test]
    fn bands_follow_thresholds() {
        assert_eq!(TempBand::of(Some(25.0)), TempBand::Hot);
        assert_eq!(TempBand::of(Some(22.0)), TempBand::Warm);
        assert_eq!(TempBand::of(Some(19.0)), TempBand::Mild);
        assert_eq!(TempBand::of(Some(16.0)), TempBand::Comfortable);
        assert_eq!(TempBand::of(Some(5.5)), TempBand::Cool);
        assert_eq!(TempBand::of(Some(5.0)), TempBand::Cold);
        assert_eq!(TempBand::of(None), TempBand::Unknown);
    }

    #[test]
    fn remaining_time_text() {
        assert_eq!(time_remaining(at("2026-02-27T10:45:00Z"), now()), "15m remaining");
        assert_eq!(time_remaining(at("2026-02-27T13:00:00Z"), now()), "2h 30m remaining");
        assert_eq!(time_remaining(at("2026-02-27T10:30:00Z"), now()), "expired");
    }

    #[test]
    fn day_labels() {
        assert_eq!(format_day(at("2026-02-27T23:00:00Z"), now()), None);
        assert_eq!(
            format_day(at("2026-02-28T08:00:00Z"), now()),
            Some("tomorrow".to_string())
        );
        assert_eq!(
            format_day(at("2026-03-03T08:00:00Z"), now()),
            Some("Tue 3 Mar".to_string())
        );
        assert_eq!(format_duration(60), "1h");
        assert_eq!(format_duration(45), "45m");
    }
}
