use crate::projection::temperature_bounds;

pub const DEFAULT_DURATION_MINUTES: u16 = 60;
/// One minute short of a day, so a temporary override can never be
/// confused with "no override".
pub const MAX_DURATION_MINUTES: u16 = 1_439;
pub const MIN_DURATION_MINUTES: u16 = 1;
pub const TEMP_STEP: f32 = 0.5;

/// The user's uncommitted edit.
///
/// Only user intents mutate it. Every mutation keeps the staged temperature
/// inside the bounds it was given and the duration inside
/// `[MIN_DURATION_MINUTES, MAX_DURATION_MINUTES]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    staged_temp: Option<f32>,
    duration_minutes: u16,
    custom_duration_visible: bool,
    dirty: bool,
}

impl Default for Draft {
    fn default() -> Self {
        Self {
            staged_temp: None,
            duration_minutes: DEFAULT_DURATION_MINUTES,
            custom_duration_visible: false,
            dirty: false,
        }
    }
}

impl Draft {
    pub fn staged_temp(&self) -> Option<f32> {
        self.staged_temp
    }

    pub fn duration_minutes(&self) -> u16 {
        self.duration_minutes
    }

    pub fn is_custom_duration_visible(&self) -> bool {
        self.custom_duration_visible
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Steps the staged temperature from its current value, or from
    /// `effective_target` when nothing is staged yet. Returns `false` when
    /// there is nothing to step from.
    pub fn adjust_temperature(
        &mut self,
        effective_target: Option<f32>,
        delta: f32,
        min_temp: f32,
        max_temp: f32,
    ) -> bool {
        if !delta.is_finite() {
            return false;
        }
        let (min_temp, max_temp) = temperature_bounds(Some(min_temp), Some(max_temp));
        let Some(base) = self.staged_temp.or(effective_target) else {
            return false;
        };
        if !base.is_finite() {
            return false;
        }

        self.staged_temp = Some(snap_to_step(base + delta, min_temp, max_temp));
        self.dirty = true;
        true
    }

    pub fn set_duration_preset(&mut self, minutes: u16) {
        self.duration_minutes = clamp_duration(i64::from(minutes));
        self.custom_duration_visible = false;
        self.dirty = true;
    }

    pub fn toggle_custom_duration(&mut self) {
        self.custom_duration_visible = !self.custom_duration_visible;
    }

    /// Replaces the hour part, keeping the minute part.
    pub fn set_duration_hours(&mut self, hours: i64) {
        let minutes = i64::from(self.duration_minutes % 60);
        self.duration_minutes = clamp_duration(hours.saturating_mul(60).saturating_add(minutes));
        self.dirty = true;
    }

    /// Replaces the minute part, keeping the hour part.
    pub fn set_duration_minutes(&mut self, minutes: i64) {
        let hours = i64::from(self.duration_minutes / 60);
        self.duration_minutes = clamp_duration((hours * 60).saturating_add(minutes));
        self.dirty = true;
    }

    /// Optimistic commit: the staged edit disappears from the UI while the
    /// command is in flight. Duration and custom visibility are kept.
    pub fn clear_staged(&mut self) {
        self.staged_temp = None;
        self.dirty = false;
    }

    pub fn clear_staged_temperature(&mut self) {
        self.staged_temp = None;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn clamp_duration(total: i64) -> u16 {
    total.clamp(
        i64::from(MIN_DURATION_MINUTES),
        i64::from(MAX_DURATION_MINUTES),
    ) as u16
}

fn snap_to_step(value: f32, min_temp: f32, max_temp: f32) -> f32 {
    let mut snapped = (value.clamp(min_temp, max_temp) / TEMP_STEP).round() * TEMP_STEP;
    if snapped < min_temp {
        snapped += TEMP_STEP;
    }
    if snapped > max_temp {
        snapped -= TEMP_STEP;
    }
    snapped.clamp(min_temp, max_temp)
}
