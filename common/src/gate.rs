//! Optimistic command coordination.
//!
//! A command is confirmed by observing the zone reach the state the command
//! was expected to produce, not by any reply identifier: the remote side only
//! ever broadcasts full zone state. At most one window is open at a time and
//! whichever of confirmation, rejection, expiry or cancellation comes first
//! closes it; later signals for that attempt are ignored.

use serde::Serialize;
use tracing::debug;

use crate::{
    draft::Draft,
    projection::StatusProjection,
    types::{HvacMode, SetpointMode},
};

/// Upper bound on how long a command window may stay open.
pub const COMMAND_DEADLINE_MS: u64 = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct AttemptId(pub u64);

/// What the zone must look like for a command to count as applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    Setpoint(SetpointMode),
    /// HVAC toggles are matched on the run state actually flipping.
    RunState(HvacMode),
}

impl Expectation {
    pub fn is_met_by(self, projection: &StatusProjection) -> bool {
        match self {
            Self::Setpoint(mode) => projection.setpoint_mode == mode,
            Self::RunState(mode) => projection.hvac_mode == Some(mode),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WindowOutcome {
    Confirmed,
    Rejected,
    Expired,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandWindow {
    attempt: AttemptId,
    expected: Expectation,
    deadline_ms: u64,
    rollback: Option<Draft>,
}

impl CommandWindow {
    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    pub fn expected(&self) -> Expectation {
        self.expected
    }

    pub fn deadline_ms(&self) -> u64 {
        self.deadline_ms
    }

    /// Draft as it was just before the command was issued, if the command
    /// cleared anything that a rejection should bring back.
    pub fn into_rollback(self) -> Option<Draft> {
        self.rollback
    }
}

#[derive(Debug, Default)]
pub struct CommandGate {
    window: Option<CommandWindow>,
    last_attempt: u64,
}

impl CommandGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.window.is_some()
    }

    pub fn window(&self) -> Option<&CommandWindow> {
        self.window.as_ref()
    }

    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.window
            .as_ref()
            .map(|window| window.deadline_ms.saturating_sub(now_ms))
            .unwrap_or(0)
    }

    /// Opens a window for a new attempt. Any open window is superseded.
    pub fn issue(
        &mut self,
        expected: Expectation,
        rollback: Option<Draft>,
        now_ms: u64,
    ) -> AttemptId {
        self.last_attempt = self.last_attempt.wrapping_add(1);
        let attempt = AttemptId(self.last_attempt);

        if let Some(previous) = self.window.take() {
            debug!(
                "command window {:?} superseded by {:?}",
                previous.attempt, attempt
            );
        }

        self.window = Some(CommandWindow {
            attempt,
            expected,
            deadline_ms: now_ms.saturating_add(COMMAND_DEADLINE_MS),
            rollback,
        });
        debug!("command window {attempt:?} opened expecting {expected:?}");
        attempt
    }

    /// Closes the window when `projection` shows the expected state.
    /// Returns `true` only for the call that closed it.
    pub fn reconcile(&mut self, projection: &StatusProjection) -> bool {
        let Some(window) = self.window.as_ref() else {
            return false;
        };
        if !window.expected.is_met_by(projection) {
            return false;
        }

        debug!("command window {:?} confirmed", window.attempt);
        self.window = None;
        true
    }

    /// Closes the window if `attempt` still owns it, handing back the closed
    /// window so the caller can restore its rollback draft.
    pub fn reject(&mut self, attempt: AttemptId) -> Option<CommandWindow> {
        if self.window.as_ref().map(|window| window.attempt) != Some(attempt) {
            debug!("ignoring rejection for stale attempt {attempt:?}");
            return None;
        }
        debug!("command window {attempt:?} rejected");
        self.window.take()
    }

    /// Closes the window once its deadline has passed.
    pub fn expire(&mut self, now_ms: u64) -> Option<AttemptId> {
        let window = self.window.as_ref()?;
        if now_ms < window.deadline_ms {
            return None;
        }
        let attempt = window.attempt;
        debug!("command window {attempt:?} expired without confirmation");
        self.window = None;
        Some(attempt)
    }

    pub fn cancel(&mut self) -> bool {
        match self.window.take() {
            Some(window) => {
                debug!("command window {:?} cancelled", window.attempt);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::ZoneSnapshot;

    fn projection(state: &str, setpoint_mode: &str) -> StatusProjection {
        let mut snapshot = ZoneSnapshot {
            state: state.to_string(),
            ..ZoneSnapshot::default()
        };
        snapshot.attributes.status.setpoint_status.setpoint_mode = Some(setpoint_mode.to_string());
        StatusProjection::project(&snapshot, None)
    }

    #[test]
    fn matching_projection_closes_window_once() {
        let mut gate = CommandGate::new();
        gate.issue(
            Expectation::Setpoint(SetpointMode::TemporaryOverride),
            None,
            0,
        );
        let matched = projection("heat", "TemporaryOverride");

        assert!(gate.reconcile(&matched));
        assert!(!gate.is_active());
        assert!(!gate.reconcile(&matched));
    }

    #[test]
    fn stale_projection_keeps_waiting() {
        let mut gate = CommandGate::new();
        gate.issue(
            Expectation::Setpoint(SetpointMode::PermanentOverride),
            None,
            0,
        );

        assert!(!gate.reconcile(&projection("heat", "FollowSchedule")));
        assert!(!gate.reconcile(&projection("heat", "TemporaryOverride")));
        assert!(gate.is_active());
    }

    #[test]
    fn run_state_expectation_needs_actual_flip() {
        let mut gate = CommandGate::new();
        gate.issue(Expectation::RunState(HvacMode::Off), None, 0);

        assert!(!gate.reconcile(&projection("heat", "FollowSchedule")));
        assert!(gate.reconcile(&projection("off", "FollowSchedule")));
    }

    #[test]
    fn deadline_closes_window() {
        let mut gate = CommandGate::new();
        let attempt = gate.issue(
            Expectation::Setpoint(SetpointMode::FollowSchedule),
            None,
            1_000,
        );

        assert_eq!(gate.remaining_ms(11_000), 20_000);
        assert_eq!(gate.expire(30_999), None);
        assert_eq!(gate.expire(31_000), Some(attempt));
        assert!(!gate.is_active());
        assert_eq!(gate.expire(40_000), None);
    }

    #[test]
    fn rejection_returns_rollback_once() {
        let mut gate = CommandGate::new();
        let mut draft = Draft::default();
        draft.set_duration_preset(125);
        let attempt = gate.issue(
            Expectation::Setpoint(SetpointMode::TemporaryOverride),
            Some(draft.clone()),
            0,
        );

        let closed = gate.reject(attempt).expect("window should close");
        assert_eq!(closed.into_rollback(), Some(draft));
        assert!(gate.reject(attempt).is_none());
    }

    #[test]
    fn new_issue_supersedes_open_window() {
        let mut gate = CommandGate::new();
        let first = gate.issue(
            Expectation::Setpoint(SetpointMode::TemporaryOverride),
            None,
            0,
        );
        let second = gate.issue(
            Expectation::Setpoint(SetpointMode::FollowSchedule),
            None,
            5_000,
        );

        assert_ne!(first, second);
        assert!(gate.reject(first).is_none());
        assert_eq!(gate.expire(30_000), None);
        let open = gate.window().expect("second window should be open");
        assert_eq!(open.attempt(), second);
        assert_eq!(
            open.expected(),
            Expectation::Setpoint(SetpointMode::FollowSchedule)
        );
        assert_eq!(open.deadline_ms(), 35_000);
        assert_eq!(gate.expire(35_000), Some(second));
    }

    #[test]
    fn late_signals_after_confirmation_are_ignored() {
        let mut gate = CommandGate::new();
        let attempt = gate.issue(
            Expectation::Setpoint(SetpointMode::TemporaryOverride),
            Some(Draft::default()),
            0,
        );
        assert!(gate.reconcile(&projection("heat", "TemporaryOverride")));

        assert!(gate.reject(attempt).is_none());
        assert_eq!(gate.expire(60_000), None);
        assert!(!gate.cancel());
    }
}
