use chrono::{DateTime, FixedOffset};
use tracing::{debug, info};

use crate::{
    command::{ClearOverride, OverrideDuration, SetHvacMode, SetOverride, ZoneCommand},
    config::CardConfig,
    draft::{Draft, MAX_DURATION_MINUTES, MIN_DURATION_MINUTES},
    gate::{AttemptId, CommandGate, Expectation, WindowOutcome},
    mode::{ZoneAction, ZoneMode},
    projection::StatusProjection,
    snapshot::ZoneSnapshot,
    types::{HvacMode, SetpointMode},
    view::{self, CardView},
};

/// A command the host has to hand to its sink. The outcome of the send is
/// reported back with [`ZoneController::command_rejected`].
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedCommand {
    pub attempt: AttemptId,
    pub command: ZoneCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SnapshotOutcome {
    /// `false` when the delivery was identical to the previous one.
    pub changed: bool,
    /// Set when this delivery closed the command window.
    pub closed: Option<WindowOutcome>,
}

/// Reconciles pushed zone state with the local draft for one card.
///
/// Owns the draft and the command gate exclusively. Everything is driven
/// from outside: snapshots, user intents and the deadline clock (`now_ms`,
/// any monotonic millisecond counter).
#[derive(Debug)]
pub struct ZoneController {
    config: CardConfig,
    draft: Draft,
    gate: CommandGate,
    snapshot: Option<ZoneSnapshot>,
    projection: Option<StatusProjection>,
    seen_snapshot: bool,
    expanded: bool,
}

impl ZoneController {
    pub fn new(config: CardConfig) -> Self {
        Self {
            config,
            draft: Draft::default(),
            gate: CommandGate::new(),
            snapshot: None,
            projection: None,
            seen_snapshot: false,
            expanded: false,
        }
    }

    pub fn config(&self) -> &CardConfig {
        &self.config
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn projection(&self) -> Option<&StatusProjection> {
        self.projection.as_ref()
    }

    pub fn mode(&self) -> Option<ZoneMode> {
        self.projection.as_ref().map(ZoneMode::derive)
    }

    pub fn is_loading(&self) -> bool {
        self.gate.is_active()
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn gate(&self) -> &CommandGate {
        &self.gate
    }

    /// Actions currently on offer. Controls act on the setpoint, so a zone
    /// that is switched off while overridden still offers Back-to-Schedule.
    pub fn legal_actions(&self) -> Vec<ZoneAction> {
        self.projection
            .as_ref()
            .map(|projection| {
                ZoneMode::for_setpoint(projection.setpoint_mode).legal_actions(self.draft.is_dirty())
            })
            .unwrap_or_default()
    }

    /// Applies a new configuration, dropping local state.
    pub fn reconfigure(&mut self, config: CardConfig) {
        info!("card reconfigured for {}", config.entity);
        self.config = config;
        self.draft.reset();
        self.gate.cancel();
        self.expanded = false;
        self.projection = self
            .snapshot
            .as_ref()
            .map(|snapshot| StatusProjection::project(snapshot, self.config.name.as_deref()));
    }

    /// Feeds the latest zone record; `None` means the entity is absent.
    pub fn on_snapshot(&mut self, snapshot: Option<ZoneSnapshot>, now_ms: u64) -> SnapshotOutcome {
        let mut outcome = SnapshotOutcome::default();
        if self.gate.expire(now_ms).is_some() {
            outcome.closed = Some(WindowOutcome::Expired);
        }

        if self.seen_snapshot && self.snapshot == snapshot {
            return outcome;
        }
        self.seen_snapshot = true;
        outcome.changed = true;

        self.projection = snapshot
            .as_ref()
            .map(|snapshot| StatusProjection::project(snapshot, self.config.name.as_deref()));
        self.snapshot = snapshot;

        // A background refresh must never eat an edit in progress.
        if !self.draft.is_dirty() {
            self.draft.clear_staged_temperature();
        }

        if !self.gate.is_active() {
            return outcome;
        }

        match self.projection.as_ref() {
            None => {
                debug!("entity {} disappeared with a command in flight", self.config.entity);
                self.gate.cancel();
                outcome.closed = Some(WindowOutcome::Cancelled);
            }
            Some(projection) => {
                if self.gate.reconcile(projection) {
                    if !self.draft.is_dirty() {
                        self.draft.reset();
                    }
                    outcome.closed = Some(WindowOutcome::Confirmed);
                }
            }
        }

        outcome
    }

    pub fn adjust_temperature(&mut self, delta: f32) -> bool {
        let Some(projection) = self.projection.as_ref() else {
            return false;
        };
        self.draft.adjust_temperature(
            projection.effective_target(),
            delta,
            projection.min_temp,
            projection.max_temp,
        )
    }

    pub fn set_duration_preset(&mut self, minutes: u16) {
        self.draft.set_duration_preset(minutes);
    }

    pub fn toggle_custom_duration(&mut self) {
        self.draft.toggle_custom_duration();
    }

    pub fn set_duration_hours(&mut self, hours: i64) {
        self.draft.set_duration_hours(hours);
    }

    pub fn set_duration_minutes(&mut self, minutes: i64) {
        self.draft.set_duration_minutes(minutes);
    }

    pub fn toggle_expanded(&mut self) {
        self.expanded = !self.expanded;
    }

    /// Temporary override, or an update of the running override.
    pub fn apply_override(&mut self, now_ms: u64) -> Option<IssuedCommand> {
        if !self.allows(ZoneAction::Override) && !self.allows(ZoneAction::UpdateOverride) {
            debug!("override not offered in the current state");
            return None;
        }
        let setpoint = self.command_setpoint()?;
        let total = self
            .draft
            .duration_minutes()
            .clamp(MIN_DURATION_MINUTES, MAX_DURATION_MINUTES);

        let command = ZoneCommand::SetOverride(SetOverride {
            entity_id: self.config.entity.clone(),
            setpoint,
            duration: Some(OverrideDuration::from_minutes(total)),
        });
        Some(self.issue(
            Expectation::Setpoint(SetpointMode::TemporaryOverride),
            true,
            command,
            now_ms,
        ))
    }

    pub fn apply_permanent_override(&mut self, now_ms: u64) -> Option<IssuedCommand> {
        if !self.allows(ZoneAction::Permanent) {
            debug!("permanent override not offered in the current state");
            return None;
        }
        let setpoint = self.command_setpoint()?;

        let command = ZoneCommand::SetOverride(SetOverride {
            entity_id: self.config.entity.clone(),
            setpoint,
            duration: None,
        });
        Some(self.issue(
            Expectation::Setpoint(SetpointMode::PermanentOverride),
            true,
            command,
            now_ms,
        ))
    }

    pub fn cancel_override(&mut self, now_ms: u64) -> Option<IssuedCommand> {
        if !self.allows(ZoneAction::BackToSchedule) {
            debug!("no override to cancel");
            return None;
        }

        let command = ZoneCommand::ClearOverride(ClearOverride {
            entity_id: self.config.entity.clone(),
        });
        Some(self.issue(
            Expectation::Setpoint(SetpointMode::FollowSchedule),
            true,
            command,
            now_ms,
        ))
    }

    /// Flips the run state. The draft is left alone, so a rejection has
    /// nothing to restore.
    pub fn toggle_hvac(&mut self, now_ms: u64) -> Option<IssuedCommand> {
        let projection = self.projection.as_ref()?;
        let target = projection
            .hvac_mode
            .map_or(HvacMode::Heat, HvacMode::opposite);

        let command = ZoneCommand::SetHvacMode(SetHvacMode {
            entity_id: self.config.entity.clone(),
            hvac_mode: target,
        });
        Some(self.issue(Expectation::RunState(target), false, command, now_ms))
    }

    /// Restores the pre-attempt draft if `attempt` still owns the window.
    pub fn command_rejected(&mut self, attempt: AttemptId) -> bool {
        let Some(window) = self.gate.reject(attempt) else {
            return false;
        };
        if let Some(rollback) = window.into_rollback() {
            self.draft = rollback;
        }
        true
    }

    /// Closes the window once its deadline has passed. The draft is not
    /// touched: the remote outcome is unknown.
    pub fn expire_command(&mut self, now_ms: u64) -> bool {
        self.gate.expire(now_ms).is_some()
    }

    pub fn teardown(&mut self) {
        self.gate.cancel();
    }

    pub fn view(&self, now: DateTime<FixedOffset>) -> CardView {
        view::render(
            &self.config,
            self.projection.as_ref(),
            &self.draft,
            self.gate.is_active(),
            self.expanded,
            now,
        )
    }

    fn allows(&self, action: ZoneAction) -> bool {
        self.legal_actions().contains(&action)
    }

    fn command_setpoint(&self) -> Option<f32> {
        self.draft
            .staged_temp()
            .or_else(|| self.projection.as_ref()?.effective_target())
    }

    fn issue(
        &mut self,
        expected: Expectation,
        clears_draft: bool,
        command: ZoneCommand,
        now_ms: u64,
    ) -> IssuedCommand {
        let rollback = clears_draft.then(|| {
            let before = self.draft.clone();
            self.draft.clear_staged();
            before
        });
        let attempt = self.gate.issue(expected, rollback, now_ms);
        info!("issuing {} for {} as {attempt:?}", command.topic(), self.config.entity);
        IssuedCommand { attempt, command }
    }
}
