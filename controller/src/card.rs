use std::{sync::Arc, time::Duration};

use chrono::{DateTime, FixedOffset};
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time::Instant,
};
use tracing::{debug, info, warn};

use zonecard_common::{
    CardConfig, CardView, IssuedCommand, ZoneController, ZoneSnapshot, COMMAND_DEADLINE_MS,
};

use crate::sink::CommandSink;

pub const REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Wall clock used for the time-of-day text in the view.
pub type WallClock = Arc<dyn Fn() -> DateTime<FixedOffset> + Send + Sync>;

/// One mounted card: the reconciliation core behind a lock, its timers and
/// the sink its commands go to.
///
/// Every entry point takes the controller lock, so snapshots, intents,
/// rejections and deadline expiries are applied in a single total order.
pub struct ZoneCard<S> {
    controller: Arc<Mutex<ZoneController>>,
    sink: Arc<S>,
    clock: WallClock,
    epoch: Instant,
    view_tx: Arc<watch::Sender<CardView>>,
    deadline: Arc<Mutex<Option<JoinHandle<()>>>>,
    refresh: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl<S> Clone for ZoneCard<S> {
    fn clone(&self) -> Self {
        Self {
            controller: self.controller.clone(),
            sink: self.sink.clone(),
            clock: self.clock.clone(),
            epoch: self.epoch,
            view_tx: self.view_tx.clone(),
            deadline: self.deadline.clone(),
            refresh: self.refresh.clone(),
        }
    }
}

impl<S: CommandSink> ZoneCard<S> {
    pub fn new(config: CardConfig, sink: S, clock: WallClock) -> Self {
        let controller = ZoneController::new(config);
        let (view_tx, _) = watch::channel(controller.view(clock()));

        Self {
            controller: Arc::new(Mutex::new(controller)),
            sink: Arc::new(sink),
            clock,
            epoch: Instant::now(),
            view_tx: Arc::new(view_tx),
            deadline: Arc::new(Mutex::new(None)),
            refresh: Arc::new(Mutex::new(None)),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<CardView> {
        self.view_tx.subscribe()
    }

    pub fn view(&self) -> CardView {
        self.view_tx.borrow().clone()
    }

    #[cfg(test)]
    pub async fn draft(&self) -> zonecard_common::Draft {
        self.controller.lock().await.draft().clone()
    }

    #[cfg(test)]
    pub async fn is_loading(&self) -> bool {
        self.controller.lock().await.is_loading()
    }

    pub async fn on_snapshot(&self, snapshot: Option<ZoneSnapshot>) {
        let mut controller = self.controller.lock().await;
        let outcome = controller.on_snapshot(snapshot, self.now_ms());
        if let Some(closed) = outcome.closed {
            debug!("command window closed by snapshot: {closed:?}");
            self.disarm_deadline().await;
        }
        if outcome.changed || outcome.closed.is_some() {
            self.publish(&controller);
        }
    }

    pub async fn reconfigure(&self, config: CardConfig) {
        let mut controller = self.controller.lock().await;
        controller.reconfigure(config);
        self.disarm_deadline().await;
        self.publish(&controller);
    }

    pub async fn adjust_temperature(&self, delta: f32) -> bool {
        self.update(|controller| controller.adjust_temperature(delta))
            .await
    }

    pub async fn set_duration_preset(&self, minutes: u16) {
        self.update(|controller| controller.set_duration_preset(minutes))
            .await
    }

    pub async fn toggle_custom_duration(&self) {
        self.update(ZoneController::toggle_custom_duration).await
    }

    pub async fn set_duration_hours(&self, hours: i64) {
        self.update(|controller| controller.set_duration_hours(hours))
            .await
    }

    pub async fn set_duration_minutes(&self, minutes: i64) {
        self.update(|controller| controller.set_duration_minutes(minutes))
            .await
    }

    pub async fn toggle_expanded(&self) {
        self.update(ZoneController::toggle_expanded).await
    }

    pub async fn apply_override(&self) -> bool {
        self.dispatch(ZoneController::apply_override).await
    }

    pub async fn apply_permanent_override(&self) -> bool {
        self.dispatch(ZoneController::apply_permanent_override)
            .await
    }

    pub async fn cancel_override(&self) -> bool {
        self.dispatch(ZoneController::cancel_override).await
    }

    pub async fn toggle_hvac(&self) -> bool {
        self.dispatch(ZoneController::toggle_hvac).await
    }

    /// Re-renders the view every [`REFRESH_INTERVAL`] so countdowns and
    /// relative dates stay current.
    pub async fn start_refresh(&self) {
        let card = self.clone();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(REFRESH_INTERVAL);
            loop {
                interval.tick().await;
                let controller = card.controller.lock().await;
                card.publish(&controller);
            }
        });

        if let Some(previous) = self.refresh.lock().await.replace(task) {
            previous.abort();
        }
    }

    pub async fn shutdown(&self) {
        if let Some(task) = self.refresh.lock().await.take() {
            task.abort();
        }
        let mut controller = self.controller.lock().await;
        self.disarm_deadline().await;
        controller.teardown();
        self.publish(&controller);
        info!("card for {} shut down", controller.config().entity);
    }

    async fn update<T>(&self, intent: impl FnOnce(&mut ZoneController) -> T) -> T {
        let mut controller = self.controller.lock().await;
        let result = intent(&mut *controller);
        self.publish(&controller);
        result
    }

    async fn dispatch(
        &self,
        issue: impl FnOnce(&mut ZoneController, u64) -> Option<IssuedCommand>,
    ) -> bool {
        let mut controller = self.controller.lock().await;
        let Some(issued) = issue(&mut *controller, self.now_ms()) else {
            return false;
        };
        self.arm_deadline().await;
        self.publish(&controller);
        drop(controller);

        let card = self.clone();
        tokio::spawn(async move {
            let IssuedCommand { attempt, command } = issued;
            if let Err(err) = card.sink.send(&command).await {
                warn!("{} for {}: {err}", command.topic(), command.entity_id());
                let mut controller = card.controller.lock().await;
                if controller.command_rejected(attempt) {
                    card.publish(&controller);
                }
            }
        });
        true
    }

    async fn arm_deadline(&self) {
        let card = self.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(COMMAND_DEADLINE_MS)).await;
            let mut controller = card.controller.lock().await;
            if controller.expire_command(card.now_ms()) {
                warn!(
                    "no confirmation for {} within {COMMAND_DEADLINE_MS} ms",
                    controller.config().entity
                );
                card.publish(&controller);
            }
        });

        if let Some(previous) = self.deadline.lock().await.replace(task) {
            previous.abort();
        }
    }

    async fn disarm_deadline(&self) {
        if let Some(task) = self.deadline.lock().await.take() {
            task.abort();
        }
    }

    fn publish(&self, controller: &ZoneController) {
        let view = controller.view((self.clock)());
        self.view_tx.send_if_modified(|current| {
            if *current == view {
                return false;
            }
            *current = view;
            true
        });
    }

    fn now_ms(&self) -> u64 {
        self.epoch
            .elapsed()
            .as_millis()
            .try_into()
            .unwrap_or(u64::MAX)
    }
}
