use std::{collections::HashMap, io::ErrorKind, net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{Offset, Utc};
use chrono_tz::Tz;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{info, warn};

use zonecard_common::{
    card_view_topic, draft::TEMP_STEP, zone_state_topic, CardConfig, RuntimeConfig, ZoneSnapshot,
};

use crate::{
    card::{WallClock, ZoneCard},
    sink::MqttCommandSink,
};

const MAX_MQTT_PAYLOAD_BYTES: usize = 4 * 1024;

#[derive(Clone)]
struct AppState {
    card: ZoneCard<MqttCommandSink>,
    mqtt: AsyncClient,
    state_topic: Arc<String>,
    store: AppStore,
}

#[derive(Clone)]
struct AppStore {
    runtime_path: Arc<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = AppStore::new();
    let runtime = store.load_effective_config().await.unwrap_or_else(|err| {
        warn!("failed to load runtime config from store: {err:#}");
        let mut runtime = RuntimeConfig::default();
        apply_env_overrides(&mut runtime, |key| std::env::var(key).ok());
        runtime
    });

    let config = CardConfig::from_settings(&runtime.card).context("invalid card configuration")?;
    let entity = config.entity.clone();

    let mut mqtt_options = MqttOptions::new(
        format!("zonecard-{entity}"),
        runtime.network.mqtt_host.clone(),
        runtime.network.mqtt_port,
    );
    if !runtime.network.mqtt_user.is_empty() {
        mqtt_options.set_credentials(
            runtime.network.mqtt_user.clone(),
            runtime.network.mqtt_pass.clone(),
        );
    }
    let (mqtt, eventloop) = AsyncClient::new(mqtt_options, 64);

    let card = ZoneCard::new(
        config,
        MqttCommandSink::new(mqtt.clone()),
        wall_clock(&runtime.timezone),
    );
    let app_state = AppState {
        card: card.clone(),
        mqtt,
        state_topic: Arc::new(zone_state_topic(&entity)),
        store,
    };

    let mqtt_task = spawn_mqtt_loop(app_state.clone(), eventloop);
    let publish_task = spawn_view_publish_loop(app_state.clone(), card_view_topic(&entity));
    card.start_refresh().await;

    let app = Router::new()
        .route("/api/view", get(handle_get_view))
        .route("/api/temp/up", post(handle_temp_up))
        .route("/api/temp/down", post(handle_temp_down))
        .route("/api/duration", post(handle_set_duration))
        .route("/api/duration/custom", post(handle_toggle_custom_duration))
        .route("/api/duration/hours", post(handle_set_duration_hours))
        .route("/api/duration/minutes", post(handle_set_duration_minutes))
        .route("/api/expand", post(handle_toggle_expanded))
        .route("/api/override", post(handle_apply_override))
        .route("/api/override/permanent", post(handle_apply_permanent))
        .route("/api/override/cancel", post(handle_cancel_override))
        .route("/api/hvac/toggle", post(handle_toggle_hvac))
        .route("/api/config/reload", post(handle_reload_config))
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], runtime.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind card server at {addr}"))?;

    info!("zone card for {entity} listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("card server failed")?;

    card.shutdown().await;
    publish_task.abort();
    mqtt_task.abort();
    info!("zone card for {entity} stopped");
    Ok(())
}

fn apply_env_overrides(runtime: &mut RuntimeConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(entity) = lookup("ZONECARD_ENTITY") {
        runtime.card.entity = Some(entity);
    }
    if let Some(host) = lookup("MQTT_HOST") {
        runtime.network.mqtt_host = host;
    }
    if let Some(port) = lookup("MQTT_PORT").and_then(|value| value.parse::<u16>().ok()) {
        runtime.network.mqtt_port = port;
    }
    if let Some(user) = lookup("MQTT_USER") {
        runtime.network.mqtt_user = user;
    }
    if let Some(pass) = lookup("MQTT_PASS") {
        runtime.network.mqtt_pass = pass;
    }
    if let Some(port) = lookup("ZONECARD_HTTP_PORT").and_then(|value| value.parse::<u16>().ok()) {
        runtime.http_port = port;
    }
}

fn wall_clock(timezone: &str) -> WallClock {
    let tz: Tz = timezone.parse().unwrap_or_else(|_| {
        warn!("unknown timezone {timezone}, falling back to UTC");
        Tz::UTC
    });
    Arc::new(move || {
        let local = Utc::now().with_timezone(&tz);
        local.with_timezone(&local.offset().fix())
    })
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

fn spawn_mqtt_loop(
    app_state: AppState,
    mut eventloop: rumqttc::EventLoop,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    if let Err(err) =
                        handle_mqtt_message(&app_state, &message.topic, &message.payload).await
                    {
                        warn!("mqtt message handling error: {err:#}");
                    }
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                    if let Err(err) = app_state
                        .mqtt
                        .try_subscribe(app_state.state_topic.as_str(), QoS::AtLeastOnce)
                    {
                        warn!("failed to subscribe to {}: {err}", app_state.state_topic);
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    })
}

fn spawn_view_publish_loop(app_state: AppState, topic: String) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut views = app_state.card.subscribe();
        loop {
            let payload = serde_json::to_vec(&*views.borrow_and_update());
            match payload {
                Ok(body) => {
                    if let Err(err) = app_state
                        .mqtt
                        .publish(topic.as_str(), QoS::AtLeastOnce, true, body)
                        .await
                    {
                        warn!("failed to publish card view: {err}");
                    }
                }
                Err(err) => warn!("failed to serialize card view: {err}"),
            }

            if views.changed().await.is_err() {
                break;
            }
        }
    })
}

async fn handle_mqtt_message(
    app_state: &AppState,
    topic: &str,
    payload: &[u8],
) -> anyhow::Result<()> {
    if payload.len() > MAX_MQTT_PAYLOAD_BYTES {
        warn!(
            "dropping oversized MQTT payload on topic {} ({} bytes)",
            topic,
            payload.len()
        );
        return Ok(());
    }
    if topic != app_state.state_topic.as_str() {
        return Ok(());
    }

    let snapshot = if payload.is_empty() {
        None
    } else {
        Some(
            serde_json::from_slice::<ZoneSnapshot>(payload)
                .with_context(|| format!("malformed zone snapshot on {topic}"))?,
        )
    };
    app_state.card.on_snapshot(snapshot).await;
    Ok(())
}

async fn handle_get_view(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.card.view())
}

async fn handle_temp_up(State(state): State<AppState>) -> impl IntoResponse {
    state.card.adjust_temperature(TEMP_STEP).await;
    view_response(&state)
}

async fn handle_temp_down(State(state): State<AppState>) -> impl IntoResponse {
    state.card.adjust_temperature(-TEMP_STEP).await;
    view_response(&state)
}

async fn handle_set_duration(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(value) = params.get("minutes") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'minutes' parameter");
    };
    let Ok(minutes) = value.parse::<u16>() else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid duration");
    };

    state.card.set_duration_preset(minutes).await;
    view_response(&state)
}

async fn handle_toggle_custom_duration(State(state): State<AppState>) -> impl IntoResponse {
    state.card.toggle_custom_duration().await;
    view_response(&state)
}

async fn handle_set_duration_hours(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let hours = match value_param(&params) {
        Ok(hours) => hours,
        Err(response) => return response,
    };
    state.card.set_duration_hours(hours).await;
    view_response(&state)
}

async fn handle_set_duration_minutes(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let minutes = match value_param(&params) {
        Ok(minutes) => minutes,
        Err(response) => return response,
    };
    state.card.set_duration_minutes(minutes).await;
    view_response(&state)
}

async fn handle_toggle_expanded(State(state): State<AppState>) -> impl IntoResponse {
    state.card.toggle_expanded().await;
    view_response(&state)
}

async fn handle_apply_override(State(state): State<AppState>) -> impl IntoResponse {
    state.card.apply_override().await;
    view_response(&state)
}

async fn handle_apply_permanent(State(state): State<AppState>) -> impl IntoResponse {
    state.card.apply_permanent_override().await;
    view_response(&state)
}

async fn handle_cancel_override(State(state): State<AppState>) -> impl IntoResponse {
    state.card.cancel_override().await;
    view_response(&state)
}

async fn handle_toggle_hvac(State(state): State<AppState>) -> impl IntoResponse {
    state.card.toggle_hvac().await;
    view_response(&state)
}

async fn handle_reload_config(State(state): State<AppState>) -> impl IntoResponse {
    let runtime = match state.store.load_effective_config().await {
        Ok(runtime) => runtime,
        Err(err) => {
            warn!("config reload failed: {err:#}");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read config");
        }
    };
    let config = match reloadable_config(&runtime, &state.state_topic) {
        Ok(config) => config,
        Err(response) => return response,
    };

    state.card.reconfigure(config).await;
    view_response(&state)
}

/// The entity is fixed for the lifetime of the MQTT subscription, so a reload
/// may only change how the card presents it.
fn reloadable_config(
    runtime: &RuntimeConfig,
    state_topic: &str,
) -> Result<CardConfig, axum::response::Response> {
    let config = CardConfig::from_settings(&runtime.card)
        .map_err(|err| error_response(StatusCode::BAD_REQUEST, &err.to_string()))?;
    if zone_state_topic(&config.entity) != state_topic {
        return Err(error_response(
            StatusCode::CONFLICT,
            "Changing the entity requires a restart",
        ));
    }
    Ok(config)
}

fn value_param(params: &HashMap<String, String>) -> Result<i64, axum::response::Response> {
    let Some(value) = params.get("value") else {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Missing 'value' parameter",
        ));
    };
    value
        .parse::<i64>()
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, "Invalid numeric value"))
}

fn view_response(state: &AppState) -> axum::response::Response {
    Json(state.card.view()).into_response()
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

impl AppStore {
    fn new() -> Self {
        let data_dir = std::env::var("ZONECARD_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.zonecard"));

        Self {
            runtime_path: Arc::new(data_dir.join("runtime.json")),
        }
    }

    /// Stored config with the environment applied on top.
    async fn load_effective_config(&self) -> anyhow::Result<RuntimeConfig> {
        let mut runtime = self.load_runtime_config().await?;
        apply_env_overrides(&mut runtime, |key| std::env::var(key).ok());
        Ok(runtime)
    }

    async fn load_runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        match tokio::fs::read(self.runtime_path.as_ref()).await {
            Ok(raw) => serde_json::from_slice::<RuntimeConfig>(&raw)
                .with_context(|| format!("malformed {}", self.runtime_path.display())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
            Err(err) => Err(err.into()),
        }
    }
}
