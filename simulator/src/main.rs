mod zone;

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use chrono::Utc;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use tokio::sync::Mutex;
use tracing::{info, warn};

use zonecard_common::{zone_state_topic, ZoneCommand, COMMAND_TOPICS};

use crate::zone::SimulatedZone;

const DEFAULT_ENTITY: &str = "climate.living_room";
const TICK_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let entity = std::env::var("ZONECARD_ENTITY").unwrap_or_else(|_| DEFAULT_ENTITY.to_string());
    let zone_name = std::env::var("SIM_ZONE_NAME").unwrap_or_else(|_| "Living Room".to_string());
    let apply_delay = std::env::var("SIM_APPLY_DELAY_MS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(2));

    let mqtt_host = std::env::var("MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let mqtt_port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(1883);

    let mut mqtt_options = MqttOptions::new("zonecard-simulator", mqtt_host, mqtt_port);
    if let Ok(user) = std::env::var("MQTT_USER") {
        let pass = std::env::var("MQTT_PASS").unwrap_or_default();
        mqtt_options.set_credentials(user, pass);
    }

    let (mqtt, mut eventloop) = AsyncClient::new(mqtt_options, 32);
    let zone = Arc::new(Mutex::new(SimulatedZone::new(&entity, &zone_name, Utc::now())));
    let state_topic = zone_state_topic(&entity);

    publish_snapshot(&mqtt, &state_topic, &zone)
        .await
        .context("failed to publish initial zone snapshot")?;

    {
        let mqtt = mqtt.clone();
        let zone = zone.clone();
        let state_topic = state_topic.clone();
        tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Incoming::Publish(message))) => {
                        match ZoneCommand::decode(&message.topic, &message.payload) {
                            Ok(command) => schedule_apply(
                                mqtt.clone(),
                                zone.clone(),
                                state_topic.clone(),
                                command,
                                apply_delay,
                            ),
                            Err(err) => warn!("ignoring command on {}: {err}", message.topic),
                        }
                    }
                    Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                        info!("simulator mqtt connected");
                        for topic in COMMAND_TOPICS {
                            if let Err(err) = mqtt.try_subscribe(topic, QoS::AtLeastOnce) {
                                warn!("failed to subscribe to {topic}: {err}");
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!("simulator mqtt poll error: {err}");
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                }
            }
        });
    }

    info!("simulating {entity} on {state_topic}");

    let mut interval = tokio::time::interval(TICK_INTERVAL);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                {
                    let mut zone = zone.lock().await;
                    if zone.expire_override(Utc::now()) {
                        info!("temporary override on {entity} ended");
                    }
                    zone.drift();
                }
                publish_snapshot(&mqtt, &state_topic, &zone)
                    .await
                    .context("failed to publish zone snapshot")?;
            }
            _ = &mut shutdown => {
                info!("removing {entity}");
                mqtt.publish(state_topic.as_str(), QoS::AtLeastOnce, true, Vec::new())
                    .await
                    .context("failed to clear zone snapshot")?;
                return Ok(());
            }
        }
    }
}

fn schedule_apply(
    mqtt: AsyncClient,
    zone: Arc<Mutex<SimulatedZone>>,
    state_topic: String,
    command: ZoneCommand,
    delay: Duration,
) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let applied = zone.lock().await.apply(&command, Utc::now());
        if !applied {
            return;
        }
        info!("applied {} for {}", command.topic(), command.entity_id());
        if let Err(err) = publish_snapshot(&mqtt, &state_topic, &zone).await {
            warn!("failed to publish zone snapshot: {err:#}");
        }
    });
}

async fn publish_snapshot(
    mqtt: &AsyncClient,
    topic: &str,
    zone: &Mutex<SimulatedZone>,
) -> anyhow::Result<()> {
    let payload = serde_json::to_vec(zone.lock().await.snapshot())?;
    mqtt.publish(topic, QoS::AtLeastOnce, true, payload).await?;
    Ok(())
}
