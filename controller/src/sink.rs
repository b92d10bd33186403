use async_trait::async_trait;
use rumqttc::{AsyncClient, QoS};
use tracing::debug;

use zonecard_common::{CommandRejected, ZoneCommand};

/// Where issued zone commands go. A returned error is the only failure
/// signal the card ever gets for a command; success means nothing more
/// than "accepted for delivery".
#[async_trait]
pub trait CommandSink: Send + Sync + 'static {
    async fn send(&self, command: &ZoneCommand) -> Result<(), CommandRejected>;
}

#[derive(Clone)]
pub struct MqttCommandSink {
    mqtt: AsyncClient,
}

impl MqttCommandSink {
    pub fn new(mqtt: AsyncClient) -> Self {
        Self { mqtt }
    }
}

#[async_trait]
impl CommandSink for MqttCommandSink {
    async fn send(&self, command: &ZoneCommand) -> Result<(), CommandRejected> {
        let payload = command
            .to_payload()
            .map_err(|err| CommandRejected(format!("failed to encode command: {err}")))?;

        debug!("publishing command on {}", command.topic());
        self.mqtt
            .publish(command.topic(), QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|err| CommandRejected(format!("mqtt publish failed: {err}")))
    }
}
