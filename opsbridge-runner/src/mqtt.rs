//! MQTT live channel
//!
//! Publishes streamed run output as JSON frames so dashboards and other
//! subscribers can follow a live conversation.

use rumqttc::{AsyncClient, MqttOptions, QoS};
use serde_json::json;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::warn;

use crate::sink::{LiveChannel, SinkError};

/// Topic carrying streamed run output frames
pub const OUTPUT_TOPIC: &str = "opsbridge/runs/output@v1";

/// Live channel publishing output frames over MQTT
pub struct MqttLiveChannel {
    client: AsyncClient,
    topic: String,
}

impl MqttLiveChannel {
    pub fn new(client: AsyncClient) -> Self {
        Self {
            client,
            topic: OUTPUT_TOPIC.to_string(),
        }
    }

    pub fn with_topic<S: Into<String>>(mut self, topic: S) -> Self {
        self.topic = topic.into();
        self
    }

    /// Connect to a broker and spawn the event-loop driver task
    pub fn connect(host: &str, port: u16, client_id: &str) -> Self {
        let mut opts = MqttOptions::new(client_id, host, port);
        opts.set_keep_alive(std::time::Duration::from_secs(15));
        let (client, mut eventloop) = AsyncClient::new(opts, 10);
        tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(_) => {}
                    Err(e) => {
                        warn!("mqtt connection error: {:?}", e);
                        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
                    }
                }
            }
        });
        Self::new(client)
    }
}

impl LiveChannel for MqttLiveChannel {
    fn send_message(&self, text: &str, correlation_id: &str) -> Result<(), SinkError> {
        let ts = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        let frame = json!({
            "correlation_id": correlation_id,
            "text": text,
            "ts": ts,
        });
        self.client
            .try_publish(self.topic.as_str(), QoS::AtLeastOnce, false, frame.to_string())
            .map_err(|e| SinkError::Channel(e.to_string()))
    }
}
