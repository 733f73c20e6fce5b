//! Home Assistant integration over MQTT
//!
//! Every group member gets a retained sensor discovery config under
//! `homeassistant/sensor/<unique id>/config`. The balances of a group are
//! retained on `<topic prefix>/<group id>/state` as
//! `{"balances": {member id: net}, "timestamp": ...}`, and each sensor picks
//! its member's net position out of that state.

use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info, warn};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use serde_json::{json, Map, Value};
use std::time::Duration;

use super::PublishError;
use crate::config::MqttConfig;
use crate::ledger::GroupBalances;
use crate::traits::BalancePublisher;
use crate::types::{Group, Member};

const DISCOVERY_PREFIX: &str = "homeassistant";
const KEEP_ALIVE: Duration = Duration::from_secs(60);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const REQUEST_CAPACITY: usize = 64;

/// A retained message ready to publish
#[derive(Debug, Clone, PartialEq)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: Value,
}

/// Builds the topics and payloads for one broker namespace
#[derive(Debug, Clone, PartialEq)]
pub struct MqttTopics {
    prefix: String,
}

impl MqttTopics {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Topic holding the balances of a group
    pub fn state_topic(&self, group_id: &str) -> String {
        format!("{}/{}/state", self.prefix, group_id)
    }

    fn unique_id(&self, group_id: &str, member_id: &str) -> String {
        format!("{}_{}_{}", self.prefix.replace(['/', '-'], "_"), group_id, member_id)
    }

    /// One sensor config per member of `group`
    ///
    /// `members` supplies display names; members missing from it fall back
    /// to their id.
    pub fn discovery(&self, group: &Group, members: &[Member]) -> Vec<MqttMessage> {
        group
            .members
            .iter()
            .map(|member_id| {
                let display_name = members
                    .iter()
                    .find(|m| &m.id == member_id)
                    .map(|m| m.display_name.as_str())
                    .unwrap_or(member_id.as_str());
                let unique_id = self.unique_id(&group.id, member_id);
                let icon = if group.currency == "EUR" {
                    "mdi:currency-eur"
                } else {
                    "mdi:cash"
                };
                MqttMessage {
                    topic: format!("{}/sensor/{}/config", DISCOVERY_PREFIX, unique_id),
                    payload: json!({
                        "name": format!("{} balance in {}", display_name, group.name),
                        "unique_id": unique_id,
                        "state_topic": self.state_topic(&group.id),
                        "value_template":
                            format!("{{{{ value_json.balances['{}'] | default(0) }}}}", member_id),
                        "unit_of_measurement": group.currency,
                        "device_class": "monetary",
                        "icon": icon,
                        "device": {
                            "identifiers": [format!("{}_{}", self.prefix, group.id)],
                            "name": group.name,
                            "manufacturer": "split-ledger",
                        },
                    }),
                }
            })
            .collect()
    }

    /// State message with every member's net position
    pub fn state(&self, balances: &GroupBalances, at: DateTime<Utc>) -> MqttMessage {
        let nets: Map<String, Value> = balances
            .net
            .iter()
            .map(|(member, net)| {
                let amount = net.minor_units() as f64 / 100.0;
                (member.clone(), json!(amount))
            })
            .collect();
        MqttMessage {
            topic: self.state_topic(&balances.group_id),
            payload: json!({
                "balances": nets,
                "timestamp": at.to_rfc3339_opts(SecondsFormat::Secs, true),
            }),
        }
    }
}

/// Publishes balances to an MQTT broker
///
/// Messages are queued without waiting; the connection is driven by a
/// background task that keeps reconnecting while the broker is away.
pub struct MqttPublisher {
    client: AsyncClient,
    topics: MqttTopics,
}

impl MqttPublisher {
    /// Connect to the broker in `config`
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(config: &MqttConfig) -> Self {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(KEEP_ALIVE);
        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        tokio::spawn(drive(eventloop));
        info!(
            "MQTT client {} connecting to {}:{}",
            config.client_id, config.host, config.port
        );

        Self {
            client,
            topics: MqttTopics::new(config.topic_prefix.clone()),
        }
    }

    fn send(&self, message: MqttMessage) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(&message.payload)?;
        self.client
            .try_publish(message.topic.as_str(), QoS::AtLeastOnce, true, payload)
            .map_err(|e| PublishError::Unavailable(e.to_string()))?;
        debug!("Queued MQTT message on {}", message.topic);
        Ok(())
    }
}

impl BalancePublisher for MqttPublisher {
    fn announce_group(&self, group: &Group, members: &[Member]) -> Result<(), PublishError> {
        for message in self.topics.discovery(group, members) {
            self.send(message)?;
        }
        Ok(())
    }

    fn publish_balances(&self, balances: &GroupBalances) -> Result<(), PublishError> {
        self.send(self.topics.state(balances, Utc::now()))
    }
}

async fn drive(mut eventloop: EventLoop) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => info!("MQTT client connected"),
            Ok(_) => {}
            Err(e) => {
                warn!("MQTT connection error: {}", e);
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}
