//! Broker connection settings.

use std::time::Duration;

use rdkafka::ClientConfig;

use crate::topic::ConsumerOperation;

/// SASL credentials, sent only when a mechanism is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaslCredentials {
    pub mechanism: String,
    pub username: String,
    pub password: String,
}

/// Kafka connection settings shared by the producer and every consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    pub brokers: Vec<String>,
    /// Base name; each operation gets `{base}-{operation}-consumer`.
    pub consumer_group: String,
    pub client_id: Option<String>,
    pub security_protocol: Option<String>,
    pub sasl: Option<SaslCredentials>,
    /// `earliest` or `latest`, for groups without a committed offset.
    pub auto_offset_reset: String,
    pub message_timeout: Duration,
    /// Pause before re-entering a consumer loop after a non-cancellation error.
    pub reconnect_delay: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_string()],
            consumer_group: "ecommerce-group".to_string(),
            client_id: None,
            security_protocol: None,
            sasl: None,
            auto_offset_reset: "latest".to_string(),
            message_timeout: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

impl BrokerConfig {
    /// Loads settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads settings through `lookup`, falling back to defaults for
    /// missing or unparsable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let brokers = lookup("KAFKA_BROKERS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect::<Vec<_>>()
            })
            .filter(|list| !list.is_empty())
            .unwrap_or(defaults.brokers);

        let sasl = lookup("KAFKA_SASL_MECHANISM")
            .filter(|m| !m.is_empty())
            .map(|mechanism| SaslCredentials {
                mechanism,
                username: lookup("KAFKA_SASL_USERNAME").unwrap_or_default(),
                password: lookup("KAFKA_SASL_PASSWORD").unwrap_or_default(),
            });

        Self {
            brokers,
            consumer_group: lookup("KAFKA_CONSUMER_GROUP").unwrap_or(defaults.consumer_group),
            client_id: lookup("KAFKA_CLIENT_ID").filter(|s| !s.is_empty()),
            security_protocol: lookup("KAFKA_SECURITY_PROTOCOL").filter(|s| !s.is_empty()),
            sasl,
            auto_offset_reset: lookup("KAFKA_AUTO_OFFSET_RESET")
                .unwrap_or(defaults.auto_offset_reset),
            message_timeout: lookup("KAFKA_MESSAGE_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.message_timeout),
            reconnect_delay: defaults.reconnect_delay,
        }
    }

    /// Consumer group id for one operation.
    pub fn group_id(&self, operation: ConsumerOperation) -> String {
        format!("{}-{}-consumer", self.consumer_group, operation)
    }

    fn base_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config.set("bootstrap.servers", self.brokers.join(","));
        if let Some(client_id) = &self.client_id {
            config.set("client.id", client_id);
        }
        if let Some(protocol) = &self.security_protocol {
            config.set("security.protocol", protocol);
        }
        if let Some(sasl) = &self.sasl {
            config
                .set("sasl.mechanism", &sasl.mechanism)
                .set("sasl.username", &sasl.username)
                .set("sasl.password", &sasl.password);
        }
        config
    }

    /// Producer settings. `acks=all` makes a send return only after every
    /// in-sync replica has the record.
    pub fn producer_config(&self) -> ClientConfig {
        let mut config = self.base_config();
        config
            .set("acks", "all")
            .set(
                "message.timeout.ms",
                self.message_timeout.as_millis().to_string(),
            );
        config
    }

    /// Consumer settings for one operation. Offsets are committed by hand
    /// after the handler finishes.
    pub fn consumer_config(&self, operation: ConsumerOperation) -> ClientConfig {
        let mut config = self.base_config();
        config
            .set("group.id", self.group_id(operation))
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &self.auto_offset_reset)
            .set("partition.assignment.strategy", "roundrobin");
        config
    }
}
