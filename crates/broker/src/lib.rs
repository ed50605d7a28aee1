//! Broker client for the fulfillment saga.
//!
//! This crate provides:
//! - Connection settings and per-operation consumer group naming
//! - The six topics and their JSON wire messages
//! - `MessagePublisher` and `MessageHandler` seams with a shared
//!   acknowledgement policy
//! - Kafka implementations (rdkafka) and an in-memory broker for tests

pub mod client;
pub mod config;
pub mod error;
pub mod kafka;
pub mod memory;
pub mod message;
pub mod topic;

pub use client::{
    DeliveryPolicy, Disposition, HandleOutcome, MessageHandler, MessagePublisher, deliver,
};
pub use config::{BrokerConfig, SaslCredentials};
pub use error::{BrokerError, Result};
pub use kafka::{KafkaPublisher, KafkaSubscriber};
pub use memory::InMemoryBroker;
pub use message::{
    EVENT_ID_HEADER, InboundMessage, OutboundRecord, PaymentMessage, ShippingMessage,
    StatusMessage,
};
pub use topic::{ConsumerOperation, Topic};
