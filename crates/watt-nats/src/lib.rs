mod alert_producer;
mod client;
mod consumer;

pub use alert_producer::{AlertEventMessage, NatsAlertProducer};
pub use client::NatsClient;
pub use consumer::{BatchProcessor, NatsConsumer, ProcessingResult};
