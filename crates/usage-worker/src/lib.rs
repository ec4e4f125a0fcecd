pub mod nats;
pub mod scheduler;
pub mod usage_worker;
