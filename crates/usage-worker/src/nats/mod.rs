mod usage_sample_processor;

pub use usage_sample_processor::{create_usage_sample_processor, EnergyUsageMessage};
