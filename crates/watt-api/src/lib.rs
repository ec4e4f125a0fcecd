pub mod http;
mod watt_api;

pub use watt_api::{HttpConfig, WattApi};
