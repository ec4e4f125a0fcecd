mod aggregation_service;
mod directory;
mod error;
mod ingest_service;
mod producer;
mod report_service;
mod store;
mod types;

pub use aggregation_service::*;
pub use directory::*;
pub use error::*;
pub use ingest_service::*;
pub use producer::*;
pub use report_service::*;
pub use store::*;
pub use types::*;
