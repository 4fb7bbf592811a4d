pub mod classifier;
pub mod config;
pub mod coordinator;
pub mod gateway;
pub mod inspect;
pub mod ordering;
pub mod proposal;
pub mod query;
pub mod watcher;

#[cfg(test)]
mod test_support;

pub use config::GatewayConfig;
pub use gateway::{ChaincodeCall, Gateway, Identity};
