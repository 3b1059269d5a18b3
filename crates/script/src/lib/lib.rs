pub mod consts;
pub mod deposit_cache;
pub mod eth_client;
pub mod prometheus_metrics;
pub mod reconciler;
pub mod scripts;
pub mod tracing;
pub mod utils;
