//! HTTP access to the TrotoTrack services.

mod client;
pub mod config;

pub use client::{ApiClient, AuthMode, HttpScanTransport, IMAGE_FIELD, PREDICT_ROUTE};
pub use config::{load_api_config, load_api_config_from, ApiEndpointConfig, ConfigSource};
