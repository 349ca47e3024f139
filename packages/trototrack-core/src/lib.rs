//! TrotoTrack Core Library
//!
//! Client side of the TrotoTrack sidewalk survey service:
//! - Scan submission (multipart upload of a sidewalk photo, tri-state progress)
//! - Endpoint configuration (environment, config file, defaults)
//! - Session credentials and bearer token sources
//! - Scan screen flow (capture, crop, submit, show result)
//!
//! # Features
//!
//! - `keyring-storage`: Use platform keyring for credential storage
//! - `file-storage` (default): Use file-based credential storage only
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use trototrack_core::{api, auth, scan};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = api::load_api_config();
//!     let transport = api::HttpScanTransport::from_config(&config)?;
//!     let pipeline = scan::ScanPipeline::new(transport, Arc::new(auth::StoredCredentials))
//!         .with_token_wait(config.token_wait);
//!
//!     let image = scan::ImagePayload::from_path("sidewalk.jpg".as_ref()).await?;
//!     let mut states = Box::pin(pipeline.scan(image));
//!     while let Some(state) = states.next().await {
//!         println!("{:?}", state);
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod scan;
pub mod screen;

// Re-export commonly used types
pub use api::{ApiClient, ApiEndpointConfig, AuthMode, ConfigSource, HttpScanTransport};
pub use auth::{Credentials, StaticToken, StoredCredentials, TokenSource, WatchTokenSource};
pub use scan::{
    ImagePayload, NetworkOutcome, OperationState, ScanPipeline, ScanResponse, ScanResult,
    ScanState, ScanTransport, TransportError,
};
pub use screen::{FileImageCapture, ImageCapture, ImageHandle, ScanScreen, ScreenEvent};
