//! Image submission and the tri-state progress reported for it.

mod payload;
mod pipeline;
mod state;
mod transport;

pub use payload::{ImagePayload, ScanResponse, ScanResult, JPEG_MEDIA_TYPE};
pub use pipeline::{ScanPipeline, ScanState, DEFAULT_TOKEN_WAIT};
pub use state::{display_error_message, OperationState, FALLBACK_ERROR_MESSAGE};
pub use transport::{bearer_header_value, AuthToken, NetworkOutcome, ScanTransport, TransportError};
