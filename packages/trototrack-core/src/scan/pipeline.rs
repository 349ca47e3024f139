//! Scan submission pipeline.
//!
//! Turns one exchange with a [`ScanTransport`] into the ordered
//! `[Loading, Success | Error]` sequence consumed by the screen layer.

use crate::auth::TokenSource;
use crate::scan::payload::{ImagePayload, ScanResponse};
use crate::scan::state::OperationState;
use crate::scan::transport::{AuthToken, NetworkOutcome, ScanTransport, TransportError};
use futures::{FutureExt, Stream};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

/// Default bound on how long a scan waits for the token source.
pub const DEFAULT_TOKEN_WAIT: Duration = Duration::from_secs(2);

pub type ScanState = OperationState<ScanResponse>;

/// Orchestrates scans against a transport. Cheap to clone; clones share the
/// transport and token source.
pub struct ScanPipeline<T: ScanTransport> {
    transport: Arc<T>,
    tokens: Arc<dyn TokenSource>,
    token_wait: Duration,
}

impl<T: ScanTransport> Clone for ScanPipeline<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            tokens: self.tokens.clone(),
            token_wait: self.token_wait,
        }
    }
}

impl<T: ScanTransport + 'static> ScanPipeline<T> {
    pub fn new(transport: T, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            transport: Arc::new(transport),
            tokens,
            token_wait: DEFAULT_TOKEN_WAIT,
        }
    }

    pub fn with_token_wait(mut self, token_wait: Duration) -> Self {
        self.token_wait = token_wait;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Submit `image` and report progress.
    ///
    /// The returned stream yields `Loading` on its first poll, before any
    /// I/O, then exactly one terminal state, then ends. Every failure
    /// (rejection, transport fault, panic inside the transport) becomes
    /// `Error`.
    pub fn scan(&self, image: ImagePayload) -> impl Stream<Item = ScanState> + Send + 'static {
        let transport = self.transport.clone();
        let tokens = self.tokens.clone();
        let token_wait = self.token_wait;

        async_stream::stream! {
            yield OperationState::Loading;

            let exchange = async {
                let token = read_token(tokens.as_ref(), token_wait).await;
                transport.submit_scan(image, token).await
            };

            let terminal = match AssertUnwindSafe(exchange).catch_unwind().await {
                Ok(result) => classify(result),
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    tracing::error!("Scan exchange panicked: {:?}", message);
                    OperationState::error_or_fallback(message)
                }
            };
            yield terminal;
        }
    }

    /// Run a scan to completion and return its terminal state.
    pub async fn scan_to_completion(&self, image: ImagePayload) -> ScanState {
        use futures::StreamExt;

        let mut last = OperationState::Loading;
        let mut states = Box::pin(self.scan(image));
        while let Some(state) = states.next().await {
            last = state;
        }
        last
    }
}

async fn read_token(tokens: &dyn TokenSource, token_wait: Duration) -> AuthToken {
    match tokio::time::timeout(token_wait, tokens.current_token()).await {
        Ok(token) => token,
        Err(_) => {
            tracing::warn!(
                "No token available after {:?}, sending request without one",
                token_wait
            );
            None
        }
    }
}

fn classify(result: Result<NetworkOutcome, TransportError>) -> ScanState {
    match result {
        Ok(NetworkOutcome::Success(body)) => {
            tracing::info!("Scan succeeded (label: {:?})", body.label());
            OperationState::Success(body)
        }
        Ok(NetworkOutcome::Rejected {
            status,
            raw_error_body,
            network_message,
        }) => {
            tracing::warn!(
                "Scan rejected: {} {} - {:?}",
                status,
                network_message.as_deref().unwrap_or(""),
                raw_error_body
            );
            OperationState::error_or_fallback(raw_error_body)
        }
        Err(e) => {
            tracing::error!("Scan request failed: {}", e);
            OperationState::error_or_fallback(e.message())
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> Option<String> {
    if let Some(s) = panic.downcast_ref::<&str>() {
        Some(s.to_string())
    } else {
        panic.downcast_ref::<String>().cloned()
    }
}
