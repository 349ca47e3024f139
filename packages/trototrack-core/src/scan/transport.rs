use crate::scan::payload::{ImagePayload, ScanResponse};
use async_trait::async_trait;
use thiserror::Error;

/// Bearer credential as supplied by a [`crate::auth::TokenSource`]. `None` when signed out.
pub type AuthToken = Option<String>;

/// Outcome of one completed exchange with the scan endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkOutcome {
    /// 2xx with a body that decoded as [`ScanResponse`].
    Success(ScanResponse),
    /// The server answered but rejected the request.
    Rejected {
        status: u16,
        raw_error_body: Option<String>,
        network_message: Option<String>,
    },
}

/// Fault raised when no usable outcome could be produced.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{0}")]
    Request(#[from] reqwest::Error),
    #[error("Failed to decode scan response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{}", .0.as_deref().unwrap_or_default())]
    Fault(Option<String>),
}

impl TransportError {
    /// Description of the fault, if it carries one.
    pub fn message(&self) -> Option<String> {
        match self {
            TransportError::Fault(message) => message.clone().filter(|m| !m.is_empty()),
            other => Some(other.to_string()),
        }
    }
}

/// Performs a single image classification exchange.
#[async_trait]
pub trait ScanTransport: Send + Sync {
    async fn submit_scan(
        &self,
        image: ImagePayload,
        token: AuthToken,
    ) -> Result<NetworkOutcome, TransportError>;
}

/// `Authorization` header value for a token.
///
/// A missing token is sent as the literal `Bearer null`; the header is never
/// omitted.
pub fn bearer_header_value(token: &AuthToken) -> String {
    format!("Bearer {}", token.as_deref().unwrap_or("null"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_header_value() {
        assert_eq!(bearer_header_value(&Some("abc".into())), "Bearer abc");
    }

    #[test]
    fn test_bearer_header_value_missing_token_quirk() {
        // Absent tokens are sent literally, not dropped.
        assert_eq!(bearer_header_value(&None), "Bearer null");
    }

    #[test]
    fn test_fault_message() {
        assert_eq!(
            TransportError::Fault(Some("timeout".into())).message(),
            Some("timeout".to_string())
        );
        assert_eq!(TransportError::Fault(None).message(), None);
        assert_eq!(TransportError::Fault(Some(String::new())).message(), None);

        let decode = serde_json::from_str::<ScanResponse>("<html>").unwrap_err();
        let message = TransportError::from(decode).message().unwrap();
        assert!(message.starts_with("Failed to decode scan response"));
    }
}
