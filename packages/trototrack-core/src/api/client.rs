use crate::api::config::ApiEndpointConfig;
use crate::scan::{
    bearer_header_value, AuthToken, ImagePayload, NetworkOutcome, ScanResponse, ScanTransport,
    TransportError,
};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use std::time::Duration;

/// Route of the classification endpoint, relative to the scan base URL
pub const PREDICT_ROUTE: &str = "predict";

/// Multipart field carrying the image
pub const IMAGE_FIELD: &str = "image";

/// Whether requests from a client carry the bearer header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Authorized,
    Unauthorized,
}

/// HTTP client bound to one base URL and one auth mode.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    auth: AuthMode,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration, auth: AuthMode) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    /// Client for the classification service, as configured.
    pub fn for_scan(config: &ApiEndpointConfig) -> Result<Self, TransportError> {
        let auth = if config.authorize_scan {
            AuthMode::Authorized
        } else {
            AuthMode::Unauthorized
        };
        Self::new(&config.scan_url, config.timeout, auth)
    }

    pub fn auth_mode(&self) -> AuthMode {
        self.auth
    }

    pub fn endpoint(&self, route: &str) -> String {
        format!("{}/{}", self.base_url, route.trim_start_matches('/'))
    }

    fn post(&self, route: &str, token: &AuthToken) -> reqwest::RequestBuilder {
        let builder = self.http.post(self.endpoint(route));
        match self.auth {
            AuthMode::Authorized => builder.header(AUTHORIZATION, bearer_header_value(token)),
            AuthMode::Unauthorized => builder,
        }
    }
}

/// [`ScanTransport`] that posts the image to `<scan_url>/predict`.
#[derive(Debug, Clone)]
pub struct HttpScanTransport {
    client: ApiClient,
}

impl HttpScanTransport {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn from_config(config: &ApiEndpointConfig) -> Result<Self, TransportError> {
        Ok(Self::new(ApiClient::for_scan(config)?))
    }
}

#[async_trait]
impl ScanTransport for HttpScanTransport {
    async fn submit_scan(
        &self,
        image: ImagePayload,
        token: AuthToken,
    ) -> Result<NetworkOutcome, TransportError> {
        let (bytes, file_name, media_type) = image.into_parts();
        let size = bytes.len();

        let part = Part::bytes(bytes)
            .file_name(file_name.clone())
            .mime_str(media_type)?;
        let form = Form::new().part(IMAGE_FIELD, part);

        let request = self.client.post(PREDICT_ROUTE, &token).multipart(form).build()?;

        tracing::debug!(
            "--> {} {} headers={} part={}; filename={}; type={}; {} bytes",
            request.method(),
            request.url(),
            redacted_headers(request.headers()),
            IMAGE_FIELD,
            file_name,
            media_type,
            size
        );

        let resp = self.client.http.execute(request).await?;
        let status = resp.status();
        let headers = redacted_headers(resp.headers());
        let body = resp.text().await?;

        tracing::debug!("<-- {} headers={}", status, headers);
        tracing::trace!("<-- body: {}", body);

        if status.is_success() {
            let decoded: ScanResponse = serde_json::from_str(&body)?;
            return Ok(NetworkOutcome::Success(decoded));
        }

        Ok(NetworkOutcome::Rejected {
            status: status.as_u16(),
            raw_error_body: (!body.is_empty()).then_some(body),
            network_message: status.canonical_reason().map(String::from),
        })
    }
}

fn redacted_headers(headers: &HeaderMap) -> String {
    let rendered: Vec<String> = headers
        .iter()
        .map(|(name, value)| {
            let value = value.to_str().unwrap_or("<binary>");
            if *name == AUTHORIZATION && value != "Bearer null" {
                format!("{}: Bearer <redacted>", name)
            } else {
                format!("{}: {}", name, value)
            }
        })
        .collect();
    format!("[{}]", rendered.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;
    use crate::scan::{display_error_message, OperationState, ScanPipeline, ScanResult};
    use futures::StreamExt;
    use std::sync::Arc;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport(server: &MockServer, auth: AuthMode) -> HttpScanTransport {
        HttpScanTransport::new(ApiClient::new(&server.uri(), Duration::from_secs(5), auth).unwrap())
    }

    fn image() -> ImagePayload {
        ImagePayload::jpeg("slab.jpg", vec![0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10])
    }

    #[test]
    fn test_endpoint_join() {
        let client = ApiClient::new(
            "https://scan.example.com/",
            Duration::from_secs(1),
            AuthMode::Authorized,
        )
        .unwrap();
        assert_eq!(client.endpoint(PREDICT_ROUTE), "https://scan.example.com/predict");
        assert_eq!(client.endpoint("/predict"), "https://scan.example.com/predict");
    }

    #[test]
    fn test_for_scan_respects_authorize_flag() {
        let mut config = ApiEndpointConfig::default();
        assert_eq!(ApiClient::for_scan(&config).unwrap().auth_mode(), AuthMode::Authorized);
        config.authorize_scan = false;
        assert_eq!(ApiClient::for_scan(&config).unwrap().auth_mode(), AuthMode::Unauthorized);
    }

    #[test]
    fn test_redacted_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer secret".parse().unwrap());
        assert_eq!(redacted_headers(&headers), "[authorization: Bearer <redacted>]");

        headers.insert(AUTHORIZATION, "Bearer null".parse().unwrap());
        assert_eq!(redacted_headers(&headers), "[authorization: Bearer null]");
    }

    #[tokio::test]
    async fn test_submit_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "label": "damaged", "description": "Broken paving" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = transport(&server, AuthMode::Authorized)
            .submit_scan(image(), Some("tok-1".into()))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            NetworkOutcome::Success(ScanResponse {
                data: Some(ScanResult {
                    label: Some("damaged".into()),
                    description: Some("Broken paving".into()),
                }),
            })
        );
    }

    #[tokio::test]
    async fn test_submit_sends_image_part() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": {}})))
            .mount(&server)
            .await;

        transport(&server, AuthMode::Authorized)
            .submit_scan(image(), Some("tok".into()))
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let content_type = requests[0].headers.get("content-type").unwrap().to_str().unwrap();
        assert!(content_type.starts_with("multipart/form-data"));

        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains(r#"name="image""#));
        assert!(body.contains(r#"filename="slab.jpg""#));
        assert!(body.contains("image/jpeg"));
    }

    #[tokio::test]
    async fn test_missing_token_sent_as_null_literal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .and(header("authorization", "Bearer null"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = transport(&server, AuthMode::Authorized)
            .submit_scan(image(), None)
            .await
            .unwrap();
        assert_eq!(outcome, NetworkOutcome::Success(ScanResponse { data: None }));
    }

    #[tokio::test]
    async fn test_unauthorized_mode_sends_no_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        transport(&server, AuthMode::Unauthorized)
            .submit_scan(image(), Some("ignored".into()))
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn test_rejection_keeps_raw_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .respond_with(ResponseTemplate::new(422).set_body_string(r#"{"message":"too blurry"}"#))
            .mount(&server)
            .await;

        let outcome = transport(&server, AuthMode::Authorized)
            .submit_scan(image(), None)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            NetworkOutcome::Rejected {
                status: 422,
                raw_error_body: Some(r#"{"message":"too blurry"}"#.into()),
                network_message: Some("Unprocessable Entity".into()),
            }
        );
    }

    #[tokio::test]
    async fn test_rejection_with_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let outcome = transport(&server, AuthMode::Authorized)
            .submit_scan(image(), None)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            NetworkOutcome::Rejected { status: 500, raw_error_body: None, .. }
        ));
    }

    #[tokio::test]
    async fn test_undecodable_success_body_is_fault() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = transport(&server, AuthMode::Authorized)
            .submit_scan(image(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Decode(_)));
    }

    #[tokio::test]
    async fn test_timeout_is_fault() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let client =
            ApiClient::new(&server.uri(), Duration::from_millis(100), AuthMode::Authorized)
                .unwrap();
        let err = HttpScanTransport::new(client)
            .submit_scan(image(), None)
            .await
            .unwrap_err();
        match err {
            TransportError::Request(e) => assert!(e.is_timeout()),
            other => panic!("expected request error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_pipeline_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .and(header("authorization", "Bearer live"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string(r#"{"message":"no sidewalk"}"#),
            )
            .mount(&server)
            .await;

        let pipeline = ScanPipeline::new(
            transport(&server, AuthMode::Authorized),
            Arc::new(StaticToken::new(Some("live".into()))),
        );
        let states: Vec<_> = pipeline.scan(image()).collect().await;
        assert_eq!(states.len(), 2);
        assert_eq!(states[0], OperationState::Loading);
        match &states[1] {
            OperationState::Error(message) => {
                assert_eq!(message, r#"{"message":"no sidewalk"}"#);
                assert_eq!(display_error_message(message), "no sidewalk");
            }
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_pipeline_unreachable_server() {
        let client =
            ApiClient::new("http://127.0.0.1:9", Duration::from_secs(2), AuthMode::Authorized)
                .unwrap();
        let pipeline =
            ScanPipeline::new(HttpScanTransport::new(client), Arc::new(StaticToken::default()));

        match pipeline.scan_to_completion(image()).await {
            OperationState::Error(message) => assert!(!message.is_empty()),
            other => panic!("expected error, got {:?}", other),
        }
    }
}
