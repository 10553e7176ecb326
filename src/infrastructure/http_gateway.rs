use crate::config::{Operation, SdkConfig};
use crate::domain::payment::{PaymentRecord, PaymentRequest, SessionToken, StatusReport};
use crate::domain::ports::PaymentGateway;
use crate::error::{Result, SdkError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

pub const SESSION_TOKEN_HEADER: &str = "X-Session-Token";

/// The gateway wire protocol over HTTPS.
///
/// Every operation is a JSON POST to `{base}/{environment}/{operation}` with
/// the publishable key as bearer credential. Requests carry no timeout of
/// their own; the poll loop keeps ticking while one is outstanding.
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    config: SdkConfig,
}

impl HttpGateway {
    pub fn new(config: SdkConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|err| SdkError::Config(format!("could not build HTTP client: {err}")))?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: SdkConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    async fn post<B: Serialize + ?Sized + Sync>(
        &self,
        operation: Operation,
        body: &B,
        token: Option<&SessionToken>,
    ) -> Result<Value> {
        let url = self.config.endpoint(operation);
        let mut request = self
            .client
            .post(&url)
            .bearer_auth(&self.config.publishable_key)
            .json(body);
        if let Some(token) = token {
            request = request.header(SESSION_TOKEN_HEADER, token.as_str());
        }

        debug!(%url, "gateway request");
        let response = request
            .send()
            .await
            .map_err(|err| SdkError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SdkError::from_gateway_body(status.as_u16(), &body));
        }

        response
            .json::<Value>()
            .await
            .map_err(|err| SdkError::Decode(err.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn create_token(&self, request: &PaymentRequest) -> Result<SessionToken> {
        let value = self.post(Operation::CreateToken, request, None).await?;
        ["token", "sessionToken"]
            .iter()
            .find_map(|field| value.get(*field).and_then(Value::as_str))
            .filter(|token| !token.is_empty())
            .map(|token| SessionToken(token.to_string()))
            .ok_or(SdkError::MissingData("session token"))
    }

    async fn create_payment(
        &self,
        request: &PaymentRequest,
        token: Option<&SessionToken>,
    ) -> Result<PaymentRecord> {
        let value = self.post(Operation::CreatePayment, request, token).await?;
        PaymentRecord::from_response(value)
    }

    async fn poll_status(
        &self,
        transaction_ref: &str,
        token: Option<&SessionToken>,
    ) -> Result<StatusReport> {
        let body = json!({ "transactionRefId": transaction_ref });
        let value = self.post(Operation::PollStatus, &body, token).await?;
        StatusReport::from_response(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Environment, SdkOptions};
    use crate::domain::payment::PaymentStatus;
    use httpmock::prelude::*;
    use rust_decimal_macros::dec;

    fn gateway(server: &MockServer) -> HttpGateway {
        let options = SdkOptions {
            environment: Environment::Sandbox,
            base_url: Some(server.base_url()),
            ..SdkOptions::new("pk_test_123")
        };
        HttpGateway::new(SdkConfig::try_from(options).unwrap()).unwrap()
    }

    fn request() -> PaymentRequest {
        PaymentRequest::new(dec!(250).try_into().unwrap(), "INR", "ORD-42")
    }

    #[tokio::test]
    async fn test_create_payment_sends_key_and_body() {
        let server = MockServer::start_async().await;
        let mock = server.mock_async(|when, then| {
            when.method(POST)
                .path("/sandbox/payment-create")
                .header("Authorization", "Bearer pk_test_123")
                .json_body(serde_json::json!({
                    "amount": 250.0, "currency": "INR", "orderId": "ORD-42"
                }));
            then.status(200).json_body(serde_json::json!({
                "transactionRefId": "T42",
                "qrData": "upi://pay?tr=T42",
                "redirectUrl": "https://pay.example/T42"
            }));
        })
        .await;

        let record = gateway(&server).create_payment(&request(), None).await.unwrap();
        mock.assert_async().await;
        assert_eq!(record.transaction_ref, "T42");
        assert_eq!(record.qr_payload().unwrap(), "upi://pay?tr=T42");
    }

    #[tokio::test]
    async fn test_gateway_error_carries_status_and_text() {
        let server = MockServer::start_async().await;
        server.mock_async(|when, then| {
            when.method(POST).path("/sandbox/payment-create");
            then.status(500).body(r#"{"error":"down"}"#);
        })
        .await;

        let err = gateway(&server).create_payment(&request(), None).await.unwrap_err();
        match err {
            SdkError::Gateway { status, message } => {
                assert_eq!(status, 500);
                assert!(message.contains("down"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_poll_status_with_session_token() {
        let server = MockServer::start_async().await;
        let mock = server.mock_async(|when, then| {
            when.method(POST)
                .path("/sandbox/payment-polling")
                .header(SESSION_TOKEN_HEADER, "sess-1")
                .json_body(serde_json::json!({ "transactionRefId": "T42" }));
            then.status(200)
                .json_body(serde_json::json!({ "status": "COMPLETED", "transactionRefId": "T42" }));
        })
        .await;

        let token = SessionToken("sess-1".to_string());
        let report = gateway(&server).poll_status("T42", Some(&token)).await.unwrap();
        mock.assert_async().await;
        assert_eq!(report.status, PaymentStatus::Success);
        assert_eq!(report.transaction_ref.as_deref(), Some("T42"));
    }

    #[tokio::test]
    async fn test_create_token() {
        let server = MockServer::start_async().await;
        server.mock_async(|when, then| {
            when.method(POST).path("/sandbox/create-token");
            then.status(200).json_body(serde_json::json!({ "sessionToken": "sess-9" }));
        })
        .await;

        let token = gateway(&server).create_token(&request()).await.unwrap();
        assert_eq!(token, SessionToken("sess-9".to_string()));
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let server = MockServer::start_async().await;
        server.mock_async(|when, then| {
            when.method(POST).path("/sandbox/payment-polling");
            then.status(200).body("<html>maintenance</html>");
        })
        .await;

        let err = gateway(&server).poll_status("T42", None).await.unwrap_err();
        assert!(matches!(err, SdkError::Decode(_)));
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_network_error() {
        let options = SdkOptions {
            base_url: Some("http://127.0.0.1:9".to_string()),
            ..SdkOptions::new("pk")
        };
        let gateway = HttpGateway::new(SdkConfig::try_from(options).unwrap()).unwrap();
        let err = gateway.poll_status("T1", None).await.unwrap_err();
        assert!(matches!(err, SdkError::Network(_)));
    }
}
