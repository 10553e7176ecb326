use httpmock::prelude::*;
use qrpay::application::modal::ModalState;
use qrpay::application::sdk::PaymentSdk;
use qrpay::config::{Environment, SdkOptions};
use qrpay::domain::payment::{PaymentOutcome, PaymentRequest};
use qrpay::error::SdkError;
use qrpay::infrastructure::in_memory::RecordingRenderer;
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

fn sdk(server: &MockServer) -> (Arc<RecordingRenderer>, PaymentSdk) {
    let renderer = Arc::new(RecordingRenderer::new());
    let options = SdkOptions {
        environment: Environment::Sandbox,
        base_url: Some(server.base_url()),
        poll_interval_ms: Some(50),
        ..SdkOptions::new("pk_test_123")
    };
    let sdk = PaymentSdk::connect(options, renderer.clone()).unwrap();
    (renderer, sdk)
}

fn request() -> PaymentRequest {
    PaymentRequest::new(dec!(99.90).try_into().unwrap(), "INR", "ORD-77")
}

#[tokio::test]
async fn test_payment_completes_over_http() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/sandbox/payment-create")
                .header("Authorization", "Bearer pk_test_123");
            then.status(201).json_body(json!({
                "transactionRefId": "T77",
                "orderId": "ORD-77",
                "qrData": "upi://pay?tr=T77"
            }));
        })
        .await;
    let poll = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/sandbox/payment-polling")
                .json_body(json!({"transactionRefId": "T77"}));
            then.status(200)
                .json_body(json!({"status": "SUCCESS", "transactionRefId": "T77", "amount": 99.9}));
        })
        .await;

    let (renderer, sdk) = sdk(&server);
    let (tx, rx) = oneshot::channel::<PaymentOutcome>();
    sdk.show_payment_modal(
        None,
        request(),
        Box::new(move |outcome| {
            let _ = tx.send(outcome);
        }),
    )
    .await
    .unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .unwrap()
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.transaction_ref.as_deref(), Some("T77"));
    assert_eq!(
        serde_json::to_value(outcome.transaction.unwrap()).unwrap()["amount"],
        json!(99.9)
    );
    assert!(poll.hits_async().await >= 1);
    assert_eq!(sdk.modal().state(), ModalState::ShowingTerminal);
    assert!(renderer.scroll_suspended());

    sdk.modal().request_close(false).unwrap();
    assert_eq!(sdk.modal().state(), ModalState::Closed);
}

#[tokio::test]
async fn test_gateway_500_aborts_before_polling() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/sandbox/payment-create");
            then.status(500).body(r#"{"error":"down"}"#);
        })
        .await;
    let poll = server
        .mock_async(|when, then| {
            when.method(POST).path("/sandbox/payment-polling");
            then.status(200).json_body(json!({"status": "PENDING"}));
        })
        .await;

    let (_renderer, sdk) = sdk(&server);
    let err = sdk.create_payment_request(&request()).await.unwrap_err();

    assert!(matches!(err, SdkError::Gateway { status: 500, ref message } if message.contains("down")));
    tokio::time::sleep(Duration::from_millis(200)).await;
    poll.assert_hits_async(0).await;
    assert!(!sdk.poll_loop().is_active());
}
