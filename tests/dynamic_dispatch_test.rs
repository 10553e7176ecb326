use qrpay::config::{SdkConfig, SdkOptions};
use qrpay::domain::payment::{PaymentRequest, PaymentStatus};
use qrpay::domain::ports::{GatewayRef, ModalRenderer, PaymentGateway, RendererRef};
use qrpay::infrastructure::http_gateway::HttpGateway;
use qrpay::infrastructure::in_memory::{RecordingRenderer, ScriptedGateway};
use rust_decimal_macros::dec;
use std::sync::Arc;

#[tokio::test]
async fn test_gateways_as_trait_objects() {
    let scripted: GatewayRef = Arc::new(ScriptedGateway::new());
    let config = SdkConfig::try_from(SdkOptions::new("pk_test_1")).unwrap();
    let http: GatewayRef = Arc::new(HttpGateway::new(config).unwrap());
    let gateways = [scripted.clone(), http];
    assert_eq!(gateways.len(), 2);

    // Verify Send + Sync by spawning tasks
    let handle = tokio::spawn(async move {
        let request = PaymentRequest::new(dec!(1.0).try_into().unwrap(), "INR", "ORD-1");
        let record = scripted.create_payment(&request, None).await.unwrap();
        scripted.poll_status(&record.transaction_ref, None).await.unwrap()
    });

    let report = handle.await.unwrap();
    assert_eq!(report.status, PaymentStatus::Pending);
}

#[test]
fn test_renderer_as_trait_object() {
    let renderer: RendererRef = Arc::new(RecordingRenderer::new());
    let moved = std::thread::spawn(move || {
        renderer.suspend_scroll();
        renderer.restore_scroll();
        renderer
    })
    .join()
    .unwrap();
    assert!(moved.download_qr("qrpay-qr-T1", "ORD-1-qr").is_ok());
}
