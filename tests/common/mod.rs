#![allow(dead_code)]

use qrpay::application::poll_loop::CompletionCallback;
use qrpay::application::sdk::PaymentSdk;
use qrpay::config::SdkOptions;
use qrpay::domain::payment::{PaymentOutcome, PaymentRequest};
use qrpay::infrastructure::in_memory::{RecordingRenderer, ScriptedGateway};
use rust_decimal_macros::dec;
use std::sync::{Arc, Mutex};

pub const INTERVAL_MS: u64 = 3000;

pub struct Harness {
    pub gateway: Arc<ScriptedGateway>,
    pub renderer: Arc<RecordingRenderer>,
    pub sdk: PaymentSdk,
}

pub fn options() -> SdkOptions {
    SdkOptions {
        poll_interval_ms: Some(INTERVAL_MS),
        merchant_name: Some("Corner Shop".to_string()),
        ..SdkOptions::new("pk_test_123")
    }
}

pub fn harness_with(options: SdkOptions) -> Harness {
    let gateway = Arc::new(ScriptedGateway::new());
    let renderer = Arc::new(RecordingRenderer::new());
    let sdk = PaymentSdk::new(options, gateway.clone(), renderer.clone()).unwrap();
    Harness {
        gateway,
        renderer,
        sdk,
    }
}

pub fn harness() -> Harness {
    harness_with(options())
}

pub fn request(order_id: &str) -> PaymentRequest {
    PaymentRequest::new(dec!(499.00).try_into().unwrap(), "INR", order_id)
}

pub type Outcomes = Arc<Mutex<Vec<PaymentOutcome>>>;

/// A completion callback that records every outcome it receives.
pub fn recorder() -> (Outcomes, CompletionCallback) {
    let seen: Outcomes = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let callback: CompletionCallback = Box::new(move |outcome| {
        sink.lock().unwrap().push(outcome);
    });
    (seen, callback)
}

pub fn taken(outcomes: &Outcomes) -> Vec<PaymentOutcome> {
    outcomes.lock().unwrap().clone()
}
