use crate::application::modal::ViewBindings;
use crate::domain::payment::{PaymentRecord, PaymentRequest, SessionToken, StatusReport};
use crate::domain::ports::{ModalRenderer, PaymentGateway};
use crate::domain::view::{MountTarget, View, ViewKind};
use crate::error::{Result, SdkError};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One scripted reply to a gateway call.
#[derive(Debug)]
pub enum Reply {
    Json(Value),
    Fail(SdkError),
    /// Answers with the value once the delay has passed.
    Delayed(Duration, Value),
    /// Never resolves, like a request the network swallowed.
    Hang,
}

/// A gateway that answers from queued replies instead of the network.
///
/// Create calls without a queued reply succeed with a record derived from the
/// order id; status checks without one report `PENDING`.
#[derive(Default)]
pub struct ScriptedGateway {
    token_replies: Mutex<VecDeque<Reply>>,
    create_replies: Mutex<VecDeque<Reply>>,
    poll_replies: Mutex<VecDeque<Reply>>,
    create_requests: Mutex<Vec<(PaymentRequest, Option<SessionToken>)>>,
    poll_requests: Mutex<Vec<(String, Option<SessionToken>)>>,
    token_calls: Mutex<usize>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_token(&self, reply: Reply) {
        lock(&self.token_replies).push_back(reply);
    }

    pub fn push_create(&self, reply: Reply) {
        lock(&self.create_replies).push_back(reply);
    }

    pub fn push_poll(&self, reply: Reply) {
        lock(&self.poll_replies).push_back(reply);
    }

    pub fn push_status(&self, body: Value) {
        self.push_poll(Reply::Json(body));
    }

    pub fn push_network_failure(&self, message: &str) {
        self.push_poll(Reply::Fail(SdkError::Network(message.to_string())));
    }

    pub fn poll_calls(&self) -> usize {
        lock(&self.poll_requests).len()
    }

    pub fn poll_requests(&self) -> Vec<(String, Option<SessionToken>)> {
        lock(&self.poll_requests).clone()
    }

    pub fn create_requests(&self) -> Vec<(PaymentRequest, Option<SessionToken>)> {
        lock(&self.create_requests).clone()
    }

    pub fn token_calls(&self) -> usize {
        *lock(&self.token_calls)
    }

    async fn answer(reply: Option<Reply>, default: impl FnOnce() -> Value) -> Result<Value> {
        match reply {
            None => Ok(default()),
            Some(Reply::Json(value)) => Ok(value),
            Some(Reply::Fail(err)) => Err(err),
            Some(Reply::Delayed(delay, value)) => {
                tokio::time::sleep(delay).await;
                Ok(value)
            }
            Some(Reply::Hang) => std::future::pending().await,
        }
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_token(&self, request: &PaymentRequest) -> Result<SessionToken> {
        let reply = {
            *lock(&self.token_calls) += 1;
            lock(&self.token_replies).pop_front()
        };
        let order_id = request.order_id.clone();
        let value = Self::answer(reply, || json!({ "token": format!("tok-{order_id}") })).await?;
        value
            .get("token")
            .and_then(Value::as_str)
            .map(|token| SessionToken(token.to_string()))
            .ok_or(SdkError::MissingData("session token"))
    }

    async fn create_payment(
        &self,
        request: &PaymentRequest,
        token: Option<&SessionToken>,
    ) -> Result<PaymentRecord> {
        let reply = {
            lock(&self.create_requests).push((request.clone(), token.cloned()));
            lock(&self.create_replies).pop_front()
        };
        let order_id = request.order_id.clone();
        let value = Self::answer(reply, || {
            json!({
                "transactionRefId": format!("T-{order_id}"),
                "orderId": order_id,
                "qrData": format!("upi://pay?tr=T-{order_id}"),
                "redirectUrl": format!("https://pay.example/r/T-{order_id}"),
            })
        })
        .await?;
        PaymentRecord::from_response(value)
    }

    async fn poll_status(
        &self,
        transaction_ref: &str,
        token: Option<&SessionToken>,
    ) -> Result<StatusReport> {
        let reply = {
            lock(&self.poll_requests).push((transaction_ref.to_string(), token.cloned()));
            lock(&self.poll_replies).pop_front()
        };
        let value = Self::answer(reply, || json!({ "status": "PENDING" })).await?;
        StatusReport::from_response(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    Mounted(MountTarget, View),
    Unmounted(MountTarget),
    ScrollSuspended,
    ScrollRestored,
    Downloaded { element_id: String, file_name: String },
}

#[derive(Default)]
struct RendererState {
    events: Vec<RenderEvent>,
    current: Option<View>,
    bindings: Option<ViewBindings>,
    scroll_suspended: bool,
    failing: Option<ViewKind>,
}

/// A renderer that records what it was asked to draw.
///
/// The bindings of the latest mounted view stand in for the buttons a user
/// would press.
#[derive(Default)]
pub struct RecordingRenderer {
    state: Mutex<RendererState>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later mount of `kind` fail with a render error.
    pub fn fail_mounts_of(&self, kind: ViewKind) {
        lock(&self.state).failing = Some(kind);
    }

    pub fn events(&self) -> Vec<RenderEvent> {
        lock(&self.state).events.clone()
    }

    pub fn current_view(&self) -> Option<View> {
        lock(&self.state).current.clone()
    }

    pub fn bindings(&self) -> Option<ViewBindings> {
        lock(&self.state).bindings.clone()
    }

    pub fn scroll_suspended(&self) -> bool {
        lock(&self.state).scroll_suspended
    }

    pub fn mounted_views(&self) -> Vec<View> {
        lock(&self.state)
            .events
            .iter()
            .filter_map(|event| match event {
                RenderEvent::Mounted(_, view) => Some(view.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn downloads(&self) -> Vec<(String, String)> {
        lock(&self.state)
            .events
            .iter()
            .filter_map(|event| match event {
                RenderEvent::Downloaded { element_id, file_name } => {
                    Some((element_id.clone(), file_name.clone()))
                }
                _ => None,
            })
            .collect()
    }
}

impl ModalRenderer for RecordingRenderer {
    fn mount(&self, target: &MountTarget, view: &View, bindings: ViewBindings) -> Result<()> {
        let mut state = lock(&self.state);
        if state.current.is_some() {
            return Err(SdkError::Render(
                "mount requested while another view is mounted".to_string(),
            ));
        }
        if state.failing == Some(view.kind()) {
            return Err(SdkError::Render(format!("cannot draw {:?} view", view.kind())));
        }
        state.events.push(RenderEvent::Mounted(target.clone(), view.clone()));
        state.current = Some(view.clone());
        state.bindings = Some(bindings);
        Ok(())
    }

    fn unmount(&self, target: &MountTarget) {
        let mut state = lock(&self.state);
        state.events.push(RenderEvent::Unmounted(target.clone()));
        state.current = None;
        state.bindings = None;
    }

    fn suspend_scroll(&self) {
        let mut state = lock(&self.state);
        state.events.push(RenderEvent::ScrollSuspended);
        state.scroll_suspended = true;
    }

    fn restore_scroll(&self) {
        let mut state = lock(&self.state);
        state.events.push(RenderEvent::ScrollRestored);
        state.scroll_suspended = false;
    }

    fn download_qr(&self, element_id: &str, file_name: &str) -> Result<()> {
        lock(&self.state).events.push(RenderEvent::Downloaded {
            element_id: element_id.to_string(),
            file_name: file_name.to_string(),
        });
        Ok(())
    }
}
