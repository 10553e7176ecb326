use super::payment::{PaymentRecord, PaymentRequest, SessionToken, StatusReport};
use super::view::{MountTarget, View};
use crate::application::modal::ViewBindings;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// The three remote operations of the payment gateway.
///
/// Every call carries the publishable key; `token` is the optional session
/// credential obtained from `create_token`.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_token(&self, request: &PaymentRequest) -> Result<SessionToken>;
    async fn create_payment(
        &self,
        request: &PaymentRequest,
        token: Option<&SessionToken>,
    ) -> Result<PaymentRecord>;
    async fn poll_status(
        &self,
        transaction_ref: &str,
        token: Option<&SessionToken>,
    ) -> Result<StatusReport>;
}

pub type GatewayRef = Arc<dyn PaymentGateway>;

/// Draws modal views. Only the modal controller calls into a renderer.
///
/// `mount` receives the bindings for the new view; they stop working as soon
/// as that view is unmounted. Implementations must not invoke bindings from
/// inside `mount` or `unmount`.
pub trait ModalRenderer: Send + Sync {
    fn mount(&self, target: &MountTarget, view: &View, bindings: ViewBindings) -> Result<()>;
    fn unmount(&self, target: &MountTarget);
    fn suspend_scroll(&self) {}
    fn restore_scroll(&self) {}
    fn download_qr(&self, element_id: &str, file_name: &str) -> Result<()>;
}

pub type RendererRef = Arc<dyn ModalRenderer>;
