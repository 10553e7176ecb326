use super::modal::{ModalController, terminal_message};
use super::poll_loop::{CompletionCallback, PollLoop};
use crate::config::{SdkConfig, SdkOptions};
use crate::domain::payment::{
    PaymentOutcome, PaymentRecord, PaymentRequest, PaymentStatus, SessionToken,
};
use crate::domain::ports::{GatewayRef, PaymentGateway, RendererRef};
use crate::domain::view::MountTarget;
use crate::error::Result;
use crate::infrastructure::http_gateway::HttpGateway;
use std::sync::Arc;
use tracing::{info, warn};

pub const INITIATION_FAILED_MESSAGE: &str =
    "We could not start this payment. Please try again in a moment.";

/// The public entry point of the SDK.
///
/// One instance runs at most one payment attempt at a time: showing a new
/// modal closes the previous one and cancels its poll session.
pub struct PaymentSdk {
    config: SdkConfig,
    gateway: GatewayRef,
    poll: Arc<PollLoop>,
    modal: Arc<ModalController>,
}

impl PaymentSdk {
    /// Builds an SDK on top of the given gateway and renderer.
    ///
    /// Fails with `SdkError::Config` when the options do not validate, most
    /// notably when the publishable key is missing.
    pub fn new(options: SdkOptions, gateway: GatewayRef, renderer: RendererRef) -> Result<Self> {
        let config = SdkConfig::try_from(options)?;
        Ok(Self::with_config(config, gateway, renderer))
    }

    /// Builds an SDK that talks to the configured gateway over HTTP.
    pub fn connect(options: SdkOptions, renderer: RendererRef) -> Result<Self> {
        let config = SdkConfig::try_from(options)?;
        let gateway: GatewayRef = Arc::new(HttpGateway::new(config.clone())?);
        Ok(Self::with_config(config, gateway, renderer))
    }

    pub fn with_config(config: SdkConfig, gateway: GatewayRef, renderer: RendererRef) -> Self {
        let poll = Arc::new(PollLoop::new(
            gateway.clone(),
            config.poll_interval,
            config.max_poll_failures,
        ));
        let modal = ModalController::new(renderer, poll.clone(), config.merchant_name.clone());
        Self {
            config,
            gateway,
            poll,
            modal,
        }
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    pub fn modal(&self) -> &Arc<ModalController> {
        &self.modal
    }

    pub fn poll_loop(&self) -> &Arc<PollLoop> {
        &self.poll
    }

    /// Creates a payment without any UI or polling.
    pub async fn create_payment_request(&self, request: &PaymentRequest) -> Result<PaymentRecord> {
        let (record, _) = self.initiate(request).await?;
        Ok(record)
    }

    async fn initiate(
        &self,
        request: &PaymentRequest,
    ) -> Result<(PaymentRecord, Option<SessionToken>)> {
        let token = if self.config.use_session_token {
            Some(self.gateway.create_token(request).await?)
        } else {
            None
        };
        let record = self.gateway.create_payment(request, token.as_ref()).await?;
        info!(
            order_id = %request.order_id,
            transaction_ref = %record.transaction_ref,
            "payment created"
        );
        Ok((record, token))
    }

    /// Opens the payment modal, creates the payment and polls it to completion.
    ///
    /// `container_id` selects an in-page container; `None` mounts a full-page
    /// overlay. `on_complete` fires exactly once with the terminal outcome,
    /// including when initiation fails. It does not fire when the user
    /// cancels; watch [`ModalController::subscribe`] for that.
    pub async fn show_payment_modal(
        &self,
        container_id: Option<&str>,
        request: PaymentRequest,
        on_complete: CompletionCallback,
    ) -> Result<PaymentRecord> {
        let target = MountTarget::from_container_id(container_id);
        let attempt = match self.modal.open(target, &request.order_id) {
            Ok(attempt) => attempt,
            Err(err) => {
                on_complete(PaymentOutcome::failure(err.to_string(), None));
                return Err(err);
            }
        };

        let initiated = self.initiate(&request).await.and_then(|(record, token)| {
            let shown = self.modal.show_qr(attempt, &request, &record)?;
            Ok((record, token, shown))
        });
        let (record, token) = match initiated {
            Ok((record, _, false)) => {
                info!(order_id = %request.order_id, "modal closed before the payment was created");
                return Ok(record);
            }
            Ok((record, token, true)) => (record, token),
            Err(err) => {
                warn!(order_id = %request.order_id, error = %err, "payment initiation failed");
                if let Err(render_err) = self.modal.show_terminal_for(
                    attempt,
                    &request.order_id,
                    PaymentStatus::Failed,
                    INITIATION_FAILED_MESSAGE,
                ) {
                    warn!(error = %render_err, "could not show failure view");
                }
                on_complete(PaymentOutcome::failure(err.to_string(), None));
                return Err(err);
            }
        };

        let modal = Arc::downgrade(&self.modal);
        let order_id = request.order_id.clone();
        let generation = self.poll.start(
            record.transaction_ref.clone(),
            token,
            Box::new(move |outcome: PaymentOutcome| {
                if let Some(modal) = modal.upgrade() {
                    let status = outcome.status();
                    let message = outcome
                        .message
                        .clone()
                        .unwrap_or_else(|| terminal_message(status).to_string());
                    if let Err(err) = modal.show_terminal_for(attempt, &order_id, status, &message) {
                        warn!(error = %err, "could not show result view");
                    }
                }
                on_complete(outcome);
            }),
        );

        // The user may have closed the modal while the poll session was
        // being set up.
        if !self.modal.is_attempt_current(attempt) && self.poll.generation() == Some(generation) {
            self.poll.cancel();
        }
        Ok(record)
    }

    /// Closes the modal and stops polling without firing the callback.
    pub fn cancel(&self) {
        self.modal.teardown();
    }
}
