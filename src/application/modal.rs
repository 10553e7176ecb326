use super::poll_loop::PollLoop;
use crate::domain::payment::{PaymentRecord, PaymentRequest, PaymentStatus};
use crate::domain::ports::{ModalRenderer, RendererRef};
use crate::domain::view::{MountTarget, View};
use crate::error::Result;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalState {
    Closed,
    ShowingProgress,
    ShowingQr,
    ShowingCancelConfirm,
    ShowingTerminal,
}

/// User actions a mounted view can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiAction {
    Close,
    ConfirmCancel,
    Resume,
    Rerender,
    Download,
}

/// Listener handle given to the renderer with each mounted view.
///
/// Bindings are tied to the mount that produced them: once that view is
/// replaced or torn down, every call on them is ignored.
#[derive(Clone)]
pub struct ViewBindings {
    controller: Weak<ModalController>,
    mount_id: u64,
}

impl ViewBindings {
    pub fn mount_id(&self) -> u64 {
        self.mount_id
    }

    pub fn is_live(&self) -> bool {
        self.controller
            .upgrade()
            .is_some_and(|controller| controller.lock().mount_id == Some(self.mount_id))
    }

    pub fn dispatch(&self, action: UiAction) -> Result<()> {
        match self.controller.upgrade() {
            Some(controller) => controller.dispatch(self.mount_id, action),
            None => Ok(()),
        }
    }

    pub fn close(&self) -> Result<()> {
        self.dispatch(UiAction::Close)
    }

    pub fn confirm_cancel(&self) -> Result<()> {
        self.dispatch(UiAction::ConfirmCancel)
    }

    pub fn resume(&self) -> Result<()> {
        self.dispatch(UiAction::Resume)
    }

    pub fn rerender(&self) -> Result<()> {
        self.dispatch(UiAction::Rerender)
    }

    pub fn download(&self) -> Result<()> {
        self.dispatch(UiAction::Download)
    }
}

impl std::fmt::Debug for ViewBindings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewBindings")
            .field("mount_id", &self.mount_id)
            .finish()
    }
}

/// Create response and display data kept for re-rendering the QR view.
#[derive(Debug, Clone)]
struct PendingQr {
    order_id: String,
    amount: String,
    currency: String,
    payload: String,
    element_id: String,
    redirect_url: Option<String>,
}

impl PendingQr {
    fn view(&self, merchant_name: Option<String>) -> View {
        View::Qr {
            order_id: self.order_id.clone(),
            amount: self.amount.clone(),
            currency: self.currency.clone(),
            merchant_name,
            payload: self.payload.clone(),
            element_id: self.element_id.clone(),
            redirect_url: self.redirect_url.clone(),
        }
    }
}

struct Inner {
    state: ModalState,
    target: Option<MountTarget>,
    mount_id: Option<u64>,
    next_mount_id: u64,
    attempt: u64,
    order_id: Option<String>,
    pending: Option<PendingQr>,
    scroll_suspended: bool,
}

pub fn qr_element_id(transaction_ref: &str) -> String {
    format!("qrpay-qr-{transaction_ref}")
}

pub fn terminal_message(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::Success => "Payment received. Thank you!",
        PaymentStatus::Failed => "Payment failed. Please try again.",
        PaymentStatus::Expired => "This QR code has expired. Please start a new payment.",
        PaymentStatus::Pending => "Waiting for payment.",
    }
}

/// Sole owner of the payment overlay.
///
/// At most one view is mounted at a time; mounting a new one unmounts the
/// previous view first and invalidates its bindings. Closing a non-terminal
/// view only asks for confirmation; the poll timer keeps running until the
/// user confirms.
pub struct ModalController {
    me: Weak<ModalController>,
    renderer: RendererRef,
    poll: Arc<PollLoop>,
    merchant_name: Option<String>,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<ModalState>,
}

impl ModalController {
    pub fn new(
        renderer: RendererRef,
        poll: Arc<PollLoop>,
        merchant_name: Option<String>,
    ) -> Arc<Self> {
        let (state_tx, _) = watch::channel(ModalState::Closed);
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            renderer,
            poll,
            merchant_name,
            inner: Mutex::new(Inner {
                state: ModalState::Closed,
                target: None,
                mount_id: None,
                next_mount_id: 1,
                attempt: 0,
                order_id: None,
                pending: None,
                scroll_suspended: false,
            }),
            state_tx,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> ModalState {
        self.lock().state
    }

    pub fn subscribe(&self) -> watch::Receiver<ModalState> {
        self.state_tx.subscribe()
    }

    /// Whether `attempt` is still the attempt the modal is showing.
    pub fn is_attempt_current(&self, attempt: u64) -> bool {
        let inner = self.lock();
        inner.attempt == attempt && inner.state != ModalState::Closed
    }

    /// Opens the modal on the progress view, replacing whatever was open.
    ///
    /// Returns the attempt id later calls use to check they are not acting on
    /// a modal the user already closed.
    pub fn open(&self, target: MountTarget, order_id: &str) -> Result<u64> {
        let mut inner = self.lock();
        if inner.state != ModalState::Closed {
            self.teardown_locked(&mut inner);
        }
        inner.attempt += 1;
        inner.target = Some(target);
        inner.order_id = Some(order_id.to_string());
        let view = View::Progress {
            merchant_name: self.merchant_name.clone(),
        };
        self.mount_locked(&mut inner, view, ModalState::ShowingProgress)?;
        Ok(inner.attempt)
    }

    /// Shows the QR view for a freshly created payment and remembers it for
    /// `rerender_pending`. Returns `false` if `attempt` was closed meanwhile.
    pub fn show_qr(
        &self,
        attempt: u64,
        request: &PaymentRequest,
        record: &PaymentRecord,
    ) -> Result<bool> {
        let payload = record.qr_payload()?.to_string();
        let mut inner = self.lock();
        if inner.attempt != attempt || inner.state == ModalState::Closed {
            return Ok(false);
        }
        let pending = PendingQr {
            order_id: request.order_id.clone(),
            amount: request.amount.to_string(),
            currency: request.currency.clone(),
            payload,
            element_id: qr_element_id(&record.transaction_ref),
            redirect_url: record.redirect_url.clone(),
        };
        let view = pending.view(self.merchant_name.clone());
        inner.pending = Some(pending);
        if inner.state == ModalState::ShowingCancelConfirm {
            debug!(order_id = %request.order_id, "QR ready behind the cancel confirmation");
            return Ok(true);
        }
        self.mount_locked(&mut inner, view, ModalState::ShowingQr)?;
        Ok(true)
    }

    /// Shows the final result. The next close action tears the modal down
    /// without asking for confirmation.
    pub fn show_terminal(&self, order_ref: &str, status: PaymentStatus, message: &str) -> Result<()> {
        let mut inner = self.lock();
        self.show_terminal_locked(&mut inner, order_ref, status, message)
    }

    /// `show_terminal` for a specific attempt; a no-op returning `false` if
    /// the user closed that attempt already.
    pub fn show_terminal_for(
        &self,
        attempt: u64,
        order_ref: &str,
        status: PaymentStatus,
        message: &str,
    ) -> Result<bool> {
        let mut inner = self.lock();
        if inner.attempt != attempt || inner.state == ModalState::Closed {
            return Ok(false);
        }
        self.show_terminal_locked(&mut inner, order_ref, status, message)?;
        Ok(true)
    }

    fn show_terminal_locked(
        &self,
        inner: &mut Inner,
        order_ref: &str,
        status: PaymentStatus,
        message: &str,
    ) -> Result<()> {
        let view = View::Terminal {
            order_id: order_ref.to_string(),
            status,
            message: message.to_string(),
        };
        self.mount_locked(inner, view, ModalState::ShowingTerminal)
    }

    pub fn request_close(&self, force: bool) -> Result<()> {
        let mut inner = self.lock();
        self.request_close_locked(&mut inner, force)
    }

    fn request_close_locked(&self, inner: &mut Inner, force: bool) -> Result<()> {
        match inner.state {
            ModalState::Closed => Ok(()),
            ModalState::ShowingTerminal => {
                self.teardown_locked(inner);
                Ok(())
            }
            _ if force => {
                self.teardown_locked(inner);
                Ok(())
            }
            ModalState::ShowingCancelConfirm => Ok(()),
            ModalState::ShowingProgress | ModalState::ShowingQr => {
                let view = View::CancelConfirm {
                    order_id: inner.order_id.clone().unwrap_or_default(),
                };
                self.mount_locked(inner, view, ModalState::ShowingCancelConfirm)
            }
        }
    }

    /// Leaves the cancel confirmation for the view it interrupted: the QR view
    /// once the payment exists, the progress view before that. Polling is
    /// untouched.
    pub fn resume(&self) -> Result<()> {
        let mut inner = self.lock();
        self.resume_locked(&mut inner)
    }

    fn resume_locked(&self, inner: &mut Inner) -> Result<()> {
        if inner.state != ModalState::ShowingCancelConfirm {
            return Ok(());
        }
        let (view, state) = match inner.pending.as_ref() {
            Some(pending) => (pending.view(self.merchant_name.clone()), ModalState::ShowingQr),
            None => (
                View::Progress {
                    merchant_name: self.merchant_name.clone(),
                },
                ModalState::ShowingProgress,
            ),
        };
        debug!(?state, "resuming payment");
        self.mount_locked(inner, view, state)
    }

    /// Re-mounts the QR view from the cached create response, or force-closes
    /// when nothing is cached.
    pub fn rerender_pending(&self) -> Result<()> {
        let mut inner = self.lock();
        self.rerender_pending_locked(&mut inner)
    }

    fn rerender_pending_locked(&self, inner: &mut Inner) -> Result<()> {
        match inner.pending.clone() {
            Some(pending) if inner.state != ModalState::Closed => {
                debug!(order_id = %pending.order_id, "re-rendering QR view");
                let view = pending.view(self.merchant_name.clone());
                self.mount_locked(inner, view, ModalState::ShowingQr)
            }
            _ => {
                self.teardown_locked(inner);
                Ok(())
            }
        }
    }

    pub fn download(&self) -> Result<()> {
        let inner = self.lock();
        self.download_locked(&inner)
    }

    fn download_locked(&self, inner: &Inner) -> Result<()> {
        match (&inner.state, &inner.pending) {
            (ModalState::ShowingQr, Some(pending)) => {
                let file_name = format!("{}-qr", pending.order_id);
                self.renderer.download_qr(&pending.element_id, &file_name)
            }
            _ => {
                debug!("download ignored outside the QR view");
                Ok(())
            }
        }
    }

    /// Stops polling, unmounts the overlay and restores page scroll.
    /// Safe to call repeatedly.
    pub fn teardown(&self) {
        let mut inner = self.lock();
        self.teardown_locked(&mut inner);
    }

    fn teardown_locked(&self, inner: &mut Inner) {
        self.poll.cancel();
        if inner.mount_id.take().is_some()
            && let Some(target) = inner.target.as_ref()
        {
            self.renderer.unmount(target);
        }
        if inner.scroll_suspended {
            self.renderer.restore_scroll();
            inner.scroll_suspended = false;
        }
        inner.pending = None;
        inner.order_id = None;
        inner.target = None;
        if inner.state != ModalState::Closed {
            info!("payment modal closed");
            inner.state = ModalState::Closed;
            self.state_tx.send_replace(ModalState::Closed);
        }
    }

    fn dispatch(&self, mount_id: u64, action: UiAction) -> Result<()> {
        let mut inner = self.lock();
        if inner.mount_id != Some(mount_id) {
            debug!(mount_id, ?action, "ignoring action from an unmounted view");
            return Ok(());
        }
        match action {
            UiAction::Close => self.request_close_locked(&mut inner, false),
            UiAction::ConfirmCancel => self.request_close_locked(&mut inner, true),
            UiAction::Resume => self.resume_locked(&mut inner),
            UiAction::Rerender => self.rerender_pending_locked(&mut inner),
            UiAction::Download => self.download_locked(&inner),
        }
    }

    fn mount_locked(&self, inner: &mut Inner, view: View, state: ModalState) -> Result<()> {
        let target = inner.target.get_or_insert(MountTarget::Overlay).clone();
        if inner.mount_id.take().is_some() {
            self.renderer.unmount(&target);
        }
        if target.is_overlay() && !inner.scroll_suspended {
            self.renderer.suspend_scroll();
            inner.scroll_suspended = true;
        }

        let mount_id = inner.next_mount_id;
        inner.next_mount_id += 1;
        let bindings = ViewBindings {
            controller: self.me.clone(),
            mount_id,
        };
        if let Err(err) = self.renderer.mount(&target, &view, bindings) {
            warn!(error = %err, ?state, "view failed to mount, closing modal");
            self.teardown_locked(inner);
            return Err(err);
        }

        debug!(mount_id, ?state, "view mounted");
        inner.mount_id = Some(mount_id);
        inner.state = state;
        self.state_tx.send_replace(state);
        Ok(())
    }
}
