use crate::application::modal::ViewBindings;
use crate::domain::ports::ModalRenderer;
use crate::domain::view::{MountTarget, View};
use crate::error::{Result, SdkError};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

struct TerminalState<W> {
    out: W,
    bindings: Option<ViewBindings>,
    payloads: HashMap<String, String>,
}

/// Draws modal views as plain text blocks.
///
/// Each view lists the keys the command reader understands. "Downloading"
/// the QR code writes its payload to `<dir>/<file_name>.txt`.
pub struct TerminalRenderer<W: Write + Send> {
    state: Mutex<TerminalState<W>>,
    download_dir: PathBuf,
}

impl<W: Write + Send> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self::with_download_dir(out, PathBuf::from("."))
    }

    pub fn with_download_dir(out: W, download_dir: PathBuf) -> Self {
        Self {
            state: Mutex::new(TerminalState {
                out,
                bindings: None,
                payloads: HashMap::new(),
            }),
            download_dir,
        }
    }

    fn lock(&self) -> MutexGuard<'_, TerminalState<W>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bindings of the view currently on screen.
    pub fn bindings(&self) -> Option<ViewBindings> {
        self.lock().bindings.clone()
    }
}

fn render_view(view: &View) -> String {
    match view {
        View::Progress { merchant_name } => match merchant_name {
            Some(name) => format!("Preparing your payment to {name}..."),
            None => "Preparing your payment...".to_string(),
        },
        View::Qr {
            order_id,
            amount,
            currency,
            merchant_name,
            payload,
            redirect_url,
            ..
        } => {
            let mut text = String::new();
            if let Some(name) = merchant_name {
                text.push_str(&format!("Pay {name}\n"));
            }
            text.push_str(&format!("Order {order_id}: {amount} {currency}\n"));
            text.push_str(&format!("Scan to pay: {payload}\n"));
            if let Some(url) = redirect_url {
                text.push_str(&format!("Or open: {url}\n"));
            }
            text.push_str("Waiting for payment... [d] download QR  [c] close");
            text
        }
        View::CancelConfirm { order_id } => format!(
            "Cancel payment for order {order_id}?\n[y] yes, cancel  [n] no, keep paying"
        ),
        View::Terminal {
            order_id,
            status,
            message,
        } => format!("Order {order_id}: {status}\n{message}\n[c] close"),
    }
}

impl<W: Write + Send> ModalRenderer for TerminalRenderer<W> {
    fn mount(&self, target: &MountTarget, view: &View, bindings: ViewBindings) -> Result<()> {
        let mut state = self.lock();
        if let View::Qr {
            element_id,
            payload,
            ..
        } = view
        {
            state.payloads.insert(element_id.clone(), payload.clone());
        }
        let heading = match target {
            MountTarget::Overlay => "qrpay".to_string(),
            MountTarget::Container(id) => format!("qrpay #{id}"),
        };
        writeln!(state.out, "---- {heading} ----\n{}", render_view(view))
            .and_then(|_| state.out.flush())
            .map_err(|err| SdkError::Render(err.to_string()))?;
        state.bindings = Some(bindings);
        Ok(())
    }

    fn unmount(&self, _target: &MountTarget) {
        let mut state = self.lock();
        state.bindings = None;
        state.payloads.clear();
    }

    fn download_qr(&self, element_id: &str, file_name: &str) -> Result<()> {
        let mut state = self.lock();
        let payload = state
            .payloads
            .get(element_id)
            .cloned()
            .ok_or_else(|| SdkError::Render(format!("no QR surface `{element_id}`")))?;
        let path = self.download_dir.join(format!("{file_name}.txt"));
        std::fs::write(&path, payload).map_err(|err| SdkError::Render(err.to_string()))?;
        writeln!(state.out, "Saved QR payload to {}", path.display())
            .map_err(|err| SdkError::Render(err.to_string()))
    }
}
