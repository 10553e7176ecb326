use super::payment::PaymentStatus;

/// Where the modal is mounted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountTarget {
    /// A caller-supplied container element, addressed by id.
    Container(String),
    /// A full-page overlay. Page scroll is suspended while it is mounted.
    Overlay,
}

impl MountTarget {
    pub fn from_container_id(container_id: Option<&str>) -> Self {
        match container_id {
            Some(id) if !id.trim().is_empty() => MountTarget::Container(id.to_string()),
            _ => MountTarget::Overlay,
        }
    }

    pub fn is_overlay(&self) -> bool {
        matches!(self, MountTarget::Overlay)
    }
}

/// The content of the single overlay the modal controller owns.
#[derive(Debug, Clone, PartialEq)]
pub enum View {
    Progress {
        merchant_name: Option<String>,
    },
    Qr {
        order_id: String,
        amount: String,
        currency: String,
        merchant_name: Option<String>,
        /// String the QR renderer encodes.
        payload: String,
        /// Stable id of the surface the QR image is drawn on.
        element_id: String,
        redirect_url: Option<String>,
    },
    CancelConfirm {
        order_id: String,
    },
    Terminal {
        order_id: String,
        status: PaymentStatus,
        message: String,
    },
}

impl View {
    pub fn kind(&self) -> ViewKind {
        match self {
            View::Progress { .. } => ViewKind::Progress,
            View::Qr { .. } => ViewKind::Qr,
            View::CancelConfirm { .. } => ViewKind::CancelConfirm,
            View::Terminal { .. } => ViewKind::Terminal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Progress,
    Qr,
    CancelConfirm,
    Terminal,
}
