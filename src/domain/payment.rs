use crate::error::{Result, SdkError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// A strictly positive payment amount.
///
/// Serialized as a JSON number, which is what the gateway expects in request
/// bodies.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal")]
pub struct Amount(#[serde(with = "rust_decimal::serde::float")] Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(SdkError::InvalidRequest("amount must be positive".to_string()))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = SdkError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Body of a `payment-create` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub amount: Amount,
    pub currency: String,
    pub order_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

impl PaymentRequest {
    pub fn new(amount: Amount, currency: impl Into<String>, order_id: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
            order_id: order_id.into(),
            callback_url: None,
            nonce: None,
        }
    }

    pub fn with_callback_url(mut self, url: impl Into<String>) -> Self {
        self.callback_url = Some(url.into());
        self
    }

    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }
}

/// Secondary bearer credential returned by `create-token`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken(pub String);

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

const TRANSACTION_REF_FIELDS: [&str; 3] = ["transactionRefId", "_id", "orderId"];
const QR_PAYLOAD_FIELDS: [&str; 4] = ["qrData", "qrCode", "qrString", "qr"];
const REDIRECT_URL_FIELDS: [&str; 2] = ["redirectUrl", "url"];

fn first_str(fields: &Map<String, Value>, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        fields
            .get(*name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
    })
}

fn into_object(value: Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(fields) => Ok(fields),
        other => Err(SdkError::Decode(format!("expected a JSON object, got {other}"))),
    }
}

/// A payment created by the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRecord {
    pub transaction_ref: String,
    pub order_id: Option<String>,
    pub qr_payload: Option<String>,
    pub redirect_url: Option<String>,
    pub raw: Map<String, Value>,
}

impl PaymentRecord {
    /// Reads a `payment-create` response body.
    ///
    /// The transaction reference is mandatory. The QR payload is only checked
    /// when a caller asks for it, since plain API users may only want the
    /// redirect URL.
    pub fn from_response(value: Value) -> Result<Self> {
        let raw = into_object(value)?;
        let transaction_ref = first_str(&raw, &TRANSACTION_REF_FIELDS)
            .ok_or(SdkError::MissingData("transaction reference"))?;
        Ok(Self {
            transaction_ref,
            order_id: first_str(&raw, &["orderId"]),
            qr_payload: first_str(&raw, &QR_PAYLOAD_FIELDS),
            redirect_url: first_str(&raw, &REDIRECT_URL_FIELDS),
            raw,
        })
    }

    pub fn qr_payload(&self) -> Result<&str> {
        self.qr_payload
            .as_deref()
            .ok_or(SdkError::MissingData("QR payload"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
    Expired,
}

impl PaymentStatus {
    /// `Pending` is the only state polling continues past.
    pub fn is_terminal(self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    pub fn is_success(self) -> bool {
        matches!(self, PaymentStatus::Success)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Expired => "EXPIRED",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(PaymentStatus::Pending),
            "SUCCESS" | "COMPLETED" => Ok(PaymentStatus::Success),
            "FAILED" => Ok(PaymentStatus::Failed),
            "EXPIRED" => Ok(PaymentStatus::Expired),
            other => Err(SdkError::Decode(format!("unknown payment status `{other}`"))),
        }
    }
}

impl TryFrom<String> for PaymentStatus {
    type Error = SdkError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl Serialize for PaymentStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation from `payment-polling`.
///
/// `raw` keeps every field the gateway sent, so it serializes back to the
/// transaction object handed to completion callbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub status: PaymentStatus,
    pub transaction_ref: Option<String>,
    pub raw: Map<String, Value>,
}

impl StatusReport {
    pub fn from_response(value: Value) -> Result<Self> {
        let raw = into_object(value)?;
        let status = raw
            .get("status")
            .and_then(Value::as_str)
            .ok_or(SdkError::MissingData("payment status"))?
            .parse()?;
        Ok(Self {
            status,
            transaction_ref: first_str(&raw, &TRANSACTION_REF_FIELDS),
            raw,
        })
    }

    pub fn pending() -> Self {
        let mut raw = Map::new();
        raw.insert("status".into(), Value::from(PaymentStatus::Pending.as_str()));
        Self {
            status: PaymentStatus::Pending,
            transaction_ref: None,
            raw,
        }
    }
}

impl Serialize for StatusReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

/// What a completion callback receives. Delivered exactly once per attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<StatusReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub transaction_ref: Option<String>,
}

impl PaymentOutcome {
    pub fn from_report(report: StatusReport, transaction_ref: &str) -> Self {
        let transaction_ref = report
            .transaction_ref
            .clone()
            .unwrap_or_else(|| transaction_ref.to_string());
        Self {
            success: report.status.is_success(),
            transaction: Some(report),
            message: None,
            transaction_ref: Some(transaction_ref),
        }
    }

    pub fn failure(message: impl Into<String>, transaction_ref: Option<String>) -> Self {
        Self {
            success: false,
            transaction: None,
            message: Some(message.into()),
            transaction_ref,
        }
    }

    pub fn status(&self) -> PaymentStatus {
        match &self.transaction {
            Some(report) => report.status,
            None if self.success => PaymentStatus::Success,
            None => PaymentStatus::Failed,
        }
    }
}
