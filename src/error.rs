use thiserror::Error;

#[derive(Error, Debug)]
pub enum SdkError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("gateway error ({status}): {message}")]
    Gateway { status: u16, message: String },
    #[error("gateway response is missing {0}")]
    MissingData(&'static str),
    #[error("could not decode gateway response: {0}")]
    Decode(String),
    #[error("invalid payment request: {0}")]
    InvalidRequest(String),
    #[error("render error: {0}")]
    Render(String),
}

impl SdkError {
    /// Builds a `Gateway` error from a non-success response body.
    ///
    /// JSON bodies carrying an `error` or `message` string contribute just that
    /// string; anything else is kept verbatim.
    pub fn from_gateway_body(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|value| {
                ["error", "message"].iter().find_map(|field| {
                    value
                        .get(*field)
                        .and_then(|v| v.as_str())
                        .map(str::to_owned)
                })
            })
            .unwrap_or_else(|| body.trim().to_string());
        SdkError::Gateway { status, message }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            SdkError::Gateway { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SdkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_body_error_field() {
        let err = SdkError::from_gateway_body(500, r#"{"error":"down"}"#);
        assert_eq!(err.status(), Some(500));
        assert!(err.to_string().contains("down"));
    }

    #[test]
    fn test_gateway_body_message_field() {
        let err = SdkError::from_gateway_body(422, r#"{"message":"bad amount"}"#);
        match err {
            SdkError::Gateway { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "bad amount");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_gateway_body_plain_text() {
        let err = SdkError::from_gateway_body(502, "Bad Gateway\n");
        assert!(matches!(err, SdkError::Gateway { ref message, .. } if message == "Bad Gateway"));
    }
}
