use crate::error::{Result, SdkError};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.qrpay.dev";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Sandbox,
    #[default]
    Production,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Sandbox => "sandbox",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gateway operations, one endpoint each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateToken,
    CreatePayment,
    PollStatus,
}

impl Operation {
    pub fn path(self) -> &'static str {
        match self {
            Operation::CreateToken => "create-token",
            Operation::CreatePayment => "payment-create",
            Operation::PollStatus => "payment-polling",
        }
    }
}

/// Construction options as a consumer supplies them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SdkOptions {
    pub publishable_key: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub environment: Environment,
    pub base_url: Option<String>,
    pub merchant_name: Option<String>,
    pub use_session_token: bool,
    pub max_poll_failures: Option<u32>,
}

impl SdkOptions {
    pub fn new(publishable_key: impl Into<String>) -> Self {
        Self {
            publishable_key: Some(publishable_key.into()),
            ..Self::default()
        }
    }
}

/// Validated SDK configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SdkConfig {
    pub publishable_key: String,
    pub poll_interval: Duration,
    pub environment: Environment,
    pub base_url: String,
    pub merchant_name: Option<String>,
    pub use_session_token: bool,
    /// Consecutive failed poll ticks tolerated before the session is
    /// rejected. `None` polls through failures indefinitely.
    pub max_poll_failures: Option<u32>,
}

impl SdkConfig {
    pub fn endpoint(&self, operation: Operation) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            self.environment.as_str(),
            operation.path()
        )
    }
}

impl TryFrom<SdkOptions> for SdkConfig {
    type Error = SdkError;

    fn try_from(options: SdkOptions) -> Result<Self> {
        let publishable_key = options
            .publishable_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| SdkError::Config("publishable key is required".to_string()))?;

        let poll_interval_ms = options.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS);
        if poll_interval_ms == 0 {
            return Err(SdkError::Config(
                "poll interval must be greater than zero".to_string(),
            ));
        }

        if options.max_poll_failures == Some(0) {
            return Err(SdkError::Config(
                "max poll failures must be greater than zero".to_string(),
            ));
        }

        let base_url = options
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        reqwest::Url::parse(&base_url)
            .map_err(|err| SdkError::Config(format!("invalid base url `{base_url}`: {err}")))?;

        Ok(Self {
            publishable_key,
            poll_interval: Duration::from_millis(poll_interval_ms),
            environment: options.environment,
            base_url: base_url.trim_end_matches('/').to_string(),
            merchant_name: options.merchant_name,
            use_session_token: options.use_session_token,
            max_poll_failures: options.max_poll_failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_config_error() {
        let err = SdkConfig::try_from(SdkOptions::default()).unwrap_err();
        assert!(matches!(err, SdkError::Config(_)));

        let err = SdkConfig::try_from(SdkOptions::new("   ")).unwrap_err();
        assert!(matches!(err, SdkError::Config(_)));
    }

    #[test]
    fn test_defaults() {
        let config = SdkConfig::try_from(SdkOptions::new("pk_live_1")).unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(3000));
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(
            config.endpoint(Operation::PollStatus),
            "https://api.qrpay.dev/production/payment-polling"
        );
        assert!(config.max_poll_failures.is_none());
    }

    #[test]
    fn test_sandbox_with_base_override() {
        let options = SdkOptions {
            environment: Environment::Sandbox,
            base_url: Some("http://127.0.0.1:8080/".to_string()),
            ..SdkOptions::new("pk_test_1")
        };
        let config = SdkConfig::try_from(options).unwrap();
        assert_eq!(
            config.endpoint(Operation::CreatePayment),
            "http://127.0.0.1:8080/sandbox/payment-create"
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        let options = SdkOptions {
            poll_interval_ms: Some(0),
            ..SdkOptions::new("pk")
        };
        assert!(SdkConfig::try_from(options).is_err());

        let options = SdkOptions {
            base_url: Some("not a url".to_string()),
            ..SdkOptions::new("pk")
        };
        assert!(SdkConfig::try_from(options).is_err());
    }

    #[test]
    fn test_options_from_json() {
        let options: SdkOptions = serde_json::from_str(
            r#"{"publishableKey":"pk","pollIntervalMs":500,"environment":"sandbox"}"#,
        )
        .unwrap();
        let config = SdkConfig::try_from(options).unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.environment, Environment::Sandbox);
    }
}
