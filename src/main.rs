use clap::Parser;
use miette::{IntoDiagnostic, Result, miette};
use qrpay::application::modal::ModalState;
use qrpay::application::sdk::PaymentSdk;
use qrpay::config::{Environment, SdkOptions};
use qrpay::domain::payment::{Amount, PaymentOutcome, PaymentRequest};
use qrpay::interfaces::terminal::commands::apply_line;
use qrpay::interfaces::terminal::renderer::TerminalRenderer;
use rust_decimal::Decimal;
use std::io::{self, BufRead};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Amount to charge
    amount: Decimal,

    /// ISO currency code
    currency: String,

    /// Merchant order identifier
    order_id: String,

    /// Publishable key identifying the merchant
    #[arg(long, env = "QRPAY_PUBLISHABLE_KEY")]
    publishable_key: Option<String>,

    #[arg(long, value_enum, env = "QRPAY_ENVIRONMENT", default_value_t = Environment::Production)]
    environment: Environment,

    /// Gateway base URL override
    #[arg(long, env = "QRPAY_BASE_URL")]
    base_url: Option<String>,

    /// Milliseconds between status checks
    #[arg(long, env = "QRPAY_POLL_INTERVAL_MS")]
    poll_interval_ms: Option<u64>,

    #[arg(long, env = "QRPAY_MERCHANT_NAME")]
    merchant_name: Option<String>,

    /// Obtain a session token before creating the payment
    #[arg(long)]
    use_session_token: bool,

    /// Give up after this many consecutive failed status checks
    #[arg(long)]
    max_poll_failures: Option<u32>,

    /// Render into a named container instead of a full-page overlay
    #[arg(long)]
    container: Option<String>,

    #[arg(long)]
    callback_url: Option<String>,

    #[arg(long)]
    nonce: Option<String>,

    /// Stop waiting for the payment after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

impl Cli {
    fn options(&self) -> SdkOptions {
        SdkOptions {
            publishable_key: self.publishable_key.clone(),
            poll_interval_ms: self.poll_interval_ms,
            environment: self.environment,
            base_url: self.base_url.clone(),
            merchant_name: self.merchant_name.clone(),
            use_session_token: self.use_session_token,
            max_poll_failures: self.max_poll_failures,
        }
    }

    fn request(&self) -> Result<PaymentRequest> {
        let amount = Amount::new(self.amount).into_diagnostic()?;
        let mut request = PaymentRequest::new(amount, &self.currency, &self.order_id);
        request.callback_url = self.callback_url.clone();
        request.nonce = self.nonce.clone();
        Ok(request)
    }
}

/// Reads stdin on a plain thread so a pending read never holds up runtime
/// shutdown.
fn spawn_input_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let request = cli.request()?;

    let renderer = Arc::new(TerminalRenderer::new(io::stdout()));
    let sdk = PaymentSdk::connect(cli.options(), renderer.clone()).into_diagnostic()?;

    let input_renderer = renderer.clone();
    let mut lines = spawn_input_reader();
    tokio::spawn(async move {
        while let Some(line) = lines.recv().await {
            if let Err(e) = apply_line(&line, input_renderer.bindings().as_ref()) {
                warn!(error = %e, "could not apply command");
            }
        }
    });

    let (outcome_tx, outcome_rx) = oneshot::channel::<PaymentOutcome>();
    let mut modal_state = sdk.modal().subscribe();

    sdk.show_payment_modal(
        cli.container.as_deref(),
        request,
        Box::new(move |outcome| {
            let _ = outcome_tx.send(outcome);
        }),
    )
    .await
    .into_diagnostic()?;

    let timeout = async {
        match cli.timeout_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        biased;
        outcome = outcome_rx => {
            let outcome = outcome.into_diagnostic()?;
            println!("{}", serde_json::to_string(&outcome).into_diagnostic()?);
            sdk.modal().request_close(true).into_diagnostic()?;
            if outcome.success {
                Ok(())
            } else {
                Err(miette!("payment did not complete: {}", outcome.status()))
            }
        }
        _ = modal_state.wait_for(|state| *state == ModalState::Closed) => {
            Err(miette!("payment cancelled"))
        }
        _ = timeout => {
            sdk.cancel();
            Err(miette!("gave up waiting for the payment"))
        }
    }
}
