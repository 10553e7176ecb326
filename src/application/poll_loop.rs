use crate::domain::payment::{PaymentOutcome, SessionToken, StatusReport};
use crate::domain::ports::{GatewayRef, PaymentGateway};
use crate::error::Result;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub type CompletionCallback = Box<dyn FnOnce(PaymentOutcome) + Send + 'static>;

pub const STATUS_UNAVAILABLE: &str = "payment status unavailable";

/// Ticks are skipped while this many status checks are still unanswered.
pub const MAX_IN_FLIGHT_CHECKS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Active,
    Confirmed,
    Rejected,
    Cancelled,
}

impl PollState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PollState::Confirmed | PollState::Rejected | PollState::Cancelled
        )
    }
}

struct Session {
    generation: u64,
    transaction_ref: String,
    on_complete: Option<CompletionCallback>,
    task: Option<JoinHandle<()>>,
    failures: u32,
}

struct Shared {
    next_generation: u64,
    state: PollState,
    session: Option<Session>,
}

impl Shared {
    fn is_current(&self, generation: u64) -> bool {
        self.state == PollState::Active
            && self.session.as_ref().map(|s| s.generation) == Some(generation)
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drives status checks for one transaction at a time.
///
/// A session owns a repeating timer task. Every tick spawns one status check
/// as a child of that task, so a slow request never holds back the next
/// tick. Each check carries the generation of the session that spawned it and
/// is discarded if that session is no longer the live one.
pub struct PollLoop {
    gateway: GatewayRef,
    interval: Duration,
    max_failures: Option<u32>,
    shared: Arc<Mutex<Shared>>,
}

#[derive(Clone)]
struct TickContext {
    gateway: GatewayRef,
    shared: Arc<Mutex<Shared>>,
    generation: u64,
    transaction_ref: String,
    token: Option<SessionToken>,
    max_failures: Option<u32>,
}

impl PollLoop {
    pub fn new(gateway: GatewayRef, interval: Duration, max_failures: Option<u32>) -> Self {
        Self {
            gateway,
            interval,
            max_failures,
            shared: Arc::new(Mutex::new(Shared {
                next_generation: 1,
                state: PollState::Idle,
                session: None,
            })),
        }
    }

    /// Starts polling `transaction_ref`, replacing any live session.
    ///
    /// The replaced session is stopped without its callback firing. The first
    /// status check runs immediately, later ones every `interval`. Returns the
    /// generation of the new session.
    pub fn start(
        &self,
        transaction_ref: impl Into<String>,
        token: Option<SessionToken>,
        on_complete: CompletionCallback,
    ) -> u64 {
        let transaction_ref = transaction_ref.into();
        let mut shared = lock(&self.shared);
        if let Some(previous) = stop_session(&mut shared) {
            info!(
                transaction_ref = %previous.transaction_ref,
                "replacing active poll session"
            );
        }

        let generation = shared.next_generation;
        shared.next_generation += 1;

        let ctx = TickContext {
            gateway: self.gateway.clone(),
            shared: self.shared.clone(),
            generation,
            transaction_ref: transaction_ref.clone(),
            token,
            max_failures: self.max_failures,
        };
        let task = tokio::spawn(run_session(ctx, self.interval));

        info!(%transaction_ref, generation, "poll session started");
        shared.state = PollState::Active;
        shared.session = Some(Session {
            generation,
            transaction_ref,
            on_complete: Some(on_complete),
            task: Some(task),
            failures: 0,
        });
        generation
    }

    /// Stops the live session without invoking its callback.
    ///
    /// Returns `false` when there was nothing to cancel.
    pub fn cancel(&self) -> bool {
        let mut shared = lock(&self.shared);
        match stop_session(&mut shared) {
            Some(session) => {
                shared.state = PollState::Cancelled;
                info!(transaction_ref = %session.transaction_ref, "poll session cancelled");
                true
            }
            None => false,
        }
    }

    pub fn state(&self) -> PollState {
        lock(&self.shared).state
    }

    pub fn is_active(&self) -> bool {
        self.state() == PollState::Active
    }

    /// Generation of the live session, if any.
    pub fn generation(&self) -> Option<u64> {
        lock(&self.shared).session.as_ref().map(|s| s.generation)
    }

    pub fn transaction_ref(&self) -> Option<String> {
        lock(&self.shared)
            .session
            .as_ref()
            .map(|s| s.transaction_ref.clone())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for PollLoop {
    fn drop(&mut self) {
        let mut shared = lock(&self.shared);
        stop_session(&mut shared);
    }
}

/// Detaches the live session and aborts its timer. Its callback is dropped.
fn stop_session(shared: &mut Shared) -> Option<Session> {
    let mut session = shared.session.take()?;
    if let Some(task) = session.task.take() {
        task.abort();
    }
    Some(session)
}

async fn run_session(ctx: TickContext, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut checks = JoinSet::new();

    loop {
        ticker.tick().await;
        while checks.try_join_next().is_some() {}
        if !lock(&ctx.shared).is_current(ctx.generation) {
            break;
        }
        if checks.len() >= MAX_IN_FLIGHT_CHECKS {
            debug!(
                transaction_ref = %ctx.transaction_ref,
                in_flight = checks.len(),
                "status checks outstanding, skipping tick"
            );
            continue;
        }
        debug!(transaction_ref = %ctx.transaction_ref, "poll tick");
        checks.spawn(check_status(ctx.clone()));
    }
}

async fn check_status(ctx: TickContext) {
    let result = ctx
        .gateway
        .poll_status(&ctx.transaction_ref, ctx.token.as_ref())
        .await;
    apply_result(&ctx, result);
}

fn apply_result(ctx: &TickContext, result: Result<StatusReport>) {
    let mut shared = lock(&ctx.shared);
    if !shared.is_current(ctx.generation) {
        debug!(
            transaction_ref = %ctx.transaction_ref,
            generation = ctx.generation,
            "discarding stale poll result"
        );
        return;
    }

    let (state, outcome) = match result {
        Ok(report) if !report.status.is_terminal() => {
            if let Some(session) = shared.session.as_mut() {
                session.failures = 0;
            }
            return;
        }
        Ok(report) => {
            let state = if report.status.is_success() {
                PollState::Confirmed
            } else {
                PollState::Rejected
            };
            info!(
                transaction_ref = %ctx.transaction_ref,
                status = %report.status,
                "payment reached terminal status"
            );
            (state, PaymentOutcome::from_report(report, &ctx.transaction_ref))
        }
        Err(err) => {
            let Some(session) = shared.session.as_mut() else {
                return;
            };
            session.failures += 1;
            warn!(
                transaction_ref = %ctx.transaction_ref,
                failures = session.failures,
                error = %err,
                "status check failed, polling continues"
            );
            match ctx.max_failures {
                Some(max) if session.failures >= max => {
                    warn!(transaction_ref = %ctx.transaction_ref, "giving up on status checks");
                    (
                        PollState::Rejected,
                        PaymentOutcome::failure(
                            STATUS_UNAVAILABLE,
                            Some(ctx.transaction_ref.clone()),
                        ),
                    )
                }
                _ => return,
            }
        }
    };

    shared.state = state;
    let callback = stop_session(&mut shared).and_then(|mut s| s.on_complete.take());
    drop(shared);

    if let Some(on_complete) = callback {
        on_complete(outcome);
    }
}
