use super::{format_delay, LogSessionRequest, SchedulerConfig, SessionState};
use crate::auth::{AuthManager, Subscriber};
use crate::payload::DisplayPrefix;
use crate::poller::{Filters, LogPoller, PollBatch, PollOutcome};
use crate::sink::Sink;
use serde::Serialize;
use std::future::pending;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Counters and final position of a finished session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub events_delivered: u64,
    pub records_skipped: u64,
    pub polls: u64,
    pub subscribe_calls: u64,
    pub cursor: String,
    pub state: SessionState,
    pub fatal: Option<String>,
    pub cancelled: bool,
}

/// One log stream: a single sequential loop alternating between subscribe
/// calls, poll calls and delays. At most one network call is in flight.
pub struct Session<P, S, K> {
    auth: AuthManager<S>,
    poller: P,
    sink: K,
    config: SchedulerConfig,
    filters: Filters,
    cursor: String,
    state: SessionState,
    /// Consecutive retryable subscribe failures.
    auth_failures: u32,
    /// Set after a status-worthy error until the next clean poll.
    degraded: bool,
    events_delivered: u64,
    records_skipped: u64,
    polls: u64,
    fatal: Option<String>,
}

enum Wake {
    Cancelled,
    Stepped(Option<Duration>),
}

impl<P, S, K> Session<P, S, K>
where
    P: LogPoller,
    S: Subscriber,
    K: Sink,
{
    pub fn new(
        request: LogSessionRequest,
        subscriber: S,
        poller: P,
        sink: K,
        config: SchedulerConfig,
    ) -> Self {
        let mut auth = AuthManager::new(request.identity, subscriber);
        let state = match request.initial_credential {
            Some(credential) => {
                auth = auth.with_credential(credential);
                SessionState::Polling
            }
            None => SessionState::NeedAuth,
        };

        Self {
            auth,
            poller,
            sink,
            config,
            filters: request.filters,
            cursor: request.initial_cursor.unwrap_or_default(),
            state,
            auth_failures: 0,
            degraded: false,
            events_delivered: 0,
            records_skipped: 0,
            polls: 0,
            fatal: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn cursor(&self) -> &str {
        &self.cursor
    }

    pub fn auth(&self) -> &AuthManager<S> {
        &self.auth
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            events_delivered: self.events_delivered,
            records_skipped: self.records_skipped,
            polls: self.polls,
            subscribe_calls: self.auth.subscribe_calls(),
            cursor: self.cursor.clone(),
            state: self.state,
            fatal: self.fatal.clone(),
            cancelled: false,
        }
    }

    /// Run until the session terminates or `shutdown` turns true.
    ///
    /// Cancellation drops whatever call or delay is pending; the sink gets no
    /// further callbacks after that point.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> SessionSummary {
        info!(
            store_id = %self.auth.identity().store_id,
            api_key = %self.auth.identity().api_key,
            cursor = %self.cursor,
            "Starting log session"
        );

        let mut cancelled = false;
        loop {
            let wake = tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => Wake::Cancelled,
                delay = self.step() => Wake::Stepped(delay),
            };

            let delay = match wake {
                Wake::Cancelled => {
                    cancelled = true;
                    break;
                }
                Wake::Stepped(None) => break,
                Wake::Stepped(Some(delay)) => delay,
            };

            if delay.is_zero() {
                continue;
            }

            let slept = tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => false,
                _ = tokio::time::sleep(delay) => true,
            };
            if !slept {
                cancelled = true;
                break;
            }
        }

        let summary = SessionSummary {
            cancelled,
            ..self.summary()
        };
        info!(
            events = summary.events_delivered,
            skipped = summary.records_skipped,
            polls = summary.polls,
            cancelled = summary.cancelled,
            state = ?summary.state,
            "Log session finished"
        );
        summary
    }

    /// Perform one transition. Returns the delay before the next step, or
    /// `None` once the session has terminated.
    pub async fn step(&mut self) -> Option<Duration> {
        debug!(state = ?self.state, cursor = %self.cursor, "Session step");
        match self.state {
            SessionState::Terminated => None,
            SessionState::NeedAuth => self.authorize().await,
            SessionState::Polling | SessionState::Throttled | SessionState::BackingOff => {
                self.poll_once().await
            }
        }
    }

    async fn authorize(&mut self) -> Option<Duration> {
        match self.auth.acquire().await {
            Ok(credential) => {
                debug!(token = %credential.redacted(), "Authorized log session");
                self.auth_failures = 0;
                self.state = SessionState::Polling;
                Some(Duration::ZERO)
            }
            Err(e) => {
                self.auth_failures += 1;
                if e.is_retryable() && self.auth_failures < self.config.max_auth_attempts {
                    warn!(
                        attempt = self.auth_failures,
                        max_attempts = self.config.max_auth_attempts,
                        error = %e,
                        "Subscribe failed, retrying"
                    );
                    let delay = self.config.error_retry_interval;
                    self.notify_retry(&e.to_string(), delay);
                    Some(delay)
                } else {
                    self.terminate(format!(
                        "Couldn't resubscribe: {}. App log streaming is not available in this session.",
                        e
                    ))
                }
            }
        }
    }

    async fn poll_once(&mut self) -> Option<Duration> {
        let credential = match self.auth.current().await {
            Some(credential) => credential,
            None => {
                self.state = SessionState::NeedAuth;
                return Some(Duration::ZERO);
            }
        };

        self.polls += 1;
        let outcome = self
            .poller
            .poll(&credential, &self.cursor, &self.filters)
            .await;

        match outcome {
            PollOutcome::Success(batch) => self.accept_batch(batch),
            PollOutcome::AuthExpired => {
                info!(token = %credential.redacted(), "Streaming token expired, resubscribing");
                self.auth.invalidate(&credential).await;
                self.state = SessionState::NeedAuth;
                Some(Duration::ZERO)
            }
            PollOutcome::Throttled { message } => {
                let delay = self.config.throttle_retry_interval;
                warn!(delay = %format_delay(delay), error = %message, "Poll throttled");
                self.state = SessionState::Throttled;
                self.notify_retry(&message, delay);
                Some(delay)
            }
            PollOutcome::TransientServerError { message } => {
                let delay = self.config.error_retry_interval;
                warn!(delay = %format_delay(delay), error = %message, "Poll failed");
                self.state = SessionState::BackingOff;
                self.notify_retry(&message, delay);
                Some(delay)
            }
            PollOutcome::FatalError { message } => self.terminate(message),
        }
    }

    /// Events are forwarded before any error attached to the batch is handled.
    fn accept_batch(&mut self, batch: PollBatch) -> Option<Duration> {
        for event in &batch.events {
            let prefix = DisplayPrefix::for_event(event);
            self.sink.on_event(event, &prefix);
        }
        self.events_delivered += batch.events.len() as u64;

        for e in &batch.decode_errors {
            self.sink
                .on_status(&format!("Failed to decode log record: {}", e));
        }
        self.records_skipped += batch.decode_errors.len() as u64;

        if let Some(cursor) = batch.cursor {
            self.cursor = cursor;
        }

        if !batch.errors.is_empty() {
            let delay = self.config.error_retry_interval;
            let message = batch.errors.join(", ");
            warn!(delay = %format_delay(delay), error = %message, "Poll response carried errors");
            self.state = SessionState::BackingOff;
            self.notify_retry(&message, delay);
            return Some(delay);
        }

        if self.degraded {
            self.degraded = false;
            self.sink.on_status("Resumed streaming");
        }
        self.state = SessionState::Polling;
        Some(self.config.poll_interval)
    }

    fn notify_retry(&mut self, message: &str, delay: Duration) {
        self.degraded = true;
        self.sink
            .on_status(&format!("{}\nRetrying in {}", message, format_delay(delay)));
    }

    fn terminate(&mut self, message: String) -> Option<Duration> {
        error!(error = %message, cursor = %self.cursor, "Log session terminated");
        self.sink.on_fatal(&message);
        self.state = SessionState::Terminated;
        self.fatal = Some(message);
        None
    }
}

/// Resolves once `shutdown` reads true. A dropped sender never resolves.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            pending::<()>().await;
        }
    }
}
