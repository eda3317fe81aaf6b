use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{info, warn};

use kaiwa_core::errors::CollaboratorError;
use kaiwa_core::provider::{GenerateRequest, GenerativeModel};

/// Retry and circuit-breaker configuration for [`ReliableModel`].
#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_factor: f64,
    pub circuit_breaker_threshold: u32,
    pub circuit_breaker_cooldown: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter_factor: 0.2,
            circuit_breaker_threshold: 3,
            circuit_breaker_cooldown: Duration::from_secs(60),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum CircuitState {
    Closed,
    Open { since: Instant },
    HalfOpen,
}

/// Wraps a [`GenerativeModel`] with retry logic and a circuit breaker.
///
/// - Retries retryable errors with exponential backoff + jitter
/// - Respects `retry_after` hints from rate limit responses
/// - N consecutive failures → open → cooldown → half-open → success → closed
///
/// The generate call is unary, so a failed attempt can always be retried
/// whole; there is no partially-consumed output to worry about.
pub struct ReliableModel<M: GenerativeModel> {
    inner: M,
    config: RetryConfig,
    circuit_state: RwLock<CircuitState>,
    consecutive_failures: AtomicU32,
    total_retries: AtomicU64,
}

impl<M: GenerativeModel> ReliableModel<M> {
    pub fn new(inner: M, config: RetryConfig) -> Self {
        Self {
            inner,
            config,
            circuit_state: RwLock::new(CircuitState::Closed),
            consecutive_failures: AtomicU32::new(0),
            total_retries: AtomicU64::new(0),
        }
    }

    pub fn with_defaults(inner: M) -> Self {
        Self::new(inner, RetryConfig::default())
    }

    pub fn total_retries(&self) -> u64 {
        self.total_retries.load(Ordering::Relaxed)
    }

    fn check_circuit(&self) -> Result<(), CollaboratorError> {
        let state = self.circuit_state.read();
        match &*state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open { since } => {
                if since.elapsed() >= self.config.circuit_breaker_cooldown {
                    drop(state);
                    *self.circuit_state.write() = CircuitState::HalfOpen;
                    Ok(())
                } else {
                    Err(CollaboratorError::Overloaded)
                }
            }
        }
    }

    fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        let mut state = self.circuit_state.write();
        if *state != CircuitState::Closed {
            info!("circuit breaker closed after successful request");
            *state = CircuitState::Closed;
        }
    }

    fn record_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= self.config.circuit_breaker_threshold {
            let mut state = self.circuit_state.write();
            if *state == CircuitState::Closed || *state == CircuitState::HalfOpen {
                warn!(failures, "circuit breaker opened");
                *state = CircuitState::Open {
                    since: Instant::now(),
                };
            }
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self
            .config
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
            .min(self.config.max_delay);
        let jitter = exp.mul_f64(self.config.jitter_factor * rand::random::<f64>());
        exp + jitter
    }
}

#[async_trait]
impl<M: GenerativeModel> GenerativeModel for ReliableModel<M> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, CollaboratorError> {
        self.check_circuit()?;

        let mut attempt = 0u32;
        loop {
            match self.inner.generate(request).await {
                Ok(text) => {
                    self.record_success();
                    return Ok(text);
                }
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    self.total_retries.fetch_add(1, Ordering::Relaxed);
                    let delay = e.suggested_delay().unwrap_or_else(|| self.backoff_delay(attempt));
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        kind = e.error_kind(),
                        "retrying generate call"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    self.record_failure();
                    return Err(e);
                }
            }
        }
    }
}
