use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

// ============================================================================
// Circuit Breaker
// ============================================================================
//
// Tracks failures against a downstream service and blocks calls outright
// once the service is clearly unhealthy.
//
// Closed: requests pass through. Open: requests are rejected immediately.
// HalfOpen: after the cooldown, a limited probe decides whether to close.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// Cooldown before a probe is allowed through an open circuit.
    pub timeout: Duration,
    /// Successful probes required to close again.
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(60),
            success_threshold: 2,
        }
    }
}

struct Inner {
    state: CircuitState,
    failures: u32,
    probe_successes: u32,
    last_failure: Option<Instant>,
}

#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<Mutex<Inner>>,
    config: CircuitBreakerConfig,
}

#[derive(Debug)]
pub enum CircuitBreakerError<E> {
    CircuitOpen,
    OperationFailed(E),
}

impl<E: std::fmt::Display> std::fmt::Display for CircuitBreakerError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitBreakerError::CircuitOpen => write!(f, "circuit breaker is open"),
            CircuitBreakerError::OperationFailed(err) => write!(f, "operation failed: {err}"),
        }
    }
}

impl<E: std::error::Error> std::error::Error for CircuitBreakerError<E> {}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: CircuitState::Closed,
                failures: 0,
                probe_successes: 0,
                last_failure: None,
            })),
            config,
        }
    }

    pub async fn call<F, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: std::future::Future<Output = Result<T, E>>,
    {
        {
            let mut inner = self.inner.lock().await;
            if inner.state == CircuitState::Open {
                let cooled_down = inner
                    .last_failure
                    .map(|at| at.elapsed() >= self.config.timeout)
                    .unwrap_or(true);
                if cooled_down {
                    tracing::info!("Circuit breaker transitioning to half-open");
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_successes = 0;
                } else {
                    return Err(CircuitBreakerError::CircuitOpen);
                }
            }
        }

        match operation.await {
            Ok(value) => {
                self.on_success().await;
                Ok(value)
            }
            Err(err) => {
                self.on_failure().await;
                Err(CircuitBreakerError::OperationFailed(err))
            }
        }
    }

    async fn on_success(&self) {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::HalfOpen => {
                inner.probe_successes += 1;
                if inner.probe_successes >= self.config.success_threshold {
                    tracing::info!("Circuit breaker closed");
                    inner.state = CircuitState::Closed;
                    inner.failures = 0;
                    inner.probe_successes = 0;
                    inner.last_failure = None;
                }
            }
            CircuitState::Closed => {
                inner.failures = 0;
            }
            CircuitState::Open => {}
        }
    }

    async fn on_failure(&self) {
        let mut inner = self.inner.lock().await;
        inner.failures += 1;
        inner.last_failure = Some(Instant::now());

        match inner.state {
            CircuitState::Closed => {
                if inner.failures >= self.config.failure_threshold {
                    tracing::warn!(failures = inner.failures, "Circuit breaker opened");
                    inner.state = CircuitState::Open;
                }
            }
            CircuitState::HalfOpen => {
                tracing::warn!("Probe failed, circuit breaker reopened");
                inner.state = CircuitState::Open;
                inner.probe_successes = 0;
            }
            CircuitState::Open => {}
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(failure_threshold: u32, timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold,
            timeout,
            success_threshold: 1,
        })
    }

    #[tokio::test]
    async fn opens_after_failure_threshold() {
        let cb = breaker(3, Duration::from_secs(60));

        for _ in 0..3 {
            let _ = cb.call(async { Err::<(), _>("down") }).await;
        }

        // The circuit rejects the next call outright, healthy or not.
        let result = cb.call(async { Ok::<_, &str>(1) }).await;
        assert!(matches!(result, Err(CircuitBreakerError::CircuitOpen)));
    }

    #[tokio::test]
    async fn success_resets_the_failure_count() {
        let cb = breaker(3, Duration::from_secs(60));

        for _ in 0..2 {
            let _ = cb.call(async { Err::<(), _>("down") }).await;
        }
        cb.call(async { Ok::<_, &str>(()) }).await.unwrap();
        for _ in 0..2 {
            let _ = cb.call(async { Err::<(), _>("down") }).await;
        }

        // Four failures total but never three in a row: still closed.
        cb.call(async { Ok::<_, &str>(()) }).await.unwrap();
    }

    #[tokio::test]
    async fn recovers_through_half_open_probe() {
        let cb = breaker(1, Duration::from_millis(20));

        let _ = cb.call(async { Err::<(), _>("down") }).await;
        let rejected = cb.call(async { Ok::<_, &str>(()) }).await;
        assert!(matches!(rejected, Err(CircuitBreakerError::CircuitOpen)));

        tokio::time::sleep(Duration::from_millis(40)).await;
        cb.call(async { Ok::<_, &str>(()) }).await.unwrap();
        cb.call(async { Ok::<_, &str>(()) }).await.unwrap();
    }
}
