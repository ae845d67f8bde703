use crate::observability::metrics;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Clone, Debug)]
pub struct BreakerSettings {
    /// Consecutive failures that open the circuit.
    pub fail_max: u32,
    /// How long the circuit stays open before a probe is let through.
    pub reset_timeout: Duration,
    /// Upper bound on one guarded call. A probe silent for longer than
    /// `reset_timeout + probe_timeout` is treated as abandoned.
    pub probe_timeout: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            fail_max: 3,
            reset_timeout: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(10),
        }
    }
}

impl BreakerSettings {
    fn probe_abandoned_after(&self) -> Duration {
        self.reset_timeout + self.probe_timeout
    }
}

/// Observable state of a circuit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
pub enum CircuitError<E> {
    /// Rejected without running the call.
    Open,
    Inner(E),
}

/// Failure circuit guarding calls to one upstream.
///
/// Cloning shares the state, so every clone counts failures against the same
/// circuit. Construct one per upstream dataset and hand clones to callers.
#[derive(Clone, Debug)]
pub struct CircuitBreaker {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    name: String,
    settings: BreakerSettings,
    state: Mutex<State>,
}

#[derive(Clone, Copy, Debug)]
enum State {
    Closed { failures: u32 },
    Open { until: Instant },
    // A probe that never reports back is given up on after `probe_abandoned_after`
    HalfOpen { probe_started: Instant },
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, settings: BreakerSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                settings,
                state: Mutex::new(State::Closed { failures: 0 }),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn settings(&self) -> &BreakerSettings {
        &self.inner.settings
    }

    pub async fn state(&self) -> CircuitState {
        match *self.inner.state.lock().await {
            State::Closed { .. } => CircuitState::Closed,
            State::Open { .. } => CircuitState::Open,
            State::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }

    /// Run `call` through the circuit. Any `Err` from the call counts as a failure.
    pub async fn call<F, T, E>(&self, call: F) -> Result<T, CircuitError<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        if !self.admit().await {
            metrics::circuit::rejected(&self.inner.name);
            return Err(CircuitError::Open);
        }
        match call.await {
            Ok(value) => {
                self.on_success().await;
                Ok(value)
            }
            Err(e) => {
                self.on_failure().await;
                Err(CircuitError::Inner(e))
            }
        }
    }

    async fn admit(&self) -> bool {
        let mut state = self.inner.state.lock().await;
        let now = Instant::now();
        let current = *state;
        match current {
            State::Closed { .. } => true,
            State::Open { until } if now >= until => {
                info!(circuit = %self.inner.name, "Circuit half-open, letting one probe through");
                metrics::circuit::half_opened(&self.inner.name);
                *state = State::HalfOpen { probe_started: now };
                true
            }
            State::Open { .. } => false,
            State::HalfOpen { probe_started }
                if now >= probe_started + self.inner.settings.probe_abandoned_after() =>
            {
                warn!(circuit = %self.inner.name, "Probe never reported back, admitting another");
                *state = State::HalfOpen { probe_started: now };
                true
            }
            State::HalfOpen { .. } => false,
        }
    }

    async fn on_success(&self) {
        let mut state = self.inner.state.lock().await;
        let current = *state;
        match current {
            State::Closed { .. } => *state = State::Closed { failures: 0 },
            State::HalfOpen { .. } => {
                info!(circuit = %self.inner.name, "Probe succeeded, circuit closed");
                metrics::circuit::closed(&self.inner.name);
                *state = State::Closed { failures: 0 };
            }
            // Admitted before the circuit opened; only a probe may close it
            State::Open { .. } => {}
        }
    }

    async fn on_failure(&self) {
        let mut state = self.inner.state.lock().await;
        let until = Instant::now() + self.inner.settings.reset_timeout;
        let current = *state;
        match current {
            State::Closed { failures } => {
                let failures = failures + 1;
                if failures >= self.inner.settings.fail_max {
                    warn!(
                        circuit = %self.inner.name,
                        failures,
                        reset_timeout_secs = self.inner.settings.reset_timeout.as_secs_f64(),
                        "Circuit opened"
                    );
                    metrics::circuit::opened(&self.inner.name);
                    *state = State::Open { until };
                } else {
                    *state = State::Closed { failures };
                }
            }
            State::HalfOpen { .. } => {
                warn!(circuit = %self.inner.name, "Probe failed, circuit re-opened");
                metrics::circuit::opened(&self.inner.name);
                *state = State::Open { until };
            }
            // A call admitted before the circuit opened; the window is already running
            State::Open { .. } => {}
        }
    }
}
