//! Health gate for the LLM dependency.
//!
//! CLOSED counts failures until `failure_threshold`, then OPEN rejects every call until
//! `recovery_timeout` has passed. The first call after that runs as the single HALF_OPEN trial:
//! success closes the breaker, failure reopens it. A trial whose future is dropped before it
//! finishes records nothing and frees the trial slot.

use std::{future::Future, sync::Mutex, time::Duration};

use serde::Serialize;
use tokio::time::Instant;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
	Closed,
	Open,
	HalfOpen,
}
impl CircuitState {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Closed => "closed",
			Self::Open => "open",
			Self::HalfOpen => "half_open",
		}
	}
}

#[derive(Debug, thiserror::Error)]
pub enum BreakerError<E> {
	#[error("Circuit breaker is open.")]
	Open,
	#[error(transparent)]
	Inner(E),
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BreakerSnapshot {
	pub state: CircuitState,
	pub failures: u32,
	pub failure_threshold: u32,
	pub recovery_timeout_ms: u64,
}

#[derive(Debug)]
struct BreakerState {
	state: CircuitState,
	failures: u32,
	changed_at: Instant,
	trial_in_flight: bool,
}

#[derive(Debug)]
pub struct CircuitBreaker {
	inner: Mutex<BreakerState>,
	failure_threshold: u32,
	recovery_timeout: Duration,
}
impl CircuitBreaker {
	pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
		Self {
			inner: Mutex::new(BreakerState {
				state: CircuitState::Closed,
				failures: 0,
				changed_at: Instant::now(),
				trial_in_flight: false,
			}),
			failure_threshold: failure_threshold.max(1),
			recovery_timeout,
		}
	}

	pub fn from_config(cfg: &sift_config::CircuitBreaker) -> Self {
		Self::new(cfg.failure_threshold, Duration::from_millis(cfg.recovery_timeout_ms))
	}

	/// Cheap precheck. An OPEN breaker whose cooldown has elapsed reports closed so the next
	/// call can become the trial.
	pub fn is_open(&self) -> bool {
		let inner = self.lock();

		match inner.state {
			CircuitState::Closed => false,
			CircuitState::Open => inner.changed_at.elapsed() < self.recovery_timeout,
			CircuitState::HalfOpen => inner.trial_in_flight,
		}
	}

	pub fn state(&self) -> CircuitState {
		self.lock().state
	}

	pub fn snapshot(&self) -> BreakerSnapshot {
		let inner = self.lock();

		BreakerSnapshot {
			state: inner.state,
			failures: inner.failures,
			failure_threshold: self.failure_threshold,
			recovery_timeout_ms: self.recovery_timeout.as_millis() as u64,
		}
	}

	pub fn reset(&self) {
		let mut inner = self.lock();

		*inner = BreakerState {
			state: CircuitState::Closed,
			failures: 0,
			changed_at: Instant::now(),
			trial_in_flight: false,
		};
	}

	/// Runs `op` under the breaker. `op` is never polled while the breaker rejects calls.
	pub async fn call<F, T, E>(&self, op: F) -> Result<T, BreakerError<E>>
	where
		F: Future<Output = Result<T, E>>,
	{
		let permit = self.acquire().ok_or(BreakerError::Open)?;
		let result = op.await;

		match &result {
			Ok(_) => permit.succeed(),
			Err(_) => permit.fail(),
		}

		result.map_err(BreakerError::Inner)
	}

	fn acquire(&self) -> Option<Permit<'_>> {
		let mut inner = self.lock();

		match inner.state {
			CircuitState::Closed => Some(Permit { breaker: self, trial: false, settled: false }),
			CircuitState::Open => {
				if inner.changed_at.elapsed() < self.recovery_timeout {
					return None;
				}

				inner.state = CircuitState::HalfOpen;
				inner.changed_at = Instant::now();
				inner.trial_in_flight = true;

				tracing::info!(from = "open", to = "half_open", "Circuit breaker admitting trial call.");

				Some(Permit { breaker: self, trial: true, settled: false })
			},
			CircuitState::HalfOpen => {
				if inner.trial_in_flight {
					return None;
				}

				inner.trial_in_flight = true;

				Some(Permit { breaker: self, trial: true, settled: false })
			},
		}
	}

	fn record_success(&self, trial: bool) {
		let mut inner = self.lock();

		match inner.state {
			CircuitState::Closed => inner.failures = 0,
			CircuitState::HalfOpen if trial => {
				inner.state = CircuitState::Closed;
				inner.failures = 0;
				inner.changed_at = Instant::now();
				inner.trial_in_flight = false;

				tracing::info!(from = "half_open", to = "closed", "Circuit breaker closed.");
			},
			// A call admitted before the breaker opened says nothing about current health.
			_ => {},
		}
	}

	fn record_failure(&self, trial: bool) {
		let mut inner = self.lock();

		match inner.state {
			CircuitState::Closed => {
				inner.failures = inner.failures.saturating_add(1);

				if inner.failures >= self.failure_threshold {
					inner.state = CircuitState::Open;
					inner.changed_at = Instant::now();

					tracing::warn!(
						from = "closed",
						to = "open",
						failures = inner.failures,
						"Circuit breaker opened."
					);
				}
			},
			CircuitState::HalfOpen if trial => {
				inner.state = CircuitState::Open;
				inner.failures = inner.failures.saturating_add(1);
				inner.changed_at = Instant::now();
				inner.trial_in_flight = false;

				tracing::warn!(from = "half_open", to = "open", "Circuit breaker trial failed.");
			},
			_ => {},
		}
	}

	fn release_trial(&self) {
		let mut inner = self.lock();

		if inner.state == CircuitState::HalfOpen {
			inner.trial_in_flight = false;
		}
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, BreakerState> {
		self.inner.lock().unwrap_or_else(|err| err.into_inner())
	}
}

/// Settles breaker bookkeeping exactly once; dropping it unsettled records nothing.
struct Permit<'a> {
	breaker: &'a CircuitBreaker,
	trial: bool,
	settled: bool,
}
impl Permit<'_> {
	fn succeed(mut self) {
		self.settled = true;
		self.breaker.record_success(self.trial);
	}

	fn fail(mut self) {
		self.settled = true;
		self.breaker.record_failure(self.trial);
	}
}
impl Drop for Permit<'_> {
	fn drop(&mut self) {
		if !self.settled && self.trial {
			self.breaker.release_trial();
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	async fn fail(breaker: &CircuitBreaker) -> Result<(), BreakerError<&'static str>> {
		breaker.call(async { Err::<(), _>("boom") }).await
	}

	async fn succeed(breaker: &CircuitBreaker) -> Result<u32, BreakerError<&'static str>> {
		breaker.call(async { Ok::<_, &'static str>(7) }).await
	}

	#[tokio::test(start_paused = true)]
	async fn opens_after_threshold_and_rejects_without_running() {
		let breaker = CircuitBreaker::new(2, Duration::from_secs(60));

		assert!(matches!(fail(&breaker).await, Err(BreakerError::Inner("boom"))));
		assert!(!breaker.is_open());
		assert!(matches!(fail(&breaker).await, Err(BreakerError::Inner("boom"))));
		assert!(breaker.is_open());

		let mut ran = false;
		let result = breaker
			.call(async {
				ran = true;

				Ok::<_, &'static str>(())
			})
			.await;

		assert!(matches!(result, Err(BreakerError::Open)));
		assert!(!ran);
	}

	#[tokio::test(start_paused = true)]
	async fn success_resets_the_failure_count() {
		let breaker = CircuitBreaker::new(2, Duration::from_secs(60));

		let _ = fail(&breaker).await;
		let _ = succeed(&breaker).await;
		let _ = fail(&breaker).await;

		assert_eq!(breaker.state(), CircuitState::Closed);
		assert_eq!(breaker.snapshot().failures, 1);
	}

	#[tokio::test(start_paused = true)]
	async fn trial_success_closes_and_trial_failure_reopens() {
		let breaker = CircuitBreaker::new(1, Duration::from_secs(60));

		let _ = fail(&breaker).await;

		tokio::time::advance(Duration::from_secs(61)).await;

		assert!(!breaker.is_open());
		assert!(matches!(fail(&breaker).await, Err(BreakerError::Inner(_))));
		assert_eq!(breaker.state(), CircuitState::Open);
		assert!(breaker.is_open());

		tokio::time::advance(Duration::from_secs(61)).await;

		assert_eq!(succeed(&breaker).await.ok(), Some(7));
		assert_eq!(breaker.state(), CircuitState::Closed);
	}

	#[tokio::test(start_paused = true)]
	async fn reset_closes_an_open_breaker() {
		let breaker = CircuitBreaker::new(1, Duration::from_secs(60));

		let _ = fail(&breaker).await;

		breaker.reset();

		assert!(!breaker.is_open());
		assert_eq!(breaker.snapshot().failures, 0);
	}
}
