use std::{sync::Arc, time::Duration};

use tokio::sync::oneshot;

use sift_service::{BreakerError, CircuitBreaker, CircuitState};

async fn trip(breaker: &CircuitBreaker) {
	let result = breaker.call(async { Err::<(), _>("down") }).await;

	assert!(matches!(result, Err(BreakerError::Inner("down"))));
}

#[tokio::test(start_paused = true)]
async fn half_open_admits_a_single_trial_under_concurrency() {
	let breaker = Arc::new(CircuitBreaker::new(1, Duration::from_secs(1)));

	trip(&breaker).await;

	assert!(breaker.is_open());

	tokio::time::advance(Duration::from_secs(1)).await;

	let (release, gate) = oneshot::channel::<()>();
	let trial = tokio::spawn({
		let breaker = breaker.clone();

		async move { breaker.call(async { gate.await.map_err(|_| "gate dropped") }).await.is_ok() }
	});

	tokio::task::yield_now().await;

	assert_eq!(breaker.state(), CircuitState::HalfOpen);
	assert!(breaker.is_open());

	let mut contenders = Vec::new();

	for _ in 0..8 {
		let breaker = breaker.clone();

		contenders.push(tokio::spawn(async move {
			matches!(breaker.call(async { Ok::<_, &'static str>(()) }).await, Err(BreakerError::Open))
		}));
	}
	for contender in contenders {
		assert!(contender.await.expect("Contender panicked."));
	}

	release.send(()).expect("Trial must still be waiting.");

	assert!(trial.await.expect("Trial panicked."));
	assert_eq!(breaker.state(), CircuitState::Closed);
	assert_eq!(breaker.snapshot().failures, 0);
}

#[tokio::test(start_paused = true)]
async fn failures_from_many_tasks_open_the_breaker_once() {
	let breaker = Arc::new(CircuitBreaker::new(5, Duration::from_secs(60)));
	let mut tasks = Vec::new();

	for _ in 0..20 {
		let breaker = breaker.clone();

		tasks.push(tokio::spawn(async move {
			let _ = breaker.call(async { Err::<(), _>("down") }).await;
		}));
	}
	for task in tasks {
		task.await.expect("Task panicked.");
	}

	let snapshot = breaker.snapshot();

	assert_eq!(snapshot.state, CircuitState::Open);
	assert_eq!(snapshot.failures, 5);
}

#[tokio::test(start_paused = true)]
async fn reset_closes_an_open_breaker() {
	let breaker = CircuitBreaker::new(1, Duration::from_secs(60));

	trip(&breaker).await;

	assert_eq!(breaker.state(), CircuitState::Open);

	breaker.reset();

	assert_eq!(breaker.state(), CircuitState::Closed);
	assert!(!breaker.is_open());
}
