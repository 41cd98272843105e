use std::{sync::Arc, time::Duration};

use serde_json::json;

use sift_domain::{ClockTime, ParseContext, ParsingMode};
use sift_service::{CircuitBreaker, CircuitState, FallbackReason, HybridParser, LlmMode, LlmParser};
use sift_testkit::{ScriptedLlm, ScriptedReply};

const AMBIGUOUS: &str = "piano or guitar lessons tomorrow";

fn hybrid(llm: Arc<ScriptedLlm>, breaker: Arc<CircuitBreaker>, mode: LlmMode) -> HybridParser {
	sift_testkit::init_tracing();

	let cfg = sift_testkit::sample_config().expect("Sample config must load.");
	let regex = sift_testkit::query_parser(&cfg).expect("Parser must build.");

	HybridParser::new(regex, LlmParser::new(llm, breaker, Duration::from_millis(2_000)), mode)
}

fn fresh_breaker() -> Arc<CircuitBreaker> {
	Arc::new(CircuitBreaker::new(2, Duration::from_secs(60)))
}

fn answer() -> serde_json::Value {
	json!({
		"service_query": "piano lessons",
		"max_price": 40,
		"min_price": null,
		"date": "2026-13-45",
		"date_range_start": null,
		"date_range_end": null,
		"time_after": "17:00",
		"time_before": "25:00",
		"location": null,
		"audience_hint": "kids",
		"skill_level": null,
		"urgency": null,
		"category_hint": "music",
		"subcategory_hint": null,
		"service_hint": "piano",
	})
}

#[tokio::test]
async fn valid_fields_merge_and_invalid_ones_keep_the_regex_value() {
	let llm = Arc::new(ScriptedLlm::always(ScriptedReply::Json(answer())));
	let parser = hybrid(llm.clone(), fresh_breaker(), LlmMode::Auto);
	let out = parser.parse(AMBIGUOUS, &ParseContext::default()).await;
	let parsed = &out.parsed;

	assert_eq!(llm.calls(), 1);
	assert!(out.diagnostics.enhanced);
	assert_eq!(parsed.parsing_mode, ParsingMode::Llm);
	assert!(!parsed.needs_llm);
	assert_eq!(parsed.service_query, "piano lessons");
	assert_eq!(parsed.max_price, Some(40.0));
	assert_eq!(parsed.date, Some(sift_testkit::day(17)));
	assert_eq!(parsed.time_after, ClockTime::new(17, 0));
	assert_eq!(parsed.time_before, None);
	assert_eq!(parsed.service_hint.as_deref(), Some("piano"));
	assert_eq!(out.diagnostics.invalid_llm_fields, vec!["date", "time_before"]);
}

#[tokio::test(start_paused = true)]
async fn a_hung_provider_times_out_to_the_regex_parse() {
	let llm = Arc::new(ScriptedLlm::delayed(ScriptedReply::Json(answer()), Duration::from_secs(30)));
	let breaker = fresh_breaker();
	let parser = hybrid(llm, breaker.clone(), LlmMode::Auto);
	let out = parser.parse(AMBIGUOUS, &ParseContext::default()).await;

	assert_eq!(out.diagnostics.fallback_reason, Some(FallbackReason::Timeout));
	assert_eq!(out.parsed.parsing_mode, ParsingMode::Regex);
	assert!(out.parsed.needs_llm);
	assert_eq!(out.parsed.date, Some(sift_testkit::day(17)));
	assert_eq!(breaker.snapshot().failures, 1);
}

#[tokio::test]
async fn refusals_fall_back_without_error() {
	let llm = Arc::new(ScriptedLlm::always(ScriptedReply::Refusal("not allowed".to_string())));
	let parser = hybrid(llm, fresh_breaker(), LlmMode::Auto);
	let out = parser.parse(AMBIGUOUS, &ParseContext::default()).await;

	assert_eq!(out.diagnostics.fallback_reason, Some(FallbackReason::Refusal));
	assert_eq!(out.parsed.parsing_mode, ParsingMode::Regex);
}

#[tokio::test]
async fn repeated_provider_errors_open_the_breaker_and_stop_calls() {
	let llm = Arc::new(ScriptedLlm::always(ScriptedReply::Http(503)));
	let breaker = fresh_breaker();
	let parser = hybrid(llm.clone(), breaker.clone(), LlmMode::Auto);
	let ctx = ParseContext::default();

	for _ in 0..2 {
		let out = parser.parse(AMBIGUOUS, &ctx).await;

		assert_eq!(out.diagnostics.fallback_reason, Some(FallbackReason::Provider));
	}

	assert_eq!(breaker.state(), CircuitState::Open);

	let out = parser.parse(AMBIGUOUS, &ctx).await;

	assert_eq!(out.diagnostics.fallback_reason, Some(FallbackReason::CircuitOpen));
	assert_eq!(llm.calls(), 2);
}

#[tokio::test]
async fn empty_answers_count_as_failures() {
	let llm = Arc::new(ScriptedLlm::always(ScriptedReply::Json(json!({ "service_query": "  " }))));
	let breaker = fresh_breaker();
	let parser = hybrid(llm, breaker.clone(), LlmMode::Auto);
	let out = parser.parse(AMBIGUOUS, &ParseContext::default()).await;

	assert_eq!(out.diagnostics.fallback_reason, Some(FallbackReason::EmptyParse));
	assert_eq!(breaker.snapshot().failures, 1);
}

#[tokio::test]
async fn clear_queries_skip_the_model_in_auto_mode() {
	let llm = Arc::new(ScriptedLlm::always(ScriptedReply::Json(answer())));
	let parser = hybrid(llm.clone(), fresh_breaker(), LlmMode::Auto);
	let out = parser.parse("piano lessons in brooklyn", &ParseContext::default()).await;

	assert_eq!(out.diagnostics.fallback_reason, Some(FallbackReason::NotNeeded));
	assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn mode_controls_when_the_model_is_asked() {
	let llm = Arc::new(ScriptedLlm::always(ScriptedReply::Json(answer())));
	let off = hybrid(llm.clone(), fresh_breaker(), LlmMode::Off);
	let out = off.parse(AMBIGUOUS, &ParseContext::default()).await;

	assert_eq!(out.diagnostics.fallback_reason, Some(FallbackReason::Disabled));
	assert_eq!(llm.calls(), 0);

	let always = hybrid(llm.clone(), fresh_breaker(), LlmMode::Always);
	let out = always.parse("piano lessons in brooklyn", &ParseContext::default()).await;

	assert!(out.diagnostics.enhanced);
	assert_eq!(llm.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn a_cancelled_call_is_neither_success_nor_failure() {
	let llm = Arc::new(ScriptedLlm::delayed(ScriptedReply::Json(answer()), Duration::from_secs(30)));
	let breaker = Arc::new(CircuitBreaker::new(1, Duration::from_secs(10)));
	let parser = hybrid(llm.clone(), breaker.clone(), LlmMode::Auto);
	let ctx = ParseContext::default();
	let cancelled =
		tokio::time::timeout(Duration::from_millis(100), parser.parse(AMBIGUOUS, &ctx)).await;

	assert!(cancelled.is_err());
	assert_eq!(breaker.snapshot().failures, 0);
	assert_eq!(breaker.state(), CircuitState::Closed);

	// Trip the breaker, let it cool down, and cancel the trial: the next call may still probe.
	let _ = breaker.call(async { Err::<(), _>("down") }).await;

	tokio::time::advance(Duration::from_secs(10)).await;

	let cancelled =
		tokio::time::timeout(Duration::from_millis(100), parser.parse(AMBIGUOUS, &ctx)).await;

	assert!(cancelled.is_err());
	assert_eq!(breaker.state(), CircuitState::HalfOpen);
	assert!(!breaker.is_open());
	assert_eq!(llm.calls(), 2);
}
