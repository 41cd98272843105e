mod output;

use std::{
	sync::{Arc, LazyLock},
	time::{Duration, Instant},
};

use serde::Serialize;
use serde_json::{Value, json};
use time::OffsetDateTime;

use crate::{
	LlmProvider,
	breaker::{BreakerError, CircuitBreaker},
};
use output::LlmOutput;
use sift_domain::{ParsedQuery, date_serde};
use sift_providers::chat::JsonSchema;

const SCHEMA_NAME: &str = "parsed_search_query";
const SCHEMA_FIELDS: [&str; 15] = [
	"service_query",
	"max_price",
	"min_price",
	"date",
	"date_range_start",
	"date_range_end",
	"time_after",
	"time_before",
	"location",
	"audience_hint",
	"skill_level",
	"urgency",
	"category_hint",
	"subcategory_hint",
	"service_hint",
];

static OUTPUT_SCHEMA: LazyLock<Value> = LazyLock::new(build_output_schema);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
	/// Hybrid mode is `off`.
	Disabled,
	NotNeeded,
	CircuitOpen,
	Timeout,
	Provider,
	Refusal,
	EmptyParse,
}
impl FallbackReason {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Disabled => "disabled",
			Self::NotNeeded => "not_needed",
			Self::CircuitOpen => "circuit_open",
			Self::Timeout => "timeout",
			Self::Provider => "provider",
			Self::Refusal => "refusal",
			Self::EmptyParse => "empty_parse",
		}
	}
}

/// Every path yields a usable parse; the variant says which one was taken.
#[derive(Clone, Debug, PartialEq)]
pub enum LlmOutcome {
	Enhanced { parsed: ParsedQuery, invalid_fields: Vec<&'static str> },
	Fallback { parsed: ParsedQuery, reason: FallbackReason },
}
impl LlmOutcome {
	pub fn parsed(&self) -> &ParsedQuery {
		match self {
			Self::Enhanced { parsed, .. } | Self::Fallback { parsed, .. } => parsed,
		}
	}

	pub fn into_parsed(self) -> ParsedQuery {
		match self {
			Self::Enhanced { parsed, .. } | Self::Fallback { parsed, .. } => parsed,
		}
	}

	pub fn fallback_reason(&self) -> Option<FallbackReason> {
		match self {
			Self::Enhanced { .. } => None,
			Self::Fallback { reason, .. } => Some(*reason),
		}
	}
}

#[derive(Debug)]
enum CallError {
	Timeout,
	Provider(sift_providers::Error),
	EmptyParse,
}

pub struct LlmParser {
	provider: Arc<dyn LlmProvider>,
	breaker: Arc<CircuitBreaker>,
	timeout: Duration,
}
impl LlmParser {
	pub fn new(provider: Arc<dyn LlmProvider>, breaker: Arc<CircuitBreaker>, timeout: Duration) -> Self {
		Self { provider, breaker, timeout }
	}

	pub fn breaker(&self) -> &CircuitBreaker {
		&self.breaker
	}

	/// Enhances `regex` only when the rule-based parse flagged itself as ambiguous.
	pub async fn enhance(&self, regex: ParsedQuery, local_now: OffsetDateTime) -> LlmOutcome {
		if !regex.needs_llm {
			return LlmOutcome::Fallback { parsed: regex, reason: FallbackReason::NotNeeded };
		}

		self.enhance_unconditionally(regex, local_now).await
	}

	pub async fn enhance_unconditionally(
		&self,
		regex: ParsedQuery,
		local_now: OffsetDateTime,
	) -> LlmOutcome {
		if self.breaker.is_open() {
			tracing::info!("LLM parse skipped because the circuit breaker is open.");

			return LlmOutcome::Fallback { parsed: regex, reason: FallbackReason::CircuitOpen };
		}

		let messages = build_messages(&regex.original_query, local_now);
		let schema = JsonSchema { name: SCHEMA_NAME, schema: &OUTPUT_SCHEMA };
		let started = Instant::now();
		let result = self
			.breaker
			.call(async {
				let pending = self.provider.complete_json(&messages, schema);
				let value = tokio::time::timeout(self.timeout, pending)
					.await
					.map_err(|_| CallError::Timeout)?
					.map_err(|err| match err {
						sift_providers::Error::EmptyContent
						| sift_providers::Error::SerdeJson(_)
						| sift_providers::Error::InvalidResponse { .. } => CallError::EmptyParse,
						err if err.is_timeout() => CallError::Timeout,
						err => CallError::Provider(err),
					})?;

				LlmOutput::from_value(&value).ok_or(CallError::EmptyParse)
			})
			.await;
		let elapsed_ms = started.elapsed().as_millis() as u64;

		match result {
			Ok(output) => {
				let invalid_fields = output.invalid_fields();

				if !invalid_fields.is_empty() {
					tracing::warn!(fields = ?invalid_fields, "Discarded invalid LLM parse fields.");
				}

				LlmOutcome::Enhanced { parsed: output.merge(&regex, elapsed_ms), invalid_fields }
			},
			Err(BreakerError::Open) =>
				LlmOutcome::Fallback { parsed: regex, reason: FallbackReason::CircuitOpen },
			Err(BreakerError::Inner(CallError::Timeout)) => {
				tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "LLM parse timed out.");

				let mut parsed = regex;

				parsed.parsing_latency_ms = parsed.parsing_latency_ms.saturating_add(elapsed_ms);

				LlmOutcome::Fallback { parsed, reason: FallbackReason::Timeout }
			},
			Err(BreakerError::Inner(CallError::EmptyParse)) => {
				tracing::warn!("LLM parse returned no usable content.");

				LlmOutcome::Fallback { parsed: regex, reason: FallbackReason::EmptyParse }
			},
			Err(BreakerError::Inner(CallError::Provider(sift_providers::Error::Refusal {
				message,
			}))) => {
				tracing::warn!(refusal = %message, "LLM refused to parse the query.");

				LlmOutcome::Fallback { parsed: regex, reason: FallbackReason::Refusal }
			},
			Err(BreakerError::Inner(CallError::Provider(err))) => {
				tracing::warn!(error = %err, "LLM parse failed.");

				LlmOutcome::Fallback { parsed: regex, reason: FallbackReason::Provider }
			},
		}
	}
}

pub fn output_schema() -> &'static Value {
	&OUTPUT_SCHEMA
}

fn build_output_schema() -> Value {
	let nullable_string = json!({ "type": ["string", "null"] });
	let nullable_number = json!({ "type": ["number", "null"] });
	let mut properties = serde_json::Map::new();

	for field in SCHEMA_FIELDS {
		let schema = match field {
			"service_query" => json!({ "type": "string" }),
			"max_price" | "min_price" => nullable_number.clone(),
			"audience_hint" => json!({ "type": ["string", "null"], "enum": ["kids", "adults", null] }),
			"skill_level" => json!({
				"type": ["string", "null"],
				"enum": ["beginner", "intermediate", "advanced", null],
			}),
			"urgency" => json!({ "type": ["string", "null"], "enum": ["high", "medium", "low", null] }),
			_ => nullable_string.clone(),
		};

		properties.insert(field.to_string(), schema);
	}

	json!({
		"type": "object",
		"properties": properties,
		"required": SCHEMA_FIELDS,
		"additionalProperties": false,
	})
}

fn build_messages(query: &str, local_now: OffsetDateTime) -> Vec<Value> {
	let today = date_serde::format_iso_date(local_now.date());
	let weekday = local_now.weekday();
	let system = format!(
		"You extract search constraints from a student's request for lessons.\n\
		Today is {weekday}, {today}. Resolve relative dates against today.\n\
		Return one JSON object with exactly these fields, using null when the request does not say:\n\
		- service_query: the lesson or service being searched for, spelling corrected, without price, time, or place words.\n\
		- max_price, min_price: hourly price bounds in dollars.\n\
		- date: a single day as YYYY-MM-DD.\n\
		- date_range_start, date_range_end: an inclusive day range as YYYY-MM-DD.\n\
		- time_after, time_before: 24-hour HH:MM bounds.\n\
		- location: the neighborhood, borough, or city named in the request.\n\
		- audience_hint: kids or adults.\n\
		- skill_level: beginner, intermediate, or advanced.\n\
		- urgency: high, medium, or low.\n\
		- category_hint, subcategory_hint, service_hint: the lesson category, subcategory, and specific service.\n\
		When the request lists alternatives, keep all of them in service_query. \
		When it excludes something, leave the excluded thing out of service_query."
	);

	vec![json!({ "role": "system", "content": system }), json!({ "role": "user", "content": query })]
}

#[cfg(test)]
mod tests {
	use time::macros::datetime;

	use super::*;

	#[test]
	fn schema_requires_every_field_and_forbids_extras() {
		let schema = output_schema();
		let required = schema["required"].as_array().expect("Expected required list.");

		assert_eq!(required.len(), SCHEMA_FIELDS.len());
		assert_eq!(schema["additionalProperties"], false);
		assert_eq!(schema["properties"]["service_query"]["type"], "string");
	}

	#[test]
	fn prompt_carries_the_local_date_and_weekday() {
		let messages = build_messages("piano or guitar", datetime!(2026-10-16 10:00 UTC));
		let system = messages[0]["content"].as_str().expect("Expected system prompt.");

		assert!(system.contains("Today is Friday, 2026-10-16."));
		assert_eq!(messages[1]["content"], "piano or guitar");
	}
}
