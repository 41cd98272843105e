use serde_json::{Map, Value};
use time::Date;

use sift_domain::{
	AudienceHint, ClockTime, DateType, ParsedQuery, ParsingMode, SkillLevel, Urgency,
	date_serde,
};

pub(crate) const LLM_CONFIDENCE: f64 = 0.95;

/// One field of the model's answer. `Invalid` keeps the regex value, same as `Missing`, but is
/// reported separately.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Field<T> {
	Missing,
	Invalid,
	Value(T),
}
impl<T> Field<T> {
	fn or(self, fallback: Option<T>) -> Option<T> {
		match self {
			Self::Value(value) => Some(value),
			Self::Missing | Self::Invalid => fallback,
		}
	}

	fn is_invalid(&self) -> bool {
		matches!(self, Self::Invalid)
	}
}

/// The structured answer, validated field by field.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct LlmOutput {
	pub(crate) service_query: Option<String>,
	pub(crate) max_price: Field<f64>,
	pub(crate) min_price: Field<f64>,
	pub(crate) date: Field<Date>,
	pub(crate) date_range_start: Field<Date>,
	pub(crate) date_range_end: Field<Date>,
	pub(crate) time_after: Field<ClockTime>,
	pub(crate) time_before: Field<ClockTime>,
	pub(crate) location: Field<String>,
	pub(crate) audience_hint: Field<AudienceHint>,
	pub(crate) skill_level: Field<SkillLevel>,
	pub(crate) urgency: Field<Urgency>,
	pub(crate) category_hint: Field<String>,
	pub(crate) subcategory_hint: Field<String>,
	pub(crate) service_hint: Field<String>,
}
impl LlmOutput {
	/// `None` when the answer is not an object or carries no usable service query.
	pub(crate) fn from_value(value: &Value) -> Option<Self> {
		let obj = value.as_object()?;
		let service_query = text(obj, "service_query").or(None)?;

		Some(Self {
			service_query: Some(service_query),
			max_price: price(obj, "max_price"),
			min_price: price(obj, "min_price"),
			date: date(obj, "date"),
			date_range_start: date(obj, "date_range_start"),
			date_range_end: date(obj, "date_range_end"),
			time_after: clock(obj, "time_after"),
			time_before: clock(obj, "time_before"),
			location: text(obj, "location"),
			audience_hint: parsed(obj, "audience_hint"),
			skill_level: parsed(obj, "skill_level"),
			urgency: parsed(obj, "urgency"),
			category_hint: text(obj, "category_hint"),
			subcategory_hint: text(obj, "subcategory_hint"),
			service_hint: text(obj, "service_hint"),
		})
	}

	pub(crate) fn invalid_fields(&self) -> Vec<&'static str> {
		[
			("max_price", self.max_price.is_invalid()),
			("min_price", self.min_price.is_invalid()),
			("date", self.date.is_invalid()),
			("date_range_start", self.date_range_start.is_invalid()),
			("date_range_end", self.date_range_end.is_invalid()),
			("time_after", self.time_after.is_invalid()),
			("time_before", self.time_before.is_invalid()),
			("audience_hint", self.audience_hint.is_invalid()),
			("skill_level", self.skill_level.is_invalid()),
			("urgency", self.urgency.is_invalid()),
		]
		.into_iter()
		.filter_map(|(name, invalid)| invalid.then_some(name))
		.collect()
	}

	/// Field-level merge over the regex parse. Fields the model cannot see (price intent, time
	/// window, location type, lesson type, duration) always come from `regex`.
	pub(crate) fn merge(self, regex: &ParsedQuery, llm_latency_ms: u64) -> ParsedQuery {
		let mut merged = regex.clone();

		if let Some(service_query) = self.service_query {
			merged.service_query = service_query;
		}

		merged.max_price = self.max_price.or(regex.max_price);
		merged.min_price = self.min_price.or(regex.min_price);
		// Date and range replace the regex dates as one unit, so bounds never mix sources.
		match (self.date_range_start, self.date_range_end, self.date) {
			(Field::Value(start), Field::Value(end), _) => {
				merged.date = None;
				merged.date_range_start = Some(start.min(end));
				merged.date_range_end = Some(start.max(end));
				merged.date_type = Some(DateType::Range);
			},
			(_, _, Field::Value(date)) => {
				merged.date = Some(date);
				merged.date_range_start = None;
				merged.date_range_end = None;
				merged.date_type = Some(DateType::Single);
			},
			_ => {},
		}
		merged.time_after = self.time_after.or(regex.time_after);
		merged.time_before = self.time_before.or(regex.time_before);
		merged.location_text = self.location.or(regex.location_text.clone());
		merged.audience_hint = self.audience_hint.or(regex.audience_hint);
		merged.skill_level = self.skill_level.or(regex.skill_level);
		merged.urgency = self.urgency.or(regex.urgency);
		merged.category_hint = self.category_hint.or(regex.category_hint.clone());
		merged.subcategory_hint = self.subcategory_hint.or(regex.subcategory_hint.clone());
		merged.service_hint = self.service_hint.or(regex.service_hint.clone());

		merged.price_intent = regex.price_intent;
		merged.time_window = regex.time_window.clone();
		merged.location_type = regex.location_type;
		merged.needs_llm = false;
		merged.parsing_mode = ParsingMode::Llm;
		merged.parsing_latency_ms = regex.parsing_latency_ms.saturating_add(llm_latency_ms);
		merged.confidence = LLM_CONFIDENCE;

		merged
	}
}

fn raw<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
	obj.get(key).filter(|value| !value.is_null())
}

fn text(obj: &Map<String, Value>, key: &str) -> Field<String> {
	match raw(obj, key) {
		None => Field::Missing,
		Some(Value::String(value)) => {
			let value = value.split_whitespace().collect::<Vec<_>>().join(" ");

			if value.is_empty() { Field::Missing } else { Field::Value(value) }
		},
		Some(_) => Field::Invalid,
	}
}

fn price(obj: &Map<String, Value>, key: &str) -> Field<f64> {
	let Some(value) = raw(obj, key) else { return Field::Missing };
	let amount = match value {
		Value::Number(number) => number.as_f64(),
		Value::String(raw) => raw.trim().trim_start_matches('$').parse::<f64>().ok(),
		_ => None,
	};

	match amount {
		Some(amount) if amount.is_finite() && amount >= 0.0 => Field::Value(amount),
		_ => Field::Invalid,
	}
}

fn date(obj: &Map<String, Value>, key: &str) -> Field<Date> {
	match raw(obj, key) {
		None => Field::Missing,
		Some(Value::String(value)) =>
			date_serde::parse_iso_date(value).map_or(Field::Invalid, Field::Value),
		Some(_) => Field::Invalid,
	}
}

fn clock(obj: &Map<String, Value>, key: &str) -> Field<ClockTime> {
	match raw(obj, key) {
		None => Field::Missing,
		Some(Value::String(value)) =>
			ClockTime::parse_strict(value.trim()).map_or(Field::Invalid, Field::Value),
		Some(_) => Field::Invalid,
	}
}

fn parsed<T>(obj: &Map<String, Value>, key: &str) -> Field<T>
where
	T: std::str::FromStr,
{
	match raw(obj, key) {
		None => Field::Missing,
		Some(Value::String(value)) => value.parse::<T>().map_or(Field::Invalid, Field::Value),
		Some(_) => Field::Invalid,
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;
	use time::Month;

	use super::*;

	fn regex_parse() -> ParsedQuery {
		ParsedQuery {
			original_query: "piano or guitr lessons tomorrow".to_string(),
			corrected_query: "piano or guitr lessons tomorrow".to_string(),
			service_query: "piano or guitr lessons".to_string(),
			date: Date::from_calendar_date(2026, Month::October, 17).ok(),
			date_type: Some(DateType::Single),
			time_window: Some("evening".to_string()),
			time_after: ClockTime::new(17, 0),
			time_before: ClockTime::new(21, 0),
			needs_llm: true,
			parsing_latency_ms: 3,
			confidence: 0.6,
			..ParsedQuery::default()
		}
	}

	#[test]
	fn invalid_date_keeps_the_regex_date() {
		let output = LlmOutput::from_value(&json!({
			"service_query": "guitar lessons",
			"date": "tomorrow",
			"time_after": "5pm",
		}))
		.expect("Expected a usable answer.");

		assert_eq!(output.invalid_fields(), vec!["date", "time_after"]);

		let merged = output.merge(&regex_parse(), 40);

		assert_eq!(merged.service_query, "guitar lessons");
		assert_eq!(merged.date, Date::from_calendar_date(2026, Month::October, 17).ok());
		assert_eq!(merged.time_after, ClockTime::new(17, 0));
		assert!(!merged.needs_llm);
		assert_eq!(merged.parsing_mode, ParsingMode::Llm);
		assert_eq!(merged.parsing_latency_ms, 43);
		assert_eq!(merged.confidence, LLM_CONFIDENCE);
	}

	#[test]
	fn valid_fields_override_and_regex_only_fields_carry_over() {
		let output = LlmOutput::from_value(&json!({
			"service_query": "guitar lessons",
			"max_price": 45,
			"date_range_start": "2026-10-17",
			"date_range_end": "2026-10-18",
			"time_after": "18:30",
			"location": "Park Slope",
			"audience_hint": "kids",
			"skill_level": "nonsense",
		}))
		.expect("Expected a usable answer.");
		let merged = output.merge(&regex_parse(), 0);

		assert_eq!(merged.max_price, Some(45.0));
		assert_eq!(merged.date_type, Some(DateType::Range));
		assert_eq!(merged.date, None);
		assert_eq!(merged.time_after, ClockTime::new(18, 30));
		assert_eq!(merged.time_before, ClockTime::new(21, 0));
		assert_eq!(merged.time_window.as_deref(), Some("evening"));
		assert_eq!(merged.location_text.as_deref(), Some("Park Slope"));
		assert_eq!(merged.audience_hint, Some(AudienceHint::Kids));
		assert_eq!(merged.skill_level, None);
	}

	#[test]
	fn a_single_llm_date_replaces_a_regex_range() {
		let regex = ParsedQuery {
			date: None,
			date_range_start: Date::from_calendar_date(2026, Month::October, 17).ok(),
			date_range_end: Date::from_calendar_date(2026, Month::October, 18).ok(),
			date_type: Some(DateType::Range),
			..regex_parse()
		};
		let output = LlmOutput::from_value(&json!({
			"service_query": "guitar lessons",
			"date": "2026-10-20",
		}))
		.expect("Expected a usable answer.");
		let merged = output.merge(&regex, 0);
		let day = Date::from_calendar_date(2026, Month::October, 20).expect("Valid date.");

		assert_eq!(merged.date, Some(day));
		assert_eq!((merged.date_range_start, merged.date_range_end), (None, None));
		assert_eq!(merged.date_type, Some(DateType::Single));
		assert_eq!(merged.date_bounds(), Some((day, day)));
	}

	#[test]
	fn an_llm_range_replaces_a_regex_date_and_a_partial_range_is_ignored() {
		let output = LlmOutput::from_value(&json!({
			"service_query": "guitar lessons",
			"date_range_start": "2026-10-24",
			"date_range_end": "2026-10-25",
		}))
		.expect("Expected a usable answer.");
		let merged = output.merge(&regex_parse(), 0);
		let start = Date::from_calendar_date(2026, Month::October, 24).expect("Valid date.");
		let end = Date::from_calendar_date(2026, Month::October, 25).expect("Valid date.");

		assert_eq!(merged.date, None);
		assert_eq!(merged.date_type, Some(DateType::Range));
		assert_eq!(merged.date_bounds(), Some((start, end)));

		let output = LlmOutput::from_value(&json!({
			"service_query": "guitar lessons",
			"date_range_start": "2026-10-24",
		}))
		.expect("Expected a usable answer.");
		let merged = output.merge(&regex_parse(), 0);

		assert_eq!(merged.date, Date::from_calendar_date(2026, Month::October, 17).ok());
		assert_eq!((merged.date_range_start, merged.date_range_end), (None, None));
		assert_eq!(merged.date_type, Some(DateType::Single));
	}

	#[test]
	fn answers_without_service_query_are_unusable() {
		assert!(LlmOutput::from_value(&json!({ "service_query": "  " })).is_none());
		assert!(LlmOutput::from_value(&json!({ "max_price": 50 })).is_none());
		assert!(LlmOutput::from_value(&json!(["guitar"])).is_none());
	}

	#[test]
	fn negative_prices_are_invalid() {
		let output = LlmOutput::from_value(&json!({ "service_query": "yoga", "max_price": -5 }))
			.expect("Expected a usable answer.");

		assert_eq!(output.max_price, Field::Invalid);
	}
}
