use std::{
	fmt::{Display, Formatter},
	str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::Date;

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParsingMode {
	#[default]
	Regex,
	Llm,
}
impl ParsingMode {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Regex => "regex",
			Self::Llm => "llm",
		}
	}
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceIntent {
	Budget,
	Premium,
}
impl PriceIntent {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Budget => "budget",
			Self::Premium => "premium",
		}
	}
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DateType {
	Single,
	Range,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
	Neighborhood,
	Borough,
	City,
	NearMe,
}
impl LocationType {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Neighborhood => "neighborhood",
			Self::Borough => "borough",
			Self::City => "city",
			Self::NearMe => "near_me",
		}
	}
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AudienceHint {
	Kids,
	Adults,
}
impl AudienceHint {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Kids => "kids",
			Self::Adults => "adults",
		}
	}
}
impl FromStr for AudienceHint {
	type Err = ();

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"kids" | "kid" | "children" | "teens" | "teen" => Ok(Self::Kids),
			"adults" | "adult" => Ok(Self::Adults),
			_ => Err(()),
		}
	}
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillLevel {
	Beginner,
	Intermediate,
	Advanced,
}
impl SkillLevel {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Beginner => "beginner",
			Self::Intermediate => "intermediate",
			Self::Advanced => "advanced",
		}
	}

	/// Adjacent levels are one step apart on the beginner-intermediate-advanced ladder.
	pub fn is_adjacent(self, other: Self) -> bool {
		(self as i8 - other as i8).abs() == 1
	}
}
impl FromStr for SkillLevel {
	type Err = ();

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"beginner" => Ok(Self::Beginner),
			"intermediate" => Ok(Self::Intermediate),
			"advanced" => Ok(Self::Advanced),
			_ => Err(()),
		}
	}
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
	High,
	Medium,
	Low,
}
impl Urgency {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::High => "high",
			Self::Medium => "medium",
			Self::Low => "low",
		}
	}
}
impl FromStr for Urgency {
	type Err = ();

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"high" => Ok(Self::High),
			"medium" => Ok(Self::Medium),
			"low" => Ok(Self::Low),
			_ => Err(()),
		}
	}
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonType {
	Online,
	InPerson,
}
impl LessonType {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Online => "online",
			Self::InPerson => "in_person",
		}
	}
}

/// Wall-clock time of day, always rendered as 24h `HH:MM`.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ClockTime {
	hour: u8,
	minute: u8,
}
impl ClockTime {
	pub const MIDNIGHT: Self = Self { hour: 0, minute: 0 };
	pub const NOON: Self = Self { hour: 12, minute: 0 };

	pub fn new(hour: u8, minute: u8) -> Option<Self> {
		(hour < 24 && minute < 60).then_some(Self { hour, minute })
	}

	pub fn hour(self) -> u8 {
		self.hour
	}

	pub fn minute(self) -> u8 {
		self.minute
	}

	pub fn minutes_since_midnight(self) -> u32 {
		u32::from(self.hour) * 60 + u32::from(self.minute)
	}

	/// Accepts only `HH:MM` with hours 00-23 and minutes 00-59.
	pub fn parse_strict(raw: &str) -> Option<Self> {
		let bytes = raw.as_bytes();

		if bytes.len() != 5 || bytes[2] != b':' {
			return None;
		}
		if ![0, 1, 3, 4].iter().all(|idx| bytes[*idx].is_ascii_digit()) {
			return None;
		}

		let hour = (bytes[0] - b'0') * 10 + (bytes[1] - b'0');
		let minute = (bytes[3] - b'0') * 10 + (bytes[4] - b'0');

		Self::new(hour, minute)
	}
}
impl Display for ClockTime {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{:02}:{:02}", self.hour, self.minute)
	}
}
impl From<ClockTime> for time::Time {
	fn from(value: ClockTime) -> Self {
		time::Time::from_hms(value.hour, value.minute, 0).unwrap_or(time::Time::MIDNIGHT)
	}
}
impl From<time::Time> for ClockTime {
	fn from(value: time::Time) -> Self {
		Self { hour: value.hour(), minute: value.minute() }
	}
}
impl Serialize for ClockTime {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.collect_str(self)
	}
}
impl<'de> Deserialize<'de> for ClockTime {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = String::deserialize(deserializer)?;

		Self::parse_strict(&raw)
			.ok_or_else(|| serde::de::Error::custom(format!("invalid HH:MM time '{raw}'")))
	}
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ParsedQuery {
	pub original_query: String,
	pub corrected_query: String,
	pub service_query: String,

	pub max_price: Option<f64>,
	pub min_price: Option<f64>,
	pub price_intent: Option<PriceIntent>,

	#[serde(default, with = "crate::date_serde::option")]
	pub date: Option<Date>,
	#[serde(default, with = "crate::date_serde::option")]
	pub date_range_start: Option<Date>,
	#[serde(default, with = "crate::date_serde::option")]
	pub date_range_end: Option<Date>,
	pub date_type: Option<DateType>,

	pub time_after: Option<ClockTime>,
	pub time_before: Option<ClockTime>,
	pub time_window: Option<String>,

	pub location_text: Option<String>,
	pub location_type: Option<LocationType>,

	pub audience_hint: Option<AudienceHint>,
	pub skill_level: Option<SkillLevel>,
	pub urgency: Option<Urgency>,
	pub lesson_type: Option<LessonType>,
	pub duration_minutes: u32,

	pub category_hint: Option<String>,
	pub subcategory_hint: Option<String>,
	pub service_hint: Option<String>,

	pub needs_llm: bool,
	pub parsing_mode: ParsingMode,
	pub parsing_latency_ms: u64,
	pub confidence: f64,
}
impl ParsedQuery {
	/// First and last day the query asks about, if any date constraint exists.
	pub fn date_bounds(&self) -> Option<(Date, Date)> {
		match (self.date, self.date_range_start, self.date_range_end) {
			(_, Some(start), Some(end)) => Some((start, end.max(start))),
			(Some(date), _, _) => Some((date, date)),
			(None, Some(start), None) => Some((start, start)),
			(None, None, Some(end)) => Some((end, end)),
			(None, None, None) => None,
		}
	}

	pub fn has_time_constraint(&self) -> bool {
		self.time_after.is_some() || self.time_before.is_some()
	}

	pub fn is_urgent(&self) -> bool {
		self.urgency == Some(Urgency::High)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn clock_time_parse_strict_rejects_out_of_range_values() {
		assert_eq!(ClockTime::parse_strict("17:05"), ClockTime::new(17, 5));
		assert_eq!(ClockTime::parse_strict("00:00"), Some(ClockTime::MIDNIGHT));
		assert!(ClockTime::parse_strict("24:00").is_none());
		assert!(ClockTime::parse_strict("12:60").is_none());
		assert!(ClockTime::parse_strict("5:00").is_none());
		assert!(ClockTime::parse_strict("5pm").is_none());
		assert!(ClockTime::parse_strict(" 17:00").is_none());
	}

	#[test]
	fn skill_levels_know_their_neighbors() {
		assert!(SkillLevel::Beginner.is_adjacent(SkillLevel::Intermediate));
		assert!(SkillLevel::Advanced.is_adjacent(SkillLevel::Intermediate));
		assert!(!SkillLevel::Beginner.is_adjacent(SkillLevel::Advanced));
		assert!(!SkillLevel::Beginner.is_adjacent(SkillLevel::Beginner));
	}

	#[test]
	fn date_bounds_prefer_ranges() {
		let start = Date::from_calendar_date(2026, time::Month::October, 17).expect("Valid date.");
		let end = Date::from_calendar_date(2026, time::Month::October, 18).expect("Valid date.");
		let query = ParsedQuery {
			date_range_start: Some(start),
			date_range_end: Some(end),
			..ParsedQuery::default()
		};

		assert_eq!(query.date_bounds(), Some((start, end)));
		assert_eq!(ParsedQuery::default().date_bounds(), None);
	}

	#[test]
	fn parsed_query_serializes_dates_and_times_as_strings() {
		let query = ParsedQuery {
			date: Date::from_calendar_date(2026, time::Month::October, 17).ok(),
			time_after: ClockTime::new(17, 0),
			..ParsedQuery::default()
		};
		let json = serde_json::to_value(&query).expect("Serialize failed.");

		assert_eq!(json["date"], "2026-10-17");
		assert_eq!(json["time_after"], "17:00");
		assert_eq!(json["parsing_mode"], "regex");
	}
}
