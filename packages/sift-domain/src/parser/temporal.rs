use std::ops::Range;

use regex::{Captures, Regex};
use time::{Date, Duration, Month, Weekday};

use crate::{
	Result,
	parser::Scan,
	query::{ClockTime, DateType, ParsedQuery},
};

const TIME: &str = r"(\d{1,2})(?::([0-5]\d))?\s*(a\.?m\.?|p\.?m\.?)?";
const MONTHS: &str = r"jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?";

struct NamedWindow {
	tag: &'static str,
	after: (u8, u8),
	before: (u8, u8),
}

const NIGHT: NamedWindow = NamedWindow { tag: "night", after: (18, 0), before: (22, 0) };

pub(super) struct TemporalPatterns {
	day_after_tomorrow: Regex,
	tomorrow: Regex,
	today: Regex,
	tonight: Regex,
	weekend: Regex,
	week: Regex,
	weekday: Regex,
	iso_date: Regex,
	slash_date: Regex,
	month_day: Regex,
	time_span: Regex,
	prefixed_time: Regex,
	noon: Regex,
	meridiem_time: Regex,
	window: Regex,
	non_time_suffix: Regex,
}
impl TemporalPatterns {
	pub(super) fn new() -> Result<Self> {
		Ok(Self {
			day_after_tomorrow: Regex::new(r"\b(?:the\s+)?day\s+after\s+tomorrow\b")?,
			tomorrow: Regex::new(r"\b(?:for\s+|by\s+)?(?:tomorrow|tmrw|tmr)\b")?,
			today: Regex::new(r"\b(?:for\s+|by\s+)?today\b")?,
			tonight: Regex::new(r"\b(?:for\s+)?tonight\b")?,
			weekend: Regex::new(r"\b(?:(this|next|on\s+the|over\s+the|the)\s+)?weekends?\b")?,
			week: Regex::new(r"\b(?:(this|next)\s+week)\b")?,
			weekday: Regex::new(
				r"\b(?:(this|next|on|coming|this\s+coming)\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday)s?\b",
			)?,
			iso_date: Regex::new(r"\b(?:on\s+)?(\d{4})-(\d{2})-(\d{2})\b")?,
			slash_date: Regex::new(r"\b(?:on\s+)?(\d{1,2})/(\d{1,2})(?:/(\d{2}|\d{4}))?\b")?,
			month_day: Regex::new(&format!(
				r"\b(?:on\s+)?({MONTHS})\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?\b"
			))?,
			time_span: Regex::new(&format!(
				r"\b(?:between|from)\s+{TIME}\s*(?:and|-|to|until|till)\s*{TIME}"
			))?,
			prefixed_time: Regex::new(&format!(
				r"\b(after|before|by|from|at|around|past|until|till|starting(?:\s+at)?|no\s+later\s+than|no\s+earlier\s+than)\s+{TIME}(?:\s*o'?clock)?"
			))?,
			noon: Regex::new(r"\b(after|before|by|at|around|until|from)\s+(noon|midday|midnight)\b")?,
			meridiem_time: Regex::new(r"\b(\d{1,2})(?::([0-5]\d))?\s*(a\.?m\.?|p\.?m\.?)(?:\s|$|[,.!?])")?,
			window: Regex::new(
				r"\b(?:(?:in|during)\s+the\s+|on\s+|this\s+)?(early\s+mornings?|mornings?|afternoons?|evenings?|nights?|after\s+school|after\s+work|lunch\s*time|lunch)\b",
			)?,
			non_time_suffix: Regex::new(
				r"^\s*-?\s*(?:years?|yrs?|yo\b|y/o|mins?\b|minutes?|hours?|hrs?\b|dollars|bucks|%|people|students|kids)",
			)?,
		})
	}

	pub(super) fn extract_dates(&self, scan: &mut Scan, out: &mut ParsedQuery, today: Date) {
		if let Some(range) = first_range(scan, &self.day_after_tomorrow) {
			scan.consume(range);
			set_single(out, today + Duration::days(2));

			return;
		}
		if let Some(range) = first_range(scan, &self.tomorrow) {
			scan.consume(range);
			set_single(out, today + Duration::days(1));

			return;
		}
		if let Some(range) = first_range(scan, &self.tonight) {
			scan.consume(range);
			set_single(out, today);
			apply_window(out, &NIGHT);

			return;
		}
		if let Some(range) = first_range(scan, &self.today) {
			scan.consume(range);
			set_single(out, today);

			return;
		}

		if let Some((range, next)) = scan.first_free(&self.weekend).and_then(|caps| {
			Some((caps.get(0)?.range(), caps.get(1).is_some_and(|m| m.as_str() == "next")))
		}) {
			scan.consume(range);

			let (saturday, sunday) = upcoming_weekend(today);
			let shift = if next { Duration::days(7) } else { Duration::ZERO };

			set_range(out, saturday + shift, sunday + shift);

			return;
		}
		if let Some((range, next)) = scan.first_free(&self.week).and_then(|caps| {
			Some((caps.get(0)?.range(), caps.get(1).is_some_and(|m| m.as_str() == "next")))
		}) {
			scan.consume(range);

			let days_to_sunday = 6 - i64::from(today.weekday().number_days_from_monday());
			let this_sunday = today + Duration::days(days_to_sunday);

			if next {
				set_range(out, this_sunday + Duration::days(1), this_sunday + Duration::days(7));
			} else {
				set_range(out, today, this_sunday);
			}

			return;
		}
		if let Some((range, modifier, weekday)) = scan.first_free(&self.weekday).and_then(|caps| {
			let weekday = parse_weekday(caps.get(2)?.as_str())?;
			let modifier = caps.get(1).map(|m| m.as_str().to_string());

			Some((caps.get(0)?.range(), modifier, weekday))
		}) {
			scan.consume(range);

			let date = if modifier.as_deref() == Some("next") {
				let days_to_next_monday =
					7 - i64::from(today.weekday().number_days_from_monday());
				let next_monday = today + Duration::days(days_to_next_monday);

				next_monday + Duration::days(i64::from(weekday.number_days_from_monday()))
			} else {
				next_occurrence(today, weekday)
			};

			set_single(out, date);

			return;
		}
		if let Some((range, date)) = scan.first_free(&self.iso_date).and_then(|caps| {
			let year = caps.get(1)?.as_str().parse::<i32>().ok()?;
			let month = parse_month_number(caps.get(2)?.as_str())?;
			let day = caps.get(3)?.as_str().parse::<u8>().ok()?;

			Some((caps.get(0)?.range(), Date::from_calendar_date(year, month, day).ok()?))
		}) {
			scan.consume(range);
			set_single(out, date);

			return;
		}
		if let Some((range, date)) = scan.first_free(&self.slash_date).and_then(|caps| {
			let month = parse_month_number(caps.get(1)?.as_str())?;
			let day = caps.get(2)?.as_str().parse::<u8>().ok()?;
			let year = caps.get(3).and_then(|m| parse_year(m.as_str()));

			Some((caps.get(0)?.range(), resolve_calendar_date(today, month, day, year)?))
		}) {
			scan.consume(range);
			set_single(out, date);

			return;
		}
		if let Some((range, date)) = scan.first_free(&self.month_day).and_then(|caps| {
			let month = parse_month_name(caps.get(1)?.as_str())?;
			let day = caps.get(2)?.as_str().parse::<u8>().ok()?;

			Some((caps.get(0)?.range(), resolve_calendar_date(today, month, day, None)?))
		}) {
			scan.consume(range);
			set_single(out, date);
		}
	}

	pub(super) fn extract_times(&self, scan: &mut Scan, out: &mut ParsedQuery) {
		if let Some((range, window)) = scan.first_free(&self.window).and_then(|caps| {
			Some((caps.get(0)?.range(), named_window(caps.get(1)?.as_str())?))
		}) {
			scan.consume(range);
			apply_window(out, &window);
		}

		if let Some((range, after, before)) = scan.first_free(&self.time_span).and_then(|caps| {
			let end_meridiem = caps.get(6).map(|m| m.as_str());
			let start_meridiem = caps.get(3).map(|m| m.as_str()).or(end_meridiem);
			let after = resolve_clock(&caps, 1, 2, start_meridiem)?;
			let before = resolve_clock(&caps, 4, 5, end_meridiem)?;

			Some((caps.get(0)?.range(), after, before))
		}) {
			scan.consume(range);
			out.time_after = Some(after);
			out.time_before = Some(before);

			return;
		}

		let found: Vec<(Range<usize>, String, ClockTime)> = scan
			.all_free(&self.prefixed_time)
			.filter_map(|caps| {
				let whole = caps.get(0)?;
				let meridiem = caps.get(4).map(|m| m.as_str());

				if meridiem.is_none()
					&& caps.get(3).is_none()
					&& self.non_time_suffix.is_match(&scan.text[whole.end()..])
				{
					return None;
				}

				let clock = resolve_clock(&caps, 2, 3, meridiem)?;

				Some((whole.range(), caps.get(1)?.as_str().to_string(), clock))
			})
			.collect();

		for (range, preposition, clock) in found {
			scan.consume(range);
			apply_prefixed(out, &preposition, clock);
		}

		let found: Vec<(Range<usize>, String, ClockTime)> = scan
			.all_free(&self.noon)
			.filter_map(|caps| {
				let clock = match caps.get(2)?.as_str() {
					"midnight" => ClockTime::MIDNIGHT,
					_ => ClockTime::NOON,
				};

				Some((caps.get(0)?.range(), caps.get(1)?.as_str().to_string(), clock))
			})
			.collect();

		for (range, preposition, clock) in found {
			scan.consume(range);
			apply_prefixed(out, &preposition, clock);
		}

		if out.time_after.is_none()
			&& out.time_before.is_none()
			&& let Some((range, clock)) = scan.first_free(&self.meridiem_time).and_then(|caps| {
				let meridiem = caps.get(3).map(|m| m.as_str());

				Some((caps.get(0)?.range(), resolve_clock(&caps, 1, 2, meridiem)?))
			}) {
			scan.consume(range);
			out.time_after = Some(clock);
		}
	}
}

fn first_range(scan: &Scan, re: &Regex) -> Option<Range<usize>> {
	scan.first_free(re).and_then(|caps| caps.get(0)).map(|m| m.range())
}

fn set_single(out: &mut ParsedQuery, date: Date) {
	out.date = Some(date);
	out.date_range_start = None;
	out.date_range_end = None;
	out.date_type = Some(DateType::Single);
}

fn set_range(out: &mut ParsedQuery, start: Date, end: Date) {
	out.date = None;
	out.date_range_start = Some(start);
	out.date_range_end = Some(end);
	out.date_type = Some(DateType::Range);
}

/// Saturday and Sunday of the current weekend; on Sunday only Sunday remains.
fn upcoming_weekend(today: Date) -> (Date, Date) {
	match today.weekday() {
		Weekday::Saturday => (today, today + Duration::days(1)),
		Weekday::Sunday => (today, today),
		_ => {
			let saturday = next_occurrence(today, Weekday::Saturday);

			(saturday, saturday + Duration::days(1))
		},
	}
}

/// `weekday` on or after `today`.
fn next_occurrence(today: Date, weekday: Weekday) -> Date {
	let from = i64::from(today.weekday().number_days_from_monday());
	let to = i64::from(weekday.number_days_from_monday());

	today + Duration::days((to - from).rem_euclid(7))
}

fn parse_weekday(raw: &str) -> Option<Weekday> {
	match raw {
		"monday" => Some(Weekday::Monday),
		"tuesday" => Some(Weekday::Tuesday),
		"wednesday" => Some(Weekday::Wednesday),
		"thursday" => Some(Weekday::Thursday),
		"friday" => Some(Weekday::Friday),
		"saturday" => Some(Weekday::Saturday),
		"sunday" => Some(Weekday::Sunday),
		_ => None,
	}
}

fn parse_month_number(raw: &str) -> Option<Month> {
	raw.parse::<u8>().ok().and_then(|number| Month::try_from(number).ok())
}

fn parse_month_name(raw: &str) -> Option<Month> {
	let month = match raw.get(..3)? {
		"jan" => Month::January,
		"feb" => Month::February,
		"mar" => Month::March,
		"apr" => Month::April,
		"may" => Month::May,
		"jun" => Month::June,
		"jul" => Month::July,
		"aug" => Month::August,
		"sep" => Month::September,
		"oct" => Month::October,
		"nov" => Month::November,
		"dec" => Month::December,
		_ => return None,
	};

	Some(month)
}

fn parse_year(raw: &str) -> Option<i32> {
	let year = raw.parse::<i32>().ok()?;

	Some(if raw.len() == 2 { 2000 + year } else { year })
}

/// Month/day without a year means the next such day on or after today.
fn resolve_calendar_date(today: Date, month: Month, day: u8, year: Option<i32>) -> Option<Date> {
	if let Some(year) = year {
		return Date::from_calendar_date(year, month, day).ok();
	}

	let this_year = Date::from_calendar_date(today.year(), month, day).ok();

	match this_year {
		Some(date) if date >= today => Some(date),
		_ => Date::from_calendar_date(today.year() + 1, month, day).ok(),
	}
}

fn resolve_clock(
	caps: &Captures<'_>,
	hour_group: usize,
	minute_group: usize,
	meridiem: Option<&str>,
) -> Option<ClockTime> {
	let hour = caps.get(hour_group)?.as_str().parse::<u8>().ok()?;
	let minute = match caps.get(minute_group) {
		Some(m) => m.as_str().parse::<u8>().ok()?,
		None => 0,
	};
	let hour = match meridiem.map(|raw| raw.starts_with('p')) {
		Some(true) if (1..12).contains(&hour) => hour + 12,
		Some(true) if hour == 12 => 12,
		Some(false) if hour == 12 => 0,
		Some(false) if (1..12).contains(&hour) => hour,
		Some(_) => return None,
		// Bare afternoon hours are far more common than 1-6am lessons.
		None if (1..=6).contains(&hour) => hour + 12,
		None => hour,
	};

	ClockTime::new(hour, minute)
}

fn apply_prefixed(out: &mut ParsedQuery, preposition: &str, clock: ClockTime) {
	let normalized = preposition.split_whitespace().collect::<Vec<_>>().join(" ");

	match normalized.as_str() {
		"before" | "by" | "until" | "till" | "no later than" => out.time_before = Some(clock),
		_ => out.time_after = Some(clock),
	}
}

fn named_window(raw: &str) -> Option<NamedWindow> {
	let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
	let normalized = normalized.trim_end_matches('s');
	let window = match normalized {
		"early morning" =>
			NamedWindow { tag: "early_morning", after: (6, 0), before: (9, 0) },
		"morning" => NamedWindow { tag: "morning", after: (6, 0), before: (12, 0) },
		"afternoon" => NamedWindow { tag: "afternoon", after: (12, 0), before: (17, 0) },
		"evening" => NamedWindow { tag: "evening", after: (17, 0), before: (21, 0) },
		"night" => NIGHT,
		"after school" => NamedWindow { tag: "after_school", after: (15, 0), before: (18, 0) },
		"after work" => NamedWindow { tag: "after_work", after: (17, 0), before: (21, 0) },
		"lunch" | "lunchtime" | "lunch time" =>
			NamedWindow { tag: "lunch", after: (11, 30), before: (13, 30) },
		_ => return None,
	};

	Some(window)
}

fn apply_window(out: &mut ParsedQuery, window: &NamedWindow) {
	out.time_window = Some(window.tag.to_string());
	out.time_after = ClockTime::new(window.after.0, window.after.1);
	out.time_before = ClockTime::new(window.before.0, window.before.1);
}

#[cfg(test)]
mod tests {
	use super::*;

	fn date(year: i32, month: Month, day: u8) -> Date {
		Date::from_calendar_date(year, month, day).expect("Valid date.")
	}

	#[test]
	fn upcoming_weekend_from_a_weekday() {
		// 2026-10-16 is a Friday.
		let (saturday, sunday) = upcoming_weekend(date(2026, Month::October, 16));

		assert_eq!(saturday, date(2026, Month::October, 17));
		assert_eq!(sunday, date(2026, Month::October, 18));
	}

	#[test]
	fn upcoming_weekend_on_sunday_is_just_today() {
		let sunday = date(2026, Month::October, 18);

		assert_eq!(upcoming_weekend(sunday), (sunday, sunday));
	}

	#[test]
	fn next_occurrence_includes_today() {
		let friday = date(2026, Month::October, 16);

		assert_eq!(next_occurrence(friday, Weekday::Friday), friday);
		assert_eq!(next_occurrence(friday, Weekday::Monday), date(2026, Month::October, 19));
	}

	#[test]
	fn calendar_dates_in_the_past_roll_to_next_year() {
		let today = date(2026, Month::October, 16);

		assert_eq!(
			resolve_calendar_date(today, Month::March, 3, None),
			Some(date(2027, Month::March, 3))
		);
		assert_eq!(
			resolve_calendar_date(today, Month::October, 20, None),
			Some(date(2026, Month::October, 20))
		);
		assert_eq!(resolve_calendar_date(today, Month::February, 30, Some(2027)), None);
	}

	#[test]
	fn window_names_accept_plurals() {
		let window = named_window("evenings").expect("Expected evening window.");

		assert_eq!(window.tag, "evening");
		assert_eq!(window.after, (17, 0));
	}
}
