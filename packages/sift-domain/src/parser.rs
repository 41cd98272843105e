mod hints;
mod location;
mod price;
mod temporal;

use std::{collections::HashMap, ops::Range, sync::Arc, time::Instant};

use regex::{Captures, Regex};
use time::{Date, OffsetDateTime, UtcOffset};

use crate::{
	Result,
	clock::{Clock, ParseContext, TimezoneLookup},
	query::{ParsedQuery, ParsingMode},
	reference::ReferenceData,
};

const CONFIDENCE_CLEAR: f64 = 0.9;
const CONFIDENCE_AMBIGUOUS: f64 = 0.6;
const FILLER_WORDS: &[&str] = &[
	"a", "an", "and", "any", "are", "around", "at", "book", "by", "can", "find", "for", "get",
	"i", "i'm", "im", "in", "is", "like", "look", "looking", "me", "my", "near", "need", "of",
	"on", "our", "please", "search", "show", "some", "that", "the", "to", "under", "want",
	"wanna", "who", "with", "would",
];

#[derive(Clone, Debug)]
pub struct ParserSettings {
	pub default_region: String,
	pub region_offsets: HashMap<String, UtcOffset>,
	pub default_duration_minutes: u32,
}
impl ParserSettings {
	pub fn from_config(cfg: &sift_config::Parser) -> Result<Self> {
		let mut region_offsets = HashMap::with_capacity(cfg.region_utc_offsets_minutes.len());

		for (region, minutes) in &cfg.region_utc_offsets_minutes {
			let offset = UtcOffset::from_whole_seconds(minutes * 60)
				.map_err(|err| crate::Error::InvalidOffset { region: region.clone(), source: err })?;

			region_offsets.insert(region.to_ascii_lowercase(), offset);
		}

		Ok(Self {
			default_region: cfg.default_region.to_ascii_lowercase(),
			region_offsets,
			default_duration_minutes: cfg.default_duration_minutes,
		})
	}
}

/// Rule-based constraint extraction. Pure: no I/O, never fails on input text.
pub struct QueryParser {
	settings: ParserSettings,
	reference: ReferenceData,
	timezones: Arc<dyn TimezoneLookup>,
	clock: Arc<dyn Clock>,
	price: price::PricePatterns,
	temporal: temporal::TemporalPatterns,
	location: location::LocationPatterns,
	hints: hints::HintPatterns,
}
impl QueryParser {
	pub fn new(
		settings: ParserSettings,
		reference: ReferenceData,
		timezones: Arc<dyn TimezoneLookup>,
		clock: Arc<dyn Clock>,
	) -> Result<Self> {
		let location = location::LocationPatterns::new(&reference)?;
		let hints = hints::HintPatterns::new(&reference)?;

		Ok(Self {
			settings,
			reference,
			timezones,
			clock,
			price: price::PricePatterns::new()?,
			temporal: temporal::TemporalPatterns::new()?,
			location,
			hints,
		})
	}

	pub fn reference(&self) -> &ReferenceData {
		&self.reference
	}

	/// The caller's local wall clock: user timezone first, then the region default, then UTC.
	pub fn local_now(&self, ctx: &ParseContext) -> OffsetDateTime {
		let offset = ctx
			.user_id
			.as_deref()
			.and_then(|user_id| self.timezones.utc_offset(user_id))
			.or_else(|| {
				let region = ctx
					.region
					.as_deref()
					.map(str::to_ascii_lowercase)
					.unwrap_or_else(|| self.settings.default_region.clone());

				self.settings
					.region_offsets
					.get(&region)
					.or_else(|| self.settings.region_offsets.get(&self.settings.default_region))
					.copied()
			})
			.unwrap_or(UtcOffset::UTC);

		self.clock.now_utc().to_offset(offset)
	}

	pub fn local_today(&self, ctx: &ParseContext) -> Date {
		self.local_now(ctx).date()
	}

	pub fn parse(&self, text: &str, ctx: &ParseContext) -> ParsedQuery {
		let started = Instant::now();
		let today = self.local_today(ctx);
		let mut scan = Scan::new(text);
		let mut out = ParsedQuery {
			original_query: text.to_string(),
			corrected_query: collapse_whitespace(&scan.text),
			duration_minutes: self.settings.default_duration_minutes,
			parsing_mode: ParsingMode::Regex,
			..ParsedQuery::default()
		};

		out.needs_llm = self.hints.needs_llm(&scan.text);

		self.hints.extract_ages(&mut scan, &mut out);
		self.price.extract(&mut scan, &mut out);
		self.temporal.extract_dates(&mut scan, &mut out, today);
		self.temporal.extract_times(&mut scan, &mut out);
		self.hints.extract_duration(&mut scan, &mut out);
		self.location.extract(&mut scan, &mut out, &self.reference);
		self.hints.extract_lesson_type(&mut scan, &mut out);
		self.hints.extract_audience(&mut scan, &mut out);
		self.hints.extract_skill(&mut scan, &mut out);
		self.hints.extract_urgency(&mut scan, &mut out);
		self.hints.extract_category(&scan, &mut out, &self.reference);
		self.price.apply_intent_threshold(&mut out, &self.reference);

		out.service_query = build_service_query(&scan, &out.corrected_query);
		out.confidence = if out.needs_llm { CONFIDENCE_AMBIGUOUS } else { CONFIDENCE_CLEAR };
		out.parsing_latency_ms = started.elapsed().as_millis() as u64;

		out
	}
}

/// Lowercased query text plus the byte ranges already claimed by an extractor.
pub(crate) struct Scan {
	pub(crate) text: String,
	consumed: Vec<Range<usize>>,
}
impl Scan {
	fn new(raw: &str) -> Self {
		Self { text: raw.to_ascii_lowercase(), consumed: Vec::new() }
	}

	pub(crate) fn is_free(&self, range: &Range<usize>) -> bool {
		self.consumed.iter().all(|taken| range.end <= taken.start || range.start >= taken.end)
	}

	pub(crate) fn consume(&mut self, range: Range<usize>) {
		if !range.is_empty() {
			self.consumed.push(range);
		}
	}

	/// First match of `re` that does not overlap an already consumed range.
	pub(crate) fn first_free<'t>(&'t self, re: &Regex) -> Option<Captures<'t>> {
		re.captures_iter(&self.text).find(|caps| {
			caps.get(0).map(|whole| self.is_free(&whole.range())).unwrap_or(false)
		})
	}

	pub(crate) fn all_free<'t>(&'t self, re: &'t Regex) -> impl Iterator<Item = Captures<'t>> + 't {
		re.captures_iter(&self.text).filter(move |caps| {
			caps.get(0).map(|whole| self.is_free(&whole.range())).unwrap_or(false)
		})
	}

	fn remainder(&self) -> String {
		let mut bytes = self.text.as_bytes().to_vec();

		for range in &self.consumed {
			for byte in &mut bytes[range.start..range.end.min(self.text.len())] {
				*byte = b' ';
			}
		}

		// Consumed ranges always sit on regex match boundaries, so any multi-byte character is
		// either fully blanked or untouched.
		String::from_utf8(bytes).unwrap_or_default()
	}
}

fn collapse_whitespace(text: &str) -> String {
	text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn build_service_query(scan: &Scan, fallback: &str) -> String {
	let remainder = scan.remainder();
	let mut words: Vec<&str> = remainder
		.split_whitespace()
		.map(|word| word.trim_matches(|ch: char| matches!(ch, ',' | '.' | '!' | '?' | ';' | ':')))
		.filter(|word| !word.is_empty())
		.collect();

	while words.first().is_some_and(|word| FILLER_WORDS.contains(word)) {
		words.remove(0);
	}
	while words.last().is_some_and(|word| FILLER_WORDS.contains(word)) {
		words.pop();
	}

	if words.is_empty() { fallback.to_string() } else { words.join(" ") }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn service_query_strips_consumed_spans_and_edge_fillers() {
		let mut scan = Scan::new("I need piano lessons in Brooklyn");

		scan.consume(21..32);

		assert_eq!(build_service_query(&scan, "fallback"), "piano lessons");
	}

	#[test]
	fn service_query_falls_back_when_everything_was_consumed() {
		let mut scan = Scan::new("tomorrow");

		scan.consume(0..8);

		assert_eq!(build_service_query(&scan, "tomorrow"), "tomorrow");
	}

	#[test]
	fn consumed_ranges_block_overlapping_matches() {
		let mut scan = Scan::new("after 5pm after 6pm");
		let re = Regex::new(r"after \d+pm").expect("Valid regex.");

		scan.consume(0..9);

		let caps = scan.first_free(&re).expect("Expected a free match.");

		assert_eq!(caps.get(0).map(|m| m.as_str()), Some("after 6pm"));
	}
}
