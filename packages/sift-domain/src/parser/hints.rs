use std::ops::Range;

use regex::Regex;

use crate::{
	Result,
	parser::Scan,
	query::{AudienceHint, LessonType, ParsedQuery, SkillLevel, Urgency},
	reference::ReferenceData,
};

/// Ages at or below this count as a child audience.
const MAX_CHILD_AGE: u32 = 18;
const MIN_DURATION_MINUTES: u32 = 15;
const MAX_DURATION_MINUTES: u32 = 240;

pub(super) struct HintPatterns {
	age_years: Regex,
	age_range: Regex,
	kids_under: Regex,
	kids: Regex,
	adults: Regex,
	beginner: Regex,
	intermediate: Regex,
	advanced: Regex,
	urgency_high: Regex,
	urgency_medium: Regex,
	urgency_low: Regex,
	online: Regex,
	in_person: Regex,
	duration_minutes: Regex,
	duration_hours: Regex,
	/// `None` when the reference data has no category keywords.
	category: Option<Regex>,
	ambiguity: Vec<Regex>,
}
impl HintPatterns {
	pub(super) fn new(reference: &ReferenceData) -> Result<Self> {
		let mut keywords: Vec<&str> =
			reference.category_keywords().iter().map(|entry| entry.keyword.as_str()).collect();

		keywords.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
		keywords.dedup();

		let category = if keywords.is_empty() {
			None
		} else {
			let alternation = keywords
				.iter()
				.map(|keyword| regex::escape(keyword).replace(' ', r"\s+"))
				.collect::<Vec<_>>();

			Some(Regex::new(&format!(r"\b({})\b", alternation.join("|")))?)
		};

		Ok(Self {
			age_years: Regex::new(
				r"\b(?:for\s+(?:my\s+|a\s+|an\s+|our\s+|the\s+)?)?(\d{1,2})[\s-]*(?:years?|yrs?)[\s-]*olds?\b|\b(?:for\s+(?:my\s+|a\s+|our\s+)?)?(\d{1,2})\s*(?:yo|y/o)\b",
			)?,
			age_range: Regex::new(
				r"\b(?:for\s+)?(?:kids\s+|children\s+)?(?:ages?|aged)\s+(\d{1,2})(?:\s*(?:-|to|and)\s*(\d{1,2}))?(?:\s*\+)?",
			)?,
			kids_under: Regex::new(
				r"\b(?:for\s+(?:my\s+|our\s+|the\s+)?)?(?:kids?|children|child|students|boys|girls|toddlers|teens)\s+(?:under|below|younger\s+than|up\s+to)\s+(\d{1,2})\b",
			)?,
			kids: Regex::new(
				r"\b(?:for\s+(?:my\s+|a\s+|the\s+|our\s+)?)?(?:kids?|children|child|toddlers?|sons?|daughters?|teens?|teenagers?|youth|little\s+ones?|boys?|girls?)\b",
			)?,
			adults: Regex::new(
				r"\b(?:for\s+(?:an?\s+)?)?(?:adults?|grown[\s-]?ups?|seniors?)\b",
			)?,
			beginner: Regex::new(
				r"\b(?:beginners?|novices?|first[\s-]timers?|first[\s-]time|just\s+starting(?:\s+out)?|never\s+played|from\s+scratch|intro(?:ductory)?)(?:[\s-]level)?\b",
			)?,
			intermediate: Regex::new(r"\bintermediate(?:[\s-]level)?\b")?,
			advanced: Regex::new(
				r"\b(?:advanced|expert|professional|pro)[\s-]level\b|\badvanced\b",
			)?,
			urgency_high: Regex::new(
				r"\b(?:urgent(?:ly)?|asap|as\s+soon\s+as\s+possible|right\s+away|immediately|emergency|last[\s-]minute)\b",
			)?,
			urgency_medium: Regex::new(r"\b(?:soon|quickly|this\s+week)\b")?,
			urgency_low: Regex::new(
				r"\b(?:flexible|whenever|no\s+rush|any\s*time|sometime|eventually)\b",
			)?,
			online: Regex::new(
				r"\b(?:online|virtual(?:ly)?|remote(?:ly)?|(?:over|via|on)\s+zoom|zoom|video\s+call)\b",
			)?,
			in_person: Regex::new(
				r"\b(?:in[\s-]person|in[\s-]home|at\s+my\s+(?:home|house|place|apartment)|face[\s-]to[\s-]face)\b",
			)?,
			duration_minutes: Regex::new(r"\b(\d{2,3})[\s-]*(?:minutes?|mins?)\b")?,
			duration_hours: Regex::new(
				r"\b(half\s+(?:an\s+)?hour|an\s+hour\s+and\s+a\s+half|one\s+and\s+a\s+half\s+hours?|1\.5\s+hours?|(?:one|1)\s+hours?|two\s+hours?|2\s+hours?|an\s+hour)\s+(?:lessons?|sessions?|classes?)\b|\b(?:for|lasting)\s+(half\s+(?:an\s+)?hour|an\s+hour\s+and\s+a\s+half|1\.5\s+hours?|(?:one|1)\s+hours?|two\s+hours?|2\s+hours?|an\s+hour)\b",
			)?,
			category,
			ambiguity: vec![
				Regex::new(r"\b(?:or|either|nor)\b")?,
				Regex::new(r"\.\.\.|\u{2026}")?,
				Regex::new(r"\b(?:not|except|excluding|without|unless)\b")?,
				Regex::new(r"\b(?:other\s+than|but\s+not|instead\s+of)\b")?,
				Regex::new(r"\b(?:better|closer|nicer)\s+than\b")?,
			],
		})
	}

	/// Disjunction, ellipsis, negation, or comparison cannot be resolved safely by rules.
	pub(super) fn needs_llm(&self, text: &str) -> bool {
		self.ambiguity.iter().any(|re| re.is_match(text))
	}

	pub(super) fn extract_ages(&self, scan: &mut Scan, out: &mut ParsedQuery) {
		let mut ages: Vec<(Range<usize>, u32)> = Vec::new();

		for re in [&self.age_years, &self.age_range] {
			ages.extend(scan.all_free(re).filter_map(|caps| {
				let age = caps
					.get(1)
					.or_else(|| caps.get(2))
					.and_then(|m| m.as_str().parse::<u32>().ok())?;

				Some((caps.get(0)?.range(), age))
			}));
		}

		ages.extend(scan.all_free(&self.kids_under).filter_map(|caps| {
			let age = caps.get(1)?.as_str().parse::<u32>().ok()?;

			// "kids under 40" is a price, not an age.
			(age <= MAX_CHILD_AGE).then_some((caps.get(0)?.range(), age))
		}));

		for (range, age) in ages {
			if !scan.is_free(&range) {
				continue;
			}

			scan.consume(range);

			if out.audience_hint.is_none() {
				out.audience_hint = Some(if age <= MAX_CHILD_AGE {
					AudienceHint::Kids
				} else {
					AudienceHint::Adults
				});
			}
		}
	}

	pub(super) fn extract_audience(&self, scan: &mut Scan, out: &mut ParsedQuery) {
		for (re, hint) in [(&self.kids, AudienceHint::Kids), (&self.adults, AudienceHint::Adults)] {
			let ranges = free_ranges(scan, re);

			if ranges.is_empty() {
				continue;
			}

			for range in ranges {
				scan.consume(range);
			}

			out.audience_hint.get_or_insert(hint);
		}
	}

	pub(super) fn extract_skill(&self, scan: &mut Scan, out: &mut ParsedQuery) {
		for (re, level) in [
			(&self.advanced, SkillLevel::Advanced),
			(&self.intermediate, SkillLevel::Intermediate),
			(&self.beginner, SkillLevel::Beginner),
		] {
			let Some(range) = first_free_range(scan, re) else { continue };

			scan.consume(range);
			out.skill_level.get_or_insert(level);
		}
	}

	/// Urgency reads the full text: "this week" is both a date and an urgency cue.
	pub(super) fn extract_urgency(&self, scan: &mut Scan, out: &mut ParsedQuery) {
		for (re, urgency) in [
			(&self.urgency_high, Urgency::High),
			(&self.urgency_medium, Urgency::Medium),
			(&self.urgency_low, Urgency::Low),
		] {
			if !re.is_match(&scan.text) {
				continue;
			}

			for range in free_ranges(scan, re) {
				scan.consume(range);
			}

			if out.urgency.is_none() {
				out.urgency = Some(urgency);
			}
		}
	}

	pub(super) fn extract_lesson_type(&self, scan: &mut Scan, out: &mut ParsedQuery) {
		for (re, lesson_type) in
			[(&self.online, LessonType::Online), (&self.in_person, LessonType::InPerson)]
		{
			let Some(range) = first_free_range(scan, re) else { continue };

			scan.consume(range);
			out.lesson_type.get_or_insert(lesson_type);
		}
	}

	pub(super) fn extract_duration(&self, scan: &mut Scan, out: &mut ParsedQuery) {
		if let Some((range, minutes)) = scan.first_free(&self.duration_minutes).and_then(|caps| {
			let minutes = caps.get(1)?.as_str().parse::<u32>().ok()?;

			(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES)
				.contains(&minutes)
				.then_some((caps.get(0)?.range(), minutes))
		}) {
			scan.consume(range);
			out.duration_minutes = minutes;

			return;
		}

		if let Some((range, minutes)) = scan.first_free(&self.duration_hours).and_then(|caps| {
			let phrase = caps.get(1).or_else(|| caps.get(2))?.as_str();

			Some((caps.get(0)?.range(), hour_phrase_minutes(phrase)?))
		}) {
			scan.consume(range);
			out.duration_minutes = minutes;
		}
	}

	/// Category keywords identify the service itself, so they stay in the service query.
	pub(super) fn extract_category(&self, scan: &Scan, out: &mut ParsedQuery, reference: &ReferenceData) {
		let Some(re) = self.category.as_ref() else { return };
		let Some(keyword) = scan
			.first_free(re)
			.and_then(|caps| caps.get(1))
			.map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" "))
		else {
			return;
		};
		let Some(entry) = reference.category_for_keyword(&keyword) else { return };

		out.category_hint = Some(entry.category.clone());
		out.subcategory_hint = entry.subcategory.clone();
		out.service_hint = Some(entry.keyword.clone());
	}
}

fn first_free_range(scan: &Scan, re: &Regex) -> Option<Range<usize>> {
	scan.first_free(re).and_then(|caps| caps.get(0)).map(|m| m.range())
}

fn free_ranges(scan: &Scan, re: &Regex) -> Vec<Range<usize>> {
	scan.all_free(re).filter_map(|caps| caps.get(0).map(|m| m.range())).collect()
}

fn hour_phrase_minutes(phrase: &str) -> Option<u32> {
	let normalized = phrase.split_whitespace().collect::<Vec<_>>().join(" ");

	if normalized.starts_with("half") {
		return Some(30);
	}
	if normalized.contains("and a half") || normalized.starts_with("1.5") {
		return Some(90);
	}
	if normalized.starts_with("two") || normalized.starts_with('2') {
		return Some(120);
	}
	if normalized.starts_with("one") || normalized.starts_with('1') || normalized.starts_with("an") {
		return Some(60);
	}

	None
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hour_phrases_convert_to_minutes() {
		assert_eq!(hour_phrase_minutes("half an hour"), Some(30));
		assert_eq!(hour_phrase_minutes("an hour and a half"), Some(90));
		assert_eq!(hour_phrase_minutes("2 hours"), Some(120));
		assert_eq!(hour_phrase_minutes("an hour"), Some(60));
		assert_eq!(hour_phrase_minutes("three hours"), None);
	}
}
