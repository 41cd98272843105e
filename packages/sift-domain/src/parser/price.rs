use std::ops::Range;

use regex::{Captures, Regex};

use crate::{
	Result,
	parser::Scan,
	query::{ParsedQuery, PriceIntent},
	reference::ReferenceData,
};

/// Bare numbers below this are never read as prices.
const MIN_BARE_PRICE: f64 = 20.0;
const AMOUNT: &str = r"(\d+(?:\.\d+)?)";
const COMPARATOR: &str = r"under|below|less\s+than|no\s+more\s+than|up\s+to|at\s+most|max(?:imum)?|within|cheaper\s+than|over|above|more\s+than|at\s+least|min(?:imum)?|starting\s+at|from|for|around|about|budget\s+(?:of|is)";
const RATE_SUFFIX: &str = r"(?:\s*(?:/|per|an?)\s*(?:hr|hour|h|session|lesson|class)\b)?";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Bound {
	Max,
	Min,
}

pub(super) struct PricePatterns {
	dollar_range: Regex,
	word_range: Regex,
	dollar: Regex,
	dollar_words: Regex,
	bare: Regex,
	age_suffix: Regex,
	budget: Regex,
	premium: Regex,
}
impl PricePatterns {
	pub(super) fn new() -> Result<Self> {
		Ok(Self {
			dollar_range: Regex::new(&format!(
				r"(?:\bbetween\s+)?\$\s*{AMOUNT}\s*(?:-|to|and)\s*\$?\s*{AMOUNT}{RATE_SUFFIX}"
			))?,
			word_range: Regex::new(&format!(
				r"\bbetween\s+{AMOUNT}\s*(?:-|to|and)\s*{AMOUNT}\s*(?:dollars|bucks|usd)\b{RATE_SUFFIX}"
			))?,
			dollar: Regex::new(&format!(r"(?:\b({COMPARATOR})\s+)?\$\s*{AMOUNT}{RATE_SUFFIX}"))?,
			dollar_words: Regex::new(&format!(
				r"(?:\b({COMPARATOR})\s+)?\b{AMOUNT}\s*(?:dollars|bucks|usd)\b{RATE_SUFFIX}"
			))?,
			bare: Regex::new(&format!(
				r"\b(under|below|less\s+than|no\s+more\s+than|up\s+to|at\s+most|max(?:imum)?|over|above|more\s+than|at\s+least|min(?:imum)?|budget(?:\s+of)?)\s+{AMOUNT}\b{RATE_SUFFIX}"
			))?,
			age_suffix: Regex::new(
				r"^\s*-?\s*(?:years?|yrs?|yo\b|y/o|months?|mins?\b|minutes?|hours?|hrs?\b|grade)",
			)?,
			budget: Regex::new(
				r"\b(?:cheap(?:er|est)?|affordable|budget(?:[\s-]friendly)?|inexpensive|low[\s-]cost|reasonably\s+priced)\b",
			)?,
			premium: Regex::new(
				r"\b(?:premium|luxury|high[\s-]end|upscale|top[\s-]rated|top[\s-]tier|elite)\b",
			)?,
		})
	}

	pub(super) fn extract(&self, scan: &mut Scan, out: &mut ParsedQuery) {
		for (range, low, high) in collect_ranges(scan, &self.dollar_range)
			.into_iter()
			.chain(collect_ranges(scan, &self.word_range))
			.collect::<Vec<_>>()
		{
			scan.consume(range);
			out.min_price.get_or_insert(low.min(high));
			out.max_price.get_or_insert(low.max(high));
		}

		for re in [&self.dollar, &self.dollar_words] {
			let found: Vec<(Range<usize>, Bound, f64)> = scan
				.all_free(re)
				.filter_map(|caps| {
					let whole = caps.get(0)?.range();
					let amount = parse_amount(&caps, 2)?;
					let bound = caps.get(1).map(|m| comparator_bound(m.as_str())).unwrap_or(Bound::Max);

					Some((whole, bound, amount))
				})
				.collect();

			// An explicit amount is always the ceiling; floor comparators also set the floor.
			for (range, bound, amount) in found {
				scan.consume(range);
				out.max_price.get_or_insert(amount);

				if bound == Bound::Min {
					out.min_price.get_or_insert(amount);
				}
			}
		}

		let found: Vec<(Range<usize>, Bound, f64)> = scan
			.all_free(&self.bare)
			.filter_map(|caps| {
				let whole = caps.get(0)?;
				let amount = parse_amount(&caps, 2)?;

				if amount < MIN_BARE_PRICE || self.age_suffix.is_match(&scan.text[whole.end()..]) {
					return None;
				}

				let bound = caps.get(1).map(|m| comparator_bound(m.as_str())).unwrap_or(Bound::Max);

				Some((whole.range(), bound, amount))
			})
			.collect();

		for (range, bound, amount) in found {
			scan.consume(range);
			set_bound(out, bound, amount);
		}

		for (re, intent) in [(&self.budget, PriceIntent::Budget), (&self.premium, PriceIntent::Premium)]
		{
			let Some(range) = scan.first_free(re).and_then(|caps| caps.get(0)).map(|m| m.range())
			else {
				continue;
			};

			scan.consume(range);

			if out.price_intent.is_none() {
				out.price_intent = Some(intent);
			}
		}
	}

	/// Budget/premium keywords become a category-specific bound when no explicit price exists.
	pub(super) fn apply_intent_threshold(&self, out: &mut ParsedQuery, reference: &ReferenceData) {
		let Some(intent) = out.price_intent else { return };
		let threshold = reference.price_threshold(out.category_hint.as_deref(), intent);

		match intent {
			PriceIntent::Budget if out.max_price.is_none() => out.max_price = threshold,
			PriceIntent::Premium if out.min_price.is_none() => out.min_price = threshold,
			_ => {},
		}
	}
}

fn collect_ranges(scan: &Scan, re: &Regex) -> Vec<(Range<usize>, f64, f64)> {
	scan.all_free(re)
		.filter_map(|caps| {
			let whole = caps.get(0)?.range();
			let low = parse_amount(&caps, 1)?;
			let high = parse_amount(&caps, 2)?;

			Some((whole, low, high))
		})
		.collect()
}

fn parse_amount(caps: &Captures<'_>, group: usize) -> Option<f64> {
	caps.get(group)?.as_str().parse::<f64>().ok().filter(|amount| amount.is_finite())
}

fn comparator_bound(raw: &str) -> Bound {
	let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");

	match normalized.as_str() {
		"over" | "above" | "more than" | "at least" | "min" | "minimum" | "starting at" | "from" =>
			Bound::Min,
		_ => Bound::Max,
	}
}

fn set_bound(out: &mut ParsedQuery, bound: Bound, amount: f64) {
	match bound {
		Bound::Max => {
			out.max_price.get_or_insert(amount);
		},
		Bound::Min => {
			out.min_price.get_or_insert(amount);
		},
	}
}
