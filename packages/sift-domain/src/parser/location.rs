use regex::Regex;

use crate::{
	Result,
	parser::Scan,
	query::{LocationType, ParsedQuery},
	reference::ReferenceData,
};

pub(super) struct LocationPatterns {
	near_me: Regex,
	/// `None` when the reference data has no locations.
	named: Option<Regex>,
}
impl LocationPatterns {
	pub(super) fn new(reference: &ReferenceData) -> Result<Self> {
		let mut keys: Vec<&str> = reference.location_keys().collect();

		// Longest first so "upper west side" wins over any shorter alias it contains.
		keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

		let named = if keys.is_empty() {
			None
		} else {
			let alternation =
				keys.iter().map(|key| regex::escape(key).replace(' ', r"\s+")).collect::<Vec<_>>();

			Some(Regex::new(&format!(
				r"\b(?:(?:in|near|around|at|by|from)\s+)?({})\b",
				alternation.join("|")
			))?)
		};

		Ok(Self {
			near_me: Regex::new(
				r"\b(?:near\s+me|nearby|close\s+to\s+me|around\s+me|close\s+by|near\s+my\s+(?:home|house|place|apartment|location)|in\s+my\s+(?:area|neighborhood))\b",
			)?,
			named,
		})
	}

	pub(super) fn extract(&self, scan: &mut Scan, out: &mut ParsedQuery, reference: &ReferenceData) {
		if let Some(range) = scan.first_free(&self.near_me).and_then(|caps| caps.get(0)).map(|m| m.range())
		{
			scan.consume(range);
			out.location_type = Some(LocationType::NearMe);

			return;
		}

		let Some(named) = self.named.as_ref() else { return };
		let Some((range, key)) = scan.first_free(named).and_then(|caps| {
			let key = caps.get(1)?.as_str().split_whitespace().collect::<Vec<_>>().join(" ");

			Some((caps.get(0)?.range(), key))
		}) else {
			return;
		};
		let Some(entry) = reference.location(&key) else { return };

		scan.consume(range);
		out.location_text = Some(entry.name.clone());
		out.location_type = Some(entry.location_type);
	}
}
