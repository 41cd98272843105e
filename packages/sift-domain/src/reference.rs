use std::collections::HashMap;

use crate::query::{LocationType, PriceIntent};

pub const GENERAL_CATEGORY: &str = "general";

#[derive(Clone, Debug, PartialEq)]
pub struct LocationEntry {
	pub name: String,
	pub location_type: LocationType,
	/// Parent borough for neighborhoods; the borough itself for boroughs.
	pub borough: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CategoryKeyword {
	pub keyword: String,
	pub category: String,
	pub subcategory: Option<String>,
}

/// Warm lookup tables the regex parser resolves against.
#[derive(Clone, Debug, Default)]
pub struct ReferenceData {
	locations: HashMap<String, LocationEntry>,
	price_thresholds: HashMap<(String, PriceIntent), f64>,
	categories: Vec<CategoryKeyword>,
}
impl ReferenceData {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a location under its own name; aliases are added with [`Self::with_alias`].
	pub fn with_location(
		mut self,
		name: &str,
		location_type: LocationType,
		borough: Option<&str>,
	) -> Self {
		let entry = LocationEntry {
			name: name.to_string(),
			location_type,
			borough: borough.map(str::to_string),
		};

		self.locations.insert(name.to_ascii_lowercase(), entry);

		self
	}

	pub fn with_alias(mut self, alias: &str, canonical: &str) -> Self {
		if let Some(entry) = self.locations.get(&canonical.to_ascii_lowercase()).cloned() {
			self.locations.insert(alias.to_ascii_lowercase(), entry);
		}

		self
	}

	pub fn with_price_threshold(mut self, category: &str, intent: PriceIntent, price: f64) -> Self {
		self.price_thresholds.insert((category.to_ascii_lowercase(), intent), price);

		self
	}

	pub fn with_category_keyword(
		mut self,
		keyword: &str,
		category: &str,
		subcategory: Option<&str>,
	) -> Self {
		self.categories.push(CategoryKeyword {
			keyword: keyword.to_ascii_lowercase(),
			category: category.to_string(),
			subcategory: subcategory.map(str::to_string),
		});

		self
	}

	pub fn location(&self, name: &str) -> Option<&LocationEntry> {
		self.locations.get(name.trim().to_ascii_lowercase().as_str())
	}

	/// Every lowercase name and alias the parser should look for.
	pub fn location_keys(&self) -> impl Iterator<Item = &str> {
		self.locations.keys().map(String::as_str)
	}

	pub fn category_keywords(&self) -> &[CategoryKeyword] {
		&self.categories
	}

	pub fn category_for_keyword(&self, keyword: &str) -> Option<&CategoryKeyword> {
		self.categories.iter().find(|entry| entry.keyword == keyword)
	}

	/// Threshold for `(category, intent)`, falling back to the general category.
	pub fn price_threshold(&self, category: Option<&str>, intent: PriceIntent) -> Option<f64> {
		category
			.and_then(|category| {
				self.price_thresholds.get(&(category.to_ascii_lowercase(), intent)).copied()
			})
			.or_else(|| self.price_thresholds.get(&(GENERAL_CATEGORY.to_string(), intent)).copied())
	}

	/// New York City defaults used when no catalog snapshot is supplied.
	pub fn builtin() -> Self {
		let mut data = Self::new()
			.with_location("New York City", LocationType::City, None)
			.with_alias("nyc", "New York City")
			.with_alias("new york", "New York City");

		for borough in ["Manhattan", "Brooklyn", "Queens", "Bronx", "Staten Island"] {
			data = data.with_location(borough, LocationType::Borough, Some(borough));
		}

		data = data
			.with_alias("bk", "Brooklyn")
			.with_alias("the bronx", "Bronx")
			.with_alias("si", "Staten Island");

		for (neighborhood, borough) in [
			("Upper West Side", "Manhattan"),
			("Upper East Side", "Manhattan"),
			("Harlem", "Manhattan"),
			("Chelsea", "Manhattan"),
			("Greenwich Village", "Manhattan"),
			("East Village", "Manhattan"),
			("Tribeca", "Manhattan"),
			("Midtown", "Manhattan"),
			("Park Slope", "Brooklyn"),
			("Williamsburg", "Brooklyn"),
			("Brooklyn Heights", "Brooklyn"),
			("Bushwick", "Brooklyn"),
			("Bay Ridge", "Brooklyn"),
			("Astoria", "Queens"),
			("Long Island City", "Queens"),
			("Flushing", "Queens"),
			("Riverdale", "Bronx"),
		] {
			data = data.with_location(neighborhood, LocationType::Neighborhood, Some(borough));
		}

		data = data
			.with_alias("uws", "Upper West Side")
			.with_alias("ues", "Upper East Side")
			.with_alias("lic", "Long Island City")
			.with_alias("the village", "Greenwich Village");

		for (category, budget, premium) in [
			(GENERAL_CATEGORY, 50.0, 100.0),
			("music", 60.0, 120.0),
			("tutoring", 50.0, 110.0),
			("language", 45.0, 90.0),
			("sports", 60.0, 120.0),
			("fitness", 50.0, 110.0),
			("arts", 50.0, 100.0),
			("dance", 45.0, 95.0),
		] {
			data = data
				.with_price_threshold(category, PriceIntent::Budget, budget)
				.with_price_threshold(category, PriceIntent::Premium, premium);
		}

		for (keyword, category, subcategory) in [
			("piano", "music", Some("instrument")),
			("keyboard", "music", Some("instrument")),
			("guitar", "music", Some("instrument")),
			("violin", "music", Some("instrument")),
			("cello", "music", Some("instrument")),
			("ukulele", "music", Some("instrument")),
			("drums", "music", Some("instrument")),
			("saxophone", "music", Some("instrument")),
			("singing", "music", Some("voice")),
			("voice", "music", Some("voice")),
			("vocal", "music", Some("voice")),
			("music theory", "music", Some("theory")),
			("music", "music", None),
			("math", "tutoring", Some("math")),
			("algebra", "tutoring", Some("math")),
			("calculus", "tutoring", Some("math")),
			("geometry", "tutoring", Some("math")),
			("sat prep", "tutoring", Some("test_prep")),
			("sat", "tutoring", Some("test_prep")),
			("act", "tutoring", Some("test_prep")),
			("reading", "tutoring", Some("literacy")),
			("writing", "tutoring", Some("literacy")),
			("chemistry", "tutoring", Some("science")),
			("physics", "tutoring", Some("science")),
			("biology", "tutoring", Some("science")),
			("coding", "tutoring", Some("coding")),
			("programming", "tutoring", Some("coding")),
			("homework help", "tutoring", None),
			("tutor", "tutoring", None),
			("tutoring", "tutoring", None),
			("spanish", "language", Some("spanish")),
			("french", "language", Some("french")),
			("mandarin", "language", Some("mandarin")),
			("italian", "language", Some("italian")),
			("german", "language", Some("german")),
			("japanese", "language", Some("japanese")),
			("esl", "language", Some("english")),
			("tennis", "sports", Some("racquet")),
			("swimming", "sports", Some("aquatics")),
			("soccer", "sports", Some("team")),
			("basketball", "sports", Some("team")),
			("golf", "sports", None),
			("martial arts", "sports", Some("martial_arts")),
			("karate", "sports", Some("martial_arts")),
			("yoga", "fitness", Some("mind_body")),
			("pilates", "fitness", Some("mind_body")),
			("personal training", "fitness", Some("training")),
			("personal trainer", "fitness", Some("training")),
			("boxing", "fitness", Some("training")),
			("painting", "arts", Some("visual")),
			("drawing", "arts", Some("visual")),
			("photography", "arts", Some("visual")),
			("pottery", "arts", Some("crafts")),
			("ballet", "dance", Some("classical")),
			("salsa", "dance", Some("latin")),
			("hip hop", "dance", Some("street")),
			("dance", "dance", None),
		] {
			data = data.with_category_keyword(keyword, category, subcategory);
		}

		data
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn aliases_resolve_to_canonical_entries() {
		let data = ReferenceData::builtin();
		let entry = data.location("BK").expect("Expected alias to resolve.");

		assert_eq!(entry.name, "Brooklyn");
		assert_eq!(entry.location_type, LocationType::Borough);

		let entry = data.location("uws").expect("Expected alias to resolve.");

		assert_eq!(entry.name, "Upper West Side");
		assert_eq!(entry.borough.as_deref(), Some("Manhattan"));
	}

	#[test]
	fn price_threshold_falls_back_to_general() {
		let data = ReferenceData::builtin();

		assert_eq!(data.price_threshold(Some("music"), PriceIntent::Budget), Some(60.0));
		assert_eq!(data.price_threshold(Some("knitting"), PriceIntent::Budget), Some(50.0));
		assert_eq!(data.price_threshold(None, PriceIntent::Premium), Some(100.0));
	}

	#[test]
	fn aliases_for_unknown_locations_are_ignored() {
		let data = ReferenceData::new().with_alias("x", "Nowhere");

		assert!(data.location("x").is_none());
	}
}
