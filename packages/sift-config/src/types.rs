use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub providers: Providers,
	pub parser: Parser,
	pub circuit_breaker: CircuitBreaker,
	pub search: Search,
	#[serde(default)]
	pub filter: Filter,
	#[serde(default)]
	pub ranking: Ranking,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub llm_parser: LlmProviderConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	#[serde(default = "default_max_tokens")]
	pub max_tokens: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct Parser {
	/// Region used when the caller does not pass one.
	pub default_region: String,
	/// Fixed UTC offsets, in minutes, used to resolve "today" when the user has no timezone.
	pub region_utc_offsets_minutes: HashMap<String, i32>,
	#[serde(default = "default_duration_minutes")]
	pub default_duration_minutes: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CircuitBreaker {
	pub failure_threshold: u32,
	pub recovery_timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Search {
	/// One of off, auto, or always.
	pub llm_mode: String,
	pub candidate_limit: u32,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Filter {
	/// Result floor that triggers soft relaxation.
	pub min_results: u32,
	/// Days past the requested date (or range end) that date relaxation may widen to.
	pub date_relax_days: u32,
	pub near_me_radius_km: f64,
	pub relaxation: FilterRelaxation,
}
impl Default for Filter {
	fn default() -> Self {
		Self {
			min_results: 5,
			date_relax_days: 7,
			near_me_radius_km: 10.0,
			relaxation: FilterRelaxation::default(),
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct FilterRelaxation {
	pub time: bool,
	pub date: bool,
	pub location: bool,
	pub availability: bool,
	pub lesson_type: bool,
}
impl Default for FilterRelaxation {
	fn default() -> Self {
		Self { time: true, date: true, location: true, availability: true, lesson_type: true }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Ranking {
	pub weights: RankingWeights,
	pub boosts: RankingBoosts,
	/// Minimum-review constant `m` of the Bayesian rating average.
	pub bayesian_min_reviews: f64,
	/// Prior used when the global rating average cannot be fetched.
	pub default_global_rating: f64,
}
impl Default for Ranking {
	fn default() -> Self {
		Self {
			weights: RankingWeights::default(),
			boosts: RankingBoosts::default(),
			bayesian_min_reviews: 5.0,
			default_global_rating: 4.0,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RankingWeights {
	pub relevance: f64,
	pub quality: f64,
	pub distance: f64,
	pub price: f64,
	pub freshness: f64,
	pub completeness: f64,
}
impl RankingWeights {
	pub fn sum(&self) -> f64 {
		self.relevance
			+ self.quality
			+ self.distance
			+ self.price
			+ self.freshness
			+ self.completeness
	}

	pub fn entries(&self) -> [(&'static str, f64); 6] {
		[
			("relevance", self.relevance),
			("quality", self.quality),
			("distance", self.distance),
			("price", self.price),
			("freshness", self.freshness),
			("completeness", self.completeness),
		]
	}
}
impl Default for RankingWeights {
	fn default() -> Self {
		Self {
			relevance: 0.35,
			quality: 0.25,
			distance: 0.15,
			price: 0.10,
			freshness: 0.10,
			completeness: 0.05,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RankingBoosts {
	pub audience: f64,
	pub skill_exact: f64,
	pub skill_adjacent: f64,
}
impl Default for RankingBoosts {
	fn default() -> Self {
		Self { audience: 0.10, skill_exact: 0.05, skill_adjacent: 0.02 }
	}
}

fn default_max_tokens() -> u32 {
	500
}

fn default_duration_minutes() -> u32 {
	60
}
