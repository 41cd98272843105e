use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use sift_domain::{AudienceHint, ClockTime, LocationType, SkillLevel};

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct GeoPoint {
	pub lat: f64,
	pub lng: f64,
}

/// A retrieval hit; `hybrid_score` is already normalized to `[0, 1]`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ServiceCandidate {
	pub service_id: String,
	pub service_catalog_id: String,
	pub instructor_id: String,
	pub hybrid_score: f64,
	pub vector_score: Option<f64>,
	pub text_score: Option<f64>,
	pub name: String,
	pub description: String,
	pub price_per_hour: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FilteredCandidate {
	#[serde(flatten)]
	pub candidate: ServiceCandidate,
	pub passed_location: bool,
	pub soft_filtered: bool,
	pub soft_filter_reasons: Vec<String>,
	#[serde(with = "sift_domain::date_serde::list")]
	pub available_dates: Vec<Date>,
	#[serde(with = "sift_domain::date_serde::option")]
	pub earliest_available: Option<Date>,
	pub distance_km: Option<f64>,
}
impl FilteredCandidate {
	pub fn unfiltered(candidate: ServiceCandidate) -> Self {
		Self {
			candidate,
			passed_location: true,
			soft_filtered: false,
			soft_filter_reasons: Vec::new(),
			available_dates: Vec::new(),
			earliest_available: None,
			distance_km: None,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RankedResult {
	#[serde(flatten)]
	pub candidate: FilteredCandidate,
	pub relevance_score: f64,
	pub quality_score: f64,
	pub distance_score: f64,
	pub price_score: f64,
	pub freshness_score: f64,
	pub completeness_score: f64,
	pub audience_boost: f64,
	pub skill_boost: f64,
	pub final_score: f64,
	pub rank: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResolvedLocation {
	pub name: String,
	pub location_type: LocationType,
	pub region_id: Option<String>,
	pub borough: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum LocationResolution {
	Resolved(ResolvedLocation),
	Ambiguous { candidates: Vec<ResolvedLocation> },
	NotFound,
}

/// Where a service is taught and in which modes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ServiceCoverage {
	pub region_ids: HashSet<String>,
	/// Lowercase borough names.
	pub boroughs: HashSet<String>,
	pub offers_online: bool,
	pub offers_in_person: bool,
}
impl ServiceCoverage {
	pub fn covers_borough(&self, borough: &str) -> bool {
		self.boroughs.contains(&borough.to_ascii_lowercase())
	}
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ServiceTags {
	pub audiences: BTreeSet<AudienceHint>,
	pub skill_levels: BTreeSet<SkillLevel>,
	/// Taught at every level; counts as an exact skill match.
	pub all_levels: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct InstructorMetrics {
	pub avg_rating: Option<f64>,
	pub review_count: u32,
	pub last_active_at: Option<OffsetDateTime>,
	pub has_photo: bool,
	pub bio_length: usize,
	pub background_checked: bool,
	pub identity_verified: bool,
	/// Fraction of messages answered, `0.0..=1.0`.
	pub response_rate: Option<f64>,
}

/// A bookable gap in an instructor's calendar, in the instructor's local wall time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OpenSlot {
	pub date: Date,
	pub start: ClockTime,
	pub end: ClockTime,
}
impl OpenSlot {
	/// Whether `duration_minutes` fits inside this slot clipped to `[after, before]`.
	pub fn fits(
		&self,
		after: Option<ClockTime>,
		before: Option<ClockTime>,
		duration_minutes: u32,
	) -> bool {
		let start = after.map_or(self.start, |after| after.max(self.start)).minutes_since_midnight();
		let end = before.map_or(self.end, |before| before.min(self.end)).minutes_since_midnight();

		end >= start && end - start >= duration_minutes
	}
}
