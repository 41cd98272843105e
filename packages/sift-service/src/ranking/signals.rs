//! Per-candidate signal curves. Every function returns a score in `[0, 1]`.

use std::cmp::Ordering;

use time::OffsetDateTime;

use crate::models::{InstructorMetrics, ServiceTags};
use sift_config::RankingBoosts;
use sift_domain::{AudienceHint, SkillLevel};

pub const NEUTRAL_DISTANCE: f64 = 0.7;
pub const NEUTRAL_PRICE: f64 = 0.7;
pub const UNKNOWN_FRESHNESS: f64 = 0.5;

const MIN_BIO_CHARS: usize = 100;
const MIN_RESPONSE_RATE: f64 = 0.8;

pub fn relevance(hybrid_score: f64) -> f64 {
	if hybrid_score.is_finite() { hybrid_score.clamp(0.0, 1.0) } else { 0.0 }
}

/// Bayesian average `(R·v + C·m) / (v + m)` on a five-star scale.
///
/// An instructor without reviews, or without a rating, scores exactly `C / 5`.
pub fn quality(metrics: Option<&InstructorMetrics>, global_rating: f64, min_reviews: f64) -> f64 {
	let (rating, reviews) = match metrics {
		Some(InstructorMetrics { avg_rating: Some(rating), review_count, .. })
			if *review_count > 0 =>
			(*rating, f64::from(*review_count)),
		_ => (0.0, 0.0),
	};
	let denominator = reviews + min_reviews;

	if denominator <= 0.0 {
		return (global_rating / 5.0).clamp(0.0, 1.0);
	}

	((rating * reviews + global_rating * min_reviews) / denominator / 5.0).clamp(0.0, 1.0)
}

pub fn distance(km: Option<f64>) -> f64 {
	let Some(km) = km.filter(|km| km.is_finite()) else { return NEUTRAL_DISTANCE };

	if km <= 1.0 {
		1.0
	} else if km <= 10.0 {
		1.0 - 0.5 * (km - 1.0) / 9.0
	} else if km <= 30.0 {
		0.5 - 0.3 * (km - 10.0) / 20.0
	} else {
		0.2
	}
}

pub fn price(price_per_hour: Option<f64>, max_price: Option<f64>) -> f64 {
	let (Some(price), Some(max_price)) = (price_per_hour, max_price) else {
		return NEUTRAL_PRICE;
	};

	if max_price <= 0.0 || !price.is_finite() {
		return NEUTRAL_PRICE;
	}

	let ratio = price / max_price;

	if ratio <= 0.7 {
		1.0
	} else if ratio <= 1.0 {
		1.0 - 0.3 * (ratio - 0.7) / 0.3
	} else {
		0.5
	}
}

pub fn freshness(last_active_at: Option<OffsetDateTime>, now: OffsetDateTime) -> f64 {
	let Some(last_active_at) = last_active_at else { return UNKNOWN_FRESHNESS };
	let days = (now - last_active_at).as_seconds_f64() / 86_400.0;

	match days {
		d if d <= 1.0 => 1.0,
		d if d <= 7.0 => 0.9,
		d if d <= 30.0 => 0.7,
		d if d <= 90.0 => 0.5,
		_ => 0.3,
	}
}

pub fn completeness(metrics: Option<&InstructorMetrics>) -> f64 {
	let Some(metrics) = metrics else { return 0.0 };
	let checks = [
		metrics.has_photo,
		metrics.bio_length >= MIN_BIO_CHARS,
		metrics.background_checked,
		metrics.identity_verified,
		metrics.response_rate.is_some_and(|rate| rate > MIN_RESPONSE_RATE),
	];

	checks.into_iter().filter(|passed| *passed).count() as f64 * 0.2
}

pub fn audience_boost(
	hint: Option<AudienceHint>,
	tags: Option<&ServiceTags>,
	boosts: &RankingBoosts,
) -> f64 {
	match (hint, tags) {
		(Some(hint), Some(tags)) if tags.audiences.contains(&hint) => boosts.audience,
		_ => 0.0,
	}
}

pub fn skill_boost(level: Option<SkillLevel>, tags: Option<&ServiceTags>, boosts: &RankingBoosts) -> f64 {
	let (Some(level), Some(tags)) = (level, tags) else { return 0.0 };

	if tags.all_levels || tags.skill_levels.contains(&level) {
		boosts.skill_exact
	} else if tags.skill_levels.iter().any(|tagged| tagged.is_adjacent(level)) {
		boosts.skill_adjacent
	} else {
		0.0
	}
}

pub fn cmp_f64_desc(a: f64, b: f64) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeSet;

	use time::{Duration, macros::datetime};

	use super::*;

	fn close(a: f64, b: f64) -> bool {
		(a - b).abs() < 1e-9
	}

	#[test]
	fn distance_curve_hits_its_knots() {
		assert_eq!(distance(Some(0.5)), 1.0);
		assert!(close(distance(Some(10.0)), 0.5));
		assert!(close(distance(Some(30.0)), 0.2));
		assert!(close(distance(Some(5.5)), 0.75));
		assert_eq!(distance(Some(120.0)), 0.2);
		assert_eq!(distance(None), NEUTRAL_DISTANCE);
	}

	#[test]
	fn price_curve_rewards_headroom_and_flattens_over_budget() {
		assert_eq!(price(Some(35.0), Some(60.0)), 1.0);
		assert!(close(price(Some(60.0), Some(60.0)), 0.7));
		assert!(close(price(Some(51.0), Some(60.0)), 0.85));
		assert_eq!(price(Some(90.0), Some(60.0)), 0.5);
		assert_eq!(price(Some(90.0), None), NEUTRAL_PRICE);
		assert_eq!(price(None, Some(60.0)), NEUTRAL_PRICE);
	}

	#[test]
	fn freshness_steps_down_with_inactivity() {
		let now = datetime!(2026-10-16 15:00 UTC);

		assert_eq!(freshness(Some(now - Duration::hours(3)), now), 1.0);
		assert_eq!(freshness(Some(now - Duration::days(5)), now), 0.9);
		assert_eq!(freshness(Some(now - Duration::days(20)), now), 0.7);
		assert_eq!(freshness(Some(now - Duration::days(60)), now), 0.5);
		assert_eq!(freshness(Some(now - Duration::days(400)), now), 0.3);
		assert_eq!(freshness(None, now), UNKNOWN_FRESHNESS);
	}

	#[test]
	fn quality_without_reviews_is_the_prior() {
		let metrics = InstructorMetrics { avg_rating: Some(5.0), ..InstructorMetrics::default() };

		assert!(close(quality(Some(&metrics), 4.2, 5.0), 4.2 / 5.0));
		assert!(close(quality(None, 4.2, 5.0), 4.2 / 5.0));
	}

	#[test]
	fn quality_approaches_the_raw_rating_with_volume() {
		let rating = 4.8;
		let mut previous_gap = f64::MAX;

		for reviews in [1, 10, 100, 1_000, 100_000] {
			let metrics = InstructorMetrics {
				avg_rating: Some(rating),
				review_count: reviews,
				..InstructorMetrics::default()
			};
			let gap = (quality(Some(&metrics), 4.0, 5.0) - rating / 5.0).abs();

			assert!(gap < previous_gap);

			previous_gap = gap;
		}

		assert!(previous_gap < 1e-3);
	}

	#[test]
	fn completeness_counts_each_check() {
		let metrics = InstructorMetrics {
			has_photo: true,
			bio_length: 140,
			background_checked: true,
			identity_verified: false,
			response_rate: Some(0.8),
			..InstructorMetrics::default()
		};

		assert!(close(completeness(Some(&metrics)), 0.6));
		assert_eq!(completeness(None), 0.0);
	}

	#[test]
	fn skill_boost_prefers_exact_over_adjacent() {
		let boosts = RankingBoosts::default();
		let tags = ServiceTags {
			skill_levels: BTreeSet::from([SkillLevel::Intermediate]),
			..ServiceTags::default()
		};
		let all_levels = ServiceTags { all_levels: true, ..ServiceTags::default() };

		assert_eq!(skill_boost(Some(SkillLevel::Intermediate), Some(&tags), &boosts), 0.05);
		assert_eq!(skill_boost(Some(SkillLevel::Beginner), Some(&tags), &boosts), 0.02);
		assert_eq!(skill_boost(Some(SkillLevel::Advanced), Some(&all_levels), &boosts), 0.05);
		assert_eq!(skill_boost(None, Some(&tags), &boosts), 0.0);
	}

	#[test]
	fn audience_boost_requires_a_matching_tag() {
		let boosts = RankingBoosts::default();
		let tags = ServiceTags {
			audiences: BTreeSet::from([AudienceHint::Kids]),
			..ServiceTags::default()
		};

		assert_eq!(audience_boost(Some(AudienceHint::Kids), Some(&tags), &boosts), 0.10);
		assert_eq!(audience_boost(Some(AudienceHint::Adults), Some(&tags), &boosts), 0.0);
	}
}
