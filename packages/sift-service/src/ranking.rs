pub mod signals;

use std::{collections::HashMap, sync::Arc};

use serde::Serialize;
use time::Date;
use tokio::sync::OnceCell;

use crate::{
	CatalogRepository, DistanceRepository, InstructorRepository, unique_ids,
	models::{FilteredCandidate, GeoPoint, InstructorMetrics, RankedResult, ServiceTags},
};
use sift_domain::{Clock, ParsedQuery};

pub struct RankingRequest<'a> {
	pub query: &'a ParsedQuery,
	pub candidates: Vec<FilteredCandidate>,
	pub user_location: Option<GeoPoint>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RankingResult {
	pub results: Vec<RankedResult>,
	pub ranking_signals_used: Vec<&'static str>,
	pub global_average_rating: f64,
}

pub struct RankingService {
	cfg: sift_config::Ranking,
	instructors: Arc<dyn InstructorRepository>,
	catalog: Arc<dyn CatalogRepository>,
	distances: Arc<dyn DistanceRepository>,
	clock: Arc<dyn Clock>,
	global_rating: OnceCell<f64>,
}
impl RankingService {
	pub fn new(
		cfg: sift_config::Ranking,
		instructors: Arc<dyn InstructorRepository>,
		catalog: Arc<dyn CatalogRepository>,
		distances: Arc<dyn DistanceRepository>,
		clock: Arc<dyn Clock>,
	) -> Self {
		Self { cfg, instructors, catalog, distances, clock, global_rating: OnceCell::new() }
	}

	/// The platform-wide average rating, fetched once per service instance.
	///
	/// A failed fetch falls back to the configured default and is retried on the next call.
	pub async fn global_average_rating(&self) -> f64 {
		let fetched = self
			.global_rating
			.get_or_try_init(|| async { self.instructors.global_average_rating().await })
			.await;

		match fetched {
			Ok(rating) => *rating,
			Err(err) => {
				tracing::warn!(error = %err, "Global rating lookup failed; using the default prior.");

				self.cfg.default_global_rating
			},
		}
	}

	pub async fn rank(&self, req: RankingRequest<'_>) -> RankingResult {
		let RankingRequest { query, candidates, user_location } = req;
		let mut signals_used = vec!["relevance", "quality", "freshness", "completeness"];

		if user_location.is_some() {
			signals_used.push("distance");
		}
		if query.max_price.is_some() {
			signals_used.push("price");
		}

		let global_rating = self.global_average_rating().await;

		if candidates.is_empty() {
			return RankingResult {
				results: Vec::new(),
				ranking_signals_used: signals_used,
				global_average_rating: global_rating,
			};
		}

		let instructor_ids =
			unique_ids(candidates.iter().map(|c| c.candidate.instructor_id.as_str()));
		let service_ids = unique_ids(candidates.iter().map(|c| c.candidate.service_id.as_str()));
		let metrics = self.fetch_metrics(&instructor_ids).await;
		let tags = self.fetch_tags(&service_ids).await;
		let distances = self.fetch_distances(&candidates, user_location).await;
		let now = self.clock.now_utc();
		let weights = &self.cfg.weights;
		let boosts = &self.cfg.boosts;
		let mut results: Vec<RankedResult> = candidates
			.into_iter()
			.map(|mut candidate| {
				let metrics = metrics.get(&candidate.candidate.instructor_id);
				let tags = tags.get(&candidate.candidate.service_id);

				if user_location.is_some() && candidate.distance_km.is_none() {
					candidate.distance_km =
						distances.get(&candidate.candidate.instructor_id).copied();
				}

				let relevance_score = signals::relevance(candidate.candidate.hybrid_score);
				let quality_score =
					signals::quality(metrics, global_rating, self.cfg.bayesian_min_reviews);
				let distance_score = if user_location.is_some() {
					signals::distance(candidate.distance_km)
				} else {
					signals::NEUTRAL_DISTANCE
				};
				let price_score =
					signals::price(candidate.candidate.price_per_hour, query.max_price);
				let freshness_score =
					signals::freshness(metrics.and_then(|m| m.last_active_at), now);
				let completeness_score = signals::completeness(metrics);
				let audience_boost = signals::audience_boost(query.audience_hint, tags, boosts);
				let skill_boost = signals::skill_boost(query.skill_level, tags, boosts);
				let final_score = weights.relevance * relevance_score
					+ weights.quality * quality_score
					+ weights.distance * distance_score
					+ weights.price * price_score
					+ weights.freshness * freshness_score
					+ weights.completeness * completeness_score
					+ audience_boost
					+ skill_boost;

				RankedResult {
					candidate,
					relevance_score,
					quality_score,
					distance_score,
					price_score,
					freshness_score,
					completeness_score,
					audience_boost,
					skill_boost,
					final_score,
					rank: 0,
				}
			})
			.collect();

		sort_results(&mut results, query.is_urgent());

		for (idx, result) in results.iter_mut().enumerate() {
			result.rank = idx as u32 + 1;
		}

		tracing::debug!(
			count = results.len(),
			urgent = query.is_urgent(),
			signals = ?signals_used,
			"Ranked candidates."
		);

		RankingResult {
			results,
			ranking_signals_used: signals_used,
			global_average_rating: global_rating,
		}
	}

	async fn fetch_metrics(&self, instructor_ids: &[String]) -> HashMap<String, InstructorMetrics> {
		self.instructors.metrics(instructor_ids).await.unwrap_or_else(|err| {
			tracing::warn!(error = %err, "Instructor metrics lookup failed; quality signals neutral.");

			HashMap::new()
		})
	}

	async fn fetch_tags(&self, service_ids: &[String]) -> HashMap<String, ServiceTags> {
		self.catalog.tags(service_ids).await.unwrap_or_else(|err| {
			tracing::warn!(error = %err, "Service tag lookup failed; boosts disabled.");

			HashMap::new()
		})
	}

	/// Only instructors the filter pass did not already measure are looked up.
	async fn fetch_distances(
		&self,
		candidates: &[FilteredCandidate],
		user_location: Option<GeoPoint>,
	) -> HashMap<String, f64> {
		let Some(origin) = user_location else { return HashMap::new() };
		let missing = unique_ids(
			candidates
				.iter()
				.filter(|c| c.distance_km.is_none())
				.map(|c| c.candidate.instructor_id.as_str()),
		);

		if missing.is_empty() {
			return HashMap::new();
		}

		self.distances.distances(&missing, origin).await.unwrap_or_else(|err| {
			tracing::warn!(error = %err, "Distance lookup failed; distance signal neutral.");

			HashMap::new()
		})
	}
}

/// Urgent queries put the soonest bookable first; everything else is by score. Ties fall back
/// to relevance and then the service id, so the order is total.
fn sort_results(results: &mut [RankedResult], urgent: bool) {
	results.sort_by(|left, right| {
		let by_date = if urgent {
			earliest(left).cmp(&earliest(right))
		} else {
			std::cmp::Ordering::Equal
		};

		by_date
			.then_with(|| signals::cmp_f64_desc(left.final_score, right.final_score))
			.then_with(|| signals::cmp_f64_desc(left.relevance_score, right.relevance_score))
			.then_with(|| {
				left.candidate.candidate.service_id.cmp(&right.candidate.candidate.service_id)
			})
	});
}

fn earliest(result: &RankedResult) -> Date {
	result.candidate.earliest_available.unwrap_or(Date::MAX)
}
