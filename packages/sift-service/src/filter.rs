mod relaxation;

use std::{
	cmp::Ordering,
	collections::{BTreeSet, HashMap, HashSet},
	sync::Arc,
};

use serde::Serialize;
use time::{Date, Duration};

use crate::{
	AvailabilityRepository, CatalogRepository, DistanceRepository, LocationResolver, unique_ids,
	models::{
		FilteredCandidate, GeoPoint, LocationResolution, OpenSlot, ResolvedLocation,
		ServiceCandidate, ServiceCoverage,
	},
};
use relaxation::{AvailabilityConstraint, Constraints, LocationConstraint, Relaxation};
use sift_domain::{LessonType, LocationType, ParsedQuery};

pub struct FilterRequest<'a> {
	pub query: &'a ParsedQuery,
	pub candidates: Vec<ServiceCandidate>,
	pub user_location: Option<GeoPoint>,
	/// The caller's local date, used when the query names no date.
	pub today: Date,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LocationOutcome {
	NotRequested,
	Resolved { location: ResolvedLocation },
	NearMe { radius_km: f64 },
	/// "near me" without a user position to measure from.
	NoUserLocation,
	Ambiguous { candidates: Vec<ResolvedLocation> },
	NotFound { text: String },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FilterStat {
	pub stage: &'static str,
	pub before: usize,
	pub after: usize,
	/// Set when the stage's lookup failed and it excluded nothing.
	pub degraded: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FilterResult {
	pub candidates: Vec<FilteredCandidate>,
	pub total_before_filter: usize,
	pub total_after_filter: usize,
	pub hard_filtered_count: usize,
	pub soft_filtered_count: usize,
	pub filters_applied: Vec<&'static str>,
	pub filter_stats: Vec<FilterStat>,
	pub relaxed: Vec<&'static str>,
	pub location: LocationOutcome,
}

/// Batched lookups for one pass; `None` means the lookup was skipped or failed.
#[derive(Default)]
struct Lookups {
	coverage: Option<HashMap<String, ServiceCoverage>>,
	distances: Option<HashMap<String, f64>>,
	slots: Option<HashMap<String, Vec<OpenSlot>>>,
	coverage_failed: bool,
	distances_failed: bool,
	slots_failed: bool,
}
impl Lookups {
	fn coverage(&self, candidate: &ServiceCandidate) -> Option<&ServiceCoverage> {
		self.coverage.as_ref()?.get(&candidate.service_id)
	}

	fn distance(&self, candidate: &ServiceCandidate) -> Option<f64> {
		self.distances.as_ref()?.get(&candidate.instructor_id).copied()
	}

	fn slots(&self, candidate: &ServiceCandidate) -> Option<&[OpenSlot]> {
		self.slots.as_ref()?.get(&candidate.instructor_id).map(Vec::as_slice)
	}

	fn location_ok(&self, constraint: &LocationConstraint, candidate: &ServiceCandidate) -> bool {
		match constraint {
			LocationConstraint::Any | LocationConstraint::Nearest => true,
			LocationConstraint::Region { region_id, .. } => self.coverage.is_none()
				|| self.coverage(candidate).is_some_and(|cov| cov.region_ids.contains(region_id)),
			LocationConstraint::Borough(borough) => self.coverage.is_none()
				|| self.coverage(candidate).is_some_and(|cov| cov.covers_borough(borough)),
			LocationConstraint::Within { radius_km } => self.distances.is_none()
				|| self.distance(candidate).is_some_and(|km| km <= *radius_km),
		}
	}

	fn lesson_type_ok(&self, lesson_type: Option<LessonType>, candidate: &ServiceCandidate) -> bool {
		let Some(lesson_type) = lesson_type else { return true };

		if self.coverage.is_none() {
			return true;
		}

		self.coverage(candidate).is_some_and(|cov| match lesson_type {
			LessonType::Online => cov.offers_online,
			LessonType::InPerson => cov.offers_in_person,
		})
	}

	fn availability_ok(
		&self,
		constraint: &AvailabilityConstraint,
		candidate: &ServiceCandidate,
	) -> bool {
		self.slots.is_none() || constraint.passes(self.slots(candidate))
	}

	fn passes(&self, constraints: &Constraints, candidate: &ServiceCandidate) -> bool {
		self.location_ok(&constraints.location, candidate)
			&& self.lesson_type_ok(constraints.lesson_type, candidate)
			&& self.availability_ok(&constraints.availability, candidate)
	}
}

pub struct FilterService {
	cfg: sift_config::Filter,
	locations: Arc<dyn LocationResolver>,
	availability: Arc<dyn AvailabilityRepository>,
	catalog: Arc<dyn CatalogRepository>,
	distances: Arc<dyn DistanceRepository>,
	strategies: Vec<Box<dyn Relaxation>>,
}
impl FilterService {
	pub fn new(
		cfg: sift_config::Filter,
		locations: Arc<dyn LocationResolver>,
		availability: Arc<dyn AvailabilityRepository>,
		catalog: Arc<dyn CatalogRepository>,
		distances: Arc<dyn DistanceRepository>,
	) -> Self {
		let strategies = relaxation::default_strategies(cfg.date_relax_days);

		Self { cfg, locations, availability, catalog, distances, strategies }
	}

	pub async fn filter(&self, req: FilterRequest<'_>) -> FilterResult {
		let FilterRequest { query, candidates, user_location, today } = req;
		let total_before = candidates.len();
		let (location, location_outcome) = self.resolve_location(query, user_location).await;
		let original = Constraints {
			location,
			lesson_type: query.lesson_type,
			availability: availability_constraint(query, today, self.cfg.date_relax_days),
		};
		let lookups = self.fetch(&candidates, &original, query, user_location, today).await;

		// Hard pass, one stage at a time so each stage reports what it removed.
		let mut survivors: Vec<usize> = (0..candidates.len()).collect();
		let mut filters_applied = Vec::new();
		let mut filter_stats = Vec::new();
		let location_degraded = lookups.coverage_failed || lookups.distances_failed;
		let stages: [(&'static str, bool, bool); 3] = [
			("location", original.location != LocationConstraint::Any, location_degraded),
			("lesson_type", original.lesson_type.is_some(), lookups.coverage_failed),
			("availability", original.availability.require_slot, lookups.slots_failed),
		];

		for (stage, active, degraded) in stages {
			if !active {
				continue;
			}

			let before = survivors.len();

			survivors.retain(|idx| {
				let candidate = &candidates[*idx];

				match stage {
					"location" => lookups.location_ok(&original.location, candidate),
					"lesson_type" => lookups.lesson_type_ok(original.lesson_type, candidate),
					_ => lookups.availability_ok(&original.availability, candidate),
				}
			});
			filters_applied.push(stage);
			filter_stats.push(FilterStat { stage, before, after: survivors.len(), degraded });
		}

		let hard_count = survivors.len();
		let floor = self.cfg.min_results as usize;
		let mut admitted: Vec<(usize, Constraints)> =
			survivors.into_iter().map(|idx| (idx, original.clone())).collect();
		let mut relaxed = Vec::new();

		if hard_count < floor && total_before > hard_count {
			relaxed = self.relax(&candidates, &lookups, &original, floor, &mut admitted);
		}

		let soft_count = admitted.len() - hard_count;

		if !relaxed.is_empty() {
			tracing::info!(
				hard = hard_count,
				soft = soft_count,
				floor,
				relaxed = ?relaxed,
				"Filter relaxed constraints to reach the result floor."
			);
		}

		let out: Vec<FilteredCandidate> = admitted
			.iter()
			.enumerate()
			.map(|(position, (idx, admitted_under))| {
				let candidate = &candidates[*idx];
				let soft = position >= hard_count;

				build_candidate(
					candidate.clone(),
					&lookups,
					&original,
					admitted_under,
					soft,
					self.cfg.date_relax_days,
				)
			})
			.collect();

		FilterResult {
			total_after_filter: out.len(),
			candidates: out,
			total_before_filter: total_before,
			hard_filtered_count: hard_count,
			soft_filtered_count: soft_count,
			filters_applied,
			filter_stats,
			relaxed,
			location: location_outcome,
		}
	}

	fn relax(
		&self,
		candidates: &[ServiceCandidate],
		lookups: &Lookups,
		original: &Constraints,
		floor: usize,
		admitted: &mut Vec<(usize, Constraints)>,
	) -> Vec<&'static str> {
		let mut constraints = original.clone();
		let mut taken: HashSet<usize> = admitted.iter().map(|(idx, _)| *idx).collect();
		let mut relaxed = Vec::new();

		for strategy in &self.strategies {
			if !strategy.enabled(&self.cfg.relaxation) {
				continue;
			}

			while admitted.len() < floor && strategy.loosen(&mut constraints) {
				let mut newly: Vec<usize> = (0..candidates.len())
					.filter(|idx| !taken.contains(idx) && lookups.passes(&constraints, &candidates[*idx]))
					.collect();

				if constraints.location == LocationConstraint::Nearest {
					newly.sort_by(|a, b| {
						cmp_distance(lookups.distance(&candidates[*a]), lookups.distance(&candidates[*b]))
					});
					newly.truncate(floor.saturating_sub(admitted.len()));
				}

				// Only strategies that admitted someone are reported.
				if !newly.is_empty() && !relaxed.contains(&strategy.name()) {
					relaxed.push(strategy.name());
				}

				for idx in newly {
					taken.insert(idx);
					admitted.push((idx, constraints.clone()));
				}
			}

			if admitted.len() >= floor {
				break;
			}
		}

		relaxed
	}

	async fn resolve_location(
		&self,
		query: &ParsedQuery,
		user_location: Option<GeoPoint>,
	) -> (LocationConstraint, LocationOutcome) {
		if query.location_type == Some(LocationType::NearMe) {
			return match user_location {
				Some(_) => (
					LocationConstraint::Within { radius_km: self.cfg.near_me_radius_km },
					LocationOutcome::NearMe { radius_km: self.cfg.near_me_radius_km },
				),
				None => (LocationConstraint::Any, LocationOutcome::NoUserLocation),
			};
		}

		let Some(text) = query.location_text.as_deref() else {
			return (LocationConstraint::Any, LocationOutcome::NotRequested);
		};
		let not_found =
			|| (LocationConstraint::Any, LocationOutcome::NotFound { text: text.to_string() });

		match self.locations.resolve(text, query.location_type).await {
			Ok(LocationResolution::Resolved(location)) => {
				let constraint = location_constraint(&location);

				(constraint, LocationOutcome::Resolved { location })
			},
			Ok(LocationResolution::Ambiguous { candidates }) =>
				(LocationConstraint::Any, LocationOutcome::Ambiguous { candidates }),
			Ok(LocationResolution::NotFound) => not_found(),
			Err(err) => {
				tracing::warn!(error = %err, location = text, "Location resolution failed.");

				not_found()
			},
		}
	}

	async fn fetch(
		&self,
		candidates: &[ServiceCandidate],
		constraints: &Constraints,
		query: &ParsedQuery,
		user_location: Option<GeoPoint>,
		today: Date,
	) -> Lookups {
		let mut lookups = Lookups::default();

		if candidates.is_empty() {
			return lookups;
		}

		let needs_coverage = matches!(
			constraints.location,
			LocationConstraint::Region { .. } | LocationConstraint::Borough(_)
		) || constraints.lesson_type.is_some();

		if needs_coverage {
			let service_ids = unique_ids(candidates.iter().map(|c| c.service_id.as_str()));

			match self.catalog.coverage(&service_ids).await {
				Ok(coverage) => lookups.coverage = Some(coverage),
				Err(err) => {
					tracing::warn!(
						error = %err,
						"Coverage lookup failed; location and lesson type filters skipped."
					);

					lookups.coverage_failed = true;
				},
			}
		}

		let instructor_ids = unique_ids(candidates.iter().map(|c| c.instructor_id.as_str()));

		if let Some(origin) = user_location {
			match self.distances.distances(&instructor_ids, origin).await {
				Ok(distances) => lookups.distances = Some(distances),
				Err(err) => {
					tracing::warn!(error = %err, "Distance lookup failed; radius filter skipped.");

					lookups.distances_failed = true;
				},
			}
		}

		if constraints.availability.require_slot || query.is_urgent() {
			let (start, end) = self.fetch_window(&constraints.availability, today);

			match self.availability.open_slots(&instructor_ids, start, end).await {
				Ok(slots) => lookups.slots = Some(slots),
				Err(err) => {
					tracing::warn!(
						error = %err,
						"Availability lookup failed; availability filter skipped."
					);

					lookups.slots_failed = true;
				},
			}
		}

		lookups
	}

	/// The requested window, widened up front so date relaxation needs no second lookup.
	fn fetch_window(&self, availability: &AvailabilityConstraint, today: Date) -> (Date, Date) {
		let relax_days = Duration::days(i64::from(self.cfg.date_relax_days));

		match availability.dates {
			Some((start, end)) if self.cfg.relaxation.date => (start, end.saturating_add(relax_days)),
			Some((start, end)) => (start, end),
			None => (today, today.saturating_add(relax_days)),
		}
	}
}

fn location_constraint(location: &ResolvedLocation) -> LocationConstraint {
	match location.location_type {
		LocationType::Neighborhood => match (&location.region_id, &location.borough) {
			(Some(region_id), borough) =>
				LocationConstraint::Region { region_id: region_id.clone(), borough: borough.clone() },
			(None, Some(borough)) => LocationConstraint::Borough(borough.clone()),
			(None, None) => LocationConstraint::Any,
		},
		LocationType::Borough => LocationConstraint::Borough(
			location.borough.clone().unwrap_or_else(|| location.name.clone()),
		),
		LocationType::City | LocationType::NearMe => LocationConstraint::Any,
	}
}

fn availability_constraint(
	query: &ParsedQuery,
	today: Date,
	date_relax_days: u32,
) -> AvailabilityConstraint {
	let dates = query.date_bounds();
	let require_slot = dates.is_some() || query.has_time_constraint();

	AvailabilityConstraint {
		dates: dates.or_else(|| {
			query
				.has_time_constraint()
				.then(|| (today, today.saturating_add(Duration::days(i64::from(date_relax_days)))))
		}),
		after: query.time_after,
		before: query.time_before,
		duration_minutes: query.duration_minutes,
		require_slot,
		// A time-only query already spans the whole relaxation window.
		dates_widened: dates.is_none(),
	}
}

fn build_candidate(
	candidate: ServiceCandidate,
	lookups: &Lookups,
	original: &Constraints,
	admitted_under: &Constraints,
	soft: bool,
	date_relax_days: u32,
) -> FilteredCandidate {
	let slots = lookups.slots(&candidate).unwrap_or_default();
	let window = if admitted_under.availability.require_slot {
		&admitted_under.availability
	} else {
		&original.availability
	};
	let available_dates: Vec<Date> = slots
		.iter()
		.filter(|slot| window.slot_matches(slot))
		.map(|slot| slot.date)
		.collect::<BTreeSet<_>>()
		.into_iter()
		.collect();
	let earliest_available = available_dates.first().copied().or_else(|| {
		slots
			.iter()
			.filter(|slot| slot.fits(None, None, original.availability.duration_minutes))
			.map(|slot| slot.date)
			.min()
	});
	let passed_location = lookups.location_ok(&original.location, &candidate);
	let soft_filter_reasons =
		if soft { soft_reasons(lookups, original, &candidate, date_relax_days) } else { Vec::new() };

	FilteredCandidate {
		distance_km: lookups.distance(&candidate),
		candidate,
		passed_location,
		soft_filtered: soft,
		soft_filter_reasons,
		available_dates,
		earliest_available,
	}
}

/// Which original constraints a relaxed admission does not meet.
fn soft_reasons(
	lookups: &Lookups,
	original: &Constraints,
	candidate: &ServiceCandidate,
	date_relax_days: u32,
) -> Vec<String> {
	let mut reasons = Vec::new();
	let availability = &original.availability;

	if !lookups.availability_ok(availability, candidate) {
		let no_time = availability.without_time();
		let widened = availability.widened(date_relax_days);

		if lookups.availability_ok(&no_time, candidate) {
			reasons.push("time_relaxed");
		} else if lookups.availability_ok(&widened, candidate) {
			reasons.push("date_relaxed");
		} else if lookups.availability_ok(&widened.without_time(), candidate) {
			reasons.extend(["time_relaxed", "date_relaxed"]);
		} else {
			reasons.push("availability_relaxed");
		}
	}
	if !lookups.location_ok(&original.location, candidate) {
		reasons.push("location_relaxed");
	}
	if !lookups.lesson_type_ok(original.lesson_type, candidate) {
		reasons.push("lesson_type_relaxed");
	}

	reasons.into_iter().map(str::to_string).collect()
}

fn cmp_distance(a: Option<f64>, b: Option<f64>) -> Ordering {
	let a = a.unwrap_or(f64::INFINITY);
	let b = b.unwrap_or(f64::INFINITY);

	a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}
