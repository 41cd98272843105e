use time::{Date, Duration};

use sift_config::FilterRelaxation;
use sift_domain::{ClockTime, LessonType};

use crate::models::OpenSlot;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum LocationConstraint {
	Any,
	Region { region_id: String, borough: Option<String> },
	Borough(String),
	Within { radius_km: f64 },
	/// Everything passes; admission goes nearest first.
	Nearest,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct AvailabilityConstraint {
	/// Inclusive date window; `None` means any date in the fetched window.
	pub(crate) dates: Option<(Date, Date)>,
	pub(crate) after: Option<ClockTime>,
	pub(crate) before: Option<ClockTime>,
	pub(crate) duration_minutes: u32,
	pub(crate) require_slot: bool,
	pub(crate) dates_widened: bool,
}
impl AvailabilityConstraint {
	pub(crate) fn slot_matches(&self, slot: &OpenSlot) -> bool {
		let in_window =
			self.dates.is_none_or(|(start, end)| slot.date >= start && slot.date <= end);

		in_window && slot.fits(self.after, self.before, self.duration_minutes)
	}

	pub(crate) fn passes(&self, slots: Option<&[OpenSlot]>) -> bool {
		!self.require_slot || slots.is_some_and(|slots| slots.iter().any(|slot| self.slot_matches(slot)))
	}

	pub(crate) fn without_time(&self) -> Self {
		Self { after: None, before: None, ..self.clone() }
	}

	pub(crate) fn widened(&self, days: u32) -> Self {
		let mut widened = self.clone();

		if let Some((start, end)) = self.dates
			&& !self.dates_widened
		{
			widened.dates = Some((start, end.saturating_add(Duration::days(i64::from(days)))));
			widened.dates_widened = true;
		}

		widened
	}
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Constraints {
	pub(crate) location: LocationConstraint,
	pub(crate) lesson_type: Option<LessonType>,
	pub(crate) availability: AvailabilityConstraint,
}

/// One relaxable constraint. `loosen` moves one notch and reports whether anything changed,
/// so applying it to an already loose constraint is a no-op.
pub(crate) trait Relaxation
where
	Self: Send + Sync,
{
	fn name(&self) -> &'static str;

	fn enabled(&self, toggles: &FilterRelaxation) -> bool;

	fn loosen(&self, constraints: &mut Constraints) -> bool;
}

/// Any time on the requested dates.
pub(crate) struct TimeRelaxation;
impl Relaxation for TimeRelaxation {
	fn name(&self) -> &'static str {
		"time"
	}

	fn enabled(&self, toggles: &FilterRelaxation) -> bool {
		toggles.time
	}

	fn loosen(&self, constraints: &mut Constraints) -> bool {
		let availability = &mut constraints.availability;

		if !availability.require_slot || (availability.after.is_none() && availability.before.is_none())
		{
			return false;
		}

		*availability = availability.without_time();

		true
	}
}

/// Extends the date window forward by `days`.
pub(crate) struct DateRelaxation {
	pub(crate) days: u32,
}
impl Relaxation for DateRelaxation {
	fn name(&self) -> &'static str {
		"date"
	}

	fn enabled(&self, toggles: &FilterRelaxation) -> bool {
		toggles.date && self.days > 0
	}

	fn loosen(&self, constraints: &mut Constraints) -> bool {
		let availability = &mut constraints.availability;

		if !availability.require_slot || availability.dates.is_none() || availability.dates_widened {
			return false;
		}

		*availability = availability.widened(self.days);

		true
	}
}

/// Neighborhood to borough to citywide; a near-me radius becomes nearest first.
pub(crate) struct LocationRelaxation;
impl Relaxation for LocationRelaxation {
	fn name(&self) -> &'static str {
		"location"
	}

	fn enabled(&self, toggles: &FilterRelaxation) -> bool {
		toggles.location
	}

	fn loosen(&self, constraints: &mut Constraints) -> bool {
		let next = match &constraints.location {
			LocationConstraint::Any | LocationConstraint::Nearest => return false,
			LocationConstraint::Region { borough: Some(borough), .. } =>
				LocationConstraint::Borough(borough.clone()),
			LocationConstraint::Region { borough: None, .. } | LocationConstraint::Borough(_) =>
				LocationConstraint::Any,
			LocationConstraint::Within { .. } => LocationConstraint::Nearest,
		};

		constraints.location = next;

		true
	}
}

/// Any open slot in the fetched window, then no slot at all.
pub(crate) struct AvailabilityRelaxation;
impl Relaxation for AvailabilityRelaxation {
	fn name(&self) -> &'static str {
		"availability"
	}

	fn enabled(&self, toggles: &FilterRelaxation) -> bool {
		toggles.availability
	}

	fn loosen(&self, constraints: &mut Constraints) -> bool {
		let availability = &mut constraints.availability;

		if !availability.require_slot {
			return false;
		}
		if availability.dates.is_some() || availability.after.is_some() || availability.before.is_some()
		{
			availability.dates = None;
			availability.after = None;
			availability.before = None;
		} else {
			availability.require_slot = false;
		}

		true
	}
}

pub(crate) struct LessonTypeRelaxation;
impl Relaxation for LessonTypeRelaxation {
	fn name(&self) -> &'static str {
		"lesson_type"
	}

	fn enabled(&self, toggles: &FilterRelaxation) -> bool {
		toggles.lesson_type
	}

	fn loosen(&self, constraints: &mut Constraints) -> bool {
		constraints.lesson_type.take().is_some()
	}
}

/// Strategies in the order they are tried.
pub(crate) fn default_strategies(date_relax_days: u32) -> Vec<Box<dyn Relaxation>> {
	vec![
		Box::new(TimeRelaxation),
		Box::new(DateRelaxation { days: date_relax_days }),
		Box::new(LocationRelaxation),
		Box::new(AvailabilityRelaxation),
		Box::new(LessonTypeRelaxation),
	]
}

#[cfg(test)]
mod tests {
	use time::Month;

	use super::*;

	fn date(day: u8) -> Date {
		Date::from_calendar_date(2026, Month::October, day).expect("Valid date.")
	}

	fn constraints() -> Constraints {
		Constraints {
			location: LocationConstraint::Region {
				region_id: "park-slope".to_string(),
				borough: Some("Brooklyn".to_string()),
			},
			lesson_type: Some(LessonType::InPerson),
			availability: AvailabilityConstraint {
				dates: Some((date(17), date(17))),
				after: ClockTime::new(17, 0),
				before: None,
				duration_minutes: 60,
				require_slot: true,
				dates_widened: false,
			},
		}
	}

	#[test]
	fn every_strategy_is_idempotent_once_exhausted() {
		for strategy in default_strategies(7) {
			let mut constraints = constraints();
			let mut steps = 0;

			while strategy.loosen(&mut constraints) {
				steps += 1;

				assert!(steps < 10, "{} never settles", strategy.name());
			}

			let settled = constraints.clone();

			assert!(!strategy.loosen(&mut constraints));
			assert_eq!(constraints, settled);
		}
	}

	#[test]
	fn location_steps_neighborhood_then_borough_then_city() {
		let mut constraints = constraints();

		assert!(LocationRelaxation.loosen(&mut constraints));
		assert_eq!(constraints.location, LocationConstraint::Borough("Brooklyn".to_string()));
		assert!(LocationRelaxation.loosen(&mut constraints));
		assert_eq!(constraints.location, LocationConstraint::Any);
		assert!(!LocationRelaxation.loosen(&mut constraints));
	}

	#[test]
	fn date_relaxation_widens_the_window_once() {
		let mut constraints = constraints();
		let strategy = DateRelaxation { days: 7 };

		assert!(strategy.loosen(&mut constraints));
		assert_eq!(constraints.availability.dates, Some((date(17), date(24))));
		assert!(!strategy.loosen(&mut constraints));
	}

	#[test]
	fn availability_relaxation_drops_the_window_before_the_slot_requirement() {
		let mut constraints = constraints();

		assert!(AvailabilityRelaxation.loosen(&mut constraints));
		assert!(constraints.availability.require_slot);
		assert_eq!(constraints.availability.dates, None);
		assert!(AvailabilityRelaxation.loosen(&mut constraints));
		assert!(!constraints.availability.require_slot);
	}

	#[test]
	fn disabled_toggles_are_respected() {
		let toggles = FilterRelaxation { time: false, ..FilterRelaxation::default() };

		assert!(!TimeRelaxation.enabled(&toggles));
		assert!(LocationRelaxation.enabled(&toggles));
		assert!(!DateRelaxation { days: 0 }.enabled(&FilterRelaxation::default()));
	}
}
