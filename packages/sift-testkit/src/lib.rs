//! In-memory collaborators and fixtures for the sift integration tests.
//!
//! Every fake counts its calls so tests can assert that lookups are batched, and most can be
//! switched to fail so degradation paths are reachable without a network.

mod error;

pub use error::{Error, Result};

use std::{
	collections::{HashMap, VecDeque},
	sync::{
		Arc, Mutex, Once,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
	time::Duration,
};

use serde_json::Value;
use time::{Date, OffsetDateTime, macros::datetime};
use tracing_subscriber::EnvFilter;

use sift_config::Config;
use sift_domain::{
	ClockTime, FixedClock, LocationType, ParsedQuery, ParserSettings, QueryParser, ReferenceData,
	StaticTimezones,
};
use sift_providers::chat::JsonSchema;
use sift_service::{
	AvailabilityRepository, BoxFuture, CatalogRepository, Collaborators, DistanceRepository,
	GeoPoint, InstructorMetrics, InstructorRepository, LlmProvider, LocationResolution,
	LocationResolver, OpenSlot, ResolvedLocation, Retriever, ServiceCandidate, ServiceCoverage,
	ServiceTags,
};

const SAMPLE_CONFIG_TOML: &str = include_str!("../../../sift.example.toml");

/// Friday 2026-10-16, 10:00 in New York.
pub const NOW: OffsetDateTime = datetime!(2026-10-16 15:00 UTC);

/// Installs a test-writer subscriber once. `RUST_LOG` wins over the sample `service.log_level`.
pub fn init_tracing() {
	static INIT: Once = Once::new();

	INIT.call_once(|| {
		let fallback = sample_config()
			.map(|cfg| cfg.service.log_level)
			.unwrap_or_else(|_| "warn".to_string());
		let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
		let _ = tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init();
	});
}

/// The sample config shipped with the repository, validated.
pub fn sample_config() -> Result<Config> {
	let cfg: Config = toml::from_str(SAMPLE_CONFIG_TOML)?;

	sift_config::validate(&cfg)?;

	Ok(cfg)
}

pub fn fixed_clock() -> Arc<FixedClock> {
	Arc::new(FixedClock(NOW))
}

pub fn query_parser(cfg: &Config) -> Result<Arc<QueryParser>> {
	let settings = ParserSettings::from_config(&cfg.parser)?;
	let parser = QueryParser::new(
		settings,
		ReferenceData::builtin(),
		Arc::new(StaticTimezones::default()),
		fixed_clock(),
	)?;

	Ok(Arc::new(parser))
}

pub fn day(day: u8) -> Date {
	Date::from_calendar_date(2026, time::Month::October, day).unwrap_or(Date::MIN)
}

pub fn candidate(service_id: &str, instructor_id: &str, hybrid_score: f64) -> ServiceCandidate {
	ServiceCandidate {
		service_id: service_id.to_string(),
		service_catalog_id: format!("catalog-{service_id}"),
		instructor_id: instructor_id.to_string(),
		hybrid_score,
		vector_score: Some(hybrid_score),
		text_score: None,
		name: format!("Lesson {service_id}"),
		description: String::new(),
		price_per_hour: None,
	}
}

pub fn slot(date: Date, start: (u8, u8), end: (u8, u8)) -> OpenSlot {
	OpenSlot {
		date,
		start: ClockTime::new(start.0, start.1).unwrap_or(ClockTime::MIDNIGHT),
		end: ClockTime::new(end.0, end.1).unwrap_or(ClockTime::MIDNIGHT),
	}
}

pub fn resolved(
	name: &str,
	location_type: LocationType,
	region_id: Option<&str>,
	borough: Option<&str>,
) -> ResolvedLocation {
	ResolvedLocation {
		name: name.to_string(),
		location_type,
		region_id: region_id.map(str::to_string),
		borough: borough.map(str::to_string),
	}
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(|err| err.into_inner())
}

fn injected(what: &str) -> sift_service::Error {
	sift_service::Error::Repository { message: format!("injected {what} failure.") }
}

#[derive(Default)]
pub struct FakeRetriever {
	pub candidates: Mutex<Vec<ServiceCandidate>>,
	pub fail: AtomicBool,
	pub calls: AtomicUsize,
	pub last_limit: Mutex<Option<u32>>,
}
impl FakeRetriever {
	pub fn with(candidates: Vec<ServiceCandidate>) -> Self {
		Self { candidates: Mutex::new(candidates), ..Self::default() }
	}
}
impl Retriever for FakeRetriever {
	fn retrieve<'a>(
		&'a self,
		_query: &'a ParsedQuery,
		limit: u32,
	) -> BoxFuture<'a, sift_service::Result<Vec<ServiceCandidate>>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);
			*lock(&self.last_limit) = Some(limit);

			if self.fail.load(Ordering::SeqCst) {
				return Err(sift_service::Error::Retrieval {
					message: "injected retrieval failure.".to_string(),
				});
			}

			Ok(lock(&self.candidates).iter().take(limit as usize).cloned().collect())
		})
	}
}

/// Resolves by lowercase text; unknown text is not found.
#[derive(Default)]
pub struct FakeLocations {
	pub entries: HashMap<String, LocationResolution>,
	pub fail: AtomicBool,
	pub calls: AtomicUsize,
}
impl FakeLocations {
	pub fn insert(&mut self, text: &str, resolution: LocationResolution) {
		self.entries.insert(text.to_ascii_lowercase(), resolution);
	}
}
impl LocationResolver for FakeLocations {
	fn resolve<'a>(
		&'a self,
		text: &'a str,
		_location_type: Option<LocationType>,
	) -> BoxFuture<'a, sift_service::Result<LocationResolution>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			if self.fail.load(Ordering::SeqCst) {
				return Err(injected("location"));
			}

			Ok(self
				.entries
				.get(&text.to_ascii_lowercase())
				.cloned()
				.unwrap_or(LocationResolution::NotFound))
		})
	}
}

/// Returns only slots inside the requested window.
#[derive(Default)]
pub struct FakeAvailability {
	pub slots: HashMap<String, Vec<OpenSlot>>,
	pub fail: AtomicBool,
	pub calls: AtomicUsize,
	pub last_window: Mutex<Option<(Date, Date)>>,
}
impl AvailabilityRepository for FakeAvailability {
	fn open_slots<'a>(
		&'a self,
		instructor_ids: &'a [String],
		start: Date,
		end: Date,
	) -> BoxFuture<'a, sift_service::Result<HashMap<String, Vec<OpenSlot>>>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);
			*lock(&self.last_window) = Some((start, end));

			if self.fail.load(Ordering::SeqCst) {
				return Err(injected("availability"));
			}

			let mut out = HashMap::new();

			for id in instructor_ids {
				let Some(slots) = self.slots.get(id) else { continue };
				let in_window: Vec<OpenSlot> = slots
					.iter()
					.filter(|slot| slot.date >= start && slot.date <= end)
					.copied()
					.collect();

				if !in_window.is_empty() {
					out.insert(id.clone(), in_window);
				}
			}

			Ok(out)
		})
	}
}

#[derive(Default)]
pub struct FakeCatalog {
	pub coverage: HashMap<String, ServiceCoverage>,
	pub tags: HashMap<String, ServiceTags>,
	pub fail_coverage: AtomicBool,
	pub fail_tags: AtomicBool,
	pub coverage_calls: AtomicUsize,
	pub tag_calls: AtomicUsize,
}
impl CatalogRepository for FakeCatalog {
	fn coverage<'a>(
		&'a self,
		service_ids: &'a [String],
	) -> BoxFuture<'a, sift_service::Result<HashMap<String, ServiceCoverage>>> {
		Box::pin(async move {
			self.coverage_calls.fetch_add(1, Ordering::SeqCst);

			if self.fail_coverage.load(Ordering::SeqCst) {
				return Err(injected("coverage"));
			}

			Ok(pick(&self.coverage, service_ids))
		})
	}

	fn tags<'a>(
		&'a self,
		service_ids: &'a [String],
	) -> BoxFuture<'a, sift_service::Result<HashMap<String, ServiceTags>>> {
		Box::pin(async move {
			self.tag_calls.fetch_add(1, Ordering::SeqCst);

			if self.fail_tags.load(Ordering::SeqCst) {
				return Err(injected("tags"));
			}

			Ok(pick(&self.tags, service_ids))
		})
	}
}

pub struct FakeInstructors {
	pub metrics: HashMap<String, InstructorMetrics>,
	pub global_rating: f64,
	pub fail_metrics: AtomicBool,
	pub fail_global: AtomicBool,
	pub metrics_calls: AtomicUsize,
	pub global_calls: AtomicUsize,
}
impl Default for FakeInstructors {
	fn default() -> Self {
		Self {
			metrics: HashMap::new(),
			global_rating: 4.5,
			fail_metrics: AtomicBool::new(false),
			fail_global: AtomicBool::new(false),
			metrics_calls: AtomicUsize::new(0),
			global_calls: AtomicUsize::new(0),
		}
	}
}
impl InstructorRepository for FakeInstructors {
	fn metrics<'a>(
		&'a self,
		instructor_ids: &'a [String],
	) -> BoxFuture<'a, sift_service::Result<HashMap<String, InstructorMetrics>>> {
		Box::pin(async move {
			self.metrics_calls.fetch_add(1, Ordering::SeqCst);

			if self.fail_metrics.load(Ordering::SeqCst) {
				return Err(injected("metrics"));
			}

			Ok(pick(&self.metrics, instructor_ids))
		})
	}

	fn global_average_rating<'a>(&'a self) -> BoxFuture<'a, sift_service::Result<f64>> {
		Box::pin(async move {
			self.global_calls.fetch_add(1, Ordering::SeqCst);

			if self.fail_global.load(Ordering::SeqCst) {
				return Err(injected("global rating"));
			}

			Ok(self.global_rating)
		})
	}
}

/// Fixed distances that ignore the origin.
#[derive(Default)]
pub struct FakeDistances {
	pub distances: HashMap<String, f64>,
	pub fail: AtomicBool,
	pub calls: AtomicUsize,
}
impl DistanceRepository for FakeDistances {
	fn distances<'a>(
		&'a self,
		instructor_ids: &'a [String],
		_origin: GeoPoint,
	) -> BoxFuture<'a, sift_service::Result<HashMap<String, f64>>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			if self.fail.load(Ordering::SeqCst) {
				return Err(injected("distance"));
			}

			Ok(pick(&self.distances, instructor_ids))
		})
	}
}

#[derive(Clone, Debug)]
pub enum ScriptedReply {
	Json(Value),
	Refusal(String),
	Empty,
	Http(u16),
}

/// Replays queued replies in order, then repeats the fallback reply.
pub struct ScriptedLlm {
	pub replies: Mutex<VecDeque<ScriptedReply>>,
	pub fallback: ScriptedReply,
	pub delay: Option<Duration>,
	pub calls: AtomicUsize,
}
impl ScriptedLlm {
	pub fn always(reply: ScriptedReply) -> Self {
		Self {
			replies: Mutex::new(VecDeque::new()),
			fallback: reply,
			delay: None,
			calls: AtomicUsize::new(0),
		}
	}

	pub fn delayed(reply: ScriptedReply, delay: Duration) -> Self {
		Self { delay: Some(delay), ..Self::always(reply) }
	}

	pub fn push(&self, reply: ScriptedReply) {
		lock(&self.replies).push_back(reply);
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl LlmProvider for ScriptedLlm {
	fn complete_json<'a>(
		&'a self,
		_messages: &'a [Value],
		_schema: JsonSchema<'a>,
	) -> BoxFuture<'a, sift_providers::Result<Value>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			let reply = lock(&self.replies).pop_front().unwrap_or_else(|| self.fallback.clone());

			if let Some(delay) = self.delay {
				tokio::time::sleep(delay).await;
			}

			match reply {
				ScriptedReply::Json(value) => Ok(value),
				ScriptedReply::Refusal(message) => Err(sift_providers::Error::Refusal { message }),
				ScriptedReply::Empty => Err(sift_providers::Error::EmptyContent),
				ScriptedReply::Http(status) =>
					Err(sift_providers::Error::Http { status, body: "injected".to_string() }),
			}
		})
	}
}

/// Handles to every fake, kept so tests can seed data and read counters after wiring.
#[derive(Clone)]
pub struct Fakes {
	pub retriever: Arc<FakeRetriever>,
	pub locations: Arc<FakeLocations>,
	pub availability: Arc<FakeAvailability>,
	pub catalog: Arc<FakeCatalog>,
	pub instructors: Arc<FakeInstructors>,
	pub distances: Arc<FakeDistances>,
	pub llm: Arc<ScriptedLlm>,
}
impl Fakes {
	pub fn collaborators(&self) -> Collaborators {
		Collaborators {
			retriever: self.retriever.clone(),
			locations: self.locations.clone(),
			availability: self.availability.clone(),
			catalog: self.catalog.clone(),
			instructors: self.instructors.clone(),
			distances: self.distances.clone(),
			llm: self.llm.clone(),
		}
	}
}
impl Default for Fakes {
	fn default() -> Self {
		Self {
			retriever: Arc::new(FakeRetriever::default()),
			locations: Arc::new(FakeLocations::default()),
			availability: Arc::new(FakeAvailability::default()),
			catalog: Arc::new(FakeCatalog::default()),
			instructors: Arc::new(FakeInstructors::default()),
			distances: Arc::new(FakeDistances::default()),
			llm: Arc::new(ScriptedLlm::always(ScriptedReply::Empty)),
		}
	}
}

fn pick<T: Clone>(source: &HashMap<String, T>, ids: &[String]) -> HashMap<String, T> {
	ids.iter().filter_map(|id| source.get(id).map(|value| (id.clone(), value.clone()))).collect()
}
