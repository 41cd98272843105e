pub mod breaker;
pub mod filter;
pub mod hybrid;
pub mod llm_parser;
pub mod models;
pub mod ranking;
pub mod search;

mod error;

pub use breaker::{BreakerError, BreakerSnapshot, CircuitBreaker, CircuitState};
pub use error::{Error, Result};
pub use filter::{FilterRequest, FilterResult, FilterService, FilterStat, LocationOutcome};
pub use hybrid::{HybridParse, HybridParser, LlmMode, ParseDiagnostics};
pub use llm_parser::{FallbackReason, LlmOutcome, LlmParser};
pub use models::{
	FilteredCandidate, GeoPoint, InstructorMetrics, LocationResolution, OpenSlot, RankedResult,
	ResolvedLocation, ServiceCandidate, ServiceCoverage, ServiceTags,
};
pub use ranking::{RankingRequest, RankingResult, RankingService};
pub use search::{SearchDiagnostics, SearchRequest, SearchResponse, SearchService};

use std::{
	collections::{HashMap, HashSet},
	future::Future,
	pin::Pin,
	sync::Arc,
};

use serde_json::Value;
use time::Date;

use sift_config::LlmProviderConfig;
use sift_domain::{LocationType, ParsedQuery};
use sift_providers::chat::{ChatClient, JsonSchema};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Supplies pre-scored candidates for a parsed query, best first.
pub trait Retriever
where
	Self: Send + Sync,
{
	fn retrieve<'a>(
		&'a self,
		query: &'a ParsedQuery,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<ServiceCandidate>>>;
}

pub trait LocationResolver
where
	Self: Send + Sync,
{
	fn resolve<'a>(
		&'a self,
		text: &'a str,
		location_type: Option<LocationType>,
	) -> BoxFuture<'a, Result<LocationResolution>>;
}

/// Batched lookups return only the entries they know about; missing keys are not errors.
pub trait AvailabilityRepository
where
	Self: Send + Sync,
{
	fn open_slots<'a>(
		&'a self,
		instructor_ids: &'a [String],
		start: Date,
		end: Date,
	) -> BoxFuture<'a, Result<HashMap<String, Vec<OpenSlot>>>>;
}

pub trait CatalogRepository
where
	Self: Send + Sync,
{
	fn coverage<'a>(
		&'a self,
		service_ids: &'a [String],
	) -> BoxFuture<'a, Result<HashMap<String, ServiceCoverage>>>;

	fn tags<'a>(
		&'a self,
		service_ids: &'a [String],
	) -> BoxFuture<'a, Result<HashMap<String, ServiceTags>>>;
}

pub trait InstructorRepository
where
	Self: Send + Sync,
{
	fn metrics<'a>(
		&'a self,
		instructor_ids: &'a [String],
	) -> BoxFuture<'a, Result<HashMap<String, InstructorMetrics>>>;

	fn global_average_rating<'a>(&'a self) -> BoxFuture<'a, Result<f64>>;
}

/// Kilometers from `origin` to each instructor's teaching location.
pub trait DistanceRepository
where
	Self: Send + Sync,
{
	fn distances<'a>(
		&'a self,
		instructor_ids: &'a [String],
		origin: GeoPoint,
	) -> BoxFuture<'a, Result<HashMap<String, f64>>>;
}

pub trait LlmProvider
where
	Self: Send + Sync,
{
	fn complete_json<'a>(
		&'a self,
		messages: &'a [Value],
		schema: JsonSchema<'a>,
	) -> BoxFuture<'a, sift_providers::Result<Value>>;
}

#[derive(Clone)]
pub struct Collaborators {
	pub retriever: Arc<dyn Retriever>,
	pub locations: Arc<dyn LocationResolver>,
	pub availability: Arc<dyn AvailabilityRepository>,
	pub catalog: Arc<dyn CatalogRepository>,
	pub instructors: Arc<dyn InstructorRepository>,
	pub distances: Arc<dyn DistanceRepository>,
	pub llm: Arc<dyn LlmProvider>,
}

impl LlmProvider for ChatClient {
	fn complete_json<'a>(
		&'a self,
		messages: &'a [Value],
		schema: JsonSchema<'a>,
	) -> BoxFuture<'a, sift_providers::Result<Value>> {
		Box::pin(ChatClient::complete_json(self, messages, Some(schema)))
	}
}

/// The OpenAI-compatible HTTP client configured under `providers.llm_parser`.
pub fn default_llm_provider(cfg: &LlmProviderConfig) -> Result<Arc<dyn LlmProvider>> {
	Ok(Arc::new(ChatClient::new(cfg)?))
}

/// Distinct ids in first-seen order, ready for one batched lookup.
pub(crate) fn unique_ids<'a>(ids: impl Iterator<Item = &'a str>) -> Vec<String> {
	let mut seen = HashSet::new();

	ids.filter(|id| seen.insert(*id)).map(str::to_string).collect()
}
