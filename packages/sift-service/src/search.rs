use std::{sync::Arc, time::Instant};

use serde::Serialize;

use crate::{
	Collaborators, Error, Result,
	breaker::{BreakerSnapshot, CircuitBreaker},
	filter::{FilterRequest, FilterResult, FilterService},
	hybrid::{HybridParser, ParseDiagnostics},
	models::{GeoPoint, RankedResult},
	ranking::{RankingRequest, RankingService},
};
use sift_domain::{Clock, ParseContext, ParsedQuery, QueryParser};

#[derive(Clone, Debug, Default)]
pub struct SearchRequest {
	pub query: String,
	pub user_id: Option<String>,
	pub region: Option<String>,
	pub user_location: Option<GeoPoint>,
	/// Candidates to retrieve; defaults to `search.candidate_limit`.
	pub limit: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchDiagnostics {
	pub parse: ParseDiagnostics,
	pub retrieve_ms: u64,
	pub filter_ms: u64,
	pub rank_ms: u64,
	pub total_ms: u64,
	pub candidates_retrieved: usize,
	pub candidates_after_filter: usize,
	pub relaxed: Vec<&'static str>,
	pub breaker: BreakerSnapshot,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchResponse {
	pub query: ParsedQuery,
	pub results: Vec<RankedResult>,
	pub total_found: usize,
	pub filter: FilterResult,
	pub ranking_signals_used: Vec<&'static str>,
	pub diagnostics: SearchDiagnostics,
}

pub struct SearchService {
	parser: HybridParser,
	collaborators: Collaborators,
	filter: FilterService,
	ranking: RankingService,
	candidate_limit: u32,
}
impl SearchService {
	pub fn new(
		cfg: &sift_config::Config,
		collaborators: Collaborators,
		parser: Arc<QueryParser>,
		breaker: Arc<CircuitBreaker>,
		clock: Arc<dyn Clock>,
	) -> Result<Self> {
		let hybrid = HybridParser::from_config(cfg, parser, collaborators.llm.clone(), breaker)?;
		let filter = FilterService::new(
			cfg.filter.clone(),
			collaborators.locations.clone(),
			collaborators.availability.clone(),
			collaborators.catalog.clone(),
			collaborators.distances.clone(),
		);
		let ranking = RankingService::new(
			cfg.ranking.clone(),
			collaborators.instructors.clone(),
			collaborators.catalog.clone(),
			collaborators.distances.clone(),
			clock,
		);

		Ok(Self {
			parser: hybrid,
			collaborators,
			filter,
			ranking,
			candidate_limit: cfg.search.candidate_limit,
		})
	}

	pub fn parser(&self) -> &HybridParser {
		&self.parser
	}

	pub fn ranking(&self) -> &RankingService {
		&self.ranking
	}

	/// Runs parse, retrieval, filtering, and ranking. Only a retriever failure is an error;
	/// every other collaborator degrades in place.
	pub async fn search(&self, req: SearchRequest) -> Result<SearchResponse> {
		let started = Instant::now();
		let text = req.query.trim();

		if text.is_empty() {
			return Err(Error::InvalidRequest { message: "query must not be empty.".to_string() });
		}

		let limit = req.limit.unwrap_or(self.candidate_limit);

		if limit == 0 {
			return Err(Error::InvalidRequest { message: "limit must be greater than zero.".to_string() });
		}

		let ctx = ParseContext { user_id: req.user_id.clone(), region: req.region.clone() };
		let parse = self.parser.parse(text, &ctx).await;
		let query = parse.parsed;
		let retrieve_started = Instant::now();
		let candidates = self.collaborators.retriever.retrieve(&query, limit).await.map_err(|err| {
			tracing::error!(error = %err, "Candidate retrieval failed.");

			match err {
				Error::Retrieval { .. } => err,
				other => Error::Retrieval { message: other.to_string() },
			}
		})?;
		let retrieve_ms = elapsed_ms(retrieve_started);
		let candidates_retrieved = candidates.len();
		let filter_started = Instant::now();
		let filter = self
			.filter
			.filter(FilterRequest {
				query: &query,
				candidates,
				user_location: req.user_location,
				today: self.parser.regex().local_today(&ctx),
			})
			.await;
		let filter_ms = elapsed_ms(filter_started);
		let rank_started = Instant::now();
		let ranked = self
			.ranking
			.rank(RankingRequest {
				query: &query,
				candidates: filter.candidates.clone(),
				user_location: req.user_location,
			})
			.await;
		let rank_ms = elapsed_ms(rank_started);
		let diagnostics = SearchDiagnostics {
			parse: parse.diagnostics,
			retrieve_ms,
			filter_ms,
			rank_ms,
			total_ms: elapsed_ms(started),
			candidates_retrieved,
			candidates_after_filter: filter.total_after_filter,
			relaxed: filter.relaxed.clone(),
			breaker: self.parser.breaker().snapshot(),
		};

		tracing::info!(
			parsing_mode = query.parsing_mode.as_str(),
			retrieved = candidates_retrieved,
			after_filter = filter.total_after_filter,
			results = ranked.results.len(),
			total_ms = diagnostics.total_ms,
			"Search completed."
		);

		Ok(SearchResponse {
			total_found: ranked.results.len(),
			results: ranked.results,
			query,
			filter,
			ranking_signals_used: ranked.ranking_signals_used,
			diagnostics,
		})
	}
}

fn elapsed_ms(started: Instant) -> u64 {
	started.elapsed().as_millis() as u64
}
