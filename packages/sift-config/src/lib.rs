mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	CircuitBreaker, Config, Filter, FilterRelaxation, LlmProviderConfig, Parser, Providers,
	Ranking, RankingBoosts, RankingWeights, Search, Service,
};

use std::{fs, path::Path};

const WEIGHT_SUM_TOLERANCE: f64 = 0.001;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	let llm = &cfg.providers.llm_parser;

	if llm.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.llm_parser.api_key must be non-empty.".to_string(),
		});
	}
	if llm.model.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.llm_parser.model must be non-empty.".to_string(),
		});
	}
	if llm.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "providers.llm_parser.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if llm.max_tokens == 0 {
		return Err(Error::Validation {
			message: "providers.llm_parser.max_tokens must be greater than zero.".to_string(),
		});
	}
	if !llm.temperature.is_finite() || llm.temperature < 0.0 {
		return Err(Error::Validation {
			message: "providers.llm_parser.temperature must be a finite number zero or greater."
				.to_string(),
		});
	}

	for (key, value) in &llm.default_headers {
		if !value.is_string() {
			return Err(Error::Validation {
				message: format!("providers.llm_parser.default_headers.{key} must be a string."),
			});
		}
	}

	if !cfg.parser.region_utc_offsets_minutes.contains_key(&cfg.parser.default_region) {
		return Err(Error::Validation {
			message: "parser.default_region must have an entry in parser.region_utc_offsets_minutes."
				.to_string(),
		});
	}

	for (region, offset) in &cfg.parser.region_utc_offsets_minutes {
		if offset.abs() > 18 * 60 {
			return Err(Error::Validation {
				message: format!(
					"parser.region_utc_offsets_minutes.{region} must be within +/-1080 minutes."
				),
			});
		}
	}

	if cfg.parser.default_duration_minutes == 0 {
		return Err(Error::Validation {
			message: "parser.default_duration_minutes must be greater than zero.".to_string(),
		});
	}
	if cfg.circuit_breaker.failure_threshold == 0 {
		return Err(Error::Validation {
			message: "circuit_breaker.failure_threshold must be greater than zero.".to_string(),
		});
	}
	if cfg.circuit_breaker.recovery_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "circuit_breaker.recovery_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if !matches!(cfg.search.llm_mode.as_str(), "off" | "auto" | "always") {
		return Err(Error::Validation {
			message: "search.llm_mode must be one of off, auto, or always.".to_string(),
		});
	}
	if cfg.search.candidate_limit == 0 {
		return Err(Error::Validation {
			message: "search.candidate_limit must be greater than zero.".to_string(),
		});
	}
	if cfg.filter.min_results == 0 {
		return Err(Error::Validation {
			message: "filter.min_results must be greater than zero.".to_string(),
		});
	}
	if !cfg.filter.near_me_radius_km.is_finite() || cfg.filter.near_me_radius_km <= 0.0 {
		return Err(Error::Validation {
			message: "filter.near_me_radius_km must be a finite number greater than zero."
				.to_string(),
		});
	}

	for (label, weight) in cfg.ranking.weights.entries() {
		if !weight.is_finite() || weight < 0.0 {
			return Err(Error::Validation {
				message: format!("ranking.weights.{label} must be a finite number zero or greater."),
			});
		}
	}

	if (cfg.ranking.weights.sum() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
		return Err(Error::Validation {
			message: "ranking.weights must sum to 1.0.".to_string(),
		});
	}

	for (label, boost) in [
		("audience", cfg.ranking.boosts.audience),
		("skill_exact", cfg.ranking.boosts.skill_exact),
		("skill_adjacent", cfg.ranking.boosts.skill_adjacent),
	] {
		if !boost.is_finite() || !(0.0..=1.0).contains(&boost) {
			return Err(Error::Validation {
				message: format!("ranking.boosts.{label} must be in the range 0.0-1.0."),
			});
		}
	}

	if cfg.ranking.boosts.skill_adjacent > cfg.ranking.boosts.skill_exact {
		return Err(Error::Validation {
			message: "ranking.boosts.skill_adjacent must not exceed ranking.boosts.skill_exact."
				.to_string(),
		});
	}
	if !cfg.ranking.bayesian_min_reviews.is_finite() || cfg.ranking.bayesian_min_reviews <= 0.0 {
		return Err(Error::Validation {
			message: "ranking.bayesian_min_reviews must be a finite number greater than zero."
				.to_string(),
		});
	}
	if !(0.0..=5.0).contains(&cfg.ranking.default_global_rating) {
		return Err(Error::Validation {
			message: "ranking.default_global_rating must be in the range 0.0-5.0.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.search.llm_mode = cfg.search.llm_mode.trim().to_ascii_lowercase();
	cfg.parser.default_region = cfg.parser.default_region.trim().to_ascii_lowercase();
	cfg.parser.region_utc_offsets_minutes = cfg
		.parser
		.region_utc_offsets_minutes
		.drain()
		.map(|(region, offset)| (region.trim().to_ascii_lowercase(), offset))
		.collect();

	let api_base = cfg.providers.llm_parser.api_base.trim_end_matches('/').to_string();

	cfg.providers.llm_parser.api_base = api_base;
}
