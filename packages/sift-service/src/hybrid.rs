use std::{str::FromStr, sync::Arc, time::Duration};

use serde::Serialize;

use crate::{
	Error, LlmProvider, Result,
	breaker::CircuitBreaker,
	llm_parser::{FallbackReason, LlmOutcome, LlmParser},
};
use sift_domain::{ParseContext, ParsedQuery, QueryParser};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmMode {
	Off,
	/// Enhance only parses flagged `needs_llm`.
	Auto,
	/// Enhance every parse.
	Always,
}
impl FromStr for LlmMode {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"off" => Ok(Self::Off),
			"auto" => Ok(Self::Auto),
			"always" => Ok(Self::Always),
			other => Err(Error::InvalidRequest { message: format!("unknown llm_mode '{other}'.") }),
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParseDiagnostics {
	pub mode: LlmMode,
	pub needs_llm: bool,
	pub enhanced: bool,
	pub fallback_reason: Option<FallbackReason>,
	pub invalid_llm_fields: Vec<&'static str>,
	pub regex_latency_ms: u64,
	pub total_latency_ms: u64,
}

pub struct HybridParse {
	pub parsed: ParsedQuery,
	pub diagnostics: ParseDiagnostics,
}

pub struct HybridParser {
	regex: Arc<QueryParser>,
	llm: LlmParser,
	mode: LlmMode,
}
impl HybridParser {
	pub fn new(regex: Arc<QueryParser>, llm: LlmParser, mode: LlmMode) -> Self {
		Self { regex, llm, mode }
	}

	pub fn from_config(
		cfg: &sift_config::Config,
		regex: Arc<QueryParser>,
		provider: Arc<dyn LlmProvider>,
		breaker: Arc<CircuitBreaker>,
	) -> Result<Self> {
		let mode = cfg.search.llm_mode.parse::<LlmMode>()?;
		let timeout = Duration::from_millis(cfg.providers.llm_parser.timeout_ms);

		Ok(Self::new(regex, LlmParser::new(provider, breaker, timeout), mode))
	}

	pub fn regex(&self) -> &QueryParser {
		&self.regex
	}

	pub fn breaker(&self) -> &CircuitBreaker {
		self.llm.breaker()
	}

	pub async fn parse(&self, text: &str, ctx: &ParseContext) -> HybridParse {
		let regex = self.regex.parse(text, ctx);
		let needs_llm = regex.needs_llm;
		let regex_latency_ms = regex.parsing_latency_ms;
		let outcome = match self.mode {
			LlmMode::Off => LlmOutcome::Fallback { parsed: regex, reason: FallbackReason::Disabled },
			LlmMode::Auto => self.llm.enhance(regex, self.regex.local_now(ctx)).await,
			LlmMode::Always => self.llm.enhance_unconditionally(regex, self.regex.local_now(ctx)).await,
		};
		let fallback_reason = outcome.fallback_reason();
		let (parsed, invalid_llm_fields) = match outcome {
			LlmOutcome::Enhanced { parsed, invalid_fields } => (parsed, invalid_fields),
			LlmOutcome::Fallback { parsed, .. } => (parsed, Vec::new()),
		};

		tracing::debug!(
			mode = ?self.mode,
			needs_llm,
			parsing_mode = parsed.parsing_mode.as_str(),
			fallback = fallback_reason.map(FallbackReason::as_str),
			"Query parsed."
		);

		HybridParse {
			diagnostics: ParseDiagnostics {
				mode: self.mode,
				needs_llm,
				enhanced: fallback_reason.is_none(),
				fallback_reason,
				invalid_llm_fields,
				regex_latency_ms,
				total_latency_ms: parsed.parsing_latency_ms,
			},
			parsed,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn llm_mode_parses_case_insensitively() {
		assert_eq!(" Always ".parse::<LlmMode>().ok(), Some(LlmMode::Always));
		assert_eq!("off".parse::<LlmMode>().ok(), Some(LlmMode::Off));
		assert!("sometimes".parse::<LlmMode>().is_err());
	}
}
