use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use sift_config::{Config, Error};

const SAMPLE_CONFIG_TOML: &str = include_str!("../../../sift.example.toml");

fn sample_toml_with(section: &str, key: &str, value: Value) -> String {
	let mut root: Value = toml::from_str(SAMPLE_CONFIG_TOML).expect("Failed to parse sample config.");
	let mut table = root.as_table_mut().expect("Sample config must be a table.");

	for part in section.split('.') {
		table = table
			.get_mut(part)
			.and_then(Value::as_table_mut)
			.unwrap_or_else(|| panic!("Sample config must include [{section}]."));
	}

	table.insert(key.to_string(), value);

	toml::to_string(&root).expect("Failed to render sample config.")
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("sift_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn base_config() -> Config {
	toml::from_str(SAMPLE_CONFIG_TOML).expect("Failed to parse test config.")
}

#[test]
fn sift_example_toml_is_valid() {
	let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));

	path.push("../../sift.example.toml");

	let cfg = sift_config::load(&path).expect("Expected sift.example.toml to be a valid config.");

	assert_eq!(cfg.parser.default_region, "nyc");
	assert_eq!(cfg.circuit_breaker.failure_threshold, 5);
	assert_eq!(cfg.filter.min_results, 5);
}

#[test]
fn missing_file_reports_read_error() {
	let mut path = env::temp_dir();

	path.push("sift_config_test_missing_file.toml");

	let err = sift_config::load(&path).expect_err("Expected read error.");

	assert!(matches!(err, Error::ReadConfig { .. }), "Unexpected error: {err}");
}

#[test]
fn malformed_toml_reports_parse_error() {
	let path = write_temp_config("[service\nlog_level = ".to_string());
	let result = sift_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let err = result.expect_err("Expected parse error.");

	assert!(matches!(err, Error::ParseConfig { .. }), "Unexpected error: {err}");
}

#[test]
fn llm_mode_must_be_known() {
	let payload = sample_toml_with("search", "llm_mode", Value::String("sometimes".to_string()));
	let path = write_temp_config(payload);
	let result = sift_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let err = result.expect_err("Expected llm_mode validation error.");

	assert!(
		err.to_string().contains("search.llm_mode must be one of off, auto, or always."),
		"Unexpected error: {err}"
	);
}

#[test]
fn llm_mode_is_normalized_before_validation() {
	let payload = sample_toml_with("search", "llm_mode", Value::String(" Always ".to_string()));
	let path = write_temp_config(payload);
	let result = sift_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let cfg = result.expect("Expected normalized llm_mode to validate.");

	assert_eq!(cfg.search.llm_mode, "always");
}

#[test]
fn api_key_must_be_non_empty() {
	let payload =
		sample_toml_with("providers.llm_parser", "api_key", Value::String("   ".to_string()));
	let path = write_temp_config(payload);
	let result = sift_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let err = result.expect_err("Expected api_key validation error.");

	assert!(
		err.to_string().contains("providers.llm_parser.api_key must be non-empty."),
		"Unexpected error: {err}"
	);
}

#[test]
fn llm_timeout_must_be_positive() {
	let mut cfg = base_config();

	cfg.providers.llm_parser.timeout_ms = 0;

	let err = sift_config::validate(&cfg).expect_err("Expected timeout validation error.");

	assert!(
		err.to_string().contains("providers.llm_parser.timeout_ms must be greater than zero."),
		"Unexpected error: {err}"
	);
}

#[test]
fn failure_threshold_must_be_positive() {
	let mut cfg = base_config();

	cfg.circuit_breaker.failure_threshold = 0;

	let err = sift_config::validate(&cfg).expect_err("Expected breaker validation error.");

	assert!(
		err.to_string().contains("circuit_breaker.failure_threshold must be greater than zero."),
		"Unexpected error: {err}"
	);
}

#[test]
fn default_region_must_have_an_offset() {
	let mut cfg = base_config();

	cfg.parser.default_region = "sfo".to_string();

	let err = sift_config::validate(&cfg).expect_err("Expected region validation error.");

	assert!(
		err.to_string().contains("parser.default_region must have an entry"),
		"Unexpected error: {err}"
	);
}

#[test]
fn ranking_weights_must_sum_to_one() {
	let mut cfg = base_config();

	cfg.ranking.weights.relevance = 0.5;

	let err = sift_config::validate(&cfg).expect_err("Expected weight sum validation error.");

	assert!(err.to_string().contains("ranking.weights must sum to 1.0."), "Unexpected error: {err}");
}

#[test]
fn ranking_weights_must_be_non_negative() {
	let mut cfg = base_config();

	cfg.ranking.weights.relevance = 0.45;
	cfg.ranking.weights.completeness = -0.05;

	let err = sift_config::validate(&cfg).expect_err("Expected weight validation error.");

	assert!(
		err.to_string().contains("ranking.weights.completeness must be a finite number"),
		"Unexpected error: {err}"
	);
}

#[test]
fn adjacent_skill_boost_cannot_exceed_exact_boost() {
	let mut cfg = base_config();

	cfg.ranking.boosts.skill_adjacent = 0.08;

	let err = sift_config::validate(&cfg).expect_err("Expected boost validation error.");

	assert!(
		err.to_string().contains("ranking.boosts.skill_adjacent must not exceed"),
		"Unexpected error: {err}"
	);
}

#[test]
fn filter_floor_must_be_positive() {
	let mut cfg = base_config();

	cfg.filter.min_results = 0;

	let err = sift_config::validate(&cfg).expect_err("Expected floor validation error.");

	assert!(
		err.to_string().contains("filter.min_results must be greater than zero."),
		"Unexpected error: {err}"
	);
}

#[test]
fn omitted_filter_and_ranking_sections_use_defaults() {
	let mut root: Value = toml::from_str(SAMPLE_CONFIG_TOML).expect("Failed to parse sample config.");
	let table = root.as_table_mut().expect("Sample config must be a table.");

	table.remove("filter");
	table.remove("ranking");

	let cfg: Config = toml::from_str(&toml::to_string(&root).expect("Failed to render config."))
		.expect("Failed to parse trimmed config.");

	sift_config::validate(&cfg).expect("Expected defaults to validate.");

	assert_eq!(cfg.filter.min_results, 5);
	assert!(cfg.filter.relaxation.time && cfg.filter.relaxation.lesson_type);
	assert!((cfg.ranking.weights.relevance - 0.35).abs() < f64::EPSILON);
	assert!((cfg.ranking.boosts.skill_adjacent - 0.02).abs() < f64::EPSILON);
}
