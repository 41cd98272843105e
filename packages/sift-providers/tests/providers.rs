use reqwest::header::AUTHORIZATION;
use serde_json::{Map, Value, json};

use sift_providers::{
	Error,
	chat::{self, JsonSchema},
};

fn messages() -> Vec<Value> {
	vec![json!({ "role": "user", "content": "piano or guitar lessons" })]
}

#[test]
fn builds_bearer_auth_header() {
	let headers =
		sift_providers::auth_headers("secret", &Map::new()).expect("Failed to build headers.");
	let value = headers.get(AUTHORIZATION).expect("Missing authorization header.");

	assert_eq!(value, "Bearer secret");
}

#[test]
fn rejects_non_string_default_headers() {
	let mut defaults = Map::new();

	defaults.insert("x-retries".to_string(), json!(3));

	let err = sift_providers::auth_headers("secret", &defaults)
		.expect_err("Expected non-string header value to be rejected.");

	assert!(matches!(err, Error::InvalidConfig { .. }));
}

#[test]
fn classic_models_send_max_tokens_and_temperature() {
	let body = chat::request_body("gpt-4o-mini", 0.1, 500, &messages(), None);

	assert_eq!(body["max_tokens"], 500);
	assert!(body["temperature"].is_number());
	assert!(body.get("max_completion_tokens").is_none());
	assert_eq!(body["response_format"]["type"], "json_object");
}

#[test]
fn reasoning_models_send_completion_token_limit_without_temperature() {
	for model in ["o1-mini", "o3", "o4-mini", "gpt-5-nano"] {
		let body = chat::request_body(model, 0.1, 500, &messages(), None);

		assert_eq!(body["max_completion_tokens"], 500, "model {model}");
		assert!(body.get("temperature").is_none(), "model {model}");
		assert!(body.get("max_tokens").is_none(), "model {model}");
	}
}

#[test]
fn schema_is_sent_as_strict_json_schema() {
	let schema = json!({ "type": "object", "properties": {} });
	let body = chat::request_body(
		"gpt-4o-mini",
		0.1,
		500,
		&messages(),
		Some(JsonSchema { name: "parsed_query", schema: &schema }),
	);

	assert_eq!(body["response_format"]["type"], "json_schema");
	assert_eq!(body["response_format"]["json_schema"]["name"], "parsed_query");
	assert_eq!(body["response_format"]["json_schema"]["strict"], true);
	assert_eq!(body["response_format"]["json_schema"]["schema"], schema);
}

#[test]
fn refusals_are_reported() {
	let json = json!({
		"choices": [{ "message": { "content": null, "refusal": "I can't help with that." } }]
	});
	let err = chat::parse_chat_json(json).expect_err("Expected refusal.");

	assert!(matches!(err, Error::Refusal { .. }));
}

#[test]
fn empty_content_is_reported() {
	let json = json!({ "choices": [{ "message": { "content": "   " } }] });

	assert!(matches!(chat::parse_chat_json(json), Err(Error::EmptyContent)));

	let json = json!({ "choices": [{ "message": {} }] });

	assert!(matches!(chat::parse_chat_json(json), Err(Error::EmptyContent)));
}

#[test]
fn non_json_content_is_an_error() {
	let json = json!({ "choices": [{ "message": { "content": "piano lessons" } }] });

	assert!(matches!(chat::parse_chat_json(json), Err(Error::SerdeJson(_))));

	let json = json!({ "choices": [{ "message": { "content": "[1, 2]" } }] });

	assert!(matches!(chat::parse_chat_json(json), Err(Error::InvalidResponse { .. })));
}

#[test]
fn missing_choices_is_an_invalid_response() {
	assert!(matches!(
		chat::parse_chat_json(json!({ "error": "boom" })),
		Err(Error::InvalidResponse { .. })
	));
}
