//! OpenAI-compatible chat completions for structured JSON output.

use std::time::Duration;

use reqwest::{Client, header::HeaderMap};
use serde_json::{Value, json};

use crate::{Error, Result};

/// Model families that take `max_completion_tokens` and reject `temperature` overrides.
const COMPLETION_TOKEN_FAMILIES: &[&str] = &["o1", "o3", "o4", "gpt-5"];

/// A named JSON schema the model must answer with.
#[derive(Clone, Copy, Debug)]
pub struct JsonSchema<'a> {
	pub name: &'a str,
	pub schema: &'a Value,
}

pub struct ChatClient {
	client: Client,
	url: String,
	headers: HeaderMap,
	model: String,
	temperature: f32,
	max_tokens: u32,
}
impl ChatClient {
	pub fn new(cfg: &sift_config::LlmProviderConfig) -> Result<Self> {
		let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;

		Ok(Self {
			client,
			url: format!("{}{}", cfg.api_base, cfg.path),
			headers: crate::auth_headers(&cfg.api_key, &cfg.default_headers)?,
			model: cfg.model.clone(),
			temperature: cfg.temperature,
			max_tokens: cfg.max_tokens,
		})
	}

	pub fn model(&self) -> &str {
		&self.model
	}

	pub async fn complete_json(
		&self,
		messages: &[Value],
		schema: Option<JsonSchema<'_>>,
	) -> Result<Value> {
		let body = request_body(&self.model, self.temperature, self.max_tokens, messages, schema);
		let res = self.client.post(&self.url).headers(self.headers.clone()).json(&body).send().await?;
		let status = res.status();

		if !status.is_success() {
			let body = res.text().await.unwrap_or_default();

			return Err(Error::Http { status: status.as_u16(), body });
		}

		let json: Value = res.json().await?;

		parse_chat_json(json)
	}
}

pub fn uses_completion_token_limit(model: &str) -> bool {
	let model = model.rsplit('/').next().unwrap_or(model).to_ascii_lowercase();

	COMPLETION_TOKEN_FAMILIES.iter().any(|family| model.starts_with(family))
}

pub fn request_body(
	model: &str,
	temperature: f32,
	max_tokens: u32,
	messages: &[Value],
	schema: Option<JsonSchema<'_>>,
) -> Value {
	let mut body = json!({
		"model": model,
		"messages": messages,
	});

	if uses_completion_token_limit(model) {
		body["max_completion_tokens"] = json!(max_tokens);
	} else {
		body["max_tokens"] = json!(max_tokens);
		body["temperature"] = json!(temperature);
	}

	body["response_format"] = match schema {
		Some(schema) => json!({
			"type": "json_schema",
			"json_schema": {
				"name": schema.name,
				"strict": true,
				"schema": schema.schema,
			},
		}),
		None => json!({ "type": "json_object" }),
	};

	body
}

/// Pulls the JSON object out of `choices[0].message`, surfacing refusals and empty answers.
pub fn parse_chat_json(json: Value) -> Result<Value> {
	let Some(message) = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
	else {
		return Err(Error::InvalidResponse {
			message: "Chat response is missing choices[0].message.".to_string(),
		});
	};

	if let Some(refusal) = message.get("refusal").and_then(|v| v.as_str())
		&& !refusal.trim().is_empty()
	{
		return Err(Error::Refusal { message: refusal.to_string() });
	}

	let Some(content) = message.get("content").and_then(|c| c.as_str()) else {
		return Err(Error::EmptyContent);
	};
	let content = strip_code_fence(content.trim());

	if content.is_empty() {
		return Err(Error::EmptyContent);
	}

	let parsed: Value = serde_json::from_str(content)?;

	if !parsed.is_object() {
		return Err(Error::InvalidResponse {
			message: "Chat content is not a JSON object.".to_string(),
		});
	}

	Ok(parsed)
}

fn strip_code_fence(content: &str) -> &str {
	let Some(inner) = content.strip_prefix("```") else { return content };
	let inner = inner.strip_prefix("json").unwrap_or(inner);

	inner.strip_suffix("```").unwrap_or(inner).trim()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_choice_content_json() {
		let json = json!({
			"choices": [
				{ "message": { "content": "{\"service_query\": \"piano\"}" } }
			]
		});
		let parsed = parse_chat_json(json).expect("parse failed");

		assert_eq!(parsed["service_query"], "piano");
	}

	#[test]
	fn fenced_content_is_unwrapped() {
		assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
		assert_eq!(strip_code_fence("{\"a\": 1}"), "{\"a\": 1}");
	}

	#[test]
	fn family_detection_ignores_vendor_prefix_and_case() {
		assert!(uses_completion_token_limit("o3-mini"));
		assert!(uses_completion_token_limit("openai/GPT-5-nano"));
		assert!(!uses_completion_token_limit("gpt-4o-mini"));
	}
}
