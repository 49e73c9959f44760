// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use maxims_app::{BOOK_AUTHOR, BOOK_TITLE, MaximContent, Story};
use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_API_KEY_ENV: &str = "API_KEY";
pub const FALLBACK_API_KEY_ENV: &str = "GEMINI_API_KEY";

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("{var} environment variable not set; export your Gemini API key and start again")]
    CredentialMissing { var: String },

    #[error("{message}")]
    Service { message: String },

    #[error("The AI returned a malformed data structure. Please try again.")]
    MalformedResponse { detail: String },

    #[error("AI response was missing required data fields ({}). Please try again.", .missing.join(", "))]
    IncompleteResponse { missing: Vec<String> },
}

impl FetchError {
    /// Only a missing credential stops the program; everything else can be
    /// retried by selecting the maxim again.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::CredentialMissing { .. })
    }

    fn service(message: impl Into<String>) -> Self {
        Self::Service {
            message: message.into(),
        }
    }

    fn malformed(detail: impl Into<String>) -> Self {
        Self::MalformedResponse {
            detail: detail.into(),
        }
    }
}

/// Turns a maxim into its explanation.
pub trait ContentFetcher: Send + Sync {
    fn fetch(&self, maxim: &str) -> Result<MaximContent, FetchError>;
}

#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Reads the key from `var`, then from [`FALLBACK_API_KEY_ENV`].
    pub fn from_env(var: &str) -> Result<Self, FetchError> {
        Self::from_lookup(var, |name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(var: &str, lookup: F) -> Result<Self, FetchError>
    where
        F: Fn(&str) -> Option<String>,
    {
        [var, FALLBACK_API_KEY_ENV]
            .into_iter()
            .filter_map(lookup)
            .map(|value| value.trim().to_owned())
            .find(|value| !value.is_empty())
            .map(Self)
            .ok_or_else(|| FetchError::CredentialMissing {
                var: var.to_owned(),
            })
    }

    fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    model: String,
    api_key: ApiKey,
    timeout: Option<Duration>,
    http: HttpClient,
}

impl Client {
    /// `timeout` of `None` lets a request run for as long as the service
    /// takes.
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: ApiKey,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("llm.base_url must not be empty");
        }
        let parsed = Url::parse(&base_url)
            .with_context(|| format!("llm.base_url {base_url:?} is not a valid URL"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!(
                "llm.base_url {base_url:?} must use http or https, got {}",
                parsed.scheme()
            );
        }
        if model.trim().is_empty() {
            bail!("llm.model must not be empty");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            model: model.trim().to_owned(),
            api_key,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Confirms the key is accepted and the model exists.
    pub fn ping(&self) -> Result<(), FetchError> {
        let response = self
            .http
            .get(format!("{}/models/{}", self.base_url, self.model))
            .header(API_KEY_HEADER, self.api_key.expose())
            .send()
            .map_err(|error| self.connection_error(error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        Ok(())
    }

    /// Sends one prompt with a structured-output schema and returns the raw
    /// model text.
    pub fn generate(&self, prompt: &str, schema: &Value) -> Result<String, FetchError> {
        let request = GenerateContentRequest::new(prompt, schema);
        debug!(model = %self.model, "sending generateContent request");
        let response = self
            .http
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header(API_KEY_HEADER, self.api_key.expose())
            .json(&request)
            .send()
            .map_err(|error| self.connection_error(error))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|error| FetchError::service(format!("read response body: {error}")))?;
        if !status.is_success() {
            return Err(clean_error_response(status, &body));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|error| {
            warn!(%error, "response body is not a generateContent payload");
            FetchError::service("server sent a response that is not a Gemini reply")
        })?;
        parsed.into_text()
    }

    pub fn explain(&self, maxim: &str) -> Result<MaximContent, FetchError> {
        let prompt = build_maxim_prompt(maxim);
        let raw = self.generate(&prompt, &response_schema())?;
        parse_maxim_content(&raw).inspect_err(|error| {
            warn!(%error, detail = ?error, maxim, "model output rejected");
        })
    }

    fn connection_error(&self, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            let limit = self
                .timeout
                .map(|timeout| format!(" after {timeout:?}"))
                .unwrap_or_default();
            return FetchError::service(format!(
                "request to {} timed out{limit}; raise llm.timeout or retry",
                self.base_url
            ));
        }
        FetchError::service(format!(
            "cannot reach {} -- check your network connection and llm.base_url ({error})",
            self.base_url
        ))
    }
}

impl ContentFetcher for Client {
    fn fetch(&self, maxim: &str) -> Result<MaximContent, FetchError> {
        self.explain(maxim)
    }
}

pub fn build_maxim_prompt(maxim: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "You are an expert on {BOOK_AUTHOR}'s book \"{BOOK_TITLE}\".\n"
    ));
    out.push_str("Analyze the following maxim from the book and explain it in depth.\n\n");
    out.push_str(&format!("Maxim: \"{maxim}\"\n\n"));
    out.push_str(&format!(
        "Drawing only on the content and themes of \"{BOOK_TITLE}\", answer in JSON that follows the provided schema:\n"
    ));
    out.push_str("1. meaning: a clear, concise explanation of what the maxim means for building a strong, successful group culture.\n");
    out.push_str("2. stories: one or two specific stories or examples from the book that show the maxim in action. For each story give:\n");
    out.push_str("   - title: a short, descriptive title.\n");
    out.push_str("   - narrative: a summary of the story and how it connects to the maxim.\n");
    out.push_str("   - quote: a direct quote from the book relevant to the story or the maxim.\n\n");
    out.push_str("Echo the maxim unchanged in the maxim field. ");
    out.push_str(&format!(
        "Do not include anything from outside \"{BOOK_TITLE}\" and adhere strictly to the schema.\n"
    ));
    out
}

pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "maxim": {
                "type": "STRING",
                "description": "The maxim exactly as provided."
            },
            "meaning": {
                "type": "STRING",
                "description": format!(
                    "What the maxim means for building strong group cultures, as described in '{BOOK_TITLE}'."
                )
            },
            "stories": {
                "type": "ARRAY",
                "description": format!("One or two stories from '{BOOK_TITLE}' that exemplify the maxim."),
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "title": {
                            "type": "STRING",
                            "description": "A short, compelling title for the story."
                        },
                        "narrative": {
                            "type": "STRING",
                            "description": "A summary of the story and how it connects to the maxim."
                        },
                        "quote": {
                            "type": "STRING",
                            "description": "A relevant quote from the book."
                        }
                    },
                    "required": ["title", "narrative", "quote"]
                }
            }
        },
        "required": ["maxim", "meaning", "stories"]
    })
}

/// Slice from the first `{` to the last `}` inclusive. Model output is
/// sometimes wrapped in code fences or chatter.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

pub fn parse_maxim_content(raw: &str) -> Result<MaximContent, FetchError> {
    let trimmed = raw.trim();
    let json_text = extract_json_object(trimmed).ok_or_else(|| {
        FetchError::malformed(format!("no JSON object in model output: {trimmed:?}"))
    })?;
    let value: Value = serde_json::from_str(json_text)
        .map_err(|error| FetchError::malformed(format!("parse model JSON: {error}")))?;
    validate_content(value)
}

fn validate_content(value: Value) -> Result<MaximContent, FetchError> {
    let Value::Object(mut fields) = value else {
        return Err(FetchError::IncompleteResponse {
            missing: vec!["maxim".to_owned(), "meaning".to_owned(), "stories".to_owned()],
        });
    };

    let mut missing = Vec::new();
    let maxim = take_non_empty_string(&mut fields, "maxim");
    if maxim.is_none() {
        missing.push("maxim".to_owned());
    }
    let meaning = take_non_empty_string(&mut fields, "meaning");
    if meaning.is_none() {
        missing.push("meaning".to_owned());
    }

    let mut stories = Vec::new();
    match fields.remove("stories") {
        Some(Value::Array(items)) => {
            for (index, item) in items.into_iter().enumerate() {
                if !item.is_object() {
                    missing.push(format!("stories[{index}]"));
                    continue;
                }
                match serde_json::from_value::<Story>(item) {
                    Ok(story) => stories.push(story),
                    Err(_) => missing.push(format!("stories[{index}]")),
                }
            }
        }
        _ => missing.push("stories".to_owned()),
    }

    match (maxim, meaning) {
        (Some(maxim), Some(meaning)) if missing.is_empty() => Ok(MaximContent {
            maxim,
            meaning,
            stories,
        }),
        _ => Err(FetchError::IncompleteResponse { missing }),
    }
}

fn take_non_empty_string(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
    match fields.remove(key) {
        Some(Value::String(text)) if !text.is_empty() => Some(text),
        _ => None,
    }
}

fn clean_error_response(status: StatusCode, body: &str) -> FetchError {
    if let Ok(parsed) = serde_json::from_str::<GoogleErrorEnvelope>(body)
        && let Some(error) = parsed.error
        && !error.message.is_empty()
    {
        return FetchError::service(format!(
            "server error ({}): {}",
            status.as_u16(),
            error.message
        ));
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() && trimmed.len() < 100 && !trimmed.contains('{') {
        return FetchError::service(format!("server error ({}): {}", status.as_u16(), trimmed));
    }

    FetchError::service(format!("server returned {}", status.as_u16()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig<'a>,
}

impl<'a> GenerateContentRequest<'a> {
    fn new(prompt: &'a str, schema: &'a Value) -> Self {
        Self {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: schema,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    role: &'a str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'a str,
    response_schema: &'a Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

impl GenerateContentResponse {
    fn into_text(self) -> Result<String, FetchError> {
        let Some(candidate) = self.candidates.into_iter().next() else {
            let reason = self
                .prompt_feedback
                .and_then(|feedback| feedback.block_reason)
                .map(|reason| format!(" (blocked: {reason})"))
                .unwrap_or_default();
            return Err(FetchError::service(format!(
                "no candidates in Gemini response{reason}"
            )));
        };

        let text: String = candidate
            .content
            .map(|content| content.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|part| part.text)
            .collect();
        if text.trim().is_empty() {
            let reason = candidate
                .finish_reason
                .map(|reason| format!(" (finish reason: {reason})"))
                .unwrap_or_default();
            return Err(FetchError::service(format!(
                "Gemini returned an empty answer{reason}"
            )));
        }
        Ok(text)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorEnvelope {
    error: Option<GoogleErrorBody>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    #[serde(default)]
    message: String,
}
