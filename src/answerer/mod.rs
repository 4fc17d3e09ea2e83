// Answer generation module
// Forwards the best retrieved pattern to a chat-completion endpoint
// and splits the reply into an explanation and a code sample


use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::config::GenerationConfig;
use crate::database::lancedb::PatternMatch;
use crate::{PatternError, Result};

const FENCE: &str = "```";

/// Reply used when retrieval found nothing. The remote endpoint is
/// never invoked in that case.
pub const NO_MATCH_MESSAGE: &str = "Sorry, no matching pattern found.";

const SYSTEM_PROMPT: &str = "You are an assistant that explains catalogued code patterns in \
simple, human-friendly language and always includes a short working code example.";

/// Seam for the remote text-generation endpoint, so tests can count
/// and script calls without a network.
pub trait GenerationBackend {
    fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

/// Explanation plus code sample extracted from a model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub explanation: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: String,
}

/// Client for an OpenAI-compatible chat-completion endpoint.
///
/// The request blocks until the endpoint replies or the timeout fires;
/// retry policy is left to the caller.
pub struct OpenRouterClient {
    endpoint: Url,
    model: String,
    api_key: String,
    agent: ureq::Agent,
}

impl OpenRouterClient {
    /// Build a client from config, reading the API key from the
    /// configured environment variable.
    #[inline]
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let endpoint = config
            .endpoint()
            .map_err(|e| PatternError::Config(e.to_string()))?;
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            PatternError::Config(format!(
                "API key environment variable '{}' is not set",
                config.api_key_env
            ))
        })?;

        Ok(Self::from_parts(
            endpoint,
            config.model.clone(),
            api_key,
            Duration::from_secs(config.timeout_seconds),
        ))
    }

    /// Build a client from explicit parts.
    #[inline]
    pub fn from_parts(endpoint: Url, model: String, api_key: String, timeout: Duration) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();

        Self {
            endpoint,
            model,
            api_key,
            agent,
        }
    }
}

impl GenerationBackend for OpenRouterClient {
    #[inline]
    fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| PatternError::Generation(format!("Failed to serialize request: {e}")))?;

        debug!("Requesting completion from {}", self.endpoint);
        let authorization = format!("Bearer {}", self.api_key);
        let response_text = self
            .agent
            .post(self.endpoint.as_str())
            .header("Authorization", authorization.as_str())
            .header("Content-Type", "application/json")
            .send(&body)
            .and_then(|mut response| response.body_mut().read_to_string())
            .map_err(|e| PatternError::Generation(format!("Completion request failed: {e}")))?;

        let response: ChatResponse = serde_json::from_str(&response_text).map_err(|e| {
            PatternError::Generation(format!("Malformed completion response: {e}"))
        })?;

        let Some(choice) = response.choices.into_iter().next() else {
            return Err(PatternError::Generation(
                "Completion response contained no choices".to_string(),
            ));
        };

        Ok(choice.message.content)
    }
}

/// Produce the final answer for `query` from the best match, if any.
///
/// With no match the fixed no-match reply is returned and the backend
/// is not called at all.
#[inline]
pub fn generate_answer(
    query: &str,
    best: Option<&PatternMatch>,
    backend: &dyn GenerationBackend,
) -> Result<Answer> {
    let Some(best) = best else {
        info!("No matching pattern; skipping the generation call");
        return Ok(Answer {
            explanation: NO_MATCH_MESSAGE.to_string(),
            code: String::new(),
        });
    };

    let prompt = build_prompt(query, &best.text);
    let reply = backend.complete(SYSTEM_PROMPT, &prompt)?;
    Ok(split_reply(&reply))
}

/// Instructional prompt embedding the query and the retrieved pattern.
fn build_prompt(query: &str, pattern_text: &str) -> String {
    format!(
        "User asked: {query}\n\nRetrieved pattern:\n{pattern_text}\n\n\
         Explain this pattern in simple, human-friendly language and \
         include a short working code example."
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FenceState {
    Outside,
    Inside,
}

/// Split a model reply into explanation and code.
///
/// A small two-state scan over triple-backtick delimiters: the text
/// before the first fence becomes the explanation and the first fenced
/// body becomes the code, with a language tag word after the opening
/// delimiter dropped. A reply with no fence, or with an opening fence
/// that never closes, is returned whole as the explanation with empty
/// code.
#[inline]
pub fn split_reply(reply: &str) -> Answer {
    let mut state = FenceState::Outside;
    let mut explanation: Option<&str> = None;
    let mut code: Option<&str> = None;

    let mut segment_start = 0;
    let mut cursor = 0;
    while let Some(offset) = reply[cursor..].find(FENCE) {
        let fence_at = cursor + offset;
        match state {
            FenceState::Outside => {
                if explanation.is_none() {
                    explanation = Some(&reply[segment_start..fence_at]);
                }
                state = FenceState::Inside;
            }
            FenceState::Inside => {
                if code.is_none() {
                    code = Some(&reply[segment_start..fence_at]);
                }
                state = FenceState::Outside;
            }
        }
        cursor = fence_at + FENCE.len();
        segment_start = cursor;
        if code.is_some() {
            break;
        }
    }

    match (explanation, code) {
        (Some(explanation), Some(code)) => Answer {
            explanation: explanation.trim().to_string(),
            code: strip_language_tag(code).trim().to_string(),
        },
        _ => Answer {
            explanation: reply.trim().to_string(),
            code: String::new(),
        },
    }
}

/// Drop a language tag word sitting between the opening delimiter and
/// the first newline (e.g. the `rust` in ```` ```rust ````).
fn strip_language_tag(code: &str) -> &str {
    let Some((first_line, rest)) = code.split_once('\n') else {
        return code;
    };
    let tag = first_line.trim();
    let looks_like_tag = !tag.is_empty()
        && !tag.contains(char::is_whitespace)
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '_' | '#' | '.'));

    if looks_like_tag { rest } else { code }
}
