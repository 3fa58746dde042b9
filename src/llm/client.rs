use serde::{Deserialize, Serialize};

use super::models::{Usage, MODEL_MAX_TOKENS};
use crate::error::ServiceError;

/// OpenRouter direct API URL (BYOK mode)
const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Response from the generation service including content and usage stats
#[derive(Debug)]
pub struct LlmResponse {
    pub content: String,
    pub usage: Option<Usage>,
    pub model: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
    model: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: String,
}

/// Rate limit retry configuration
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 2000; // 2 seconds
const BACKOFF_MULTIPLIER: u64 = 2; // Exponential backoff

/// Extract retry-after hint from OpenRouter response (if present)
fn parse_retry_after(text: &str) -> Option<u64> {
    // OpenRouter may include retry-after in response body or we estimate
    // Look for patterns like "retry after X seconds" or "wait X seconds"
    let text_lower = text.to_lowercase();
    if let Some(pos) = text_lower.find("retry") {
        // Try to extract a number after "retry"
        let after_retry = &text_lower[pos..];
        for word in after_retry.split_whitespace().skip(1).take(5) {
            if let Ok(secs) = word
                .trim_matches(|c: char| !c.is_numeric())
                .parse::<u64>()
            {
                if secs > 0 && secs < 300 {
                    return Some(secs);
                }
            }
        }
    }
    None
}

/// Call the generation service once, with automatic retry and exponential
/// backoff on rate limits. Failures come back as classified
/// [`ServiceError`]s so callers can tell retryable rounds from dead ends.
pub async fn generate(
    system: &str,
    user: &str,
    model_id: &str,
    api_key: &str,
) -> Result<LlmResponse, ServiceError> {
    let client = reqwest::Client::new();

    let request = ChatRequest {
        model: model_id.to_string(),
        messages: vec![
            Message {
                role: "system".to_string(),
                content: system.to_string(),
            },
            Message {
                role: "user".to_string(),
                content: user.to_string(),
            },
        ],
        max_tokens: MODEL_MAX_TOKENS,
        stream: false,
    };

    let mut last_error = String::new();
    let mut retry_count = 0;

    while retry_count <= MAX_RETRIES {
        // Build request with OpenRouter headers
        let response = client
            .post(OPENROUTER_URL)
            .header("Content-Type", "application/json")
            .header("HTTP-Referer", "https://testloom.dev")
            .header("X-Title", "testloom")
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;

        if status.is_success() {
            let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
                ServiceError::Unknown(format!("unparseable OpenRouter response: {}", e))
            })?;

            let content = parsed
                .choices
                .first()
                .map(|c| c.message.content.clone())
                .unwrap_or_default();

            return Ok(LlmResponse {
                content,
                usage: parsed.usage,
                model: parsed.model.unwrap_or_default(),
            });
        }

        last_error = text.clone();

        // Rate limits get another chance after a pause
        if status.as_u16() == 429 && retry_count < MAX_RETRIES {
            retry_count += 1;

            // Try to parse retry-after
            let retry_after = parse_retry_after(&text).unwrap_or_else(|| {
                // Exponential backoff
                (INITIAL_BACKOFF_MS * BACKOFF_MULTIPLIER.pow(retry_count - 1)) / 1000
            });

            log::warn!(
                "OpenRouter rate limited, retrying in {}s (attempt {}/{})",
                retry_after,
                retry_count,
                MAX_RETRIES
            );
            tokio::time::sleep(tokio::time::Duration::from_secs(retry_after)).await;
            continue;
        }

        return Err(ServiceError::classify(Some(status.as_u16()), &text));
    }

    // All retries spent on 429s
    Err(ServiceError::classify(Some(429), &last_error))
}

fn transport_error(err: reqwest::Error) -> ServiceError {
    if err.is_connect() || err.is_timeout() {
        ServiceError::Connectivity(err.to_string())
    } else {
        ServiceError::classify(None, &err.to_string())
    }
}
