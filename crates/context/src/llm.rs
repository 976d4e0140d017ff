//! Answer generation
//!
//! The provider trait, the OpenAI-compatible chat-completions client, and
//! the retry/fallback wrapper the orchestrator calls. Provider failure
//! never propagates: after retries are exhausted the service answers from
//! the context extractively.

use crate::fallback;
use crate::postprocess;
use async_trait::async_trait;
use lectern_common::config::AnswerConfig;
use lectern_common::metrics;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info, warn};

/// System prompt sent with every generation request
pub const SYSTEM_PROMPT: &str =
    "You are a helpful research assistant that provides accurate, well-structured answers with proper citations.";

/// Template for answering questions over assembled context
const QA_TEMPLATE: &str = r#"You are a helpful research assistant. Your task is to provide accurate, detailed answers based on the provided context.

FORMATTING GUIDELINES:
1. Structure your response with clear sections using headings (e.g., "Introduction", "Key Findings", "Conclusion")
2. Use numbered or bulleted lists for multiple points, not asterisks (*)
3. When citing papers, include the title and a link in this format: [Paper Title](URL)
4. Use bold for important terms or concepts
5. Break long paragraphs into smaller, more digestible chunks
6. For technical content, clearly explain complex terms
7. End with a concise summary or conclusion

RESPONSE APPROACH:
- If the information in the context is sufficient, provide a comprehensive, structured response
- If the question is a simple greeting, respond in a friendly, conversational manner
- If you cannot answer based on the context, provide a helpful response based on your general knowledge

When analyzing documents, pay special attention to:
- Key findings and conclusions
- Methodologies used
- Data presented
- Author perspectives and arguments

Context:
{context}

Question:
{question}

Remember to provide a well-structured answer with proper formatting and citations."#;

/// Answer provider failure modes
#[derive(Error, Debug, Clone)]
pub enum AnswerError {
    #[error("rate limited")]
    RateLimited,

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Trait for text generation backends
#[async_trait]
pub trait AnswerProvider: Send + Sync {
    /// Generate a completion for the given prompts
    async fn generate(&self, system_prompt: &str, user_prompt: &str)
        -> Result<String, AnswerError>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// OpenAI-compatible chat completions client (the Groq API speaks this)
pub struct ChatCompletionsAnswerer {
    client: reqwest::Client,
    config: AnswerConfig,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    max_tokens: u32,
    top_p: f64,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

impl ChatCompletionsAnswerer {
    pub fn new(config: AnswerConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }
}

#[async_trait]
impl AnswerProvider for ChatCompletionsAnswerer {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, AnswerError> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            top_p: self.config.top_p,
        };

        let api_key = self.config.api_key.clone().unwrap_or_default();

        let response = self
            .client
            .post(&self.config.api_url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AnswerError::Transport(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(AnswerError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnswerError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AnswerError::InvalidResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AnswerError::InvalidResponse("no choices in response".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Retry-and-degrade wrapper around an [`AnswerProvider`].
///
/// Retry schedule: a rate-limit signal retries up to `max_retries` times
/// with doubling delays; any transport failure retries up to `max_retries`
/// times at a fixed delay; other API errors are terminal. Exhaustion falls
/// back to the local extractive answer — this call cannot fail.
pub struct AnswerService {
    provider: Arc<dyn AnswerProvider>,
    config: AnswerConfig,
}

impl AnswerService {
    pub fn new(provider: Arc<dyn AnswerProvider>, config: AnswerConfig) -> Self {
        Self { provider, config }
    }

    /// Answer a question over the assembled context
    pub async fn answer_question(&self, question: &str, context: &str) -> String {
        let started = Instant::now();
        info!(question = %truncate(question, 100), "Processing question");

        let prompt = QA_TEMPLATE
            .replace("{context}", context)
            .replace("{question}", question);

        let mut retries = 0u32;
        let mut rate_limit_delay = Duration::from_secs(self.config.rate_limit_backoff_secs);

        loop {
            match self.provider.generate(SYSTEM_PROMPT, &prompt).await {
                Ok(answer) => {
                    let answer = postprocess::polish(&answer, question);
                    metrics::record_answer(started.elapsed().as_secs_f64(), false);
                    info!(length = answer.len(), "Answer generated");
                    return answer;
                }
                Err(AnswerError::RateLimited) if retries < self.config.max_retries => {
                    retries += 1;
                    warn!(
                        retry = retries,
                        delay_secs = rate_limit_delay.as_secs(),
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(rate_limit_delay).await;
                    rate_limit_delay *= 2;
                }
                Err(AnswerError::Transport(e)) if retries < self.config.max_retries => {
                    retries += 1;
                    warn!(
                        retry = retries,
                        max_retries = self.config.max_retries,
                        error = %e,
                        "Request failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_secs(
                        self.config.transport_retry_delay_secs,
                    ))
                    .await;
                }
                Err(e) => {
                    error!(error = %e, "Answer provider failed, using extractive fallback");
                    break;
                }
            }
        }

        let answer = fallback::extractive_answer(question, context);
        metrics::record_answer(started.elapsed().as_secs_f64(), true);
        answer
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Scripted provider for tests
pub struct MockAnswerProvider {
    script: std::sync::Mutex<Vec<Result<String, AnswerError>>>,
    reply: String,
    pub calls: std::sync::Mutex<Vec<(String, String)>>,
}

impl MockAnswerProvider {
    /// Always answers with the given reply
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            script: std::sync::Mutex::new(Vec::new()),
            reply: reply.into(),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Play back the given results in order, then fall through to the reply
    pub fn with_script(script: Vec<Result<String, AnswerError>>) -> Self {
        Self {
            script: std::sync::Mutex::new(script),
            reply: "scripted reply".to_string(),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_user_prompt(&self) -> Option<String> {
        self.calls.lock().unwrap().last().map(|(_, u)| u.clone())
    }
}

#[async_trait]
impl AnswerProvider for MockAnswerProvider {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, AnswerError> {
        self.calls
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), user_prompt.to_string()));

        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            Ok(self.reply.clone())
        } else {
            script.remove(0)
        }
    }

    fn model_name(&self) -> &str {
        "mock-answerer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> AnswerConfig {
        AnswerConfig {
            rate_limit_backoff_secs: 0,
            transport_retry_delay_secs: 0,
            ..AnswerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_successful_answer_includes_context_in_prompt() {
        let provider = Arc::new(MockAnswerProvider::new("# Answer\n\nGenerated."));
        let service = AnswerService::new(provider.clone(), fast_config());

        let answer = service
            .answer_question("what is attention?", "[Document 1: paper.pdf]\ncontent")
            .await;

        assert!(answer.contains("Generated."));
        let prompt = provider.last_user_prompt().unwrap();
        assert!(prompt.contains("[Document 1: paper.pdf]"));
        assert!(prompt.contains("what is attention?"));
    }

    #[tokio::test]
    async fn test_transport_failures_retry_then_succeed() {
        let provider = Arc::new(MockAnswerProvider::with_script(vec![
            Err(AnswerError::Transport("connection reset".into())),
            Err(AnswerError::Transport("connection reset".into())),
            Ok("# Recovered\n\nAll good.".to_string()),
        ]));
        let service = AnswerService::new(provider.clone(), fast_config());

        let answer = service.answer_question("q", "context with words").await;
        assert!(answer.contains("All good."));
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_retries_exhausted_falls_back_to_extractive() {
        let provider = Arc::new(MockAnswerProvider::with_script(vec![
            Err(AnswerError::RateLimited),
            Err(AnswerError::RateLimited),
            Err(AnswerError::RateLimited),
            Err(AnswerError::RateLimited),
        ]));
        let service = AnswerService::new(provider.clone(), fast_config());

        let answer = service
            .answer_question(
                "what do tardigrades survive?",
                "Tardigrades survive extreme vacuum. Unrelated sentence here.",
            )
            .await;

        // 1 initial attempt + 3 retries
        assert_eq!(provider.call_count(), 4);
        assert!(answer.contains("Tardigrades survive extreme vacuum."));
    }

    #[tokio::test]
    async fn test_non_retryable_api_error_degrades_immediately() {
        let provider = Arc::new(MockAnswerProvider::with_script(vec![Err(
            AnswerError::Api {
                status: 500,
                body: "boom".into(),
            },
        )]));
        let service = AnswerService::new(provider.clone(), fast_config());

        let answer = service.answer_question("anything?", "").await;
        assert_eq!(provider.call_count(), 1);
        assert_eq!(
            answer,
            "I don't have enough information to answer this question."
        );
    }
}
