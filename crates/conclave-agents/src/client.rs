//! The rate-limited inference client.
//!
//! One client per configured model endpoint, shared by every seat assigned
//! to that model. Enum dispatch over the provider wire formats avoids the
//! dyn-compatibility issues with async trait methods. Each call passes the
//! local rate limiter, runs a bounded retry loop with exponential backoff,
//! and lands in the usage log with its token counts and estimated cost.

#[cfg(test)]
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use conclave_types::{ActionCategory, Role, Seat, UsageRecord};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::config::{BackendType, ModelConfig};
use crate::error::AgentError;
use crate::limiter::{RateLimiter, RateLimits};
use crate::prompt::RenderedPrompt;
use crate::usage::{cost_of, UsageLog, UsageTotals};

/// Times the admission check re-polls a saturated limiter before giving up.
const ADMISSION_ATTEMPTS: u32 = 4;

/// Pause between admission re-polls.
const ADMISSION_WAIT: Duration = Duration::from_secs(2);

/// A successful completion with provider-reported usage.
#[derive(Debug, Clone)]
pub struct Completion {
    /// The response text.
    pub text: String,
    /// Prompt tokens billed.
    pub prompt_tokens: u32,
    /// Completion tokens billed.
    pub completion_tokens: u32,
}

/// One failed call attempt, classified for the retry loop.
#[derive(Debug)]
struct CallFailure {
    /// Whether a retry could plausibly succeed (429, 5xx, network).
    retryable: bool,
    message: String,
}

/// Accounting identity for one call: who asked and why.
#[derive(Debug, Clone, Copy)]
pub struct CallContext {
    /// The deciding seat.
    pub seat: Seat,
    /// The seat's dealt role.
    pub role: Role,
    /// The decision category being made.
    pub category: ActionCategory,
}

// ---------------------------------------------------------------------------
// Backends
// ---------------------------------------------------------------------------

/// A model endpoint that can complete a prompt.
///
/// Enum dispatch instead of trait objects because async methods are not
/// dyn-compatible.
enum Backend {
    /// `OpenAI`-compatible chat completions API.
    OpenAi(OpenAiBackend),
    /// Anthropic Messages API.
    Anthropic(AnthropicBackend),
    /// Queued canned responses for tests.
    #[cfg(test)]
    Scripted(Mutex<VecDeque<Result<Completion, (bool, String)>>>),
}

impl Backend {
    async fn complete(&self, prompt: &RenderedPrompt) -> Result<Completion, CallFailure> {
        match self {
            Self::OpenAi(backend) => backend.complete(prompt).await,
            Self::Anthropic(backend) => backend.complete(prompt).await,
            #[cfg(test)]
            Self::Scripted(queue) => {
                let next = queue.lock().ok().and_then(|mut q| q.pop_front());
                match next {
                    Some(Ok(completion)) => Ok(completion),
                    Some(Err((retryable, message))) => Err(CallFailure { retryable, message }),
                    None => Err(CallFailure {
                        retryable: false,
                        message: "script exhausted".to_owned(),
                    }),
                }
            }
        }
    }
}

/// `OpenAI`-compatible chat completions backend.
struct OpenAiBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
}

impl OpenAiBackend {
    async fn complete(&self, prompt: &RenderedPrompt) -> Result<Completion, CallFailure> {
        let url = format!("{}/chat/completions", self.api_url);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user}
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "response_format": {"type": "json_object"}
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| CallFailure {
                retryable: true,
                message: format!("request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(CallFailure {
                retryable: retryable_status(status),
                message: format!("provider returned {status}: {error_body}"),
            });
        }

        let json: serde_json::Value = response.json().await.map_err(|e| CallFailure {
            retryable: false,
            message: format!("response body parse failed: {e}"),
        })?;

        let text = json
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(serde_json::Value::as_str)
            .map(ToOwned::to_owned)
            .ok_or_else(|| CallFailure {
                retryable: false,
                message: "response missing choices[0].message.content".to_owned(),
            })?;

        Ok(Completion {
            text,
            prompt_tokens: usage_field(&json, "prompt_tokens"),
            completion_tokens: usage_field(&json, "completion_tokens"),
        })
    }
}

/// Anthropic Messages API backend.
struct AnthropicBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
}

impl AnthropicBackend {
    async fn complete(&self, prompt: &RenderedPrompt) -> Result<Completion, CallFailure> {
        let url = format!("{}/messages", self.api_url);
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "system": prompt.system,
            "messages": [
                {"role": "user", "content": prompt.user}
            ]
        });

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| CallFailure {
                retryable: true,
                message: format!("request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(CallFailure {
                retryable: retryable_status(status),
                message: format!("provider returned {status}: {error_body}"),
            });
        }

        let json: serde_json::Value = response.json().await.map_err(|e| CallFailure {
            retryable: false,
            message: format!("response body parse failed: {e}"),
        })?;

        let text = json
            .get("content")
            .and_then(|c| c.get(0))
            .and_then(|b| b.get("text"))
            .and_then(serde_json::Value::as_str)
            .map(ToOwned::to_owned)
            .ok_or_else(|| CallFailure {
                retryable: false,
                message: "response missing content[0].text".to_owned(),
            })?;

        Ok(Completion {
            text,
            prompt_tokens: usage_field(&json, "input_tokens"),
            completion_tokens: usage_field(&json, "output_tokens"),
        })
    }
}

/// Whether a retry could plausibly clear this HTTP status.
fn retryable_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Pull a token count from the provider's `usage` object, defaulting to 0.
fn usage_field(json: &serde_json::Value, field: &str) -> u32 {
    json.get("usage")
        .and_then(|u| u.get(field))
        .and_then(serde_json::Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Rate-limited, retrying client for one model endpoint.
pub struct InferenceClient {
    backend: Backend,
    model: String,
    input_rate: Decimal,
    output_rate: Decimal,
    max_completion_tokens: u32,
    limiter: Mutex<RateLimiter>,
    usage: Mutex<UsageLog>,
    max_retries: u32,
    retry_base: Duration,
}

impl InferenceClient {
    /// Build a client from a model config and retry policy.
    pub fn new(config: &ModelConfig, max_retries: u32, retry_base: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_default();
        let backend = match config.backend_type {
            BackendType::OpenAi => Backend::OpenAi(OpenAiBackend {
                client: http,
                api_url: config.api_url.clone(),
                api_key: config.api_key.clone(),
                model: config.model.clone(),
                max_tokens: config.max_completion_tokens,
                temperature: config.temperature,
            }),
            BackendType::Anthropic => Backend::Anthropic(AnthropicBackend {
                client: http,
                api_url: config.api_url.clone(),
                api_key: config.api_key.clone(),
                model: config.model.clone(),
                max_tokens: config.max_completion_tokens,
                temperature: config.temperature,
            }),
        };
        Self {
            backend,
            model: config.model.clone(),
            input_rate: config.input_rate,
            output_rate: config.output_rate,
            max_completion_tokens: config.max_completion_tokens,
            limiter: Mutex::new(RateLimiter::new(RateLimits {
                requests_per_minute: config.requests_per_minute,
                tokens_per_minute: config.tokens_per_minute,
                requests_per_day: config.requests_per_day,
            })),
            usage: Mutex::new(UsageLog::default()),
            max_retries,
            retry_base,
        }
    }

    /// The model identifier this client talks to.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Lifetime usage totals for this endpoint.
    ///
    /// Totals persist across seat removal; handing a seat back to a human
    /// never erases what it already spent.
    pub fn usage_totals(&self) -> UsageTotals {
        self.usage
            .lock()
            .map(|log| log.totals())
            .unwrap_or_default()
    }

    /// Complete a prompt, honoring the rate limits and the retry budget.
    ///
    /// # Errors
    ///
    /// - [`AgentError::RateLimited`] when the limiter stays saturated past
    ///   the admission wait budget;
    /// - [`AgentError::Unrecoverable`] on auth/request failures a retry
    ///   cannot fix;
    /// - [`AgentError::Inference`] when the retry budget runs out.
    pub async fn complete(
        &self,
        prompt: &RenderedPrompt,
        context: CallContext,
    ) -> Result<String, AgentError> {
        let estimate = estimate_tokens(prompt, self.max_completion_tokens);
        self.admit(estimate).await?;

        let started = std::time::Instant::now();
        let mut last_error = String::new();

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self
                    .retry_base
                    .saturating_mul(2_u32.saturating_pow(attempt.saturating_sub(1)));
                tokio::time::sleep(backoff).await;
            }

            match self.backend.complete(prompt).await {
                Ok(completion) => {
                    self.record(&completion, context, started.elapsed());
                    debug!(
                        seat = %context.seat,
                        model = %self.model,
                        prompt_tokens = completion.prompt_tokens,
                        completion_tokens = completion.completion_tokens,
                        "inference completed"
                    );
                    return Ok(completion.text);
                }
                Err(failure) if failure.retryable => {
                    warn!(
                        seat = %context.seat,
                        model = %self.model,
                        attempt,
                        error = %failure.message,
                        "retryable inference failure"
                    );
                    last_error = failure.message;
                }
                Err(failure) => {
                    warn!(
                        seat = %context.seat,
                        model = %self.model,
                        error = %failure.message,
                        "unrecoverable inference failure"
                    );
                    return Err(AgentError::Unrecoverable(failure.message));
                }
            }
        }

        Err(AgentError::Inference(format!(
            "retry budget exhausted: {last_error}"
        )))
    }

    /// Wait for the limiter to admit a request of `estimate` tokens.
    async fn admit(&self, estimate: u32) -> Result<(), AgentError> {
        for attempt in 0..ADMISSION_ATTEMPTS {
            let allowed = self
                .limiter
                .lock()
                .map(|mut limiter| limiter.can_submit(estimate))
                .unwrap_or(false);
            if allowed {
                return Ok(());
            }
            if attempt.saturating_add(1) < ADMISSION_ATTEMPTS {
                tokio::time::sleep(ADMISSION_WAIT).await;
            }
        }
        Err(AgentError::RateLimited(format!(
            "limiter refused {estimate} tokens for {}",
            self.model
        )))
    }

    /// Record a completed call in the limiter and the usage log.
    fn record(&self, completion: &Completion, context: CallContext, latency: Duration) {
        let total_tokens = completion
            .prompt_tokens
            .saturating_add(completion.completion_tokens);
        if let Ok(mut limiter) = self.limiter.lock() {
            limiter.record(total_tokens);
        }
        let record = UsageRecord {
            timestamp: Utc::now(),
            seat: context.seat,
            role: context.role,
            category: context.category,
            model: self.model.clone(),
            prompt_tokens: completion.prompt_tokens,
            completion_tokens: completion.completion_tokens,
            cost: cost_of(
                completion.prompt_tokens,
                completion.completion_tokens,
                self.input_rate,
                self.output_rate,
            ),
            latency_ms: u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
        };
        if let Ok(mut usage) = self.usage.lock() {
            usage.record(record);
        }
    }

    /// Test-only client with a scripted backend and a tight retry policy.
    #[cfg(test)]
    pub(crate) fn scripted(
        model: &str,
        script: Vec<Result<Completion, (bool, String)>>,
        max_retries: u32,
        limits: RateLimits,
    ) -> Self {
        Self {
            backend: Backend::Scripted(Mutex::new(script.into_iter().collect())),
            model: model.to_owned(),
            input_rate: Decimal::new(30, 2),
            output_rate: Decimal::new(88, 2),
            max_completion_tokens: 512,
            limiter: Mutex::new(RateLimiter::new(limits)),
            usage: Mutex::new(UsageLog::default()),
            max_retries,
            retry_base: Duration::from_millis(1),
        }
    }
}

/// Rough token estimate for admission: four characters per token plus the
/// completion budget.
fn estimate_tokens(prompt: &RenderedPrompt, max_completion_tokens: u32) -> u32 {
    let chars = prompt.system.len().saturating_add(prompt.user.len());
    let prompt_estimate = u32::try_from(chars.saturating_div(4)).unwrap_or(u32::MAX);
    prompt_estimate.saturating_add(max_completion_tokens)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn prompt() -> RenderedPrompt {
        RenderedPrompt {
            system: "system".to_owned(),
            user: "user".to_owned(),
        }
    }

    fn context() -> CallContext {
        CallContext {
            seat: Seat(1),
            role: Role::Percival,
            category: ActionCategory::TeamVote,
        }
    }

    fn open_limits() -> RateLimits {
        RateLimits {
            requests_per_minute: 100,
            tokens_per_minute: 1_000_000,
            requests_per_day: 10_000,
        }
    }

    fn completion(text: &str) -> Completion {
        Completion {
            text: text.to_owned(),
            prompt_tokens: 1000,
            completion_tokens: 200,
        }
    }

    #[tokio::test]
    async fn success_records_usage_and_cost() {
        let client =
            InferenceClient::scripted("scripted", vec![Ok(completion("{}"))], 2, open_limits());
        let text = client.complete(&prompt(), context()).await.unwrap();
        assert_eq!(text, "{}");

        let totals = client.usage_totals();
        assert_eq!(totals.calls, 1);
        assert_eq!(totals.prompt_tokens, 1000);
        assert_eq!(totals.completion_tokens, 200);
        // 1000/1M * $0.30 + 200/1M * $0.88
        let expected = cost_of(1000, 200, Decimal::new(30, 2), Decimal::new(88, 2));
        assert_eq!(totals.cost, expected);
    }

    #[tokio::test]
    async fn retryable_failures_are_retried_until_success() {
        let client = InferenceClient::scripted(
            "scripted",
            vec![
                Err((true, "429".to_owned())),
                Err((true, "503".to_owned())),
                Ok(completion("late but fine")),
            ],
            3,
            open_limits(),
        );
        let text = client.complete(&prompt(), context()).await.unwrap();
        assert_eq!(text, "late but fine");
        assert_eq!(client.usage_totals().calls, 1);
    }

    #[tokio::test]
    async fn retry_budget_exhaustion_is_an_inference_error() {
        let client = InferenceClient::scripted(
            "scripted",
            vec![
                Err((true, "500".to_owned())),
                Err((true, "500".to_owned())),
                Err((true, "500".to_owned())),
            ],
            2,
            open_limits(),
        );
        let result = client.complete(&prompt(), context()).await;
        assert!(matches!(result, Err(AgentError::Inference(_))));
        assert_eq!(client.usage_totals().calls, 0);
    }

    #[tokio::test]
    async fn unrecoverable_failures_stop_immediately() {
        let client = InferenceClient::scripted(
            "scripted",
            vec![
                Err((false, "401 unauthorized".to_owned())),
                Ok(completion("never reached")),
            ],
            3,
            open_limits(),
        );
        let result = client.complete(&prompt(), context()).await;
        assert!(matches!(result, Err(AgentError::Unrecoverable(_))));
        // The second scripted entry was never consumed.
        let leftover = client.backend.complete(&prompt()).await;
        assert!(leftover.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn saturated_limiter_rejects_after_the_wait_budget() {
        let client = InferenceClient::scripted(
            "scripted",
            vec![Ok(completion("unreachable"))],
            1,
            RateLimits {
                requests_per_minute: 10,
                tokens_per_minute: 100_000,
                requests_per_day: 0,
            },
        );
        let result = client.complete(&prompt(), context()).await;
        assert!(matches!(result, Err(AgentError::RateLimited(_))));
        assert_eq!(client.usage_totals().calls, 0);
    }

    #[test]
    fn status_classification() {
        assert!(retryable_status(reqwest::StatusCode::TOO_MANY_REQUESTS));
        assert!(retryable_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR));
        assert!(retryable_status(reqwest::StatusCode::BAD_GATEWAY));
        assert!(!retryable_status(reqwest::StatusCode::UNAUTHORIZED));
        assert!(!retryable_status(reqwest::StatusCode::NOT_FOUND));
        assert!(!retryable_status(reqwest::StatusCode::BAD_REQUEST));
    }
}
