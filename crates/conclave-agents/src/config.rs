//! Configuration for the agent pool, loaded from environment variables.
//!
//! Model endpoints come in prefixed groups (`LLM_DEFAULT_*` required,
//! `LLM_ALT_*` optional) so a table can spread its seats across two
//! providers. Behavior knobs control how chatty and how failure-tolerant
//! the agents are.

use std::time::Duration;

use rust_decimal::Decimal;

use crate::error::AgentError;

/// Complete agent-pool configuration.
#[derive(Debug, Clone)]
pub struct AgentsConfig {
    /// Configured model endpoints, in priority order. Never empty.
    pub models: Vec<ModelConfig>,
    /// How seats are assigned to models.
    pub distribution: ModelDistribution,
    /// Consecutive failed decisions before a seat degrades to
    /// heuristics permanently.
    pub max_errors: u32,
    /// Probability that a seat speaks when it holds the turn instead of
    /// passing silently.
    pub chat_probability: f64,
    /// Pause before an agent's action is released, pacing responses like a
    /// human player.
    pub response_delay: Duration,
    /// Retry attempts per inference call.
    pub max_retries: u32,
    /// Base backoff delay; doubles per retry attempt.
    pub retry_base: Duration,
}

/// One model endpoint with its pricing and rate limits.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Which wire format the endpoint speaks.
    pub backend_type: BackendType,
    /// Base API URL (e.g. `https://api.openai.com/v1`).
    pub api_url: String,
    /// API key for authentication.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// Dollars per million prompt tokens.
    pub input_rate: Decimal,
    /// Dollars per million completion tokens.
    pub output_rate: Decimal,
    /// Requests allowed per rolling minute.
    pub requests_per_minute: u32,
    /// Tokens allowed per rolling minute.
    pub tokens_per_minute: u32,
    /// Requests allowed per calendar day.
    pub requests_per_day: u32,
    /// Relative weight under the weighted distribution.
    pub weight: u32,
    /// Per-request wall-clock timeout.
    pub request_timeout: Duration,
    /// Completion token budget requested from the provider.
    pub max_completion_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
}

/// Supported provider wire formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// `OpenAI`-compatible chat completions API.
    OpenAi,
    /// Anthropic Messages API.
    Anthropic,
}

/// How seats are spread across the configured models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelDistribution {
    /// Seats cycle through the model list in order.
    RoundRobin,
    /// Each seat draws a model uniformly at random.
    Random,
    /// Each seat draws a model in proportion to the configured weights.
    Weighted,
}

impl AgentsConfig {
    /// Load configuration from environment variables.
    ///
    /// Required variables:
    /// - `LLM_DEFAULT_BACKEND` -- `openai` or `anthropic`
    /// - `LLM_DEFAULT_API_URL` -- base API URL
    /// - `LLM_DEFAULT_API_KEY` -- API key
    /// - `LLM_DEFAULT_MODEL` -- model name
    ///
    /// Optional variables:
    /// - `LLM_ALT_BACKEND` / `_API_URL` / `_API_KEY` / `_MODEL` -- second model
    /// - `LLM_DEFAULT_INPUT_RATE` / `LLM_DEFAULT_OUTPUT_RATE` -- $/1M tokens
    ///   (defaults 0.30 / 0.88; `LLM_ALT_*` equivalents exist)
    /// - `LLM_DEFAULT_RPM` / `_TPM` / `_RPD` -- rate limits
    ///   (defaults 60 / 90000 / 5000)
    /// - `LLM_DEFAULT_WEIGHT` -- relative weight under `weighted` (default 1)
    /// - `LLM_DEFAULT_TIMEOUT_MS` -- per-request timeout (default 30000)
    /// - `LLM_DEFAULT_MAX_TOKENS` -- completion budget (default 512)
    /// - `LLM_DEFAULT_TEMPERATURE` -- sampling temperature (default 0.7)
    /// - `MODEL_DISTRIBUTION` -- `round-robin` (default), `random`, or
    ///   `weighted`
    /// - `AGENT_MAX_ERRORS` -- fallback threshold (default 3)
    /// - `AGENT_CHAT_PROBABILITY` -- speak-vs-pass probability (default 0.6)
    /// - `AGENT_RESPONSE_DELAY_MS` -- pacing delay before an action is
    ///   released (default 750)
    /// - `INFERENCE_MAX_RETRIES` -- retries per call (default 3)
    /// - `INFERENCE_RETRY_BASE_MS` -- backoff base in ms (default 500)
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Config`] when a required variable is missing or
    /// a value fails to parse.
    pub fn from_env() -> Result<Self, AgentError> {
        let mut models = vec![load_model_config("LLM_DEFAULT")?];
        if let Ok(alt) = load_model_config("LLM_ALT") {
            models.push(alt);
        }

        let distribution = match std::env::var("MODEL_DISTRIBUTION")
            .unwrap_or_else(|_| "round-robin".to_owned())
            .to_lowercase()
            .as_str()
        {
            "round-robin" | "roundrobin" => ModelDistribution::RoundRobin,
            "random" => ModelDistribution::Random,
            "weighted" => ModelDistribution::Weighted,
            other => {
                return Err(AgentError::Config(format!(
                    "unknown MODEL_DISTRIBUTION: {other}"
                )))
            }
        };

        let max_errors: u32 = parse_env("AGENT_MAX_ERRORS", "3")?;
        let chat_probability: f64 = parse_env("AGENT_CHAT_PROBABILITY", "0.6")?;
        if !(0.0..=1.0).contains(&chat_probability) {
            return Err(AgentError::Config(format!(
                "AGENT_CHAT_PROBABILITY out of range: {chat_probability}"
            )));
        }
        let response_delay_ms: u64 = parse_env("AGENT_RESPONSE_DELAY_MS", "750")?;
        let max_retries: u32 = parse_env("INFERENCE_MAX_RETRIES", "3")?;
        let retry_base_ms: u64 = parse_env("INFERENCE_RETRY_BASE_MS", "500")?;

        Ok(Self {
            models,
            distribution,
            max_errors,
            chat_probability,
            response_delay: Duration::from_millis(response_delay_ms),
            max_retries,
            retry_base: Duration::from_millis(retry_base_ms),
        })
    }
}

/// Read a required environment variable.
fn env_var(name: &str) -> Result<String, AgentError> {
    std::env::var(name)
        .map_err(|e| AgentError::Config(format!("missing required env var {name}: {e}")))
}

/// Parse an optional environment variable with a default.
fn parse_env<T: std::str::FromStr>(name: &str, default: &str) -> Result<T, AgentError>
where
    T::Err: std::fmt::Display,
{
    std::env::var(name)
        .unwrap_or_else(|_| default.to_owned())
        .parse()
        .map_err(|e| AgentError::Config(format!("invalid {name}: {e}")))
}

/// Parse an optional decimal rate with a default.
fn parse_rate(name: &str, default: &str) -> Result<Decimal, AgentError> {
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_owned());
    raw.parse()
        .map_err(|e| AgentError::Config(format!("invalid {name}: {e}")))
}

/// Load one model config from a set of prefixed environment variables.
fn load_model_config(prefix: &str) -> Result<ModelConfig, AgentError> {
    let backend_str = env_var(&format!("{prefix}_BACKEND"))?;
    let api_url = env_var(&format!("{prefix}_API_URL"))?;
    let api_key = env_var(&format!("{prefix}_API_KEY"))?;
    let model = env_var(&format!("{prefix}_MODEL"))?;

    let backend_type = match backend_str.to_lowercase().as_str() {
        "openai" | "deepseek" | "ollama" => BackendType::OpenAi,
        "anthropic" | "claude" => BackendType::Anthropic,
        other => {
            return Err(AgentError::Config(format!(
                "unknown backend type: {other}"
            )))
        }
    };

    let input_rate = parse_rate(&format!("{prefix}_INPUT_RATE"), "0.30")?;
    let output_rate = parse_rate(&format!("{prefix}_OUTPUT_RATE"), "0.88")?;
    let requests_per_minute: u32 = parse_env(&format!("{prefix}_RPM"), "60")?;
    let tokens_per_minute: u32 = parse_env(&format!("{prefix}_TPM"), "90000")?;
    let requests_per_day: u32 = parse_env(&format!("{prefix}_RPD"), "5000")?;
    let weight: u32 = parse_env(&format!("{prefix}_WEIGHT"), "1")?;
    let timeout_ms: u64 = parse_env(&format!("{prefix}_TIMEOUT_MS"), "30000")?;
    let max_completion_tokens: u32 = parse_env(&format!("{prefix}_MAX_TOKENS"), "512")?;
    let temperature: f64 = parse_env(&format!("{prefix}_TEMPERATURE"), "0.7")?;

    Ok(ModelConfig {
        backend_type,
        api_url,
        api_key,
        model,
        input_rate,
        output_rate,
        requests_per_minute,
        tokens_per_minute,
        requests_per_day,
        weight,
        request_timeout: Duration::from_millis(timeout_ms),
        max_completion_tokens,
        temperature,
    })
}
