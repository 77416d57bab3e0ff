//! Article rewriting through an OpenAI-compatible LLM API.
//!
//! # Architecture
//!
//! - [`Rewrite`]: turns an original article body into rewritten text
//! - [`AwfulRewriter`]: calls the LLM through `awful_aj`
//! - [`RetryRewrite`]: decorator adding exponential backoff to any [`Rewrite`]
//!
//! # Retry Strategy
//!
//! - Maximum 5 retry attempts
//! - Exponential backoff starting at 1 second, capped at 30 seconds
//! - Random jitter (0-250ms) added to each delay
//! - An empty answer is final for this cycle and is not retried

use crate::error::{ConfigError, RewriteError};
use awful_aj::api::ask;
use awful_aj::{config, config::AwfulJadeConfig, config_dir, template, template::ChatTemplate};
use rand::{Rng, rng};
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Name of the `awful_aj` template holding the rewriting instructions.
pub const DEFAULT_TEMPLATE: &str = "news_rewriter";

/// Something that can rewrite an article body.
///
/// Implementations return the rewritten text, or an error when the service
/// fails or answers with nothing usable. Blank output must be reported as
/// [`RewriteError::Empty`], never as `Ok`.
pub trait Rewrite {
    async fn rewrite(&self, body: &str) -> Result<String, RewriteError>;
}

/// Trim model output and reject it when nothing remains.
pub fn clean_output(raw: &str) -> Result<String, RewriteError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Err(RewriteError::Empty)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`Rewrite`].
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryRewrite<T> {
    inner: T,
    max_retries: usize,
    base_delay: StdDuration,
    max_delay: StdDuration,
}

impl<T> RetryRewrite<T>
where
    T: Rewrite,
{
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }

    fn delay_for(&self, attempt: usize) -> StdDuration {
        let shift = (attempt.saturating_sub(1)).min(16) as u32;
        let delay = self.base_delay.saturating_mul(1 << shift);
        let delay = delay.min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=250);
        delay + StdDuration::from_millis(jitter_ms)
    }
}

impl<T> fmt::Debug for RetryRewrite<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryRewrite")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> Rewrite for RetryRewrite<T>
where
    T: Rewrite,
{
    #[instrument(level = "info", skip_all)]
    async fn rewrite(&self, body: &str) -> Result<String, RewriteError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.rewrite(body).await {
                Ok(text) => return Ok(text),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "rewrite() exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "rewrite() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Rewrites articles with `awful_aj::api::ask`.
///
/// Holds the LLM configuration (endpoint, model, key) and the chat template
/// whose system prompt carries the rewriting rules.
#[derive(Debug)]
pub struct AwfulRewriter {
    config: AwfulJadeConfig,
    template: ChatTemplate,
}

impl AwfulRewriter {
    /// Load the `awful_aj` config and template, injecting `api_key`.
    ///
    /// `config_path` defaults to `config.yaml` in the `awful_aj` config
    /// directory. Every failure here is a startup [`ConfigError`].
    #[instrument(level = "info", skip(api_key))]
    pub async fn load(
        config_path: Option<&str>,
        template_name: &str,
        api_key: &str,
    ) -> Result<Self, ConfigError> {
        let config_path = match config_path {
            Some(path) => path.to_string(),
            None => config_dir()
                .map_err(|e| ConfigError::Load(e.to_string()))?
                .join("config.yaml")
                .to_string_lossy()
                .into_owned(),
        };

        let mut config =
            config::load_config(&config_path).map_err(|e| ConfigError::Load(e.to_string()))?;
        config.api_key = api_key.to_string();
        info!(%config_path, "Loaded configuration");

        let template = template::load_template(template_name)
            .await
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        info!(template = template_name, "Loaded template");

        Ok(Self { config, template })
    }
}

impl Rewrite for AwfulRewriter {
    #[instrument(level = "info", skip_all)]
    async fn rewrite(&self, body: &str) -> Result<String, RewriteError> {
        let t0 = Instant::now();
        let res = ask(&self.config, body.to_string(), &self.template, None, None).await;
        let dt = t0.elapsed();

        match res {
            Ok(text) => {
                info!(elapsed_ms = dt.as_millis() as u64, bytes = text.len(), "API call succeeded");
                clean_output(&text)
            }
            Err(e) => {
                warn!(elapsed_ms = dt.as_millis() as u64, error = %e, "API call failed");
                Err(RewriteError::Api(e.to_string()))
            }
        }
    }
}
