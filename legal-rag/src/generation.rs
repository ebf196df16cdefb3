//! Answer generation providers.
//!
//! A [`Generator`] turns a question plus retrieved context into an answer.
//! The outcome is a [`Generation`], which records whether the answer came
//! from the model or from a degraded path, and why.
//!
//! - [`ExtractiveGenerator`] picks context sentences that share words with
//!   the question. It needs no model and never fails.
//! - [`FallbackGenerator`] wraps another generator and converts its errors
//!   and timeouts into extractive answers tagged with a [`FallbackReason`].

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{RagError, Result};

/// Why a degraded answer was returned instead of a model answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// No model-backed generator is configured.
    NotConfigured,
    /// The provider rejected the request for rate limiting.
    RateLimited,
    /// The provider's model is still loading.
    ModelLoading,
    /// The provider did not answer in time.
    Timeout,
    /// Any other provider failure.
    ProviderError(String),
}

impl FallbackReason {
    /// Short note appended to extractive answers.
    fn note(&self) -> &'static str {
        match self {
            Self::NotConfigured => "",
            Self::RateLimited => "(Rate limit reached)",
            Self::ModelLoading => "(Model loading, retry in 20s)",
            Self::Timeout => "(Generation timed out)",
            Self::ProviderError(_) => "(Language model unavailable)",
        }
    }

    fn classify(error: &RagError) -> Self {
        let message = error.to_string().to_lowercase();
        if message.contains("rate limit") {
            Self::RateLimited
        } else if message.contains("loading") {
            Self::ModelLoading
        } else {
            Self::ProviderError(error.to_string())
        }
    }
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured => f.write_str("not_configured"),
            Self::RateLimited => f.write_str("rate_limited"),
            Self::ModelLoading => f.write_str("model_loading"),
            Self::Timeout => f.write_str("timeout"),
            Self::ProviderError(message) => write!(f, "provider_error: {message}"),
        }
    }
}

/// The result of a generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation {
    /// Answer produced by the configured model.
    Generated(String),
    /// Degraded answer, with the reason it was used.
    Fallback {
        /// The answer text.
        text: String,
        /// Why the model answer was not used.
        reason: FallbackReason,
    },
}

impl Generation {
    /// The answer text, whichever path produced it.
    pub fn text(&self) -> &str {
        match self {
            Self::Generated(text) | Self::Fallback { text, .. } => text,
        }
    }

    /// The fallback reason, if this is a degraded answer.
    pub fn fallback_reason(&self) -> Option<&FallbackReason> {
        match self {
            Self::Generated(_) => None,
            Self::Fallback { reason, .. } => Some(reason),
        }
    }

    /// Consume into the answer text.
    pub fn into_text(self) -> String {
        match self {
            Self::Generated(text) | Self::Fallback { text, .. } => text,
        }
    }
}

/// A provider that answers a question from retrieved context.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Answer `question` using only `context`.
    async fn generate(&self, question: &str, context: &str) -> Result<Generation>;

    /// A short name for logs.
    fn name(&self) -> &str;
}

/// Builds an answer from the context sentences that overlap the question most.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractiveGenerator;

impl ExtractiveGenerator {
    const MIN_SENTENCE_CHARS: usize = 30;
    const MAX_SENTENCES: usize = 3;
    const EXCERPT_CHARS: usize = 400;

    /// Produce an extractive answer, appending `note` when it is non-empty.
    pub fn answer(&self, question: &str, context: &str, note: &str) -> String {
        if context.trim().chars().count() < 10 {
            return format!("No relevant information found. {note}").trim_end().to_string();
        }

        let question_words: HashSet<String> =
            question.to_lowercase().split_whitespace().map(str::to_string).collect();

        let flattened = context.replace('\n', " ");
        let mut scored: Vec<(usize, &str)> = flattened
            .split('.')
            .map(str::trim)
            .filter(|sentence| sentence.chars().count() > Self::MIN_SENTENCE_CHARS)
            .filter_map(|sentence| {
                let lowered = sentence.to_lowercase();
                let words: HashSet<&str> = lowered.split_whitespace().collect();
                let overlap = words.iter().filter(|w| question_words.contains(**w)).count();
                (overlap > 0).then_some((overlap, sentence))
            })
            .collect();
        scored.sort_by(|a, b| b.cmp(a));

        if scored.is_empty() {
            let excerpt: String = context.chars().take(Self::EXCERPT_CHARS).collect();
            let mut answer = format!("**Relevant excerpt:**\n\n{excerpt}...");
            if !note.is_empty() {
                answer.push_str(&format!("\n\n_{note}_"));
            }
            return answer;
        }

        let mut answer = String::from("**Based on the contract documents:**\n\n");
        for (i, (_, sentence)) in scored.iter().take(Self::MAX_SENTENCES).enumerate() {
            answer.push_str(&format!("{}. {sentence}.\n", i + 1));
        }
        if !note.is_empty() {
            answer.push_str(&format!("\n_{note}_"));
        }
        answer
    }
}

#[async_trait]
impl Generator for ExtractiveGenerator {
    async fn generate(&self, question: &str, context: &str) -> Result<Generation> {
        Ok(Generation::Fallback {
            text: self.answer(question, context, ""),
            reason: FallbackReason::NotConfigured,
        })
    }

    fn name(&self) -> &str {
        "extractive"
    }
}

/// Wraps a model-backed generator so that failures degrade to an extractive answer.
///
/// # Example
///
/// ```rust,ignore
/// use legal_rag::FallbackGenerator;
///
/// let generator = FallbackGenerator::new(Arc::new(chat), Duration::from_secs(20));
/// let generation = generator.generate(question, &context).await?; // never Err
/// ```
#[derive(Clone)]
pub struct FallbackGenerator {
    inner: Option<Arc<dyn Generator>>,
    timeout: Duration,
    extractive: ExtractiveGenerator,
}

impl FallbackGenerator {
    /// Wrap `inner`, bounding each call by `timeout`.
    pub fn new(inner: Arc<dyn Generator>, timeout: Duration) -> Self {
        Self { inner: Some(inner), timeout, extractive: ExtractiveGenerator }
    }

    /// A generator with no model behind it; every answer is extractive.
    pub fn extractive_only() -> Self {
        Self { inner: None, timeout: Duration::ZERO, extractive: ExtractiveGenerator }
    }

    fn degrade(&self, question: &str, context: &str, reason: FallbackReason) -> Generation {
        let text = self.extractive.answer(question, context, reason.note());
        Generation::Fallback { text, reason }
    }
}

#[async_trait]
impl Generator for FallbackGenerator {
    async fn generate(&self, question: &str, context: &str) -> Result<Generation> {
        let Some(inner) = &self.inner else {
            debug!("no language model configured, using extractive answer");
            return Ok(self.degrade(question, context, FallbackReason::NotConfigured));
        };

        match tokio::time::timeout(self.timeout, inner.generate(question, context)).await {
            Ok(Ok(generation)) => Ok(generation),
            Ok(Err(e)) => {
                let reason = FallbackReason::classify(&e);
                warn!(
                    generator = inner.name(),
                    error = %e,
                    %reason,
                    "generation failed, using extractive answer"
                );
                Ok(self.degrade(question, context, reason))
            }
            Err(_) => {
                warn!(
                    generator = inner.name(),
                    timeout_secs = self.timeout.as_secs_f64(),
                    "generation timed out, using extractive answer"
                );
                Ok(self.degrade(question, context, FallbackReason::Timeout))
            }
        }
    }

    fn name(&self) -> &str {
        self.inner.as_ref().map_or("extractive", |inner| inner.name())
    }
}
