/*!
 * Translation client.
 *
 * Sends one document blob per request to a chat-completion provider and
 * hands back the translated blob together with its token usage. Retries and
 * timeouts live in the provider; this layer owns prompting and response checks.
 */

use log::{debug, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::prompts::{self, PromptTemplate};
use crate::app_config::{SiteConfig, TranslationConfig};
use crate::errors::TranslationError;
use crate::providers::openai::OpenAI;
use crate::providers::{ChatRequest, Provider, Usage};

/// A translated blob and what it cost
#[derive(Debug, Clone)]
pub struct TranslatedBlob {
    /// Translated, tagged text
    pub text: String,
    /// Token usage reported by the provider
    pub usage: Usage,
    /// Wall time of the request, retries included
    pub elapsed: Duration,
}

/// Translates document blobs into target languages
#[derive(Debug, Clone)]
pub struct TranslationClient {
    provider: Arc<dyn Provider>,
    template: PromptTemplate,
    model: String,
    max_tokens: u32,
    temperature: f32,
    brand: String,
    source_language: String,
}

impl TranslationClient {
    /// Create a client over any provider
    pub fn new(provider: Arc<dyn Provider>, translation: &TranslationConfig, site: &SiteConfig) -> Self {
        Self {
            provider,
            template: PromptTemplate::default(),
            model: translation.model.clone(),
            max_tokens: translation.max_tokens,
            temperature: translation.temperature,
            brand: site.brand_name.clone(),
            source_language: site.source_language.clone(),
        }
    }

    /// Create a client talking to the configured OpenAI-compatible endpoint
    pub fn from_config(translation: &TranslationConfig, site: &SiteConfig) -> Self {
        let provider = OpenAI::new_with_config(
            translation.api_key.clone(),
            translation.endpoint.clone(),
            translation.retry_count,
            translation.retry_backoff_ms,
            Duration::from_secs(translation.timeout_secs),
        );
        Self::new(Arc::new(provider), translation, site)
    }

    /// Use a custom prompt template
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// System prompt for a target language
    pub fn system_prompt(&self, language: &str) -> String {
        self.template.render(&self.brand, &self.source_language, language)
    }

    /// Hash of the system prompt for a target language
    pub fn prompt_hash(&self, language: &str) -> String {
        prompts::prompt_hash(&self.system_prompt(language))
    }

    /// Translate a tagged blob into `language`
    pub async fn translate(&self, blob: &str, language: &str) -> Result<TranslatedBlob, TranslationError> {
        let request = ChatRequest::new(&self.model, self.max_tokens)
            .temperature(self.temperature)
            .add_message("system", self.system_prompt(language))
            .add_message("user", blob);

        let start = Instant::now();
        let response = self.provider.complete(request).await?;
        let elapsed = start.elapsed();

        let text = response
            .first_content()
            .map(strip_code_fence)
            .filter(|text| !text.trim().is_empty())
            .ok_or(TranslationError::EmptyResponse)?
            .to_string();

        let usage = response.usage.unwrap_or_else(|| {
            warn!("Provider returned no token usage for {}", language);
            Usage::default()
        });
        debug!(
            "Translated {} bytes into {} in {}ms ({} prompt / {} completion tokens)",
            blob.len(),
            language,
            elapsed.as_millis(),
            usage.prompt_tokens,
            usage.completion_tokens
        );

        Ok(TranslatedBlob { text, usage, elapsed })
    }
}

/// Remove a surrounding Markdown code fence some models add
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return text;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return text;
    };
    // Drop an optional language tag on the opening fence line
    match body.split_once('\n') {
        Some((tag, inner)) if !tag.contains('[') => inner,
        _ => body,
    }
}
