/*!
 * Mock provider implementations for testing.
 *
 * This module provides a mock provider that simulates different behaviors:
 * - `MockProvider::working()` - Translates every tagged segment, keeps the sentinel
 * - `MockProvider::failing()` - Always fails with an error
 * - `MockProvider::empty()` - Answers with blank content
 * - `MockProvider::drop_sentinel()` - Translates the sentinel too (corrupts it)
 * - `MockProvider::intermittent(n)` - Fails every nth request
 * - `MockProvider::slow(ms)` - Works, after a delay
 */

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{ChatRequest, ChatResponse, Provider, Usage};
use crate::document::CONTROL_SENTINEL;
use crate::errors::ProviderError;

static SEGMENT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\[(\d+)\](.*?)\[/(\d+)\]").expect("Invalid segment regex")
});

static LOCALE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Target locale: (\S+)").expect("Invalid locale regex")
});

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with a proper translation
    Working,
    /// Succeeds but also rewrites the control sentinel
    DropSentinel,
    /// Fails intermittently (every Nth request)
    Intermittent { fail_every: usize },
    /// Always fails with an error
    Failing,
    /// Returns empty response
    Empty,
    /// Simulates slow response (for timeout testing)
    Slow { delay_ms: u64 },
}

/// Mock provider for testing translation behavior
#[derive(Debug)]
pub struct MockProvider {
    /// Behavior mode
    behavior: MockBehavior,
    /// Request counter, shared between clones
    request_count: Arc<AtomicUsize>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a working mock provider that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a mock that mangles the control sentinel
    pub fn drop_sentinel() -> Self {
        Self::new(MockBehavior::DropSentinel)
    }

    /// Create an intermittently failing mock provider; `fail_every` is at least 1
    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent {
            fail_every: fail_every.max(1),
        })
    }

    /// Create a working mock provider that answers after `delay_ms`
    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Create a failing mock provider that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a mock that returns empty responses
    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Translate every segment of a tagged blob as `[locale] text`
    pub fn translate_blob(blob: &str, locale: &str, keep_sentinel: bool) -> String {
        SEGMENT_REGEX
            .replace_all(blob, |caps: &regex::Captures| {
                let text = &caps[2];
                if keep_sentinel && text == CONTROL_SENTINEL {
                    caps[0].to_string()
                } else {
                    format!("[{}]«{}» {}[/{}]", &caps[1], locale, text, &caps[3])
                }
            })
            .into_owned()
    }

    fn respond(request: &ChatRequest, keep_sentinel: bool) -> ChatResponse {
        let blob = request.message_content("user").unwrap_or_default();
        let locale = request
            .message_content("system")
            .and_then(|prompt| LOCALE_REGEX.captures(prompt))
            .map(|caps| caps[1].to_string())
            .unwrap_or_else(|| "xx".to_string());

        ChatResponse::from_text(
            Self::translate_blob(blob, &locale, keep_sentinel),
            Some(Usage {
                prompt_tokens: blob.len() as u64,
                completion_tokens: (blob.len() / 2) as u64,
            }),
        )
    }
}

impl Clone for MockProvider {
    fn clone(&self) -> Self {
        Self {
            behavior: self.behavior,
            request_count: Arc::clone(&self.request_count),
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);

        match self.behavior {
            MockBehavior::Working => Ok(Self::respond(&request, true)),

            MockBehavior::DropSentinel => Ok(Self::respond(&request, false)),

            MockBehavior::Intermittent { fail_every } => {
                if count % fail_every == fail_every - 1 {
                    Err(ProviderError::ApiError {
                        message: format!("Simulated intermittent failure (request #{})", count + 1),
                        status_code: 503,
                    })
                } else {
                    Ok(Self::respond(&request, true))
                }
            }

            MockBehavior::Failing => Err(ProviderError::ApiError {
                message: "Simulated provider failure".to_string(),
                status_code: 500,
            }),

            MockBehavior::Empty => Ok(ChatResponse::from_text("  \n", Some(Usage::default()))),

            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                Ok(Self::respond(&request, true))
            }
        }
    }
}
