use std::time::Duration;

use crate::providers::Usage;

/// Token usage accumulated over a run
#[derive(Debug, Clone, Default)]
pub struct TokenUsageStats {
    /// Number of prompt tokens
    pub prompt_tokens: u64,

    /// Number of completion tokens
    pub completion_tokens: u64,

    /// Number of completed API calls
    pub requests: u64,

    /// Total time spent on API requests
    pub api_duration: Duration,
}

impl TokenUsageStats {
    /// Create a new empty token usage stats instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one API call
    pub fn record(&mut self, usage: Usage, elapsed: Duration) {
        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
        self.requests += 1;
        self.api_duration += elapsed;
    }

    /// Prompt plus completion tokens
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    /// Estimated cost from per-1k-token prices
    pub fn estimated_cost(&self, prompt_price_per_1k: f64, completion_price_per_1k: f64) -> f64 {
        (self.prompt_tokens as f64 / 1000.0) * prompt_price_per_1k
            + (self.completion_tokens as f64 / 1000.0) * completion_price_per_1k
    }

    /// Calculate tokens per minute of API time
    pub fn tokens_per_minute(&self) -> f64 {
        let minutes = self.api_duration.as_secs_f64() / 60.0;
        if minutes > 0.0 {
            self.total_tokens() as f64 / minutes
        } else {
            0.0
        }
    }
}
