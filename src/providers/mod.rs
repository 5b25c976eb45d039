/*!
 * Provider implementations for chat-completion services.
 *
 * This module contains client implementations behind a common trait:
 * - OpenAI: any OpenAI-compatible `/chat/completions` endpoint
 * - Mock: scripted behaviours for tests
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::errors::ProviderError;

/// Chat message format
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// Role of the message sender (system, user, assistant)
    pub role: String,

    /// Content of the message
    pub content: String,
}

/// Chat-completion request
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// The model to use
    pub model: String,

    /// The messages for the conversation
    pub messages: Vec<ChatMessage>,

    /// Maximum number of tokens to generate
    pub max_tokens: u32,

    /// Temperature for generation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ChatRequest {
    /// Create a new chat request
    pub fn new(model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            max_tokens,
            temperature: None,
        }
    }

    /// Add a message to the request
    pub fn add_message(mut self, role: impl Into<String>, content: impl Into<String>) -> Self {
        self.messages.push(ChatMessage {
            role: role.into(),
            content: content.into(),
        });
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Content of the first message with the given role
    pub fn message_content(&self, role: &str) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == role)
            .map(|m| m.content.as_str())
    }
}

/// Token usage information
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq)]
pub struct Usage {
    /// Number of prompt tokens
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Number of completion tokens
    #[serde(default)]
    pub completion_tokens: u64,
}

/// A single completion choice
#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    /// Generated message
    pub message: ChatMessage,
}

/// Chat-completion response
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    /// Completion choices, the first one is used
    #[serde(default)]
    pub choices: Vec<ChatChoice>,

    /// Token usage information
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatResponse {
    /// Build a response holding a single assistant message
    pub fn from_text(text: impl Into<String>, usage: Option<Usage>) -> Self {
        Self {
            choices: vec![ChatChoice {
                message: ChatMessage {
                    role: "assistant".to_string(),
                    content: text.into(),
                },
            }],
            usage,
        }
    }

    /// Content of the first choice, if any
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

/// Common trait for all chat-completion providers
///
/// This trait defines the interface that all provider implementations must follow,
/// allowing them to be used interchangeably by the translation client.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Complete a request using this provider
    ///
    /// # Arguments
    /// * `request` - The request to complete
    ///
    /// # Returns
    /// * `Result<ChatResponse, ProviderError>` - The response from the provider or an error
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError>;
}

pub mod mock;
pub mod openai;
