//! Language-model collaborator
//!
//! The planner, the justifier and the chat assistant all talk to the model
//! through `LanguageModel`. Failures are typed as `ModelError` and never leave
//! the service layer; every call site owns a deterministic fallback.

use serde::Serialize;

use crate::models::Role;
use crate::services::retry::{with_retry, RetryPolicy, Retryable};

pub mod openai;

pub use openai::OpenAiModel;

/// One message of a chat-completions request
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }

    pub fn from_turn(role: Role, content: impl Into<String>) -> Self {
        Self {
            role: role.as_str(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("model request failed: {message}")]
    Transport { message: String, retryable: bool },

    #[error("model returned status {status}: {message}")]
    Status {
        status: u16,
        message: String,
        retryable: bool,
    },

    #[error("model returned no content")]
    Empty,

    #[error("model response could not be decoded: {0}")]
    Decode(String),
}

impl Retryable for ModelError {
    fn is_retryable(&self) -> bool {
        match self {
            ModelError::Transport { retryable, .. } | ModelError::Status { retryable, .. } => {
                *retryable
            }
            ModelError::Empty | ModelError::Decode(_) => false,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LanguageModel: Send + Sync {
    /// Returns the assistant text of a single chat completion
    async fn complete(&self, request: CompletionRequest) -> Result<String, ModelError>;
}

/// `LanguageModel::complete` under the bounded retry policy
pub async fn complete_with_retry(
    model: &dyn LanguageModel,
    request: CompletionRequest,
    policy: RetryPolicy,
    operation: &str,
) -> Result<String, ModelError> {
    with_retry(policy, operation, move || model.complete(request.clone())).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            messages: vec![ChatMessage::user("hi")],
            temperature: 0.2,
        }
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ModelError::Transport {
            message: "timeout".into(),
            retryable: true
        }
        .is_retryable());
        assert!(!ModelError::Status {
            status: 401,
            message: "bad key".into(),
            retryable: false
        }
        .is_retryable());
        assert!(!ModelError::Empty.is_retryable());
    }

    #[tokio::test]
    async fn test_complete_with_retry_recovers_from_rate_limit() {
        let mut model = MockLanguageModel::new();
        let mut seq = mockall::Sequence::new();
        model
            .expect_complete()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Err(ModelError::Status {
                    status: 429,
                    message: "slow down".into(),
                    retryable: true,
                })
            });
        model
            .expect_complete()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("ok".to_string()));

        let text = complete_with_retry(&model, request(), fast_policy(), "test")
            .await
            .unwrap();
        assert_eq!(text, "ok");
    }

    #[tokio::test]
    async fn test_complete_with_retry_stops_on_permanent_error() {
        let mut model = MockLanguageModel::new();
        model
            .expect_complete()
            .times(1)
            .returning(|_| Err(ModelError::Empty));

        let result = complete_with_retry(&model, request(), fast_policy(), "test").await;
        assert_eq!(result, Err(ModelError::Empty));
    }
}
