use std::sync::Arc;

use crate::{
    models::{ConversationContext, Role, UserPreferences},
    services::{
        llm::{complete_with_retry, ChatMessage, CompletionRequest, LanguageModel},
        retry::RetryPolicy,
    },
};

const CHAT_TEMPERATURE: f32 = 0.7;

const CHAT_INSTRUCTION: &str = "You are a friendly travel assistant for domestic trips in Korea. Answer in Korean.
At this stage you only gather information: budget, departure city, dates, things the user wants to do, and any constraints.
Do not recommend specific places yet; the user will press \"show results\" for that.
Keep each reply to 2 or 3 short sentences and ask at most one follow-up question.";

const FALLBACK_REPLY: &str =
    "말씀해주신 내용을 잘 기억해둘게요! 준비되면 '결과 보기'를 눌러 추천을 받아보세요.";

/// Information-gathering assistant
pub struct ChatAssistant {
    model: Arc<dyn LanguageModel>,
    retry: RetryPolicy,
}

impl ChatAssistant {
    pub fn new(model: Arc<dyn LanguageModel>, retry: RetryPolicy) -> Self {
        Self { model, retry }
    }

    /// Appends the user turn, then the assistant reply, and returns the reply
    ///
    /// A model failure still produces a reply, so the conversation always
    /// alternates user/assistant.
    pub async fn reply(
        &self,
        preferences: &UserPreferences,
        conversation: &mut ConversationContext,
        text: &str,
    ) -> String {
        conversation.push(Role::User, text);

        let mut messages = vec![
            ChatMessage::system(CHAT_INSTRUCTION),
            ChatMessage::system(preferences.survey_context()),
        ];
        messages.extend(
            conversation
                .turns()
                .iter()
                .map(|t| ChatMessage::from_turn(t.role, t.text.clone())),
        );
        let request = CompletionRequest {
            messages,
            temperature: CHAT_TEMPERATURE,
        };

        let reply = match complete_with_retry(self.model.as_ref(), request, self.retry, "chat").await
        {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "Chat reply failed, using fallback");
                FALLBACK_REPLY.to_string()
            }
        };

        conversation.push(Role::Assistant, reply.clone());
        reply
    }
}
