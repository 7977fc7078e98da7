use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of recent user turns condensed into the conversation summary
const SUMMARY_TURNS: usize = 3;

const GREETING: &str = "좋아요! 😊\n예산, 출발지(예: 서울/부산), 날짜(몇박 몇일), 하고 싶은 것(맛집/카페/전시/온천 등)을 편하게 입력해줘요!";
const NO_EXTRA_INPUT: &str = "추가 입력 없음";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
    pub at: DateTime<Utc>,
}

/// Append-only chat history of one session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationContext {
    turns: Vec<ChatTurn>,
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationContext {
    /// Starts a conversation with the assistant's opening prompt
    pub fn new() -> Self {
        let mut context = Self { turns: Vec::new() };
        context.push(Role::Assistant, GREETING);
        context
    }

    pub fn push(&mut self, role: Role, text: impl Into<String>) {
        self.turns.push(ChatTurn {
            role,
            text: text.into(),
            at: Utc::now(),
        });
    }

    /// Appends turns recorded elsewhere, keeping their order
    pub fn extend(&mut self, turns: impl IntoIterator<Item = ChatTurn>) {
        self.turns.extend(turns);
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Last three user turns joined with " / "
    pub fn summary(&self) -> String {
        let user_turns: Vec<&str> = self
            .turns
            .iter()
            .filter(|t| t.role == Role::User)
            .map(|t| t.text.as_str())
            .collect();

        if user_turns.is_empty() {
            return NO_EXTRA_INPUT.to_string();
        }

        let start = user_turns.len().saturating_sub(SUMMARY_TURNS);
        user_turns[start..].join(" / ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_conversation_opens_with_greeting() {
        let context = ConversationContext::new();
        assert_eq!(context.len(), 1);
        assert_eq!(context.turns()[0].role, Role::Assistant);
    }

    #[test]
    fn test_extend_appends_after_existing_turns() {
        let mut stored = ConversationContext::new();
        let mut working = stored.clone();
        working.push(Role::User, "서울 출발");
        working.push(Role::Assistant, "좋아요");
        stored.push(Role::User, "예산 20만원");

        stored.extend(working.turns()[1..].iter().cloned());
        let texts: Vec<&str> = stored.turns()[1..].iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["예산 20만원", "서울 출발", "좋아요"]);
    }

    #[test]
    fn test_summary_without_user_turns() {
        let context = ConversationContext::new();
        assert_eq!(context.summary(), "추가 입력 없음");
    }

    #[test]
    fn test_summary_keeps_last_three_user_turns() {
        let mut context = ConversationContext::new();
        for text in ["서울 출발", "예산 20만원", "바다 보고 싶어요", "맛집 위주!"] {
            context.push(Role::User, text);
            context.push(Role::Assistant, "알겠어요");
        }
        assert_eq!(
            context.summary(),
            "예산 20만원 / 바다 보고 싶어요 / 맛집 위주!"
        );
    }
}
