use std::sync::Arc;

use crate::{
    models::{user_preferences::join_labels, CatalogItem, Scenery, Transport, TripLength, UserPreferences},
    services::{
        llm::{complete_with_retry, ChatMessage, CompletionRequest, LanguageModel},
        retry::RetryPolicy,
    },
};

const JUSTIFY_TEMPERATURE: f32 = 0.3;
const MAX_SENTENCES: usize = 2;

const JUSTIFY_INSTRUCTION: &str = "You write the reason a travel spot was recommended.
Answer in Korean, in 1 or 2 short sentences.
Always mention the spot name exactly as given.
Base the reason only on the user's preferences and the spot name/address. Do not exaggerate or invent facilities.
Never assume transport the user did not choose (flight, ferry, rental car).";

/// Words that imply flying
const FLIGHT_TERMS: &[&str] = &["비행기", "항공", "공항", "flight", "airport"];
/// Ferries are never a selectable mode
const FERRY_TERMS: &[&str] = &["배편", "페리", "여객선", "ferry"];
const RENTAL_CAR_TERMS: &[&str] = &["렌터카", "렌트카", "rental car"];

/// A reason plus whether it was written from the template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Justification {
    pub text: String,
    pub from_template: bool,
}

/// Deterministic reason built only from validated preference data
pub fn template_reason(item: &CatalogItem, preferences: &UserPreferences) -> String {
    format!(
        "{}은(는) {} 풍경을 좋아하고 {}(으)로 이동하는 {} 일정에 잘 맞는 곳이에요.",
        item.title,
        join_labels(&preferences.scenery, Scenery::label),
        join_labels(&preferences.transport, Transport::label),
        join_labels(&preferences.trip_length, TripLength::label),
    )
}

fn forbidden_terms(preferences: &UserPreferences) -> Vec<&'static str> {
    let mut terms = FERRY_TERMS.to_vec();
    if !preferences.transport.contains(&Transport::Flight) {
        terms.extend_from_slice(FLIGHT_TERMS);
    }
    if !preferences.transport.contains(&Transport::Car) {
        terms.extend_from_slice(RENTAL_CAR_TERMS);
    }
    terms
}

/// Name without a trailing parenthesised qualifier, e.g. "해운대(부산)" -> "해운대"
fn core_name(title: &str) -> &str {
    title.split('(').next().unwrap_or(title).trim()
}

/// Keeps at most `limit` sentences
///
/// A terminator only ends a sentence when followed by whitespace or the end of
/// the text, so "1.5km" stays intact and "!!" counts once.
fn first_sentences(text: &str, limit: usize) -> &str {
    let mut count = 0;
    for (idx, ch) in text.char_indices() {
        if !matches!(ch, '.' | '!' | '?' | '。') {
            continue;
        }
        let end = idx + ch.len_utf8();
        let boundary = text[end..]
            .chars()
            .next()
            .map_or(true, char::is_whitespace);
        if boundary {
            count += 1;
            if count == limit {
                return text[..end].trim();
            }
        }
    }
    text.trim()
}

/// Screens model text before it is shown
///
/// Rejects empty text, text that omits the spot name and text that mentions a
/// transport mode the user did not choose. Accepted text is cut to two
/// sentences.
pub fn accept_reason(text: &str, item: &CatalogItem, preferences: &UserPreferences) -> Option<String> {
    let text = text.trim().trim_matches('"').trim();
    if text.is_empty() {
        return None;
    }

    let name = core_name(&item.title);
    if !name.is_empty() && !text.contains(name) {
        return None;
    }

    let lowered = text.to_lowercase();
    if let Some(term) = forbidden_terms(preferences)
        .into_iter()
        .find(|t| lowered.contains(t))
    {
        tracing::debug!(item_id = %item.id, term, "Reason mentions unselected transport");
        return None;
    }

    Some(first_sentences(text, MAX_SENTENCES).to_string())
}

pub struct Justifier {
    model: Arc<dyn LanguageModel>,
    retry: RetryPolicy,
}

impl Justifier {
    pub fn new(model: Arc<dyn LanguageModel>, retry: RetryPolicy) -> Self {
        Self { model, retry }
    }

    fn build_request(
        item: &CatalogItem,
        preference_summary: &str,
        conversation_summary: &str,
    ) -> CompletionRequest {
        let prompt = format!(
            "User preferences: {preference_summary}\nUser notes: {conversation_summary}\nSpot name: {}\nAddress: {}",
            item.title, item.address
        );

        CompletionRequest {
            messages: vec![ChatMessage::system(JUSTIFY_INSTRUCTION), ChatMessage::user(prompt)],
            temperature: JUSTIFY_TEMPERATURE,
        }
    }

    /// One or two sentences on why `item` fits; never fails
    pub async fn explain(
        &self,
        item: &CatalogItem,
        preferences: &UserPreferences,
        conversation_summary: &str,
    ) -> Justification {
        let request = Self::build_request(item, &preferences.brief(), conversation_summary);

        match complete_with_retry(self.model.as_ref(), request, self.retry, "justify").await {
            Ok(text) => {
                if let Some(text) = accept_reason(&text, item, preferences) {
                    return Justification {
                        text,
                        from_template: false,
                    };
                }
                tracing::warn!(item_id = %item.id, "Model reason rejected, using template");
            }
            Err(e) => {
                tracing::warn!(item_id = %item.id, error = %e, "Justification failed, using template");
            }
        }

        Justification {
            text: template_reason(item, preferences),
            from_template: true,
        }
    }
}
