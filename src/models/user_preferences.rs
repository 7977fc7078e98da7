use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Survey facet values carry a Korean display label; the catalog and the
/// prompts are Korean, so labels are what reach text matching and the model.
macro_rules! facet_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }
    };
}

facet_enum!(
    /// Why the user is travelling
    Purpose {
        Healing => "힐링",
        Relaxation => "휴양",
        Activity => "액티비티",
        Sightseeing => "관광",
    }
);

facet_enum!(
    Companion {
        Solo => "혼자",
        Partner => "연인",
        Family => "가족",
        Friends => "친구",
    }
);

facet_enum!(
    /// How the user gets there. Drives the hard island exclusion.
    Transport {
        ExpressBus => "고속버스",
        Train => "기차",
        Car => "자동차",
        Flight => "비행기",
    }
);

facet_enum!(
    TripLength {
        DayTrip => "당일여행",
        OneNight => "1박 2일",
        TwoNights => "2박 3일",
        ThreePlusNights => "3박 이상",
    }
);

facet_enum!(
    /// Preferred environment, the first-priority ranking signal
    Scenery {
        Sea => "바다",
        Mountain => "산",
        City => "도시",
    }
);

facet_enum!(
    Activity {
        FoodTour => "맛집 탐방",
        CafeTour => "카페 투어",
        PhotoSpot => "사진 스팟",
        HotSpring => "온천,스파",
        HistoryCulture => "역사,문화",
        ExhibitionMuseum => "전시, 뮤지엄",
        ThemePark => "테마파크",
    }
);

facet_enum!(
    CrowdPreference {
        Bustling => "사람 많은 핫플",
        Quiet => "조용하고 한적한 곳",
    }
);

/// Facets that must be non-empty before a run is allowed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequiredFacet {
    Scenery,
    Transport,
    TripLength,
}

impl RequiredFacet {
    pub fn label(self) -> &'static str {
        match self {
            RequiredFacet::Scenery => "scenery",
            RequiredFacet::Transport => "transport",
            RequiredFacet::TripLength => "trip length",
        }
    }
}

/// Multi-select survey answers. Every facet is a set, so ordering and
/// duplicates never matter.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserPreferences {
    #[serde(default)]
    pub purpose: BTreeSet<Purpose>,
    #[serde(default)]
    pub companion: BTreeSet<Companion>,
    #[serde(default)]
    pub transport: BTreeSet<Transport>,
    #[serde(default)]
    pub trip_length: BTreeSet<TripLength>,
    #[serde(default)]
    pub scenery: BTreeSet<Scenery>,
    #[serde(default)]
    pub activities: BTreeSet<Activity>,
    #[serde(default)]
    pub crowd_preference: BTreeSet<CrowdPreference>,
}

/// Outcome of `submitPreferences`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PreferenceCheck {
    pub ready: bool,
    pub missing: Vec<RequiredFacet>,
}

impl UserPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Required facets that are still empty
    pub fn missing_facets(&self) -> Vec<RequiredFacet> {
        let mut missing = Vec::new();
        if self.scenery.is_empty() {
            missing.push(RequiredFacet::Scenery);
        }
        if self.transport.is_empty() {
            missing.push(RequiredFacet::Transport);
        }
        if self.trip_length.is_empty() {
            missing.push(RequiredFacet::TripLength);
        }
        missing
    }

    pub fn check(&self) -> PreferenceCheck {
        let missing = self.missing_facets();
        PreferenceCheck {
            ready: missing.is_empty(),
            missing,
        }
    }

    /// Fails with an actionable message when a required facet is empty
    pub fn validate(&self) -> Result<(), String> {
        let missing = self.missing_facets();
        if missing.is_empty() {
            return Ok(());
        }
        let names: Vec<&str> = missing.iter().map(|f| f.label()).collect();
        Err(format!(
            "Select at least one option for: {}",
            names.join(", ")
        ))
    }

    /// True when the user travels by train or express bus and did not pick
    /// flight; destinations needing a boat are then unreachable.
    pub fn is_ground_only(&self) -> bool {
        (self.transport.contains(&Transport::Train)
            || self.transport.contains(&Transport::ExpressBus))
            && !self.transport.contains(&Transport::Flight)
    }

    /// Scenery the rule-based fallbacks key off. Sea wins over mountain over city.
    pub fn primary_scenery(&self) -> Option<Scenery> {
        self.scenery.iter().next().copied()
    }

    /// One-line summary used in justification prompts
    pub fn brief(&self) -> String {
        format!(
            "풍경={} / 교통={} / 기간={} / 목적={} / 활동={} / 혼잡도={}",
            join_labels(&self.scenery, |s| s.label()),
            join_labels(&self.transport, |t| t.label()),
            join_labels(&self.trip_length, |t| t.label()),
            join_labels(&self.purpose, |p| p.label()),
            join_labels(&self.activities, |a| a.label()),
            join_labels(&self.crowd_preference, |c| c.label()),
        )
    }

    /// One tag per answered facet, shown on result cards. Empty facets are
    /// skipped and long activity lists are cut after three.
    pub fn tags(&self) -> Vec<FacetTag> {
        let activities: Vec<&'static str> = self.activities.iter().map(|a| a.label()).collect();
        let mut shown_activities = activities
            .iter()
            .take(TAG_ACTIVITY_LIMIT)
            .copied()
            .collect::<Vec<_>>()
            .join(", ");
        if activities.len() > TAG_ACTIVITY_LIMIT {
            shown_activities.push_str(&format!(" 외 {}개", activities.len() - TAG_ACTIVITY_LIMIT));
        }

        [
            ("풍경", labels_of(&self.scenery, |s| s.label())),
            ("이동수단", labels_of(&self.transport, |t| t.label())),
            ("기간", labels_of(&self.trip_length, |t| t.label())),
            ("목적", labels_of(&self.purpose, |p| p.label())),
            ("동반자", labels_of(&self.companion, |c| c.label())),
            ("활동", shown_activities),
            ("혼잡도", labels_of(&self.crowd_preference, |c| c.label())),
        ]
        .into_iter()
        .filter(|(_, labels)| !labels.is_empty())
        .map(|(facet, labels)| FacetTag { facet, labels })
        .collect()
    }

    /// Multi-line survey block handed to the planner and the chat assistant
    pub fn survey_context(&self) -> String {
        format!(
            "[Survey answers]\n\
             - scenery: {}\n\
             - transport: {}\n\
             - trip length: {}\n\
             - purpose: {}\n\
             - companion: {}\n\
             - activities: {}\n\
             - crowd: {}",
            join_labels(&self.scenery, |s| s.label()),
            join_labels(&self.transport, |t| t.label()),
            join_labels(&self.trip_length, |t| t.label()),
            join_labels(&self.purpose, |p| p.label()),
            join_labels(&self.companion, |c| c.label()),
            join_labels(&self.activities, |a| a.label()),
            join_labels(&self.crowd_preference, |c| c.label()),
        )
    }
}

const NONE_SELECTED: &str = "선택 없음";

/// Activities listed on a tag before the rest are counted
const TAG_ACTIVITY_LIMIT: usize = 3;

/// Facet name with its chosen labels, e.g. `풍경: 바다, 산`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FacetTag {
    pub facet: &'static str,
    pub labels: String,
}

fn labels_of<T: Copy>(values: &BTreeSet<T>, label: impl Fn(T) -> &'static str) -> String {
    values.iter().map(|v| label(*v)).collect::<Vec<_>>().join(", ")
}

/// Joins facet labels with ", ", or "선택 없음" when the facet is empty
pub fn join_labels<T: Copy>(values: &BTreeSet<T>, label: impl Fn(T) -> &'static str) -> String {
    if values.is_empty() {
        return NONE_SELECTED.to_string();
    }
    values
        .iter()
        .map(|v| label(*v))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_preferences() -> UserPreferences {
        UserPreferences {
            scenery: [Scenery::Sea].into(),
            transport: [Transport::Train].into(),
            trip_length: [TripLength::OneNight].into(),
            ..UserPreferences::default()
        }
    }

    #[test]
    fn test_new_preferences_are_not_ready() {
        let prefs = UserPreferences::new();
        let check = prefs.check();
        assert!(!check.ready);
        assert_eq!(
            check.missing,
            vec![
                RequiredFacet::Scenery,
                RequiredFacet::Transport,
                RequiredFacet::TripLength
            ]
        );
    }

    #[test]
    fn test_required_facets_gate_execution() {
        let prefs = ready_preferences();
        assert!(prefs.check().ready);
        assert!(prefs.validate().is_ok());

        let mut no_scenery = prefs.clone();
        no_scenery.scenery.clear();
        let message = no_scenery.validate().unwrap_err();
        assert!(message.contains("scenery"));
        assert!(!message.contains("transport"));
    }

    #[test]
    fn test_ground_only_detection() {
        let mut prefs = ready_preferences();
        assert!(prefs.is_ground_only());

        prefs.transport.insert(Transport::Flight);
        assert!(!prefs.is_ground_only());

        prefs.transport = [Transport::Car].into();
        assert!(!prefs.is_ground_only());

        prefs.transport = [Transport::ExpressBus, Transport::Car].into();
        assert!(prefs.is_ground_only());
    }

    #[test]
    fn test_facets_deserialize_from_snake_case() {
        let json = r#"{
            "scenery": ["mountain", "sea", "sea"],
            "transport": ["express_bus"],
            "trip_length": ["three_plus_nights"],
            "activities": ["hot_spring"]
        }"#;
        let prefs: UserPreferences = serde_json::from_str(json).unwrap();
        assert_eq!(prefs.scenery.len(), 2);
        assert_eq!(prefs.primary_scenery(), Some(Scenery::Sea));
        assert!(prefs.transport.contains(&Transport::ExpressBus));
        assert!(prefs.purpose.is_empty());
    }

    #[test]
    fn test_brief_uses_labels_and_placeholder() {
        let brief = ready_preferences().brief();
        assert!(brief.starts_with("풍경=바다 / 교통=기차 / 기간=1박 2일"));
        assert!(brief.contains("목적=선택 없음"));
    }

    #[test]
    fn test_tags_group_by_facet_and_skip_empty() {
        let mut prefs = ready_preferences();
        prefs.scenery.insert(Scenery::Mountain);
        prefs.activities.insert(Activity::CafeTour);
        let tags = prefs.tags();
        let facets: Vec<&str> = tags.iter().map(|t| t.facet).collect();
        assert_eq!(facets, vec!["풍경", "이동수단", "기간", "활동"]);
        assert_eq!(tags[0].labels, "바다, 산");
        assert_eq!(tags[3].labels, "카페 투어");
    }

    #[test]
    fn test_activity_tag_counts_the_rest() {
        let mut prefs = ready_preferences();
        prefs.activities = [
            Activity::FoodTour,
            Activity::CafeTour,
            Activity::PhotoSpot,
            Activity::HotSpring,
            Activity::ThemePark,
        ]
        .into();
        let tag = prefs
            .tags()
            .into_iter()
            .find(|t| t.facet == "활동")
            .unwrap();
        assert_eq!(tag.labels, "맛집 탐방, 카페 투어, 사진 스팟 외 2개");
    }
}
