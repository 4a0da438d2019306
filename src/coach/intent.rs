//! Keyword intent classifier.
//!
//! An ordered list of substring rules. The first rule with any matching
//! keyword wins, so the order of `INTENT_RULES` is significant: "had lunch,
//! what should I eat" is a check-in, not a meal-plan request.

use tracing::debug;

/// What the user is asking for once onboarding is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    CheckIn,
    ProgressTracking,
    Timeline,
    Alternatives,
    Encouragement,
    MealPlan,
    Grocery,
    Rewards,
    Help,
    Default,
}

struct IntentRule {
    intent: Intent,
    keywords: &'static [&'static str],
}

static INTENT_RULES: &[IntentRule] = &[
    IntentRule {
        intent: Intent::CheckIn,
        keywords: &["ate", "had", "breakfast", "lunch", "dinner", "snack", "check in", "check-in"],
    },
    IntentRule {
        intent: Intent::ProgressTracking,
        keywords: &["what did i eat", "what did you eat", "track", "log"],
    },
    IntentRule {
        intent: Intent::Timeline,
        keywords: &["expect", "timeline", "when will", "how long"],
    },
    IntentRule {
        intent: Intent::Alternatives,
        keywords: &["alternative", "instead of", "healthier", "bad habit"],
    },
    IntentRule {
        intent: Intent::Encouragement,
        keywords: &["motivate", "encourage", "inspiration", "feeling down"],
    },
    IntentRule {
        intent: Intent::MealPlan,
        keywords: &["meal plan", "meal", "what should i eat", "menu"],
    },
    IntentRule {
        intent: Intent::Grocery,
        keywords: &["grocery", "shopping", "list"],
    },
    IntentRule {
        intent: Intent::Rewards,
        keywords: &["progress", "reward", "badge", "streak"],
    },
    IntentRule {
        intent: Intent::Help,
        keywords: &["help", "what can you", "support"],
    },
];

/// Classify a raw chat message. Matching is case-insensitive substring search.
pub fn classify(message: &str) -> Intent {
    let lower = message.trim().to_lowercase();
    let intent = INTENT_RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|kw| lower.contains(kw)))
        .map_or(Intent::Default, |rule| rule.intent);
    debug!(?intent, "Classified coach message");
    intent
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_category_matches() {
        let cases = [
            ("I had eggs", Intent::CheckIn),
            ("show my log", Intent::ProgressTracking),
            ("what should I EXPECT?", Intent::Timeline),
            ("any alternative to soda", Intent::Alternatives),
            ("I'm feeling down", Intent::Encouragement),
            ("give me a menu", Intent::MealPlan),
            ("grocery run", Intent::Grocery),
            ("show my progress", Intent::Rewards),
            ("help", Intent::Help),
            ("hello there", Intent::Default),
        ];
        for (msg, expected) in cases {
            assert_eq!(classify(msg), expected, "message: {msg}");
        }
    }

    #[test]
    fn check_in_beats_meal_plan() {
        assert_eq!(classify("I had lunch, what should I eat next?"), Intent::CheckIn);
    }

    #[test]
    fn substring_matches_inside_words() {
        // "ate" inside "motivate" wins over the encouragement rule.
        assert_eq!(classify("motivate me"), Intent::CheckIn);
        // "track" wins over "progress".
        assert_eq!(classify("track my progress"), Intent::ProgressTracking);
    }

    #[test]
    fn meal_plan_beats_grocery() {
        assert_eq!(classify("meal shopping list"), Intent::MealPlan);
    }

    #[test]
    fn empty_message_is_default() {
        assert_eq!(classify("   "), Intent::Default);
    }
}
