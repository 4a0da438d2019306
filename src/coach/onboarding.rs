//! Onboarding flow: the fixed eight-question preference interview.
//!
//! The flow has no stored state of its own: the current step is always
//! derived from which preference fields are already answered.

use serde::{Deserialize, Serialize};

use crate::model::Preferences;

/// Closing message once every field is answered.
pub const COMPLETION_MESSAGE: &str = "🎉 Amazing! I have everything I need to create your personalized meal plan. Let's get started on your health journey together! You can ask me about meal plans, track your progress, or get support anytime. How can I help you today?";

/// Reply when the user skips the last (optional) question.
pub const SKIP_MESSAGE: &str = "Perfect! I have enough information to get started. Let's begin your health journey! 🚀\n\nYou can ask me about meal plans, track your progress, or get support anytime. How can I help you today?";

/// Appended to the first question only.
pub const NONE_HINT: &str = "(You can say \"none\" if you don't have any allergies)";

/// The preference fields asked during onboarding, in question order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingField {
    FoodAllergies,
    FoodsDislike,
    FoodsLike,
    MealsPerDay,
    MealPreference,
    Goals,
    BadHabits,
    BodyScanInfo,
}

impl OnboardingField {
    /// All fields in the order they are asked.
    pub const ALL: [OnboardingField; 8] = [
        Self::FoodAllergies,
        Self::FoodsDislike,
        Self::FoodsLike,
        Self::MealsPerDay,
        Self::MealPreference,
        Self::Goals,
        Self::BadHabits,
        Self::BodyScanInfo,
    ];

    /// Zero-based position in the question order.
    pub fn index(self) -> usize {
        Self::ALL
            .iter()
            .position(|f| *f == self)
            .unwrap_or(Self::ALL.len() - 1)
    }

    /// Whether this is the final (skippable) question.
    pub fn is_last(self) -> bool {
        matches!(self, Self::BodyScanInfo)
    }

    /// The next question, if any.
    pub fn next(self) -> Option<OnboardingField> {
        Self::ALL.get(self.index() + 1).copied()
    }

    /// The question asked for this field.
    pub fn prompt(self) -> &'static str {
        match self {
            Self::FoodAllergies => {
                "Let's start! Do you have any food allergies I should know about? (e.g., nuts, dairy, shellfish)"
            }
            Self::FoodsDislike => {
                "Got it! Are there any foods you really don't like? This helps me create meal plans you'll actually enjoy! 😊"
            }
            Self::FoodsLike => {
                "Perfect! Now, what are some of your favorite foods? I'll make sure to include them in your meal plans!"
            }
            Self::MealsPerDay => {
                "Great! How many meals do you typically eat per day? (including snacks - e.g., 3 meals + 2 snacks = 5)"
            }
            Self::MealPreference => {
                "Awesome! Do you prefer quick meals (15 min or less) or are you okay with cooked meals that take longer? (quick/cooked/both)"
            }
            Self::Goals => {
                "Excellent! What are your main health goals? (e.g., brain focus, weight loss, muscle tone, hormone balance, general wellness)"
            }
            Self::BadHabits => {
                "I understand! What are some habits you'd like to gradually change? (e.g., reducing sugar, eating less processed food, more vegetables)"
            }
            Self::BodyScanInfo => {
                "Last question! If you have any body scan information or health metrics you'd like me to consider, please share them. Otherwise, just say 'skip'!"
            }
        }
    }

    /// Whether the preference record already holds a value for this field.
    ///
    /// Empty text and a zero meal count count as unanswered.
    pub fn is_answered(self, prefs: &Preferences) -> bool {
        fn filled(value: &Option<String>) -> bool {
            value.as_deref().is_some_and(|s| !s.is_empty())
        }
        match self {
            Self::FoodAllergies => filled(&prefs.food_allergies),
            Self::FoodsDislike => filled(&prefs.foods_dislike),
            Self::FoodsLike => filled(&prefs.foods_like),
            Self::MealsPerDay => prefs.meals_per_day.is_some_and(|n| n > 0),
            Self::MealPreference => filled(&prefs.meal_preference),
            Self::Goals => filled(&prefs.goals),
            Self::BadHabits => filled(&prefs.bad_habits),
            Self::BodyScanInfo => filled(&prefs.body_scan_info),
        }
    }
}

impl std::fmt::Display for OnboardingField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::FoodAllergies => "food_allergies",
            Self::FoodsDislike => "foods_dislike",
            Self::FoodsLike => "foods_like",
            Self::MealsPerDay => "meals_per_day",
            Self::MealPreference => "meal_preference",
            Self::Goals => "goals",
            Self::BadHabits => "bad_habits",
            Self::BodyScanInfo => "body_scan_info",
        };
        write!(f, "{s}")
    }
}

/// Where a preference record sits in the interview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnboardingStep {
    /// Waiting on an answer for this field.
    Pending(OnboardingField),
    /// Every field is answered.
    Complete,
}

impl OnboardingStep {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// The outstanding field, if any.
    pub fn field(&self) -> Option<OnboardingField> {
        match self {
            Self::Pending(field) => Some(*field),
            Self::Complete => None,
        }
    }
}

/// The first unanswered field, or `Complete`.
pub fn current_step(prefs: &Preferences) -> OnboardingStep {
    OnboardingField::ALL
        .into_iter()
        .find(|field| !field.is_answered(prefs))
        .map_or(OnboardingStep::Complete, OnboardingStep::Pending)
}

/// Reply for a user who has not finished onboarding.
pub fn onboarding_reply(message: &str, prefs: &Preferences) -> String {
    let field = match current_step(prefs) {
        OnboardingStep::Complete => return COMPLETION_MESSAGE.to_string(),
        OnboardingStep::Pending(field) => field,
    };

    if field.is_last() && message.to_lowercase().contains("skip") {
        return SKIP_MESSAGE.to_string();
    }

    if field == OnboardingField::FoodAllergies {
        format!("{}\n\n{NONE_HINT}", field.prompt())
    } else {
        field.prompt().to_string()
    }
}

/// Record one chat answer against the outstanding question.
///
/// Returns the updated record; the input is left untouched.
pub fn apply_answer(prefs: &Preferences, message: &str) -> Preferences {
    let mut next = prefs.clone();
    let answer = message.trim();
    let lower = answer.to_lowercase();

    let field = match current_step(prefs) {
        OnboardingStep::Complete => {
            next.onboarding_complete = true;
            return next;
        }
        OnboardingStep::Pending(field) => field,
    };

    if field.is_last() && (lower.contains("skip") || lower.contains("none")) {
        next.onboarding_complete = true;
        return next;
    }

    let text = || (!answer.is_empty()).then(|| answer.to_string());
    match field {
        OnboardingField::MealsPerDay => {
            if let Some(count) = first_number(answer) {
                next.meals_per_day = Some(count);
            }
        }
        OnboardingField::MealPreference => {
            let choice = ["quick", "both", "cooked"]
                .into_iter()
                .find(|option| lower.contains(option));
            if let Some(choice) = choice {
                next.meal_preference = Some(choice.to_string());
            }
        }
        OnboardingField::FoodAllergies => {
            next.food_allergies = if lower.contains("none") || lower.contains("no ") {
                Some("None".to_string())
            } else {
                text()
            };
        }
        OnboardingField::FoodsDislike => next.foods_dislike = text(),
        OnboardingField::FoodsLike => next.foods_like = text(),
        OnboardingField::Goals => next.goals = text(),
        OnboardingField::BadHabits => next.bad_habits = text(),
        OnboardingField::BodyScanInfo => next.body_scan_info = text(),
    }

    // Any reply to the last question ends the interview, even a blank one.
    if field.is_last() {
        next.onboarding_complete = true;
    }
    next
}

/// First run of ASCII digits in `s`, parsed.
fn first_number(s: &str) -> Option<u32> {
    let digits: String = s
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Preferences with every field before `upto` answered.
    fn answered_before(upto: usize) -> Preferences {
        let mut prefs = Preferences::default();
        for field in OnboardingField::ALL.iter().take(upto) {
            prefs = fill(prefs, *field);
        }
        prefs
    }

    fn fill(mut prefs: Preferences, field: OnboardingField) -> Preferences {
        let v = Some(format!("{field} answer"));
        match field {
            OnboardingField::FoodAllergies => prefs.food_allergies = v,
            OnboardingField::FoodsDislike => prefs.foods_dislike = v,
            OnboardingField::FoodsLike => prefs.foods_like = v,
            OnboardingField::MealsPerDay => prefs.meals_per_day = Some(3),
            OnboardingField::MealPreference => prefs.meal_preference = v,
            OnboardingField::Goals => prefs.goals = v,
            OnboardingField::BadHabits => prefs.bad_habits = v,
            OnboardingField::BodyScanInfo => prefs.body_scan_info = v,
        }
        prefs
    }

    #[test]
    fn next_walks_all_fields() {
        let mut current = OnboardingField::FoodAllergies;
        let mut seen = vec![current];
        while let Some(next) = current.next() {
            seen.push(next);
            current = next;
        }
        assert_eq!(seen, OnboardingField::ALL.to_vec());
        assert!(current.is_last());
    }

    #[test]
    fn display_matches_serde() {
        for field in OnboardingField::ALL {
            let json = serde_json::to_string(&field).unwrap();
            assert_eq!(format!("\"{field}\""), json);
        }
    }

    #[test]
    fn each_missing_field_returns_its_prompt() {
        for (k, field) in OnboardingField::ALL.into_iter().enumerate() {
            let prefs = answered_before(k);
            assert_eq!(current_step(&prefs), OnboardingStep::Pending(field));

            let reply = onboarding_reply("hello", &prefs);
            if k == 0 {
                assert_eq!(reply, format!("{}\n\n{}", field.prompt(), NONE_HINT));
            } else {
                assert_eq!(reply, field.prompt());
                assert!(!reply.contains(NONE_HINT));
            }
        }
    }

    #[test]
    fn later_answers_do_not_skip_earlier_questions() {
        let mut prefs = answered_before(8);
        prefs.foods_like = None;
        assert_eq!(
            current_step(&prefs),
            OnboardingStep::Pending(OnboardingField::FoodsLike)
        );
    }

    #[test]
    fn zero_meals_counts_as_unanswered() {
        let mut prefs = answered_before(3);
        prefs.meals_per_day = Some(0);
        assert_eq!(
            current_step(&prefs),
            OnboardingStep::Pending(OnboardingField::MealsPerDay)
        );
    }

    #[test]
    fn completion_message_is_stable() {
        let prefs = answered_before(8);
        assert!(current_step(&prefs).is_terminal());
        for msg in ["hi", "skip", "what now?"] {
            assert_eq!(onboarding_reply(msg, &prefs), COMPLETION_MESSAGE);
        }
    }

    #[test]
    fn skip_on_last_question() {
        let prefs = answered_before(7);
        assert_eq!(onboarding_reply("Please SKIP this", &prefs), SKIP_MESSAGE);
        assert_eq!(
            onboarding_reply("I weigh 70kg", &prefs),
            OnboardingField::BodyScanInfo.prompt()
        );
    }

    #[test]
    fn skip_before_last_question_is_ignored() {
        let prefs = answered_before(2);
        assert_eq!(
            onboarding_reply("skip", &prefs),
            OnboardingField::FoodsLike.prompt()
        );
    }

    #[test]
    fn apply_answer_allergies_none() {
        let next = apply_answer(&Preferences::default(), "None really");
        assert_eq!(next.food_allergies.as_deref(), Some("None"));
        let next = apply_answer(&Preferences::default(), "shellfish and peanuts");
        assert_eq!(next.food_allergies.as_deref(), Some("shellfish and peanuts"));
    }

    #[test]
    fn apply_answer_meals_per_day() {
        let prefs = answered_before(3);
        let next = apply_answer(&prefs, "about 4 a day");
        assert_eq!(next.meals_per_day, Some(4));

        let unchanged = apply_answer(&prefs, "a few");
        assert_eq!(unchanged.meals_per_day, None);
        assert_eq!(
            current_step(&unchanged),
            OnboardingStep::Pending(OnboardingField::MealsPerDay)
        );
    }

    #[test]
    fn apply_answer_meal_preference() {
        let prefs = answered_before(4);
        assert_eq!(
            apply_answer(&prefs, "Quick please").meal_preference.as_deref(),
            Some("quick")
        );
        assert_eq!(
            apply_answer(&prefs, "both work, and cooked too").meal_preference.as_deref(),
            Some("both")
        );
        assert_eq!(apply_answer(&prefs, "whatever").meal_preference, None);
    }

    #[test]
    fn apply_answer_last_field_completes() {
        let prefs = answered_before(7);
        let stored = apply_answer(&prefs, "body fat 20%");
        assert_eq!(stored.body_scan_info.as_deref(), Some("body fat 20%"));
        assert!(stored.onboarding_complete);

        let skipped = apply_answer(&prefs, "skip");
        assert!(skipped.body_scan_info.is_none());
        assert!(skipped.onboarding_complete);
    }

    #[test]
    fn blank_last_answer_still_completes() {
        let prefs = answered_before(7);
        let stored = apply_answer(&prefs, "   ");
        assert!(stored.body_scan_info.is_none());
        assert!(stored.onboarding_complete);
    }

    #[test]
    fn blank_earlier_answer_does_not_advance() {
        let prefs = answered_before(2);
        let stored = apply_answer(&prefs, "");
        assert!(stored.foods_like.is_none());
        assert!(!stored.onboarding_complete);
        assert_eq!(current_step(&stored), OnboardingStep::Pending(OnboardingField::FoodsLike));
    }

    #[test]
    fn apply_answer_does_not_mutate_input() {
        let prefs = Preferences::default();
        let _ = apply_answer(&prefs, "dairy");
        assert_eq!(prefs, Preferences::default());
    }

    #[test]
    fn full_interview_reaches_completion() {
        let answers = [
            "none",
            "olives",
            "salmon, rice",
            "3",
            "cooked",
            "more energy",
            "too much sugar",
            "skip",
        ];
        let mut prefs = Preferences::default();
        for answer in answers {
            assert!(!prefs.onboarding_complete);
            prefs = apply_answer(&prefs, answer);
        }
        assert!(prefs.onboarding_complete);
        assert_eq!(prefs.foods_like.as_deref(), Some("salmon, rice"));
        assert_eq!(prefs.meals_per_day, Some(3));
    }
}
